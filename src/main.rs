// Brainfeatures command-line runner
// Runs an experiment on WAV data sets laid out as <root>/<class>/<file>.wav

use anyhow::Context;
use clap::Parser;
use std::collections::BTreeMap;
use std::path::PathBuf;

use brainfeatures::analysis::{FeatureSummary, PerformanceTable};
use brainfeatures::{DataSet, Experiment, ExperimentSettings, Role, WavDataSet};

/// Feature-based biosignal classification experiment
#[derive(Parser)]
#[command(name = "brainfeatures")]
#[command(about = "Clean, generate features, and validate or evaluate a classifier", long_about = None)]
struct Cli {
    /// Development data set directory
    #[arg(long)]
    devel: PathBuf,

    /// Evaluation data set directory; switches to final evaluation
    #[arg(long)]
    eval: Option<PathBuf>,

    /// Experiment settings (JSON)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Worker threads (-1 = all cores)
    #[arg(long, allow_hyphen_values = true)]
    n_jobs: Option<i32>,

    /// Append stage progress to this JSONL file
    #[arg(long)]
    trace: Option<PathBuf>,

    /// Verbosity (DEBUG, INFO, WARNING, ERROR)
    #[arg(long)]
    verbosity: Option<String>,

    /// Write performances and the feature summary to this JSON file
    #[arg(long)]
    output: Option<PathBuf>,
}

#[derive(serde::Serialize)]
struct Report<'a> {
    run_id: String,
    feature_names: Option<&'a [String]>,
    performances: &'a BTreeMap<Role, PerformanceTable>,
    feature_summary: Option<FeatureSummary>,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(log::LevelFilter::Trace)
        .parse_default_env()
        .init();

    let mut settings = match &cli.settings {
        Some(path) => ExperimentSettings::from_json_file(path)
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => ExperimentSettings::default(),
    };
    if let Some(n_jobs) = cli.n_jobs {
        settings.n_jobs = n_jobs;
    }
    if let Some(trace) = cli.trace {
        settings.trace_path = Some(trace);
    }
    if let Some(verbosity) = cli.verbosity {
        settings.verbosity = verbosity;
    }

    let devel = WavDataSet::open(&cli.devel)
        .with_context(|| format!("failed to open {}", cli.devel.display()))?;
    log::info!(
        "devel: {} recordings in classes {:?}",
        devel.len(),
        devel.class_names()
    );
    let eval: Option<Box<dyn DataSet>> = match &cli.eval {
        Some(path) => {
            let eval = WavDataSet::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            log::info!("eval: {} recordings", eval.len());
            Some(Box::new(eval))
        }
        None => None,
    };

    let config = settings.into_config()?;
    let mut experiment = Experiment::new(Box::new(devel), eval, config);
    experiment.run()?;

    for (role, table) in experiment.performances() {
        for (metric, value) in table.mean() {
            println!("{:<6} {:<20} {:.4}", role, metric, value);
        }
    }

    if let Some(path) = &cli.output {
        let report = Report {
            run_id: experiment.run_id().to_string(),
            feature_names: experiment.model_feature_names(),
            performances: experiment.performances(),
            feature_summary: experiment.feature_summary(),
        };
        std::fs::write(path, serde_json::to_string_pretty(&report)?)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("report written to {}", path.display());
    }

    Ok(())
}
