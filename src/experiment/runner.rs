// Experiment orchestrator
// Sequences cleaning, feature generation, and validation/final evaluation per split

use chrono::Local;
use serde_json::json;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::{Duration, Instant};
use uuid::Uuid;

use crate::analysis::{
    analyze_quality_of_predictions, format_means, summarize_features, FeatureSummary, LabeledTable,
    PerformanceTable,
};
use crate::data::{unzip_rows, DataSet, FeatureRow, Label, Signal};
use crate::decoding::{DecodingOutput, DecodingSetup, FoldInfo, Prediction, Role};
use crate::experiment::config::{check_config, ConfigError, ExperimentConfig};
use crate::experiment::error::ExperimentError;
use crate::experiment::state::{RunStatus, Split, SplitInfo, SplitState, Stage, Timings};
use crate::pipeline::{
    apply_modifier, clean_split, generate_features, load_split, LoadMode, TraceBuilder,
    TraceWriter, WorkerPool,
};
use crate::procedures::Params;

/// Writes stage start/complete entries when a trace path is configured
struct StageTracer {
    run_id: Uuid,
    writer: Option<TraceWriter>,
}

impl StageTracer {
    fn new(run_id: Uuid, path: Option<PathBuf>) -> Self {
        StageTracer {
            run_id,
            writer: path.map(TraceWriter::new),
        }
    }

    fn start(&self, stage: Stage, split: Split) {
        if let Some(writer) = &self.writer {
            let entry = TraceBuilder::stage(self.run_id, stage.as_str())
                .split(split.as_str())
                .start(format!("Started {}", stage));
            if let Err(e) = writer.write(&entry) {
                log::warn!("failed to write trace entry: {}", e);
            }
        }
    }

    fn complete(&self, stage: Stage, split: Split, elapsed: Duration, data: serde_json::Value) {
        if let Some(writer) = &self.writer {
            let entry = TraceBuilder::stage(self.run_id, stage.as_str())
                .split(split.as_str())
                .complete(format!("Finished {}", stage), elapsed.as_secs_f64(), Some(data));
            if let Err(e) = writer.write(&entry) {
                log::warn!("failed to write trace entry: {}", e);
            }
        }
    }
}

fn split_state(
    splits: &BTreeMap<Split, SplitState>,
    split: Split,
) -> Result<&SplitState, ExperimentError> {
    splits.get(&split).ok_or(ExperimentError::MissingSplit { split })
}

fn split_state_mut(
    splits: &mut BTreeMap<Split, SplitState>,
    split: Split,
) -> Result<&mut SplitState, ExperimentError> {
    splits
        .get_mut(&split)
        .ok_or(ExperimentError::MissingSplit { split })
}

/// Label the per-fold PCA components and importances with feature names
fn fold_tables(
    split: Split,
    folds: &[FoldInfo],
    feature_names: &[String],
) -> (Option<LabeledTable>, Option<LabeledTable>) {
    let components: Vec<Vec<f64>> = folds
        .iter()
        .filter_map(|fold| fold.pca_components.as_ref())
        .flatten()
        .cloned()
        .collect();
    let importances: Vec<Vec<f64>> = folds
        .iter()
        .filter_map(|fold| fold.feature_importances.clone())
        .collect();

    let pca_table = if components.is_empty() {
        None
    } else {
        let mut columns = feature_names.to_vec();
        columns.push("id".to_string());
        LabeledTable::new(columns, components)
    };
    let importance_table = if importances.is_empty() {
        None
    } else {
        LabeledTable::new(feature_names.to_vec(), importances)
    };

    if pca_table.is_none() && folds.iter().any(|fold| fold.pca_components.is_some()) {
        log::warn!("pca components do not match the feature names ({})", split);
    }
    if importance_table.is_none() && folds.iter().any(|fold| fold.feature_importances.is_some()) {
        log::warn!("feature importances do not match the feature names ({})", split);
    }

    (pca_table, importance_table)
}

/// A feature-based classification experiment over a devel and an optional eval split
///
/// All stores start empty and are filled by a single call to [`Experiment::run`].
/// Running again requires a new instance.
pub struct Experiment {
    config: ExperimentConfig,
    splits: BTreeMap<Split, SplitState>,

    /// Set once from the first feature vector produced or loaded
    feature_names: Option<Vec<String>>,

    /// Names after the feature vector modifier, as seen by the classifier
    model_feature_names: Option<Vec<String>>,

    predictions: BTreeMap<Role, Vec<Prediction>>,
    performances: BTreeMap<Role, PerformanceTable>,
    timings: Timings,
    status: RunStatus,
    run_id: Uuid,
    tracer: StageTracer,
}

impl Experiment {
    pub fn new(
        devel: Box<dyn DataSet>,
        eval: Option<Box<dyn DataSet>>,
        config: ExperimentConfig,
    ) -> Self {
        let mut splits = BTreeMap::new();
        splits.insert(Split::Devel, SplitState::new(devel));
        if let Some(eval) = eval {
            splits.insert(Split::Eval, SplitState::new(eval));
        }

        let run_id = Uuid::new_v4();
        let tracer = StageTracer::new(run_id, config.trace_path.clone());

        Experiment {
            config,
            splits,
            feature_names: None,
            model_feature_names: None,
            predictions: BTreeMap::new(),
            performances: BTreeMap::new(),
            timings: Timings::default(),
            status: RunStatus::Unvalidated,
            run_id,
            tracer,
        }
    }

    /// Check the configuration, then run every enabled stage on every split
    pub fn run(&mut self) -> Result<(), ExperimentError> {
        if self.status != RunStatus::Unvalidated {
            return Err(ExperimentError::AlreadyRun);
        }

        let result = self.run_stages();
        self.status = match result {
            Ok(()) => RunStatus::Done,
            Err(ref e) => {
                log::error!("experiment failed: {}", e);
                RunStatus::Failed
            }
        };
        result
    }

    fn run_stages(&mut self) -> Result<(), ExperimentError> {
        let checked = {
            let data_set = |split: Split| -> Option<&dyn DataSet> {
                self.splits.get(&split).map(|state| state.data_set.as_ref())
            };
            let devel = data_set(Split::Devel).ok_or(ConfigError::DataSetContract {
                split: Split::Devel,
                reason: "no development data set".to_string(),
            })?;
            check_config(&mut self.config, devel, data_set(Split::Eval))?
        };
        self.status = RunStatus::Checked;

        log::set_max_level(checked.verbosity.level_filter());
        let started = Local::now();
        log::info!(
            "Started on {} at {}",
            started.format("%Y-%m-%d"),
            started.format("%H:%M:%S")
        );

        if let Some(path) = &self.config.trace_path {
            let entry = TraceBuilder::stage(self.run_id, "experiment").start("Started experiment");
            TraceWriter::new(path.clone()).write(&entry)?;
        }

        let pool = WorkerPool::new(self.config.n_jobs)?;
        log::debug!("using {} worker threads", pool.threads());

        let do_clean = self.config.cleaning_procedure.is_some();
        let do_features = self.config.feature_generation_procedure.is_some();
        let do_predictions = self.config.classifier.is_some();

        let splits: Vec<Split> = self.splits.keys().copied().collect();
        for split in splits {
            if do_clean {
                self.clean(&pool, split, &checked.cleaning_params)?;
            }

            if do_features {
                if !do_clean {
                    self.load(split, LoadMode::Clean)?;
                }
                self.generate(&pool, split, &checked.feature_generation_params)?;
            } else if !do_clean {
                self.load(split, LoadMode::Features)?;
            }

            if !do_predictions {
                continue;
            }
            if !self.check_feature_store(split)? {
                log::warn!("no feature vectors, skipping prediction ({})", split);
                continue;
            }

            self.modify(split)?;
            match split {
                Split::Devel if self.config.n_splits_or_repetitions < 2 => {
                    log::warn!(
                        "cannot cross-validate with {} split, skipping validation ({})",
                        self.config.n_splits_or_repetitions,
                        split
                    );
                }
                Split::Devel => {
                    self.validate()?;
                    self.analyze(&[Role::Train, Role::Valid]);
                }
                Split::Eval => {
                    self.final_evaluate()?;
                    self.analyze(&[Role::Train, Role::Test]);
                }
            }
        }

        for stage in self.timings.stages() {
            for split in [Split::Devel, Split::Eval] {
                if let Some(elapsed) = self.timings.get(stage, split) {
                    log::debug!("{} ({}) took {:.3}s", stage, split, elapsed.as_secs_f64());
                }
            }
        }

        let finished = Local::now();
        log::info!(
            "Finished on {} at {}",
            finished.format("%Y-%m-%d"),
            finished.format("%H:%M:%S")
        );
        Ok(())
    }

    fn clean(&mut self, pool: &WorkerPool, split: Split, params: &Params) -> Result<(), ExperimentError> {
        let Some(procedure) = self.config.cleaning_procedure.as_deref() else {
            return Ok(());
        };

        log::info!("Making clean ({})", split);
        let start = Instant::now();
        self.tracer.start(Stage::Cleaning, split);

        let state = split_state_mut(&mut self.splits, split)?;
        let output = clean_split(pool, split, state.data_set.as_ref(), procedure, params)?;
        if state.info.sfreq.is_none() {
            state.info.sfreq = output.sfreq;
        }
        state.clean = output.signals;

        let elapsed = start.elapsed();
        self.timings.record(Stage::Cleaning, split, elapsed);
        self.tracer.complete(
            Stage::Cleaning,
            split,
            elapsed,
            json!({ "examples": state.clean.len() }),
        );
        Ok(())
    }

    fn load(&mut self, split: Split, mode: LoadMode) -> Result<(), ExperimentError> {
        log::info!("Loading ({})", split);
        let start = Instant::now();
        self.tracer.start(Stage::Loading, split);

        let state = split_state_mut(&mut self.splits, split)?;
        let output = load_split(split, state.data_set.as_ref(), mode, &mut self.feature_names)?;
        if state.info.sfreq.is_none() {
            state.info.sfreq = output.sfreq;
        }
        match mode {
            LoadMode::Clean => state.clean.extend(output.signals),
            LoadMode::Features => state.features.extend(output.rows),
        }
        let loaded = state.clean.len().max(state.features.len());

        let elapsed = start.elapsed();
        self.timings.record(Stage::Loading, split, elapsed);
        self.tracer.complete(Stage::Loading, split, elapsed, json!({ "examples": loaded }));
        Ok(())
    }

    fn generate(&mut self, pool: &WorkerPool, split: Split, params: &Params) -> Result<(), ExperimentError> {
        let Some(procedure) = self.config.feature_generation_procedure.as_deref() else {
            return Ok(());
        };

        log::info!("Generating features ({})", split);
        let start = Instant::now();
        self.tracer.start(Stage::FeatureGeneration, split);

        let state = split_state_mut(&mut self.splits, split)?;
        let sfreq = state
            .info
            .sfreq
            .ok_or(ExperimentError::MissingSamplingFrequency { split })?;
        let output = generate_features(
            pool,
            split,
            &state.clean,
            sfreq,
            procedure,
            params,
            &mut self.feature_names,
            state.data_set.as_mut(),
        )?;
        state.features.extend(output.rows);

        let elapsed = start.elapsed();
        self.timings.record(Stage::FeatureGeneration, split, elapsed);
        self.tracer.complete(
            Stage::FeatureGeneration,
            split,
            elapsed,
            json!({ "examples": state.features.len(), "failed": output.failed }),
        );
        Ok(())
    }

    /// Feature store and label collection must agree; false when the store is empty
    fn check_feature_store(&self, split: Split) -> Result<bool, ExperimentError> {
        let state = split_state(&self.splits, split)?;
        let labels = state.data_set.labels().len();
        if state.features.len() != labels {
            return Err(ExperimentError::LabelCountMismatch {
                split,
                features: state.features.len(),
                labels,
            });
        }
        Ok(!state.features.is_empty())
    }

    fn modify(&mut self, split: Split) -> Result<(), ExperimentError> {
        let Some(modifier) = self.config.feature_vector_modifier.as_deref() else {
            return Ok(());
        };

        log::info!("Modifying feature vectors ({})", split);
        let feature_names = self.feature_names.clone().unwrap_or_default();
        let state = split_state_mut(&mut self.splits, split)?;
        let rows = std::mem::take(&mut state.features);
        let (rows, names) =
            apply_modifier(split, modifier, state.data_set.as_ref(), rows, feature_names)?;
        state.features = rows;
        self.model_feature_names = Some(names);
        Ok(())
    }

    fn decoding_setup(&self) -> Option<DecodingSetup<'_>> {
        Some(DecodingSetup {
            classifier: self.config.classifier.as_deref()?,
            scaler: self.config.scaler.as_deref(),
            pca_thresh: self.config.pca_thresh,
            n_splits_or_repetitions: self.config.n_splits_or_repetitions,
            shuffle: self.config.shuffle_splits,
        })
    }

    fn validate(&mut self) -> Result<(), ExperimentError> {
        log::info!("Validating ({})", Split::Devel);
        let start = Instant::now();
        self.tracer.start(Stage::Validation, Split::Devel);

        let (features, labels) = unzip_rows(&split_state(&self.splits, Split::Devel)?.features);
        let output = match self.decoding_setup() {
            Some(setup) => self.config.decoder.validate(&features, &labels, &setup)?,
            None => return Ok(()),
        };
        let n_folds = output.info.len();
        self.merge(Split::Devel, output)?;

        let elapsed = start.elapsed();
        self.timings.record(Stage::Validation, Split::Devel, elapsed);
        self.tracer.complete(
            Stage::Validation,
            Split::Devel,
            elapsed,
            json!({ "folds": n_folds }),
        );
        Ok(())
    }

    fn final_evaluate(&mut self) -> Result<(), ExperimentError> {
        log::info!("Final evaluation ({})", Split::Eval);
        let start = Instant::now();
        self.tracer.start(Stage::FinalEvaluation, Split::Eval);

        let devel = &split_state(&self.splits, Split::Devel)?.features;
        if devel.is_empty() {
            return Err(ExperimentError::EmptyFeatureStore { split: Split::Devel });
        }
        let (devel_features, devel_labels) = unzip_rows(devel);
        let (eval_features, eval_labels) =
            unzip_rows(&split_state(&self.splits, Split::Eval)?.features);

        let output = match self.decoding_setup() {
            Some(setup) => self.config.decoder.final_evaluate(
                &devel_features,
                &devel_labels,
                &eval_features,
                &eval_labels,
                &setup,
            )?,
            None => return Ok(()),
        };
        let repetitions = output.info.len();
        self.merge(Split::Eval, output)?;

        let elapsed = start.elapsed();
        self.timings.record(Stage::FinalEvaluation, Split::Eval, elapsed);
        self.tracer.complete(
            Stage::FinalEvaluation,
            Split::Eval,
            elapsed,
            json!({ "repetitions": repetitions }),
        );
        Ok(())
    }

    /// Merge decoding results into the registries, labeling fold tables
    ///
    /// A role's records replace earlier ones, so final evaluation's `train`
    /// records supersede those of devel validation.
    fn merge(&mut self, split: Split, output: DecodingOutput) -> Result<(), ExperimentError> {
        let feature_names = self
            .model_feature_names
            .as_ref()
            .or(self.feature_names.as_ref())
            .cloned()
            .unwrap_or_default();

        let (pca_table, importance_table) = fold_tables(split, &output.info, &feature_names);
        let info = &mut split_state_mut(&mut self.splits, split)?.info;
        info.folds.extend(output.info);
        info.pca_components = pca_table;
        info.feature_importances = importance_table;

        self.predictions.extend(output.predictions);
        Ok(())
    }

    /// Apply every metric to the prediction records of `roles`
    fn analyze(&mut self, roles: &[Role]) {
        if self.config.metrics.is_empty() {
            return;
        }

        for role in roles {
            let Some(predictions) = self.predictions.get(role) else {
                continue;
            };
            let table = analyze_quality_of_predictions(predictions, &self.config.metrics);
            log::info!("{} performance:\n{}", role, format_means(&table));
            self.performances.insert(*role, table);
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    pub fn config(&self) -> &ExperimentConfig {
        &self.config
    }

    /// Splits this experiment holds, devel first
    pub fn splits(&self) -> impl Iterator<Item = Split> + '_ {
        self.splits.keys().copied()
    }

    pub fn data_set(&self, split: Split) -> Option<&dyn DataSet> {
        self.splits.get(&split).map(|state| state.data_set.as_ref())
    }

    /// Current label collection of a split
    pub fn labels(&self, split: Split) -> Option<&[Label]> {
        self.data_set(split).map(|data_set| data_set.labels())
    }

    pub fn clean_signals(&self, split: Split) -> Option<&[Signal]> {
        self.splits.get(&split).map(|state| state.clean.as_slice())
    }

    /// Feature store of a split, each vector paired with its label
    pub fn features(&self, split: Split) -> Option<&[FeatureRow]> {
        self.splits.get(&split).map(|state| state.features.as_slice())
    }

    pub fn info(&self, split: Split) -> Option<&SplitInfo> {
        self.splits.get(&split).map(|state| &state.info)
    }

    pub fn sfreq(&self, split: Split) -> Option<f64> {
        self.info(split)?.sfreq
    }

    pub fn feature_names(&self) -> Option<&[String]> {
        self.feature_names.as_deref()
    }

    /// Feature names after the modifier, falling back to the generated names
    pub fn model_feature_names(&self) -> Option<&[String]> {
        self.model_feature_names
            .as_deref()
            .or(self.feature_names.as_deref())
    }

    pub fn predictions(&self) -> &BTreeMap<Role, Vec<Prediction>> {
        &self.predictions
    }

    pub fn performances(&self) -> &BTreeMap<Role, PerformanceTable> {
        &self.performances
    }

    pub fn timings(&self) -> &Timings {
        &self.timings
    }

    /// Averaged importances and PCA loadings of the split that was decoded
    pub fn feature_summary(&self) -> Option<FeatureSummary> {
        let split = if self.splits.contains_key(&Split::Eval) {
            Split::Eval
        } else {
            Split::Devel
        };
        let info = self.info(split)?;
        if info.feature_importances.is_none() && info.pca_components.is_none() {
            return None;
        }

        Some(summarize_features(
            self.model_feature_names()?,
            info.feature_importances.as_ref(),
            info.pca_components.as_ref(),
        ))
    }
}
