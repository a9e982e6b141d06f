// End-to-end experiment scenarios
// In-memory data sets, deterministic procedures, and a capturing logger

use serde_json::json;
use std::sync::{Mutex, Once};
use std::thread::{self, ThreadId};
use std::time::Duration;

use brainfeatures::decoding::Role;
use brainfeatures::experiment::{ConfigError, Stage};
use brainfeatures::models::{NearestCentroid, PcaThreshold};
use brainfeatures::procedures::{clip_and_demean, ProcedureError};
use brainfeatures::{
    DataSet, Experiment, ExperimentConfig, ExperimentError, FeatureRow, FeatureVector,
    InMemoryDataSet, Params, RunStatus, Signal, Split,
};

static RECORDS: Mutex<Vec<(ThreadId, log::Level, String)>> = Mutex::new(Vec::new());

struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata) -> bool {
        true
    }

    fn log(&self, record: &log::Record) {
        RECORDS.lock().unwrap().push((
            thread::current().id(),
            record.level(),
            record.args().to_string(),
        ));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;

fn install_logger() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        log::set_logger(&LOGGER).unwrap();
        log::set_max_level(log::LevelFilter::Trace);
    });
}

/// Warnings logged from the calling test's thread
fn warnings() -> Vec<String> {
    let id = thread::current().id();
    RECORDS
        .lock()
        .unwrap()
        .iter()
        .filter(|(thread, level, _)| *thread == id && *level == log::Level::Warn)
        .map(|(_, _, message)| message.clone())
        .collect()
}

const SFREQ: f64 = 128.0;

/// Two-channel tone; class 0 sits in theta, class 1 in beta
fn tone(label: u32, index: usize) -> Signal {
    let freq = if label == 0 { 6.0 } else { 20.0 };
    let phase = index as f64 * 0.3;
    let channel = |gain: f64| {
        (0..256)
            .map(|t| {
                let time = t as f64 / SFREQ;
                (gain * (2.0 * std::f64::consts::PI * freq * time + phase).sin()) as f32
            })
            .collect::<Vec<f32>>()
    };
    Signal::new(
        vec!["Fz".to_string(), "Cz".to_string()],
        vec![channel(50.0), channel(30.0)],
    )
}

fn tone_set(n: usize) -> InMemoryDataSet {
    let labels: Vec<u32> = (0..n as u32).map(|i| i % 2).collect();
    let signals = labels
        .iter()
        .enumerate()
        .map(|(i, &label)| tone(label, i))
        .collect();
    InMemoryDataSet::from_signals(signals, SFREQ, labels).unwrap()
}

/// Signals whose first sample is their position, labels 100 + position
fn marked_set(n: usize) -> InMemoryDataSet {
    let signals = (0..n)
        .map(|i| Signal::from_channels(vec![vec![i as f32; 4]]))
        .collect();
    let labels = (0..n as u32).map(|i| 100 + i).collect();
    InMemoryDataSet::from_signals(signals, SFREQ, labels).unwrap()
}

fn marker(signal: &Signal) -> usize {
    signal.data[0][0] as usize
}

fn marker_feature(signal: &Signal) -> FeatureVector {
    FeatureVector::new(vec!["marker".to_string()], vec![marker(signal) as f64])
}

fn cleaning_config() -> ExperimentConfig {
    ExperimentConfig {
        cleaning_procedure: Some(Box::new(clip_and_demean)),
        cleaning_params: Some(json!({ "clip_value": 100.0 })),
        ..ExperimentConfig::default()
    }
}

#[test]
fn test_cross_validation_on_devel_only() {
    install_logger();
    let mut experiment = Experiment::new(Box::new(tone_set(10)), None, cleaning_config());
    experiment.run().unwrap();

    assert_eq!(experiment.status(), RunStatus::Done);
    assert_eq!(experiment.clean_signals(Split::Devel).unwrap().len(), 10);
    assert_eq!(experiment.features(Split::Devel).unwrap().len(), 10);
    assert_eq!(experiment.labels(Split::Devel).unwrap().len(), 10);
    assert_eq!(experiment.feature_names().unwrap().len(), 14);
    assert_eq!(experiment.feature_names().unwrap()[0], "Fz_delta");

    let predictions = experiment.predictions();
    assert_eq!(predictions.keys().copied().collect::<Vec<_>>(), vec![Role::Train, Role::Valid]);
    assert_eq!(predictions[&Role::Valid].len(), 5);

    let performances = experiment.performances();
    assert!(performances.contains_key(&Role::Train));
    let valid = &performances[&Role::Valid];
    assert_eq!(valid.columns, vec!["accuracy".to_string()]);
    assert_eq!(valid.n_rows(), 5);
    assert!(valid.mean()[0].1 >= 0.8);

    let timings = experiment.timings();
    for stage in [Stage::Cleaning, Stage::FeatureGeneration, Stage::Validation] {
        assert!(timings.get(stage, Split::Devel).is_some());
    }
    assert!(timings.get(Stage::Loading, Split::Devel).is_none());
}

#[test]
fn test_final_evaluation_with_eval_set() {
    install_logger();
    let config = ExperimentConfig {
        n_splits_or_repetitions: 3,
        ..cleaning_config()
    };
    let mut experiment =
        Experiment::new(Box::new(tone_set(10)), Some(Box::new(tone_set(4))), config);
    experiment.run().unwrap();

    assert_eq!(experiment.features(Split::Eval).unwrap().len(), 4);
    assert_eq!(experiment.features(Split::Devel).unwrap().len(), 10);

    let predictions = experiment.predictions();
    assert_eq!(
        predictions.keys().copied().collect::<Vec<_>>(),
        vec![Role::Train, Role::Valid, Role::Test]
    );
    assert_eq!(predictions[&Role::Valid].len(), 3);
    assert_eq!(predictions[&Role::Test].len(), 3);
    assert_eq!(predictions[&Role::Test][0].y_true, vec![0, 1, 0, 1]);

    let performances = experiment.performances();
    for role in [Role::Train, Role::Valid, Role::Test] {
        assert_eq!(performances[&role].n_rows(), 3);
    }

    assert_eq!(experiment.info(Split::Devel).unwrap().folds.len(), 3);
    assert_eq!(experiment.info(Split::Eval).unwrap().folds.len(), 3);
    let timings = experiment.timings();
    assert!(timings.get(Stage::Validation, Split::Devel).is_some());
    assert!(timings.get(Stage::FinalEvaluation, Split::Eval).is_some());
}

#[test]
fn test_malformed_generation_params_fail_before_any_stage() {
    install_logger();
    let config = ExperimentConfig {
        feature_generation_params: Some(json!({ "max_freq": "forty" })),
        ..ExperimentConfig::default()
    };
    let mut experiment = Experiment::new(Box::new(tone_set(6)), None, config);

    assert!(matches!(
        experiment.run(),
        Err(ExperimentError::Config(ConfigError::InvalidParams {
            which: "feature_generation_params",
            ..
        }))
    ));
    assert_eq!(experiment.status(), RunStatus::Failed);
    assert_eq!(experiment.labels(Split::Devel).unwrap().len(), 6);
    assert!(experiment.features(Split::Devel).unwrap().is_empty());
    assert!(experiment.timings().get(Stage::FeatureGeneration, Split::Devel).is_none());
    assert!(!warnings().iter().any(|w| w.contains("removed example")));
}

#[test]
fn test_failed_example_drops_its_label() {
    install_logger();
    let skip_third = |signal: &Signal, _sfreq: f64, _params: &Params| {
        if marker(signal) == 2 {
            None
        } else {
            Some(marker_feature(signal))
        }
    };
    let config = ExperimentConfig {
        classifier: None,
        feature_generation_procedure: Some(Box::new(skip_third)),
        ..ExperimentConfig::default()
    };

    let mut experiment = Experiment::new(Box::new(marked_set(5)), None, config);
    experiment.run().unwrap();

    let features = experiment.features(Split::Devel).unwrap();
    assert_eq!(features.len(), 4);
    assert_eq!(experiment.labels(Split::Devel).unwrap(), &[100, 101, 103, 104]);
    assert!(features.iter().all(|row| row.values[0] as u32 + 100 == row.label));
    assert!(warnings()
        .iter()
        .any(|message| message == "removed example 2 from labels (devel)"));
}

#[test]
fn test_negative_n_jobs_rejected() {
    install_logger();
    let config = ExperimentConfig {
        n_jobs: -2,
        ..ExperimentConfig::default()
    };
    let mut experiment = Experiment::new(Box::new(tone_set(6)), None, config);

    assert!(matches!(
        experiment.run(),
        Err(ExperimentError::Config(ConfigError::InvalidNJobs(-2)))
    ));
    assert!(experiment.features(Split::Devel).unwrap().is_empty());
}

#[test]
fn test_pca_without_scaler_warns_and_runs() {
    install_logger();
    let config = ExperimentConfig {
        pca_thresh: Some(PcaThreshold::Components(2)),
        scaler: None,
        ..ExperimentConfig::default()
    };
    let mut experiment = Experiment::new(Box::new(tone_set(10)), None, config);
    experiment.run().unwrap();

    assert!(warnings()
        .iter()
        .any(|message| message.contains("pca on unscaled features")));

    let info = experiment.info(Split::Devel).unwrap();
    let components = info.pca_components.as_ref().unwrap();
    assert_eq!(components.columns.last().map(String::as_str), Some("id"));
    assert_eq!(components.columns.len(), 15);
    assert_eq!(components.n_rows(), 5 * 2);
    assert_eq!(components.column("id").unwrap()[9], 4.0);
    assert!(info.feature_importances.is_none());
    assert!(experiment.feature_summary().unwrap().mean_abs_loadings.is_some());
}

#[test]
fn test_nothing_to_do_rejected() {
    install_logger();
    let config = ExperimentConfig {
        classifier: None,
        feature_generation_procedure: None,
        ..ExperimentConfig::default()
    };
    let mut experiment = Experiment::new(Box::new(tone_set(4)), None, config);

    assert!(matches!(
        experiment.run(),
        Err(ExperimentError::Config(ConfigError::NothingToDo))
    ));
}

#[test]
fn test_single_fold_needs_eval_set() {
    install_logger();
    let single = || ExperimentConfig {
        n_splits_or_repetitions: 1,
        ..ExperimentConfig::default()
    };

    let mut without_eval = Experiment::new(Box::new(tone_set(6)), None, single());
    assert!(matches!(
        without_eval.run(),
        Err(ExperimentError::Config(ConfigError::TooFewSplits(1)))
    ));

    let mut with_eval = Experiment::new(Box::new(tone_set(6)), Some(Box::new(tone_set(2))), single());
    with_eval.run().unwrap();
    assert_eq!(with_eval.predictions()[&Role::Test].len(), 1);
    assert!(!with_eval.predictions().contains_key(&Role::Valid));
    assert!(with_eval.timings().get(Stage::Validation, Split::Devel).is_none());
    assert!(warnings().iter().any(|w| w.contains("skipping validation (devel)")));
}

#[test]
fn test_parallel_cleaning_preserves_order() {
    install_logger();
    let slow_first = |signal: &Signal, sfreq: f64, _params: &Params| -> Result<(Signal, f64), ProcedureError> {
        let delay = [80, 60, 40, 0, 20][marker(signal)];
        thread::sleep(Duration::from_millis(delay));
        Ok((signal.clone(), sfreq))
    };
    let config = ExperimentConfig {
        classifier: None,
        n_jobs: 5,
        cleaning_procedure: Some(Box::new(slow_first)),
        feature_generation_procedure: None,
        ..ExperimentConfig::default()
    };

    let mut experiment = Experiment::new(Box::new(marked_set(5)), None, config);
    experiment.run().unwrap();

    let order: Vec<usize> = experiment
        .clean_signals(Split::Devel)
        .unwrap()
        .iter()
        .map(marker)
        .collect();
    assert_eq!(order, vec![0, 1, 2, 3, 4]);
    assert_eq!(experiment.sfreq(Split::Devel), Some(SFREQ));
}

#[test]
fn test_features_and_labels_stay_aligned() {
    install_logger();
    let failure_masks: [&[usize]; 4] = [&[], &[0], &[1, 2, 5], &[0, 3, 6, 7]];

    for failing in failure_masks {
        let failing = failing.to_vec();
        let generator = move |signal: &Signal, _sfreq: f64, _params: &Params| {
            if failing.contains(&marker(signal)) {
                None
            } else {
                Some(marker_feature(signal))
            }
        };
        let config = ExperimentConfig {
            classifier: None,
            n_jobs: 3,
            feature_generation_procedure: Some(Box::new(generator)),
            ..ExperimentConfig::default()
        };

        let mut experiment = Experiment::new(Box::new(marked_set(8)), None, config);
        experiment.run().unwrap();

        let features = experiment.features(Split::Devel).unwrap();
        let labels = experiment.labels(Split::Devel).unwrap();
        assert_eq!(features.len(), labels.len());
        for (row, &label) in features.iter().zip(labels) {
            assert_eq!(row.label, label);
            assert_eq!(row.values[0] as u32 + 100, label);
        }
    }
}

#[test]
fn test_feature_names_fixed_by_first_vector() {
    install_logger();
    let renaming = |signal: &Signal, _sfreq: f64, _params: &Params| {
        let name = format!("feature_{}", marker(signal));
        Some(FeatureVector::new(vec![name], vec![1.0]))
    };
    let config = ExperimentConfig {
        classifier: None,
        feature_generation_procedure: Some(Box::new(renaming)),
        ..ExperimentConfig::default()
    };

    let mut experiment = Experiment::new(Box::new(marked_set(4)), None, config);
    experiment.run().unwrap();
    assert_eq!(experiment.feature_names().unwrap(), &["feature_0"]);
}

#[test]
fn test_feature_width_mismatch_aborts() {
    install_logger();
    let growing = |signal: &Signal, _sfreq: f64, _params: &Params| {
        let width = 1 + marker(signal) % 2;
        Some(FeatureVector::new(
            (0..width).map(|i| format!("f{}", i)).collect(),
            vec![0.5; width],
        ))
    };
    let config = ExperimentConfig {
        classifier: None,
        feature_generation_procedure: Some(Box::new(growing)),
        ..ExperimentConfig::default()
    };

    let mut experiment = Experiment::new(Box::new(marked_set(4)), None, config);
    assert!(matches!(
        experiment.run(),
        Err(ExperimentError::FeatureWidthMismatch {
            split: Split::Devel,
            expected: 1,
            found: 2
        })
    ));
    assert_eq!(experiment.status(), RunStatus::Failed);
}

#[test]
fn test_modifier_selects_features_for_the_classifier() {
    install_logger();
    let keep_first_band = |_data_set: &dyn DataSet,
                           rows: Vec<FeatureRow>,
                           names: Vec<String>|
     -> Result<(Vec<FeatureRow>, Vec<String>), ProcedureError> {
        let rows = rows
            .into_iter()
            .map(|row| FeatureRow::new(row.values[..5].to_vec(), row.label))
            .collect();
        Ok((rows, names[..5].to_vec()))
    };
    let config = ExperimentConfig {
        classifier: Some(Box::new(NearestCentroid::new())),
        feature_vector_modifier: Some(Box::new(keep_first_band)),
        ..ExperimentConfig::default()
    };

    let mut experiment = Experiment::new(Box::new(tone_set(10)), None, config);
    experiment.run().unwrap();

    assert_eq!(experiment.feature_names().unwrap().len(), 14);
    assert_eq!(experiment.model_feature_names().unwrap().len(), 5);
    assert_eq!(experiment.features(Split::Devel).unwrap()[0].width(), 5);

    let importances = experiment
        .info(Split::Devel)
        .unwrap()
        .feature_importances
        .as_ref()
        .unwrap();
    assert_eq!(importances.columns[0], "Fz_delta");
    assert_eq!(importances.columns.len(), 5);
}

#[test]
fn test_loaded_features_skip_generation() {
    install_logger();
    let names = vec!["a".to_string(), "b".to_string()];
    let vectors = (0..6)
        .map(|i| FeatureVector::new(names.clone(), vec![(i % 2) as f64 * 5.0, i as f64 * 0.1]))
        .collect();
    let labels = (0..6).map(|i| i % 2).collect();
    let data_set = InMemoryDataSet::from_features(vectors, SFREQ, labels).unwrap();

    let config = ExperimentConfig {
        feature_generation_procedure: None,
        n_splits_or_repetitions: 3,
        ..ExperimentConfig::default()
    };
    let mut experiment = Experiment::new(Box::new(data_set), None, config);
    experiment.run().unwrap();

    assert_eq!(experiment.feature_names().unwrap(), names.as_slice());
    assert!(experiment.clean_signals(Split::Devel).unwrap().is_empty());
    assert_eq!(experiment.performances()[&Role::Valid].n_rows(), 3);
    assert!(experiment.timings().get(Stage::Loading, Split::Devel).is_some());
}
