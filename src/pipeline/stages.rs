// Stage executors
// Cleaning, loading, feature generation, and feature vector modification for one split

use crate::data::{DataSet, DataSetError, Example, FeatureRow, Payload, Signal};
use crate::experiment::{ExperimentError, Split};
use crate::pipeline::pool::WorkerPool;
use crate::procedures::{CleaningProcedure, FeatureGenerationProcedure, FeatureVectorModifier, Params};

/// Cleaned signals of one split
#[derive(Debug, Clone, Default)]
pub struct CleanOutput {
    /// Index-aligned with the data set's examples
    pub signals: Vec<Signal>,

    /// Sampling frequency of the first example
    pub sfreq: Option<f64>,
}

/// Which skipped stage the loader stands in for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadMode {
    /// Items are already-clean signals
    Clean,

    /// Items are precomputed feature vectors
    Features,
}

/// Items read directly from a data set
#[derive(Debug, Clone, Default)]
pub struct LoadOutput {
    pub sfreq: Option<f64>,

    /// Filled in `LoadMode::Clean`
    pub signals: Vec<Signal>,

    /// Filled in `LoadMode::Features`
    pub rows: Vec<FeatureRow>,
}

/// Feature generation result of one split
#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub rows: Vec<FeatureRow>,

    /// Original indices of the examples whose generation failed
    pub failed: Vec<usize>,
}

fn signal_payload(index: usize, example: Example) -> Result<(Signal, f64), DataSetError> {
    match example.payload {
        Payload::Signal(signal) => Ok((signal, example.sfreq)),
        other => Err(DataSetError::PayloadMismatch {
            index,
            expected: "signal",
            found: other.kind(),
        }),
    }
}

fn check_width(split: Split, feature_names: &[String], width: usize) -> Result<(), ExperimentError> {
    if width != feature_names.len() {
        return Err(ExperimentError::FeatureWidthMismatch {
            split,
            expected: feature_names.len(),
            found: width,
        });
    }
    Ok(())
}

/// Clean every example of a split in parallel
///
/// Examples are resolved inside the workers. The first failure, in data set
/// order, aborts the stage.
pub fn clean_split(
    pool: &WorkerPool,
    split: Split,
    data_set: &dyn DataSet,
    procedure: &dyn CleaningProcedure,
    params: &Params,
) -> Result<CleanOutput, ExperimentError> {
    let indices: Vec<usize> = (0..data_set.len()).collect();

    let results = pool.map_ordered(&indices, |_, &index| {
        let (signal, sfreq) = data_set
            .get(index)
            .and_then(|example| signal_payload(index, example))
            .map_err(ExperimentError::data_set(split))?;

        procedure
            .clean(&signal, sfreq, params)
            .map_err(|source| ExperimentError::Cleaning {
                split,
                index,
                source,
            })
    });

    let mut output = CleanOutput {
        signals: Vec::with_capacity(results.len()),
        sfreq: None,
    };
    for result in results {
        let (signal, sfreq) = result?;
        output.sfreq.get_or_insert(sfreq);
        output.signals.push(signal);
    }

    log::debug!("cleaned {} examples ({})", output.signals.len(), split);
    Ok(output)
}

/// Read a split's items as they are, bypassing a skipped stage
///
/// In `LoadMode::Features` the first item's column names seed
/// `feature_names` when unset, and every item must match their count.
pub fn load_split(
    split: Split,
    data_set: &dyn DataSet,
    mode: LoadMode,
    feature_names: &mut Option<Vec<String>>,
) -> Result<LoadOutput, ExperimentError> {
    let labels = data_set.labels();
    if labels.len() != data_set.len() {
        return Err(ExperimentError::LabelCountMismatch {
            split,
            features: data_set.len(),
            labels: labels.len(),
        });
    }

    let mut output = LoadOutput::default();
    for (index, &label) in labels.iter().enumerate() {
        let example = data_set.get(index).map_err(ExperimentError::data_set(split))?;
        output.sfreq.get_or_insert(example.sfreq);

        match (mode, example.payload) {
            (LoadMode::Clean, Payload::Signal(signal)) => output.signals.push(signal),
            (LoadMode::Features, Payload::Features(vector)) => {
                let (names, values) = vector.into_parts();
                let names = feature_names.get_or_insert(names);
                check_width(split, names, values.len())?;
                output.rows.push(FeatureRow::new(values, label));
            }
            (mode, payload) => {
                return Err(ExperimentError::DataSet {
                    split,
                    source: DataSetError::PayloadMismatch {
                        index,
                        expected: match mode {
                            LoadMode::Clean => "signal",
                            LoadMode::Features => "features",
                        },
                        found: payload.kind(),
                    },
                })
            }
        }
    }

    Ok(output)
}

/// Generate a feature vector per clean signal in parallel
///
/// A `None` or empty result drops the example: its label is removed from the
/// data set's label collection and a warning is logged. The first successful
/// vector seeds `feature_names` when unset; later vectors must match it.
#[allow(clippy::too_many_arguments)]
pub fn generate_features(
    pool: &WorkerPool,
    split: Split,
    signals: &[Signal],
    sfreq: f64,
    procedure: &dyn FeatureGenerationProcedure,
    params: &Params,
    feature_names: &mut Option<Vec<String>>,
    data_set: &mut dyn DataSet,
) -> Result<GenerationOutput, ExperimentError> {
    let labels = data_set.labels().to_vec();
    if labels.len() != signals.len() {
        return Err(ExperimentError::LabelCountMismatch {
            split,
            features: signals.len(),
            labels: labels.len(),
        });
    }

    let results = pool.map_ordered(signals, |_, signal| procedure.generate(signal, sfreq, params));

    let mut output = GenerationOutput::default();
    for (index, (result, label)) in results.into_iter().zip(labels).enumerate() {
        match result.filter(|vector| !vector.is_empty()) {
            Some(vector) => {
                let (names, values) = vector.into_parts();
                let names = feature_names.get_or_insert(names);
                check_width(split, names, values.len())?;
                output.rows.push(FeatureRow::new(values, label));
            }
            None => {
                log::warn!("removed example {} from labels ({})", index, split);
                output.failed.push(index);
            }
        }
    }

    for &index in output.failed.iter().rev() {
        data_set
            .remove_label(index)
            .map_err(ExperimentError::data_set(split))?;
    }

    if output.rows.len() != data_set.labels().len() {
        return Err(ExperimentError::LabelCountMismatch {
            split,
            features: output.rows.len(),
            labels: data_set.labels().len(),
        });
    }

    Ok(output)
}

/// Run the feature vector modifier and check its replacement store
pub fn apply_modifier(
    split: Split,
    modifier: &dyn FeatureVectorModifier,
    data_set: &dyn DataSet,
    rows: Vec<FeatureRow>,
    feature_names: Vec<String>,
) -> Result<(Vec<FeatureRow>, Vec<String>), ExperimentError> {
    let (rows, feature_names) = modifier
        .modify(data_set, rows, feature_names)
        .map_err(|source| ExperimentError::Modifier { split, source })?;

    let first = rows
        .first()
        .ok_or(ExperimentError::EmptyFeatureStore { split })?;
    check_width(split, &feature_names, first.width())?;

    Ok((rows, feature_names))
}
