// Brainfeatures - Feature-based biosignal classification experiments
// Module declarations

pub mod analysis;
pub mod data;
pub mod decoding;
pub mod experiment;
pub mod models;
pub mod pipeline;
pub mod procedures;

pub use data::{DataSet, FeatureRow, FeatureVector, InMemoryDataSet, Label, Signal, WavDataSet};
pub use decoding::{CrossValidator, Decoder, Prediction, Role};
pub use experiment::{
    Experiment, ExperimentConfig, ExperimentError, ExperimentSettings, RunStatus, Split,
};
pub use procedures::{
    CleaningProcedure, FeatureGenerationProcedure, FeatureVectorModifier, Params,
};
