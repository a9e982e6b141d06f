// Experiment module
// Configuration, per-split state, and the orchestrator

pub mod config;
pub mod error;
pub mod runner;
pub mod settings;
pub mod state;

pub use config::{check_config, CheckedConfig, ConfigError, ExperimentConfig, Verbosity};
pub use error::ExperimentError;
pub use runner::Experiment;
pub use settings::{ClassifierKind, ExperimentSettings, SettingsError};
pub use state::{RunStatus, Split, SplitInfo, SplitState, Stage, Timings};
