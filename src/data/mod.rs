// Data module
// Example payloads, the data set contract, and built-in data set adapters

pub mod dataset;
pub mod types;
pub mod wav;

pub use dataset::{DataSet, DataSetError, InMemoryDataSet};
pub use types::{unzip_rows, Example, FeatureRow, FeatureVector, Label, Payload, Signal};
pub use wav::{read_wav, WavDataSet};
