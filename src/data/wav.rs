// WAV recording data set
// Labeled recordings laid out as <root>/<class-name>/<file>.wav, decoded lazily per example

use hound::{SampleFormat, WavReader};
use std::path::{Path, PathBuf};

use crate::data::dataset::{DataSet, DataSetError};
use crate::data::types::{Example, Label, Payload, Signal};

/// Data set backed by a directory of WAV recordings
///
/// Every sub-directory of the root is one class. Class names are sorted
/// and numbered from 0, so the label of a recording is the index of its
/// directory name in `class_names()`.
#[derive(Debug, Clone)]
pub struct WavDataSet {
    root: PathBuf,
    files: Vec<PathBuf>,
    file_labels: Vec<Label>,
    labels: Vec<Label>,
    class_names: Vec<String>,
}

impl WavDataSet {
    /// Scan a root directory for labeled recordings
    pub fn open(root: &Path) -> Result<Self, DataSetError> {
        let mut class_dirs: Vec<PathBuf> = std::fs::read_dir(root)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.is_dir())
            .collect();
        class_dirs.sort();

        if class_dirs.is_empty() {
            return Err(DataSetError::Invalid(format!(
                "no class directories under {}",
                root.display()
            )));
        }

        let mut class_names = Vec::with_capacity(class_dirs.len());
        let mut files = Vec::new();
        let mut file_labels = Vec::new();

        for (label, dir) in class_dirs.iter().enumerate() {
            let name = dir
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            class_names.push(name);

            let mut recordings: Vec<PathBuf> = std::fs::read_dir(dir)?
                .filter_map(|entry| entry.ok().map(|e| e.path()))
                .filter(|path| {
                    path.extension()
                        .map(|ext| ext.eq_ignore_ascii_case("wav"))
                        .unwrap_or(false)
                })
                .collect();
            recordings.sort();

            for path in recordings {
                files.push(path);
                file_labels.push(label as Label);
            }
        }

        log::info!(
            "Opened {} recordings in {} classes from {}",
            files.len(),
            class_names.len(),
            root.display()
        );

        Ok(WavDataSet {
            root: root.to_path_buf(),
            labels: file_labels.clone(),
            files,
            file_labels,
            class_names,
        })
    }

    /// Class names ordered by label
    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    /// Path of the recording at `index`
    pub fn path(&self, index: usize) -> Option<&Path> {
        self.files.get(index).map(PathBuf::as_path)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl DataSet for WavDataSet {
    fn len(&self) -> usize {
        self.files.len()
    }

    fn get(&self, index: usize) -> Result<Example, DataSetError> {
        let path = self.files.get(index).ok_or(DataSetError::IndexOutOfRange {
            index,
            len: self.files.len(),
        })?;

        let (signal, sfreq) = read_wav(path)?;

        Ok(Example {
            payload: Payload::Signal(signal),
            sfreq,
            label: self.file_labels[index],
        })
    }

    fn labels(&self) -> &[Label] {
        &self.labels
    }

    fn remove_label(&mut self, index: usize) -> Result<Label, DataSetError> {
        if index >= self.labels.len() {
            return Err(DataSetError::IndexOutOfRange {
                index,
                len: self.labels.len(),
            });
        }
        Ok(self.labels.remove(index))
    }
}

/// Read a WAV file into a multi-channel signal and its sampling frequency
/// Samples are normalized to f32 in range [-1.0, 1.0]
pub fn read_wav(path: &Path) -> Result<(Signal, f64), DataSetError> {
    let mut reader = WavReader::open(path)?;

    let spec = reader.spec();
    let channels = spec.channels as usize;

    if channels == 0 {
        return Err(DataSetError::UnsupportedFormat("zero channels".to_string()));
    }

    let interleaved: Vec<f32> = match (spec.sample_format, spec.bits_per_sample) {
        (SampleFormat::Int, 8) => reader
            .samples::<i8>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 128.0)
            .collect(),
        (SampleFormat::Int, 16) => reader
            .samples::<i16>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 32768.0)
            .collect(),
        (SampleFormat::Int, 24) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 8388608.0)
            .collect(),
        (SampleFormat::Int, 32) => reader
            .samples::<i32>()
            .collect::<Result<Vec<_>, _>>()?
            .into_iter()
            .map(|s| s as f32 / 2147483648.0)
            .collect(),
        (SampleFormat::Float, 32) => reader.samples::<f32>().collect::<Result<Vec<_>, _>>()?,
        (format, bits) => {
            return Err(DataSetError::UnsupportedFormat(format!(
                "{:?} {}-bit audio",
                format, bits
            )));
        }
    };

    Ok((deinterleave(&interleaved, channels), spec.sample_rate as f64))
}

/// Split interleaved frames [c0, c1, c0, c1, ...] into per-channel vectors
fn deinterleave(samples: &[f32], channels: usize) -> Signal {
    let frame_count = samples.len() / channels;
    let mut data = vec![Vec::with_capacity(frame_count); channels];

    for frame in samples.chunks_exact(channels) {
        for (ch, &sample) in frame.iter().enumerate() {
            data[ch].push(sample);
        }
    }

    Signal::from_channels(data)
}
