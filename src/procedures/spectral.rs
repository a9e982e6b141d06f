// Spectral feature generation
// Relative band powers, spectral centroid, and zero-crossing rate per channel

use realfft::RealFftPlanner;
use serde_json::{json, Value};

use crate::data::{FeatureVector, Signal};
use crate::procedures::{param_f64, param_usize, FeatureGenerationProcedure, Params, ProcedureError};

/// Frequency bands (name, low Hz, high Hz); the last band ends at `max_freq`
const BANDS: [(&str, f64, f64); 5] = [
    ("delta", 0.5, 4.0),
    ("theta", 4.0, 8.0),
    ("alpha", 8.0, 12.0),
    ("beta", 12.0, 30.0),
    ("gamma", 30.0, f64::INFINITY),
];

/// Parameters used when none are configured
pub fn default_feature_generation_params() -> Value {
    json!({
        "max_freq": 45.0,
        "min_samples": 2,
    })
}

/// Typed parameters of [`band_power_features`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BandPowerParams {
    /// Upper edge of the analysed range in Hz
    pub max_freq: f64,

    /// Shorter signals fail generation; at least 2
    pub min_samples: usize,
}

impl Default for BandPowerParams {
    fn default() -> Self {
        BandPowerParams {
            max_freq: 45.0,
            min_samples: 2,
        }
    }
}

impl BandPowerParams {
    pub fn from_params(params: &Params) -> Result<Self, ProcedureError> {
        let defaults = BandPowerParams::default();
        let max_freq = param_f64(params, "max_freq", defaults.max_freq)?;
        if max_freq <= BANDS[0].1 || !max_freq.is_finite() {
            return Err(ProcedureError::InvalidParam {
                name: "max_freq".to_string(),
                reason: format!("has to be a finite frequency above {} Hz, got {}", BANDS[0].1, max_freq),
            });
        }
        let min_samples = param_usize(params, "min_samples", defaults.min_samples)?.max(2);

        Ok(BandPowerParams {
            max_freq,
            min_samples,
        })
    }
}

/// Built-in feature generation procedure backed by [`band_power_features`]
#[derive(Debug, Clone, Copy, Default)]
pub struct BandPowerFeatures;

impl FeatureGenerationProcedure for BandPowerFeatures {
    fn check_params(&self, params: &Params) -> Result<(), ProcedureError> {
        BandPowerParams::from_params(params).map(|_| ())
    }

    fn generate(&self, signal: &Signal, sfreq: f64, params: &Params) -> Option<FeatureVector> {
        // Rejected params never reach a run; check_config calls check_params first
        let params = BandPowerParams::from_params(params).ok()?;
        band_power_features(signal, sfreq, &params)
    }
}

/// Generate band power features for every channel of a clean signal
///
/// Columns are named `<channel>_<feature>`. Returns `None` when the signal
/// is shorter than `min_samples` or carries no power in the analysed range.
pub fn band_power_features(
    signal: &Signal,
    sfreq: f64,
    params: &BandPowerParams,
) -> Option<FeatureVector> {
    let BandPowerParams {
        max_freq,
        min_samples,
    } = *params;

    if signal.n_channels() == 0 || signal.n_samples() < min_samples.max(2) || sfreq <= 0.0 {
        return None;
    }

    let mut names = Vec::new();
    let mut values = Vec::new();

    for (channel, samples) in signal.channels.iter().zip(signal.data.iter()) {
        let spectrum = power_spectrum(samples);
        let bin_width = sfreq / samples.len() as f64;

        let total = band_power(&spectrum, bin_width, BANDS[0].1, max_freq);
        if total <= 0.0 || !total.is_finite() {
            return None;
        }

        for (band, low, high) in BANDS.iter() {
            let power = band_power(&spectrum, bin_width, *low, high.min(max_freq));
            names.push(format!("{}_{}", channel, band));
            values.push(power / total);
        }

        names.push(format!("{}_centroid", channel));
        values.push(spectral_centroid(&spectrum, bin_width, max_freq));

        names.push(format!("{}_zcr", channel));
        values.push(calculate_zcr(samples));
    }

    Some(FeatureVector::new(names, values))
}

/// Hann-windowed power spectrum of one channel
fn power_spectrum(samples: &[f32]) -> Vec<f64> {
    let mut windowed = samples.to_vec();
    apply_hann_window(&mut windowed);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(windowed.len());
    let mut spectrum = fft.make_output_vec();

    if fft.process(&mut windowed, &mut spectrum).is_err() {
        return Vec::new();
    }

    spectrum.iter().map(|c| c.norm_sqr() as f64).collect()
}

fn apply_hann_window(samples: &mut [f32]) {
    let n = samples.len();
    if n == 0 {
        return;
    }

    for (i, sample) in samples.iter_mut().enumerate() {
        let window_val = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos());
        *sample *= window_val;
    }
}

/// Sum of power in bins with low <= frequency < high
fn band_power(spectrum: &[f64], bin_width: f64, low: f64, high: f64) -> f64 {
    spectrum
        .iter()
        .enumerate()
        .filter(|(i, _)| {
            let frequency = *i as f64 * bin_width;
            frequency >= low && frequency < high
        })
        .map(|(_, power)| power)
        .sum()
}

/// Power-weighted mean frequency below `max_freq`, in Hz
fn spectral_centroid(spectrum: &[f64], bin_width: f64, max_freq: f64) -> f64 {
    let mut weighted_sum = 0.0;
    let mut total = 0.0;

    for (i, &power) in spectrum.iter().enumerate() {
        let frequency = i as f64 * bin_width;
        if frequency >= max_freq {
            break;
        }
        weighted_sum += frequency * power;
        total += power;
    }

    if total > 0.0 {
        weighted_sum / total
    } else {
        0.0
    }
}

/// Rate of sign changes per sample
fn calculate_zcr(samples: &[f32]) -> f64 {
    if samples.len() < 2 {
        return 0.0;
    }

    let crossings = samples
        .windows(2)
        .filter(|pair| (pair[0] >= 0.0) != (pair[1] >= 0.0))
        .count();

    crossings as f64 / (samples.len() - 1) as f64
}
