// Built-in cleaning procedure
// Removes per-channel DC offset and clips amplitude outliers

use crate::data::Signal;
use crate::procedures::{param_f64, CleaningProcedure, Params, ProcedureError};

/// Default clip value in signal units
pub const DEFAULT_CLIP_VALUE: f64 = 800.0;

fn clip_value(params: &Params) -> Result<f64, ProcedureError> {
    let clip = param_f64(params, "clip_value", DEFAULT_CLIP_VALUE)?;
    if clip <= 0.0 {
        return Err(ProcedureError::InvalidParam {
            name: "clip_value".to_string(),
            reason: format!("has to be positive, got {}", clip),
        });
    }
    Ok(clip)
}

/// Built-in cleaning procedure backed by [`clip_and_demean`]
#[derive(Debug, Clone, Copy, Default)]
pub struct ClipAndDemean;

impl CleaningProcedure for ClipAndDemean {
    fn check_params(&self, params: &Params) -> Result<(), ProcedureError> {
        clip_value(params).map(|_| ())
    }

    fn clean(
        &self,
        signal: &Signal,
        sfreq: f64,
        params: &Params,
    ) -> Result<(Signal, f64), ProcedureError> {
        clip_and_demean(signal, sfreq, params)
    }
}

/// Subtract each channel's mean, then clip samples to ±`clip_value`
///
/// Params: `clip_value` (default 800.0, must be positive).
/// The sampling frequency is passed through unchanged.
pub fn clip_and_demean(
    signal: &Signal,
    sfreq: f64,
    params: &Params,
) -> Result<(Signal, f64), ProcedureError> {
    let clip = clip_value(params)? as f32;

    let data = signal
        .data
        .iter()
        .map(|channel| {
            if channel.is_empty() {
                return Vec::new();
            }
            let mean = channel.iter().sum::<f32>() / channel.len() as f32;
            channel
                .iter()
                .map(|&sample| (sample - mean).clamp(-clip, clip))
                .collect()
        })
        .collect();

    Ok((Signal::new(signal.channels.clone(), data), sfreq))
}
