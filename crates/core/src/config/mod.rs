use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::{ColorMode, Result, VisualiserError};

pub const MIN_FFT_SIZE: u32 = 32;
pub const MAX_FFT_SIZE: u32 = 32_768;

/// Runtime configuration shared by the analyser and the renderer.
///
/// Field names serialise in camelCase so preset files written for the web
/// build of the visualiser can be loaded unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct VisualiserConfig {
    pub fft_size: u32,
    pub smoothing_time_constant: f32,
    pub color_mode: ColorMode,
    pub sensitivity: f32,
}

impl Default for VisualiserConfig {
    fn default() -> Self {
        Self {
            fft_size: 256,
            smoothing_time_constant: 0.8,
            color_mode: ColorMode::Spectrum,
            sensitivity: 1.0,
        }
    }
}

impl VisualiserConfig {
    /// Loads and validates a configuration stored as JSON.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json_str(&raw)
    }

    pub fn from_json_str(raw: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(raw).map_err(|err| {
            if err.is_data() {
                VisualiserError::invalid_config(err.to_string())
            } else {
                VisualiserError::from(err)
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json_pretty(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Checks every field against its supported range.
    pub fn validate(&self) -> Result<()> {
        validate_fft_size(self.fft_size)?;
        validate_smoothing(self.smoothing_time_constant)?;
        validate_sensitivity(self.sensitivity)?;
        Ok(())
    }

    /// Number of frequency bins produced for the configured FFT size.
    pub fn bin_count(&self) -> usize {
        self.fft_size as usize / 2
    }

    pub fn set_fft_size(&mut self, fft_size: u32) -> Result<()> {
        validate_fft_size(fft_size)?;
        self.fft_size = fft_size;
        Ok(())
    }

    pub fn set_smoothing(&mut self, smoothing: f32) -> Result<()> {
        validate_smoothing(smoothing)?;
        self.smoothing_time_constant = smoothing;
        Ok(())
    }

    pub fn set_sensitivity(&mut self, sensitivity: f32) -> Result<()> {
        validate_sensitivity(sensitivity)?;
        self.sensitivity = sensitivity;
        Ok(())
    }
}

pub fn validate_fft_size(fft_size: u32) -> Result<()> {
    if !fft_size.is_power_of_two() || !(MIN_FFT_SIZE..=MAX_FFT_SIZE).contains(&fft_size) {
        return Err(VisualiserError::invalid_config(format!(
            "fft size {fft_size} must be a power of two between {MIN_FFT_SIZE} and {MAX_FFT_SIZE}"
        )));
    }
    Ok(())
}

pub fn validate_smoothing(smoothing: f32) -> Result<()> {
    if !(0.0..=1.0).contains(&smoothing) {
        return Err(VisualiserError::invalid_config(format!(
            "smoothing time constant {smoothing} must lie in [0, 1]"
        )));
    }
    Ok(())
}

pub fn validate_sensitivity(sensitivity: f32) -> Result<()> {
    if !sensitivity.is_finite() || sensitivity <= 0.0 {
        return Err(VisualiserError::invalid_config(format!(
            "sensitivity {sensitivity} must be a positive number"
        )));
    }
    Ok(())
}
