use std::{f32::consts::PI, fmt, sync::Arc};

use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use serde::{Deserialize, Serialize};

use crate::{config, Result, VisualiserConfig};

/// Level mapped to byte 0.
pub const MIN_DECIBELS: f32 = -100.0;
/// Level mapped to byte 255.
pub const MAX_DECIBELS: f32 = -30.0;
const BLACKMAN_ALPHA: f32 = 0.16;

/// Parameters of the analysis node that can change while audio plays.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisParams {
    pub fft_size: u32,
    pub smoothing_time_constant: f32,
}

impl AnalysisParams {
    pub fn from_config(config: &VisualiserConfig) -> Self {
        Self {
            fft_size: config.fft_size,
            smoothing_time_constant: config.smoothing_time_constant,
        }
    }

    pub fn validate(&self) -> Result<()> {
        config::validate_fft_size(self.fft_size)?;
        config::validate_smoothing(self.smoothing_time_constant)
    }

    pub fn bin_count(&self) -> usize {
        self.fft_size as usize / 2
    }
}

impl Default for AnalysisParams {
    fn default() -> Self {
        Self::from_config(&VisualiserConfig::default())
    }
}

/// One frame worth of per-bin magnitudes in the range `0..=255`.
///
/// Snapshots are produced fresh for every frame and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SpectrumSnapshot {
    bins: Vec<u8>,
}

impl SpectrumSnapshot {
    pub fn new(bins: Vec<u8>) -> Self {
        Self { bins }
    }

    pub fn bin_count(&self) -> usize {
        self.bins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bins.is_empty()
    }

    pub fn bins(&self) -> &[u8] {
        &self.bins
    }
}

impl From<Vec<u8>> for SpectrumSnapshot {
    fn from(bins: Vec<u8>) -> Self {
        Self::new(bins)
    }
}

/// Frequency analysis node fed with the samples that are being played.
///
/// The node windows the most recent `fft_size` samples with a Blackman
/// window, runs a real FFT, smooths magnitudes over time with the smoothing
/// time constant and maps the decibel range
/// [`MIN_DECIBELS`]..[`MAX_DECIBELS`] onto bytes. Callers receive the result
/// untouched; no extra smoothing happens outside the node.
pub struct SpectrumAnalyser {
    params: AnalysisParams,
    history: Vec<f32>,
    smoothed: Vec<f32>,
    fft_planner: RealFftPlanner<f32>,
    fft: Option<FftResources>,
}

impl SpectrumAnalyser {
    pub fn new(params: AnalysisParams) -> Result<Self> {
        params.validate()?;
        Ok(Self {
            params,
            history: Vec::with_capacity(params.fft_size as usize),
            smoothed: vec![0.0; params.bin_count()],
            fft_planner: RealFftPlanner::new(),
            fft: None,
        })
    }

    pub fn params(&self) -> AnalysisParams {
        self.params
    }

    pub fn bin_count(&self) -> usize {
        self.params.bin_count()
    }

    /// Applies new parameters to the live node. A new FFT size discards the
    /// smoothing history; the sample history is kept.
    pub fn set_params(&mut self, params: AnalysisParams) -> Result<()> {
        params.validate()?;
        if params.fft_size != self.params.fft_size {
            self.smoothed = vec![0.0; params.bin_count()];
            self.fft = None;
            trim_front(&mut self.history, params.fft_size as usize);
        }
        self.params = params;
        Ok(())
    }

    /// Appends mono samples to the analysed window.
    pub fn push_samples(&mut self, samples: &[f32]) {
        let window = self.params.fft_size as usize;
        let keep_from = samples.len().saturating_sub(window);
        self.history.extend_from_slice(&samples[keep_from..]);
        trim_front(&mut self.history, window);
    }

    /// Forgets the sample history and smoothing state.
    pub fn reset(&mut self) {
        self.history.clear();
        self.smoothed.iter_mut().for_each(|value| *value = 0.0);
    }

    /// Computes the smoothed byte spectrum of the current window.
    pub fn byte_frequency_data(&mut self) -> Result<SpectrumSnapshot> {
        let size = self.params.fft_size as usize;
        let tau = self.params.smoothing_time_constant;
        let padding = size - self.history.len();

        let fft = prepare_fft(&mut self.fft_planner, &mut self.fft, size);
        fft.input[..padding].iter_mut().for_each(|value| *value = 0.0);
        for (offset, sample) in self.history.iter().enumerate() {
            let index = padding + offset;
            fft.input[index] = *sample * fft.window[index];
        }

        fft.plan
            .process_with_scratch(&mut fft.input, &mut fft.spectrum, &mut fft.scratch)?;

        let scale = 1.0 / size as f32;
        let range = MAX_DECIBELS - MIN_DECIBELS;
        let bins = self
            .smoothed
            .iter_mut()
            .zip(fft.spectrum.iter())
            .map(|(smoothed, bin)| {
                let magnitude = bin.norm() * scale;
                let mut next = tau * *smoothed + (1.0 - tau) * magnitude;
                if !next.is_finite() {
                    next = 0.0;
                }
                *smoothed = next;
                decibels_to_byte(20.0 * next.log10(), range)
            })
            .collect();

        Ok(SpectrumSnapshot::new(bins))
    }
}

fn decibels_to_byte(db: f32, range: f32) -> u8 {
    if !db.is_finite() {
        return 0;
    }
    (255.0 / range * (db - MIN_DECIBELS)).clamp(0.0, 255.0).floor() as u8
}

fn trim_front(buffer: &mut Vec<f32>, len: usize) {
    if buffer.len() > len {
        let overflow = buffer.len() - len;
        buffer.drain(0..overflow);
    }
}

fn prepare_fft<'a>(
    planner: &mut RealFftPlanner<f32>,
    slot: &'a mut Option<FftResources>,
    size: usize,
) -> &'a mut FftResources {
    if slot.as_ref().is_some_and(|fft| fft.size != size) {
        *slot = None;
    }

    slot.get_or_insert_with(|| {
        let plan = planner.plan_fft_forward(size);
        let scratch = plan.make_scratch_vec();
        let spectrum = plan.make_output_vec();
        let input = plan.make_input_vec();
        let window = (0..size).map(|index| blackman_value(index, size)).collect();
        FftResources {
            size,
            plan,
            scratch,
            spectrum,
            input,
            window,
        }
    })
}

struct FftResources {
    size: usize,
    plan: Arc<dyn RealToComplex<f32>>,
    scratch: Vec<Complex32>,
    spectrum: Vec<Complex32>,
    input: Vec<f32>,
    window: Vec<f32>,
}

impl fmt::Debug for SpectrumAnalyser {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SpectrumAnalyser")
            .field("params", &self.params)
            .field("history", &self.history.len())
            .field("fft", &self.fft)
            .finish()
    }
}

impl fmt::Debug for FftResources {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FftResources")
            .field("size", &self.size)
            .finish()
    }
}

fn blackman_value(index: usize, len: usize) -> f32 {
    let a0 = 0.5 * (1.0 - BLACKMAN_ALPHA);
    let a1 = 0.5;
    let a2 = 0.5 * BLACKMAN_ALPHA;
    let phase = 2.0 * PI * index as f32 / len as f32;
    a0 - a1 * phase.cos() + a2 * (2.0 * phase).cos()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(fft_size: u32, smoothing: f32) -> AnalysisParams {
        AnalysisParams {
            fft_size,
            smoothing_time_constant: smoothing,
        }
    }

    fn sine(bin: usize, size: usize, amplitude: f32) -> Vec<f32> {
        (0..size)
            .map(|n| amplitude * (2.0 * PI * bin as f32 * n as f32 / size as f32).sin())
            .collect()
    }

    #[test]
    fn silence_maps_to_zero_bytes() {
        let mut analyser = SpectrumAnalyser::new(params(256, 0.8)).unwrap();
        analyser.push_samples(&[0.0; 256]);
        let snapshot = analyser.byte_frequency_data().unwrap();
        assert_eq!(snapshot.bin_count(), 128);
        assert!(snapshot.bins().iter().all(|value| *value == 0));
    }

    #[test]
    fn empty_history_is_treated_as_silence() {
        let mut analyser = SpectrumAnalyser::new(params(64, 0.0)).unwrap();
        let snapshot = analyser.byte_frequency_data().unwrap();
        assert_eq!(snapshot.bins(), &[0; 32][..]);
    }

    #[test]
    fn sine_peaks_in_its_bin() {
        let mut analyser = SpectrumAnalyser::new(params(256, 0.0)).unwrap();
        analyser.push_samples(&sine(8, 256, 0.001));
        let snapshot = analyser.byte_frequency_data().unwrap();
        let loudest = (0..snapshot.bin_count()).max_by_key(|bin| snapshot.bins()[*bin]);
        assert_eq!(loudest, Some(8));
        assert!(snapshot.bins()[8] > snapshot.bins()[7]);
        assert!(snapshot.bins()[8] > snapshot.bins()[9]);
        assert_eq!(snapshot.bins()[40], 0);
    }

    #[test]
    fn loud_input_saturates_at_255() {
        let mut analyser = SpectrumAnalyser::new(params(256, 0.0)).unwrap();
        analyser.push_samples(&sine(8, 256, 1.0));
        assert_eq!(analyser.byte_frequency_data().unwrap().bins()[8], 255);
    }

    #[test]
    fn smoothing_blends_successive_frames() {
        let signal = sine(8, 256, 0.001);

        let mut raw = SpectrumAnalyser::new(params(256, 0.0)).unwrap();
        raw.push_samples(&signal);
        let first = raw.byte_frequency_data().unwrap().bins()[8];
        let second = raw.byte_frequency_data().unwrap().bins()[8];
        assert_eq!(first, second);

        let mut smoothed = SpectrumAnalyser::new(params(256, 0.5)).unwrap();
        smoothed.push_samples(&signal);
        let rising_a = smoothed.byte_frequency_data().unwrap().bins()[8];
        let rising_b = smoothed.byte_frequency_data().unwrap().bins()[8];
        assert!(rising_a < rising_b);
        assert!(rising_b < first);
    }

    #[test]
    fn fft_size_change_applies_to_next_snapshot() {
        let mut analyser = SpectrumAnalyser::new(params(256, 0.8)).unwrap();
        analyser.push_samples(&[0.25; 1024]);
        assert_eq!(analyser.byte_frequency_data().unwrap().bin_count(), 128);

        analyser.set_params(params(1024, 0.8)).unwrap();
        assert_eq!(analyser.byte_frequency_data().unwrap().bin_count(), 512);
    }

    #[test]
    fn invalid_params_are_rejected_without_side_effects() {
        let mut analyser = SpectrumAnalyser::new(params(256, 0.8)).unwrap();
        assert!(analyser.set_params(params(100, 0.8)).is_err());
        assert!(analyser.set_params(params(256, 2.0)).is_err());
        assert_eq!(analyser.params(), params(256, 0.8));
    }

    #[test]
    fn history_keeps_only_the_latest_window() {
        let mut analyser = SpectrumAnalyser::new(params(32, 0.0)).unwrap();
        analyser.push_samples(&[1.0; 100]);
        analyser.push_samples(&[0.5; 10]);
        assert_eq!(analyser.history.len(), 32);
        assert_eq!(analyser.history[31], 0.5);
        assert_eq!(analyser.history[0], 1.0);
    }

    #[test]
    fn blackman_window_is_zero_at_the_start() {
        assert!(blackman_value(0, 256).abs() < 1e-6);
        assert!((blackman_value(128, 256) - 1.0).abs() < 1e-6);
    }
}
