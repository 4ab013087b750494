use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use serde::Deserialize;

/// Scales a 16-bit sample by the full 16-bit span (times two).
pub const SAMPLE_NORMALIZATION: f32 = 2.0 / 65536.0;

/// Default divisor for magnitudes, as a fraction of the buffer size.
pub const DEFAULT_SCALE_FACTOR: f32 = 0.05;

/// Analysis window applied before the FFT
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum WindowKind {
    #[default]
    Rectangular,
    Hann,
}

/// Normalized magnitudes (0.0-1.0), one per displayed bin.
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumLine {
    bins: Vec<f32>,
}

impl SpectrumLine {
    pub fn silent(len: usize) -> Self {
        Self { bins: vec![0.0; len] }
    }

    pub fn bins(&self) -> &[f32] {
        &self.bins
    }

    pub fn len(&self) -> usize {
        self.bins.len()
    }
}

#[cfg(test)]
impl SpectrumLine {
    pub(crate) fn from_bins(bins: Vec<f32>) -> Self {
        Self { bins }
    }

    /// Index of the loudest bin
    pub(crate) fn peak_bin(&self) -> usize {
        self.bins
            .iter()
            .enumerate()
            .fold((0, f32::MIN), |best, (i, &v)| if v > best.1 { (i, v) } else { best })
            .0
    }
}

/// Turns a full capture buffer into a [`SpectrumLine`].
pub struct SpectralTransform {
    fft: Arc<dyn Fft<f32>>,
    size: usize,
    window: Option<Vec<f32>>,
    scale: f32,
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
}

impl SpectralTransform {
    /// `scale_factor * size` is the magnitude that maps to 1.0.
    pub fn new(size: usize, window: WindowKind, scale_factor: f32) -> Self {
        let mut planner = FftPlanner::<f32>::new();
        let fft = planner.plan_fft_forward(size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        let window = match window {
            WindowKind::Rectangular => None,
            WindowKind::Hann => Some(hann_window(size)),
        };

        Self {
            fft,
            size,
            window,
            scale: scale_factor * size as f32,
            buffer: vec![Complex::new(0.0, 0.0); size],
            scratch,
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    /// Number of displayed bins (the Nyquist bin is dropped).
    pub fn output_len(&self) -> usize {
        self.size / 2
    }

    /// Transform `samples` into `line`. Magnitudes above the calibrated
    /// scale saturate at 1.0.
    pub fn process(&mut self, samples: &[i16], line: &mut SpectrumLine) {
        debug_assert_eq!(samples.len(), self.size);

        for (i, slot) in self.buffer.iter_mut().enumerate() {
            let mut value = samples.get(i).copied().unwrap_or(0) as f32 * SAMPLE_NORMALIZATION;
            if let Some(window) = &self.window {
                value *= window[i];
            }
            *slot = Complex::new(value, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let half = self.output_len();
        line.bins.resize(half, 0.0);
        for (out, c) in line.bins.iter_mut().zip(&self.buffer[..half]) {
            *out = (c.norm() / self.scale).min(1.0);
        }
    }
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| {
            0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tone(bin: usize, size: usize, amplitude: f32) -> Vec<i16> {
        (0..size)
            .map(|t| {
                let phase = 2.0 * std::f32::consts::PI * bin as f32 * t as f32 / size as f32;
                (phase.sin() * amplitude * i16::MAX as f32) as i16
            })
            .collect()
    }

    #[test]
    fn test_pure_tone_peak_bin() {
        let mut transform = SpectralTransform::new(2048, WindowKind::Rectangular, DEFAULT_SCALE_FACTOR);
        let mut line = SpectrumLine::silent(transform.output_len());
        transform.process(&tone(10, 2048, 0.05), &mut line);

        assert_eq!(line.len(), 1024);
        let peak = line.peak_bin();
        assert!((9..=11).contains(&peak), "peak at {}", peak);

        let freq = peak as f64 * 44_100.0 / 2048.0;
        assert!((freq - 215.3).abs() < 25.0);
    }

    #[test]
    fn test_pure_tone_peak_bin_hann() {
        let mut transform = SpectralTransform::new(2048, WindowKind::Hann, DEFAULT_SCALE_FACTOR);
        let mut line = SpectrumLine::silent(transform.output_len());
        transform.process(&tone(10, 2048, 0.05), &mut line);
        assert!((9..=11).contains(&line.peak_bin()));
    }

    #[test]
    fn test_values_clamped_to_unit() {
        let mut transform = SpectralTransform::new(1024, WindowKind::Rectangular, DEFAULT_SCALE_FACTOR);
        let mut line = SpectrumLine::silent(512);
        transform.process(&tone(40, 1024, 0.9), &mut line);

        assert!(line.bins().iter().all(|&v| (0.0..=1.0).contains(&v)));
        // Loud tone saturates instead of being rescaled
        assert_eq!(line.bins()[40], 1.0);
    }

    #[test]
    fn test_silence_is_zero() {
        let mut transform = SpectralTransform::new(256, WindowKind::Rectangular, DEFAULT_SCALE_FACTOR);
        let mut line = SpectrumLine::silent(128);
        transform.process(&[0; 256], &mut line);
        assert!(line.bins().iter().all(|&v| v == 0.0));
    }

    #[test]
    fn test_scale_calibration() {
        // Amplitude A sine gives |X[b]| = A * N / 2 before scaling
        let size = 512;
        let mut transform = SpectralTransform::new(size, WindowKind::Rectangular, 1.0);
        let mut line = SpectrumLine::silent(size / 2);
        transform.process(&tone(16, size, 0.5), &mut line);
        assert!((line.bins()[16] - 0.25).abs() < 0.01);
    }

    #[test]
    fn test_hann_window_shape() {
        let w = hann_window(64);
        assert!(w[0].abs() < 1e-6);
        assert!(w[63].abs() < 1e-6);
        assert!(w.iter().all(|&v| (0.0..=1.0).contains(&v)));
    }
}
