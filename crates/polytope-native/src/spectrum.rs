//! Byte spectra in the shape a WebAudio `AnalyserNode` produces, computed
//! from captured samples with a Hann-windowed real FFT.

use crate::capture::SampleQueue;
use polytope_core::{AnalysisConfig, AudioError, SpectrumSource};
use realfft::{num_complex::Complex32, RealFftPlanner, RealToComplex};
use std::f32::consts::PI;
use std::sync::Arc;

pub struct FftSpectrum {
    queue: SampleQueue,
    sample_rate: f32,
    smoothing: f32,
    min_db: f32,
    max_db: f32,
    plan: Arc<dyn RealToComplex<f32>>,
    window: Vec<f32>,
    input: Vec<f32>,
    spectrum: Vec<Complex32>,
    scratch: Vec<Complex32>,
    smoothed: Vec<f32>,
}

impl FftSpectrum {
    pub fn new(queue: SampleQueue, sample_rate: f32, config: &AnalysisConfig) -> Self {
        let size = config.fft_size;
        let plan = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        Self {
            queue,
            sample_rate,
            smoothing: config.analyser_smoothing,
            min_db: config.min_decibels,
            max_db: config.max_decibels,
            window: (0..size).map(|i| hann_value(i, size)).collect(),
            input: plan.make_input_vec(),
            spectrum: plan.make_output_vec(),
            scratch: plan.make_scratch_vec(),
            smoothed: vec![0.0; size / 2],
            plan,
        }
    }

    /// Transforms one block of `fft_size` samples into `out`.
    pub fn compute(&mut self, samples: &[f32], out: &mut [u8]) -> Result<(), AudioError> {
        for ((dst, s), w) in self.input.iter_mut().zip(samples).zip(&self.window) {
            *dst = s * w;
        }
        self.plan
            .process_with_scratch(&mut self.input, &mut self.spectrum, &mut self.scratch)
            .map_err(|e| AudioError::Read(e.to_string()))?;

        let n = self.window.len() as f32;
        let tau = self.smoothing;
        let range = (self.max_db - self.min_db).max(f32::EPSILON);
        for ((bin, smoothed), byte) in self
            .spectrum
            .iter()
            .zip(self.smoothed.iter_mut())
            .zip(out.iter_mut())
        {
            let magnitude = bin.norm() / n;
            *smoothed = tau * *smoothed + (1.0 - tau) * magnitude;
            let db = if *smoothed > 0.0 {
                20.0 * smoothed.log10()
            } else {
                f32::NEG_INFINITY
            };
            *byte = (255.0 * (db - self.min_db) / range).clamp(0.0, 255.0) as u8;
        }
        Ok(())
    }
}

impl SpectrumSource for FftSpectrum {
    fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    fn bin_count(&self) -> usize {
        self.smoothed.len()
    }

    fn fill_byte_frequency_data(&mut self, out: &mut [u8]) -> Result<(), AudioError> {
        let mut block = vec![0.0; self.window.len()];
        self.queue.latest(&mut block).map_err(AudioError::Read)?;
        self.compute(&block, out)
    }
}

fn hann_value(index: usize, len: usize) -> f32 {
    if len <= 1 {
        return 1.0;
    }
    0.5 - 0.5 * ((2.0 * PI * index as f32) / (len as f32 - 1.0)).cos()
}
