//! Magnitude spectrum of one capture frame.

use realfft::{RealFftPlanner, RealToComplex};
use rustfft::num_complex::Complex32;
use std::sync::Arc;
use tracing::warn;

/// Real FFT of a fixed-size 16-bit frame. No window is applied, magnitudes
/// are left unscaled so they stay in the raw sample domain.
#[derive(Clone)]
pub struct SpectralTransform {
    fft: Arc<dyn RealToComplex<f32>>,
    size: usize,
    input: Vec<f32>,
    output: Vec<Complex32>,
    scratch: Vec<Complex32>,
    magnitudes: Vec<f32>,
}

impl std::fmt::Debug for SpectralTransform {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralTransform")
            .field("size", &self.size)
            .finish_non_exhaustive()
    }
}

impl SpectralTransform {
    pub fn new(size: usize) -> Self {
        let size = size.max(2);
        let fft = RealFftPlanner::<f32>::new().plan_fft_forward(size);
        Self {
            scratch: vec![Complex32::default(); fft.get_scratch_len()],
            input: vec![0.0; size],
            output: vec![Complex32::default(); size / 2 + 1],
            magnitudes: vec![0.0; size / 2 + 1],
            size,
            fft,
        }
    }

    /// Magnitude per bin, `size / 2 + 1` entries. Short frames are zero-padded,
    /// long ones truncated.
    pub fn transform(&mut self, samples: &[i16]) -> &[f32] {
        self.input.fill(0.0);
        for (dst, &sample) in self.input.iter_mut().zip(samples) {
            *dst = f32::from(sample);
        }

        if let Err(err) =
            self.fft
                .process_with_scratch(&mut self.input, &mut self.output, &mut self.scratch)
        {
            warn!("[spectrum] fft failed: {err}");
            self.magnitudes.fill(0.0);
            return &self.magnitudes;
        }

        for (magnitude, bin) in self.magnitudes.iter_mut().zip(&self.output) {
            *magnitude = bin.norm();
        }
        &self.magnitudes
    }
}
