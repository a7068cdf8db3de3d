//! Frame-to-levels pipeline owned by one engine.

use super::{BandMap, GainBalancer, PeakNormalizer, SpectralTransform, Smoother};
use crate::config::AnalyzerConfig;
use crate::util::audio::decode_s16le_into;
use tracing::debug;

/// Runs one frame through transform, banding, balance, normalisation and
/// smoothing. Everything that persists across frames (peaks, smoothed
/// levels) lives here and is mutated only through `&mut self`.
#[derive(Debug, Clone)]
pub struct BandPipeline {
    config: AnalyzerConfig,
    transform: SpectralTransform,
    band_map: BandMap,
    balancer: GainBalancer,
    normalizer: PeakNormalizer,
    smoother: Smoother,
    samples: Vec<i16>,
    energies: Vec<f32>,
    levels: Vec<f32>,
}

impl BandPipeline {
    pub fn new(config: AnalyzerConfig) -> Self {
        let band_map = BandMap::new(&config);
        let balancer = GainBalancer::new(&config, &band_map);
        let bands = config.num_bands();
        debug!(
            "[dsp] {bands} bands over {} bins ({} sharing bins), gains {:.1?}",
            band_map.bin_frequencies().len(),
            band_map.bands().iter().filter(|band| band.borrowed).count(),
            balancer.gains()
        );
        Self {
            transform: SpectralTransform::new(config.frame_size()),
            normalizer: PeakNormalizer::new(bands, config.headroom_factor()),
            smoother: Smoother::new(bands),
            samples: Vec::with_capacity(config.frame_size()),
            energies: Vec::with_capacity(bands),
            levels: Vec::with_capacity(bands),
            band_map,
            balancer,
            config,
        }
    }

    pub fn config(&self) -> &AnalyzerConfig {
        &self.config
    }

    #[cfg(test)]
    pub fn band_map(&self) -> &BandMap {
        &self.band_map
    }

    /// Latest smoothed levels, `num_bands` entries in `[0, 1]`.
    pub fn levels(&self) -> &[f32] {
        self.smoother.values()
    }

    /// Balanced (pre-normalisation) band energies of the last frame.
    #[cfg(test)]
    pub fn energies(&self) -> &[f32] {
        &self.energies
    }

    pub fn process_bytes(&mut self, frame: &[u8]) -> &[f32] {
        let mut samples = std::mem::take(&mut self.samples);
        decode_s16le_into(frame, &mut samples);
        self.process_frame(&samples);
        self.samples = samples;
        self.smoother.values()
    }

    pub fn process_frame(&mut self, samples: &[i16]) -> &[f32] {
        let spectrum = self.transform.transform(samples);
        self.band_map.bucket(spectrum, &mut self.energies);
        self.balancer.apply(&mut self.energies);
        self.normalizer.update(&self.energies, &mut self.levels);
        self.smoother.blend(&self.levels)
    }

    /// Levels to show on a tick without a new frame.
    pub fn idle(&mut self, decay: f32) -> &[f32] {
        self.smoother.decay(decay)
    }
}
