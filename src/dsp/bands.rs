//! Spectrum-bin to display-band assignment and per-band gain compensation.
//!
//! Bands use a hybrid layout: roughly the lowest 30% are spaced linearly
//! between 20 Hz and the split frequency, the rest logarithmically from the
//! split frequency to Nyquist. Low notes sit only a few bins apart, so the
//! linear region keeps them from collapsing into a single band.

use crate::config::AnalyzerConfig;
use crate::util::audio::{MIN_BAND_FREQUENCY, linspace, logspace, rfft_bin_frequencies};
use std::ops::Range;

const LINEAR_FRACTION: f32 = 0.3;
const MIN_LINEAR_BANDS: usize = 4;

const MIN_BALANCE_GAIN: f32 = 1.0;
const MAX_BALANCE_GAIN: f32 = 12.0;

/// Contiguous run of spectrum bins rendered as one bar.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Band {
    pub bins: Range<usize>,
    /// Set when the band's frequency window held no bins and it borrowed
    /// its neighbour's (or the DC bin for the first band).
    pub borrowed: bool,
}

#[derive(Debug, Clone)]
pub struct BandMap {
    bands: Vec<Band>,
    bin_frequencies: Vec<f32>,
}

impl BandMap {
    pub fn new(config: &AnalyzerConfig) -> Self {
        let bin_frequencies = rfft_bin_frequencies(config.frame_size(), config.sample_rate());
        let bands = assign_bins(&bin_frequencies, &band_edges(config));
        debug_assert_eq!(bands.len(), config.num_bands());
        Self {
            bands,
            bin_frequencies,
        }
    }

    pub fn bands(&self) -> &[Band] {
        &self.bands
    }

    pub fn bin_frequencies(&self) -> &[f32] {
        &self.bin_frequencies
    }

    /// Mean magnitude per band. `energies` is resized to the band count.
    pub fn bucket(&self, spectrum: &[f32], energies: &mut Vec<f32>) {
        energies.clear();
        energies.extend(self.bands.iter().map(|band| {
            spectrum
                .get(band.bins.clone())
                .filter(|bins| !bins.is_empty())
                .map_or(0.0, |bins| bins.iter().sum::<f32>() / bins.len() as f32)
        }));
    }
}

pub fn linear_band_count(num_bands: usize) -> usize {
    let proportional = (num_bands as f32 * LINEAR_FRACTION) as usize;
    proportional.max(MIN_LINEAR_BANDS).min(num_bands)
}

/// Band boundaries in Hz, `num_bands + 1` entries.
fn band_edges(config: &AnalyzerConfig) -> Vec<f32> {
    let num_bands = config.num_bands();
    let nyquist = config.nyquist();
    let linear = linear_band_count(num_bands);
    let log = num_bands - linear;

    let mut edges = if log == 0 {
        // Too few bands for two regions; spread the linear ones over the whole range.
        linspace(MIN_BAND_FREQUENCY, nyquist, num_bands + 1)
    } else {
        let split = config.split_frequency();
        let mut edges = linspace(MIN_BAND_FREQUENCY, split, linear + 1);
        edges.pop();
        edges.extend(logspace(split, nyquist, log + 1));
        edges
    };

    // Pin the outer edges; float spacing can miss them by an ulp.
    if let Some(last) = edges.last_mut() {
        *last = nyquist;
    }
    edges
}

fn assign_bins(bin_frequencies: &[f32], edges: &[f32]) -> Vec<Band> {
    let mut bands: Vec<Band> = Vec::with_capacity(edges.len().saturating_sub(1));
    for window in edges.windows(2) {
        let (low, high) = (window[0], window[1]);
        let start = bin_frequencies.partition_point(|&f| f < low);
        let end = bin_frequencies.partition_point(|&f| f < high).max(start);

        let band = if start < end {
            Band {
                bins: start..end,
                borrowed: false,
            }
        } else {
            Band {
                bins: bands.last().map_or(0..1, |prev| prev.bins.clone()),
                borrowed: true,
            }
        };
        bands.push(band);
    }
    bands
}

/// Static per-band gain offsetting the high-frequency roll-off of typical
/// program material (`factor / sqrt(centre)`, clamped to 1..=12).
#[derive(Debug, Clone)]
pub struct GainBalancer {
    gains: Vec<f32>,
}

impl GainBalancer {
    pub fn new(config: &AnalyzerConfig, band_map: &BandMap) -> Self {
        let freqs = band_map.bin_frequencies();
        let gains = band_map
            .bands()
            .iter()
            .map(|band| {
                let centre = band_centre(freqs, band);
                if centre > 0.0 {
                    (config.balance_gain_factor() / centre.sqrt())
                        .clamp(MIN_BALANCE_GAIN, MAX_BALANCE_GAIN)
                } else {
                    MAX_BALANCE_GAIN
                }
            })
            .collect();
        Self { gains }
    }

    pub fn gains(&self) -> &[f32] {
        &self.gains
    }

    pub fn apply(&self, energies: &mut [f32]) {
        for (energy, gain) in energies.iter_mut().zip(&self.gains) {
            *energy *= gain;
        }
    }
}

fn band_centre(freqs: &[f32], band: &Band) -> f32 {
    match freqs.get(band.bins.clone()) {
        Some(bins) if !bins.is_empty() => bins.iter().sum::<f32>() / bins.len() as f32,
        _ => 0.0,
    }
}
