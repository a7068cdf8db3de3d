//! Analyzer configuration, validated once and immutable afterwards.

use crate::util::audio::{BYTES_PER_SAMPLE, MIN_BAND_FREQUENCY};
use std::fmt;
use std::ops::RangeInclusive;

pub const DEFAULT_NUM_BANDS: usize = 32;
pub const DEFAULT_SPLIT_FREQUENCY: f32 = 300.0;
pub const DEFAULT_BALANCE_GAIN_FACTOR: f32 = 2_500.0;
pub const DEFAULT_HEADROOM_FACTOR: f32 = 1.5;

// Frame size grows with the band count so narrow bands still own bins.
const FRAME_SIZE_RANGE: RangeInclusive<usize> = 256..=2048;
const SAMPLES_PER_BAND: usize = 4;

/// Rejected configuration, fatal at engine construction.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    NoBands,
    InvalidSampleRate(f32),
    SplitOutOfRange { split: f32, nyquist: f32 },
    InvalidGain(f32),
    HeadroomBelowOne(f32),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::NoBands => write!(f, "band count must be at least 1"),
            ConfigError::InvalidSampleRate(rate) => {
                write!(f, "sample rate must be a positive number, got {rate}")
            }
            ConfigError::SplitOutOfRange { split, nyquist } => write!(
                f,
                "split frequency {split} Hz must lie between {MIN_BAND_FREQUENCY} Hz and {nyquist} Hz"
            ),
            ConfigError::InvalidGain(gain) => {
                write!(f, "balance gain factor must be positive, got {gain}")
            }
            ConfigError::HeadroomBelowOne(headroom) => {
                write!(f, "headroom factor must be at least 1.0, got {headroom}")
            }
        }
    }
}

impl std::error::Error for ConfigError {}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AnalyzerConfig {
    sample_rate: f32,
    frame_size: usize,
    num_bands: usize,
    split_frequency: f32,
    balance_gain_factor: f32,
    headroom_factor: f32,
}

impl AnalyzerConfig {
    pub fn new(
        sample_rate: f32,
        num_bands: usize,
        split_frequency: f32,
        balance_gain_factor: f32,
        headroom_factor: f32,
    ) -> Result<Self, ConfigError> {
        if num_bands == 0 {
            return Err(ConfigError::NoBands);
        }
        if !sample_rate.is_finite() || sample_rate <= 0.0 {
            return Err(ConfigError::InvalidSampleRate(sample_rate));
        }
        let nyquist = sample_rate / 2.0;
        if !split_frequency.is_finite()
            || split_frequency <= MIN_BAND_FREQUENCY
            || split_frequency >= nyquist
        {
            return Err(ConfigError::SplitOutOfRange {
                split: split_frequency,
                nyquist,
            });
        }
        if !balance_gain_factor.is_finite() || balance_gain_factor <= 0.0 {
            return Err(ConfigError::InvalidGain(balance_gain_factor));
        }
        if !headroom_factor.is_finite() || headroom_factor < 1.0 {
            return Err(ConfigError::HeadroomBelowOne(headroom_factor));
        }

        Ok(Self {
            sample_rate,
            frame_size: frame_size_for(num_bands),
            num_bands,
            split_frequency,
            balance_gain_factor,
            headroom_factor,
        })
    }

    #[cfg(test)]
    pub fn with_bands(num_bands: usize) -> Result<Self, ConfigError> {
        Self::new(
            crate::util::audio::DEFAULT_SAMPLE_RATE,
            num_bands,
            DEFAULT_SPLIT_FREQUENCY,
            DEFAULT_BALANCE_GAIN_FACTOR,
            DEFAULT_HEADROOM_FACTOR,
        )
    }

    pub fn sample_rate(&self) -> f32 {
        self.sample_rate
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    pub fn frame_bytes(&self) -> usize {
        self.frame_size * BYTES_PER_SAMPLE
    }

    pub fn num_bands(&self) -> usize {
        self.num_bands
    }

    pub fn split_frequency(&self) -> f32 {
        self.split_frequency
    }

    pub fn nyquist(&self) -> f32 {
        self.sample_rate / 2.0
    }

    pub fn balance_gain_factor(&self) -> f32 {
        self.balance_gain_factor
    }

    pub fn headroom_factor(&self) -> f32 {
        self.headroom_factor
    }
}

pub fn frame_size_for(num_bands: usize) -> usize {
    num_bands
        .saturating_mul(SAMPLES_PER_BAND)
        .clamp(*FRAME_SIZE_RANGE.start(), *FRAME_SIZE_RANGE.end())
}
