//! Per-band adaptive normalisation and temporal smoothing.

// Starting peak for every band. Raw 16-bit FFT magnitudes run into the
// millions, so this only matters for the first few quiet frames.
pub const PEAK_FLOOR: f32 = 1_000.0;
// Per-frame peak decay. At ~86 frames/s a peak halves in about 1.6 s.
pub const PEAK_DECAY: f32 = 0.995;
const EPSILON: f32 = 1e-8;

pub const SMOOTHING_WEIGHT: f32 = 0.3;

/// Tracks a slowly decaying peak per band and scales each band against its
/// own peak times `headroom`, so a loud bass line does not flatten the treble.
#[derive(Debug, Clone)]
pub struct PeakNormalizer {
    peaks: Vec<f32>,
    headroom: f32,
}

impl PeakNormalizer {
    pub fn new(num_bands: usize, headroom: f32) -> Self {
        Self {
            peaks: vec![PEAK_FLOOR; num_bands],
            headroom: headroom.max(1.0),
        }
    }

    #[cfg(test)]
    pub fn peaks(&self) -> &[f32] {
        &self.peaks
    }

    /// Update peaks with `energies` and write the normalised levels, each in
    /// `[0, 1]`, to `levels`. Negative or non-finite energies count as silence.
    pub fn update(&mut self, energies: &[f32], levels: &mut Vec<f32>) {
        levels.clear();
        levels.extend(self.peaks.iter_mut().zip(energies).map(|(peak, &energy)| {
            let energy = if energy.is_finite() && energy > 0.0 {
                energy
            } else {
                0.0
            };
            *peak = energy.max(*peak * PEAK_DECAY);
            let level = energy / (*peak * self.headroom + EPSILON);
            if level.is_finite() {
                level.clamp(0.0, 1.0)
            } else {
                0.0
            }
        }));
        // Bands missing from a short input read as silence.
        levels.resize(self.peaks.len(), 0.0);
    }
}

/// Constant-weight exponential moving average, one value per band.
#[derive(Debug, Clone)]
pub struct Smoother {
    values: Vec<f32>,
}

impl Smoother {
    pub fn new(num_bands: usize) -> Self {
        Self {
            values: vec![0.0; num_bands],
        }
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn blend(&mut self, levels: &[f32]) -> &[f32] {
        for (value, &level) in self.values.iter_mut().zip(levels) {
            *value = SMOOTHING_WEIGHT * level + (1.0 - SMOOTHING_WEIGHT) * *value;
        }
        &self.values
    }

    /// Pull every band toward zero; used when no frame arrived this tick.
    pub fn decay(&mut self, factor: f32) -> &[f32] {
        let factor = factor.clamp(0.0, 1.0);
        for value in &mut self.values {
            *value *= factor;
        }
        &self.values
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn update(normalizer: &mut PeakNormalizer, energies: &[f32]) -> Vec<f32> {
        let mut levels = Vec::new();
        normalizer.update(energies, &mut levels);
        levels
    }

    #[test]
    fn output_stays_in_unit_range_for_any_input() {
        let mut normalizer = PeakNormalizer::new(6, 1.5);
        let inputs = [
            [0.0, 1.0, 1e12, f32::NAN, f32::INFINITY, -5.0],
            [f32::MAX, 0.0, 1e-30, 3.0, f32::NEG_INFINITY, 1e6],
            [0.0; 6],
        ];
        for energies in inputs {
            for level in update(&mut normalizer, &energies) {
                assert!((0.0..=1.0).contains(&level), "level {level} out of range");
            }
        }
        assert!(normalizer.peaks().iter().all(|p| p.is_finite()));
    }

    #[test]
    fn peak_rises_instantly_and_decays_by_fixed_factor() {
        let mut normalizer = PeakNormalizer::new(1, 1.5);
        update(&mut normalizer, &[50_000.0]);
        assert_eq!(normalizer.peaks()[0], 50_000.0);

        let before = normalizer.peaks()[0];
        update(&mut normalizer, &[10.0]);
        assert_eq!(normalizer.peaks()[0], before * PEAK_DECAY);

        update(&mut normalizer, &[80_000.0]);
        assert_eq!(normalizer.peaks()[0], 80_000.0);
    }

    #[test]
    fn rising_energy_converges_to_inverse_headroom() {
        let headroom = 1.5;
        let mut normalizer = PeakNormalizer::new(1, headroom);
        let mut level = 0.0;
        for step in 1..=50 {
            level = update(&mut normalizer, &[step as f32 * 10_000.0])[0];
            assert!(level <= 1.0);
        }
        assert!((level - 1.0 / headroom).abs() < 1e-4, "got {level}");
    }

    #[test]
    fn loud_frame_then_silence_decays_geometrically() {
        let mut normalizer = PeakNormalizer::new(1, 1.5);
        update(&mut normalizer, &[1.0e6]);
        let mut expected = 1.0e6f32;
        for _ in 0..1_000 {
            let level = update(&mut normalizer, &[0.0])[0];
            expected *= PEAK_DECAY;
            assert_eq!(level, 0.0);
            let peak = normalizer.peaks()[0];
            assert!((peak - expected).abs() <= expected * 1e-4, "{peak} vs {expected}");
        }
        // 0.995^1000 ≈ 0.0067
        assert!(normalizer.peaks()[0] < 1.0e6 * 0.01);
    }

    #[test]
    fn short_input_pads_with_silence() {
        let mut normalizer = PeakNormalizer::new(4, 1.5);
        let levels = update(&mut normalizer, &[5_000.0]);
        assert_eq!(levels.len(), 4);
        assert_eq!(&levels[1..], &[0.0, 0.0, 0.0]);
    }

    #[test]
    fn smoother_converges_monotonically_to_constant_input() {
        let mut smoother = Smoother::new(2);
        let target = [0.8, 0.25];
        let mut previous = smoother.values().to_vec();
        for _ in 0..30 {
            let current = smoother.blend(&target).to_vec();
            for band in 0..2 {
                assert!(current[band] >= previous[band]);
                assert!(current[band] <= target[band]);
            }
            previous = current;
        }
        assert!((previous[0] - 0.8).abs() < 1e-4);
        assert!((previous[1] - 0.25).abs() < 1e-4);
    }

    #[test]
    fn smoother_weights_new_input_by_constant() {
        let mut smoother = Smoother::new(1);
        assert!((smoother.blend(&[1.0])[0] - 0.3).abs() < 1e-6);
        assert!((smoother.blend(&[1.0])[0] - 0.51).abs() < 1e-6);
    }

    #[test]
    fn decay_shrinks_towards_zero() {
        let mut smoother = Smoother::new(1);
        smoother.blend(&[1.0]);
        assert!((smoother.decay(0.5)[0] - 0.15).abs() < 1e-6);
        let unchanged = smoother.decay(2.0)[0];
        assert!((unchanged - 0.15).abs() < 1e-6);
        assert!(smoother.decay(0.0).iter().all(|&v| v == 0.0));
    }
}
