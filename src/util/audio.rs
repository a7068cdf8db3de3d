//! Capture-format constants and sample helpers.

// Default capture rate (Hz). Low enough to keep frames short while still
// covering the audible range that matters for a bar display.
pub const DEFAULT_SAMPLE_RATE: f32 = 22_050.0;

// Capture stream is signed 16-bit little-endian mono.
pub const BYTES_PER_SAMPLE: usize = 2;

// Lowest frequency (Hz) considered by the band layout.
pub const MIN_BAND_FREQUENCY: f32 = 20.0;

/// Decode an s16le byte slice into `out`, replacing its contents.
/// A trailing odd byte is ignored.
pub fn decode_s16le_into(bytes: &[u8], out: &mut Vec<i16>) {
    out.clear();
    out.reserve(bytes.len() / BYTES_PER_SAMPLE);
    out.extend(
        bytes
            .chunks_exact(BYTES_PER_SAMPLE)
            .map(|pair| i16::from_le_bytes([pair[0], pair[1]])),
    );
}

/// Centre frequency of every real-FFT output bin, `fft_size / 2 + 1` entries.
pub fn rfft_bin_frequencies(fft_size: usize, sample_rate: f32) -> Vec<f32> {
    if fft_size == 0 {
        return Vec::new();
    }
    let bin_hz = sample_rate / fft_size as f32;
    (0..=fft_size / 2).map(|bin| bin as f32 * bin_hz).collect()
}

#[inline(always)]
pub fn lerp(a: f32, b: f32, t: f32) -> f32 {
    a + (b - a) * t
}

/// Evenly spaced points from `start` to `end` inclusive.
pub fn linspace(start: f32, end: f32, points: usize) -> Vec<f32> {
    match points {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let last = (points - 1) as f32;
            (0..points)
                .map(|i| lerp(start, end, i as f32 / last))
                .collect()
        }
    }
}

/// Geometrically spaced points from `start` to `end` inclusive; both must be positive.
pub fn logspace(start: f32, end: f32, points: usize) -> Vec<f32> {
    let (lo, hi) = (start.log10(), end.log10());
    linspace(lo, hi, points)
        .into_iter()
        .map(|exp| 10.0f32.powf(exp))
        .collect()
}
