// Chroma feature extraction
// Folds STFT spectral energy onto the 12 pitch classes, producing the
// fixed-rate feature sequences the DTW aligner compares

use realfft::RealFftPlanner;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChromaError {
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),
}

/// Configuration for chroma extraction
///
/// Explicit parameters rather than module-level tuning constants, so two
/// extractions with the same config are directly comparable.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChromaConfig {
    /// FFT window size in samples
    pub window_size: usize,

    /// Hop duration between frames in seconds
    pub hop_secs: f64,

    /// Lowest frequency folded onto a pitch class, in Hz
    pub min_freq_hz: f32,

    /// Highest frequency folded onto a pitch class, in Hz
    pub max_freq_hz: f32,
}

impl Default for ChromaConfig {
    fn default() -> Self {
        ChromaConfig {
            window_size: 4096,
            hop_secs: 0.05,
            min_freq_hz: 55.0,
            max_freq_hz: 5000.0,
        }
    }
}

/// A fixed-rate sequence of 12-dimensional pitch-class energy frames
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChromaSequence {
    /// One 12-element vector per analysis frame, normalized to unit maximum
    pub frames: Vec<[f32; 12]>,

    /// Time between consecutive frames in seconds
    pub hop_secs: f64,
}

impl ChromaSequence {
    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    /// Time of frame `idx` in seconds
    pub fn frame_time(&self, idx: usize) -> f64 {
        idx as f64 * self.hop_secs
    }

    /// Time of the last frame, or 0.0 for an empty sequence
    pub fn end_time(&self) -> f64 {
        if self.frames.is_empty() {
            0.0
        } else {
            self.frame_time(self.frames.len() - 1)
        }
    }

    /// Indices of frames whose time falls in [start_secs, end_secs],
    /// inclusive at both ends so a frame sitting exactly on an interval
    /// boundary belongs to the intervals on either side
    pub fn frame_range(&self, start_secs: f64, end_secs: f64) -> std::ops::Range<usize> {
        const EPS: f64 = 1e-9;
        let last = (end_secs / self.hop_secs + EPS).floor();
        if last < 0.0 {
            return 0..0;
        }
        let start = (start_secs / self.hop_secs - EPS).ceil().max(0.0) as usize;
        let start = start.min(self.frames.len());
        let end = (last as usize + 1).clamp(start, self.frames.len());
        start..end
    }

    /// Copy of the frames in `range`, keeping the hop duration
    pub fn slice(&self, range: std::ops::Range<usize>) -> ChromaSequence {
        ChromaSequence {
            frames: self.frames[range].to_vec(),
            hop_secs: self.hop_secs,
        }
    }
}

/// Extract a chroma sequence from mono samples
///
/// Partitions the input into hop-spaced Hann windows, computes spectral
/// energy per window, and sums the energy of every frequency bin onto its
/// pitch class modulo one octave. Each frame is normalized to unit maximum
/// so sequences from different sources share a scale.
///
/// Empty input yields an empty sequence; non-positive parameters are
/// rejected with `ChromaError::InvalidParameter`.
pub fn extract_chroma(
    samples: &[f32],
    sample_rate: u32,
    config: &ChromaConfig,
) -> Result<ChromaSequence, ChromaError> {
    if sample_rate == 0 {
        return Err(ChromaError::InvalidParameter(
            "sample rate must be positive".into(),
        ));
    }
    if !(config.hop_secs > 0.0) {
        return Err(ChromaError::InvalidParameter(
            "hop duration must be positive".into(),
        ));
    }
    if config.window_size == 0 {
        return Err(ChromaError::InvalidParameter(
            "window size must be positive".into(),
        ));
    }

    if samples.is_empty() {
        return Ok(ChromaSequence {
            frames: Vec::new(),
            hop_secs: config.hop_secs,
        });
    }

    let hop_size = ((config.hop_secs * sample_rate as f64).round() as usize).max(1);
    let window_size = config.window_size;

    // Frame count is deterministic: one frame per hop that starts inside
    // the input, with the tail zero-padded.
    let num_frames = samples.len().div_ceil(hop_size);

    let mut planner = RealFftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(window_size);
    let bin_to_class = pitch_class_map(window_size, sample_rate, config);

    let mut frames = Vec::with_capacity(num_frames);
    let mut input = vec![0.0f32; window_size];
    let mut spectrum = fft.make_output_vec();

    for frame_idx in 0..num_frames {
        let start = frame_idx * hop_size;
        let end = (start + window_size).min(samples.len());

        input.fill(0.0);
        input[..end - start].copy_from_slice(&samples[start..end]);
        apply_hann_window(&mut input);

        fft.process(&mut input, &mut spectrum).unwrap();

        let mut frame = [0.0f32; 12];
        for (bin, c) in spectrum.iter().enumerate() {
            if let Some(class) = bin_to_class[bin] {
                frame[class] += c.norm_sqr();
            }
        }

        normalize_to_unit_max(&mut frame);
        frames.push(frame);
    }

    Ok(ChromaSequence {
        frames,
        hop_secs: config.hop_secs,
    })
}

/// Precompute which pitch class each FFT bin folds onto
/// Bins outside [min_freq_hz, max_freq_hz] map to None and are skipped
fn pitch_class_map(
    window_size: usize,
    sample_rate: u32,
    config: &ChromaConfig,
) -> Vec<Option<usize>> {
    let bin_width = sample_rate as f32 / window_size as f32;
    let num_bins = window_size / 2 + 1;

    (0..num_bins)
        .map(|bin| {
            let freq = bin as f32 * bin_width;
            if freq < config.min_freq_hz || freq > config.max_freq_hz {
                return None;
            }
            // MIDI note number of the bin center, folded modulo one octave
            let midi = 69.0 + 12.0 * (freq / 440.0).log2();
            Some((midi.round() as i32).rem_euclid(12) as usize)
        })
        .collect()
}

/// Hann window, applied in place to reduce spectral leakage
fn apply_hann_window(samples: &mut [f32]) {
    let n = samples.len();
    if n < 2 {
        return;
    }

    for (i, s) in samples.iter_mut().enumerate() {
        let w = 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / n as f32).cos());
        *s *= w;
    }
}

fn normalize_to_unit_max(frame: &mut [f32; 12]) {
    let max = frame.iter().cloned().fold(0.0f32, f32::max);
    if max > 0.0 {
        for v in frame.iter_mut() {
            *v /= max;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sine(freq: f32, sample_rate: u32, secs: f32) -> Vec<f32> {
        let n = (sample_rate as f32 * secs) as usize;
        (0..n)
            .map(|i| (2.0 * std::f32::consts::PI * freq * i as f32 / sample_rate as f32).sin())
            .collect()
    }

    #[test]
    fn test_empty_samples_yield_empty_sequence() {
        let chroma = extract_chroma(&[], 44100, &ChromaConfig::default()).unwrap();
        assert!(chroma.is_empty());
    }

    #[test]
    fn test_zero_sample_rate_is_rejected() {
        let result = extract_chroma(&[0.0; 1024], 0, &ChromaConfig::default());
        assert!(matches!(result, Err(ChromaError::InvalidParameter(_))));
    }

    #[test]
    fn test_non_positive_hop_is_rejected() {
        let config = ChromaConfig {
            hop_secs: 0.0,
            ..ChromaConfig::default()
        };
        let result = extract_chroma(&[0.0; 1024], 44100, &config);
        assert!(matches!(result, Err(ChromaError::InvalidParameter(_))));
    }

    #[test]
    fn test_frame_count_is_deterministic() {
        let config = ChromaConfig {
            hop_secs: 0.05,
            ..ChromaConfig::default()
        };
        let samples = vec![0.1f32; 22050]; // 1 second at 22050 Hz, hop rounds to 1103 samples
        let chroma = extract_chroma(&samples, 22050, &config).unwrap();
        assert_eq!(chroma.len(), samples.len().div_ceil(1103));
    }

    #[test]
    fn test_pure_tone_peaks_at_its_pitch_class() {
        // A4 = 440 Hz = pitch class 9
        let samples = sine(440.0, 22050, 1.0);
        let chroma = extract_chroma(&samples, 22050, &ChromaConfig::default()).unwrap();

        let mid = &chroma.frames[chroma.len() / 2];
        let peak = mid
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, 9);
        assert_eq!(mid[9], 1.0); // unit-max normalization
    }

    #[test]
    fn test_frame_range_selects_by_time() {
        let chroma = ChromaSequence {
            frames: vec![[0.0; 12]; 10],
            hop_secs: 0.5,
        };
        // Frames at 0.0, 0.5, ..., 4.5; [1.0, 3.0] covers frames 2..=6
        assert_eq!(chroma.frame_range(1.0, 3.0), 2..7);
        // Both interval ends are inclusive
        assert_eq!(chroma.frame_range(0.0, 4.5), 0..10);
        assert_eq!(chroma.frame_range(9.0, 99.0), 10..10);
    }
}
