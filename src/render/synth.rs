// Additive note synthesis
// Renders a note track into samples whose chroma content mirrors the
// symbolic pitches, standing in for a recorded performance of the track

use crate::track::NoteTrack;

/// Configuration for note rendering
#[derive(Debug, Clone)]
pub struct SynthConfig {
    /// Attack ramp in seconds
    pub attack_secs: f64,

    /// Release ramp in seconds, rendered past the note end
    pub release_secs: f64,

    /// Number of harmonic partials per note, fundamental included
    pub partials: usize,

    /// Peak amplitude after normalization
    pub peak: f32,
}

impl Default for SynthConfig {
    fn default() -> Self {
        SynthConfig {
            attack_secs: 0.01,
            release_secs: 0.05,
            partials: 3,
            peak: 0.9,
        }
    }
}

/// Render a note track to mono samples
///
/// Each note contributes a stack of harmonically-related sines with a short
/// linear attack and release, scaled by velocity. The mix is normalized to
/// the configured peak so loud polyphony cannot clip.
pub fn synthesize(track: &NoteTrack, sample_rate: u32, config: &SynthConfig) -> Vec<f32> {
    if track.is_empty() || sample_rate == 0 {
        return Vec::new();
    }

    let sr = sample_rate as f64;
    let total_secs = track.end_secs() + config.release_secs;
    let mut buffer = vec![0.0f32; (total_secs * sr).ceil() as usize];

    for event in &track.events {
        let freq = midi_to_hz(event.pitch);
        let amplitude = event.velocity as f64 / 127.0;

        let start = (event.onset_secs * sr) as usize;
        let end = ((event.end_secs() + config.release_secs) * sr) as usize;
        let end = end.min(buffer.len());

        for idx in start..end {
            let t = idx as f64 / sr - event.onset_secs;
            let env = envelope(t, event.duration_secs, config);
            if env <= 0.0 {
                continue;
            }

            let mut sample = 0.0f64;
            for k in 1..=config.partials.max(1) {
                let weight = 1.0 / k as f64;
                sample += weight * (2.0 * std::f64::consts::PI * freq * k as f64 * t).sin();
            }
            buffer[idx] += (amplitude * env * sample) as f32;
        }
    }

    normalize_peak(&mut buffer, config.peak);
    buffer
}

/// Fundamental frequency of a MIDI pitch number
fn midi_to_hz(pitch: u8) -> f64 {
    440.0 * 2f64.powf((pitch as f64 - 69.0) / 12.0)
}

/// Linear attack / sustain / linear release, as a [0, 1] gain
fn envelope(t: f64, duration_secs: f64, config: &SynthConfig) -> f64 {
    if t < 0.0 {
        return 0.0;
    }
    if t < config.attack_secs {
        return t / config.attack_secs;
    }
    if t <= duration_secs {
        return 1.0;
    }
    let past_end = t - duration_secs;
    if past_end < config.release_secs {
        return 1.0 - past_end / config.release_secs;
    }
    0.0
}

fn normalize_peak(buffer: &mut [f32], peak: f32) {
    let max = buffer.iter().map(|s| s.abs()).fold(0.0f32, f32::max);
    if max > 0.0 {
        let gain = peak / max;
        for s in buffer.iter_mut() {
            *s *= gain;
        }
    }
}
