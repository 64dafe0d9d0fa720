// Note track data model
// A single onset-ordered sequence of note events, the symbolic side of alignment

use serde::{Deserialize, Serialize};

/// A single note event on the symbolic timeline
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    /// Onset time in seconds from track start
    pub onset_secs: f64,

    /// Duration in seconds (>= 0)
    pub duration_secs: f64,

    /// MIDI pitch number [0, 127]
    pub pitch: u8,

    /// MIDI velocity [0, 127]
    pub velocity: u8,
}

impl NoteEvent {
    /// End time of the note in seconds
    pub fn end_secs(&self) -> f64 {
        self.onset_secs + self.duration_secs
    }
}

/// An onset-ordered collection of note events
///
/// Overlapping notes are permitted (polyphony), but onsets must be
/// non-decreasing. Warping produces a new track; the input is never mutated.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NoteTrack {
    pub events: Vec<NoteEvent>,
}

impl NoteTrack {
    /// Build a track from events, sorting them by onset
    pub fn from_events(mut events: Vec<NoteEvent>) -> Self {
        events.sort_by(|a, b| a.onset_secs.total_cmp(&b.onset_secs));
        NoteTrack { events }
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Onset of the first event, or 0.0 for an empty track
    pub fn start_secs(&self) -> f64 {
        self.events.first().map(|e| e.onset_secs).unwrap_or(0.0)
    }

    /// Latest note-off time across all events, or 0.0 for an empty track
    ///
    /// With polyphony the last-sounding note is not necessarily the last
    /// by onset, so this scans the whole track.
    pub fn end_secs(&self) -> f64 {
        self.events
            .iter()
            .map(|e| e.end_secs())
            .fold(0.0, f64::max)
    }

    /// Check that onsets are non-decreasing
    pub fn is_onset_ordered(&self) -> bool {
        self.events
            .windows(2)
            .all(|w| w[0].onset_secs <= w[1].onset_secs)
    }

    /// Shift all events so the first onset lands at time zero
    pub fn shifted_to_zero(&self) -> NoteTrack {
        let shift = self.start_secs();
        NoteTrack {
            events: self
                .events
                .iter()
                .map(|e| NoteEvent {
                    onset_secs: e.onset_secs - shift,
                    ..*e
                })
                .collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn note(onset: f64, duration: f64, pitch: u8) -> NoteEvent {
        NoteEvent {
            onset_secs: onset,
            duration_secs: duration,
            pitch,
            velocity: 64,
        }
    }

    #[test]
    fn test_from_events_sorts_by_onset() {
        let track = NoteTrack::from_events(vec![note(2.0, 0.5, 60), note(0.5, 0.5, 62)]);
        assert!(track.is_onset_ordered());
        assert_eq!(track.events[0].pitch, 62);
    }

    #[test]
    fn test_end_secs_accounts_for_polyphony() {
        // Long held note starts first but ends last
        let track = NoteTrack::from_events(vec![note(0.0, 5.0, 48), note(1.0, 0.5, 72)]);
        assert_eq!(track.end_secs(), 5.0);
    }

    #[test]
    fn test_shifted_to_zero() {
        let track = NoteTrack::from_events(vec![note(1.5, 0.5, 60), note(2.0, 0.5, 64)]);
        let shifted = track.shifted_to_zero();
        assert_eq!(shifted.start_secs(), 0.0);
        assert_eq!(shifted.events[1].onset_secs, 0.5);
    }

    #[test]
    fn test_empty_track_bounds() {
        let track = NoteTrack::default();
        assert_eq!(track.start_secs(), 0.0);
        assert_eq!(track.end_secs(), 0.0);
    }
}
