// MIDI import/export using the midly crate
// Converts between SMF note messages and the onset/duration note track the
// alignment engine operates on

use midly::{
    Format, Header, MetaMessage, MidiMessage, Smf, Timing, Track, TrackEvent, TrackEventKind,
};
use thiserror::Error;

use crate::track::{NoteEvent, NoteTrack};

/// Default tempo in microseconds per quarter note (120 BPM)
const DEFAULT_TEMPO_US: u32 = 500_000;

#[derive(Debug, Error)]
pub enum MidiError {
    #[error("Failed to parse MIDI file: {0}")]
    Parse(#[from] midly::Error),

    #[error("Failed to write MIDI file: {0}")]
    Write(String),

    #[error("MIDI file contains no note events")]
    NoNotes,

    #[error("Note time {0} s does not fit in the tick range")]
    TickOverflow(f64),
}

/// Options for MIDI import
#[derive(Debug, Clone)]
pub struct MidiImportOptions {
    /// Shift events so the first onset lands at time zero
    pub shift_to_zero: bool,
}

impl Default for MidiImportOptions {
    fn default() -> Self {
        MidiImportOptions {
            shift_to_zero: true,
        }
    }
}

/// Options for MIDI export
#[derive(Debug, Clone)]
pub struct MidiExportOptions {
    /// Pulses per quarter note; higher values reduce rounding error
    pub ppq: u16,

    /// Channel for all exported note messages
    pub channel: u8,
}

impl Default for MidiExportOptions {
    fn default() -> Self {
        MidiExportOptions {
            ppq: 480,
            channel: 0,
        }
    }
}

/// Parse SMF bytes into a note track
///
/// All tracks are merged onto one timeline. Note-on messages with velocity
/// zero count as note-offs; note-offs are paired with the earliest open
/// note-on of the same pitch. Set-tempo meta events are honored when
/// converting ticks to seconds. Notes left open at the end of the file are
/// closed at the time of the last event.
pub fn import_midi(data: &[u8], options: &MidiImportOptions) -> Result<NoteTrack, MidiError> {
    let smf = Smf::parse(data)?;

    // Absolute-tick message list merged across tracks
    let mut messages: Vec<(u64, TrackEventKind)> = Vec::new();
    for track in &smf.tracks {
        let mut abs_ticks = 0u64;
        for event in track {
            abs_ticks += u64::from(event.delta.as_int());
            messages.push((abs_ticks, event.kind));
        }
    }
    messages.sort_by_key(|(ticks, _)| *ticks);

    let clock = TickClock::new(smf.header.timing, &messages);

    // Pair note-ons with note-offs, earliest-first per pitch
    let mut open: Vec<(u8, u8, f64)> = Vec::new(); // (pitch, velocity, onset)
    let mut events = Vec::new();
    let mut last_secs = 0.0f64;

    for &(ticks, kind) in &messages {
        let secs = clock.ticks_to_secs(ticks);
        last_secs = last_secs.max(secs);

        let TrackEventKind::Midi { message, .. } = kind else {
            continue;
        };
        match message {
            MidiMessage::NoteOn { key, vel } if vel.as_int() > 0 => {
                open.push((key.as_int(), vel.as_int(), secs));
            }
            MidiMessage::NoteOn { key, .. } | MidiMessage::NoteOff { key, .. } => {
                let pitch = key.as_int();
                if let Some(pos) = open.iter().position(|&(p, _, _)| p == pitch) {
                    let (_, velocity, onset) = open.remove(pos);
                    events.push(NoteEvent {
                        onset_secs: onset,
                        duration_secs: secs - onset,
                        pitch,
                        velocity,
                    });
                }
            }
            _ => {}
        }
    }

    // Close anything left hanging at the end of the file
    for (pitch, velocity, onset) in open {
        events.push(NoteEvent {
            onset_secs: onset,
            duration_secs: last_secs - onset,
            pitch,
            velocity,
        });
    }

    if events.is_empty() {
        return Err(MidiError::NoNotes);
    }

    let track = NoteTrack::from_events(events);
    Ok(if options.shift_to_zero {
        track.shifted_to_zero()
    } else {
        track
    })
}

/// Serialize a note track to single-track SMF bytes
///
/// Writes a fixed 120 BPM tempo and derives delta times from the events'
/// absolute seconds.
pub fn export_midi(track: &NoteTrack, options: &MidiExportOptions) -> Result<Vec<u8>, MidiError> {
    let ticks_per_sec = options.ppq as f64 * 1_000_000.0 / DEFAULT_TEMPO_US as f64;

    // (ticks, is_note_off, pitch, velocity); note-offs sort before note-ons
    // at the same tick so zero-gap retriggers are not swallowed
    let mut messages: Vec<(u64, bool, u8, u8)> = Vec::new();
    for event in &track.events {
        messages.push((
            secs_to_ticks(event.onset_secs, ticks_per_sec)?,
            false,
            event.pitch,
            event.velocity,
        ));
        messages.push((
            secs_to_ticks(event.end_secs(), ticks_per_sec)?,
            true,
            event.pitch,
            0,
        ));
    }
    messages.sort_by_key(|&(ticks, is_off, _, _)| (ticks, !is_off));

    let mut smf_track = Track::new();
    smf_track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::Tempo(DEFAULT_TEMPO_US.into())),
    });

    let mut last_ticks = 0u64;
    for (ticks, is_off, pitch, velocity) in messages {
        let delta = (ticks - last_ticks) as u32;
        let message = if is_off {
            MidiMessage::NoteOff {
                key: pitch.into(),
                vel: velocity.into(),
            }
        } else {
            MidiMessage::NoteOn {
                key: pitch.into(),
                vel: velocity.into(),
            }
        };
        smf_track.push(TrackEvent {
            delta: delta.into(),
            kind: TrackEventKind::Midi {
                channel: options.channel.into(),
                message,
            },
        });
        last_ticks = ticks;
    }

    smf_track.push(TrackEvent {
        delta: 0.into(),
        kind: TrackEventKind::Meta(MetaMessage::EndOfTrack),
    });

    let smf = Smf {
        header: Header {
            format: Format::SingleTrack,
            timing: Timing::Metrical(options.ppq.into()),
        },
        tracks: vec![smf_track],
    };

    let mut bytes = Vec::new();
    smf.write(&mut bytes)
        .map_err(|e| MidiError::Write(format!("{:?}", e)))?;
    Ok(bytes)
}

fn secs_to_ticks(secs: f64, ticks_per_sec: f64) -> Result<u64, MidiError> {
    let ticks = (secs * ticks_per_sec).round();
    if !(0.0..=u32::MAX as f64).contains(&ticks) {
        return Err(MidiError::TickOverflow(secs));
    }
    Ok(ticks as u64)
}

/// Converts absolute ticks to seconds honoring set-tempo meta events
struct TickClock {
    /// (tick of tempo change, seconds at that tick, seconds per tick after)
    segments: Vec<(u64, f64, f64)>,
}

impl TickClock {
    fn new(timing: Timing, messages: &[(u64, TrackEventKind)]) -> Self {
        match timing {
            Timing::Metrical(ppq) => {
                let ppq = ppq.as_int() as f64;
                let mut segments = vec![(0, 0.0, DEFAULT_TEMPO_US as f64 / 1_000_000.0 / ppq)];

                for &(ticks, kind) in messages {
                    if let TrackEventKind::Meta(MetaMessage::Tempo(tempo_us)) = kind {
                        let &(prev_tick, prev_secs, rate) = segments.last().unwrap();
                        let secs = prev_secs + (ticks - prev_tick) as f64 * rate;
                        segments.push((ticks, secs, tempo_us.as_int() as f64 / 1_000_000.0 / ppq));
                    }
                }
                TickClock { segments }
            }
            Timing::Timecode(fps, subframe) => {
                let rate = 1.0 / (fps.as_f32() as f64 * subframe as f64);
                TickClock {
                    segments: vec![(0, 0.0, rate)],
                }
            }
        }
    }

    fn ticks_to_secs(&self, ticks: u64) -> f64 {
        let idx = self
            .segments
            .partition_point(|&(tick, _, _)| tick <= ticks)
            .saturating_sub(1);
        let (seg_tick, seg_secs, rate) = self.segments[idx];
        seg_secs + (ticks - seg_tick) as f64 * rate
    }
}
