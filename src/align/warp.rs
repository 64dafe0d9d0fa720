// Warp function representation and application
// A monotone piecewise-linear mapping from symbolic time to reference time

use serde::{Deserialize, Serialize};

use super::AlignError;
use crate::track::{NoteEvent, NoteTrack};

/// One control point of a warp function
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct WarpPoint {
    /// Time on the symbolic (note track) axis in seconds
    pub sym_secs: f64,

    /// Time on the reference (audio) axis in seconds
    pub ref_secs: f64,
}

/// A monotone non-decreasing mapping from symbolic time to reference time
///
/// Evaluated by linear interpolation between control points and clamped to
/// the first/last control point outside its domain.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WarpFunction {
    points: Vec<WarpPoint>,
}

impl WarpFunction {
    /// Build from control points, which must already be ordered
    pub fn from_points(points: Vec<WarpPoint>) -> Self {
        debug_assert!(
            points
                .windows(2)
                .all(|w| w[0].sym_secs <= w[1].sym_secs && w[0].ref_secs <= w[1].ref_secs),
            "warp control points must be non-decreasing in both coordinates"
        );
        WarpFunction { points }
    }

    pub fn points(&self) -> &[WarpPoint] {
        &self.points
    }

    /// Both coordinates non-decreasing over the control point sequence
    pub fn is_monotone(&self) -> bool {
        self.points
            .windows(2)
            .all(|w| w[0].sym_secs <= w[1].sym_secs && w[0].ref_secs <= w[1].ref_secs)
    }

    /// Map a symbolic time to reference time
    ///
    /// Linear interpolation between the bracketing control points; clamps to
    /// the first/last point's reference time outside the domain. An empty
    /// function is the identity.
    pub fn map(&self, sym_secs: f64) -> f64 {
        let (first, last) = match (self.points.first(), self.points.last()) {
            (Some(first), Some(last)) => (first, last),
            _ => return sym_secs,
        };

        if sym_secs <= first.sym_secs {
            return first.ref_secs;
        }
        if sym_secs >= last.sym_secs {
            return last.ref_secs;
        }

        // First point with sym_secs strictly greater than the query
        let hi = self
            .points
            .partition_point(|p| p.sym_secs <= sym_secs);
        let lo = &self.points[hi - 1];
        let hi = &self.points[hi];

        let span = hi.sym_secs - lo.sym_secs;
        if span <= 0.0 {
            return lo.ref_secs;
        }
        let t = (sym_secs - lo.sym_secs) / span;
        lo.ref_secs + t * (hi.ref_secs - lo.ref_secs)
    }

    /// Apply the warp to a note track, producing a new track
    ///
    /// Onset and note end are mapped independently and the duration
    /// recomputed from their difference. A negative mapped duration means a
    /// non-monotone warp function was supplied and fails the whole call.
    pub fn apply(&self, track: &NoteTrack) -> Result<NoteTrack, AlignError> {
        let mut events = Vec::with_capacity(track.len());

        for event in &track.events {
            let onset = self.map(event.onset_secs);
            let end = self.map(event.end_secs());
            let duration = end - onset;
            if duration < 0.0 {
                return Err(AlignError::InvalidWarp {
                    onset_secs: event.onset_secs,
                });
            }

            events.push(NoteEvent {
                onset_secs: onset,
                duration_secs: duration,
                ..*event
            });
        }

        Ok(NoteTrack::from_events(events))
    }
}
