// Anchor-constrained re-warping
// User-placed anchor pairs partition the timeline into independent
// intervals; each interval is re-aligned with DTW on its own chroma slices
// and the local results are spliced into one continuous warp function

use serde::{Deserialize, Serialize};

use super::dtw;
use super::warp::{WarpFunction, WarpPoint};
use super::AlignError;
use crate::audio::chroma::ChromaSequence;

/// Tolerance for treating two anchor times as the same instant
const TIME_EPS: f64 = 1e-9;

/// A user-asserted correspondence between the two timelines
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Anchor {
    /// Position on the symbolic (note track) axis in seconds
    pub sym_secs: f64,

    /// Position on the reference (audio) axis in seconds
    pub ref_secs: f64,
}

/// Extent of the alignment problem on both timelines
///
/// Used to synthesize boundary anchors at the track start and end when the
/// user has not anchored them explicitly.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackBounds {
    pub sym_start: f64,
    pub sym_end: f64,
    pub ref_start: f64,
    pub ref_end: f64,
}

impl TrackBounds {
    /// Bounds starting at zero on both timelines
    pub fn from_ends(sym_end: f64, ref_end: f64) -> Self {
        TrackBounds {
            sym_start: 0.0,
            sym_end,
            ref_start: 0.0,
            ref_end,
        }
    }
}

/// Re-align within each interval between consecutive anchors
///
/// Anchors must be sorted ascending by symbolic time and advance both
/// timelines; boundary anchors are synthesized at the track start and end
/// when absent. Each interval is aligned independently on the chroma frames
/// falling inside it, so a local correction can never perturb the warp
/// outside its two adjacent intervals. Control points at interval seams are
/// exactly the anchor coordinates.
///
/// An interval too narrow to contain any frames falls back to linear
/// interpolation between its two anchors.
pub fn rewarp(
    a: &ChromaSequence,
    b: &ChromaSequence,
    anchors: &[Anchor],
    bounds: TrackBounds,
) -> Result<WarpFunction, AlignError> {
    let anchors = with_boundary_anchors(anchors, bounds);
    validate_ordering(&anchors)?;

    let mut points: Vec<WarpPoint> = Vec::new();

    for pair in anchors.windows(2) {
        let (from, to) = (pair[0], pair[1]);

        points.push(WarpPoint {
            sym_secs: from.sym_secs,
            ref_secs: from.ref_secs,
        });
        points.extend(interval_points(a, b, from, to));
    }

    // Final anchor closes the last interval
    if let Some(last) = anchors.last() {
        points.push(WarpPoint {
            sym_secs: last.sym_secs,
            ref_secs: last.ref_secs,
        });
    }

    Ok(WarpFunction::from_points(points))
}

/// Prepend/append boundary anchors unless the user already anchored the
/// track start or end
fn with_boundary_anchors(anchors: &[Anchor], bounds: TrackBounds) -> Vec<Anchor> {
    let mut full = Vec::with_capacity(anchors.len() + 2);

    let start_anchored = anchors
        .first()
        .is_some_and(|a| (a.sym_secs - bounds.sym_start).abs() < TIME_EPS);
    if !start_anchored {
        full.push(Anchor {
            sym_secs: bounds.sym_start,
            ref_secs: bounds.ref_start,
        });
    }

    full.extend_from_slice(anchors);

    let end_anchored = anchors
        .last()
        .is_some_and(|a| (a.sym_secs - bounds.sym_end).abs() < TIME_EPS);
    if !end_anchored {
        full.push(Anchor {
            sym_secs: bounds.sym_end,
            ref_secs: bounds.ref_end,
        });
    }

    full
}

/// Each anchor must strictly advance both timelines, or the spliced warp
/// would not be monotone
fn validate_ordering(anchors: &[Anchor]) -> Result<(), AlignError> {
    for pair in anchors.windows(2) {
        let (prev, next) = (pair[0], pair[1]);
        if next.sym_secs <= prev.sym_secs || next.ref_secs <= prev.ref_secs {
            return Err(AlignError::OverlappingAnchor {
                sym_secs: next.sym_secs,
                ref_secs: next.ref_secs,
            });
        }
    }
    Ok(())
}

/// DTW-derived control points strictly inside one anchor interval,
/// translated into global time
///
/// Empty slices yield no interior points, leaving the interval to the
/// linear interpolation between its anchor endpoints.
fn interval_points(
    a: &ChromaSequence,
    b: &ChromaSequence,
    from: Anchor,
    to: Anchor,
) -> Vec<WarpPoint> {
    let range_a = a.frame_range(from.ref_secs, to.ref_secs);
    let range_b = b.frame_range(from.sym_secs, to.sym_secs);
    if range_a.is_empty() || range_b.is_empty() {
        return Vec::new();
    }

    let offset_a = a.frame_time(range_a.start);
    let offset_b = b.frame_time(range_b.start);
    let slice_a = a.slice(range_a);
    let slice_b = b.slice(range_b);

    // Both slices are non-empty, so local alignment cannot fail
    let local = dtw::align(&slice_a, &slice_b).expect("non-empty slices");

    local
        .points()
        .iter()
        .map(|p| WarpPoint {
            sym_secs: p.sym_secs + offset_b,
            ref_secs: p.ref_secs + offset_a,
        })
        .filter(|p| {
            p.sym_secs > from.sym_secs + TIME_EPS && p.sym_secs < to.sym_secs - TIME_EPS
        })
        .map(|p| WarpPoint {
            // Frame times inside the slice already lie within the anchor
            // interval; clamp shields the splice against rounding
            ref_secs: p.ref_secs.clamp(from.ref_secs, to.ref_secs),
            ..p
        })
        .collect()
}
