// Dynamic time warping over chroma sequences
// Classical three-neighbor recurrence with cosine local cost; the dominant
// cost of the system at O(|A|*|B|) time and space

use super::warp::{WarpFunction, WarpPoint};
use super::AlignError;
use crate::audio::chroma::ChromaSequence;

/// Compute the optimal monotone alignment between two chroma sequences
///
/// `a` is the reference timeline, `b` the symbolic-derived one. The result
/// maps symbolic time (frame times of `b`) to reference time (frame times
/// of `a`).
///
/// Boundary policy: the accumulated-cost matrix is initialized with
/// cumulative sums along its first row and column, so the path is pinned to
/// the (0,0) and (|A|-1,|B|-1) corners. Backtrace ties are broken with a
/// fixed diagonal > vertical > horizontal priority to avoid oscillation.
pub fn align(a: &ChromaSequence, b: &ChromaSequence) -> Result<WarpFunction, AlignError> {
    if a.is_empty() || b.is_empty() {
        return Err(AlignError::EmptySequence);
    }

    let acc = accumulated_cost(a, b);
    let path = backtrace(&acc, a.len(), b.len());
    Ok(path_to_warp(&path, a, b))
}

/// Cosine distance between two chroma frames: 1 - cosine similarity
///
/// Symmetric and zero for identical non-zero frames. Two silent (all-zero)
/// frames are treated as identical; a silent frame against a sounding one
/// costs the maximum of 1.
fn cosine_distance(x: &[f32; 12], y: &[f32; 12]) -> f32 {
    let mut dot = 0.0f32;
    let mut norm_x = 0.0f32;
    let mut norm_y = 0.0f32;
    for k in 0..12 {
        dot += x[k] * y[k];
        norm_x += x[k] * x[k];
        norm_y += y[k] * y[k];
    }

    if norm_x == 0.0 && norm_y == 0.0 {
        return 0.0;
    }
    if norm_x == 0.0 || norm_y == 0.0 {
        return 1.0;
    }

    (1.0 - dot / (norm_x.sqrt() * norm_y.sqrt())).max(0.0)
}

/// Accumulated-cost matrix, stored row-major as a flat |A| x |B| vector
///
/// D[0][0] = cost(0,0); first row and column are cumulative along the edge;
/// interior cells take the three-neighbor minimum.
fn accumulated_cost(a: &ChromaSequence, b: &ChromaSequence) -> Vec<f32> {
    let n = a.len();
    let m = b.len();
    let mut acc = vec![0.0f32; n * m];

    for i in 0..n {
        for j in 0..m {
            let cost = cosine_distance(&a.frames[i], &b.frames[j]);
            let best = match (i, j) {
                (0, 0) => 0.0,
                (0, _) => acc[j - 1],
                (_, 0) => acc[(i - 1) * m],
                _ => {
                    let diag = acc[(i - 1) * m + (j - 1)];
                    let vert = acc[(i - 1) * m + j];
                    let horiz = acc[i * m + (j - 1)];
                    diag.min(vert).min(horiz)
                }
            };
            acc[i * m + j] = cost + best;
        }
    }

    acc
}

/// Recover the optimal path from (n-1, m-1) back to (0, 0)
///
/// Returned in ascending order, strictly monotone in both coordinates
/// combined (each step advances at least one index by exactly one).
fn backtrace(acc: &[f32], n: usize, m: usize) -> Vec<(usize, usize)> {
    let mut path = Vec::with_capacity(n + m);
    let mut i = n - 1;
    let mut j = m - 1;
    path.push((i, j));

    while i > 0 || j > 0 {
        (i, j) = if i == 0 {
            (0, j - 1)
        } else if j == 0 {
            (i - 1, 0)
        } else {
            let diag = acc[(i - 1) * m + (j - 1)];
            let vert = acc[(i - 1) * m + j];
            let horiz = acc[i * m + (j - 1)];

            // Tie priority: diagonal, then vertical, then horizontal
            if diag <= vert && diag <= horiz {
                (i - 1, j - 1)
            } else if vert <= horiz {
                (i - 1, j)
            } else {
                (i, j - 1)
            }
        };
        path.push((i, j));
    }

    path.reverse();
    path
}

/// Convert an index path into a warp function over frame times
///
/// Consecutive path entries sharing a symbolic frame are deduplicated
/// keeping the first in ascending order, which is the reference time
/// closest to the predecessor control point. The final symbolic frame is
/// the exception: a path ending in vertical steps would otherwise leave
/// the endpoint short of the reference end, so the last control point is
/// pinned to the path's terminal corner.
fn path_to_warp(path: &[(usize, usize)], a: &ChromaSequence, b: &ChromaSequence) -> WarpFunction {
    let mut points: Vec<WarpPoint> = Vec::with_capacity(path.len());
    let mut last_j = None;

    for &(i, j) in path {
        if last_j == Some(j) {
            continue;
        }
        last_j = Some(j);
        points.push(WarpPoint {
            sym_secs: b.frame_time(j),
            ref_secs: a.frame_time(i),
        });
    }

    if let (Some(point), Some(&(i, _))) = (points.last_mut(), path.last()) {
        point.ref_secs = a.frame_time(i);
    }

    WarpFunction::from_points(points)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn chroma(frames: Vec<[f32; 12]>, hop_secs: f64) -> ChromaSequence {
        ChromaSequence { frames, hop_secs }
    }

    fn unit_frame(class: usize) -> [f32; 12] {
        let mut f = [0.0; 12];
        f[class] = 1.0;
        f
    }

    #[test]
    fn test_empty_sequence_is_rejected() {
        let empty = chroma(vec![], 1.0);
        let one = chroma(vec![unit_frame(0)], 1.0);
        assert!(matches!(align(&empty, &one), Err(AlignError::EmptySequence)));
        assert!(matches!(align(&one, &empty), Err(AlignError::EmptySequence)));
    }

    #[test]
    fn test_identity_alignment() {
        let x = chroma(
            vec![unit_frame(0), unit_frame(4), unit_frame(7), unit_frame(0)],
            0.5,
        );
        let w = align(&x, &x).unwrap();

        assert_eq!(w.points().len(), 4);
        for p in w.points() {
            assert!((p.sym_secs - p.ref_secs).abs() < 1e-9);
        }
    }

    #[test]
    fn test_two_frame_identity_scenario() {
        // Matches the engine contract: two identical 2-frame sequences at
        // hop 1.0 s align as [(0,0), (1,1)]
        let x = chroma(vec![unit_frame(0), unit_frame(1)], 1.0);
        let w = align(&x, &x).unwrap();

        let points = w.points();
        assert_eq!(points.len(), 2);
        assert_eq!((points[0].sym_secs, points[0].ref_secs), (0.0, 0.0));
        assert_eq!((points[1].sym_secs, points[1].ref_secs), (1.0, 1.0));

        let track = crate::track::NoteTrack::from_events(vec![crate::track::NoteEvent {
            onset_secs: 0.5,
            duration_secs: 0.3,
            pitch: 60,
            velocity: 64,
        }]);
        let warped = w.apply(&track).unwrap();
        assert!((warped.events[0].onset_secs - 0.5).abs() < 1e-9);
        assert!((warped.events[0].duration_secs - 0.3).abs() < 1e-9);
    }

    #[test]
    fn test_alignment_is_monotone() {
        // Same progression played at half speed on the symbolic side
        let a = chroma(
            vec![unit_frame(0), unit_frame(4), unit_frame(7), unit_frame(11)],
            0.1,
        );
        let b = chroma(
            vec![
                unit_frame(0),
                unit_frame(0),
                unit_frame(4),
                unit_frame(4),
                unit_frame(7),
                unit_frame(7),
                unit_frame(11),
                unit_frame(11),
            ],
            0.1,
        );

        let w = align(&a, &b).unwrap();
        assert!(w.is_monotone());

        // Path is pinned to both corners
        let points = w.points();
        assert_eq!(points.first().unwrap().ref_secs, 0.0);
        assert_eq!(points.last().unwrap().ref_secs, a.end_time());
        assert_eq!(points.last().unwrap().sym_secs, b.end_time());
    }

    #[test]
    fn test_symbolic_times_are_strictly_increasing() {
        // Reference much longer than symbolic: many vertical steps collapse
        // onto single symbolic frames and must be deduplicated
        let a = chroma(vec![unit_frame(2); 6], 0.1);
        let b = chroma(vec![unit_frame(2); 2], 0.1);

        let w = align(&a, &b).unwrap();
        let points = w.points();
        assert!(points.windows(2).all(|p| p[0].sym_secs < p[1].sym_secs));
        assert_eq!(points.len(), 2);
    }

    #[test]
    fn test_held_final_chord_reaches_reference_end() {
        // Reference holds the closing chord three frames past the symbolic
        // side, so the optimal path ends in vertical steps; the endpoint
        // must still land on the reference end
        let a = chroma(
            vec![unit_frame(0), unit_frame(4), unit_frame(4), unit_frame(4)],
            1.0,
        );
        let b = chroma(vec![unit_frame(0), unit_frame(4)], 1.0);

        let w = align(&a, &b).unwrap();
        let last = w.points().last().unwrap();
        assert_eq!(last.sym_secs, b.end_time());
        assert_eq!(last.ref_secs, a.end_time());
        assert_eq!(w.map(1.0), 3.0);
        assert!(w.is_monotone());
    }

    #[test]
    fn test_cosine_distance_properties() {
        let x = unit_frame(0);
        let y = unit_frame(6);
        assert_eq!(cosine_distance(&x, &x), 0.0);
        assert!((cosine_distance(&x, &y) - 1.0).abs() < 1e-6);
        assert_eq!(cosine_distance(&x, &y), cosine_distance(&y, &x));
        assert_eq!(cosine_distance(&[0.0; 12], &[0.0; 12]), 0.0);
        assert_eq!(cosine_distance(&[0.0; 12], &x), 1.0);
    }
}
