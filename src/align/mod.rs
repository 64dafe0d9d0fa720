// Alignment engine
// DTW over chroma sequences, warp-function application, and
// anchor-constrained local re-warping

pub mod anchors;
pub mod dtw;
pub mod warp;

pub use anchors::{rewarp, Anchor, TrackBounds};
pub use dtw::align;
pub use warp::{WarpFunction, WarpPoint};

use thiserror::Error;

/// Errors shared by the alignment operations
#[derive(Debug, Error)]
pub enum AlignError {
    #[error("Cannot align an empty chroma sequence")]
    EmptySequence,

    #[error("Warp function maps note at {onset_secs:.3} s to a negative duration")]
    InvalidWarp { onset_secs: f64 },

    #[error(
        "Anchor at symbolic {sym_secs:.3} s / reference {ref_secs:.3} s \
         does not advance both timelines past its predecessor"
    )]
    OverlappingAnchor { sym_secs: f64, ref_secs: f64 },
}
