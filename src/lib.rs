// Chromalign - aligns MIDI note tracks to audio recordings
// Module declarations

pub mod align;
pub mod audio;
pub mod midi;
pub mod pipeline;
pub mod project;
pub mod render;
pub mod track;

pub use align::{align, rewarp, Anchor, AlignError, TrackBounds, WarpFunction, WarpPoint};
pub use audio::{extract_chroma, ingest_wav, AudioData, ChromaConfig, ChromaSequence};
pub use pipeline::{align_track, refine_track, AlignmentResult, PipelineConfig, RefinementResult};
pub use track::{NoteEvent, NoteTrack};
