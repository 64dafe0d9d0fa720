// Pipeline orchestration
// Wires the extraction, alignment, and warp stages into the two user-facing
// phases: automatic global alignment and anchor-constrained refinement

use thiserror::Error;

use crate::align::{self, Anchor, AlignError, TrackBounds, WarpFunction};
use crate::audio::{extract_chroma, AudioData, ChromaConfig, ChromaError, ChromaSequence};
use crate::render::{synthesize, SynthConfig};
use crate::track::NoteTrack;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Chroma(#[from] ChromaError),

    #[error(transparent)]
    Align(#[from] AlignError),
}

/// Configuration shared by both pipeline phases
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub chroma: ChromaConfig,
    pub synth: SynthConfig,
}

/// Output of the global alignment phase
///
/// Carries both chroma sequences so the refinement phase can re-warp
/// intervals without re-extracting features; the engine itself keeps no
/// state between calls.
#[derive(Debug, Clone)]
pub struct AlignmentResult {
    pub warp: WarpFunction,
    pub aligned_track: NoteTrack,
    pub reference_chroma: ChromaSequence,
    pub symbolic_chroma: ChromaSequence,
}

/// Output of one anchor-constrained refinement pass
#[derive(Debug, Clone)]
pub struct RefinementResult {
    pub warp: WarpFunction,
    pub aligned_track: NoteTrack,
}

/// Phase 1: align a note track to a reference recording
///
/// Synthesizes the track, extracts chroma from both sides, computes the
/// global DTW warp, and applies it. Blocking; callers wanting a responsive
/// UI should run this on a worker thread.
pub fn align_track(
    audio: &AudioData,
    track: &NoteTrack,
    config: &PipelineConfig,
) -> Result<AlignmentResult, PipelineError> {
    log::info!(
        "Aligning {} notes against {:.2} s of audio",
        track.len(),
        audio.duration_secs()
    );

    let reference = audio.to_mono();
    let reference_chroma = extract_chroma(&reference, audio.sample_rate, &config.chroma)?;
    log::debug!("Reference chroma: {} frames", reference_chroma.len());

    let rendered = synthesize(track, audio.sample_rate, &config.synth);
    let symbolic_chroma = extract_chroma(&rendered, audio.sample_rate, &config.chroma)?;
    log::debug!("Symbolic chroma: {} frames", symbolic_chroma.len());

    let warp = align::align(&reference_chroma, &symbolic_chroma)?;
    let aligned_track = warp.apply(track)?;
    log::info!("Global alignment produced {} control points", warp.points().len());

    Ok(AlignmentResult {
        warp,
        aligned_track,
        reference_chroma,
        symbolic_chroma,
    })
}

/// Phase 2: re-warp with user anchors, repeatable per edit
///
/// Operates on the chroma sequences produced by [`align_track`] and the
/// original (unwarped) note track. Each call is an independent computation,
/// so a host throttling anchor drags simply calls it again and discards
/// stale results.
pub fn refine_track(
    reference_chroma: &ChromaSequence,
    symbolic_chroma: &ChromaSequence,
    track: &NoteTrack,
    anchors: &[Anchor],
) -> Result<RefinementResult, PipelineError> {
    let bounds = TrackBounds::from_ends(
        track.end_secs().max(symbolic_chroma.end_time()),
        reference_chroma.end_time(),
    );
    log::info!(
        "Refining with {} anchors over {:.2} s",
        anchors.len(),
        bounds.sym_end
    );

    let warp = align::rewarp(reference_chroma, symbolic_chroma, anchors, bounds)?;
    let aligned_track = warp.apply(track)?;

    Ok(RefinementResult {
        warp,
        aligned_track,
    })
}
