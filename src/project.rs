// Project persistence
// Serializes the plain data the engine is constructed from: the note track,
// the anchor set, and the extraction settings, plus file references for the
// audio the host re-loads on open

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::align::Anchor;
use crate::audio::ChromaConfig;
use crate::track::NoteTrack;

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// A saved alignment session
///
/// Audio is stored by reference, not by value; the host re-ingests the
/// referenced files when the project is opened. Warp functions are not
/// persisted, since they are recomputed from the track and anchors.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Project {
    /// Path of the reference recording
    pub audio_path: PathBuf,

    /// The original (unwarped) note track
    pub track: NoteTrack,

    /// User-placed anchors, ordered by symbolic time
    pub anchors: Vec<Anchor>,

    /// Extraction settings the session was created with
    pub chroma: ChromaConfig,
}

impl Project {
    pub fn new(audio_path: PathBuf, track: NoteTrack) -> Self {
        Project {
            audio_path,
            track,
            anchors: Vec::new(),
            chroma: ChromaConfig::default(),
        }
    }

    /// Load a project from a JSON file
    pub fn load(path: &Path) -> Result<Project, ProjectError> {
        let contents = fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Save the project as pretty-printed JSON
    pub fn save(&self, path: &Path) -> Result<(), ProjectError> {
        let json = serde_json::to_string_pretty(self)?;
        fs::write(path, json)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::track::NoteEvent;

    #[test]
    fn test_save_load_roundtrip() {
        let track = NoteTrack::from_events(vec![NoteEvent {
            onset_secs: 0.5,
            duration_secs: 1.0,
            pitch: 60,
            velocity: 90,
        }]);
        let mut project = Project::new(PathBuf::from("take_3.wav"), track);
        project.anchors.push(Anchor {
            sym_secs: 2.0,
            ref_secs: 1.8,
        });

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("session.json");
        project.save(&path).unwrap();

        let loaded = Project::load(&path).unwrap();
        assert_eq!(loaded.audio_path, project.audio_path);
        assert_eq!(loaded.track, project.track);
        assert_eq!(loaded.anchors, project.anchors);
    }

    #[test]
    fn test_load_missing_file_is_io_error() {
        let result = Project::load(Path::new("/nonexistent/session.json"));
        assert!(matches!(result, Err(ProjectError::Io(_))));
    }
}
