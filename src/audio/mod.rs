// Audio processing module
// WAV ingestion and chroma feature extraction

pub mod chroma;
pub mod ingest;

pub use chroma::{extract_chroma, ChromaConfig, ChromaError, ChromaSequence};
pub use ingest::{ingest_wav, AudioData, AudioError};
