// Render engine
// Synthesizes note tracks into audio for chroma comparison

pub mod synth;

pub use synth::{synthesize, SynthConfig};
