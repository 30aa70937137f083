pub mod conversation;
pub mod gemini;
pub mod generation;

pub use gemini::GeminiService;
pub use generation::{FragmentStream, GenerationProvider, GenerationRequest};
