use anyhow::Result;
use futures::stream::Stream;
use std::pin::Pin;

/// Lazy sequence of generated text fragments.
pub type FragmentStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// Everything one generation call needs.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationRequest {
    pub model: String,
    pub system_instruction: String,
    pub temperature: f32,
    pub top_p: f32,
    pub top_k: u32,
    pub max_output_tokens: u32,
    pub prompt: String,
}

/// Hosted text generation.
///
/// `generate_stream` fails only when the request cannot be set up; once it
/// returns, fragments (or a mid-stream error) arrive through the stream.
#[cfg_attr(test, mockall::automock)]
#[async_trait::async_trait]
pub trait GenerationProvider: Send + Sync {
    async fn generate_stream(&self, request: GenerationRequest) -> Result<FragmentStream>;
}
