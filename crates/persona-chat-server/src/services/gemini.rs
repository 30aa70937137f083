use crate::config::GeminiConfig;
use crate::services::generation::{FragmentStream, GenerationProvider, GenerationRequest};
use anyhow::{Context, Result};
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, warn};

#[derive(Error, Debug)]
pub enum GeminiError {
    #[error("Gemini API key is not configured (set GEMINI_API_KEY)")]
    MissingApiKey,

    #[error("Gemini network error: {0}")]
    Transport(String),

    #[error("Gemini API error ({status}): {body}")]
    Status { status: u16, body: String },

    #[error("Gemini stream error: {0}")]
    Stream(String),
}

// ===== Wire types (generateContent REST API) =====

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    system_instruction: GeminiContent<'a>,
    contents: Vec<GeminiContent<'a>>,
    generation_config: GeminiGenerationConfig,
}

#[derive(Serialize)]
struct GeminiContent<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'a str>,
    parts: Vec<GeminiPart<'a>>,
}

#[derive(Serialize)]
struct GeminiPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    temperature: f32,
    top_p: f32,
    top_k: u32,
    max_output_tokens: u32,
}

#[derive(Deserialize)]
struct GenerateContentChunk {
    #[serde(default)]
    candidates: Vec<Candidate>,
    #[serde(default)]
    error: Option<ErrorBody>,
}

#[derive(Deserialize)]
struct Candidate {
    #[serde(default)]
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    #[serde(default)]
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
}

#[derive(Clone)]
pub struct GeminiService {
    client: Client,
    config: GeminiConfig,
}

impl GeminiService {
    pub fn new(config: GeminiConfig) -> Result<Self> {
        // No overall timeout: a response may stream for as long as the model writes.
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(config.connect_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        if config.api_key.is_empty() {
            warn!("Gemini API key is empty; every generation call will fail");
        }

        Ok(Self { client, config })
    }

    fn stream_url(&self, model: &str) -> String {
        format!(
            "{}/v1beta/models/{}:streamGenerateContent?alt=sse",
            self.config.base_url.trim_end_matches('/'),
            model
        )
    }

    async fn open_stream(&self, request: &GenerationRequest) -> Result<reqwest::Response, GeminiError> {
        if self.config.api_key.is_empty() {
            return Err(GeminiError::MissingApiKey);
        }

        let body = GenerateContentRequest {
            system_instruction: GeminiContent {
                role: None,
                parts: vec![GeminiPart {
                    text: &request.system_instruction,
                }],
            },
            contents: vec![GeminiContent {
                role: Some("user"),
                parts: vec![GeminiPart {
                    text: &request.prompt,
                }],
            }],
            generation_config: GeminiGenerationConfig {
                temperature: request.temperature,
                top_p: request.top_p,
                top_k: request.top_k,
                max_output_tokens: request.max_output_tokens,
            },
        };

        let response = self
            .client
            .post(self.stream_url(&request.model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| GeminiError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(GeminiError::Status { status, body });
        }

        Ok(response)
    }
}

#[async_trait::async_trait]
impl GenerationProvider for GeminiService {
    async fn generate_stream(&self, request: GenerationRequest) -> Result<FragmentStream> {
        debug!(
            model = %request.model,
            temperature = request.temperature,
            prompt_len = request.prompt.len(),
            "Opening Gemini stream"
        );

        let response = self.open_stream(&request).await?;
        let mut body = response.bytes_stream();

        let stream = async_stream::stream! {
            let mut decoder = SseDecoder::default();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(anyhow::Error::from(GeminiError::Stream(e.to_string())));
                        return;
                    }
                };

                for payload in decoder.push(&chunk) {
                    match parse_fragment(&payload) {
                        Ok(Some(text)) => {
                            yield Ok(text);
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(anyhow::Error::from(e));
                            return;
                        }
                    }
                }
            }

            for payload in decoder.finish() {
                match parse_fragment(&payload) {
                    Ok(Some(text)) => {
                        yield Ok(text);
                    }
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(anyhow::Error::from(e));
                    }
                }
            }
        };

        Ok(Box::pin(stream))
    }
}

/// Extract the text carried by one SSE `data:` payload.
///
/// Returns `Ok(None)` for chunks without text (safety ratings, usage metadata).
fn parse_fragment(payload: &str) -> Result<Option<String>, GeminiError> {
    let chunk: GenerateContentChunk = serde_json::from_str(payload)
        .map_err(|e| GeminiError::Stream(format!("invalid chunk: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(GeminiError::Stream(error.message));
    }

    let text: String = chunk
        .candidates
        .first()
        .and_then(|c| c.content.as_ref())
        .map(|content| {
            content
                .parts
                .iter()
                .filter_map(|p| p.text.as_deref())
                .collect()
        })
        .unwrap_or_default();

    Ok(if text.is_empty() { None } else { Some(text) })
}

/// Reassembles SSE `data:` lines from arbitrarily split network chunks.
#[derive(Default)]
struct SseDecoder {
    buffer: Vec<u8>,
}

impl SseDecoder {
    fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        self.buffer.extend_from_slice(bytes);

        let mut payloads = Vec::new();
        while let Some(pos) = self.buffer.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=pos).collect();
            if let Some(data) = data_field(&line) {
                payloads.push(data);
            }
        }
        payloads
    }

    fn finish(&mut self) -> Vec<String> {
        let line = std::mem::take(&mut self.buffer);
        data_field(&line).into_iter().collect()
    }
}

fn data_field(line: &[u8]) -> Option<String> {
    let line = String::from_utf8_lossy(line);
    let line = line.trim_end_matches(['\r', '\n']);
    let data = line.strip_prefix("data:")?.trim_start();
    if data.is_empty() || data == "[DONE]" {
        None
    } else {
        Some(data.to_string())
    }
}
