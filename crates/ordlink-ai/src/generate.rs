//! Generative-model backends behind one completion seam.
//!
//! The analyzer only ever needs one round: system instructions plus a user
//! prompt in, the model's text reply out. Both hosted flavours request JSON
//! output mode; the reply still gets the full strict parse downstream.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::AiConfig;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("analysis request failed: {0}")]
    Http(#[from] reqwest::Error),
    #[error("analysis provider returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("malformed completion response: {0}")]
    MalformedResponse(String),
    #[error("impact verdict is not valid JSON: {0}")]
    Parse(String),
    #[error("impact verdict missing required field `{0}`")]
    MissingField(&'static str),
    #[error("impact verdict field `{field}` has invalid value `{value}`")]
    InvalidField { field: &'static str, value: String },
}

/// Capability seam over chat/completion backends.
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// One completion round.
    async fn complete(&self, system: &str, user: &str) -> Result<String, AnalyzeError>;

    /// Identifier recorded on results produced through this model.
    fn model_name(&self) -> &str;
}

async fn read_success_body(response: reqwest::Response) -> Result<String, AnalyzeError> {
    let status = response.status();
    let body = response.text().await?;
    if !status.is_success() {
        return Err(AnalyzeError::Api {
            status: status.as_u16(),
            body,
        });
    }
    Ok(body)
}

// ── OpenAI ─────────────────────────────────────────────────────────────

/// OpenAI-flavoured completion backend (`POST /v1/chat/completions`).
pub struct OpenAiModel {
    client: reqwest::Client,
    config: AiConfig,
}

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    temperature: f32,
    response_format: ResponseFormat,
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    kind: &'static str,
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatReply,
}

#[derive(Deserialize)]
struct ChatReply {
    content: String,
}

impl OpenAiModel {
    pub fn new(config: &AiConfig) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let mut config = config.clone();
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerativeModel for OpenAiModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AnalyzeError> {
        let url = format!("{}/v1/chat/completions", self.config.base_url);
        let request = ChatRequest {
            model: &self.config.analysis_model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            temperature: 0.2,
            response_format: ResponseFormat {
                kind: "json_object",
            },
        };
        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let body = read_success_body(response).await?;
        let parsed: ChatResponse = serde_json::from_str(&body)
            .map_err(|e| AnalyzeError::MalformedResponse(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AnalyzeError::MalformedResponse("completion has no choices".into()))
    }

    fn model_name(&self) -> &str {
        &self.config.analysis_model
    }
}

// ── Gemini ─────────────────────────────────────────────────────────────

/// Gemini-flavoured completion backend (`:generateContent`).
pub struct GeminiModel {
    client: reqwest::Client,
    config: AiConfig,
}

#[derive(Serialize)]
struct GenerateRequest<'a> {
    #[serde(rename = "systemInstruction")]
    system_instruction: RequestContent<'a>,
    contents: Vec<RequestContent<'a>>,
    #[serde(rename = "generationConfig")]
    generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct RequestContent<'a> {
    parts: Vec<RequestPart<'a>>,
}

#[derive(Serialize)]
struct RequestPart<'a> {
    text: &'a str,
}

#[derive(Serialize)]
struct GenerationConfig {
    #[serde(rename = "responseMimeType")]
    response_mime_type: &'static str,
    temperature: f32,
}

#[derive(Deserialize)]
struct GenerateResponse {
    candidates: Vec<Candidate>,
}

#[derive(Deserialize)]
struct Candidate {
    content: CandidateContent,
}

#[derive(Deserialize)]
struct CandidateContent {
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: String,
}

impl GeminiModel {
    pub fn new(config: &AiConfig) -> Result<Self, AnalyzeError> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()?;
        let mut config = config.clone();
        config.base_url = config.base_url.trim_end_matches('/').to_string();
        Ok(Self { client, config })
    }
}

#[async_trait]
impl GenerativeModel for GeminiModel {
    async fn complete(&self, system: &str, user: &str) -> Result<String, AnalyzeError> {
        let url = format!(
            "{}/v1beta/models/{}:generateContent",
            self.config.base_url, self.config.analysis_model
        );
        let request = GenerateRequest {
            system_instruction: RequestContent {
                parts: vec![RequestPart { text: system }],
            },
            contents: vec![RequestContent {
                parts: vec![RequestPart { text: user }],
            }],
            generation_config: GenerationConfig {
                response_mime_type: "application/json",
                temperature: 0.2,
            },
        };
        let response = self
            .client
            .post(&url)
            .header("x-goog-api-key", &self.config.api_key)
            .json(&request)
            .send()
            .await?;
        let body = read_success_body(response).await?;
        let parsed: GenerateResponse = serde_json::from_str(&body)
            .map_err(|e| AnalyzeError::MalformedResponse(e.to_string()))?;
        let candidate = parsed
            .candidates
            .into_iter()
            .next()
            .ok_or_else(|| AnalyzeError::MalformedResponse("completion has no candidates".into()))?;
        let reply: String = candidate
            .content
            .parts
            .into_iter()
            .map(|part| part.text)
            .collect();
        Ok(reply)
    }

    fn model_name(&self) -> &str {
        &self.config.analysis_model
    }
}
