use reqwest::blocking::Client;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::transcript::{TranscriptEntry, TranscriptRole};

pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";
pub const GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta/models";
pub const LOCAL_BASE_URL: &str = "http://localhost:1234/v1";

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{status}: {message}")]
    Status { status: u16, message: String },

    #[error("response contained no text")]
    EmptyResponse,

    #[error("{0}")]
    Other(String),
}

/// The remote reply generator. Called from the ReplyWorker thread only,
/// one request at a time.
pub trait ReplyGenerator: Send + 'static {
    fn generate(
        &self,
        history: &[TranscriptEntry],
        request: &TranscriptEntry,
        instructions: &str,
    ) -> Result<String, GenerationError>;
}

impl<F> ReplyGenerator for F
where
    F: Fn(&[TranscriptEntry], &TranscriptEntry, &str) -> Result<String, GenerationError>
        + Send
        + 'static,
{
    fn generate(
        &self,
        history: &[TranscriptEntry],
        request: &TranscriptEntry,
        instructions: &str,
    ) -> Result<String, GenerationError> {
        self(history, request, instructions)
    }
}

/* =========================
   Gemini
   ========================= */

pub struct GeminiClient {
    client: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl GeminiClient {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            api_key: api_key.into(),
            model: model.into(),
            base_url: GEMINI_BASE_URL.into(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn request_body(
        history: &[TranscriptEntry],
        request: &TranscriptEntry,
        instructions: &str,
    ) -> GenerateContentRequest {
        let contents = history
            .iter()
            .chain(std::iter::once(request))
            .map(|entry| Content {
                role: entry.role.as_str().to_string(),
                parts: vec![Part {
                    text: entry.text.clone(),
                }],
            })
            .collect();

        let system_instruction = (!instructions.trim().is_empty()).then(|| Content {
            role: "system".to_string(),
            parts: vec![Part {
                text: instructions.to_string(),
            }],
        });

        GenerateContentRequest {
            contents,
            system_instruction,
        }
    }
}

impl ReplyGenerator for GeminiClient {
    fn generate(
        &self,
        history: &[TranscriptEntry],
        request: &TranscriptEntry,
        instructions: &str,
    ) -> Result<String, GenerationError> {
        let url = format!(
            "{}/{}:generateContent?key={}",
            self.base_url, self.model, self.api_key
        );
        let body = Self::request_body(history, request, instructions);

        let resp = self.client.post(url).json(&body).send()?;

        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().unwrap_or_default();
            return Err(map_gemini_error(status, &text));
        }

        extract_gemini_text(resp.json()?)
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
    contents: Vec<Content>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content>,
}

#[derive(Serialize, Deserialize)]
struct Content {
    role: String,
    parts: Vec<Part>,
}

#[derive(Serialize, Deserialize)]
struct Part {
    text: String,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    candidates: Option<Vec<Candidate>>,
}

#[derive(Deserialize)]
struct Candidate {
    content: Option<CandidateContent>,
}

#[derive(Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<CandidatePart>,
}

#[derive(Deserialize)]
struct CandidatePart {
    text: Option<String>,
}

#[derive(Deserialize)]
struct ErrorWrapper {
    error: ErrorBody,
}

#[derive(Deserialize)]
struct ErrorBody {
    message: Option<String>,
    status: Option<String>,
}

fn extract_gemini_text(resp: GenerateContentResponse) -> Result<String, GenerationError> {
    let text: String = resp
        .candidates
        .and_then(|candidates| candidates.into_iter().next())
        .and_then(|candidate| candidate.content)
        .map(|content| content.parts.into_iter().filter_map(|p| p.text).collect())
        .unwrap_or_default();

    if text.is_empty() {
        Err(GenerationError::EmptyResponse)
    } else {
        Ok(text)
    }
}

fn map_gemini_error(status: StatusCode, body: &str) -> GenerationError {
    let message = serde_json::from_str::<ErrorWrapper>(body)
        .map(|wrapper| {
            let msg = wrapper.error.message.unwrap_or_else(|| body.to_string());
            match wrapper.error.status {
                Some(s) if !s.is_empty() => format!("{s}: {msg}"),
                _ => msg,
            }
        })
        .unwrap_or_else(|_| body.to_string());

    GenerationError::Status {
        status: status.as_u16(),
        message,
    }
}

/* =========================
   Backend selection
   ========================= */

/// The configured backend, chosen at start-up.
pub enum Backend {
    Gemini(GeminiClient),
    OpenAiCompatible(OpenAiCompatibleClient),
}

impl ReplyGenerator for Backend {
    fn generate(
        &self,
        history: &[TranscriptEntry],
        request: &TranscriptEntry,
        instructions: &str,
    ) -> Result<String, GenerationError> {
        match self {
            Backend::Gemini(client) => client.generate(history, request, instructions),
            Backend::OpenAiCompatible(client) => client.generate(history, request, instructions),
        }
    }
}

/* =========================
   OpenAI-compatible (LM Studio)
   ========================= */

pub struct OpenAiCompatibleClient {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
    temperature: f32,
}

impl OpenAiCompatibleClient {
    pub fn new(base_url: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.into(),
            model: model.into(),
            api_key: None,
            temperature: 0.7,
        }
    }

    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = (!key.trim().is_empty()).then_some(key);
        self
    }

    fn request_body(
        &self,
        history: &[TranscriptEntry],
        request: &TranscriptEntry,
        instructions: &str,
    ) -> ChatCompletionRequest {
        let mut messages = vec![ChatMessage {
            role: "system".into(),
            content: instructions.to_string(),
        }];
        messages.extend(
            history
                .iter()
                .chain(std::iter::once(request))
                .map(|entry| ChatMessage {
                    role: match entry.role {
                        TranscriptRole::User => "user".into(),
                        TranscriptRole::Model => "assistant".into(),
                    },
                    content: entry.text.clone(),
                }),
        );

        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            temperature: self.temperature,
        }
    }
}

impl ReplyGenerator for OpenAiCompatibleClient {
    fn generate(
        &self,
        history: &[TranscriptEntry],
        request: &TranscriptEntry,
        instructions: &str,
    ) -> Result<String, GenerationError> {
        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        let body = self.request_body(history, request, instructions);

        let mut req = self.client.post(url).json(&body);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let resp = req.send()?;
        let status = resp.status();
        if !status.is_success() {
            return Err(GenerationError::Status {
                status: status.as_u16(),
                message: resp.text().unwrap_or_default(),
            });
        }

        let resp: ChatCompletionResponse = resp.json()?;
        resp.choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .filter(|content| !content.is_empty())
            .ok_or(GenerationError::EmptyResponse)
    }
}

#[derive(Serialize)]
struct ChatCompletionRequest {
    model: String,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Serialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Deserialize)]
struct ChatCompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChatMessageResponse,
}

#[derive(Deserialize)]
struct ChatMessageResponse {
    content: String,
}
