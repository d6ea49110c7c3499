use async_trait::async_trait;
use reqwest::StatusCode;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, warn};

use crate::metrics::UPSTREAM_CALLS;

pub const DEFAULT_GEMINI_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-1.5-flash";

#[derive(Debug, Error)]
pub enum ChatError {
    #[error("user input cannot be empty")]
    EmptyMessage,
    #[error("generative backend API key is not configured")]
    MissingCredential,
    #[error("request to generative backend failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("generative backend responded with status {status}: {body}")]
    Backend { status: StatusCode, body: String },
    #[error("could not decode generative backend response: {0}")]
    Decode(String),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Role {
    System,
    User,
    Model,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }

    pub fn model(content: impl Into<String>) -> Self {
        Self { role: Role::Model, content: content.into() }
    }
}

// Fixed persona plus exemplar dialogue prepended to every request.
#[derive(Clone, Debug)]
pub struct Seed {
    system: String,
    exemplars: Vec<Turn>,
}

impl Seed {
    pub fn new(system: impl Into<String>, exemplars: Vec<Turn>) -> Self {
        Self {
            system: system.into(),
            exemplars,
        }
    }

    pub fn exemplars(&self) -> &[Turn] {
        &self.exemplars
    }
}

// Ordered turns for one chat request: system, seed exemplars, new user turn,
// then the model reply once received. Never outlives the request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ConversationHistory {
    turns: Vec<Turn>,
}

impl ConversationHistory {
    pub fn turns(&self) -> &[Turn] {
        &self.turns
    }

    pub fn system_instruction(&self) -> Option<&str> {
        self.turns
            .first()
            .filter(|t| t.role == Role::System)
            .map(|t| t.content.as_str())
    }

    // Everything after the system instruction.
    pub fn dialogue(&self) -> &[Turn] {
        match self.turns.first() {
            Some(t) if t.role == Role::System => &self.turns[1..],
            _ => &self.turns,
        }
    }

    fn push(&mut self, turn: Turn) {
        self.turns.push(turn);
    }
}

#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerationParams {
    pub temperature: f32,
    pub top_k: u32,
    pub top_p: f32,
    pub max_output_tokens: u32,
    pub response_mime_type: String,
}

impl Default for GenerationParams {
    fn default() -> Self {
        Self {
            temperature: 1.0,
            top_k: 64,
            top_p: 0.95,
            max_output_tokens: 8192,
            response_mime_type: "text/plain".to_string(),
        }
    }
}

#[async_trait]
pub trait GenerativeBackend: Send + Sync {
    // Returns the concatenated text of the model's answer; an empty answer is not an error.
    async fn dispatch(
        &self,
        history: &ConversationHistory,
        params: &GenerationParams,
    ) -> Result<String, ChatError>;
}

pub struct ConversationAssembler {
    seed: Seed,
    params: GenerationParams,
    backend: Arc<dyn GenerativeBackend>,
}

impl ConversationAssembler {
    pub fn new(seed: Seed, params: GenerationParams, backend: Arc<dyn GenerativeBackend>) -> Self {
        Self { seed, params, backend }
    }

    pub fn assemble(&self, user_message: &str) -> Result<ConversationHistory, ChatError> {
        if user_message.trim().is_empty() {
            return Err(ChatError::EmptyMessage);
        }
        let mut turns = Vec::with_capacity(self.seed.exemplars.len() + 3);
        turns.push(Turn::system(self.seed.system.clone()));
        turns.extend(self.seed.exemplars.iter().cloned());
        turns.push(Turn::user(user_message));
        Ok(ConversationHistory { turns })
    }

    pub async fn reply(&self, user_message: &str) -> Result<String, ChatError> {
        let mut history = self.assemble(user_message)?;
        let reply = self.backend.dispatch(&history, &self.params).await?;
        history.push(Turn::model(reply.clone()));
        debug!(turns = history.turns().len(), "conversation completed");
        Ok(reply)
    }
}

// Gemini `generateContent` client.
#[derive(Clone)]
pub struct GeminiBackend {
    client: reqwest::Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl GeminiBackend {
    pub fn new(client: reqwest::Client, api_key: Option<String>) -> Self {
        Self {
            client,
            base_url: DEFAULT_GEMINI_BASE_URL.to_string(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    fn generate_url(&self) -> String {
        let base = self.base_url.trim_end_matches('/');
        let model = self.model.trim();
        if model.starts_with("models/") {
            format!("{base}/{model}:generateContent")
        } else {
            format!("{base}/models/{model}:generateContent")
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<Content<'a>>,
    contents: Vec<Content<'a>>,
    generation_config: &'a GenerationParams,
}

#[derive(Serialize)]
struct Content<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    role: Option<&'static str>,
    parts: [TextPart<'a>; 1],
}

#[derive(Serialize)]
struct TextPart<'a> {
    text: &'a str,
}

#[derive(Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
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

fn to_content(turn: &Turn) -> Option<Content<'_>> {
    let role = match turn.role {
        Role::User => "user",
        Role::Model => "model",
        // carried separately as systemInstruction
        Role::System => return None,
    };
    Some(Content {
        role: Some(role),
        parts: [TextPart { text: &turn.content }],
    })
}

#[async_trait]
impl GenerativeBackend for GeminiBackend {
    async fn dispatch(
        &self,
        history: &ConversationHistory,
        params: &GenerationParams,
    ) -> Result<String, ChatError> {
        let api_key = self.api_key.as_deref().ok_or(ChatError::MissingCredential)?;

        let body = GenerateContentRequest {
            system_instruction: history.system_instruction().map(|text| Content {
                role: None,
                parts: [TextPart { text }],
            }),
            contents: history.dialogue().iter().filter_map(to_content).collect(),
            generation_config: params,
        };

        let res = match self
            .client
            .post(self.generate_url())
            .header("x-goog-api-key", api_key)
            .json(&body)
            .send()
            .await
        {
            Ok(res) => res,
            Err(e) => {
                UPSTREAM_CALLS.with_label_values(&["generative", "transport_error"]).inc();
                warn!(error = %e, "generative backend unreachable");
                return Err(ChatError::Transport(e));
            }
        };

        let status = res.status();
        if !status.is_success() {
            UPSTREAM_CALLS.with_label_values(&["generative", "upstream_error"]).inc();
            let body = res.text().await.unwrap_or_default();
            warn!(%status, "generative backend returned an error");
            return Err(ChatError::Backend { status, body });
        }

        let bytes = res.bytes().await?;
        let parsed: GenerateContentResponse = serde_json::from_slice(&bytes).map_err(|e| {
            UPSTREAM_CALLS.with_label_values(&["generative", "decode_error"]).inc();
            ChatError::Decode(e.to_string())
        })?;
        UPSTREAM_CALLS.with_label_values(&["generative", "ok"]).inc();

        let reply = parsed
            .candidates
            .into_iter()
            .next()
            .and_then(|c| c.content)
            .map(|content| {
                content
                    .parts
                    .into_iter()
                    .filter_map(|p| p.text)
                    .collect::<String>()
            })
            .unwrap_or_default();
        Ok(reply)
    }
}
