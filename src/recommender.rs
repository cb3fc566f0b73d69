//! Genre suggestions from a chat completion model.
//!
//! One prompt, one call: the model is asked for a bare JSON array of genres
//! and the reply is parsed and cleaned up here. There is no retry or
//! multi-step flow.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::config::LlmConfig;

const CONNECT_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RecommendError {
    #[error("genre recommendations are not configured")]
    NotConfigured,
    #[error("recommendation request failed: {0}")]
    Request(String),
    #[error("recommendation service returned {status}: {body}")]
    Api { status: u16, body: String },
    #[error("could not parse recommendations: {0}")]
    Parse(String),
}

/// GenreRecommender
///
/// `recommend` returns genres related to `current_genres`, never including
/// any of them. An empty input asks for general suggestions.
#[async_trait]
pub trait GenreRecommender: Send + Sync {
    async fn recommend(&self, current_genres: &[String]) -> Result<Vec<String>, RecommendError>;
}

pub type RecommenderState = Arc<dyn GenreRecommender>;

/// build_prompt
///
/// The single prompt sent to the model. The current genres are rendered as
/// a JSON array so names with commas survive.
pub fn build_prompt(current_genres: &[String]) -> String {
    let current = serde_json::to_string(current_genres).unwrap_or_else(|_| "[]".to_string());
    format!(
        "Com base nos gêneros selecionados atualmente: {current}, \
recomende outros gêneros que o usuário possa se interessar. \
Inclua apenas gêneros relacionados a livros e audiolivros. \
Retorne um array JSON de strings representando os gêneros recomendados. \
Não inclua nenhum dos gêneros selecionados atualmente no array retornado. \
Não inclua nenhum texto explicativo, apenas o array JSON. \
Exemplo: [\"Mistério\", \"Suspense\", \"Ficção Científica\"]"
    )
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WrappedGenres {
    recommended_genres: Vec<String>,
}

/// parse_genres
///
/// Extracts the genre list from a model reply. Accepts a bare array, an
/// array inside Markdown fences or surrounding prose, or an object with a
/// `recommendedGenres` field. Entries are trimmed, blanks dropped, inputs
/// removed and duplicates collapsed (all case-insensitively).
pub fn parse_genres(reply: &str, current_genres: &[String]) -> Result<Vec<String>, RecommendError> {
    let trimmed = reply.trim();

    let raw: Vec<String> = if let Ok(wrapped) = serde_json::from_str::<WrappedGenres>(trimmed) {
        wrapped.recommended_genres
    } else {
        let start = trimmed
            .find('[')
            .ok_or_else(|| RecommendError::Parse("no JSON array in reply".to_string()))?;
        let end = trimmed
            .rfind(']')
            .filter(|end| *end > start)
            .ok_or_else(|| RecommendError::Parse("unterminated JSON array".to_string()))?;
        serde_json::from_str(&trimmed[start..=end]).map_err(|e| RecommendError::Parse(e.to_string()))?
    };

    let excluded: Vec<String> = current_genres.iter().map(|g| g.trim().to_lowercase()).collect();
    let mut seen: Vec<String> = Vec::new();
    let mut genres = Vec::new();
    for genre in raw {
        let genre = genre.trim();
        let key = genre.to_lowercase();
        if genre.is_empty() || excluded.contains(&key) || seen.contains(&key) {
            continue;
        }
        seen.push(key);
        genres.push(genre.to_string());
    }
    Ok(genres)
}

// =============================================================================
// OPENAI-COMPATIBLE CLIENT
// =============================================================================

#[derive(Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: [ChatMessage<'a>; 1],
}

#[derive(Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
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
    #[serde(default)]
    content: Option<String>,
}

/// LlmGenreRecommender
///
/// Calls `{base_url}/chat/completions` with bearer auth.
pub struct LlmGenreRecommender {
    http: reqwest::Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl LlmGenreRecommender {
    pub fn new(api_key: String, config: &LlmConfig) -> Result<Self, RecommendError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| RecommendError::Request(e.to_string()))?;
        Ok(Self {
            http,
            api_key,
            model: config.model.clone(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }
}

#[async_trait]
impl GenreRecommender for LlmGenreRecommender {
    async fn recommend(&self, current_genres: &[String]) -> Result<Vec<String>, RecommendError> {
        let prompt = build_prompt(current_genres);
        let body = ChatRequest {
            model: &self.model,
            messages: [ChatMessage {
                role: "user",
                content: &prompt,
            }],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| RecommendError::Request(e.to_string()))?;

        let status = response.status().as_u16();
        let text = response
            .text()
            .await
            .map_err(|e| RecommendError::Request(e.to_string()))?;
        if status != 200 {
            return Err(RecommendError::Api { status, body: text });
        }

        let parsed: ChatResponse =
            serde_json::from_str(&text).map_err(|e| RecommendError::Parse(e.to_string()))?;
        let reply = parsed
            .choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| RecommendError::Parse("empty completion".to_string()))?;

        parse_genres(&reply, current_genres)
    }
}

/// DisabledGenreRecommender
///
/// Installed when no LLM API key is configured.
pub struct DisabledGenreRecommender;

#[async_trait]
impl GenreRecommender for DisabledGenreRecommender {
    async fn recommend(&self, _current_genres: &[String]) -> Result<Vec<String>, RecommendError> {
        Err(RecommendError::NotConfigured)
    }
}

/// MockGenreRecommender
///
/// Replays a canned model reply through `parse_genres`, so tests exercise
/// the same cleanup as the real client.
#[derive(Clone, Default)]
pub struct MockGenreRecommender {
    pub reply: String,
    pub should_fail: bool,
}

impl MockGenreRecommender {
    pub fn replying(reply: &str) -> Self {
        Self {
            reply: reply.to_string(),
            should_fail: false,
        }
    }

    pub fn new_failing() -> Self {
        Self {
            reply: String::new(),
            should_fail: true,
        }
    }
}

#[async_trait]
impl GenreRecommender for MockGenreRecommender {
    async fn recommend(&self, current_genres: &[String]) -> Result<Vec<String>, RecommendError> {
        if self.should_fail {
            return Err(RecommendError::Api {
                status: 500,
                body: "Mock Recommender Error: Simulation requested".to_string(),
            });
        }
        parse_genres(&self.reply, current_genres)
    }
}

/// from_config
///
/// Picks the recommender for the loaded configuration.
pub fn from_config(config: &LlmConfig) -> RecommenderState {
    match &config.api_key {
        Some(key) => match LlmGenreRecommender::new(key.clone(), config) {
            Ok(client) => Arc::new(client),
            Err(e) => {
                tracing::error!(error = %e, "failed to build LLM client; recommendations disabled");
                Arc::new(DisabledGenreRecommender)
            }
        },
        None => {
            tracing::warn!("LLM_API_KEY not set; genre recommendations disabled");
            Arc::new(DisabledGenreRecommender)
        }
    }
}
