// src/classify.rs
//! External billability classification.
//!
//! Talks to an OpenAI-compatible chat-completions endpoint. The contract
//! with the rest of the system is narrow: take distinct unmapped purposes,
//! return a tag per purpose, isolate per-item failures as Unbekannt, and
//! never run without an explicit user action.

use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::timesheet::Billability;
use crate::Config;

pub const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

const MAX_ATTEMPTS: u32 = 3;
const SYSTEM_MSG: &str = "You classify time bookings of a consultancy by billability.";

#[derive(Debug, Error)]
pub enum ClassifyError {
    #[error("OPENAI_API_KEY is not set; classification is disabled")]
    MissingApiKey,
    #[error("HTTP request to classification service failed")]
    Request(#[from] reqwest::Error),
    #[error("classification service returned status {status}: {message}")]
    Api { status: StatusCode, message: String },
    #[error("classification service returned an empty completion")]
    EmptyCompletion,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    temperature: f32,
    messages: Vec<ChatMessage<'a>>,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    content: Option<String>,
}

/// Maps a model answer onto a tag. Anything that does not clearly start
/// with intern/extern counts as Unknown rather than guessing.
pub fn interpret_answer(answer: &str) -> Billability {
    let lower = answer.trim().to_lowercase();
    if lower.starts_with("intern") {
        Billability::Internal
    } else if lower.starts_with("extern") {
        Billability::External
    } else {
        Billability::Unknown
    }
}

fn build_prompt(purpose: &str) -> String {
    format!(
        "The purpose below comes from a time booking. Classify it as \
         'Extern' (client project work such as calculations, certification, \
         planning, audits) or 'Intern' (company-internal work such as \
         acquisition, internal meetings, administration). If it is not \
         clearly internal, answer Extern.\n\nPurpose: \"{}\"\n\n\
         Answer with exactly one word: Intern or Extern.",
        purpose
    )
}

#[derive(Clone)]
pub struct ClassifierClient {
    http: Client,
    api_key: String,
    model: String,
    base_url: String,
}

impl ClassifierClient {
    pub fn from_config(config: &Config) -> Result<Self, ClassifyError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or(ClassifyError::MissingApiKey)?;
        let http = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()?;
        Ok(Self {
            http,
            api_key,
            model: config.openai_model.clone(),
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn request_once(&self, purpose: &str) -> Result<Billability, ClassifyError> {
        let prompt = build_prompt(purpose);
        let request = ChatRequest {
            model: &self.model,
            temperature: 0.0,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: SYSTEM_MSG,
                },
                ChatMessage {
                    role: "user",
                    content: &prompt,
                },
            ],
        };

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "failed to read error body".to_string());
            return Err(ClassifyError::Api { status, message });
        }

        let parsed = response.json::<ChatResponse>().await?;
        let content = parsed
            .choices
            .first()
            .and_then(|c| c.message.content.as_deref())
            .ok_or(ClassifyError::EmptyCompletion)?;

        Ok(interpret_answer(content))
    }

    /// Classifies one purpose, retrying transient failures with exponential
    /// backoff before giving up.
    pub async fn classify_purpose(&self, purpose: &str) -> Result<Billability, ClassifyError> {
        let mut last_err = None;
        for attempt in 0..MAX_ATTEMPTS {
            if attempt > 0 {
                let delay = std::time::Duration::from_secs_f64(1.5_f64.powi(attempt as i32));
                debug!(
                    "Retrying classification of '{}' in {:.1}s (attempt {}/{})",
                    purpose,
                    delay.as_secs_f64(),
                    attempt + 1,
                    MAX_ATTEMPTS
                );
                sleep(delay).await;
            }
            match self.request_once(purpose).await {
                Ok(tag) => return Ok(tag),
                Err(e) => {
                    warn!("Classification attempt failed for '{}': {}", purpose, e);
                    last_err = Some(e);
                }
            }
        }
        Err(last_err.unwrap_or(ClassifyError::EmptyCompletion))
    }

    /// Classifies purposes sequentially. A failing item yields Unbekannt and
    /// the batch continues; nothing here aborts the whole run.
    pub async fn classify_batch(&self, purposes: &[String]) -> Vec<(String, Billability)> {
        let mut results = Vec::with_capacity(purposes.len());
        for purpose in purposes {
            let tag = match self.classify_purpose(purpose).await {
                Ok(tag) => tag,
                Err(e) => {
                    warn!("Giving up on '{}', keeping it Unbekannt: {}", purpose, e);
                    Billability::Unknown
                }
            };
            results.push((purpose.clone(), tag));
        }
        info!("Classified {} purposes", results.len());
        results
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn answer_interpretation() {
        assert_eq!(interpret_answer("Intern"), Billability::Internal);
        assert_eq!(interpret_answer("  extern."), Billability::External);
        assert_eq!(interpret_answer("EXTERN"), Billability::External);
        assert_eq!(interpret_answer("Internal work"), Billability::Internal);
        assert_eq!(interpret_answer("keine Ahnung"), Billability::Unknown);
        assert_eq!(interpret_answer(""), Billability::Unknown);
    }
}
