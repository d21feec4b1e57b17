//! Scorer backed by an OpenAI-compatible chat completions endpoint.

use super::{PriorityScorer, ScoreInput, heuristic_priority_score, round2};
use crate::types::format_datetime;
use async_trait::async_trait;
use regex_lite::Regex;
use serde::Deserialize;
use std::sync::LazyLock;
use std::time::Duration;
use tracing::{debug, warn};

static NUMBER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"-?\d+(?:\.\d+)?").expect("valid regex"));

const SYSTEM_PROMPT: &str = "You rate how urgent a personal task is. \
Reply with a single number between 0 and 100 and nothing else.";

/// Connection settings for [`LlmScorer`].
#[derive(Debug, Clone)]
pub struct LlmScorerConfig {
    pub api_key: String,
    /// Base URL without the `/v1` suffix.
    pub base_url: String,
    pub model: String,
    pub timeout: Duration,
}

impl LlmScorerConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: "https://api.openai.com".into(),
            model: model.into(),
            timeout: Duration::from_secs(10),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into();
        self
    }

    pub fn with_timeout_secs(mut self, secs: u64) -> Self {
        self.timeout = Duration::from_secs(secs);
        self
    }
}

#[derive(Deserialize)]
struct CompletionResponse {
    choices: Vec<Choice>,
}

#[derive(Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

/// Asks a language model for the score and falls back to the heuristic on
/// any transport, status, or parse failure.
pub struct LlmScorer {
    config: LlmScorerConfig,
    client: reqwest::Client,
}

impl LlmScorer {
    pub fn new(config: LlmScorerConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(config.timeout).build()?;
        Ok(Self { config, client })
    }

    fn endpoint(&self) -> String {
        format!(
            "{}/v1/chat/completions",
            self.config.base_url.trim_end_matches('/')
        )
    }

    fn build_request(&self, input: &ScoreInput) -> serde_json::Value {
        let due = input
            .due_date
            .as_ref()
            .map(format_datetime)
            .unwrap_or_else(|| "none".to_string());
        let hours = input
            .estimated_hours
            .map(|h| h.to_string())
            .unwrap_or_else(|| "unknown".to_string());

        let prompt = format!(
            "Task: {}\nDescription: {}\nPriority: {}\nDue: {}\nEstimated hours: {}\nNow: {}",
            input.title,
            input.description.as_deref().unwrap_or(""),
            input.priority,
            due,
            hours,
            format_datetime(&input.now),
        );

        serde_json::json!({
            "model": self.config.model,
            "messages": [
                {"role": "system", "content": SYSTEM_PROMPT},
                {"role": "user", "content": prompt},
            ],
            "temperature": 0,
            "stream": false,
        })
    }

    async fn request_score(&self, input: &ScoreInput) -> anyhow::Result<f64> {
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.config.api_key)
            .json(&self.build_request(input))
            .send()
            .await?
            .error_for_status()?;

        let body: CompletionResponse = response.json().await?;
        let content = body
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .ok_or_else(|| anyhow::anyhow!("completion has no content"))?;

        parse_score(&content)
            .ok_or_else(|| anyhow::anyhow!("no number in completion: {content:?}"))
    }
}

/// First number in the reply, clamped to [0, 100].
pub(crate) fn parse_score(content: &str) -> Option<f64> {
    let value: f64 = NUMBER.find(content)?.as_str().parse().ok()?;
    value.is_finite().then(|| round2(value.clamp(0.0, 100.0)))
}

#[async_trait]
impl PriorityScorer for LlmScorer {
    async fn score(&self, input: &ScoreInput) -> f64 {
        match self.request_score(input).await {
            Ok(score) => {
                debug!(score, model = %self.config.model, "LLM priority score");
                score
            }
            Err(e) => {
                warn!("LLM scoring failed, using heuristic: {}", e);
                heuristic_priority_score(
                    input.priority,
                    input.due_date,
                    input.estimated_hours,
                    input.now,
                )
            }
        }
    }

    fn name(&self) -> &'static str {
        "llm"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_score() {
        assert_eq!(parse_score("72"), Some(72.0));
        assert_eq!(parse_score("Score: 55.5 out of 100"), Some(55.5));
        assert_eq!(parse_score("250"), Some(100.0));
        assert_eq!(parse_score("-3"), Some(0.0));
        assert_eq!(parse_score("very urgent"), None);
    }

    #[test]
    fn test_endpoint_trims_trailing_slash() {
        let scorer =
            LlmScorer::new(LlmScorerConfig::new("k", "m").with_base_url("http://host:1/")).unwrap();
        assert_eq!(scorer.endpoint(), "http://host:1/v1/chat/completions");
    }
}
