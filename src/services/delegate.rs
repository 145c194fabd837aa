use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::DelegateSettings;
use crate::core::rubric::{build_prompt, reconcile_delegate_output, shuffled_pool};
use crate::core::{CandidatePool, Matcher};
use crate::models::{MatchSet, MatchSource, UserProfile};

/// Errors that can occur when calling the remote ranking delegate
#[derive(Debug, Error)]
pub enum DelegateError {
    #[error("Remote ranking is not configured: missing API key")]
    Configuration,

    #[error("HTTP request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Delegate returned status {status}: {body}")]
    Status { status: u16, body: String },

    #[error("Delegate did not answer within {0}s")]
    Timeout(u64),

    #[error("Invalid response format: {0}")]
    MalformedResponse(String),

    #[error("Failed to build prompt: {0}")]
    Prompt(#[source] serde_json::Error),
}

impl DelegateError {
    /// Whether sending the same request again may succeed
    pub fn is_retryable(&self) -> bool {
        match self {
            DelegateError::Transport(_) | DelegateError::Timeout(_) => true,
            DelegateError::Status { status, .. } => *status == 429 || *status >= 500,
            DelegateError::Configuration
            | DelegateError::MalformedResponse(_)
            | DelegateError::Prompt(_) => false,
        }
    }
}

#[derive(Debug, Serialize)]
struct MessagesRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    messages: [Message<'a>; 1],
}

#[derive(Debug, Serialize)]
struct Message<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Deserialize)]
struct MessagesResponse {
    #[serde(default)]
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
struct ContentBlock {
    #[serde(default)]
    text: Option<String>,
}

/// Anthropic Messages API client
///
/// One attempt per call, bounded by the configured timeout. Retrying is
/// left to the caller.
pub struct ClaudeClient {
    client: Client,
    settings: DelegateSettings,
}

impl ClaudeClient {
    /// Create a new client
    pub fn new(settings: DelegateSettings) -> Result<Self, DelegateError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .build()?;

        Ok(Self { client, settings })
    }

    /// Whether an API key is available
    pub fn is_configured(&self) -> bool {
        self.api_key().is_some()
    }

    fn api_key(&self) -> Option<&str> {
        self.settings
            .api_key
            .as_deref()
            .map(str::trim)
            .filter(|key| !key.is_empty())
    }

    /// Send one prompt and return the text of the first content block
    pub async fn complete(&self, prompt: &str) -> Result<String, DelegateError> {
        let api_key = self.api_key().ok_or(DelegateError::Configuration)?;

        let body = MessagesRequest {
            model: &self.settings.model,
            max_tokens: self.settings.max_tokens,
            messages: [Message {
                role: "user",
                content: prompt,
            }],
        };

        tracing::debug!("Calling ranking delegate at {}", self.settings.api_url);

        let response = self
            .client
            .post(&self.settings.api_url)
            .header("x-api-key", api_key)
            .header("anthropic-version", &self.settings.anthropic_version)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.classify(e))?;

        let status = response.status();
        let text = response.text().await.map_err(|e| self.classify(e))?;

        if !status.is_success() {
            tracing::error!("Ranking delegate returned {}: {}", status, text);
            return Err(DelegateError::Status {
                status: status.as_u16(),
                body: text,
            });
        }

        let parsed: MessagesResponse =
            serde_json::from_str(&text).map_err(|e| DelegateError::MalformedResponse(e.to_string()))?;

        parsed
            .content
            .into_iter()
            .next()
            .and_then(|block| block.text)
            .ok_or_else(|| DelegateError::MalformedResponse("Missing content text".into()))
    }

    fn classify(&self, error: reqwest::Error) -> DelegateError {
        if error.is_timeout() {
            DelegateError::Timeout(self.settings.timeout_secs)
        } else {
            DelegateError::Transport(error)
        }
    }

    /// Rank the pool remotely.
    ///
    /// Delegate answers that fail validation are replaced by the
    /// deterministic ranking, marked with a `fallback_reason`. Transport
    /// failures are returned as errors.
    pub async fn rank(
        &self,
        matcher: &Matcher,
        profile: &UserProfile,
        pool: &CandidatePool,
    ) -> Result<MatchSet, DelegateError> {
        if !self.is_configured() {
            return Err(DelegateError::Configuration);
        }

        if pool.is_empty() {
            return Ok(MatchSet {
                matches: Vec::new(),
                cultural_note: None,
                source: MatchSource::Delegate,
                fallback_reason: None,
                total_candidates: 0,
            });
        }

        let prompt = {
            let mut rng = rand::thread_rng();
            let shuffled = shuffled_pool(pool.candidates(), &mut rng);
            build_prompt(profile, &shuffled, matcher.weights(), matcher.policy()).map_err(DelegateError::Prompt)?
        };

        let answer = match self.complete(&prompt).await {
            Ok(answer) => answer,
            Err(DelegateError::MalformedResponse(reason)) => {
                return Ok(Self::fallback(matcher, profile, pool, reason));
            }
            Err(e) => return Err(e),
        };

        let mut rng = rand::thread_rng();
        match reconcile_delegate_output(matcher, profile, pool, &answer, &mut rng) {
            Ok(result) => {
                tracing::info!("Delegate ranked {} of {} candidates", result.matches.len(), pool.len());
                Ok(result)
            }
            Err(e) => Ok(Self::fallback(matcher, profile, pool, e.to_string())),
        }
    }

    fn fallback(matcher: &Matcher, profile: &UserProfile, pool: &CandidatePool, reason: String) -> MatchSet {
        tracing::warn!("Delegate answer rejected, using deterministic ranking: {}", reason);
        let mut result = matcher.find_matches_random(profile, pool.candidates());
        result.fallback_reason = Some(reason);
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockito::{Matcher as BodyMatcher, Server};
    use serde_json::json;

    fn settings(url: String, api_key: Option<&str>) -> DelegateSettings {
        DelegateSettings {
            api_url: format!("{}/v1/messages", url),
            api_key: api_key.map(str::to_string),
            timeout_secs: 5,
            ..Default::default()
        }
    }

    fn pool() -> CandidatePool {
        CandidatePool::from_values(vec![
            json!({
                "provider_id": "p1",
                "identity": { "name": "Dr. One" },
                "economics": { "insurance": { "in_network_plans": ["Aetna"] } },
                "clinical": { "specialties": ["Anxiety"], "modalities": ["CBT"], "populations": [] }
            }),
            json!({
                "provider_id": "p2",
                "identity": { "name": "Dr. Two" },
                "economics": { "insurance": { "in_network_plans": [] } },
                "clinical": { "specialties": ["Grief"], "modalities": [], "populations": [] }
            }),
        ])
    }

    fn profile() -> UserProfile {
        UserProfile {
            concerns: vec!["Anxiety".into()],
            ..Default::default()
        }
    }

    fn answer(text: &str) -> String {
        json!({ "content": [{ "type": "text", "text": text }] }).to_string()
    }

    #[tokio::test]
    async fn test_complete_sends_headers_and_returns_text() {
        let mut server = Server::new_async().await;
        let mock = server
            .mock("POST", "/v1/messages")
            .match_header("x-api-key", "test-key")
            .match_header("anthropic-version", "2023-06-01")
            .match_body(BodyMatcher::PartialJson(json!({
                "model": "claude-haiku-4-5-20251001",
                "max_tokens": 2000,
                "messages": [{ "role": "user", "content": "hello" }]
            })))
            .with_status(200)
            .with_body(answer("hi there"))
            .create_async()
            .await;

        let client = ClaudeClient::new(settings(server.url(), Some("test-key"))).unwrap();
        let text = client.complete("hello").await.unwrap();

        mock.assert_async().await;
        assert_eq!(text, "hi there");
    }

    #[tokio::test]
    async fn test_missing_key_never_calls_remote() {
        let mut server = Server::new_async().await;
        let mock = server.mock("POST", "/v1/messages").expect(0).create_async().await;

        let client = ClaudeClient::new(settings(server.url(), Some("  "))).unwrap();
        let result = client.rank(&Matcher::default(), &profile(), &pool()).await;

        mock.assert_async().await;
        assert!(matches!(result, Err(DelegateError::Configuration)));
        assert!(!client.is_configured());
    }

    #[tokio::test]
    async fn test_server_error_is_retryable() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(529)
            .with_body("overloaded")
            .create_async()
            .await;

        let client = ClaudeClient::new(settings(server.url(), Some("test-key"))).unwrap();
        let err = client.rank(&Matcher::default(), &profile(), &pool()).await.unwrap_err();

        assert!(matches!(err, DelegateError::Status { status: 529, .. }));
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn test_rank_accepts_wrapped_answer() {
        let mut server = Server::new_async().await;
        let text = "```json\n[{\"id\": \"p2\", \"score\": 61, \"reasons\": [\"Works with grief\"]}, \
                    {\"id\": \"p1\", \"score\": 90, \"reasons\": [\"Specializes in anxiety\"]}]\n```";
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(answer(text))
            .create_async()
            .await;

        let client = ClaudeClient::new(settings(server.url(), Some("test-key"))).unwrap();
        let result = client.rank(&Matcher::default(), &profile(), &pool()).await.unwrap();

        assert_eq!(result.source, MatchSource::Delegate);
        assert_eq!(result.ids(), vec!["p1", "p2"]);
        assert!(result.fallback_reason.is_none());
    }

    #[tokio::test]
    async fn test_unusable_answer_falls_back_visibly() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(answer("Sorry, I cannot help with that."))
            .create_async()
            .await;

        let client = ClaudeClient::new(settings(server.url(), Some("test-key"))).unwrap();
        let result = client.rank(&Matcher::default(), &profile(), &pool()).await.unwrap();

        assert_eq!(result.source, MatchSource::Deterministic);
        assert!(result.fallback_reason.is_some());
        assert_eq!(result.matches[0].id, "p1");
    }

    #[tokio::test]
    async fn test_partial_ranking_falls_back_visibly() {
        let mut server = Server::new_async().await;
        let text = json!([{ "id": "p2", "score": 80, "reasons": ["Works with grief"] }]).to_string();
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(answer(&text))
            .create_async()
            .await;

        let client = ClaudeClient::new(settings(server.url(), Some("test-key"))).unwrap();
        let result = client.rank(&Matcher::default(), &profile(), &pool()).await.unwrap();

        assert_eq!(result.source, MatchSource::Deterministic);
        assert_eq!(result.ids(), vec!["p1", "p2"]);
        assert!(result.fallback_reason.unwrap().contains("expected 2"));
    }

    #[tokio::test]
    async fn test_missing_content_is_malformed() {
        let mut server = Server::new_async().await;
        server
            .mock("POST", "/v1/messages")
            .with_status(200)
            .with_body(json!({ "content": [] }).to_string())
            .create_async()
            .await;

        let client = ClaudeClient::new(settings(server.url(), Some("test-key"))).unwrap();
        let err = client.complete("hello").await.unwrap_err();

        assert!(matches!(err, DelegateError::MalformedResponse(_)));
        assert!(!err.is_retryable());

        let result = client.rank(&Matcher::default(), &profile(), &pool()).await.unwrap();
        assert_eq!(result.source, MatchSource::Deterministic);
    }
}
