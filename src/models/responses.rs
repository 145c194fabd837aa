use serde::{Deserialize, Serialize};

use crate::core::session::{SessionPhase, Step};
use crate::models::domain::{Candidate, MatchSet, SessionState};

/// Response for both match endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchResponse {
    #[serde(flatten)]
    pub result: MatchSet,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    pub generated_at: chrono::DateTime<chrono::Utc>,
}

/// Restored session and how it was reconciled
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub session_id: String,
    pub phase: SessionPhase,
    pub step: Step,
    pub session: SessionState,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ToggleSavedResponse {
    pub saved: bool,
    pub saved_matches: Vec<Candidate>,
}

/// Health check response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: chrono::DateTime<chrono::Utc>,
    pub delegate_configured: bool,
}

/// Error response
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub error: String,
    pub message: String,
    pub status_code: u16,
    /// The same request may succeed if sent again
    #[serde(default)]
    pub retryable: bool,
    /// The deterministic ranking endpoint can serve this request instead
    #[serde(default)]
    pub fallback_available: bool,
}

impl ErrorResponse {
    pub fn new(error: &str, message: impl Into<String>, status_code: u16) -> Self {
        Self {
            error: error.to_string(),
            message: message.into(),
            status_code,
            retryable: false,
            fallback_available: false,
        }
    }
}
