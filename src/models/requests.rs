use serde::{Deserialize, Serialize};
use serde_json::Value;
use validator::{Validate, ValidationError};

use crate::models::domain::UserProfile;

/// Request to rank therapists for a questionnaire
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct MatchRequest {
    #[validate(custom(function = "has_concern"))]
    pub user_profile: UserProfile,
    /// Overrides the configured pool; records are validated individually
    #[serde(default)]
    pub therapists: Option<Vec<Value>>,
    #[serde(default)]
    #[validate(length(min = 1, max = 128))]
    pub session_id: Option<String>,
}

fn has_concern(profile: &UserProfile) -> Result<(), ValidationError> {
    if profile.concerns.iter().any(|c| !c.trim().is_empty()) {
        Ok(())
    } else {
        Err(ValidationError::new("concerns_required"))
    }
}

/// Request to save or unsave a therapist
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct ToggleSavedRequest {
    #[validate(length(min = 1))]
    pub provider_id: String,
}
