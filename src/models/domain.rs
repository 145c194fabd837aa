use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

/// A questionnaire answer with a fixed vocabulary.
///
/// Unknown or empty answers map to `Unspecified` instead of failing the
/// whole profile, since the client may send `""` for skipped steps.
macro_rules! answer_enum {
    ($(#[$meta:meta])* $name:ident { $($variant:ident => $value:literal),+ $(,)? }) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
        #[serde(from = "String", into = "String")]
        pub enum $name {
            $($variant,)+
            #[default]
            Unspecified,
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $value,)+
                    Self::Unspecified => "",
                }
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                match value.trim().to_ascii_lowercase().as_str() {
                    $($value => Self::$variant,)+
                    _ => Self::Unspecified,
                }
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::from(value.as_str())
            }
        }

        impl From<$name> for String {
            fn from(value: $name) -> Self {
                value.as_str().to_string()
            }
        }
    };
}

answer_enum!(
    /// "What sounds most helpful to you?"
    ApproachPreference {
        Practical => "practical",
        Insight => "insight",
        Trauma => "trauma",
        Both => "both",
        Unsure => "unsure",
    }
);

answer_enum!(
    /// Preferred communication tone
    CommunicationStyle {
        Direct => "direct",
        Warm => "warm",
        Collaborative => "collaborative",
        NoPreference => "no-preference",
    }
);

answer_enum!(
    PastTherapy {
        Helped => "helped",
        NotRightFit => "not-right-fit",
        FirstTime => "first-time",
    }
);

answer_enum!(
    /// How much a shared cultural background matters
    CulturalImportance {
        VeryImportant => "very-important",
        SomewhatImportant => "somewhat-important",
        Open => "open",
    }
);

answer_enum!(
    LgbtqImportance {
        Essential => "essential",
        Preferred => "preferred",
        NotNeeded => "not-needed",
    }
);

answer_enum!(
    ReligiousPreference {
        Secular => "secular",
        Christian => "christian",
        Catholic => "catholic",
        Jewish => "jewish",
        Muslim => "muslim",
        Hindu => "hindu",
        Buddhist => "buddhist",
        Spiritual => "spiritual",
        NoPreference => "no-preference",
    }
);

impl ReligiousPreference {
    /// True when the answer names a faith rather than opting out
    pub fn is_specific_faith(&self) -> bool {
        !matches!(self, Self::Secular | Self::NoPreference | Self::Unspecified)
    }
}

/// Questionnaire answers submitted by the person looking for a therapist
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct UserProfile {
    pub concerns: Vec<String>,
    pub therapy_approach: ApproachPreference,
    pub communication_style: CommunicationStyle,
    pub past_therapy: PastTherapy,
    pub cultural_match: CulturalImportance,
    pub language_preference: Vec<String>,
    pub lgbtq_affirming: LgbtqImportance,
    pub religious_preference: ReligiousPreference,
    pub insurance: String,
    /// Provider ids shown in a previous response
    pub recent_recommendations: Vec<String>,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub notes: String,
}

impl UserProfile {
    pub fn was_recently_recommended(&self, provider_id: &str) -> bool {
        self.recent_recommendations.iter().any(|id| id == provider_id)
    }
}

/// Errors raised while reading a single therapist record
#[derive(Debug, Error)]
pub enum CandidateError {
    #[error("candidate record has no provider_id")]
    MissingId,

    #[error("malformed candidate {id}: {source}")]
    Malformed {
        id: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Therapist record as stored in the candidate pool
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub provider_id: String,
    pub identity: Identity,
    pub economics: Economics,
    pub clinical: Clinical,
    #[serde(default)]
    pub location: Location,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub credentials: Vec<String>,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub profile_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub narrative: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub photo: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Economics {
    #[serde(default)]
    pub fee_structure: FeeStructure,
    pub insurance: Insurance,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeeStructure {
    #[serde(default)]
    pub session_type: String,
    #[serde(default)]
    pub cost_min: f64,
    #[serde(default)]
    pub cost_max: f64,
    #[serde(default)]
    pub currency: String,
    #[serde(default)]
    pub sliding_scale_available: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insurance {
    pub in_network_plans: Vec<String>,
    #[serde(default)]
    pub out_of_network_eligible: bool,
    #[serde(default)]
    pub superbill_provided: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Clinical {
    pub specialties: Vec<String>,
    pub modalities: Vec<String>,
    pub populations: Vec<String>,
    #[serde(default)]
    pub languages: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lgbtq_affirming: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub poc_focused: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Location {
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub state: String,
    #[serde(default)]
    pub telehealth: bool,
}

impl Candidate {
    /// Parse one record, rejecting anything without the fields scoring needs
    pub fn from_value(value: Value) -> Result<Self, CandidateError> {
        let id = value
            .get("provider_id")
            .and_then(Value::as_str)
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .ok_or(CandidateError::MissingId)?
            .to_string();

        let mut candidate: Candidate = serde_json::from_value(value).map_err(|source| CandidateError::Malformed {
            id: id.clone(),
            source,
        })?;
        candidate.provider_id = id;
        Ok(candidate)
    }

    pub fn id(&self) -> &str {
        &self.provider_id
    }

    pub fn name(&self) -> &str {
        &self.identity.name
    }

    pub fn narrative(&self) -> &str {
        self.identity.narrative.as_deref().unwrap_or("")
    }

    /// Explicit flag, or an LGBTQ mention in the narrative
    pub fn is_lgbtq_affirming(&self) -> bool {
        self.clinical.lgbtq_affirming.unwrap_or(false)
            || self.narrative().to_lowercase().contains("lgbtq")
    }

    pub fn is_poc_focused(&self) -> bool {
        self.clinical.poc_focused.unwrap_or(false)
    }

    pub fn fee_range(&self) -> (f64, f64) {
        let fees = &self.economics.fee_structure;
        (fees.cost_min, fees.cost_max)
    }

    pub fn in_network_plans(&self) -> &[String] {
        &self.economics.insurance.in_network_plans
    }
}

/// Per-factor contributions behind a deterministic score
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreBreakdown {
    pub specialty: f64,
    pub approach: f64,
    pub cultural: f64,
    pub language: f64,
    pub lgbtq: f64,
    pub style: f64,
    pub religious: f64,
    pub insurance: f64,
    pub penalty: f64,
    /// 0-100 cultural alignment estimate the cultural factor was derived from
    pub cultural_subscore: f64,
}

/// One ranked therapist as returned by either ranking path
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedResult {
    pub id: String,
    pub score: f64,
    pub reasons: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub breakdown: Option<ScoreBreakdown>,
}

/// Which engine produced a match set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchSource {
    Delegate,
    Deterministic,
}

/// Ranked results plus response-level annotations
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchSet {
    pub matches: Vec<RankedResult>,
    /// Set when no candidate in the pool met the cultural floor
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cultural_note: Option<String>,
    pub source: MatchSource,
    /// Why the delegate answer was replaced by the deterministic ranking
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback_reason: Option<String>,
    pub total_candidates: usize,
}

impl MatchSet {
    pub fn ids(&self) -> Vec<&str> {
        self.matches.iter().map(|m| m.id.as_str()).collect()
    }
}

/// A ranked result joined back to its therapist record for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedMatch {
    pub id: String,
    #[serde(rename = "matchScore")]
    pub match_score: f64,
    #[serde(rename = "matchReasons", default)]
    pub match_reasons: Vec<String>,
    #[serde(flatten)]
    pub therapist: Candidate,
}

/// Everything persisted for one visitor
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SessionState {
    pub form_data: UserProfile,
    pub matches: Vec<EnrichedMatch>,
    pub saved_matches: Vec<Candidate>,
}

/// Maximum points per scoring factor
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ScoringWeights {
    pub specialty: f64,
    pub specialty_per_concern: f64,
    pub approach: f64,
    pub cultural: f64,
    pub language: f64,
    pub lgbtq: f64,
    pub style: f64,
    pub religious: f64,
    pub insurance: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            specialty: 25.0,
            specialty_per_concern: 8.0,
            approach: 12.0,
            cultural: 30.0,
            language: 12.0,
            lgbtq: 8.0,
            style: 6.0,
            religious: 4.0,
            insurance: 3.0,
        }
    }
}

/// Ranking rules applied after per-candidate scoring
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchingPolicy {
    pub result_limit: usize,
    /// Minimum cultural subscore for rank 1 when culture is very important
    pub cultural_floor: f64,
    /// Scores this close to the leader count as tied
    pub tie_window: f64,
    pub repetition_penalty: f64,
}

impl Default for MatchingPolicy {
    fn default() -> Self {
        Self {
            result_limit: 5,
            cultural_floor: 65.0,
            tie_window: 5.0,
            repetition_penalty: 15.0,
        }
    }
}
