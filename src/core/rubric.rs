//! The ranking rubric as handed to a remote delegate, and validation of
//! whatever the delegate sends back.
//!
//! The deterministic scorer is canonical: delegate output is only trusted
//! after its ids, scores and reasons pass the same invariants the local
//! ranker guarantees, and the cultural floor is always re-applied with
//! locally computed subscores.

use std::collections::HashSet;

use rand::seq::SliceRandom;
use rand::Rng;
use serde_json::Value;
use thiserror::Error;

use crate::core::matcher::Matcher;
use crate::core::pool::CandidatePool;
use crate::core::taxonomy;
use crate::models::{Candidate, MatchSet, MatchSource, MatchingPolicy, RankedResult, ScoringWeights, UserProfile};

/// Reason attached to a positive delegate score whose own reasons were all rejected
pub const NEUTRAL_REASON: &str = "Strong overall fit with your questionnaire answers";

/// Field names that must never surface in a user-facing reason when quoted
const KNOWN_KEYS: &[&str] = &[
    "provider_id",
    "identity",
    "name",
    "credentials",
    "title",
    "profile_url",
    "narrative",
    "economics",
    "fee_structure",
    "insurance",
    "in_network_plans",
    "clinical",
    "specialties",
    "modalities",
    "populations",
    "languages",
    "lgbtq_affirming",
    "poc_focused",
    "location",
    "concerns",
    "therapyApproach",
    "communicationStyle",
    "culturalMatch",
    "languagePreference",
    "lgbtqAffirming",
    "religiousPreference",
    "recentRecommendations",
];

/// Errors from validating delegate output
#[derive(Debug, Error)]
pub enum RubricError {
    #[error("Delegate response is not a JSON array: {0}")]
    MalformedResponse(String),

    #[error("Delegate response contained no usable matches")]
    Empty,

    #[error("Delegate ranked {got} usable matches, expected {expected}")]
    Incomplete { expected: usize, got: usize },
}

/// The pool in random order, so list position carries no signal
pub fn shuffled_pool<'a, R: Rng + ?Sized>(candidates: &'a [Candidate], rng: &mut R) -> Vec<&'a Candidate> {
    let mut shuffled: Vec<&Candidate> = candidates.iter().collect();
    shuffled.shuffle(rng);
    shuffled
}

/// Build the instruction prompt for the remote delegate
pub fn build_prompt(
    profile: &UserProfile,
    candidates: &[&Candidate],
    weights: &ScoringWeights,
    policy: &MatchingPolicy,
) -> Result<String, serde_json::Error> {
    let profile_json = serde_json::to_string_pretty(profile)?;
    let pool_json = serde_json::to_string_pretty(candidates)?;
    let taxonomy_json = serde_json::to_string_pretty(&taxonomy::to_json())?;

    Ok(format!(
        r#"You are BetterMatch, a therapist matching assistant. Rank the therapists below for the person described by the questionnaire. The list is the complete candidate pool in random order; do not favor anyone for their position or for how often they were recommended before.

## Questionnaire
{profile_json}

## Candidate Pool
{pool_json}

## Taxonomy
Concern groups map a general concern to the specialties that satisfy it (a therapist listing "Panic" matches "Anxiety"). Approach and communication style groups map an answer to modality and narrative keywords. Cultural signals are the terms that count as explicit cultural experience.
{taxonomy_json}

## Scoring (0-100, each factor capped)
1. Specialty (max {specialty}): {per_concern} points for every concern with at least one matching specialty.
2. Approach (max {approach}): full points when a modality matches the preferred approach.
3. Cultural (max {cultural}): estimate a 0-100 cultural subscore from cultural signals in populations (20 each), further signals in the narrative (15 each) and an explicit focus on people of color (20); contribute subscore x {cultural} / 100. When cultural match is "very-important", a therapist with a subscore under {floor} is not eligible for rank 1.
4. Language (max {language}): full points when the therapist speaks a preferred language.
5. LGBTQ+ affirming (max {lgbtq}): full points when "essential" and the practice is affirming, half when "preferred".
6. Communication style (max {style}): points for narrative tone that matches the requested style.
7. Religious (max {religious}): full points when a specific faith was requested and the therapist integrates it.
8. Insurance (max {insurance}): full points when the therapist accepts the stated plan or the client pays out of pocket.

## Diversity Rules
- Subtract {penalty} points from any therapist whose id is in the recent recommendations, and say so in a reason.
- Scores within {window} points are tied: prefer the higher cultural subscore, then language, then choose at random.
- When cultural match is "very-important" and some therapist reaches a subscore of {floor}, at least one of the returned therapists must reach it.
- Never return the same therapist twice.

## Output
Return ONLY a JSON array of the top {limit} therapists, sorted by score descending, with no markdown:
[
  {{ "id": "<provider_id>", "score": <0-100>, "reasons": ["<reason>", "<reason>"] }}
]
Give 2-4 short reasons per therapist in plain English, such as "Speaks Hindi" or "Works with South Asian families". Never mention field names, key paths or code identifiers in a reason.
"#,
        specialty = weights.specialty,
        per_concern = weights.specialty_per_concern,
        approach = weights.approach,
        cultural = weights.cultural,
        language = weights.language,
        lgbtq = weights.lgbtq,
        style = weights.style,
        religious = weights.religious,
        insurance = weights.insurance,
        floor = policy.cultural_floor,
        penalty = policy.repetition_penalty,
        window = policy.tie_window,
        limit = policy.result_limit,
    ))
}

/// Parse the delegate answer as a JSON array.
///
/// A direct parse is tried first. Otherwise the text from the first `[` to
/// the last `]` is parsed once.
pub fn extract_json_array(raw: &str) -> Result<Vec<Value>, RubricError> {
    if let Ok(Value::Array(entries)) = serde_json::from_str::<Value>(raw.trim()) {
        return Ok(entries);
    }

    let start = raw.find('[');
    let end = raw.rfind(']');
    let literal = match (start, end) {
        (Some(start), Some(end)) if start < end => &raw[start..=end],
        _ => return Err(RubricError::MalformedResponse("no JSON array found".to_string())),
    };

    match serde_json::from_str::<Value>(literal) {
        Ok(Value::Array(entries)) => Ok(entries),
        Ok(_) => Err(RubricError::MalformedResponse("extracted value is not an array".to_string())),
        Err(e) => Err(RubricError::MalformedResponse(e.to_string())),
    }
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn is_snake_case(token: &str) -> bool {
    let parts: Vec<&str> = token.split('_').collect();
    parts.len() > 1
        && parts.iter().all(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_alphanumeric()))
        && token.chars().any(|c| c.is_ascii_lowercase())
}

fn is_camel_case(token: &str) -> bool {
    let mut chars = token.chars();
    let starts_lower = chars.next().is_some_and(|c| c.is_ascii_lowercase());
    let all_alpha = token.chars().all(|c| c.is_ascii_alphabetic());
    let has_hump = token
        .as_bytes()
        .windows(2)
        .any(|w| w[0].is_ascii_lowercase() && w[1].is_ascii_uppercase());
    starts_lower && all_alpha && has_hump
}

fn is_key_path(token: &str) -> bool {
    let segments: Vec<&str> = token.split('.').collect();
    segments.len() > 1
        && segments
            .iter()
            .all(|s| s.len() > 1 && s.chars().all(is_identifier_char) && s.starts_with(|c: char| c.is_ascii_lowercase()))
}

/// True when a reason exposes data field names instead of prose
pub fn leaks_field_name(reason: &str) -> bool {
    let tokens = reason
        .split(|c: char| !(is_identifier_char(c) || c == '.'))
        .map(|t| t.trim_matches('.'))
        .filter(|t| !t.is_empty());

    for token in tokens {
        if is_snake_case(token) || is_camel_case(token) || is_key_path(token) {
            return true;
        }
    }

    KNOWN_KEYS.iter().any(|key| {
        ["'", "\"", "`"]
            .iter()
            .any(|quote| reason.contains(&format!("{quote}{key}{quote}")))
    })
}

fn entry_to_result(entry: &Value) -> Option<RankedResult> {
    let id = entry.get("id")?.as_str()?.trim();
    let score = entry.get("score")?.as_f64()?;
    if id.is_empty() || !score.is_finite() {
        return None;
    }

    let score = score.clamp(0.0, 100.0);

    let mut reasons: Vec<String> = entry
        .get("reasons")
        .and_then(Value::as_array)
        .map(|reasons| {
            reasons
                .iter()
                .filter_map(Value::as_str)
                .map(str::trim)
                .filter(|reason| !reason.is_empty())
                .filter(|reason| {
                    let leaks = leaks_field_name(reason);
                    if leaks {
                        tracing::debug!("Dropping delegate reason for {}: {}", id, reason);
                    }
                    !leaks
                })
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default();

    if score > 0.0 && reasons.is_empty() {
        reasons.push(NEUTRAL_REASON.to_string());
    }

    Some(RankedResult {
        id: id.to_string(),
        score,
        reasons,
        breakdown: None,
    })
}

/// Check delegate output against the ranking invariants.
///
/// Entries without a string id in the pool or a numeric score are dropped,
/// as are repeated ids (first wins). Scores are clamped to [0, 100] and
/// leaking reasons removed. The survivors are sorted by score and truncated
/// to the result limit. Fewer survivors than the deterministic ranking
/// would return is an error.
pub fn validate_delegate_output(
    raw: &str,
    pool: &CandidatePool,
    policy: &MatchingPolicy,
) -> Result<Vec<RankedResult>, RubricError> {
    let entries = extract_json_array(raw)?;
    let mut seen = HashSet::new();

    let mut results: Vec<RankedResult> = entries
        .iter()
        .filter_map(|entry| {
            let result = entry_to_result(entry);
            if result.is_none() {
                tracing::warn!("Dropping malformed delegate entry: {}", entry);
            }
            result
        })
        .filter(|result| {
            let known = pool.contains(&result.id);
            if !known {
                tracing::warn!("Dropping unknown delegate id {}", result.id);
            }
            known
        })
        .filter(|result| seen.insert(result.id.clone()))
        .collect();

    results.sort_by(|a, b| b.score.total_cmp(&a.score));
    results.truncate(policy.result_limit);

    if results.is_empty() && !pool.is_empty() {
        return Err(RubricError::Empty);
    }

    let expected = policy.result_limit.min(pool.len());
    if results.len() < expected {
        return Err(RubricError::Incomplete {
            expected,
            got: results.len(),
        });
    }

    Ok(results)
}

/// Validate delegate output and re-apply the cultural rules locally
pub fn reconcile_delegate_output<R: Rng + ?Sized>(
    matcher: &Matcher,
    profile: &UserProfile,
    pool: &CandidatePool,
    raw: &str,
    rng: &mut R,
) -> Result<MatchSet, RubricError> {
    let mut matches = validate_delegate_output(raw, pool, matcher.policy())?;

    let ranked = matcher.rank_candidates(profile, pool.candidates(), rng);
    let cultural_note = matcher.apply_cultural_rules(profile, &mut matches, &ranked);

    Ok(MatchSet {
        matches,
        cultural_note,
        source: MatchSource::Delegate,
        fallback_reason: None,
        total_candidates: pool.len(),
    })
}
