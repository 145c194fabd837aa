use crate::core::cultural::{cultural_signals, CulturalSignals};
use crate::core::taxonomy::{
    approach_keywords, approach_label, faith_keywords, faith_label, specialty_keywords, style_keywords,
};
use crate::core::text::{any_contains_term, contains_term, join_natural, same_word};
use crate::models::{
    Candidate, CulturalImportance, LgbtqImportance, MatchingPolicy, RankedResult, ScoreBreakdown,
    ScoringWeights, UserProfile,
};

/// Insurance answer meaning the client pays directly
pub const OUT_OF_POCKET: &str = "Out of Pocket";

/// Points per distinct communication-style keyword found in the narrative
const STYLE_POINTS_PER_HIT: f64 = 3.0;

/// Score and explanation for one candidate
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateScore {
    pub id: String,
    pub total: f64,
    pub breakdown: ScoreBreakdown,
    pub reasons: Vec<String>,
    /// False when culture is very important and the cultural subscore is under the floor
    pub top_slot_eligible: bool,
}

impl CandidateScore {
    pub fn cultural_subscore(&self) -> f64 {
        self.breakdown.cultural_subscore
    }

    pub fn to_result(&self) -> RankedResult {
        RankedResult {
            id: self.id.clone(),
            score: self.total,
            reasons: self.reasons.clone(),
            breakdown: Some(self.breakdown),
        }
    }
}

/// Calculate a match score (0-100) for a therapist based on questionnaire answers
///
/// Factors, each capped by `weights`:
/// specialty (25), approach (12), cultural (30), language (12),
/// LGBTQ+ affirming (8), communication style (6), religious (4),
/// insurance (3). Recently recommended therapists lose the repetition
/// penalty before the total is clamped to [0, 100].
pub fn calculate_match_score(
    profile: &UserProfile,
    candidate: &Candidate,
    weights: &ScoringWeights,
    policy: &MatchingPolicy,
) -> CandidateScore {
    let mut reasons = Vec::new();

    let (specialty, concerns) = calculate_specialty_score(profile, candidate, weights);
    if !concerns.is_empty() {
        let shown: Vec<&str> = concerns.iter().take(3).copied().collect();
        reasons.push(format!("Specializes in {}", join_natural(&shown)));
    }

    let (approach, modalities) = calculate_approach_score(profile, candidate, weights);
    if approach > 0.0 {
        reasons.push(format!(
            "Offers {}, suited to {}",
            join_natural(&modalities),
            approach_label(profile.therapy_approach)
        ));
    }

    let signals = cultural_signals(candidate);
    let cultural = calculate_cultural_score(&signals, weights);
    if cultural > 0.0 {
        let shown: Vec<&str> = signals.terms.iter().take(3).copied().collect();
        if shown.is_empty() {
            reasons.push("Practice centers clients of color".to_string());
        } else {
            reasons.push(format!(
                "Profile reflects cultural experience with {}",
                join_natural(&shown)
            ));
        }
    }
    let top_slot_eligible = profile.cultural_match != CulturalImportance::VeryImportant
        || signals.meets(policy.cultural_floor);
    if !top_slot_eligible {
        reasons.push(
            "Has few explicit cultural signals, so is not placed in the top spot".to_string(),
        );
    }

    let (language, spoken) = calculate_language_score(profile, candidate, weights);
    if language > 0.0 {
        reasons.push(format!("Speaks {}", join_natural(&spoken)));
    }

    let lgbtq = calculate_lgbtq_score(profile, candidate, weights);
    if lgbtq > 0.0 {
        reasons.push(match profile.lgbtq_affirming {
            LgbtqImportance::Essential => "LGBTQ+ affirming practice".to_string(),
            _ => "LGBTQ+ affirming".to_string(),
        });
    }

    let (style, tones) = calculate_style_score(profile, candidate, weights);
    if style > 0.0 {
        reasons.push(format!("Describes a {} style", join_natural(&tones)));
    }

    let religious = calculate_religious_score(profile, candidate, weights);
    if religious > 0.0 {
        reasons.push(format!(
            "Brings {} faith perspectives into therapy",
            faith_label(profile.religious_preference)
        ));
    }

    let insurance = calculate_insurance_score(profile, candidate, weights);
    if insurance > 0.0 {
        if profile.insurance.trim().eq_ignore_ascii_case(OUT_OF_POCKET) {
            if candidate.economics.fee_structure.sliding_scale_available {
                reasons.push("Accepts self-pay clients and offers a sliding scale".to_string());
            } else {
                reasons.push("Accepts self-pay clients".to_string());
            }
        } else {
            reasons.push(format!("Accepts {}", profile.insurance.trim()));
        }
    }

    let penalty = if profile.was_recently_recommended(candidate.id()) {
        reasons.push(format!(
            "Applied a {}-point repetition penalty because this therapist was recently recommended",
            policy.repetition_penalty
        ));
        policy.repetition_penalty
    } else {
        0.0
    };

    let sum = specialty + approach + cultural + language + lgbtq + style + religious + insurance;
    let total = (sum - penalty).clamp(0.0, 100.0);

    CandidateScore {
        id: candidate.id().to_string(),
        total,
        breakdown: ScoreBreakdown {
            specialty,
            approach,
            cultural,
            language,
            lgbtq,
            style,
            religious,
            insurance,
            penalty,
            cultural_subscore: signals.subscore,
        },
        reasons,
        top_slot_eligible,
    }
}

/// Specialty score: distinct concerns with at least one keyword hit, times
/// the per-concern points, capped. Returns the matched concerns.
pub fn calculate_specialty_score<'a>(
    profile: &'a UserProfile,
    candidate: &Candidate,
    weights: &ScoringWeights,
) -> (f64, Vec<&'a str>) {
    let mut matched: Vec<&str> = Vec::new();

    for concern in &profile.concerns {
        let concern = concern.trim();
        if concern.is_empty() || matched.iter().any(|m| same_word(m, concern)) {
            continue;
        }
        let hit = specialty_keywords(concern)
            .iter()
            .any(|keyword| any_contains_term(&candidate.clinical.specialties, keyword));
        if hit {
            matched.push(concern);
        }
    }

    let score = (matched.len() as f64 * weights.specialty_per_concern).min(weights.specialty);
    (score, matched)
}

/// Approach score: flat award when a modality matches the preferred approach
pub fn calculate_approach_score<'a>(
    profile: &UserProfile,
    candidate: &'a Candidate,
    weights: &ScoringWeights,
) -> (f64, Vec<&'a str>) {
    let keywords = approach_keywords(profile.therapy_approach);

    let modalities: Vec<&str> = candidate
        .clinical
        .modalities
        .iter()
        .filter(|modality| keywords.iter().any(|keyword| contains_term(modality, keyword)))
        .map(String::as_str)
        .take(3)
        .collect();

    let score = if modalities.is_empty() { 0.0 } else { weights.approach };
    (score, modalities)
}

/// Cultural score: proportional to the 0-100 subscore
#[inline]
pub fn calculate_cultural_score(signals: &CulturalSignals, weights: &ScoringWeights) -> f64 {
    (signals.subscore * weights.cultural / 100.0)
        .round()
        .min(weights.cultural)
}

/// Language score: full points if any preferred language is spoken
pub fn calculate_language_score<'a>(
    profile: &UserProfile,
    candidate: &'a Candidate,
    weights: &ScoringWeights,
) -> (f64, Vec<&'a str>) {
    let spoken: Vec<&str> = candidate
        .clinical
        .languages
        .iter()
        .filter(|language| {
            profile
                .language_preference
                .iter()
                .any(|preferred| same_word(preferred, language))
        })
        .map(String::as_str)
        .collect();

    let score = if spoken.is_empty() { 0.0 } else { weights.language };
    (score, spoken)
}

/// LGBTQ+ score: full points when essential, half when preferred
#[inline]
pub fn calculate_lgbtq_score(
    profile: &UserProfile,
    candidate: &Candidate,
    weights: &ScoringWeights,
) -> f64 {
    if !candidate.is_lgbtq_affirming() {
        return 0.0;
    }
    match profile.lgbtq_affirming {
        LgbtqImportance::Essential => weights.lgbtq,
        LgbtqImportance::Preferred => weights.lgbtq / 2.0,
        _ => 0.0,
    }
}

/// Communication style score: narrative tone keywords, a few points each
pub fn calculate_style_score(
    profile: &UserProfile,
    candidate: &Candidate,
    weights: &ScoringWeights,
) -> (f64, Vec<&'static str>) {
    let narrative = candidate.narrative();
    let tones: Vec<&'static str> = style_keywords(profile.communication_style)
        .iter()
        .copied()
        .filter(|keyword| contains_term(narrative, keyword))
        .collect();

    let score = (tones.len() as f64 * STYLE_POINTS_PER_HIT).min(weights.style);
    (score, tones)
}

/// Religious score: a specific faith named in the narrative or modalities
pub fn calculate_religious_score(
    profile: &UserProfile,
    candidate: &Candidate,
    weights: &ScoringWeights,
) -> f64 {
    if !profile.religious_preference.is_specific_faith() {
        return 0.0;
    }
    let narrative = candidate.narrative();
    let aligned = faith_keywords(profile.religious_preference).iter().any(|keyword| {
        contains_term(narrative, keyword) || any_contains_term(&candidate.clinical.modalities, keyword)
    });

    if aligned {
        weights.religious
    } else {
        0.0
    }
}

/// Insurance score: self-pay, or an in-network plan containing the answer
pub fn calculate_insurance_score(
    profile: &UserProfile,
    candidate: &Candidate,
    weights: &ScoringWeights,
) -> f64 {
    let insurance = profile.insurance.trim();
    if insurance.is_empty() {
        return 0.0;
    }
    let wanted = insurance.to_lowercase();

    let covered = insurance.eq_ignore_ascii_case(OUT_OF_POCKET)
        || candidate
            .in_network_plans()
            .iter()
            .any(|plan| plan.to_lowercase().contains(&wanted));

    if covered {
        weights.insurance
    } else {
        0.0
    }
}
