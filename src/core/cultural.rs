use crate::core::taxonomy::CULTURAL_SIGNAL_TERMS;
use crate::core::text::{any_contains_term, contains_term};
use crate::models::Candidate;

/// Points for a signal listed among the populations a therapist serves
const POPULATION_SIGNAL_POINTS: f64 = 20.0;
/// Points for a signal only mentioned in the narrative
const NARRATIVE_SIGNAL_POINTS: f64 = 15.0;
/// Points for a practice that explicitly centers people of color
const POC_FOCUSED_POINTS: f64 = 20.0;

/// Cultural alignment evidence for one therapist
#[derive(Debug, Clone, PartialEq)]
pub struct CulturalSignals {
    /// 0-100 estimate
    pub subscore: f64,
    /// Matched terms, population matches first
    pub terms: Vec<&'static str>,
    pub poc_focused: bool,
}

impl CulturalSignals {
    pub fn meets(&self, floor: f64) -> bool {
        self.subscore >= floor
    }
}

/// Derive the cultural subscore from populations, narrative and flags
pub fn cultural_signals(candidate: &Candidate) -> CulturalSignals {
    let narrative = candidate.narrative();

    let from_populations: Vec<&'static str> = CULTURAL_SIGNAL_TERMS
        .iter()
        .copied()
        .filter(|term| any_contains_term(&candidate.clinical.populations, term))
        .collect();

    let from_narrative: Vec<&'static str> = CULTURAL_SIGNAL_TERMS
        .iter()
        .copied()
        .filter(|term| !from_populations.contains(term))
        .filter(|term| contains_term(narrative, term))
        .collect();

    let poc_focused = candidate.is_poc_focused();

    let raw = from_populations.len() as f64 * POPULATION_SIGNAL_POINTS
        + from_narrative.len() as f64 * NARRATIVE_SIGNAL_POINTS
        + if poc_focused { POC_FOCUSED_POINTS } else { 0.0 };

    let mut terms = from_populations;
    terms.extend(from_narrative);

    CulturalSignals {
        subscore: raw.min(100.0),
        terms,
        poc_focused,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn candidate(populations: &[&str], narrative: &str, poc_focused: bool) -> Candidate {
        Candidate::from_value(json!({
            "provider_id": "c1",
            "identity": { "name": "Dr. Test", "narrative": narrative },
            "economics": { "insurance": { "in_network_plans": [] } },
            "clinical": {
                "specialties": [],
                "modalities": [],
                "populations": populations,
                "poc_focused": poc_focused,
            },
        }))
        .unwrap()
    }

    #[test]
    fn test_no_signals_scores_zero() {
        let signals = cultural_signals(&candidate(&["Adults"], "I help adults with stress.", false));
        assert_eq!(signals.subscore, 0.0);
        assert!(signals.terms.is_empty());
    }

    #[test]
    fn test_population_and_narrative_signals() {
        let signals = cultural_signals(&candidate(
            &["South Asian families", "Immigrants"],
            "Raised in a Hindu household, I offer culturally-informed care.",
            false,
        ));
        // 2 population terms, 2 narrative terms
        assert_eq!(signals.subscore, 70.0);
        assert_eq!(signals.terms[0], "South Asian");
        assert!(signals.meets(65.0));
    }

    #[test]
    fn test_same_term_is_counted_once() {
        let signals = cultural_signals(&candidate(&["Korean"], "I work with Korean clients.", false));
        assert_eq!(signals.subscore, 20.0);
    }

    #[test]
    fn test_subscore_is_capped() {
        let signals = cultural_signals(&candidate(
            &["Black", "Latinx", "AAPI", "Immigrants", "Refugee"],
            "Multicultural, bicultural and first-generation clients.",
            true,
        ));
        assert_eq!(signals.subscore, 100.0);
    }
}
