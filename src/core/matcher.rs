use std::collections::HashSet;

use rand::Rng;

use crate::core::scoring::{calculate_match_score, CandidateScore};
use crate::models::{
    Candidate, CulturalImportance, MatchSet, MatchSource, MatchingPolicy, RankedResult, ScoringWeights,
    UserProfile,
};

/// Response-level note when nobody in the pool meets the cultural floor
pub const NO_CULTURAL_MATCH_NOTE: &str = "No strong culturally-matching candidate in the current pool; \
     consider expanding to telehealth or searching by language or cultural keywords.";

/// Main matching orchestrator: scores every candidate and ranks the pool
///
/// # Pipeline Stages
/// 1. Duplicate id removal
/// 2. Per-candidate scoring
/// 3. Ranking with tie-breaking (cultural, language, random draw)
/// 4. Top-N selection with the cultural floor and top-slot rule
#[derive(Debug, Clone)]
pub struct Matcher {
    weights: ScoringWeights,
    policy: MatchingPolicy,
}

impl Matcher {
    pub fn new(weights: ScoringWeights, policy: MatchingPolicy) -> Self {
        Self { weights, policy }
    }

    pub fn with_default_weights() -> Self {
        Self {
            weights: ScoringWeights::default(),
            policy: MatchingPolicy::default(),
        }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn policy(&self) -> &MatchingPolicy {
        &self.policy
    }

    /// Score every distinct candidate, in input order
    pub fn score_candidates(&self, profile: &UserProfile, candidates: &[Candidate]) -> Vec<CandidateScore> {
        let mut seen = HashSet::with_capacity(candidates.len());

        candidates
            .iter()
            .filter(|candidate| {
                let fresh = seen.insert(candidate.id());
                if !fresh {
                    tracing::warn!("Skipping duplicate candidate id {}", candidate.id());
                }
                fresh
            })
            .map(|candidate| calculate_match_score(profile, candidate, &self.weights, &self.policy))
            .collect()
    }

    /// Order the whole pool best-first.
    ///
    /// Candidates within `tie_window` points of the best remaining score are
    /// tied; among them the higher cultural subscore wins, then the higher
    /// language score, then a random draw from `rng`.
    pub fn rank_candidates<R: Rng + ?Sized>(
        &self,
        profile: &UserProfile,
        candidates: &[Candidate],
        rng: &mut R,
    ) -> Vec<CandidateScore> {
        let mut remaining: Vec<(CandidateScore, u64)> = self
            .score_candidates(profile, candidates)
            .into_iter()
            .map(|score| (score, rng.gen()))
            .collect();

        let mut ranked = Vec::with_capacity(remaining.len());

        while !remaining.is_empty() {
            let leader = remaining
                .iter()
                .map(|(score, _)| score.total)
                .fold(f64::MIN, f64::max);

            let pick = remaining
                .iter()
                .enumerate()
                .filter(|(_, (score, _))| leader - score.total <= self.policy.tie_window)
                .max_by(|(_, (a, draw_a)), (_, (b, draw_b))| {
                    a.cultural_subscore()
                        .total_cmp(&b.cultural_subscore())
                        .then(a.breakdown.language.total_cmp(&b.breakdown.language))
                        .then(draw_a.cmp(draw_b))
                })
                .map(|(index, _)| index);

            let Some(index) = pick else { break };
            ranked.push(remaining.swap_remove(index).0);
        }

        ranked
    }

    /// Find the best matches for a questionnaire
    ///
    /// # Arguments
    /// * `profile` - The questionnaire answers
    /// * `candidates` - The candidate pool
    /// * `rng` - Source of tie-break draws
    ///
    /// # Returns
    /// At most `result_limit` unique results, best first
    pub fn find_matches<R: Rng + ?Sized>(
        &self,
        profile: &UserProfile,
        candidates: &[Candidate],
        rng: &mut R,
    ) -> MatchSet {
        let ranked = self.rank_candidates(profile, candidates, rng);

        let mut matches: Vec<RankedResult> = ranked
            .iter()
            .take(self.policy.result_limit)
            .map(CandidateScore::to_result)
            .collect();

        let cultural_note = self.apply_cultural_rules(profile, &mut matches, &ranked);

        tracing::debug!(
            "Ranked {} candidates, returning {}",
            ranked.len(),
            matches.len()
        );

        MatchSet {
            matches,
            cultural_note,
            source: MatchSource::Deterministic,
            fallback_reason: None,
            total_candidates: ranked.len(),
        }
    }

    /// `find_matches` with a thread-local random source
    pub fn find_matches_random(&self, profile: &UserProfile, candidates: &[Candidate]) -> MatchSet {
        let mut rng = rand::thread_rng();
        self.find_matches(profile, candidates, &mut rng)
    }

    /// Enforce the cultural floor on an already selected list.
    ///
    /// Only applies when culture is very important. If some candidate in
    /// `ranked` meets the floor but none of `selected` does, the best such
    /// candidate replaces the lowest-scoring selected entry. Then, if rank 1
    /// is under the floor, the best qualifying selected entry moves to rank 1.
    /// Returns the response-level note when nobody in the pool qualifies.
    pub fn apply_cultural_rules(
        &self,
        profile: &UserProfile,
        selected: &mut Vec<RankedResult>,
        ranked: &[CandidateScore],
    ) -> Option<String> {
        if profile.cultural_match != CulturalImportance::VeryImportant {
            return None;
        }

        let floor = self.policy.cultural_floor;
        let qualifies = |id: &str| {
            ranked
                .iter()
                .find(|score| score.id == id)
                .is_some_and(|score| score.cultural_subscore() >= floor)
        };

        let Some(best) = ranked.iter().find(|score| score.cultural_subscore() >= floor) else {
            tracing::info!("No candidate meets cultural floor {}", floor);
            return Some(NO_CULTURAL_MATCH_NOTE.to_string());
        };

        if !selected.iter().any(|result| qualifies(&result.id)) {
            if selected.len() >= self.policy.result_limit {
                let lowest = selected
                    .iter()
                    .enumerate()
                    .rev()
                    .min_by(|(_, a), (_, b)| a.score.total_cmp(&b.score))
                    .map(|(index, _)| index);
                if let Some(index) = lowest {
                    let displaced = selected.remove(index);
                    tracing::debug!("Cultural floor displaced {}", displaced.id);
                }
            }
            tracing::debug!("Cultural floor promoted {}", best.id);
            selected.push(best.to_result());
        }

        let first_qualifies = selected.first().map_or(true, |result| qualifies(&result.id));
        if !first_qualifies {
            if let Some(index) = selected.iter().position(|result| qualifies(&result.id)) {
                let promoted = selected.remove(index);
                selected.insert(0, promoted);
            }
        }

        None
    }
}

impl Default for Matcher {
    fn default() -> Self {
        Self::with_default_weights()
    }
}
