use std::collections::HashMap;
use std::path::Path;

use serde_json::Value;
use thiserror::Error;

use crate::models::{Candidate, EnrichedMatch, RankedResult};

/// Errors that can occur while loading the candidate pool
#[derive(Debug, Error)]
pub enum PoolError {
    #[error("Failed to read candidate pool: {0}")]
    Io(#[from] std::io::Error),

    #[error("Candidate pool is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Candidate pool must be an array or an object with a \"therapists\" array")]
    InvalidShape,
}

/// Therapist records available for matching, keyed by provider id
///
/// Loaded once and never mutated. Malformed records and repeated ids are
/// dropped while loading so one bad entry never poisons the batch.
#[derive(Debug, Clone, Default)]
pub struct CandidatePool {
    candidates: Vec<Candidate>,
    index: HashMap<String, usize>,
}

impl CandidatePool {
    /// Build a pool from raw JSON records, skipping the ones that fail to parse
    pub fn from_values(values: Vec<Value>) -> Self {
        let mut pool = Self::default();

        for value in values {
            match Candidate::from_value(value) {
                Ok(candidate) => {
                    if pool.index.contains_key(candidate.id()) {
                        tracing::warn!("Dropping duplicate candidate {}", candidate.id());
                        continue;
                    }
                    pool.index.insert(candidate.id().to_string(), pool.candidates.len());
                    pool.candidates.push(candidate);
                }
                Err(e) => {
                    tracing::warn!("Excluding candidate from pool: {}", e);
                }
            }
        }

        pool
    }

    pub fn from_candidates(candidates: Vec<Candidate>) -> Self {
        let values = candidates
            .into_iter()
            .filter_map(|candidate| serde_json::to_value(candidate).ok())
            .collect();
        Self::from_values(values)
    }

    /// Parse `{"therapists": [...]}` or a bare array
    pub fn from_json_str(json: &str) -> Result<Self, PoolError> {
        let value: Value = serde_json::from_str(json)?;

        let records = match value {
            Value::Array(records) => records,
            Value::Object(mut map) => match map.remove("therapists") {
                Some(Value::Array(records)) => records,
                _ => return Err(PoolError::InvalidShape),
            },
            _ => return Err(PoolError::InvalidShape),
        };

        Ok(Self::from_values(records))
    }

    /// Load the pool from a JSON file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, PoolError> {
        let json = std::fs::read_to_string(path.as_ref())?;
        let pool = Self::from_json_str(&json)?;
        tracing::info!(
            "Loaded {} candidates from {}",
            pool.len(),
            path.as_ref().display()
        );
        Ok(pool)
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn get(&self, id: &str) -> Option<&Candidate> {
        self.index.get(id).map(|&i| &self.candidates[i])
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    /// Join results back to their records for display; unknown ids are skipped
    pub fn enrich(&self, results: &[RankedResult]) -> Vec<EnrichedMatch> {
        results
            .iter()
            .filter_map(|result| {
                let therapist = self.get(&result.id)?;
                Some(EnrichedMatch {
                    id: result.id.clone(),
                    match_score: result.score,
                    match_reasons: result.reasons.clone(),
                    therapist: therapist.clone(),
                })
            })
            .collect()
    }
}
