//! BetterMatch - Therapist matching service
//!
//! Ranks a pool of therapists against a questionnaire, either through a
//! remote language-model delegate or through the local deterministic scorer
//! that implements the same rubric, and keeps each visitor's session.

pub mod config;
pub mod core;
pub mod models;
pub mod routes;
pub mod services;

// Re-export commonly used types
pub use core::{CandidatePool, Matcher, Session, SessionPhase};
pub use models::{Candidate, MatchSet, RankedResult, ScoringWeights, UserProfile};
