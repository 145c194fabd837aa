// Model exports
pub mod domain;
pub mod requests;
pub mod responses;

pub use domain::{
    ApproachPreference, Candidate, CandidateError, Clinical, CommunicationStyle, CulturalImportance,
    Economics, EnrichedMatch, FeeStructure, Identity, Insurance, LgbtqImportance, Location,
    MatchSet, MatchSource, MatchingPolicy, PastTherapy, RankedResult, ReligiousPreference,
    ScoreBreakdown, ScoringWeights, SessionState, UserProfile,
};
pub use requests::{MatchRequest, ToggleSavedRequest};
pub use responses::{ErrorResponse, HealthResponse, MatchResponse, SessionResponse, ToggleSavedResponse};
