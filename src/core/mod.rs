// Core algorithm exports
pub mod cultural;
pub mod matcher;
pub mod pool;
pub mod rubric;
pub mod scoring;
pub mod session;
pub mod taxonomy;
pub mod text;

pub use cultural::{cultural_signals, CulturalSignals};
pub use matcher::{Matcher, NO_CULTURAL_MATCH_NOTE};
pub use pool::{CandidatePool, PoolError};
pub use rubric::{build_prompt, reconcile_delegate_output, validate_delegate_output, RubricError};
pub use scoring::{calculate_match_score, CandidateScore};
pub use session::{Session, SessionPhase, Step};
