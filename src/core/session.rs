use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::{Candidate, EnrichedMatch, SessionState, UserProfile};

/// How a stored session was reconciled on load
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SessionPhase {
    /// Nothing was stored
    NoSession,
    /// Form, matches and saved therapists restored
    RestoredResults,
    /// Stale or empty results, saved therapists kept
    RestoredSavedOnly,
    /// Nothing usable; the stored value should be removed
    Fresh,
}

/// Which screen the visitor should land on
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Step {
    #[default]
    Questionnaire,
    Results,
}

/// Raw stored shape, loose enough to tell old layouts from current ones
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct StoredSession {
    form_data: Value,
    matches: Vec<Value>,
    saved_matches: Vec<Value>,
}

/// A visitor's session as an explicit value
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Session {
    pub form_data: UserProfile,
    pub matches: Vec<EnrichedMatch>,
    pub saved_matches: Vec<Candidate>,
    pub step: Step,
}

fn parse_saved(values: Vec<Value>) -> Vec<Candidate> {
    let mut saved: Vec<Candidate> = Vec::with_capacity(values.len());
    for value in values {
        match Candidate::from_value(value) {
            Ok(candidate) if !saved.iter().any(|c| c.id() == candidate.id()) => saved.push(candidate),
            Ok(candidate) => tracing::debug!("Ignoring repeated saved therapist {}", candidate.id()),
            Err(e) => tracing::warn!("Ignoring unreadable saved therapist: {}", e),
        }
    }
    saved
}

impl Session {
    /// Reconcile a stored JSON value into a session.
    ///
    /// Results are only restored when the first match carries `id`, which
    /// is how the current layout is told apart from older ones. Anything
    /// unusable yields `Fresh` and an empty session.
    pub fn restore(stored: Option<&str>) -> (SessionPhase, Session) {
        let Some(raw) = stored else {
            return (SessionPhase::NoSession, Session::default());
        };

        let stored: StoredSession = match serde_json::from_str(raw) {
            Ok(stored) => stored,
            Err(e) => {
                tracing::warn!("Discarding unparsable session: {}", e);
                return (SessionPhase::Fresh, Session::default());
            }
        };

        let current_layout = stored
            .matches
            .first()
            .is_some_and(|first| first.get("id").is_some_and(Value::is_string));

        if current_layout {
            let matches = serde_json::from_value::<Vec<EnrichedMatch>>(Value::Array(stored.matches.clone()));
            let form_data = match &stored.form_data {
                Value::Null => Ok(UserProfile::default()),
                value => serde_json::from_value::<UserProfile>(value.clone()),
            };

            match (matches, form_data) {
                (Ok(matches), Ok(form_data)) => {
                    let session = Session {
                        form_data,
                        matches,
                        saved_matches: parse_saved(stored.saved_matches),
                        step: Step::Results,
                    };
                    return (SessionPhase::RestoredResults, session);
                }
                (Err(e), _) | (_, Err(e)) => {
                    tracing::warn!("Stored matches could not be restored: {}", e);
                }
            }
        }

        let saved_matches = parse_saved(stored.saved_matches);
        if !saved_matches.is_empty() {
            let session = Session {
                saved_matches,
                ..Session::default()
            };
            return (SessionPhase::RestoredSavedOnly, session);
        }

        (SessionPhase::Fresh, Session::default())
    }

    /// Replace the questionnaire and results, keeping saved therapists
    pub fn record_matches(&mut self, form_data: UserProfile, matches: Vec<EnrichedMatch>) {
        self.form_data = form_data;
        self.matches = matches;
        self.step = Step::Results;
    }

    pub fn is_saved(&self, provider_id: &str) -> bool {
        self.saved_matches.iter().any(|c| c.id() == provider_id)
    }

    /// Returns false if the therapist was already saved
    pub fn save(&mut self, candidate: Candidate) -> bool {
        if self.is_saved(candidate.id()) {
            return false;
        }
        self.saved_matches.push(candidate);
        true
    }

    /// Returns false if the therapist was not saved
    pub fn unsave(&mut self, provider_id: &str) -> bool {
        let before = self.saved_matches.len();
        self.saved_matches.retain(|c| c.id() != provider_id);
        self.saved_matches.len() != before
    }

    /// Flip membership in the saved list; returns whether it is now saved
    pub fn toggle_saved(&mut self, candidate: Candidate) -> bool {
        if self.unsave(candidate.id()) {
            false
        } else {
            self.save(candidate)
        }
    }

    /// Therapist record from the current results
    pub fn find_match(&self, provider_id: &str) -> Option<&Candidate> {
        self.matches
            .iter()
            .find(|m| m.id == provider_id)
            .map(|m| &m.therapist)
    }

    /// Clear the questionnaire and results; saved therapists survive
    pub fn start_over(&mut self) {
        self.form_data = UserProfile::default();
        self.matches.clear();
        self.step = Step::Questionnaire;
    }

    pub fn snapshot(&self) -> SessionState {
        SessionState {
            form_data: self.form_data.clone(),
            matches: self.matches.clone(),
            saved_matches: self.saved_matches.clone(),
        }
    }
}
