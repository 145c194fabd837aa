use actix_web::{web, HttpResponse, Responder};
use std::sync::Arc;
use validator::Validate;

use crate::core::{CandidatePool, Matcher, Session};
use crate::models::{ErrorResponse, HealthResponse, MatchRequest, MatchResponse, MatchSet, UserProfile};
use crate::services::{ClaudeClient, DelegateError, SessionStore};

/// Application state shared across all handlers
#[derive(Clone)]
pub struct AppState {
    pub pool: Arc<CandidatePool>,
    pub matcher: Matcher,
    pub delegate: Arc<ClaudeClient>,
    pub sessions: Arc<SessionStore>,
}

/// Configure all match-related routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/health", web::get().to(health_check))
        .route("/match", web::post().to(find_matches))
        .route("/match/fallback", web::post().to(find_matches_fallback));
}

/// Health check endpoint
async fn health_check(state: web::Data<AppState>) -> impl Responder {
    let status = if state.pool.is_empty() { "degraded" } else { "healthy" };

    HttpResponse::Ok().json(HealthResponse {
        status: status.to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: chrono::Utc::now(),
        delegate_configured: state.delegate.is_configured(),
    })
}

fn validation_error(errors: validator::ValidationErrors) -> HttpResponse {
    HttpResponse::BadRequest().json(ErrorResponse::new("validation_failed", errors.to_string(), 400))
}

/// The request's own therapist list, or the configured pool
fn resolve_pool(state: &AppState, therapists: Option<Vec<serde_json::Value>>) -> Arc<CandidatePool> {
    match therapists {
        Some(records) => {
            let pool = CandidatePool::from_values(records);
            tracing::debug!("Using request-supplied pool of {} candidates", pool.len());
            Arc::new(pool)
        }
        None => state.pool.clone(),
    }
}

/// Map delegate failures to HTTP responses
pub(crate) fn delegate_error_response(err: &DelegateError) -> HttpResponse {
    let (status, error) = match err {
        DelegateError::Configuration => (503, "configuration_error"),
        DelegateError::Timeout(_) => (504, "transport_error"),
        DelegateError::Transport(_) | DelegateError::Status { .. } => (502, "transport_error"),
        DelegateError::MalformedResponse(_) => (502, "malformed_response"),
        DelegateError::Prompt(_) => (500, "internal_error"),
    };

    let mut body = ErrorResponse::new(error, err.to_string(), status);
    body.retryable = err.is_retryable();
    body.fallback_available = !matches!(err, DelegateError::Prompt(_));

    let status = actix_web::http::StatusCode::from_u16(status)
        .unwrap_or(actix_web::http::StatusCode::INTERNAL_SERVER_ERROR);
    HttpResponse::build(status).json(body)
}

/// Merge results into the visitor's session and persist it
///
/// Storage failures are logged; the ranking itself already succeeded.
async fn record_in_session(
    state: &AppState,
    session_id: &str,
    profile: UserProfile,
    pool: &CandidatePool,
    result: &MatchSet,
) {
    let stored = match state.sessions.load_raw(session_id).await {
        Ok(stored) => stored,
        Err(e) => {
            tracing::error!("Failed to load session {}: {}", session_id, e);
            return;
        }
    };

    let (phase, mut session) = Session::restore(stored.as_deref());
    tracing::debug!("Session {} reconciled as {:?}", session_id, phase);

    session.record_matches(profile, pool.enrich(&result.matches));

    if let Err(e) = state.sessions.save(session_id, &session.snapshot()).await {
        tracing::error!("Failed to save session {}: {}", session_id, e);
    }
}

/// Rank with the remote delegate
///
/// POST /api/v1/match
///
/// Request body:
/// ```json
/// {
///   "userProfile": { "concerns": ["Anxiety"], "culturalMatch": "very-important" },
///   "therapists": [ ... ],
///   "sessionId": "string"
/// }
/// ```
async fn find_matches(state: web::Data<AppState>, req: web::Json<MatchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for match request: {:?}", errors);
        return validation_error(errors);
    }

    let MatchRequest {
        user_profile,
        therapists,
        session_id,
    } = req.into_inner();
    let pool = resolve_pool(&state, therapists);

    tracing::info!(
        "Ranking {} candidates remotely for {} concerns",
        pool.len(),
        user_profile.concerns.len()
    );

    let result = match state.delegate.rank(&state.matcher, &user_profile, &pool).await {
        Ok(result) => result,
        Err(e) => {
            tracing::error!("Remote ranking failed: {}", e);
            return delegate_error_response(&e);
        }
    };

    if let Some(id) = &session_id {
        record_in_session(&state, id, user_profile, &pool, &result).await;
    }

    HttpResponse::Ok().json(MatchResponse {
        result,
        session_id,
        generated_at: chrono::Utc::now(),
    })
}

/// Rank with the local deterministic scorer
///
/// POST /api/v1/match/fallback
async fn find_matches_fallback(state: web::Data<AppState>, req: web::Json<MatchRequest>) -> impl Responder {
    if let Err(errors) = req.validate() {
        tracing::info!("Validation failed for fallback match request: {:?}", errors);
        return validation_error(errors);
    }

    let MatchRequest {
        user_profile,
        therapists,
        session_id,
    } = req.into_inner();
    let pool = resolve_pool(&state, therapists);

    let result = state.matcher.find_matches_random(&user_profile, pool.candidates());

    tracing::info!(
        "Returning {} deterministic matches (from {} candidates)",
        result.matches.len(),
        result.total_candidates
    );

    if let Some(id) = &session_id {
        record_in_session(&state, id, user_profile, &pool, &result).await;
    }

    HttpResponse::Ok().json(MatchResponse {
        result,
        session_id,
        generated_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use actix_web::body::to_bytes;

    #[actix_web::test]
    async fn test_configuration_error_offers_fallback() {
        let response = delegate_error_response(&DelegateError::Configuration);
        assert_eq!(response.status().as_u16(), 503);

        let body = to_bytes(response.into_body()).await.unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "configuration_error");
        assert!(error.fallback_available);
        assert!(!error.retryable);
    }

    #[actix_web::test]
    async fn test_timeout_is_retryable() {
        let response = delegate_error_response(&DelegateError::Timeout(30));
        assert_eq!(response.status().as_u16(), 504);

        let body = to_bytes(response.into_body()).await.unwrap();
        let error: ErrorResponse = serde_json::from_slice(&body).unwrap();
        assert_eq!(error.error, "transport_error");
        assert!(error.retryable);
    }
}
