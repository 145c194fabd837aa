use actix_web::{web, HttpResponse, Responder};
use validator::Validate;

use crate::core::{Session, SessionPhase};
use crate::models::{ErrorResponse, SessionResponse, ToggleSavedRequest, ToggleSavedResponse};
use crate::routes::matches::AppState;
use crate::services::StoreError;

const MAX_SESSION_ID_LEN: usize = 128;

/// Configure session routes
pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg
        .route("/session", web::post().to(create_session))
        .route("/session/{id}", web::get().to(get_session))
        .route("/session/{id}", web::put().to(import_session))
        .route("/session/{id}/saved", web::post().to(toggle_saved))
        .route("/session/{id}/reset", web::post().to(start_over));
}

fn store_error(session_id: &str, err: StoreError) -> HttpResponse {
    tracing::error!("Session store failure for {}: {}", session_id, err);
    let mut body = ErrorResponse::new("session_store_error", err.to_string(), 500);
    body.retryable = true;
    HttpResponse::InternalServerError().json(body)
}

fn check_session_id(session_id: &str) -> Result<(), HttpResponse> {
    if session_id.trim().is_empty() || session_id.len() > MAX_SESSION_ID_LEN {
        return Err(HttpResponse::BadRequest().json(ErrorResponse::new(
            "invalid_session_id",
            format!("Session id must be 1-{} characters", MAX_SESSION_ID_LEN),
            400,
        )));
    }
    Ok(())
}

/// Load and reconcile a stored session.
///
/// Unusable values are removed and old-layout results are dropped from the store.
async fn load_session(state: &AppState, session_id: &str) -> Result<(SessionPhase, Session), StoreError> {
    let stored = state.sessions.load_raw(session_id).await?;
    let (phase, session) = Session::restore(stored.as_deref());

    match phase {
        SessionPhase::Fresh => {
            tracing::info!("Discarding stale session {}", session_id);
            state.sessions.remove(session_id).await?;
        }
        SessionPhase::RestoredSavedOnly => {
            tracing::info!("Rewriting session {} with saved therapists only", session_id);
            state.sessions.save(session_id, &session.snapshot()).await?;
        }
        SessionPhase::NoSession | SessionPhase::RestoredResults => {}
    }

    Ok((phase, session))
}

fn session_response(session_id: String, phase: SessionPhase, session: &Session) -> SessionResponse {
    SessionResponse {
        session_id,
        phase,
        step: session.step,
        session: session.snapshot(),
    }
}

/// POST /api/v1/session
async fn create_session() -> impl Responder {
    let session_id = uuid::Uuid::new_v4().to_string();
    tracing::debug!("Created session {}", session_id);
    HttpResponse::Created().json(session_response(session_id, SessionPhase::NoSession, &Session::default()))
}

/// GET /api/v1/session/{id}
async fn get_session(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    if let Err(response) = check_session_id(&session_id) {
        return response;
    }

    match load_session(&state, &session_id).await {
        Ok((phase, session)) => HttpResponse::Ok().json(session_response(session_id, phase, &session)),
        Err(e) => store_error(&session_id, e),
    }
}

/// Import a session value kept by a browser and reconcile it
///
/// PUT /api/v1/session/{id}
async fn import_session(
    state: web::Data<AppState>,
    path: web::Path<String>,
    body: web::Json<serde_json::Value>,
) -> impl Responder {
    let session_id = path.into_inner();
    if let Err(response) = check_session_id(&session_id) {
        return response;
    }

    if let Err(e) = state.sessions.save_raw(&session_id, body.into_inner().to_string()).await {
        return store_error(&session_id, e);
    }

    match load_session(&state, &session_id).await {
        Ok((phase, session)) => HttpResponse::Ok().json(session_response(session_id, phase, &session)),
        Err(e) => store_error(&session_id, e),
    }
}

/// Save or unsave a therapist
///
/// POST /api/v1/session/{id}/saved
///
/// Request body:
/// ```json
/// { "providerId": "string" }
/// ```
async fn toggle_saved(
    state: web::Data<AppState>,
    path: web::Path<String>,
    req: web::Json<ToggleSavedRequest>,
) -> impl Responder {
    let session_id = path.into_inner();
    if let Err(response) = check_session_id(&session_id) {
        return response;
    }
    if let Err(errors) = req.validate() {
        return HttpResponse::BadRequest().json(ErrorResponse::new("validation_failed", errors.to_string(), 400));
    }

    let (_, mut session) = match load_session(&state, &session_id).await {
        Ok(loaded) => loaded,
        Err(e) => return store_error(&session_id, e),
    };

    let provider_id = req.provider_id.trim();
    let saved = if session.unsave(provider_id) {
        false
    } else {
        let candidate = session
            .find_match(provider_id)
            .or_else(|| state.pool.get(provider_id))
            .cloned();

        match candidate {
            Some(candidate) => session.save(candidate),
            None => {
                return HttpResponse::NotFound().json(ErrorResponse::new(
                    "not_found",
                    format!("Therapist {} not found", provider_id),
                    404,
                ));
            }
        }
    };

    if let Err(e) = state.sessions.save(&session_id, &session.snapshot()).await {
        return store_error(&session_id, e);
    }

    tracing::debug!("Session {}: therapist {} saved={}", session_id, provider_id, saved);

    HttpResponse::Ok().json(ToggleSavedResponse {
        saved,
        saved_matches: session.saved_matches,
    })
}

/// Clear answers and results, keeping saved therapists
///
/// POST /api/v1/session/{id}/reset
async fn start_over(state: web::Data<AppState>, path: web::Path<String>) -> impl Responder {
    let session_id = path.into_inner();
    if let Err(response) = check_session_id(&session_id) {
        return response;
    }

    let (phase, mut session) = match load_session(&state, &session_id).await {
        Ok(loaded) => loaded,
        Err(e) => return store_error(&session_id, e),
    };

    session.start_over();

    if let Err(e) = state.sessions.save(&session_id, &session.snapshot()).await {
        return store_error(&session_id, e);
    }

    HttpResponse::Ok().json(session_response(session_id, phase, &session))
}
