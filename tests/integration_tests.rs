// Integration tests for the BetterMatch HTTP API

use std::sync::Arc;

use actix_web::{test, web, App};
use bettermatch::config::DelegateSettings;
use bettermatch::core::{CandidatePool, Matcher};
use bettermatch::models::{ErrorResponse, HealthResponse};
use bettermatch::routes::{self, AppState};
use bettermatch::services::{ClaudeClient, SessionStore};
use serde_json::{json, Value};

fn create_state(api_url: Option<String>, api_key: Option<&str>) -> AppState {
    let mut delegate = DelegateSettings {
        api_key: api_key.map(str::to_string),
        timeout_secs: 5,
        ..Default::default()
    };
    if let Some(url) = api_url {
        delegate.api_url = url;
    }

    AppState {
        pool: Arc::new(CandidatePool::load("data/therapists.json").unwrap()),
        matcher: Matcher::default(),
        delegate: Arc::new(ClaudeClient::new(delegate).unwrap()),
        sessions: Arc::new(SessionStore::in_memory(100, 600)),
    }
}

macro_rules! init_app {
    ($state:expr) => {
        test::init_service(
            App::new()
                .app_data(web::Data::new($state))
                .configure(routes::configure_app),
        )
        .await
    };
}

fn match_body(session_id: Option<&str>) -> Value {
    let mut body = json!({
        "userProfile": {
            "concerns": ["Anxiety", "Family Issues"],
            "therapyApproach": "practical",
            "communicationStyle": "warm",
            "culturalMatch": "very-important",
            "languagePreference": ["Hindi"],
            "lgbtqAffirming": "preferred",
            "religiousPreference": "hindu",
            "insurance": "Aetna"
        }
    });
    if let Some(id) = session_id {
        body["sessionId"] = json!(id);
    }
    body
}

#[actix_web::test]
async fn test_health_reports_delegate_state() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::get().uri("/api/v1/health").to_request();
    let resp: HealthResponse = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp.status, "healthy");
    assert!(!resp.delegate_configured);
}

#[actix_web::test]
async fn test_remote_match_without_key_offers_fallback() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::post()
        .uri("/api/v1/match")
        .set_json(match_body(None))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 503);

    let error: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(error.error, "configuration_error");
    assert!(error.fallback_available);
}

#[actix_web::test]
async fn test_match_requires_a_concern() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::post()
        .uri("/api/v1/match/fallback")
        .set_json(json!({ "userProfile": { "concerns": [] } }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 400);
}

#[actix_web::test]
async fn test_invalid_json_is_reported_as_json() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::post()
        .uri("/api/v1/match/fallback")
        .insert_header(("content-type", "application/json"))
        .set_payload("{ not json")
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 400);

    let error: ErrorResponse = test::read_body_json(resp).await;
    assert_eq!(error.error, "invalid_json");
}

#[actix_web::test]
async fn test_fallback_match_persists_session() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::post()
        .uri("/api/v1/match/fallback")
        .set_json(match_body(Some("visitor-1")))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["source"], "deterministic");
    assert_eq!(resp["sessionId"], "visitor-1");
    let matches = resp["matches"].as_array().unwrap();
    assert_eq!(matches.len(), 5);
    assert_eq!(matches[0]["id"], "bm-001");

    let req = test::TestRequest::get().uri("/api/v1/session/visitor-1").to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(session["phase"], "restored-results");
    assert_eq!(session["step"], "results");
    assert_eq!(session["session"]["matches"].as_array().unwrap().len(), 5);
    assert_eq!(session["session"]["matches"][0]["provider_id"], "bm-001");
    assert!(session["session"]["matches"][0]["matchScore"].is_number());
}

#[actix_web::test]
async fn test_toggle_saved_twice_and_start_over() {
    let app = init_app!(create_state(None, None));

    let toggle = || {
        test::TestRequest::post()
            .uri("/api/v1/session/visitor-2/saved")
            .set_json(json!({ "providerId": "bm-003" }))
            .to_request()
    };

    let first: Value = test::call_and_read_body_json(&app, toggle()).await;
    assert_eq!(first["saved"], true);
    assert_eq!(first["savedMatches"][0]["provider_id"], "bm-003");

    let second: Value = test::call_and_read_body_json(&app, toggle()).await;
    assert_eq!(second["saved"], false);
    assert!(second["savedMatches"].as_array().unwrap().is_empty());

    let _: Value = test::call_and_read_body_json(&app, toggle()).await;

    let req = test::TestRequest::post()
        .uri("/api/v1/match/fallback")
        .set_json(match_body(Some("visitor-2")))
        .to_request();
    let _: Value = test::call_and_read_body_json(&app, req).await;

    let req = test::TestRequest::post().uri("/api/v1/session/visitor-2/reset").to_request();
    let reset: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(reset["step"], "questionnaire");
    assert!(reset["session"]["matches"].as_array().unwrap().is_empty());
    assert_eq!(reset["session"]["savedMatches"].as_array().unwrap().len(), 1);
}

#[actix_web::test]
async fn test_unknown_therapist_cannot_be_saved() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::post()
        .uri("/api/v1/session/visitor-3/saved")
        .set_json(json!({ "providerId": "nobody" }))
        .to_request();
    let resp = test::call_service(&app, req).await;

    assert_eq!(resp.status().as_u16(), 404);
}

#[actix_web::test]
async fn test_imported_old_layout_is_discarded() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::put()
        .uri("/api/v1/session/visitor-4")
        .set_json(json!({ "matches": [{ "provider_id": "x" }], "savedMatches": [] }))
        .to_request();
    let imported: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(imported["phase"], "fresh");

    let req = test::TestRequest::get().uri("/api/v1/session/visitor-4").to_request();
    let restored: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(restored["phase"], "no-session");
}

#[actix_web::test]
async fn test_saved_only_session_is_rewritten() {
    let state = create_state(None, None);
    let sessions = state.sessions.clone();
    let app = init_app!(state);

    let saved = json!({
        "provider_id": "bm-003",
        "identity": { "name": "Elena Vargas" },
        "economics": { "insurance": { "in_network_plans": [] } },
        "clinical": { "specialties": ["PTSD"], "modalities": ["EMDR"], "populations": ["Latinx"] }
    });
    let req = test::TestRequest::put()
        .uri("/api/v1/session/visitor-7")
        .set_json(json!({
            "formData": { "concerns": ["Grief & Loss"] },
            "matches": [{ "provider_id": "x" }],
            "savedMatches": [saved]
        }))
        .to_request();
    let imported: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(imported["phase"], "restored-saved-only");

    let raw = sessions.load_raw("visitor-7").await.unwrap().unwrap();
    let stored: Value = serde_json::from_str(&raw).unwrap();
    assert!(stored["matches"].as_array().unwrap().is_empty());
    assert!(stored["formData"]["concerns"].as_array().unwrap().is_empty());
    assert_eq!(stored["savedMatches"][0]["provider_id"], "bm-003");

    let req = test::TestRequest::get().uri("/api/v1/session/visitor-7").to_request();
    let restored: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(restored["phase"], "restored-saved-only");
}

#[actix_web::test]
async fn test_create_session_returns_new_id() {
    let app = init_app!(create_state(None, None));

    let req = test::TestRequest::post().uri("/api/v1/session").to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 201);

    let body: Value = test::read_body_json(resp).await;
    assert!(uuid::Uuid::parse_str(body["sessionId"].as_str().unwrap()).is_ok());
    assert_eq!(body["phase"], "no-session");
}

#[actix_web::test]
async fn test_remote_match_uses_delegate_answer() {
    let mut server = mockito::Server::new_async().await;
    let answer = json!([
        { "id": "bm-006", "score": 74, "reasons": ["Focuses on anxiety and OCD"] },
        { "id": "bm-001", "score": 92, "reasons": ["Speaks Hindi", "Works with South Asian families"] },
        { "id": "not-in-pool", "score": 99, "reasons": ["Invented"] },
        { "id": "bm-004", "score": 60, "reasons": ["In network with Aetna"] },
        { "id": "bm-008", "score": 65, "reasons": ["Practical, skills-based style"] },
        { "id": "bm-003", "score": 70, "reasons": ["Works with immigrant families"] }
    ])
    .to_string();
    let mock = server
        .mock("POST", "/v1/messages")
        .match_header("x-api-key", "test-key")
        .with_status(200)
        .with_body(json!({ "content": [{ "type": "text", "text": answer }] }).to_string())
        .create_async()
        .await;

    let app = init_app!(create_state(Some(format!("{}/v1/messages", server.url())), Some("test-key")));

    let req = test::TestRequest::post()
        .uri("/api/v1/match")
        .set_json(match_body(Some("visitor-5")))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    mock.assert_async().await;
    assert_eq!(resp["source"], "delegate");
    assert!(resp.get("fallbackReason").is_none());
    let ids: Vec<&str> = resp["matches"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|m| m["id"].as_str())
        .collect();
    assert_eq!(ids, vec!["bm-001", "bm-006", "bm-003", "bm-008", "bm-004"]);
}

#[actix_web::test]
async fn test_short_delegate_answer_falls_back_visibly() {
    let mut server = mockito::Server::new_async().await;
    let answer = json!([
        { "id": "bm-001", "score": 70, "reasons": ["Speaks Hindi"] },
        { "id": "bm-001", "score": 65, "reasons": ["Repeated"] }
    ])
    .to_string();
    server
        .mock("POST", "/v1/messages")
        .with_status(200)
        .with_body(json!({ "content": [{ "type": "text", "text": answer }] }).to_string())
        .create_async()
        .await;

    let app = init_app!(create_state(Some(format!("{}/v1/messages", server.url())), Some("test-key")));

    let req = test::TestRequest::post()
        .uri("/api/v1/match")
        .set_json(match_body(None))
        .to_request();
    let resp: Value = test::call_and_read_body_json(&app, req).await;

    assert_eq!(resp["source"], "deterministic");
    assert!(resp["fallbackReason"].as_str().unwrap().contains("expected 5"));
    assert_eq!(resp["matches"].as_array().unwrap().len(), 5);
}

#[actix_web::test]
async fn test_remote_server_error_is_retryable() {
    let mut server = mockito::Server::new_async().await;
    server
        .mock("POST", "/v1/messages")
        .with_status(503)
        .with_body("unavailable")
        .create_async()
        .await;

    let app = init_app!(create_state(Some(format!("{}/v1/messages", server.url())), Some("test-key")));

    let req = test::TestRequest::post()
        .uri("/api/v1/match")
        .set_json(match_body(Some("visitor-6")))
        .to_request();
    let resp = test::call_service(&app, req).await;
    assert_eq!(resp.status().as_u16(), 502);

    let error: ErrorResponse = test::read_body_json(resp).await;
    assert!(error.retryable);
    assert!(error.fallback_available);

    // Nothing was persisted for the failed attempt
    let req = test::TestRequest::get().uri("/api/v1/session/visitor-6").to_request();
    let session: Value = test::call_and_read_body_json(&app, req).await;
    assert_eq!(session["phase"], "no-session");
}
