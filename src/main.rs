use actix_cors::Cors;
use actix_web::{middleware, web, App, HttpServer};
use bettermatch::config::{LoggingSettings, Settings};
use bettermatch::core::{CandidatePool, Matcher};
use bettermatch::routes::{self, AppState};
use bettermatch::services::{ClaudeClient, SessionStore};
use std::sync::Arc;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

fn init_logging(logging: &LoggingSettings) {
    // LOG_LEVEL / LOG_FORMAT win over the config file
    let log_level = std::env::var("LOG_LEVEL").unwrap_or_else(|_| logging.level.clone());
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_else(|_| logging.format.clone());

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level));

    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_level(true);

    if log_format == "pretty" {
        subscriber.pretty().init();
    } else {
        subscriber.init();
    }
}

fn startup_error(what: &str, err: impl std::fmt::Display) -> std::io::Error {
    error!("{}: {}", what, err);
    std::io::Error::new(std::io::ErrorKind::Other, format!("{}: {}", what, err))
}

#[actix_web::main]
async fn main() -> std::io::Result<()> {
    // Load .env file if present
    dotenv::dotenv().ok();

    let settings = Settings::load();
    init_logging(&settings.as_ref().map(|s| s.logging.clone()).unwrap_or_default());

    info!("Starting BetterMatch matching service...");

    let settings = settings.map_err(|e| startup_error("Failed to load configuration", e))?;

    info!("Configuration loaded successfully");

    let pool = CandidatePool::load(&settings.pool.path)
        .map_err(|e| startup_error("Failed to load candidate pool", e))?;
    if pool.is_empty() {
        warn!("Candidate pool at {} is empty", settings.pool.path);
    }

    let delegate = ClaudeClient::new(settings.delegate.clone())
        .map_err(|e| startup_error("Failed to create delegate client", e))?;
    if delegate.is_configured() {
        info!("Remote ranking enabled (model: {})", settings.delegate.model);
    } else {
        warn!("CLAUDE_API_KEY not set; only deterministic ranking is available");
    }

    let session_ttl = settings.session.ttl_secs;
    let l1_cache_size = settings.session.l1_cache_size;

    let sessions = match SessionStore::connect(settings.session.redis_url.as_deref(), l1_cache_size, session_ttl).await {
        Ok(store) => {
            info!(
                "Session store initialized (L1: {} entries, TTL: {}s, shared: {})",
                l1_cache_size,
                session_ttl,
                store.is_shared()
            );
            store
        }
        Err(e) => {
            error!("Failed to connect to Redis ({}), keeping sessions in memory", e);
            SessionStore::in_memory(l1_cache_size, session_ttl)
        }
    };

    let matcher = Matcher::new(settings.scoring_weights(), settings.matching_policy());

    info!("Matcher initialized with weights: {:?}", matcher.weights());

    // Build application state
    let app_state = AppState {
        pool: Arc::new(pool),
        matcher,
        delegate: Arc::new(delegate),
        sessions: Arc::new(sessions),
    };

    // Configure HTTP server
    let host = settings.server.host.clone();
    let port = settings.server.port;
    let workers = settings.server.workers.unwrap_or(4);

    info!("Starting HTTP server on {}:{}", host, port);

    HttpServer::new(move || {
        let cors = Cors::permissive();

        App::new()
            .app_data(web::Data::new(app_state.clone()))
            .wrap(cors)
            .wrap(middleware::Logger::default())
            .wrap(middleware::Compress::default())
            .configure(routes::configure_app)
    })
    .workers(workers)
    .bind((host, port))?
    .run()
    .await
}
