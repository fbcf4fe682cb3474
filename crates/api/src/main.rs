//! Gabber API
//!
//! The entry point for all external API requests. Handles:
//! - Authentication extraction
//! - Rate limiting
//! - Request routing
//! - Observability (logging, metrics, tracing)

mod extract;
mod handlers;
mod middleware;

use axum::extract::DefaultBodyLimit;
use axum::routing::{delete, get, post};
use axum::Router;
use gabber_common::{
    auth::JwtManager,
    config::AppConfig,
    db::DbPool,
    mail::Notifier,
    metrics,
    storage::RecordingStore,
};
use metrics_exporter_prometheus::PrometheusBuilder;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;
use tracing_subscriber::EnvFilter;

/// Recordings arrive as multipart uploads; allow up to 250 MiB
const MAX_UPLOAD_BYTES: usize = 250 * 1024 * 1024;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: DbPool,
    pub jwt: Arc<JwtManager>,
    pub store: Arc<RecordingStore>,
    pub notifier: Notifier,
}

impl AppState {
    pub fn repo(&self) -> gabber_common::Repository {
        gabber_common::Repository::new(self.db.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load environment variables
    dotenvy::dotenv().ok();

    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_target(true)
        .json()
        .init();

    info!("Starting Gabber API v{}", gabber_common::VERSION);

    // Load configuration
    let config = AppConfig::load().map_err(|e| {
        tracing::error!(error = %e, "Failed to load configuration");
        e
    })?;

    let config = Arc::new(config);

    // Initialize metrics
    if config.observability.metrics_port > 0 {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], config.observability.metrics_port))
            .set_buckets(metrics::LATENCY_BUCKETS)?
            .install()?;
    }
    metrics::register_metrics();

    // Initialize database connection
    info!("Connecting to database...");
    let db = DbPool::new(&config.database).await?;

    // Initialize external collaborators
    let store = RecordingStore::new(&config.storage).await?;
    let notifier = Notifier::new(&config.mail);
    let jwt = JwtManager::new(&config.auth);

    // Create app state
    let state = AppState {
        config: config.clone(),
        db,
        jwt: Arc::new(jwt),
        store: Arc::new(store),
        notifier,
    };

    // Build the router
    let app = create_router(state);

    // Start the server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.server.port));
    info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server shutdown complete");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Rate limiting
    let limiter = middleware::rate_limit::create_rate_limiter(
        state.config.rate_limit.requests_per_second,
        state.config.rate_limit.burst,
    );
    let rate_limit_enabled = state.config.rate_limit.enabled;

    // API routes
    let api_routes = Router::new()
        // Auth endpoints
        .route("/auth/register", post(handlers::auth::register))
        .route("/auth/login", post(handlers::auth::login))
        // Project endpoints
        .route(
            "/projects",
            get(handlers::projects::list_projects).post(handlers::projects::create_project),
        )
        .route(
            "/projects/{id}",
            get(handlers::projects::get_project)
                .put(handlers::projects::update_project)
                .delete(handlers::projects::delete_project),
        )
        .route(
            "/projects/{id}/membership",
            post(handlers::projects::join_project).delete(handlers::projects::leave_project),
        )
        // Codebook endpoints
        .route(
            "/projects/{id}/codebook",
            get(handlers::codebook::list_codes).post(handlers::codebook::add_code),
        )
        // Session endpoints
        .route(
            "/projects/{id}/sessions",
            get(handlers::sessions::list_sessions).post(handlers::sessions::create_session),
        )
        .route(
            "/projects/{id}/sessions/{sid}",
            get(handlers::sessions::get_session),
        )
        // Annotation endpoints
        .route(
            "/projects/{id}/sessions/{sid}/annotations",
            get(handlers::annotations::list_annotations)
                .post(handlers::annotations::create_annotation),
        )
        .route(
            "/projects/{id}/sessions/{sid}/annotations/{aid}",
            delete(handlers::annotations::delete_annotation),
        )
        .route(
            "/projects/{id}/sessions/{sid}/annotations/{aid}/comments",
            get(handlers::comments::list_comments).post(handlers::comments::create_comment),
        )
        // Consent endpoints (token-addressed, reached from emailed links)
        .route(
            "/consent/{token}",
            get(handlers::consent::show_consent).post(handlers::consent::update_consent),
        );

    // Compose the app
    let mut app = Router::new()
        // Health endpoints (no auth)
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::new(state.config.request_timeout()))
        .layer(cors)
        .layer(request_id)
        .layer(propagate_id)
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES));

    if rate_limit_enabled {
        app = app.layer(axum::middleware::from_fn(move |request, next| {
            let limiter = limiter.clone();
            async move { middleware::rate_limit::rate_limit_middleware(request, next, limiter).await }
        }));
    }

    app.with_state(state)
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}
