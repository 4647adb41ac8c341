// SPDX-FileCopyrightText: 2026 Nagare Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state. The webhook and health
//! routes are public; everything under `/api` requires the bearer token.

use std::sync::Arc;

use axum::{
    middleware as axum_middleware,
    routing::{get, post, put},
    Router,
};
use nagare_core::traits::platform::PlatformAdapter;
use nagare_core::NagareError;
use nagare_engine::{DeliveryPoller, ReplyStrategy, ScenarioEngine, WebhookIngestor};
use nagare_storage::Database;
use tokio_util::sync::CancellationToken;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::auth::{require_bearer, AuthConfig};
use crate::handlers;
use crate::webhook;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database handle shared by all handlers.
    pub db: Database,
    /// Messaging platform, used directly for segment broadcasts.
    pub platform: Arc<dyn PlatformAdapter>,
    /// Webhook batch processor.
    pub ingestor: Arc<WebhookIngestor>,
    /// Scenario engine for manual execution.
    pub engine: ScenarioEngine,
    /// Delivery poller for on-demand processing.
    pub poller: DeliveryPoller,
    /// Channel secret for webhook signature verification. `None` rejects
    /// all webhook deliveries.
    pub channel_secret: Option<String>,
}

impl AppState {
    pub fn new(
        db: Database,
        platform: Arc<dyn PlatformAdapter>,
        strategy: ReplyStrategy,
        channel_secret: Option<String>,
        poller_batch_size: u32,
    ) -> Self {
        let ingestor = Arc::new(WebhookIngestor::new(db.clone(), platform.clone(), strategy));
        let engine = ScenarioEngine::new(db.clone(), platform.clone());
        let poller = DeliveryPoller::new(db.clone(), platform.clone(), poller_batch_size);
        Self {
            db,
            platform,
            ingestor,
            engine,
            poller,
            channel_secret,
        }
    }
}

/// Builds the application router.
///
/// Public: `POST /webhook` (signature-authenticated by the handler) and
/// `GET /health`. Admin routes under `/api` sit behind the bearer
/// middleware.
pub fn build_router(state: AppState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/webhook", post(webhook::post_webhook))
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route(
            "/api/scenarios",
            post(handlers::create_scenario).get(handlers::list_scenarios),
        )
        .route("/api/scenarios/{id}", get(handlers::get_scenario))
        .route(
            "/api/scenarios/{id}/execute",
            post(handlers::execute_scenario),
        )
        .route(
            "/api/deliveries/process",
            post(handlers::process_deliveries),
        )
        .route(
            "/api/deliveries/{id}/cancel",
            post(handlers::cancel_delivery),
        )
        .route("/api/segments/preview", post(handlers::preview_segment))
        .route("/api/segments/send", post(handlers::send_broadcast))
        .route("/api/segments/history", get(handlers::broadcast_history))
        .route("/api/escalations", get(handlers::list_escalations))
        .route("/api/escalations/{id}", put(handlers::update_escalation))
        .route_layer(axum_middleware::from_fn_with_state(auth, require_bearer))
        .with_state(state);

    Router::new()
        .merge(public_routes)
        .merge(api_routes)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

/// Starts the gateway HTTP server.
///
/// Binds to the configured host:port and serves until the token is
/// cancelled, then drains in-flight requests.
pub async fn start_server(
    config: &nagare_config::model::ServerConfig,
    state: AppState,
    cancel: CancellationToken,
) -> Result<(), NagareError> {
    let auth = AuthConfig {
        bearer_token: config.bearer_token.clone(),
    };
    let app = build_router(state, auth);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| NagareError::Internal(format!("failed to bind gateway to {addr}: {e}")))?;

    tracing::info!("gateway listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(cancel.cancelled_owned())
        .await
        .map_err(|e| NagareError::Internal(format!("gateway server error: {e}")))?;

    Ok(())
}
