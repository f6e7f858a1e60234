//! Admission webhook server.
//!
//! Serves `POST /mutate` over TLS for Pod CREATE requests routed here by a
//! MutatingWebhookConfiguration. Certificates are read once at startup from
//! the webhook secret mounted at /etc/webhook/certs/; rotating them requires
//! a restart.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{
    Router,
    body::Bytes,
    extract::{State, rejection::BytesRejection},
    http::{HeaderMap, StatusCode, header::CONTENT_TYPE},
    response::{IntoResponse, Response},
    routing::post,
};
use axum_server::Handle;
use axum_server::tls_rustls::RustlsConfig;
use tracing::{debug, error, info, warn};

use crate::config::WebhookConfig;
use crate::error::{Error, Result};
use crate::health::{HealthState, ServerPhase};
use crate::shutdown::ShutdownSignal;
use crate::webhooks::mutation::AdmissionDecisionEngine;
use crate::webhooks::review::{AdmissionOutcome, decode_review, encode_review};

/// Path the MutatingWebhookConfiguration points at
pub const MUTATE_PATH: &str = "/mutate";
/// The only accepted request content type
pub const JSON_CONTENT_TYPE: &str = "application/json";

/// Shared state for webhook handlers
pub struct WebhookState {
    pub engine: AdmissionDecisionEngine,
    pub health: Arc<HealthState>,
}

impl WebhookState {
    pub fn new(engine: AdmissionDecisionEngine, health: Arc<HealthState>) -> Self {
        Self { engine, health }
    }
}

/// Create the webhook router
pub fn create_webhook_router(state: Arc<WebhookState>) -> Router {
    Router::new()
        .route(MUTATE_PATH, post(mutate_pods))
        .with_state(state)
}

/// Mutating admission handler for Pods
async fn mutate_pods(
    State(state): State<Arc<WebhookState>>,
    headers: HeaderMap,
    body: std::result::Result<Bytes, BytesRejection>,
) -> Response {
    let content_type = headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();
    if content_type != JSON_CONTENT_TYPE {
        warn!(content_type = %content_type, "Unsupported Content-Type, expect application/json");
        state.health.metrics.record_unsupported_media();
        return (
            StatusCode::UNSUPPORTED_MEDIA_TYPE,
            "invalid Content-Type, expect `application/json`",
        )
            .into_response();
    }

    let body = body.unwrap_or_else(|e| {
        warn!(error = %e, "Failed to read request body, treating as empty");
        Bytes::new()
    });

    let started = Instant::now();
    let (uid, outcome, label) = match decode_review(&body) {
        Ok(request) => {
            debug!(
                uid = %request.uid,
                kind = request.resource_kind(),
                operation = ?request.operation,
                dry_run = request.is_dry_run(),
                namespace = ?request.namespace,
                name = ?request.name,
                "Processing admission request"
            );
            let outcome = state.engine.decide(&request).await;
            let label = outcome.label();
            (Some(request.uid), outcome, label)
        }
        Err(e) => {
            error!(error = %e, "Can't decode admission review");
            (None, AdmissionOutcome::deny(e), "invalid")
        }
    };
    state
        .health
        .metrics
        .record_admission(label, started.elapsed().as_secs_f64());

    // Socket write errors surface inside the connection task that
    // axum_server spawns and drops, after this handler has returned. The
    // response built here is the last point the handler can log.
    match encode_review(uid.as_deref(), &outcome) {
        Ok(body) => {
            debug!(uid = ?uid, outcome = label, "Writing admission response");
            (StatusCode::OK, [(CONTENT_TYPE, JSON_CONTENT_TYPE)], body).into_response()
        }
        Err(e) => {
            error!(uid = ?uid, error = %e, "Can't encode admission response");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("could not encode response: {}", e),
            )
                .into_response()
        }
    }
}

/// Load the PEM certificate and key named by `config`
pub async fn load_tls_config(config: &WebhookConfig) -> Result<RustlsConfig> {
    RustlsConfig::from_pem_file(&config.cert_path, &config.key_path)
        .await
        .map_err(|e| {
            Error::TlsConfig(format!(
                "failed to load key pair {} / {}: {}",
                config.cert_path.display(),
                config.key_path.display(),
                e
            ))
        })
}

/// Serve admission requests over TLS until `shutdown` fires and draining ends.
///
/// Phase transitions are published on `state.health`: `Serving` once the
/// listener is bound, `Draining` when shutdown is requested and `Stopped`
/// once the server has returned. In-flight requests get at most
/// `grace_period` to finish after shutdown is requested.
pub async fn serve_with_tls(
    addr: SocketAddr,
    tls: RustlsConfig,
    state: Arc<WebhookState>,
    shutdown: ShutdownSignal,
    grace_period: Duration,
) -> Result<()> {
    let health = state.health.clone();
    let handle = Handle::new();

    let listening = {
        let handle = handle.clone();
        let health = health.clone();
        tokio::spawn(async move {
            if let Some(local) = handle.listening().await {
                health.advance_phase(ServerPhase::Serving).await;
                info!(addr = %local, "Webhook server listening with TLS");
            }
        })
    };

    let drain = {
        let handle = handle.clone();
        let health = health.clone();
        tokio::spawn(async move {
            shutdown.wait().await;
            health.advance_phase(ServerPhase::Draining).await;
            info!(
                grace_secs = grace_period.as_secs(),
                connections = handle.connection_count(),
                "Draining webhook server"
            );
            handle.graceful_shutdown(Some(grace_period));
        })
    };

    let app = create_webhook_router(state);
    let result = axum_server::bind_rustls(addr, tls)
        .handle(handle)
        .serve(app.into_make_service())
        .await;

    listening.abort();
    drain.abort();
    health.advance_phase(ServerPhase::Stopped).await;
    info!("Webhook server stopped");

    result.map_err(Error::Server)
}

/// Run the webhook server on the configured port
pub async fn run_webhook_server(
    config: &WebhookConfig,
    tls: RustlsConfig,
    state: Arc<WebhookState>,
    shutdown: ShutdownSignal,
) -> Result<()> {
    serve_with_tls(
        config.webhook_addr(),
        tls,
        state,
        shutdown,
        config.shutdown_grace_period,
    )
    .await
}
