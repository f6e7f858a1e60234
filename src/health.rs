//! Health server for Kubernetes probes and Prometheus metrics.
//!
//! Provides:
//! - `/healthz` - Liveness probe (always returns 200 if server is running)
//! - `/readyz` - Readiness probe (returns 200 while the webhook is serving)
//! - `/metrics` - Prometheus metrics endpoint

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::get,
};
use prometheus_client::encoding::text::encode;
use prometheus_client::encoding::{EncodeLabel, EncodeLabelSet, LabelSetEncoder};
use prometheus_client::metrics::counter::Counter;
use prometheus_client::metrics::family::Family;
use prometheus_client::metrics::histogram::{Histogram, exponential_buckets};
use prometheus_client::registry::Registry;
use tokio::sync::RwLock;
use tracing::{debug, info};

use crate::shutdown::ShutdownSignal;

/// Lifecycle phase of the webhook server.
///
/// Phases only move forward: Starting -> Serving -> Draining -> Stopped.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum ServerPhase {
    #[default]
    Starting,
    Serving,
    Draining,
    Stopped,
}

impl std::fmt::Display for ServerPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ServerPhase::Starting => "Starting",
            ServerPhase::Serving => "Serving",
            ServerPhase::Draining => "Draining",
            ServerPhase::Stopped => "Stopped",
        };
        f.write_str(s)
    }
}

/// Labels for admission outcome metrics
#[derive(Clone, Debug, Hash, PartialEq, Eq)]
pub struct OutcomeLabels {
    pub outcome: String,
}

impl EncodeLabelSet for OutcomeLabels {
    fn encode(&self, encoder: &mut LabelSetEncoder<'_>) -> Result<(), std::fmt::Error> {
        ("outcome", self.outcome.as_str()).encode(encoder.encode_label())?;
        Ok(())
    }
}

/// Shared metrics for the webhook
pub struct Metrics {
    /// Admission reviews answered, by outcome
    pub admissions_total: Family<OutcomeLabels, Counter>,
    /// Requests rejected for a wrong content type
    pub unsupported_media_total: Counter,
    /// Time from decoded body to encoded response
    pub admission_duration_seconds: Histogram,
    /// Prometheus registry
    registry: Registry,
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    /// Create a new metrics instance with registered metrics
    pub fn new() -> Self {
        let mut registry = Registry::default();

        let admissions_total = Family::<OutcomeLabels, Counter>::default();
        registry.register(
            "node_restriction_admissions",
            "Total number of admission reviews by outcome",
            admissions_total.clone(),
        );

        let unsupported_media_total = Counter::default();
        registry.register(
            "node_restriction_unsupported_media",
            "Requests rejected for a Content-Type other than application/json",
            unsupported_media_total.clone(),
        );

        let admission_duration_seconds = Histogram::new(exponential_buckets(0.0005, 2.0, 14));
        registry.register(
            "node_restriction_admission_duration_seconds",
            "Duration of admission decisions in seconds",
            admission_duration_seconds.clone(),
        );

        Self {
            admissions_total,
            unsupported_media_total,
            admission_duration_seconds,
            registry,
        }
    }

    /// Record an answered admission review
    pub fn record_admission(&self, outcome: &str, duration_secs: f64) {
        let labels = OutcomeLabels {
            outcome: outcome.to_string(),
        };
        self.admissions_total.get_or_create(&labels).inc();
        self.admission_duration_seconds.observe(duration_secs);
    }

    /// Record a request rejected before decoding
    pub fn record_unsupported_media(&self) {
        self.unsupported_media_total.inc();
    }

    /// Encode metrics to Prometheus text format
    pub fn encode(&self) -> String {
        let mut buffer = String::new();
        if encode(&mut buffer, &self.registry).is_err() {
            tracing::error!("Failed to encode metrics");
            return "# Error encoding metrics".to_string();
        }
        buffer
    }
}

/// Shared state for the health server
pub struct HealthState {
    /// Current lifecycle phase of the webhook server
    phase: RwLock<ServerPhase>,
    /// Metrics registry
    pub metrics: Metrics,
}

impl Default for HealthState {
    fn default() -> Self {
        Self::new()
    }
}

impl HealthState {
    /// Create a new health state (starts in `Starting`, not ready)
    pub fn new() -> Self {
        Self {
            phase: RwLock::new(ServerPhase::Starting),
            metrics: Metrics::new(),
        }
    }

    /// Move to `next` if it is later than the current phase.
    ///
    /// Returns whether the phase changed.
    pub async fn advance_phase(&self, next: ServerPhase) -> bool {
        let mut phase = self.phase.write().await;
        if next > *phase {
            debug!(from = %*phase, to = %next, "Webhook phase transition");
            *phase = next;
            true
        } else {
            false
        }
    }

    /// Current lifecycle phase
    pub async fn phase(&self) -> ServerPhase {
        *self.phase.read().await
    }

    /// Ready only while serving
    pub async fn is_ready(&self) -> bool {
        self.phase().await == ServerPhase::Serving
    }
}

/// Liveness probe handler
///
/// Returns 200 OK if the process is alive.
async fn healthz() -> impl IntoResponse {
    (StatusCode::OK, "ok")
}

/// Readiness probe handler
///
/// Returns 200 OK while admission requests are being served.
/// Returns 503 Service Unavailable while starting or draining.
async fn readyz(State(state): State<Arc<HealthState>>) -> Response {
    if state.is_ready().await {
        (StatusCode::OK, "ready").into_response()
    } else {
        let phase = state.phase().await;
        (StatusCode::SERVICE_UNAVAILABLE, format!("not ready: {}", phase)).into_response()
    }
}

/// Metrics handler
async fn metrics_handler(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let body = state.metrics.encode();
    (
        StatusCode::OK,
        [("content-type", "text/plain; version=0.0.4; charset=utf-8")],
        body,
    )
}

/// Create the health server router
pub fn create_router(state: Arc<HealthState>) -> Router {
    Router::new()
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics_handler))
        .with_state(state)
}

/// Run the health server until `shutdown` is triggered
pub async fn run_health_server(
    state: Arc<HealthState>,
    addr: SocketAddr,
    shutdown: ShutdownSignal,
) -> Result<(), std::io::Error> {
    let app = create_router(state);

    info!(port = addr.port(), "Starting health server");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(async move { shutdown.wait().await })
        .await?;

    Ok(())
}
