//! node-restriction-webhook - pins Pods to the node named by their namespace.
//!
//! This is the main entry point that:
//! - Initializes structured logging
//! - Loads the webhook TLS key pair
//! - Creates the Kubernetes client
//! - Starts the health server and the HTTPS webhook server
//! - Drains both on SIGTERM or SIGINT

use std::sync::Arc;

use kube::Client;
use tracing::{error, info};

use node_restriction_webhook::health::{HealthState, run_health_server};
use node_restriction_webhook::{
    AdmissionDecisionEngine, KubeNamespaceLookup, NamespacePolicyResolver, ShutdownSignal,
    WebhookConfig, WebhookState, load_tls_config, run_webhook_server,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing subscriber
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("node_restriction_webhook=info".parse()?)
                .add_directive("kube=info".parse()?),
        )
        .json()
        .init();

    info!("Starting node-restriction-webhook");

    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        return Err(format!("failed to install rustls crypto provider: {:?}", e).into());
    }

    let config = WebhookConfig::from_env();
    info!(
        cert_path = %config.cert_path.display(),
        key_path = %config.key_path.display(),
        port = config.port,
        "Loading webhook key pair"
    );
    let tls = load_tls_config(&config).await?;

    let client = Client::try_default().await?;
    info!("Connected to Kubernetes cluster");

    let health_state = Arc::new(HealthState::new());
    let shutdown = ShutdownSignal::new();

    let resolver = NamespacePolicyResolver::new(Arc::new(KubeNamespaceLookup::new(client)));
    let state = Arc::new(WebhookState::new(
        AdmissionDecisionEngine::new(resolver),
        health_state.clone(),
    ));

    // Probes should answer while starting and draining, so start this first
    let health_handle = {
        let health_state = health_state.clone();
        let shutdown = shutdown.clone();
        let addr = config.health_addr();
        tokio::spawn(async move {
            if let Err(e) = run_health_server(health_state, addr, shutdown).await {
                error!("Health server error: {}", e);
            }
        })
    };

    let _signal_handle = shutdown.trigger_on_os_signal();

    let result = run_webhook_server(&config, tls, state, shutdown.clone()).await;

    // Stop the health server too if the webhook exited on its own
    shutdown.trigger();
    if let Err(e) = health_handle.await {
        error!("Health server task panicked: {}", e);
    }

    result?;
    info!("Webhook stopped");
    Ok(())
}
