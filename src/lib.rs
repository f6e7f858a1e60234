//! node-restriction-webhook library crate
//!
//! A mutating admission webhook that pins Pods to the node named by their
//! namespace's `node.restriction/target` label, unless the Pod already
//! carries a node selector.

pub mod config;
pub mod error;
pub mod health;
pub mod shutdown;
pub mod webhooks;

pub use config::WebhookConfig;
pub use error::{Error, Result};
pub use health::{HealthState, ServerPhase, run_health_server};
pub use shutdown::ShutdownSignal;
pub use webhooks::{
    AdmissionDecisionEngine, KubeNamespaceLookup, NamespaceLookup, NamespacePolicyResolver,
    WebhookState, create_webhook_router, load_tls_config, run_webhook_server,
};
