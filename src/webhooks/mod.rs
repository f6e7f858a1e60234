//! Mutating admission webhook for Pods.
//!
//! - `review`: AdmissionReview wire codec
//! - `pod`: the Pod fields the policy reads
//! - `resolver`: namespace label lookup
//! - `mutation`: the allow / patch / deny decision
//! - `server`: HTTPS endpoint and server lifecycle

pub mod mutation;
pub mod pod;
pub mod resolver;
pub mod review;
mod server;

pub use mutation::{AdmissionDecisionEngine, HOSTNAME_LABEL, node_selector_patch};
pub use pod::Pod;
pub use resolver::{
    KubeNamespaceLookup, NamespaceLookup, NamespacePolicyResolver, TARGET_NODE_LABEL,
};
pub use review::{
    ADMISSION_API_VERSION, ADMISSION_KIND, AdmissionOutcome, PatchType, ReviewRequest,
    ReviewResponse, decode_response, decode_review, encode_review,
};
pub use server::{
    JSON_CONTENT_TYPE, MUTATE_PATH, WebhookState, create_webhook_router, load_tls_config,
    run_webhook_server, serve_with_tls,
};
