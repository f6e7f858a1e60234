//! Pod placement decision.
//!
//! Checks run in order and the first one that applies decides:
//! 1. Undecodable Pod: deny
//! 2. Pod already has a node selector: allow unchanged
//! 3. Namespace lookup fails: deny (fail closed)
//! 4. Namespace has no target label: allow unchanged
//! 5. Otherwise: patch in `nodeSelector: {kubernetes.io/hostname: <target>}`

use json_patch::jsonptr::PointerBuf;
use json_patch::{AddOperation, Patch, PatchOperation};
use serde_json::{Map, Value};
use tracing::{error, info, warn};

use super::pod::Pod;
use super::resolver::NamespacePolicyResolver;
use super::review::{AdmissionOutcome, ReviewRequest};
use crate::error::Error;

/// Node label the injected selector matches on
pub const HOSTNAME_LABEL: &str = "kubernetes.io/hostname";

/// Applies the namespace placement policy to admission requests
#[derive(Clone)]
pub struct AdmissionDecisionEngine {
    resolver: NamespacePolicyResolver,
}

impl AdmissionDecisionEngine {
    pub fn new(resolver: NamespacePolicyResolver) -> Self {
        Self { resolver }
    }

    /// Decide the outcome for a single admission request
    pub async fn decide(&self, request: &ReviewRequest) -> AdmissionOutcome {
        let uid = request.uid.as_str();

        let pod = match request
            .object
            .as_ref()
            .ok_or(Error::MissingObject)
            .and_then(Pod::from_object)
        {
            Ok(pod) => pod,
            Err(e) => {
                error!(uid = %uid, namespace = ?request.namespace, error = %e, "Could not decode pod");
                return AdmissionOutcome::deny(e);
            }
        };

        let namespace = pod
            .namespace()
            .or(request.namespace.as_deref())
            .unwrap_or_default();
        let name = pod.display_name();

        if pod.has_node_selector() {
            info!(
                uid = %uid,
                namespace = %namespace,
                pod = %name,
                "Pod already has node selectors, skipping mutation"
            );
            return AdmissionOutcome::Allow;
        }

        let target_node = match self.resolver.resolve_target_node(namespace).await {
            Ok(Some(node)) => node,
            Ok(None) => {
                info!(
                    uid = %uid,
                    namespace = %namespace,
                    pod = %name,
                    "No target node specified for namespace, allowing pod without modification"
                );
                return AdmissionOutcome::Allow;
            }
            Err(e) => {
                warn!(
                    uid = %uid,
                    namespace = %namespace,
                    pod = %name,
                    error = %e,
                    "Failed to get target node, denying pod"
                );
                return AdmissionOutcome::deny(e);
            }
        };

        info!(
            uid = %uid,
            namespace = %namespace,
            pod = %name,
            target_node = %target_node,
            "Pinning pod to target node"
        );
        AdmissionOutcome::json_patch(node_selector_patch(&target_node))
    }
}

/// Single-operation patch adding `/spec/nodeSelector` for `target_node`.
///
/// Only valid for Pods without a node selector: `add` on an existing map
/// replaces it.
pub fn node_selector_patch(target_node: &str) -> Patch {
    let mut selector = Map::new();
    selector.insert(
        HOSTNAME_LABEL.to_string(),
        Value::String(target_node.to_string()),
    );

    Patch(vec![PatchOperation::Add(AddOperation {
        path: PointerBuf::from_tokens(["spec", "nodeSelector"]),
        value: Value::Object(selector),
    })])
}

#[cfg(test)]
#[allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]
mod tests {
    use super::*;
    use crate::webhooks::resolver::{NamespaceLookup, TARGET_NODE_LABEL};
    use async_trait::async_trait;
    use kube::core::ErrorResponse;
    use serde_json::json;
    use std::collections::BTreeMap;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Lookup that answers every namespace with the same labels, or fails
    struct FixedLookup {
        labels: Option<BTreeMap<String, String>>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl NamespaceLookup for FixedLookup {
        async fn namespace_labels(
            &self,
            _name: &str,
        ) -> std::result::Result<BTreeMap<String, String>, kube::Error> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.labels.clone().ok_or_else(|| {
                kube::Error::Api(ErrorResponse {
                    status: "Failure".to_string(),
                    message: "namespaces \"team-a\" not found".to_string(),
                    reason: "NotFound".to_string(),
                    code: 404,
                })
            })
        }
    }

    fn engine(labels: Option<&[(&str, &str)]>) -> (AdmissionDecisionEngine, Arc<FixedLookup>) {
        let lookup = Arc::new(FixedLookup {
            labels: labels.map(|l| {
                l.iter()
                    .map(|(k, v)| (k.to_string(), v.to_string()))
                    .collect()
            }),
            calls: AtomicUsize::new(0),
        });
        let resolver = NamespacePolicyResolver::new(lookup.clone());
        (AdmissionDecisionEngine::new(resolver), lookup)
    }

    fn request(object: Value) -> ReviewRequest {
        ReviewRequest {
            uid: "uid-1".to_string(),
            namespace: Some("team-a".to_string()),
            object: Some(object),
            ..Default::default()
        }
    }

    #[test]
    fn test_node_selector_patch_shape() {
        let patch = serde_json::to_value(node_selector_patch("node-7")).unwrap();
        assert_eq!(
            patch,
            json!([{"op": "add", "path": "/spec/nodeSelector", "value": {"kubernetes.io/hostname": "node-7"}}])
        );
    }

    #[tokio::test]
    async fn test_patch_when_label_present() {
        let (engine, _) = engine(Some(&[(TARGET_NODE_LABEL, "node-7")]));
        let outcome = engine
            .decide(&request(json!({"metadata": {"name": "web-1", "namespace": "team-a"}, "spec": {}})))
            .await;
        assert_eq!(outcome, AdmissionOutcome::json_patch(node_selector_patch("node-7")));
    }

    #[tokio::test]
    async fn test_existing_selector_skips_lookup() {
        let (engine, lookup) = engine(None);
        let outcome = engine
            .decide(&request(json!({"metadata": {"name": "web-1"}, "spec": {"nodeSelector": {"disk": "ssd"}}})))
            .await;
        assert_eq!(outcome, AdmissionOutcome::Allow);
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_no_label_allows() {
        let (engine, _) = engine(Some(&[]));
        let outcome = engine.decide(&request(json!({"metadata": {"name": "web-1"}}))).await;
        assert_eq!(outcome, AdmissionOutcome::Allow);
    }

    #[tokio::test]
    async fn test_lookup_failure_fails_closed() {
        let (engine, _) = engine(None);
        let outcome = engine.decide(&request(json!({"metadata": {"name": "web-1"}}))).await;
        match outcome {
            AdmissionOutcome::Deny { message } => {
                assert!(message.contains("failed to get namespace team-a"))
            }
            other => panic!("expected deny, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_undecodable_pod_denied() {
        let (engine, lookup) = engine(Some(&[(TARGET_NODE_LABEL, "node-7")]));
        let outcome = engine
            .decide(&request(json!({"spec": {"nodeSelector": ["disk"]}})))
            .await;
        assert!(matches!(outcome, AdmissionOutcome::Deny { .. }));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_missing_object_denied() {
        let (engine, _) = engine(Some(&[(TARGET_NODE_LABEL, "node-7")]));
        let outcome = engine
            .decide(&ReviewRequest {
                uid: "uid-1".to_string(),
                ..Default::default()
            })
            .await;
        assert_eq!(outcome, AdmissionOutcome::deny(Error::MissingObject));
    }

    #[tokio::test]
    async fn test_request_namespace_used_when_object_has_none() {
        let (engine, lookup) = engine(Some(&[(TARGET_NODE_LABEL, "node-3")]));
        let outcome = engine.decide(&request(json!({"metadata": {"generateName": "web-"}}))).await;
        assert_eq!(outcome, AdmissionOutcome::json_patch(node_selector_patch("node-3")));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_no_namespace_anywhere_denied() {
        let (engine, lookup) = engine(Some(&[(TARGET_NODE_LABEL, "node-3")]));
        let outcome = engine
            .decide(&ReviewRequest {
                uid: "uid-1".to_string(),
                object: Some(json!({"metadata": {"name": "orphan"}})),
                ..Default::default()
            })
            .await;
        assert!(matches!(outcome, AdmissionOutcome::Deny { .. }));
        assert_eq!(lookup.calls.load(Ordering::SeqCst), 0);
    }
}
