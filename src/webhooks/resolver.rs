//! Namespace placement policy.
//!
//! A namespace opts into node pinning through the `node.restriction/target`
//! label. The label is read from the live Namespace on every call; labels
//! written between two Pod creations apply to the second one.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use k8s_openapi::api::core::v1::Namespace;
use kube::{Api, Client};
use tracing::{debug, info};

use crate::error::{Error, Result};

/// Namespace label naming the node Pods in that namespace are pinned to
pub const TARGET_NODE_LABEL: &str = "node.restriction/target";

/// Read-only "get namespace by name" capability
#[async_trait]
pub trait NamespaceLookup: Send + Sync {
    /// Labels of the named namespace
    async fn namespace_labels(
        &self,
        name: &str,
    ) -> std::result::Result<BTreeMap<String, String>, kube::Error>;
}

/// `NamespaceLookup` backed by the cluster API
#[derive(Clone)]
pub struct KubeNamespaceLookup {
    api: Api<Namespace>,
}

impl KubeNamespaceLookup {
    pub fn new(client: Client) -> Self {
        Self {
            api: Api::all(client),
        }
    }
}

#[async_trait]
impl NamespaceLookup for KubeNamespaceLookup {
    async fn namespace_labels(
        &self,
        name: &str,
    ) -> std::result::Result<BTreeMap<String, String>, kube::Error> {
        let namespace = self.api.get(name).await?;
        Ok(namespace.metadata.labels.unwrap_or_default())
    }
}

/// Resolves the target node configured for a namespace
#[derive(Clone)]
pub struct NamespacePolicyResolver {
    lookup: Arc<dyn NamespaceLookup>,
}

impl NamespacePolicyResolver {
    pub fn new(lookup: Arc<dyn NamespaceLookup>) -> Self {
        Self { lookup }
    }

    /// Target node for `namespace`, or `None` when the namespace has no
    /// (or an empty) target label.
    ///
    /// The node name is returned verbatim; whether such a node exists is
    /// left to the scheduler.
    pub async fn resolve_target_node(&self, namespace: &str) -> Result<Option<String>> {
        if namespace.is_empty() {
            return Err(Error::MissingField("namespace".to_string()));
        }

        let labels = self
            .lookup
            .namespace_labels(namespace)
            .await
            .map_err(|source| Error::NamespaceLookup {
                namespace: namespace.to_string(),
                source,
            })?;

        match labels.get(TARGET_NODE_LABEL).filter(|node| !node.is_empty()) {
            Some(node) => {
                debug!(namespace = %namespace, target_node = %node, "Resolved target node");
                Ok(Some(node.clone()))
            }
            None => {
                info!(
                    namespace = %namespace,
                    label = TARGET_NODE_LABEL,
                    "Namespace does not have target node label, skipping pod mutation"
                );
                Ok(None)
            }
        }
    }
}
