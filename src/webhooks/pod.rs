//! Minimal Pod data contract.
//!
//! Only the fields the placement policy reads are modelled. Everything else
//! in the admitted object is ignored, so the full upstream Pod schema never
//! has to round-trip through this crate.

use std::collections::BTreeMap;

use serde::{Deserialize, Deserializer, Serialize};

use crate::error::{Error, Result};

/// The subset of a Pod that placement decisions depend on
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pod {
    #[serde(default, deserialize_with = "null_as_default")]
    pub metadata: PodMetadata,
    #[serde(default, deserialize_with = "null_as_default")]
    pub spec: PodSpec,
}

/// An explicit `null` decodes the same as an absent field.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Set instead of `name` for Pods created by controllers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub generate_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PodSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_selector: Option<BTreeMap<String, String>>,
}

impl Pod {
    /// Decode the raw object carried by an admission request
    pub fn from_object(object: &serde_json::Value) -> Result<Self> {
        Pod::deserialize(object).map_err(Error::ObjectDecode)
    }

    /// Whether the Pod already carries any node-selector constraint
    pub fn has_node_selector(&self) -> bool {
        self.spec
            .node_selector
            .as_ref()
            .is_some_and(|selector| !selector.is_empty())
    }

    /// Name for logging: `name`, else `generateName`, else empty
    pub fn display_name(&self) -> &str {
        self.metadata
            .name
            .as_deref()
            .or(self.metadata.generate_name.as_deref())
            .unwrap_or_default()
    }

    /// Namespace from the object, if set and non-empty
    pub fn namespace(&self) -> Option<&str> {
        self.metadata.namespace.as_deref().filter(|ns| !ns.is_empty())
    }
}
