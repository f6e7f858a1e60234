//! AdmissionReview wire format.
//!
//! Only the envelope fields the webhook reads or writes are modelled. The
//! admitted object stays an opaque JSON value until the decision engine
//! decodes it, so a malformed Pod is reported with its request UID intact
//! while a malformed envelope is not.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// API version of every review this webhook accepts and emits
pub const ADMISSION_API_VERSION: &str = "admission.k8s.io/v1";
/// Kind of every review this webhook accepts and emits
pub const ADMISSION_KIND: &str = "AdmissionReview";

/// Patch encoding announced in `response.patchType`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PatchType {
    #[serde(rename = "JSONPatch")]
    JsonPatch,
}

/// Result of an admission decision
#[derive(Clone, Debug, PartialEq)]
pub enum AdmissionOutcome {
    /// Admit the object unchanged
    Allow,
    /// Admit the object with the given patch applied
    Patch {
        patch_type: PatchType,
        operations: json_patch::Patch,
    },
    /// Reject the object
    Deny { message: String },
}

impl AdmissionOutcome {
    /// Deny with the display text of `error`
    pub fn deny(error: impl std::fmt::Display) -> Self {
        AdmissionOutcome::Deny {
            message: error.to_string(),
        }
    }

    /// JSON Patch outcome
    pub fn json_patch(operations: json_patch::Patch) -> Self {
        AdmissionOutcome::Patch {
            patch_type: PatchType::JsonPatch,
            operations,
        }
    }

    /// Short label for logs and metrics
    pub fn label(&self) -> &'static str {
        match self {
            AdmissionOutcome::Allow => "allowed",
            AdmissionOutcome::Patch { .. } => "patched",
            AdmissionOutcome::Deny { .. } => "denied",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Deserialize)]
pub struct GroupVersionKind {
    #[serde(default)]
    pub group: String,
    #[serde(default)]
    pub version: String,
    #[serde(default)]
    pub kind: String,
}

/// The `request` half of an inbound AdmissionReview
#[derive(Clone, Debug, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub uid: String,
    #[serde(default)]
    pub kind: Option<GroupVersionKind>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub namespace: Option<String>,
    #[serde(default)]
    pub operation: Option<String>,
    /// Raw object under review
    #[serde(default)]
    pub object: Option<serde_json::Value>,
    #[serde(default)]
    pub dry_run: Option<bool>,
}

impl ReviewRequest {
    /// Kind of the object under review, empty when the request omits it
    pub fn resource_kind(&self) -> &str {
        self.kind.as_ref().map(|k| k.kind.as_str()).unwrap_or_default()
    }

    /// Whether the API server will discard the result of this admission
    pub fn is_dry_run(&self) -> bool {
        self.dry_run.unwrap_or(false)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AdmissionReviewRequest {
    #[serde(default)]
    api_version: Option<String>,
    #[serde(default)]
    kind: Option<String>,
    #[serde(default)]
    request: Option<ReviewRequest>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResponseStatus {
    #[serde(default)]
    pub message: String,
}

/// The `response` half of an outbound AdmissionReview
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    pub allowed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<ResponseStatus>,
    /// Serialized JSON Patch; base64 on the wire
    #[serde(default, skip_serializing_if = "Option::is_none", with = "patch_bytes")]
    pub patch: Option<Vec<u8>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub patch_type: Option<PatchType>,
}

impl ReviewResponse {
    /// Build the wire response for `outcome`, correlated to `uid` when known
    pub fn from_outcome(uid: Option<&str>, outcome: &AdmissionOutcome) -> Result<Self> {
        let uid = uid.map(str::to_string);
        let response = match outcome {
            AdmissionOutcome::Allow => ReviewResponse {
                uid,
                allowed: true,
                ..Default::default()
            },
            AdmissionOutcome::Patch {
                patch_type,
                operations,
            } => ReviewResponse {
                uid,
                allowed: true,
                patch: Some(serde_json::to_vec(operations)?),
                patch_type: Some(*patch_type),
                ..Default::default()
            },
            AdmissionOutcome::Deny { message } => ReviewResponse {
                uid,
                allowed: false,
                status: Some(ResponseStatus {
                    message: message.clone(),
                }),
                ..Default::default()
            },
        };
        Ok(response)
    }

    /// Parse the patch bytes back into operations
    pub fn patch_operations(&self) -> Result<Option<json_patch::Patch>> {
        self.patch
            .as_deref()
            .map(serde_json::from_slice)
            .transpose()
            .map_err(Error::from)
    }

    /// Denial message, if any
    pub fn message(&self) -> Option<&str> {
        self.status.as_ref().map(|s| s.message.as_str())
    }
}

/// Outbound AdmissionReview envelope
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmissionReviewResponse {
    pub api_version: String,
    pub kind: String,
    pub response: ReviewResponse,
}

impl AdmissionReviewResponse {
    pub fn new(response: ReviewResponse) -> Self {
        AdmissionReviewResponse {
            api_version: ADMISSION_API_VERSION.to_string(),
            kind: ADMISSION_KIND.to_string(),
            response,
        }
    }
}

fn check_type_meta(api_version: Option<&str>, kind: Option<&str>) -> Result<()> {
    if api_version != Some(ADMISSION_API_VERSION) {
        return Err(Error::InvalidReview(format!(
            "unsupported apiVersion {:?}, expected {}",
            api_version.unwrap_or_default(),
            ADMISSION_API_VERSION
        )));
    }
    if kind != Some(ADMISSION_KIND) {
        return Err(Error::InvalidReview(format!(
            "unsupported kind {:?}, expected {}",
            kind.unwrap_or_default(),
            ADMISSION_KIND
        )));
    }
    Ok(())
}

/// Decode an inbound AdmissionReview body into its request.
///
/// Fails with [`Error::InvalidReview`] for anything that is not a
/// `admission.k8s.io/v1` AdmissionReview carrying a request with a UID.
pub fn decode_review(body: &[u8]) -> Result<ReviewRequest> {
    let review: AdmissionReviewRequest =
        serde_json::from_slice(body).map_err(|e| Error::InvalidReview(e.to_string()))?;
    check_type_meta(review.api_version.as_deref(), review.kind.as_deref())?;

    let request = review
        .request
        .ok_or_else(|| Error::InvalidReview("missing request".to_string()))?;
    if request.uid.is_empty() {
        return Err(Error::InvalidReview("request.uid is empty".to_string()));
    }
    Ok(request)
}

/// Encode `outcome` into a complete outbound AdmissionReview body
pub fn encode_review(uid: Option<&str>, outcome: &AdmissionOutcome) -> Result<Vec<u8>> {
    let response = ReviewResponse::from_outcome(uid, outcome)?;
    Ok(serde_json::to_vec(&AdmissionReviewResponse::new(response))?)
}

/// Decode an outbound AdmissionReview body back into its response
pub fn decode_response(body: &[u8]) -> Result<ReviewResponse> {
    let review: AdmissionReviewResponse =
        serde_json::from_slice(body).map_err(|e| Error::InvalidReview(e.to_string()))?;
    check_type_meta(Some(review.api_version.as_str()), Some(review.kind.as_str()))?;
    Ok(review.response)
}

mod patch_bytes {
    use super::{Engine, STANDARD};
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(patch: &Option<Vec<u8>>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match patch {
            Some(bytes) => serializer.serialize_str(&STANDARD.encode(bytes)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|encoded| STANDARD.decode(encoded).map_err(serde::de::Error::custom))
            .transpose()
    }
}
