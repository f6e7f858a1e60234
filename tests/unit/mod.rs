// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for node-restriction-webhook.
//!
//! These tests run without a Kubernetes cluster and exercise the public API
//! of each pipeline stage in isolation.

#[path = "../common/mod.rs"]
mod common;

mod codec_tests {
    use crate::common::fixtures::{PodBuilder, review_body};
    use node_restriction_webhook::webhooks::{
        ADMISSION_API_VERSION, ADMISSION_KIND, AdmissionOutcome, PatchType, decode_response,
        decode_review, encode_review, node_selector_patch,
    };
    use serde_json::{Value, json};

    #[test]
    fn test_decode_keeps_object_opaque() {
        let pod = PodBuilder::new("web-1").namespace("team-a").build();
        let request = decode_review(&review_body("uid-1", "team-a", pod.clone())).unwrap();
        assert_eq!(request.uid, "uid-1");
        assert_eq!(request.operation.as_deref(), Some("CREATE"));
        assert_eq!(request.object, Some(pod));
    }

    #[test]
    fn test_decode_rejects_non_json() {
        let err = decode_review(b"<AdmissionReview/>").unwrap_err();
        assert!(err.is_protocol());
    }

    #[test]
    fn test_encoded_envelope_type_meta_is_fixed() {
        for outcome in [
            AdmissionOutcome::Allow,
            AdmissionOutcome::deny("nope"),
            AdmissionOutcome::json_patch(node_selector_patch("node-1")),
        ] {
            let value: Value =
                serde_json::from_slice(&encode_review(Some("u"), &outcome).unwrap()).unwrap();
            assert_eq!(value["apiVersion"], ADMISSION_API_VERSION);
            assert_eq!(value["kind"], ADMISSION_KIND);
            assert_eq!(value["response"]["uid"], "u");
        }
    }

    #[test]
    fn test_exactly_one_response_shape() {
        let allow = decode_response(&encode_review(Some("u"), &AdmissionOutcome::Allow).unwrap())
            .unwrap();
        assert!(allow.allowed);
        assert!(allow.patch.is_none() && allow.patch_type.is_none() && allow.status.is_none());

        let deny =
            decode_response(&encode_review(Some("u"), &AdmissionOutcome::deny("no")).unwrap())
                .unwrap();
        assert!(!deny.allowed);
        assert_eq!(deny.message(), Some("no"));
        assert!(deny.patch.is_none() && deny.patch_type.is_none());

        let patched = decode_response(
            &encode_review(
                Some("u"),
                &AdmissionOutcome::json_patch(node_selector_patch("node-1")),
            )
            .unwrap(),
        )
        .unwrap();
        assert!(patched.allowed);
        assert_eq!(patched.patch_type, Some(PatchType::JsonPatch));
        assert!(patched.status.is_none());
    }

    #[test]
    fn test_patch_bytes_are_exact() {
        let response = decode_response(
            &encode_review(
                Some("u"),
                &AdmissionOutcome::json_patch(node_selector_patch("node-7")),
            )
            .unwrap(),
        )
        .unwrap();
        let patch: Value = serde_json::from_slice(response.patch.as_deref().unwrap()).unwrap();
        assert_eq!(
            patch,
            json!([{"op":"add","path":"/spec/nodeSelector","value":{"kubernetes.io/hostname":"node-7"}}])
        );
    }
}

mod outcome_tests {
    use node_restriction_webhook::Error;
    use node_restriction_webhook::webhooks::AdmissionOutcome;

    #[test]
    fn test_outcome_labels() {
        assert_eq!(AdmissionOutcome::Allow.label(), "allowed");
        assert_eq!(AdmissionOutcome::deny("x").label(), "denied");
    }

    #[test]
    fn test_deny_carries_error_text() {
        let outcome = AdmissionOutcome::deny(Error::MissingObject);
        assert_eq!(
            outcome,
            AdmissionOutcome::Deny {
                message: "admission request has no object".to_string()
            }
        );
    }
}

mod config_tests {
    use node_restriction_webhook::WebhookConfig;
    use node_restriction_webhook::config::{SHUTDOWN_GRACE_ENV, WEBHOOK_PORT};
    use std::time::Duration;

    #[test]
    fn test_port_is_fixed() {
        let config = WebhookConfig::from_lookup(|key| match key {
            SHUTDOWN_GRACE_ENV => Some("3".to_string()),
            _ => None,
        });
        assert_eq!(config.port, WEBHOOK_PORT);
        assert_eq!(config.port, 8443);
        assert_eq!(config.shutdown_grace_period, Duration::from_secs(3));
    }
}

mod shutdown_tests {
    use node_restriction_webhook::ShutdownSignal;

    #[tokio::test]
    async fn test_clones_share_state() {
        let signal = ShutdownSignal::new();
        let clone = signal.clone();
        clone.trigger();
        assert!(signal.is_triggered());
        signal.wait().await;
    }
}
