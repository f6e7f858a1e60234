// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Property-based tests for node-restriction-webhook.
//!
//! Uses proptest to generate random inputs and verify invariants of the
//! decision engine and the protocol codec.

#[path = "../common/mod.rs"]
mod common;

use std::collections::BTreeMap;
use std::sync::Arc;

use proptest::prelude::*;

use common::fixtures::{MockNamespaces, PodBuilder, engine, review_body};
use node_restriction_webhook::webhooks::{
    AdmissionOutcome, decode_response, decode_review, encode_review, node_selector_patch,
};

/// Strategy for DNS-1123 style names (namespaces, pods, nodes).
fn dns_name() -> impl Strategy<Value = String> {
    "[a-z][a-z0-9-]{0,20}[a-z0-9]"
}

/// Strategy for non-empty node-selector maps.
fn non_empty_selector() -> impl Strategy<Value = BTreeMap<String, String>> {
    prop::collection::btree_map("[a-z]{1,8}(/[a-z]{1,8})?", "[a-z0-9]{0,8}", 1..4)
}

/// Namespace label state: no namespace, no label, or a target.
#[derive(Clone, Debug)]
enum NamespaceState {
    Missing,
    Unlabelled,
    Target(String),
}

fn namespace_state() -> impl Strategy<Value = NamespaceState> {
    prop_oneof![
        Just(NamespaceState::Missing),
        Just(NamespaceState::Unlabelled),
        dns_name().prop_map(NamespaceState::Target),
    ]
}

fn namespaces_for(namespace: &str, state: &NamespaceState) -> Arc<MockNamespaces> {
    let namespaces = match state {
        NamespaceState::Missing => MockNamespaces::new(),
        NamespaceState::Unlabelled => {
            MockNamespaces::new().with_labels(namespace, &[("team", "platform")])
        }
        NamespaceState::Target(node) => MockNamespaces::new().with_target(namespace, node),
    };
    Arc::new(namespaces)
}

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    /// A Pod with a non-empty node selector is always allowed unchanged,
    /// whatever the namespace looks like.
    #[test]
    fn prop_existing_selector_always_allowed(
        namespace in dns_name(),
        pod in dns_name(),
        selector in non_empty_selector(),
        state in namespace_state(),
    ) {
        let namespaces = namespaces_for(&namespace, &state);
        let body = review_body("uid", &namespace, PodBuilder::new(pod).namespace(namespace.clone()).node_selectors(selector).build());
        let request = decode_review(&body).unwrap();

        let outcome = runtime().block_on(engine(namespaces.clone()).decide(&request));
        prop_assert_eq!(outcome, AdmissionOutcome::Allow);
        prop_assert_eq!(namespaces.calls(), 0);
    }

    /// A namespace without the target label never produces a patch.
    #[test]
    fn prop_unlabelled_namespace_allowed(namespace in dns_name(), pod in dns_name()) {
        let namespaces = namespaces_for(&namespace, &NamespaceState::Unlabelled);
        let body = review_body("uid", &namespace, PodBuilder::new(pod).namespace(namespace.clone()).build());
        let request = decode_review(&body).unwrap();

        let outcome = runtime().block_on(engine(namespaces).decide(&request));
        prop_assert_eq!(outcome, AdmissionOutcome::Allow);
    }

    /// A labelled namespace and a selector-free Pod always yield exactly the
    /// single `add /spec/nodeSelector` operation.
    #[test]
    fn prop_labelled_namespace_patched(namespace in dns_name(), pod in dns_name(), node in dns_name()) {
        let namespaces = namespaces_for(&namespace, &NamespaceState::Target(node.clone()));
        let body = review_body("uid", &namespace, PodBuilder::new(pod).namespace(namespace.clone()).build());
        let request = decode_review(&body).unwrap();

        let outcome = runtime().block_on(engine(namespaces).decide(&request));
        prop_assert_eq!(outcome, AdmissionOutcome::json_patch(node_selector_patch(&node)));
    }

    /// The response UID equals the request UID for every decodable request.
    #[test]
    fn prop_uid_echoed(
        uid in "[a-f0-9]{8}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{4}-[a-f0-9]{12}",
        namespace in dns_name(),
        state in namespace_state(),
    ) {
        let namespaces = namespaces_for(&namespace, &state);
        let body = review_body(&uid, &namespace, PodBuilder::new("web").namespace(namespace.clone()).build());
        let request = decode_review(&body).unwrap();

        let outcome = runtime().block_on(engine(namespaces).decide(&request));
        let response = decode_response(&encode_review(Some(&request.uid), &outcome).unwrap()).unwrap();
        prop_assert_eq!(response.uid.as_deref(), Some(uid.as_str()));
    }

    /// Encoding then decoding a response preserves UID, allowed flag and patch bytes.
    #[test]
    fn prop_response_round_trip(
        uid in proptest::option::of("[a-z0-9-]{1,36}"),
        node in dns_name(),
        message in ".{0,64}",
        shape in 0u8..3,
    ) {
        let outcome = match shape {
            0 => AdmissionOutcome::Allow,
            1 => AdmissionOutcome::deny(message),
            _ => AdmissionOutcome::json_patch(node_selector_patch(&node)),
        };
        let expected = node_restriction_webhook::webhooks::ReviewResponse::from_outcome(uid.as_deref(), &outcome).unwrap();
        let decoded = decode_response(&encode_review(uid.as_deref(), &outcome).unwrap()).unwrap();
        prop_assert_eq!(decoded, expected);
    }
}
