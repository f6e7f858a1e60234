// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the admission pipeline.
//!
//! These tests drive the real axum router and TLS server in-process with an
//! in-memory namespace store. No Kubernetes cluster is required.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_team_a_pod_is_pinned
//! ```
//!
//! ## Test Categories
//!
//! - **Scenario tests**: end-to-end admission reviews over the router
//! - **Lifecycle tests**: TLS startup and signal-driven draining

#[path = "../common/mod.rs"]
mod common;
