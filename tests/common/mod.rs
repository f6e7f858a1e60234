//! Shared test fixtures (used by unit, functional, and proptest targets).

#![allow(dead_code)]
