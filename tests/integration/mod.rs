//! Integration test suite for kots-render
//!
//! ```bash
//! cargo test --test integration
//! ```
//!
//! # Test Organization
//!
//! - **resolution**: dependency-ordered resolution of documents loaded from disk
//! - **graph_properties**: property tests for the head-node resolution protocol
//! - **rendering**: two-pass rendering and provider round trips
//! - **cli**: the `kots-render` binary end to end

mod cli;
mod graph_properties;
mod rendering;
mod resolution;
