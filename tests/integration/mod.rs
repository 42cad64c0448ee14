//! Integration test suite for calcflow.
//!
//! These tests drive the orchestrator through its public surfaces: the store
//! and worker protocol directly, the HTTP router in-process, and a real
//! listener with the compute agent attached.
//!
//! # Test Categories
//!
//! - `end_to_end`: Submission through final result
//! - `lease_expiry`: Lost workers, requeueing and stale reports
//! - `api`: HTTP contract via `tower::ServiceExt::oneshot`
//! - `agent_http`: Agent workers against a live server
//!
//! # CI Compatibility
//!
//! Operation times are zero and servers bind to ephemeral localhost ports,
//! so the suite needs no external services.

mod fixtures;

mod lease_expiry;
mod api;
mod agent_http;
