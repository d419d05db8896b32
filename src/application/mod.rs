//! Application layer containing the transaction lifecycle orchestration.
//!
//! This module defines the `Orchestrator`, the primary entry point for
//! authorizing, re-authorizing and capturing transactions against the
//! configured backends.

pub mod orchestrator;
