//! I/O adapters over the agent: an interactive REPL and an HTTP gateway.
//!
//! Adapters stay thin; they forward user text into the orchestrator
//! and render its structured replies. All correctness logic lives in
//! [`crate::agent`].

pub mod repl;
pub mod web;
