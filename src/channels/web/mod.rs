//! HTTP gateway over the agent.

pub mod server;
pub mod types;
