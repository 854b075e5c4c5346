//! WalletPilot: a conversational assistant for a single onchain wallet.
//!
//! A language model interprets user intent and translates it into calls
//! against a fixed registry of wallet operations. Queries execute
//! immediately; every fund-moving operation is frozen as a pending
//! transaction until the user explicitly confirms it. The orchestration loop
//! lives in [`agent`], the capability surface in [`tools`] and [`wallet`],
//! and the I/O adapters (REPL, HTTP gateway) in [`channels`].

pub mod agent;
pub mod bootstrap;
pub mod channels;
pub mod config;
pub mod error;
pub mod llm;
pub mod settings;
pub mod tools;
pub mod wallet;
