//! strava-mcp-setup is a guided installer that wires the Strava MCP
//! server into Claude Desktop.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`core`] owns the setup steps: tool probing, repository fetch,
//!   Python environment provisioning, the OAuth authorization flow with
//!   its one-shot local callback listener, token persistence, and the
//!   Claude Desktop config merge.
//! - [`cli`] parses arguments and drives [`core::orchestrator`], which
//!   runs the steps top to bottom with early exit on the first fatal
//!   failure.
//! - [`utils`] holds the prompt helpers the interactive steps share.
//!
//! The binary crate (`src/main.rs`) routes through [`crate::cli::main`].

pub mod cli;
pub mod core;
pub mod utils;
