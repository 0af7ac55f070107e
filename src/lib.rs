//! # Quickstart Agent
//!
//! A bounded tool-calling agent.
//!
//! This library provides:
//! - A tool registry where native and MCP-backed tools share one interface
//! - A dispatcher that turns every tool call into exactly one result
//! - An agent loop capped at a configurable number of model calls
//! - Anthropic and OpenRouter model clients
//! - An HTTP API for chat sessions and one-shot tasks
//!
//! ## Architecture
//!
//! The agent follows the "tools in a loop" pattern:
//! 1. Append the user message to the conversation
//! 2. Call the model with the conversation and tool schemas
//! 3. Dispatch each requested tool call, appending one result per call
//! 4. Repeat until the model answers without tool calls or the cap is hit
//!
//! ## Example
//!
//! ```rust,ignore
//! use quickstart_agent::{agent::Agent, config::Config};
//!
//! let config = Config::from_env()?;
//! let agent = Agent::new(config)?;
//! let outcome = agent.run_task("How many Rust files are in this repo?").await?;
//! println!("{}", outcome.response);
//! ```

pub mod agent;
pub mod api;
pub mod config;
pub mod conversation;
pub mod llm;
pub mod mcp;
pub mod tools;

pub use config::Config;
