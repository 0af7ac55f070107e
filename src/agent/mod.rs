//! Agent module - the tool-calling loop.
//!
//! The agent follows a "tools in a loop" pattern:
//! 1. Build context with system prompt and user message
//! 2. Call the model with the registered tool schemas
//! 3. Dispatch every requested tool call and append one result per call
//! 4. Repeat until the model answers without tool calls or the cap is hit

mod agent_loop;
mod events;
mod prompt;

pub use agent_loop::{Agent, AgentError, RunOptions, TaskOutcome};
pub use events::AgentEvent;
pub use prompt::build_system_prompt;
