//! Scratchpad tool: lets the model record a thought without side effects.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, Tool, ToolOutput};

/// Echo the model's thought back to it.
pub struct Think;

#[async_trait]
impl Tool for Think {
    fn name(&self) -> &str {
        "think"
    }

    fn description(&self) -> &str {
        "Think through a problem step by step. The thought is echoed back unchanged and has no side effects. Use it to plan before acting or to reflect on tool output."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "thought": {
                    "type": "string",
                    "description": "Your reasoning"
                }
            },
            "required": ["thought"]
        })
    }

    async fn execute(&self, args: Value, _workspace: &Path) -> anyhow::Result<ToolOutput> {
        let thought = required_str(&args, "thought")?;
        Ok(ToolOutput::Json(json!({ "thought": thought })))
    }
}
