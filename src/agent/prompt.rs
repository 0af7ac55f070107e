//! System prompt for the agent.

use crate::tools::ToolRegistry;

/// Build the system prompt listing the available tools.
///
/// An `override_prompt` replaces the built-in guidance but the workspace and
/// tool list are still appended so the model knows what it can call.
pub fn build_system_prompt(
    workspace_path: &str,
    tools: &ToolRegistry,
    override_prompt: Option<&str>,
) -> String {
    let tool_descriptions = tools
        .list_tools()
        .iter()
        .map(|t| format!("- **{}**: {}", t.name, t.description))
        .collect::<Vec<_>>()
        .join("\n");

    if let Some(custom) = override_prompt {
        return format!(
            "{custom}\n\nWorkspace directory: {workspace_path}\n\nAvailable tools:\n{tool_descriptions}"
        );
    }

    format!(
        r#"You are a helpful assistant that solves tasks by calling tools. You operate in the workspace directory: {workspace_path}

## Tools

{tool_descriptions}

## Guidelines

1. **Use tools instead of guessing.** Read files and run commands to check facts before answering.

2. **Think when it helps.** The `think` tool records your reasoning without side effects. Use it to plan multi-step work or to reflect on a surprising result.

3. **Read before edit.** Look at a file's contents before changing it, unless you are creating it.

4. **Recover from errors.** A tool result starting with `Error:` means the call failed. Read the message, adjust the arguments or pick another tool, and try again.

5. **Charts.** When the user asks for a visualization, call `chart` with the data rows and the chart type that fits best.

6. **Stay focused.** Only do what the task asks.

## Finishing

When the task is complete, reply with a plain answer and no tool calls. Summarize what you found or changed."#
    )
}
