//! Workspace file tools: read, write, edit and list.

use std::path::Path;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{required_str, resolve_in_workspace, truncate_output, Tool, ToolOutput};

const MAX_READ: usize = 100_000;
const MAX_ENTRIES: usize = 500;

/// Read a text file.
pub struct ReadFile;

#[async_trait]
impl Tool for ReadFile {
    fn name(&self) -> &str {
        "read_file"
    }

    fn description(&self) -> &str {
        "Read a text file from the workspace. Optionally restrict to a 1-based line range. Lines are prefixed with their line number."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace"
                },
                "start_line": {
                    "type": "integer",
                    "description": "First line to return (default: 1)"
                },
                "end_line": {
                    "type": "integer",
                    "description": "Last line to return, inclusive (default: end of file)"
                }
            },
            "required": ["path"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<ToolOutput> {
        let path = required_str(&args, "path")?;
        let full = resolve_in_workspace(workspace, path)?;
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;

        let start = args["start_line"].as_u64().unwrap_or(1).max(1) as usize;
        let end = args["end_line"].as_u64().map(|n| n as usize);

        let numbered = content
            .lines()
            .enumerate()
            .map(|(i, line)| (i + 1, line))
            .filter(|(n, _)| *n >= start && end.map_or(true, |e| *n <= e))
            .map(|(n, line)| format!("{:>6}\t{}", n, line))
            .collect::<Vec<_>>()
            .join("\n");

        if numbered.is_empty() && !content.is_empty() {
            anyhow::bail!("line range is past the end of {}", path);
        }

        Ok(ToolOutput::Text(truncate_output(numbered, MAX_READ)))
    }
}

/// Create or overwrite a file.
pub struct WriteFile;

#[async_trait]
impl Tool for WriteFile {
    fn name(&self) -> &str {
        "write_file"
    }

    fn description(&self) -> &str {
        "Write content to a file in the workspace, creating parent directories as needed. Overwrites existing files."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace"
                },
                "content": {
                    "type": "string",
                    "description": "Full file content"
                }
            },
            "required": ["path", "content"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<ToolOutput> {
        let path = required_str(&args, "path")?;
        let content = required_str(&args, "content")?;
        let full = resolve_in_workspace(workspace, path)?;

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&full, content)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to write {}: {}", path, e))?;

        Ok(ToolOutput::Text(format!(
            "Wrote {} bytes to {}",
            content.len(),
            path
        )))
    }
}

/// Replace one exact occurrence of a string in a file.
pub struct EditFile;

#[async_trait]
impl Tool for EditFile {
    fn name(&self) -> &str {
        "edit_file"
    }

    fn description(&self) -> &str {
        "Replace an exact string in a file. `old_str` must appear exactly once; include enough surrounding context to make it unique."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "File path, relative to the workspace"
                },
                "old_str": {
                    "type": "string",
                    "description": "Text to replace"
                },
                "new_str": {
                    "type": "string",
                    "description": "Replacement text"
                }
            },
            "required": ["path", "old_str", "new_str"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<ToolOutput> {
        let path = required_str(&args, "path")?;
        let old_str = required_str(&args, "old_str")?;
        let new_str = required_str(&args, "new_str")?;
        if old_str.is_empty() {
            anyhow::bail!("'old_str' must not be empty");
        }

        let full = resolve_in_workspace(workspace, path)?;
        let content = tokio::fs::read_to_string(&full)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to read {}: {}", path, e))?;

        match content.matches(old_str).count() {
            0 => anyhow::bail!("'old_str' not found in {}", path),
            1 => {}
            n => anyhow::bail!("'old_str' appears {} times in {}; make it unique", n, path),
        }

        let updated = content.replacen(old_str, new_str, 1);
        tokio::fs::write(&full, &updated).await?;

        Ok(ToolOutput::Text(format!("Edited {}", path)))
    }
}

/// List a directory.
pub struct ListDir;

#[async_trait]
impl Tool for ListDir {
    fn name(&self) -> &str {
        "list_dir"
    }

    fn description(&self) -> &str {
        "List the entries of a workspace directory. Directories end with '/'."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "path": {
                    "type": "string",
                    "description": "Directory, relative to the workspace (default: workspace root)"
                }
            }
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<ToolOutput> {
        let path = args["path"].as_str().unwrap_or(".");
        let full = resolve_in_workspace(workspace, path)?;

        let mut reader = tokio::fs::read_dir(&full)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to list {}: {}", path, e))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader.next_entry().await? {
            let mut name = entry.file_name().to_string_lossy().to_string();
            if entry.file_type().await?.is_dir() {
                name.push('/');
            }
            entries.push(name);
        }
        entries.sort();

        if entries.is_empty() {
            return Ok(ToolOutput::Text(format!("{} is empty", path)));
        }

        let total = entries.len();
        entries.truncate(MAX_ENTRIES);
        let mut listing = entries.join("\n");
        if total > MAX_ENTRIES {
            listing.push_str(&format!("\n... ({} more entries)", total - MAX_ENTRIES));
        }
        Ok(ToolOutput::Text(listing))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn write_then_read_numbered() {
        let dir = tempfile::tempdir().unwrap();
        WriteFile
            .execute(json!({"path": "notes/a.txt", "content": "one\ntwo\nthree"}), dir.path())
            .await
            .unwrap();

        let out = ReadFile
            .execute(json!({"path": "notes/a.txt", "start_line": 2, "end_line": 2}), dir.path())
            .await
            .unwrap();
        assert_eq!(out.to_content(), "     2\ttwo");
    }

    #[tokio::test]
    async fn read_outside_workspace_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = ReadFile
            .execute(json!({"path": "../../etc/passwd"}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("outside the workspace"));
    }

    #[tokio::test]
    async fn edit_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.rs"), "let a = 1;\nlet a = 1;\nlet b = 2;\n").unwrap();

        let err = EditFile
            .execute(json!({"path": "f.rs", "old_str": "let a = 1;", "new_str": "x"}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("appears 2 times"));

        let err = EditFile
            .execute(json!({"path": "f.rs", "old_str": "let c", "new_str": "x"}), dir.path())
            .await
            .unwrap_err();
        assert!(err.to_string().contains("not found"));

        EditFile
            .execute(json!({"path": "f.rs", "old_str": "let b = 2;", "new_str": "let b = 3;"}), dir.path())
            .await
            .unwrap();
        let content = std::fs::read_to_string(dir.path().join("f.rs")).unwrap();
        assert!(content.ends_with("let b = 3;\n"));
    }

    #[tokio::test]
    async fn list_marks_directories() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "").unwrap();

        let out = ListDir.execute(json!({}), dir.path()).await.unwrap();
        assert_eq!(out.to_content(), "Cargo.toml\nsrc/");
    }
}
