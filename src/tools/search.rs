//! Code search tool: regex search over workspace files.

use std::path::Path;

use async_trait::async_trait;
use regex::{Regex, RegexBuilder};
use serde_json::{json, Value};
use walkdir::{DirEntry, WalkDir};

use super::{required_str, resolve_in_workspace, Tool, ToolOutput};

const MAX_MATCHES: usize = 100;
const SKIP_DIRS: &[&str] = &[".git", "target", "node_modules", ".venv", "__pycache__"];

/// Search file contents with a regex.
pub struct GrepSearch;

#[async_trait]
impl Tool for GrepSearch {
    fn name(&self) -> &str {
        "grep_search"
    }

    fn description(&self) -> &str {
        "Search for a pattern in file contents using regex. Returns matching lines with file paths and line numbers."
    }

    fn parameters_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "pattern": {
                    "type": "string",
                    "description": "Regex pattern to search for"
                },
                "path": {
                    "type": "string",
                    "description": "Directory to search in, relative to workspace. Defaults to workspace root."
                },
                "file_pattern": {
                    "type": "string",
                    "description": "Optional: only search files whose name matches this glob (e.g., '*.rs', '*.py')"
                },
                "case_sensitive": {
                    "type": "boolean",
                    "description": "Whether search is case-sensitive (default: false)"
                }
            },
            "required": ["pattern"]
        })
    }

    async fn execute(&self, args: Value, workspace: &Path) -> anyhow::Result<ToolOutput> {
        let pattern = required_str(&args, "pattern")?;
        let path = args["path"].as_str().unwrap_or(".");
        let case_sensitive = args["case_sensitive"].as_bool().unwrap_or(false);

        let regex = RegexBuilder::new(pattern)
            .case_insensitive(!case_sensitive)
            .build()
            .map_err(|e| anyhow::anyhow!("Invalid pattern: {}", e))?;
        let file_filter = args["file_pattern"]
            .as_str()
            .map(glob_to_regex)
            .transpose()?;

        let root = resolve_in_workspace(workspace, path)?;
        let workspace = workspace.to_path_buf();

        // Directory walking and file reads are blocking.
        let (matches, truncated) = tokio::task::spawn_blocking(move || {
            search(&root, &workspace, &regex, file_filter.as_ref())
        })
        .await?;

        if matches.is_empty() {
            return Ok(ToolOutput::Text(format!("No matches found for pattern: {}", pattern)));
        }

        let mut result = matches.join("\n");
        if truncated {
            result.push_str(&format!("\n\n... (showing first {} matches)", MAX_MATCHES));
        }
        Ok(ToolOutput::Text(result))
    }
}

fn search(root: &Path, workspace: &Path, regex: &Regex, file_filter: Option<&Regex>) -> (Vec<String>, bool) {
    let mut matches = Vec::new();

    let files = WalkDir::new(root)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !is_skipped_dir(e))
        .filter_map(Result::ok)
        .filter(|e| e.file_type().is_file());

    for entry in files {
        if let Some(filter) = file_filter {
            if !filter.is_match(&entry.file_name().to_string_lossy()) {
                continue;
            }
        }

        // Non-UTF-8 files are treated as binary and skipped.
        let Ok(content) = std::fs::read_to_string(entry.path()) else {
            continue;
        };

        let display = entry
            .path()
            .strip_prefix(workspace)
            .unwrap_or(entry.path())
            .to_string_lossy()
            .to_string();

        for (i, line) in content.lines().enumerate() {
            if regex.is_match(line) {
                if matches.len() >= MAX_MATCHES {
                    return (matches, true);
                }
                matches.push(format!("{}:{}:{}", display, i + 1, line));
            }
        }
    }

    (matches, false)
}

fn is_skipped_dir(entry: &DirEntry) -> bool {
    if entry.depth() == 0 || !entry.file_type().is_dir() {
        return false;
    }
    let name = entry.file_name().to_string_lossy();
    SKIP_DIRS.iter().any(|skip| *skip == name)
}

/// Translate a simple `*`/`?` glob into an anchored regex.
fn glob_to_regex(glob: &str) -> anyhow::Result<Regex> {
    let mut pattern = String::from("^");
    for ch in glob.chars() {
        match ch {
            '*' => pattern.push_str(".*"),
            '?' => pattern.push('.'),
            other => pattern.push_str(&regex::escape(&other.to_string())),
        }
    }
    pattern.push('$');
    Regex::new(&pattern).map_err(|e| anyhow::anyhow!("Invalid file_pattern '{}': {}", glob, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src")).unwrap();
        std::fs::create_dir_all(dir.path().join("target")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "pub fn hello() {}\nfn other() {}\n").unwrap();
        std::fs::write(dir.path().join("src/notes.md"), "Hello docs\n").unwrap();
        std::fs::write(dir.path().join("target/gen.rs"), "pub fn hello() {}\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn finds_matches_case_insensitive_by_default() {
        let dir = workspace();
        let out = GrepSearch
            .execute(json!({"pattern": "hello"}), dir.path())
            .await
            .unwrap()
            .to_content();
        assert!(out.contains("src/lib.rs:1:pub fn hello() {}"));
        assert!(out.contains("src/notes.md:1:Hello docs"));
        assert!(!out.contains("target"), "skipped dirs must not be searched");
    }

    #[tokio::test]
    async fn file_pattern_filters_names() {
        let dir = workspace();
        let out = GrepSearch
            .execute(
                json!({"pattern": "hello", "file_pattern": "*.rs", "case_sensitive": true}),
                dir.path(),
            )
            .await
            .unwrap()
            .to_content();
        assert_eq!(out, "src/lib.rs:1:pub fn hello() {}");
    }

    #[tokio::test]
    async fn no_match_message() {
        let dir = workspace();
        let out = GrepSearch
            .execute(json!({"pattern": "zebra"}), dir.path())
            .await
            .unwrap()
            .to_content();
        assert_eq!(out, "No matches found for pattern: zebra");
    }

    #[tokio::test]
    async fn invalid_regex_is_error() {
        let dir = workspace();
        assert!(GrepSearch
            .execute(json!({"pattern": "("}), dir.path())
            .await
            .is_err());
    }

    #[test]
    fn glob_translation() {
        let re = glob_to_regex("*.rs").unwrap();
        assert!(re.is_match("main.rs"));
        assert!(!re.is_match("main.rsx"));
        assert!(glob_to_regex("file?.txt").unwrap().is_match("file1.txt"));
    }
}
