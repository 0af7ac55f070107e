//! Configuration management for the agent.
//!
//! Configuration can be set via environment variables:
//! - `LLM_PROVIDER` - Optional. `anthropic` (default) or `openrouter`.
//! - `ANTHROPIC_API_KEY` - Required when the provider is `anthropic`.
//! - `OPENROUTER_API_KEY` - Required when the provider is `openrouter`.
//! - `LLM_BASE_URL` - Optional. Override of the provider's API base URL.
//! - `DEFAULT_MODEL` - Optional. Defaults to `claude-sonnet-4-20250514`, or
//!   `anthropic/claude-sonnet-4` on OpenRouter.
//! - `MAX_TOKENS` - Optional. Output token cap per model call. Defaults to `4096`.
//! - `MAX_ITERATIONS` - Optional. Maximum agent loop iterations. Defaults to `10`.
//! - `WORKSPACE_PATH` - Optional. The workspace directory, made absolute on load.
//!   Defaults to current directory.
//! - `HOST` - Optional. Server host. Defaults to `127.0.0.1`.
//! - `PORT` - Optional. Server port. Defaults to `3000`.
//! - `SESSION_TTL_SECS` - Optional. Idle time before a chat session is dropped. Defaults to `3600`.
//! - `MAX_SESSIONS` - Optional. Live chat sessions kept in memory. Defaults to `1000`.
//! - `MCP_CONFIG` - Optional. Path to an MCP server config file (JSON or YAML).
//! - `SYSTEM_PROMPT` - Optional. Replaces the built-in system prompt preamble.

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(String, String),
}

/// Which hosted model API to talk to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    /// Anthropic Messages API
    Anthropic,
    /// OpenRouter (OpenAI-compatible chat completions)
    OpenRouter,
}

impl ProviderKind {
    /// Environment variable holding this provider's API key.
    pub fn api_key_var(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "ANTHROPIC_API_KEY",
            ProviderKind::OpenRouter => "OPENROUTER_API_KEY",
        }
    }

    pub fn default_base_url(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "https://api.anthropic.com/v1",
            ProviderKind::OpenRouter => "https://openrouter.ai/api/v1",
        }
    }

    /// Model used when `DEFAULT_MODEL` is unset. OpenRouter ids carry a vendor prefix.
    pub fn default_model(&self) -> &'static str {
        match self {
            ProviderKind::Anthropic => "claude-sonnet-4-20250514",
            ProviderKind::OpenRouter => "anthropic/claude-sonnet-4",
        }
    }
}

impl FromStr for ProviderKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "anthropic" => Ok(ProviderKind::Anthropic),
            "openrouter" => Ok(ProviderKind::OpenRouter),
            other => Err(format!("unknown provider '{}', expected anthropic or openrouter", other)),
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderKind::Anthropic => write!(f, "anthropic"),
            ProviderKind::OpenRouter => write!(f, "openrouter"),
        }
    }
}

/// Agent configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Model API provider
    pub provider: ProviderKind,

    /// API key for the selected provider
    pub api_key: String,

    /// Provider base URL (no trailing slash)
    pub base_url: String,

    /// Default LLM model identifier
    pub default_model: String,

    /// Output token cap per model call
    pub max_tokens: u32,

    /// Workspace directory for file operations
    pub workspace_path: PathBuf,

    /// Server host
    pub host: String,

    /// Server port
    pub port: u16,

    /// Maximum iterations for the agent loop
    pub max_iterations: usize,

    /// Idle seconds after which a chat session is evicted
    pub session_ttl_secs: u64,

    /// Upper bound on live chat sessions
    pub max_sessions: usize,

    /// Optional MCP server configuration file
    pub mcp_config: Option<PathBuf>,

    /// Optional replacement for the built-in system prompt preamble
    pub system_prompt: Option<String>,
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if the selected provider's API key is not set,
    /// and `ConfigError::InvalidValue` for any variable that fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration through an arbitrary variable lookup.
    ///
    /// `from_env` delegates here; tests pass a map instead of mutating the
    /// process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let provider = match lookup("LLM_PROVIDER") {
            Some(v) => v
                .parse::<ProviderKind>()
                .map_err(|e| ConfigError::InvalidValue("LLM_PROVIDER".to_string(), e))?,
            None => ProviderKind::Anthropic,
        };

        let api_key = lookup(provider.api_key_var())
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::MissingEnvVar(provider.api_key_var().to_string()))?;

        let base_url = match lookup("LLM_BASE_URL") {
            Some(raw) => validate_base_url(&raw)
                .map_err(|e| ConfigError::InvalidValue("LLM_BASE_URL".to_string(), e))?,
            None => provider.default_base_url().to_string(),
        };

        let default_model = lookup("DEFAULT_MODEL")
            .filter(|m| !m.trim().is_empty())
            .unwrap_or_else(|| provider.default_model().to_string());

        let max_tokens = lookup("MAX_TOKENS")
            .unwrap_or_else(|| "4096".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("MAX_TOKENS".to_string(), format!("{}", e)))?;

        let workspace_path = match lookup("WORKSPACE_PATH").filter(|p| !p.trim().is_empty()) {
            Some(raw) => absolute_workspace(PathBuf::from(raw))?,
            None => std::env::current_dir().map_err(|e| {
                ConfigError::InvalidValue("WORKSPACE_PATH".to_string(), e.to_string())
            })?,
        };

        let host = lookup("HOST").unwrap_or_else(|| "127.0.0.1".to_string());

        let port = lookup("PORT")
            .unwrap_or_else(|| "3000".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("PORT".to_string(), format!("{}", e)))?;

        let max_iterations: usize = lookup("MAX_ITERATIONS")
            .unwrap_or_else(|| "10".to_string())
            .parse()
            .map_err(|e| ConfigError::InvalidValue("MAX_ITERATIONS".to_string(), format!("{}", e)))?;
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "MAX_ITERATIONS".to_string(),
                "must be at least 1".to_string(),
            ));
        }

        let session_ttl_secs: u64 = positive(&lookup, "SESSION_TTL_SECS", 3600)?;
        let max_sessions: usize = positive(&lookup, "MAX_SESSIONS", 1000)?;

        let mcp_config = lookup("MCP_CONFIG")
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        if let Some(path) = &mcp_config {
            if !path.is_file() {
                return Err(ConfigError::InvalidValue(
                    "MCP_CONFIG".to_string(),
                    format!("no such file: {}", path.display()),
                ));
            }
        }

        let system_prompt = lookup("SYSTEM_PROMPT").filter(|p| !p.trim().is_empty());

        Ok(Self {
            provider,
            api_key,
            base_url,
            default_model,
            max_tokens,
            workspace_path,
            host,
            port,
            max_iterations,
            session_ttl_secs,
            max_sessions,
            mcp_config,
            system_prompt,
        })
    }

    /// Create a config with custom values (useful for testing).
    pub fn new(api_key: String, default_model: String, workspace_path: PathBuf) -> Self {
        Self {
            provider: ProviderKind::Anthropic,
            api_key,
            base_url: ProviderKind::Anthropic.default_base_url().to_string(),
            default_model,
            max_tokens: 4096,
            workspace_path,
            host: "127.0.0.1".to_string(),
            port: 3000,
            max_iterations: 10,
            session_ttl_secs: 3600,
            max_sessions: 1000,
            mcp_config: None,
            system_prompt: None,
        }
    }

    /// Override the loop cap. Zero is rejected, as it is for `MAX_ITERATIONS`.
    pub fn with_max_iterations(mut self, max_iterations: usize) -> Result<Self, ConfigError> {
        if max_iterations == 0 {
            return Err(ConfigError::InvalidValue(
                "max_iterations".to_string(),
                "must be at least 1".to_string(),
            ));
        }
        self.max_iterations = max_iterations;
        Ok(self)
    }

    /// Override the workspace. Relative paths are anchored at the current directory.
    pub fn with_workspace(mut self, workspace: PathBuf) -> Result<Self, ConfigError> {
        self.workspace_path = absolute_workspace(workspace)?;
        Ok(self)
    }
}

/// Parse a numeric variable that must be at least 1.
fn positive<F, T>(lookup: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr + PartialOrd + From<u8>,
    T::Err: fmt::Display,
{
    let value = match lookup(key) {
        Some(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidValue(key.to_string(), e.to_string()))?,
        None => default,
    };
    if value < T::from(1) {
        return Err(ConfigError::InvalidValue(
            key.to_string(),
            "must be at least 1".to_string(),
        ));
    }
    Ok(value)
}

/// Anchor `path` at the current directory so that file tools and shell
/// commands agree on the root whatever the process later does.
fn absolute_workspace(path: PathBuf) -> Result<PathBuf, ConfigError> {
    std::path::absolute(&path).map_err(|e| {
        ConfigError::InvalidValue("WORKSPACE_PATH".to_string(), format!("{}: {}", path.display(), e))
    })
}

fn validate_base_url(raw: &str) -> Result<String, String> {
    let parsed = url::Url::parse(raw.trim()).map_err(|e| e.to_string())?;
    match parsed.scheme() {
        "http" | "https" => Ok(raw.trim().trim_end_matches('/').to_string()),
        other => Err(format!("unsupported scheme '{}'", other)),
    }
}
