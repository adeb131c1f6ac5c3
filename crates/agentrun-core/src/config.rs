//! Layered engine configuration (code defaults, overridden by env vars).

const MAX_STEPS_ENV: &str = "AGENTRUN_MAX_STEPS";
const APPROVAL_TIMEOUT_SECS_ENV: &str = "AGENTRUN_APPROVAL_TIMEOUT_SECS";
const MODEL_TIMEOUT_MS_ENV: &str = "AGENTRUN_MODEL_TIMEOUT_MS";
const TOOL_TIMEOUT_MS_ENV: &str = "AGENTRUN_TOOL_TIMEOUT_MS";
const MAX_RETRIES_ENV: &str = "AGENTRUN_MAX_RETRIES";
const MAX_VERBATIM_RUNS_ENV: &str = "AGENTRUN_MAX_VERBATIM_RUNS";
const SQLITE_PATH_ENV: &str = "AGENTRUN_SQLITE_PATH";

/// Engine-wide configuration, analogous in spirit to the teacher's layered
/// `RociConfig` (code defaults, overridden by environment variables).
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Default step budget for a run when the caller doesn't specify one.
    pub default_max_steps: u32,
    /// How long a pending approval may sit before it's treated as rejected.
    pub approval_timeout: std::time::Duration,
    /// Per-call timeout for the model client.
    pub model_timeout: std::time::Duration,
    /// Per-call timeout for tool execution.
    pub tool_timeout: std::time::Duration,
    /// Retry bound for transient model/storage errors.
    pub max_retries: u32,
    /// Number of prior runs included verbatim in conversation context before
    /// older runs are collapsed into a one-line summary.
    pub max_verbatim_runs: usize,
    /// Path to the sqlite database file (server binary only).
    pub sqlite_path: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            default_max_steps: 20,
            approval_timeout: std::time::Duration::from_secs(4 * 60 * 60),
            model_timeout: std::time::Duration::from_secs(120),
            tool_timeout: std::time::Duration::from_secs(60),
            max_retries: 3,
            max_verbatim_runs: 5,
            sqlite_path: "agentrun.db".to_string(),
        }
    }
}

impl EngineConfig {
    /// Build from code defaults, overridden by environment variables where
    /// present. Malformed env values are ignored in favor of the default,
    /// matching the teacher's `parse_positive_usize` fallback behavior.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Some(v) = parse_env_u32(MAX_STEPS_ENV) {
            config.default_max_steps = v;
        }
        if let Some(v) = parse_env_u64(APPROVAL_TIMEOUT_SECS_ENV) {
            config.approval_timeout = std::time::Duration::from_secs(v);
        }
        if let Some(v) = parse_env_u64(MODEL_TIMEOUT_MS_ENV) {
            config.model_timeout = std::time::Duration::from_millis(v);
        }
        if let Some(v) = parse_env_u64(TOOL_TIMEOUT_MS_ENV) {
            config.tool_timeout = std::time::Duration::from_millis(v);
        }
        if let Some(v) = parse_env_u32(MAX_RETRIES_ENV) {
            config.max_retries = v;
        }
        if let Some(v) = parse_env_u32(MAX_VERBATIM_RUNS_ENV) {
            config.max_verbatim_runs = v as usize;
        }
        if let Ok(path) = std::env::var(SQLITE_PATH_ENV) {
            if !path.trim().is_empty() {
                config.sqlite_path = path;
            }
        }

        config
    }
}

fn parse_env_u32(key: &str) -> Option<u32> {
    std::env::var(key).ok()?.trim().parse::<u32>().ok()
}

fn parse_env_u64(key: &str) -> Option<u64> {
    std::env::var(key).ok()?.trim().parse::<u64>().ok()
}
