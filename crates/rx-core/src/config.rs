use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Top-level configuration loaded from `~/.repo-xml/config.toml`.
///
/// **Security**: This struct NEVER stores API keys or tokens. The hosting
/// token is read at runtime from the environment variable named by
/// [`RepositoryConfig::token_env`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub repository: RepositoryConfig,
    #[serde(default)]
    pub selection: SelectionConfig,
    #[serde(default)]
    pub fetch: FetchConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub operator: OperatorConfig,
}

impl Config {
    /// Load config from `~/.repo-xml/config.toml`, falling back to defaults
    /// when the file does not exist.
    pub fn load() -> Result<Self, ConfigError> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(path)
        } else {
            let cfg = Config::default();
            cfg.validate()?;
            Ok(cfg)
        }
    }

    /// Load from a specific path.
    pub fn load_from(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let text = std::fs::read_to_string(&path).map_err(|e| ConfigError::Io(e.to_string()))?;
        let cfg: Config = toml::from_str(&text).map_err(|e| ConfigError::Parse(e.to_string()))?;
        cfg.validate()?;
        Ok(cfg)
    }

    /// Serialize config to TOML string.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        self.validate()?;
        toml::to_string_pretty(self).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Semantic validation for settings that are not fully expressible via type checks.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.general.validate()?;
        self.fetch.validate()?;
        self.store.validate()?;
        Ok(())
    }

    pub fn default_path() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".repo-xml")
            .join("config.toml")
    }
}

// ---------------------------------------------------------------------------
// Error
// ---------------------------------------------------------------------------

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io: {0}")]
    Io(String),
    #[error("parse: {0}")]
    Parse(String),
    #[error("validation: {0}")]
    Validation(String),
}

// ---------------------------------------------------------------------------
// Section structs
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_project_name")]
    pub project_name: String,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// `human` or `json`.
    #[serde(default = "default_log_format")]
    pub log_format: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            project_name: default_project_name(),
            log_level: default_log_level(),
            log_format: default_log_format(),
        }
    }
}

impl GeneralConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.log_format.as_str() {
            "human" | "json" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "general.log_format must be 'human' or 'json', got '{other}'"
            ))),
        }
    }
}

fn default_project_name() -> String {
    "repo-xml".into()
}
fn default_log_level() -> String {
    "info".into()
}
fn default_log_format() -> String {
    "human".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RepositoryConfig {
    /// GitHub repository URL. Empty means "not configured yet".
    #[serde(default)]
    pub url: String,
    /// Branch used when no override or PR branch applies. `None` = repo default.
    #[serde(default)]
    pub default_branch: Option<String>,
    /// Name of the environment variable holding the hosting token.
    #[serde(default = "default_token_env")]
    pub token_env: String,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            url: String::new(),
            default_branch: None,
            token_env: default_token_env(),
        }
    }
}

impl RepositoryConfig {
    /// Read the hosting token from the configured environment variable.
    pub fn token(&self) -> Option<String> {
        std::env::var(&self.token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
    }
}

fn default_token_env() -> String {
    "GITHUB_TOKEN".into()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SelectionConfig {
    /// Paths always added to the auto-selection when present in the tree.
    #[serde(default = "default_important_files")]
    pub important_files: Vec<String>,
}

impl Default for SelectionConfig {
    fn default() -> Self {
        Self {
            important_files: default_important_files(),
        }
    }
}

fn default_important_files() -> Vec<String> {
    [
        "contexts/AppContext.tsx",
        "hooks/useTelegram.ts",
        "app/layout.tsx",
        "hooks/supabase.ts",
        "app/actions.ts",
        "package.json",
        "tailwind.config.ts",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Expected duration of a full-tree fetch, drives the progress estimator.
    #[serde(default = "default_estimated_secs")]
    pub estimated_secs: u64,
    /// Expected duration when fetching from an existing PR branch.
    #[serde(default = "default_pr_branch_estimated_secs")]
    pub pr_branch_estimated_secs: u64,
    #[serde(default = "default_tick_ms")]
    pub tick_ms: u64,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            estimated_secs: default_estimated_secs(),
            pr_branch_estimated_secs: default_pr_branch_estimated_secs(),
            tick_ms: default_tick_ms(),
        }
    }
}

impl FetchConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        if self.tick_ms == 0 {
            return Err(ConfigError::Validation(
                "fetch.tick_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

fn default_estimated_secs() -> u64 {
    13
}
fn default_pr_branch_estimated_secs() -> u64 {
    5
}
fn default_tick_ms() -> u64 {
    200
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// `memory` or `sqlite`.
    #[serde(default = "default_store_backend")]
    pub backend: String,
    #[serde(default = "default_sqlite_path")]
    pub sqlite_path: String,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            sqlite_path: default_sqlite_path(),
        }
    }
}

impl StoreConfig {
    fn validate(&self) -> Result<(), ConfigError> {
        match self.backend.as_str() {
            "memory" | "sqlite" => Ok(()),
            other => Err(ConfigError::Validation(format!(
                "store.backend must be 'memory' or 'sqlite', got '{other}'"
            ))),
        }
    }
}

fn default_store_backend() -> String {
    "sqlite".into()
}
fn default_sqlite_path() -> String {
    "~/.repo-xml/requests.db".into()
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct OperatorConfig {
    /// Opaque identifier stamped on request records.
    #[serde(default)]
    pub user_id: Option<String>,
}
