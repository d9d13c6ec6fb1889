pub mod ask;
pub mod config;
pub mod fetch;
pub mod parse;
pub mod request;
pub mod stage;

use std::io::Read;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use rx_core::config::Config;
use rx_core::identity::StaticIdentity;
use rx_core::request_store::{InMemoryRequestStore, RequestStore, SqliteRequestStore};
use rx_integrations::GitHubHost;
use rx_orchestrator::notice::{Notice, NoticeLevel};
use rx_orchestrator::WorkflowSession;

/// Load the config from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> anyhow::Result<Config> {
    let config = match path {
        Some(p) => Config::load_from(p),
        None => Config::load(),
    }
    .context("failed to load configuration")?;
    Ok(config)
}

/// Expand a leading `~/` against the home directory.
pub fn expand_home(path: &str) -> PathBuf {
    match path.strip_prefix("~/") {
        Some(rest) => dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(rest),
        None => PathBuf::from(path),
    }
}

pub async fn open_sqlite(config: &Config) -> anyhow::Result<SqliteRequestStore> {
    let path = expand_home(&config.store.sqlite_path);
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("cannot create {}", parent.display()))?;
    }
    SqliteRequestStore::open(&path)
        .await
        .with_context(|| format!("cannot open request store at {}", path.display()))
}

/// Request store selected by `[store] backend`.
pub async fn open_store(config: &Config) -> anyhow::Result<Arc<dyn RequestStore>> {
    match config.store.backend.as_str() {
        "memory" => Ok(Arc::new(InMemoryRequestStore::new())),
        _ => Ok(Arc::new(open_sqlite(config).await?)),
    }
}

/// Session wired to GitHub, the configured store and the operator identity.
pub async fn build_session(config: &Config) -> anyhow::Result<WorkflowSession> {
    let host = Arc::new(GitHubHost::new(config.repository.token_env.clone()));
    let store = open_store(config).await?;
    let identity = Arc::new(StaticIdentity::from_optional(config.operator.user_id.clone()));
    Ok(WorkflowSession::new(config, host, store, identity))
}

/// Read `path`, or stdin when it is absent or `-`.
pub fn read_input(path: Option<&Path>) -> anyhow::Result<String> {
    match path {
        Some(p) if p != Path::new("-") => std::fs::read_to_string(p)
            .with_context(|| format!("cannot read {}", p.display())),
        _ => {
            let mut buf = String::new();
            std::io::stdin()
                .read_to_string(&mut buf)
                .context("cannot read stdin")?;
            Ok(buf)
        }
    }
}

pub fn print_notice(notice: &Notice) {
    let tag = match notice.level {
        NoticeLevel::Info => "info",
        NoticeLevel::Success => "ok",
        NoticeLevel::Warning => "warn",
        NoticeLevel::Error => "error",
    };
    eprintln!("[{tag}] {}", notice.message);
}

pub fn flush_notices(session: &WorkflowSession) {
    for notice in session.drain_notices() {
        print_notice(&notice);
    }
}

pub fn print_json<T: serde::Serialize>(value: &T) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn expand_home_only_touches_tilde_prefix() {
        assert_eq!(expand_home("/tmp/x.db"), PathBuf::from("/tmp/x.db"));
        assert_eq!(expand_home("rel/x.db"), PathBuf::from("rel/x.db"));
        let expanded = expand_home("~/.repo-xml/requests.db");
        assert!(expanded.ends_with(".repo-xml/requests.db"));
        assert!(!expanded.to_string_lossy().starts_with('~'));
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_config(Some(&dir.path().join("absent.toml"))).unwrap_err();
        assert!(err.to_string().contains("configuration"));
    }

    #[tokio::test]
    async fn memory_backend_opens_without_touching_disk() {
        let mut config = Config::default();
        config.store.backend = "memory".into();
        config.store.sqlite_path = "/nonexistent/dir/requests.db".into();
        let store = open_store(&config).await.unwrap();
        assert_eq!(store.active_subscriptions(), 0);
    }
}
