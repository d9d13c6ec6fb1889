use rx_core::config::Config;

#[test]
fn default_config() {
    let cfg = Config::default();
    assert_eq!(cfg.general.project_name, "repo-xml");
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.general.log_format, "human");
    assert!(cfg.repository.url.is_empty());
    assert_eq!(cfg.repository.token_env, "GITHUB_TOKEN");
    assert!(cfg
        .selection
        .important_files
        .contains(&"app/layout.tsx".to_string()));
    assert_eq!(cfg.fetch.estimated_secs, 13);
    assert_eq!(cfg.fetch.pr_branch_estimated_secs, 5);
    assert_eq!(cfg.fetch.tick_ms, 200);
    assert_eq!(cfg.store.backend, "sqlite");
    assert!(cfg.operator.user_id.is_none());
}

#[test]
fn config_roundtrip() {
    let cfg = Config::default();
    let toml_str = cfg.to_toml().expect("serialize to toml");
    assert!(toml_str.contains("repo-xml"));

    let parsed: Config = toml::from_str(&toml_str).expect("parse toml back");
    assert_eq!(parsed.general.project_name, cfg.general.project_name);
    assert_eq!(parsed.fetch.tick_ms, cfg.fetch.tick_ms);
    assert_eq!(parsed.selection.important_files, cfg.selection.important_files);
    parsed.validate().expect("config validates");
}

#[test]
fn config_partial_toml() {
    let partial = r#"
[repository]
url = "https://github.com/o/r"

[operator]
user_id = "op-1"
"#;
    let cfg: Config = toml::from_str(partial).expect("parse partial");
    assert_eq!(cfg.repository.url, "https://github.com/o/r");
    assert_eq!(cfg.operator.user_id.as_deref(), Some("op-1"));
    // defaults should fill in the rest
    assert_eq!(cfg.general.log_level, "info");
    assert_eq!(cfg.fetch.estimated_secs, 13);
    cfg.validate().expect("config validates");
}

#[test]
fn load_from_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("config.toml");
    std::fs::write(&path, "[store]\nbackend = \"memory\"\n").expect("write config");
    let cfg = Config::load_from(&path).expect("load");
    assert_eq!(cfg.store.backend, "memory");
}

#[test]
fn zero_tick_fails_validation() {
    let mut cfg = Config::default();
    cfg.fetch.tick_ms = 0;
    let err = cfg.validate().expect_err("validation should fail");
    assert!(err.to_string().contains("tick_ms"));
}

#[test]
fn unknown_backend_fails_validation() {
    let mut cfg = Config::default();
    cfg.store.backend = "redis".to_string();
    let err = cfg.validate().expect_err("validation should fail");
    assert!(err.to_string().contains("store.backend"));
}

#[test]
fn unknown_log_format_fails_validation() {
    let mut cfg = Config::default();
    cfg.general.log_format = "xml".to_string();
    assert!(cfg.validate().is_err());
}
