//! Configuration management tests
//!
//! Tests for ConfigManager and Config structures.

use contractor_core::config::{BackendConfig, BackendTransport, Config, ConfigManager, ProviderConfig};
use std::fs;
use tempfile::TempDir;

/// Create a temp directory for config tests
fn setup_config_dir() -> TempDir {
    TempDir::new().expect("Failed to create temp dir")
}

mod config_structure_tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();

        assert_eq!(config.provider.provider_type, "openai");
        assert_eq!(config.provider.model, "gpt-4o");
        assert!(config.provider.api_key.is_none());
        assert_eq!(config.provider.api_key_env.as_deref(), Some("OPENAI_API_KEY"));

        assert!(config.backends.is_empty());

        assert_eq!(config.orchestration.history_window, 10);
        assert_eq!(config.orchestration.max_tokens, 4000);
        assert_eq!(
            config.orchestration.empty_reply_fallback,
            "How can I help you refine your prompt contract today?"
        );

        assert_eq!(config.general.log_level, "warn");
    }

    #[test]
    fn test_provider_presets() {
        assert!(ProviderConfig::anthropic().model.contains("claude"));
        assert!(ProviderConfig::gemini().model.contains("gemini"));
        assert_eq!(ProviderConfig::default().provider_type, "openai");
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [provider]
            provider_type = "anthropic"
            model = "claude-sonnet-4-20250514"

            [orchestration]
            history_window = 4
            "#,
        )
        .unwrap();

        assert_eq!(config.provider.provider_type, "anthropic");
        assert_eq!(config.orchestration.history_window, 4);
        assert_eq!(config.orchestration.narration_fallback, "Done.");
        assert!(config.backends.is_empty());
    }
}

mod config_manager_tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = setup_config_dir();
        let manager = ConfigManager::with_path(dir.path().join("config.toml")).unwrap();
        assert_eq!(manager.config().provider.provider_type, "openai");
        assert!(!manager.path().exists());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = setup_config_dir();
        let path = dir.path().join("nested").join("config.toml");

        let mut manager = ConfigManager::with_path(path.clone()).unwrap();
        manager.config_mut().provider = ProviderConfig::anthropic();
        manager.set_backend(BackendConfig::sse("playwright", "http://localhost:3001/sse"));
        manager.set_backend(
            BackendConfig::stdio("docs", "docs-server")
                .with_args(vec!["--port".into(), "0".into()])
                .with_env("DOCS_TOKEN", "t"),
        );
        manager.save().unwrap();

        let reloaded = ConfigManager::with_path(path).unwrap();
        let config = reloaded.config();
        assert_eq!(config.provider.provider_type, "anthropic");
        assert_eq!(config.backends.len(), 2);
        match &config.backends[1].transport {
            BackendTransport::Stdio { command, args, env } => {
                assert_eq!(command, "docs-server");
                assert_eq!(args, &vec!["--port".to_string(), "0".to_string()]);
                assert_eq!(env.get("DOCS_TOKEN").map(String::as_str), Some("t"));
            }
            other => panic!("expected stdio backend, got {other:?}"),
        }
    }

    #[test]
    fn test_set_backend_replaces_by_name() {
        let dir = setup_config_dir();
        let mut manager = ConfigManager::with_path(dir.path().join("config.toml")).unwrap();

        manager.set_backend(BackendConfig::sse("docs", "http://old/sse"));
        manager.set_backend(BackendConfig::sse("docs", "http://new/sse"));
        assert_eq!(manager.config().backends.len(), 1);
        assert_eq!(manager.config().backends[0].endpoint(), "http://new/sse");

        assert!(manager.remove_backend("docs"));
        assert!(!manager.remove_backend("docs"));
    }

    #[test]
    fn test_invalid_file_is_config_error() {
        let dir = setup_config_dir();
        let path = dir.path().join("config.toml");
        fs::write(&path, "this is = = not toml").unwrap();

        let result = ConfigManager::with_path(path);
        assert!(matches!(result, Err(contractor_core::Error::Config(_))));
    }

    #[test]
    fn test_disabled_backends_are_filtered() {
        let dir = setup_config_dir();
        let path = dir.path().join("config.toml");
        fs::write(
            &path,
            r#"
            [[backends]]
            name = "on"
            transport = "sse"
            url = "http://on/sse"

            [[backends]]
            name = "off"
            transport = "sse"
            url = "http://off/sse"
            enabled = false
            "#,
        )
        .unwrap();

        let manager = ConfigManager::with_path(path).unwrap();
        let enabled = manager.config().enabled_backends();
        assert_eq!(enabled.len(), 1);
        assert_eq!(enabled[0].name, "on");
    }
}
