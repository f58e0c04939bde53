//! Configuration management

use crate::error::{FetchError, Result};
use crate::types::AppConfig;
use crate::utils::paths::{ensure_dir, get_config_dir, get_config_path};
use std::path::Path;
use tokio::fs;
use tracing::debug;

/// Load configuration from file, then apply environment overrides
pub async fn load_config() -> Result<AppConfig> {
    let config = load_config_from(Path::new(&get_config_path())).await?;
    apply_env(config, |key| std::env::var(key).ok())
}

/// Read a config file; a missing file means defaults
pub async fn load_config_from(path: &Path) -> Result<AppConfig> {
    if !path.exists() {
        debug!(path = %path.display(), "No config file, using defaults");
        return Ok(AppConfig::default());
    }

    let content = fs::read_to_string(path).await?;
    let config: AppConfig = serde_json::from_str(&content)
        .map_err(|e| FetchError::Config(format!("{}: {}", path.display(), e)))?;
    validate(&config)?;
    Ok(config)
}

/// Overlay `PORT`, `HOST`, `MEDIA_GRAB_TOOL` and `MEDIA_GRAB_DOWNLOAD_DIR`
pub fn apply_env(mut config: AppConfig, var: impl Fn(&str) -> Option<String>) -> Result<AppConfig> {
    if let Some(port) = var("PORT") {
        config.port = port
            .trim()
            .parse()
            .map_err(|_| FetchError::Config(format!("PORT is not a valid port: {}", port)))?;
    }
    if let Some(host) = var("HOST").filter(|h| !h.trim().is_empty()) {
        config.host = host;
    }
    if let Some(tool) = var("MEDIA_GRAB_TOOL").filter(|t| !t.trim().is_empty()) {
        config.tool = tool;
    }
    if let Some(dir) = var("MEDIA_GRAB_DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
        config.download_dir = dir;
    }

    validate(&config)?;
    Ok(config)
}

fn validate(config: &AppConfig) -> Result<()> {
    if config.max_attempts == 0 {
        return Err(FetchError::Config("max_attempts must be at least 1".into()));
    }
    if config.max_concurrent_downloads == 0 {
        return Err(FetchError::Config(
            "max_concurrent_downloads must be at least 1".into(),
        ));
    }
    if config.tool.trim().is_empty() {
        return Err(FetchError::Config("tool must not be empty".into()));
    }
    Ok(())
}

/// Save configuration to file
pub async fn save_config(config: &AppConfig) -> Result<()> {
    ensure_dir(&get_config_dir()).await?;
    let content = serde_json::to_string_pretty(config)?;
    fs::write(get_config_path(), content).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let cfg = apply_env(
            AppConfig::default(),
            env(&[
                ("PORT", "8080"),
                ("HOST", "127.0.0.1"),
                ("MEDIA_GRAB_TOOL", "/opt/My Tools/yt-dlp"),
            ]),
        )
        .unwrap();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.host, "127.0.0.1");
        assert_eq!(cfg.tool, "/opt/My Tools/yt-dlp");
        assert_eq!(cfg.download_dir, "public/downloads");
    }

    #[test]
    fn test_bad_port_is_config_error() {
        let err = apply_env(AppConfig::default(), env(&[("PORT", "eighty")])).unwrap_err();
        assert!(matches!(err, FetchError::Config(_)));
    }

    #[tokio::test]
    async fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.json")).await.unwrap();
        assert_eq!(cfg, AppConfig::default());
    }

    #[tokio::test]
    async fn test_file_values_and_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"download_dir": "/srv/media", "max_attempts": 5}"#).unwrap();
        let cfg = load_config_from(&path).await.unwrap();
        assert_eq!(cfg.download_dir, "/srv/media");
        assert_eq!(cfg.max_attempts, 5);
        assert_eq!(cfg.port, 3000);

        std::fs::write(&path, r#"{"max_attempts": 0}"#).unwrap();
        assert!(matches!(load_config_from(&path).await, Err(FetchError::Config(_))));

        std::fs::write(&path, "not json").unwrap();
        assert!(matches!(load_config_from(&path).await, Err(FetchError::Config(_))));
    }
}
