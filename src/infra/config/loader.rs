use std::{
    fs,
    path::{Path, PathBuf},
};

use crate::infra::{
    config::{file_config::FileConfig, AppConfig},
    error::AppError,
};

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";
const APP_DIR: &str = "chatsync";

/// Loads the config file, falling back to defaults when it does not exist.
///
/// Without an explicit path, `./config.toml` is tried first and then
/// `chatsync/config.toml` under the platform config directory.
pub fn load(path: Option<&Path>) -> Result<AppConfig, AppError> {
    let config_path = path
        .map(Path::to_path_buf)
        .unwrap_or_else(default_config_path);

    let mut config = AppConfig::default();

    if !config_path.exists() {
        tracing::debug!(path = %config_path.display(), "config file not found; using defaults");
        return Ok(config);
    }

    let raw = fs::read_to_string(&config_path).map_err(|source| AppError::ConfigRead {
        path: config_path.clone(),
        source,
    })?;

    let file_config: FileConfig = toml::from_str(&raw).map_err(|source| AppError::ConfigParse {
        path: config_path,
        source,
    })?;

    file_config.merge_into(&mut config);
    Ok(config)
}

fn default_config_path() -> PathBuf {
    let local = PathBuf::from(DEFAULT_CONFIG_PATH);
    if local.exists() {
        return local;
    }

    dirs::config_dir()
        .map(|dir| dir.join(APP_DIR).join(DEFAULT_CONFIG_PATH))
        .unwrap_or(local)
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use super::*;
    use crate::domain::message::SenderKind;

    fn write_config(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().expect("must create temp config");
        file.write_all(contents.as_bytes())
            .expect("must write test config");
        file
    }

    #[test]
    fn returns_defaults_when_file_is_missing() {
        let dir = tempfile::tempdir().expect("must create temp dir");

        let config = load(Some(&dir.path().join("missing.toml"))).expect("config must load");

        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn merges_file_values_over_defaults() {
        let file = write_config(
            r#"[logging]
level = "debug"

[gateway]
base_url = "https://chat.example.test/api/"
api_token = "secret-token"

[sync]
messages_per_page = 30

[identity]
user_id = 17
user_kind = "admin"
user_name = "Support"
"#,
        );

        let config = load(Some(file.path())).expect("config must load");

        assert_eq!(config.logging.level, "debug");
        assert_eq!(config.logging.file, None);
        assert_eq!(config.gateway.base_url, "https://chat.example.test/api");
        assert_eq!(config.gateway.api_token.as_deref(), Some("secret-token"));
        assert_eq!(config.gateway.request_timeout_ms, 10_000);
        assert_eq!(config.sync.conversations_per_page, 20);
        assert_eq!(config.sync.messages_per_page, 30);
        assert_eq!(config.identity.user_id, 17);
        assert_eq!(config.identity.user_kind, SenderKind::Admin);
        assert_eq!(config.identity.user_name, "Support");
    }

    #[test]
    fn blank_token_is_treated_as_absent() {
        let file = write_config("[gateway]\napi_token = \"  \"\n");

        let config = load(Some(file.path())).expect("config must load");

        assert_eq!(config.gateway.api_token, None);
    }

    #[test]
    fn reports_parse_errors_with_path() {
        let file = write_config("[sync]\nmessages_per_page = \"many\"\n");

        let err = load(Some(file.path())).expect_err("must fail");

        assert!(matches!(err, AppError::ConfigParse { ref path, .. } if path == file.path()));
    }
}
