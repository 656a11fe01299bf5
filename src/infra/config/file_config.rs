use std::path::PathBuf;

use serde::Deserialize;

use crate::{
    domain::message::SenderKind,
    infra::config::{AppConfig, GatewayConfig, IdentityConfig, LogConfig, SyncConfig},
};

#[derive(Debug, Deserialize, Default)]
pub struct FileConfig {
    pub logging: Option<FileLogConfig>,
    pub gateway: Option<FileGatewayConfig>,
    pub sync: Option<FileSyncConfig>,
    pub identity: Option<FileIdentityConfig>,
}

impl FileConfig {
    pub fn merge_into(self, config: &mut AppConfig) {
        if let Some(logging) = self.logging {
            logging.merge_into(&mut config.logging);
        }

        if let Some(gateway) = self.gateway {
            gateway.merge_into(&mut config.gateway);
        }

        if let Some(sync) = self.sync {
            sync.merge_into(&mut config.sync);
        }

        if let Some(identity) = self.identity {
            identity.merge_into(&mut config.identity);
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileLogConfig {
    pub level: Option<String>,
    pub file: Option<PathBuf>,
}

impl FileLogConfig {
    fn merge_into(self, config: &mut LogConfig) {
        if let Some(level) = self.level {
            config.level = level;
        }

        if let Some(file) = self.file {
            config.file = Some(file);
        }
    }
}

#[derive(Deserialize, Default)]
pub struct FileGatewayConfig {
    pub base_url: Option<String>,
    pub api_token: Option<String>,
    pub request_timeout_ms: Option<u64>,
}

impl FileGatewayConfig {
    fn merge_into(self, config: &mut GatewayConfig) {
        if let Some(base_url) = self.base_url {
            config.base_url = base_url.trim_end_matches('/').to_owned();
        }

        if let Some(api_token) = self.api_token.filter(|token| !token.trim().is_empty()) {
            config.api_token = Some(api_token);
        }

        if let Some(timeout_ms) = self.request_timeout_ms {
            config.request_timeout_ms = timeout_ms;
        }
    }
}

impl std::fmt::Debug for FileGatewayConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileGatewayConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<redacted>"))
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileSyncConfig {
    pub conversations_per_page: Option<u32>,
    pub messages_per_page: Option<u32>,
}

impl FileSyncConfig {
    fn merge_into(self, config: &mut SyncConfig) {
        if let Some(per_page) = self.conversations_per_page {
            config.conversations_per_page = per_page;
        }

        if let Some(per_page) = self.messages_per_page {
            config.messages_per_page = per_page;
        }
    }
}

#[derive(Debug, Deserialize, Default)]
pub struct FileIdentityConfig {
    pub user_id: Option<i64>,
    pub user_kind: Option<SenderKind>,
    pub user_name: Option<String>,
}

impl FileIdentityConfig {
    fn merge_into(self, config: &mut IdentityConfig) {
        if let Some(user_id) = self.user_id {
            config.user_id = user_id;
        }

        if let Some(user_kind) = self.user_kind {
            config.user_kind = user_kind;
        }

        if let Some(user_name) = self.user_name {
            config.user_name = user_name;
        }
    }
}
