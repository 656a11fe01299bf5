use std::{fmt, path::PathBuf};

use serde::{Deserialize, Serialize};

use crate::domain::message::{CurrentUser, SenderKind};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub logging: LogConfig,
    pub gateway: GatewayConfig,
    pub sync: SyncConfig,
    pub identity: IdentityConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LogConfig {
    pub level: String,
    /// Log file; stderr when unset.
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            file: None,
        }
    }
}

#[derive(Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_token: Option<String>,
    pub request_timeout_ms: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:8000/api".to_owned(),
            api_token: None,
            request_timeout_ms: 10_000,
        }
    }
}

impl fmt::Debug for GatewayConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewayConfig")
            .field("base_url", &self.base_url)
            .field(
                "api_token",
                &self.api_token.as_ref().map(|_| "<redacted>"),
            )
            .field("request_timeout_ms", &self.request_timeout_ms)
            .finish()
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncConfig {
    pub conversations_per_page: u32,
    pub messages_per_page: u32,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            conversations_per_page: 20,
            messages_per_page: 50,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IdentityConfig {
    pub user_id: i64,
    pub user_kind: SenderKind,
    pub user_name: String,
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            user_id: 1,
            user_kind: SenderKind::User,
            user_name: "me".to_owned(),
        }
    }
}

impl IdentityConfig {
    pub fn current_user(&self) -> CurrentUser {
        CurrentUser {
            id: self.user_id,
            kind: self.user_kind,
            name: self.user_name.clone(),
        }
    }
}
