use crate::{domain::message::CurrentUser, infra::config::AppConfig};

#[derive(Debug)]
pub struct AppContext {
    pub config: AppConfig,
}

impl AppContext {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }

    pub fn current_user(&self) -> CurrentUser {
        self.config.identity.current_user()
    }
}
