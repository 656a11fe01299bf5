use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;

use crate::{
    infra::{self, error::AppError},
    usecases::context::AppContext,
};

/// Loads config and installs logging. The guard keeps the log file writer
/// alive and must outlive the session.
pub fn bootstrap(config_path: Option<&Path>) -> Result<(AppContext, Option<WorkerGuard>), AppError> {
    let context = build_context(config_path)?;
    let guard = infra::logging::init(&context.config.logging)?;

    Ok((context, guard))
}

fn build_context(config_path: Option<&Path>) -> Result<AppContext, AppError> {
    let config = infra::config::load(config_path)?;

    Ok(AppContext::new(config))
}
