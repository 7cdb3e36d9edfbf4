// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::config::Config;
use anyhow::{Context, Result, anyhow};
use std::fs;
use std::path::Path;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

pub const LOG_ENV: &str = "SIMWATCH_LOG";

/// Installs the global subscriber writing to the configured log file. The
/// terminal belongs to the dashboard, so nothing is logged to stdout or
/// stderr. Keep the guard alive until exit or buffered lines are lost.
pub fn init(config: &Config) -> Result<WorkerGuard> {
    let path = config.log_file()?;
    let file_name = path
        .file_name()
        .ok_or_else(|| anyhow!("log file {} has no file name", path.display()))?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("create log directory {}", dir.display()))?;

    let directive = filter_directive(std::env::var(LOG_ENV).ok(), config.log_level());
    let filter = EnvFilter::try_new(&directive)
        .with_context(|| format!("invalid log filter {directive:?}; check {LOG_ENV}"))?;

    let (writer, guard) = tracing_appender::non_blocking(tracing_appender::rolling::never(
        dir, file_name,
    ));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(writer)
        .with_ansi(false)
        .try_init();
    Ok(guard)
}

fn filter_directive(env_value: Option<String>, config_level: &str) -> String {
    match env_value {
        Some(value) if !value.trim().is_empty() => value.trim().to_owned(),
        _ => config_level.to_ascii_lowercase(),
    }
}
