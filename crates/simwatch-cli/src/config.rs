// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use serde::Deserialize;
use simwatch_app::{
    DEFAULT_MAX_BACKOFF, DEFAULT_MAX_FAILURES, DEFAULT_PAGE_SIZE, DEFAULT_POLL_INTERVAL,
    PollPolicy,
};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const APP_NAME: &str = "simwatch";

const CONFIG_VERSION: i64 = 1;
const DEFAULT_BASE_URL: &str = "http://localhost:8000";
const DEFAULT_TIMEOUT: &str = "30s";
const DEFAULT_INTERVAL: &str = "3000ms";
const DEFAULT_MAX_BACKOFF_RAW: &str = "60s";
const DEFAULT_LOG_LEVEL: &str = "info";
const MAX_DURATION: Duration = Duration::from_secs(24 * 60 * 60);
const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub version: i64,
    #[serde(default)]
    pub server: Server,
    #[serde(default)]
    pub poll: Poll,
    #[serde(default)]
    pub ui: Ui,
    #[serde(default)]
    pub log: Log,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: CONFIG_VERSION,
            server: Server::default(),
            poll: Poll::default(),
            ui: Ui::default(),
            log: Log::default(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Server {
    pub base_url: Option<String>,
    pub timeout: Option<String>,
}

impl Default for Server {
    fn default() -> Self {
        Self {
            base_url: Some(DEFAULT_BASE_URL.to_owned()),
            timeout: Some(DEFAULT_TIMEOUT.to_owned()),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Poll {
    pub interval: Option<String>,
    pub max_backoff: Option<String>,
    /// `0` keeps retrying forever.
    pub max_failures: Option<i64>,
}

impl Default for Poll {
    fn default() -> Self {
        Self {
            interval: Some(DEFAULT_INTERVAL.to_owned()),
            max_backoff: Some(DEFAULT_MAX_BACKOFF_RAW.to_owned()),
            max_failures: Some(i64::from(DEFAULT_MAX_FAILURES)),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Ui {
    pub page_size: Option<i64>,
}

impl Default for Ui {
    fn default() -> Self {
        Self {
            page_size: Some(DEFAULT_PAGE_SIZE as i64),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Log {
    pub level: Option<String>,
    pub file: Option<String>,
}

impl Default for Log {
    fn default() -> Self {
        Self {
            level: Some(DEFAULT_LOG_LEVEL.to_owned()),
            file: None,
        }
    }
}

impl Config {
    pub fn default_path() -> Result<PathBuf> {
        if let Some(path) = env::var_os("SIMWATCH_CONFIG_PATH") {
            return Ok(PathBuf::from(path));
        }

        let config_root = dirs::config_dir().ok_or_else(|| {
            anyhow!("cannot resolve config directory; set SIMWATCH_CONFIG_PATH to the config file")
        })?;
        Ok(config_root.join(APP_NAME).join("config.toml"))
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let raw = fs::read_to_string(path)
            .with_context(|| format!("read config file {}", path.display()))?;
        let value: toml::Value = toml::from_str(&raw)
            .with_context(|| format!("parse TOML config {}", path.display()))?;

        let version = value
            .get("version")
            .and_then(toml::Value::as_integer)
            .ok_or_else(|| {
                anyhow!(
                    "config file {} has no version. Add `version = 1` and keep values under [server], [poll], [ui], and [log]",
                    path.display()
                )
            })?;

        if version != CONFIG_VERSION {
            bail!(
                "unsupported config version {} in {}; expected version = 1",
                version,
                path.display()
            );
        }

        let config: Config = value
            .try_into()
            .with_context(|| format!("decode config {}", path.display()))?;
        config.validate(path)?;
        Ok(config)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        if let Some(base_url) = &self.server.base_url {
            simwatch_client::base_url_from_page(base_url)
                .with_context(|| format!("invalid server.base_url in {}", path.display()))?;
        }

        for (key, raw) in [
            ("server.timeout", &self.server.timeout),
            ("poll.interval", &self.poll.interval),
            ("poll.max_backoff", &self.poll.max_backoff),
        ] {
            let Some(raw) = raw else {
                continue;
            };
            let parsed =
                parse_duration(raw).with_context(|| format!("{key} in {}", path.display()))?;
            if parsed <= Duration::ZERO {
                bail!("{key} in {} must be positive, got {raw}", path.display());
            }
            if parsed > MAX_DURATION {
                bail!(
                    "{key} in {} must be at most 24h (for example 1440m), got {raw}",
                    path.display()
                );
            }
        }

        if self.poll_interval()? > self.max_backoff()? {
            bail!(
                "poll.max_backoff in {} must not be shorter than poll.interval",
                path.display()
            );
        }

        if let Some(max_failures) = self.poll.max_failures
            && max_failures < 0
        {
            bail!(
                "poll.max_failures in {} must be non-negative, got {}",
                path.display(),
                max_failures
            );
        }

        if let Some(page_size) = self.ui.page_size
            && page_size <= 0
        {
            bail!(
                "ui.page_size in {} must be positive, got {}",
                path.display(),
                page_size
            );
        }

        if let Some(level) = &self.log.level
            && !LOG_LEVELS.contains(&level.to_ascii_lowercase().as_str())
        {
            bail!(
                "log.level in {} must be one of {}, got {level:?}",
                path.display(),
                LOG_LEVELS.join(", ")
            );
        }

        Ok(())
    }

    pub fn base_url(&self) -> &str {
        self.server
            .base_url
            .as_deref()
            .unwrap_or(DEFAULT_BASE_URL)
            .trim_end_matches('/')
    }

    pub fn timeout(&self) -> Result<Duration> {
        parse_duration(self.server.timeout.as_deref().unwrap_or(DEFAULT_TIMEOUT))
    }

    pub fn poll_interval(&self) -> Result<Duration> {
        match &self.poll.interval {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_POLL_INTERVAL),
        }
    }

    pub fn max_backoff(&self) -> Result<Duration> {
        match &self.poll.max_backoff {
            Some(raw) => parse_duration(raw),
            None => Ok(DEFAULT_MAX_BACKOFF),
        }
    }

    pub fn poll_policy(&self) -> Result<PollPolicy> {
        let max_failures = match self.poll.max_failures {
            Some(0) => None,
            Some(count) => Some(u32::try_from(count).unwrap_or(u32::MAX)),
            None => Some(DEFAULT_MAX_FAILURES),
        };
        Ok(PollPolicy {
            interval: self.poll_interval()?,
            max_backoff: self.max_backoff()?,
            max_failures,
        })
    }

    pub fn page_size(&self) -> usize {
        self.ui
            .page_size
            .and_then(|size| usize::try_from(size).ok())
            .unwrap_or(DEFAULT_PAGE_SIZE)
    }

    pub fn log_level(&self) -> &str {
        self.log.level.as_deref().unwrap_or(DEFAULT_LOG_LEVEL)
    }

    pub fn log_file(&self) -> Result<PathBuf> {
        if let Some(file) = &self.log.file {
            return Ok(PathBuf::from(file));
        }
        let state_root = dirs::state_dir()
            .or_else(dirs::cache_dir)
            .ok_or_else(|| anyhow!("cannot resolve a log directory; set [log].file"))?;
        Ok(state_root.join(APP_NAME).join("simwatch.log"))
    }

    pub fn example_config(path: &Path) -> String {
        format!(
            "# simwatch config\n# Place this file at: {}\n\nversion = 1\n\n[server]\n# Server root or any page under it, e.g. http://host/app/simulations/5/result\nbase_url = \"{}\"\ntimeout = \"{}\"\n\n[poll]\ninterval = \"{}\"\nmax_backoff = \"{}\"\n# Consecutive failures before polling pauses; 0 retries forever\nmax_failures = {}\n\n[ui]\npage_size = {}\n\n[log]\nlevel = \"{}\"\n# Optional. Default is the platform state dir (for example ~/.local/state/simwatch/simwatch.log)\n# file = \"/absolute/path/to/simwatch.log\"\n",
            path.display(),
            DEFAULT_BASE_URL,
            DEFAULT_TIMEOUT,
            DEFAULT_INTERVAL,
            DEFAULT_MAX_BACKOFF_RAW,
            DEFAULT_MAX_FAILURES,
            DEFAULT_PAGE_SIZE,
            DEFAULT_LOG_LEVEL,
        )
    }
}

pub fn parse_duration(raw: &str) -> Result<Duration> {
    let raw = raw.trim();
    if let Some(value) = raw.strip_suffix("ms") {
        let millis: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_millis(millis));
    }
    if let Some(value) = raw.strip_suffix('s') {
        let secs: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(secs));
    }
    if let Some(value) = raw.strip_suffix('m') {
        let mins: u64 = value
            .parse()
            .with_context(|| format!("invalid duration {raw:?}"))?;
        return Ok(Duration::from_secs(mins.saturating_mul(60)));
    }

    bail!("invalid duration {raw:?}; use one of: <N>ms, <N>s, <N>m (for example 500ms or 5s)")
}

#[cfg(test)]
mod tests {
    use super::{Config, parse_duration};
    use anyhow::Result;
    use simwatch_testkit::temp_config_path;
    use std::path::PathBuf;
    use std::sync::{Mutex, OnceLock};
    use std::time::Duration;

    fn write_config(content: &str) -> Result<(tempfile::TempDir, PathBuf)> {
        let (temp, path) = temp_config_path()?;
        std::fs::write(&path, content)?;
        Ok((temp, path))
    }

    fn env_lock() -> std::sync::MutexGuard<'static, ()> {
        static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        match ENV_LOCK.get_or_init(|| Mutex::new(())).lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    #[test]
    fn missing_config_uses_defaults() -> Result<()> {
        let temp = tempfile::tempdir()?;
        let config = Config::load(&temp.path().join("missing.toml"))?;
        assert_eq!(config.version, 1);
        assert_eq!(config.base_url(), "http://localhost:8000");
        assert_eq!(config.timeout()?, Duration::from_secs(30));
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.log_level(), "info");

        let policy = config.poll_policy()?;
        assert_eq!(policy.interval, Duration::from_millis(3000));
        assert_eq!(policy.max_backoff, Duration::from_secs(60));
        assert_eq!(policy.max_failures, Some(20));
        Ok(())
    }

    #[test]
    fn unversioned_config_is_rejected_with_actionable_message() -> Result<()> {
        let (_temp, path) = write_config("[server]\nbase_url = \"http://host\"\n")?;
        let error = Config::load(&path).expect_err("unversioned config should fail");
        let message = error.to_string();
        assert!(message.contains("version = 1"));
        assert!(message.contains("[server], [poll], [ui], and [log]"));
        Ok(())
    }

    #[test]
    fn full_config_parses() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[server]\nbase_url = \"http://host/app/\"\ntimeout = \"5s\"\n[poll]\ninterval = \"500ms\"\nmax_backoff = \"2m\"\nmax_failures = 0\n[ui]\npage_size = 4\n[log]\nlevel = \"debug\"\nfile = \"/tmp/simwatch.log\"\n",
        )?;

        let config = Config::load(&path)?;
        assert_eq!(config.base_url(), "http://host/app");
        assert_eq!(config.timeout()?, Duration::from_secs(5));
        assert_eq!(config.page_size(), 4);
        assert_eq!(config.log_level(), "debug");
        assert_eq!(config.log_file()?, PathBuf::from("/tmp/simwatch.log"));

        let policy = config.poll_policy()?;
        assert_eq!(policy.interval, Duration::from_millis(500));
        assert_eq!(policy.max_backoff, Duration::from_secs(120));
        assert_eq!(policy.max_failures, None);
        Ok(())
    }

    #[test]
    fn malformed_config_returns_parse_error() -> Result<()> {
        let (_temp, path) = write_config("{{not toml")?;
        let error = Config::load(&path).expect_err("malformed config should fail");
        assert!(error.to_string().contains("parse TOML config"));
        Ok(())
    }

    #[test]
    fn unsupported_config_version_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 2\n")?;
        let error = Config::load(&path).expect_err("v2 config should fail");
        assert!(error.to_string().contains("unsupported config version 2"));
        Ok(())
    }

    #[test]
    fn default_path_honors_env_override() -> Result<()> {
        let _guard = env_lock();
        let temp = tempfile::tempdir()?;
        let override_path = temp.path().join("custom-config.toml");
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::set_var("SIMWATCH_CONFIG_PATH", &override_path);
        }
        let resolved = Config::default_path()?;
        // SAFETY: test cleanup for process-local env mutation.
        unsafe {
            std::env::remove_var("SIMWATCH_CONFIG_PATH");
        }
        assert_eq!(resolved, override_path);
        Ok(())
    }

    #[test]
    fn default_path_uses_config_toml_suffix_when_no_env_override() -> Result<()> {
        let _guard = env_lock();
        // SAFETY: test-only process-local env mutation.
        unsafe {
            std::env::remove_var("SIMWATCH_CONFIG_PATH");
        }
        let path = Config::default_path()?;
        assert!(path.ends_with("simwatch/config.toml"));
        Ok(())
    }

    #[test]
    fn non_http_base_url_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\nbase_url = \"ftp://host\"\n")?;
        let error = Config::load(&path).expect_err("ftp base url should fail");
        assert!(format!("{error:#}").contains("http or https"));
        Ok(())
    }

    #[test]
    fn durations_parse_ms_seconds_and_minutes() -> Result<()> {
        assert_eq!(parse_duration("500ms")?, Duration::from_millis(500));
        assert_eq!(parse_duration("5s")?, Duration::from_secs(5));
        assert_eq!(parse_duration("2m")?, Duration::from_secs(120));
        Ok(())
    }

    #[test]
    fn invalid_duration_is_rejected() {
        let error = parse_duration("oops").expect_err("invalid duration should fail");
        assert!(error.to_string().contains("invalid duration"));
    }

    #[test]
    fn zero_timeout_is_rejected() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[server]\ntimeout = \"0s\"\n")?;
        let error = Config::load(&path).expect_err("zero timeout should fail");
        assert!(error.to_string().contains("server.timeout"));
        assert!(error.to_string().contains("must be positive"));
        Ok(())
    }

    #[test]
    fn durations_longer_than_a_day_are_rejected() -> Result<()> {
        let (_temp, path) = write_config(
            "version = 1\n[poll]\ninterval = \"18446744073709551615s\"\nmax_backoff = \"18446744073709551615s\"\n",
        )?;
        let error = Config::load(&path).expect_err("huge interval should fail");
        assert!(error.to_string().contains("poll.interval"));
        assert!(error.to_string().contains("at most 24h"));

        let (_temp, path) = write_config("version = 1\n[poll]\nmax_backoff = \"1440m\"\n")?;
        assert_eq!(Config::load(&path)?.max_backoff()?, Duration::from_secs(86_400));
        Ok(())
    }

    #[test]
    fn backoff_shorter_than_interval_is_rejected() -> Result<()> {
        let (_temp, path) =
            write_config("version = 1\n[poll]\ninterval = \"10s\"\nmax_backoff = \"5s\"\n")?;
        let error = Config::load(&path).expect_err("short backoff should fail");
        assert!(error.to_string().contains("poll.max_backoff"));
        Ok(())
    }

    #[test]
    fn ui_and_log_values_are_validated() -> Result<()> {
        let (_temp, path) = write_config("version = 1\n[ui]\npage_size = 0\n")?;
        let error = Config::load(&path).expect_err("zero page size should fail");
        assert!(error.to_string().contains("ui.page_size"));

        let (_temp, path) = write_config("version = 1\n[log]\nlevel = \"loud\"\n")?;
        let error = Config::load(&path).expect_err("unknown level should fail");
        assert!(error.to_string().contains("log.level"));

        let (_temp, path) = write_config("version = 1\n[poll]\nmax_failures = -1\n")?;
        let error = Config::load(&path).expect_err("negative failures should fail");
        assert!(error.to_string().contains("must be non-negative"));
        Ok(())
    }

    #[test]
    fn example_config_round_trips_through_load() -> Result<()> {
        let (_temp, path) = temp_config_path()?;
        let example = Config::example_config(&path);
        assert!(example.contains("version = 1"));
        for section in ["[server]", "[poll]", "[ui]", "[log]"] {
            assert!(example.contains(section), "missing {section}");
        }

        std::fs::write(&path, &example)?;
        let config = Config::load(&path)?;
        assert_eq!(config.page_size(), 10);
        assert_eq!(config.poll_policy()?.max_failures, Some(20));
        Ok(())
    }
}
