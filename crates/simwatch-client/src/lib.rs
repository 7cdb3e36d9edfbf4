// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, anyhow, bail};
use reqwest::StatusCode;
use reqwest::blocking::Client as HttpClient;
use serde::Deserialize;
use simwatch_app::{JobId, ResultPayload, ResultSource, SimulationStatus, StatusRecord};
use std::time::Duration;
use url::Url;

pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct Client {
    base_url: String,
    timeout: Duration,
    http: HttpClient,
}

impl Client {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let base_url = base_url_from_page(base_url)?;
        let http = HttpClient::builder()
            .timeout(timeout)
            .build()
            .context("build HTTP client")?;

        Ok(Self {
            base_url,
            timeout,
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn status_url(&self, skip_update: bool, ids: &[JobId]) -> String {
        let ids = ids
            .iter()
            .map(JobId::to_string)
            .collect::<Vec<_>>()
            .join("/");
        format!("{}/simulations/status/{skip_update}/{ids}", self.base_url)
    }

    pub fn results_url(&self, job: JobId) -> String {
        format!("{}/simulations/{job}/data", self.base_url)
    }

    pub fn fetch_statuses(
        &self,
        skip_update: bool,
        ids: &[JobId],
    ) -> Result<Vec<SimulationStatus>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let url = self.status_url(skip_update, ids);
        tracing::debug!(%url, "fetching statuses");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        let records: Vec<StatusRecord> = response.json().context("decode status response")?;
        Ok(records.into_iter().map(StatusRecord::into_status).collect())
    }

    pub fn fetch_results(&self, job: JobId) -> Result<ResultPayload> {
        let url = self.results_url(job);
        tracing::debug!(%url, "fetching results");
        let response = self
            .http
            .get(&url)
            .send()
            .map_err(|error| connection_error(&self.base_url, error))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().unwrap_or_default();
            return Err(clean_error_response(status, &body));
        }

        response
            .json()
            .with_context(|| format!("decode results of job {job}"))
    }
}

impl ResultSource for Client {
    fn fetch_results(&mut self, job: JobId) -> Result<ResultPayload> {
        Client::fetch_results(self, job)
    }
}

/// Accepts either a server base URL or any page URL under it and returns the
/// base without a trailing slash. `http://host/app/simulations/5/result`
/// becomes `http://host/app`.
pub fn base_url_from_page(raw: &str) -> Result<String> {
    let raw = raw.trim();
    if raw.is_empty() {
        bail!("server.base_url must not be empty");
    }

    let mut url = Url::parse(raw).with_context(|| format!("parse server url {raw:?}"))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!(
            "server url {raw:?} must use http or https, got {:?}",
            url.scheme()
        );
    }

    let path = url.path().to_owned();
    let base_path = match path.find("/simulations/") {
        Some(index) => &path[..index],
        None => path.strip_suffix("/simulations").unwrap_or(&path),
    };
    url.set_path(base_path.trim_end_matches('/'));
    url.set_query(None);
    url.set_fragment(None);

    Ok(url.as_str().trim_end_matches('/').to_owned())
}

fn connection_error(base_url: &str, error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!(
            "request to {base_url} timed out -- raise [server].timeout in the config ({error})"
        );
    }
    anyhow!("cannot reach {base_url} -- check the server is running and --url is correct ({error})")
}

#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    #[serde(default)]
    detail: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

fn clean_error_response(status: StatusCode, body: &str) -> anyhow::Error {
    if let Ok(parsed) = serde_json::from_str::<ErrorEnvelope>(body)
        && let Some(message) = parsed.detail.or(parsed.error)
        && !message.is_empty()
    {
        return anyhow!("server error ({}): {}", status.as_u16(), message);
    }

    let trimmed = body.trim();
    if !trimmed.is_empty() && trimmed.len() < 100 && !trimmed.contains('<') && !trimmed.contains('{')
    {
        return anyhow!("server error ({}): {}", status.as_u16(), trimmed);
    }

    anyhow!("server returned {}", status.as_u16())
}
