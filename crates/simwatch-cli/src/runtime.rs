// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result};
use simwatch_app::{JobId, PollRequest, ResultPayload, SimulationStatus};
use simwatch_client::Client;
use simwatch_tui::{DashboardRuntime, InternalEvent};
use std::sync::mpsc::Sender;
use std::thread;

pub struct HttpRuntime {
    client: Client,
}

impl HttpRuntime {
    pub fn new(client: Client) -> Self {
        Self { client }
    }
}

impl DashboardRuntime for HttpRuntime {
    fn fetch_statuses(
        &mut self,
        skip_update: bool,
        ids: &[JobId],
    ) -> Result<Vec<SimulationStatus>> {
        self.client.fetch_statuses(skip_update, ids)
    }

    fn fetch_results(&mut self, job: JobId) -> Result<ResultPayload> {
        self.client.fetch_results(job)
    }

    fn spawn_status_poll(&mut self, request: PollRequest, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name(format!("status-poll-{}", request.generation))
            .spawn(move || {
                let result = client
                    .fetch_statuses(request.skip_update, &request.ids)
                    .map_err(|error| format!("{error:#}"));
                if let Err(error) = &result {
                    tracing::warn!(generation = request.generation, %error, "status poll failed");
                }
                let _ = tx.send(InternalEvent::StatusPolled {
                    generation: request.generation,
                    result,
                });
            })
            .context("spawn status poll thread")?;
        Ok(())
    }

    fn spawn_results_download(&mut self, job: JobId, tx: Sender<InternalEvent>) -> Result<()> {
        let client = self.client.clone();
        thread::Builder::new()
            .name(format!("results-{job}"))
            .spawn(move || {
                let result = client
                    .fetch_results(job)
                    .map_err(|error| format!("{error:#}"));
                match &result {
                    Ok(_) => tracing::info!(%job, "results downloaded"),
                    Err(error) => tracing::warn!(%job, %error, "results download failed"),
                }
                let _ = tx.send(InternalEvent::ResultsLoaded { job, result });
            })
            .context("spawn results download thread")?;
        Ok(())
    }
}
