// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::time::{Duration, Instant};

use crate::{JobId, JobStatus, SimulationStatus};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_BACKOFF: Duration = Duration::from_secs(60);
pub const DEFAULT_MAX_FAILURES: u32 = 20;

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollSet {
    ids: Vec<JobId>,
}

impl PollSet {
    pub fn from_ids(ids: impl IntoIterator<Item = JobId>) -> Self {
        let mut set = Self::default();
        for id in ids {
            set.insert(id);
        }
        set
    }

    pub fn insert(&mut self, id: JobId) -> bool {
        if self.contains(id) {
            return false;
        }
        self.ids.push(id);
        true
    }

    pub fn remove(&mut self, id: JobId) -> bool {
        let before = self.ids.len();
        self.ids.retain(|existing| *existing != id);
        self.ids.len() != before
    }

    pub fn contains(&self, id: JobId) -> bool {
        self.ids.contains(&id)
    }

    pub fn ids(&self) -> &[JobId] {
        &self.ids
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    pub interval: Duration,
    pub max_backoff: Duration,
    /// Consecutive failures after which polling pauses. `None` never pauses.
    pub max_failures: Option<u32>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            max_backoff: DEFAULT_MAX_BACKOFF,
            max_failures: Some(DEFAULT_MAX_FAILURES),
        }
    }
}

impl PollPolicy {
    pub fn retry_delay(&self, failures: u32) -> Duration {
        if failures == 0 {
            return self.interval;
        }
        let factor = 2_u32.saturating_pow(failures - 1);
        self.interval
            .saturating_mul(factor)
            .min(self.max_backoff.max(self.interval))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRequest {
    pub generation: u64,
    pub skip_update: bool,
    pub ids: Vec<JobId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerState {
    Idle,
    Scheduled { due: Instant },
    InFlight,
    Paused,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct PollOutcome {
    pub applied: Vec<SimulationStatus>,
    pub succeeded: Vec<JobId>,
    pub failed: Vec<JobId>,
    pub next_poll: Option<Instant>,
    pub stale: bool,
    pub paused: bool,
}

#[derive(Debug, Clone)]
pub struct StatusPoller {
    policy: PollPolicy,
    poll_set: PollSet,
    statuses: BTreeMap<JobId, SimulationStatus>,
    generation: u64,
    state: PollerState,
    consecutive_failures: u32,
}

impl StatusPoller {
    pub fn new(policy: PollPolicy) -> Self {
        Self {
            policy,
            poll_set: PollSet::default(),
            statuses: BTreeMap::new(),
            generation: 0,
            state: PollerState::Idle,
            consecutive_failures: 0,
        }
    }

    pub fn policy(&self) -> PollPolicy {
        self.policy
    }

    pub fn poll_set(&self) -> &PollSet {
        &self.poll_set
    }

    pub fn state(&self) -> PollerState {
        self.state
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.consecutive_failures
    }

    pub fn status(&self, id: JobId) -> Option<&SimulationStatus> {
        self.statuses.get(&id)
    }

    pub fn is_paused(&self) -> bool {
        self.state == PollerState::Paused
    }

    /// Replaces the poll set and issues an immediate poll. Any scheduled poll
    /// is cancelled and any in-flight response becomes stale.
    pub fn start(&mut self, ids: &[JobId]) -> Option<PollRequest> {
        self.generation = self.generation.wrapping_add(1);
        self.poll_set = PollSet::from_ids(ids.iter().copied());
        self.consecutive_failures = 0;

        if self.poll_set.is_empty() {
            self.state = PollerState::Idle;
            tracing::debug!(generation = self.generation, "no jobs to poll");
            return None;
        }

        self.state = PollerState::InFlight;
        tracing::debug!(
            generation = self.generation,
            jobs = self.poll_set.len(),
            "starting status poll"
        );
        Some(self.request(true))
    }

    pub fn poll_due(&mut self, now: Instant) -> Option<PollRequest> {
        match self.state {
            PollerState::Scheduled { due } if now >= due => {
                self.state = PollerState::InFlight;
                Some(self.request(false))
            }
            _ => None,
        }
    }

    pub fn apply_response(
        &mut self,
        generation: u64,
        statuses: Vec<SimulationStatus>,
        now: Instant,
    ) -> PollOutcome {
        if !self.accepts(generation) {
            tracing::debug!(generation, current = self.generation, "dropping stale poll response");
            return PollOutcome {
                stale: true,
                ..PollOutcome::default()
            };
        }

        self.consecutive_failures = 0;
        let mut outcome = PollOutcome::default();
        for status in statuses {
            if !self.poll_set.contains(status.id) {
                tracing::debug!(job = %status.id, "ignoring status for job outside the poll set");
                continue;
            }

            match status.status {
                JobStatus::Success => {
                    self.poll_set.remove(status.id);
                    outcome.succeeded.push(status.id);
                    tracing::info!(job = %status.id, "simulation finished");
                }
                JobStatus::Failed => {
                    self.poll_set.remove(status.id);
                    outcome.failed.push(status.id);
                    tracing::info!(job = %status.id, "simulation failed");
                }
                JobStatus::Pending | JobStatus::Running => {}
            }
            self.statuses.insert(status.id, status.clone());
            outcome.applied.push(status);
        }

        outcome.next_poll = self.schedule(now, self.policy.interval);
        outcome
    }

    pub fn apply_failure(&mut self, generation: u64, error: &str, now: Instant) -> PollOutcome {
        if !self.accepts(generation) {
            return PollOutcome {
                stale: true,
                ..PollOutcome::default()
            };
        }

        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        tracing::warn!(
            failures = self.consecutive_failures,
            error,
            "status poll failed"
        );

        if let Some(limit) = self.policy.max_failures
            && self.consecutive_failures >= limit
        {
            self.state = PollerState::Paused;
            tracing::warn!(limit, "status polling paused");
            return PollOutcome {
                paused: true,
                ..PollOutcome::default()
            };
        }

        let delay = self.policy.retry_delay(self.consecutive_failures);
        PollOutcome {
            next_poll: self.schedule(now, delay),
            ..PollOutcome::default()
        }
    }

    fn accepts(&self, generation: u64) -> bool {
        generation == self.generation && self.state == PollerState::InFlight
    }

    fn schedule(&mut self, now: Instant, delay: Duration) -> Option<Instant> {
        if self.poll_set.is_empty() {
            self.state = PollerState::Idle;
            tracing::debug!("all jobs terminal; polling stopped");
            return None;
        }
        let Some(due) = now.checked_add(delay) else {
            self.state = PollerState::Idle;
            tracing::warn!(?delay, "poll delay out of range; polling stopped");
            return None;
        };
        self.state = PollerState::Scheduled { due };
        Some(due)
    }

    fn request(&self, skip_update: bool) -> PollRequest {
        PollRequest {
            generation: self.generation,
            skip_update,
            ids: self.poll_set.ids().to_vec(),
        }
    }
}
