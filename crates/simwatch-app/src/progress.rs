// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::{JobId, JobStatus, SimulationStatus};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProgressState {
    Active,
    Complete,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProgressBar {
    pub value: Option<u8>,
    pub state: ProgressState,
    pub label: String,
}

impl Default for ProgressBar {
    fn default() -> Self {
        Self {
            value: None,
            state: ProgressState::Active,
            label: String::new(),
        }
    }
}

impl ProgressBar {
    pub fn percent(&self) -> u16 {
        match self.state {
            ProgressState::Failed => 0,
            _ => u16::from(self.value.unwrap_or(0)),
        }
    }
}

pub fn present(status: &SimulationStatus, prior: &ProgressBar) -> ProgressBar {
    let label = status.progress_text.clone();
    match status.status {
        JobStatus::Success => ProgressBar {
            value: Some(100),
            state: ProgressState::Complete,
            label,
        },
        JobStatus::Failed => ProgressBar {
            value: None,
            state: ProgressState::Failed,
            label,
        },
        JobStatus::Pending | JobStatus::Running => ProgressBar {
            value: parse_progress_percent(&status.progress_text).or(prior.value),
            state: ProgressState::Active,
            label,
        },
    }
}

/// Reads the leading number of texts like `"42% completed"`, truncated and
/// clamped to `0..=100`. Texts without a numeric prefix yield `None`.
pub fn parse_progress_percent(text: &str) -> Option<u8> {
    let trimmed = text.trim_start();
    let mut end = 0;
    let mut seen_digit = false;
    let mut seen_dot = false;
    for (index, ch) in trimmed.char_indices() {
        match ch {
            '-' | '+' if index == 0 => {}
            '.' if !seen_dot => seen_dot = true,
            digit if digit.is_ascii_digit() => seen_digit = true,
            _ => break,
        }
        end = index + ch.len_utf8();
    }
    if !seen_digit {
        return None;
    }

    let value: f64 = trimmed[..end].trim_end_matches('.').parse().ok()?;
    Some(value.trunc().clamp(0.0, 100.0) as u8)
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ProgressPresenter {
    bars: BTreeMap<JobId, ProgressBar>,
}

impl ProgressPresenter {
    pub fn track(&mut self, ids: &[JobId]) {
        for id in ids {
            self.bars.entry(*id).or_default();
        }
    }

    pub fn apply(&mut self, status: &SimulationStatus) -> &ProgressBar {
        let bar = self.bars.entry(status.id).or_default();
        *bar = present(status, bar);
        bar
    }

    pub fn bar(&self, id: JobId) -> Option<&ProgressBar> {
        self.bars.get(&id)
    }

    pub fn value(&self, id: JobId) -> Option<u8> {
        self.bars.get(&id).and_then(|bar| bar.value)
    }
}
