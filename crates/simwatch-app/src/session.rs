// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;
use std::time::Instant;

use time::OffsetDateTime;

use crate::{
    AxisBounds, ChartRenderer, ChartView, GraphData, GraphDataStore, HoverInfo, JobId,
    LegendEntry, LegendToggle, PollPolicy, PollRequest, ProgressBar, ProgressPresenter,
    RenderFrame, ResultPayload, SeriesRef, SimulationStatus, StatusPoller, SwitchControl,
    ViewState, ViewSwitcher, ZoomController,
};

pub const DEFAULT_PAGE_SIZE: usize = 10;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub job: JobId,
    pub text: String,
    pub received_at: OffsetDateTime,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobPager {
    jobs: Vec<JobId>,
    page_size: usize,
    page: usize,
}

impl JobPager {
    pub fn new(jobs: impl IntoIterator<Item = JobId>, page_size: usize) -> Self {
        let mut unique = Vec::new();
        for job in jobs {
            if !unique.contains(&job) {
                unique.push(job);
            }
        }
        Self {
            jobs: unique,
            page_size: page_size.max(1),
            page: 0,
        }
    }

    pub fn jobs(&self) -> &[JobId] {
        &self.jobs
    }

    pub fn page(&self) -> usize {
        self.page
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn page_count(&self) -> usize {
        self.jobs.len().div_ceil(self.page_size).max(1)
    }

    pub fn current_ids(&self) -> &[JobId] {
        let start = (self.page * self.page_size).min(self.jobs.len());
        let end = (start + self.page_size).min(self.jobs.len());
        &self.jobs[start..end]
    }

    pub fn next(&mut self) -> bool {
        if self.page + 1 >= self.page_count() {
            return false;
        }
        self.page += 1;
        true
    }

    pub fn prev(&mut self) -> bool {
        if self.page == 0 {
            return false;
        }
        self.page -= 1;
        true
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionCommand {
    SelectJob(JobId),
    NextPage,
    PrevPage,
    Refresh,
    ActivateView(ChartView),
    NextView,
    PrevView,
    ToggleSeries(SeriesRef),
    ToggleConfidence(String),
    Zoom(AxisBounds),
    ResetZoom,
    DismissNotifications,
    SetStatus(String),
    ClearStatus,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    PollStarted(PollRequest),
    DownloadRequested(JobId),
    Rerender(ChartView),
    ViewActivated(ChartView),
    JobSelected(JobId),
    PageChanged(usize),
    NotificationsDismissed,
    StatusUpdated(String),
    StatusCleared,
}

#[derive(Debug, Clone)]
pub struct Session {
    poller: StatusPoller,
    progress: ProgressPresenter,
    graphs: GraphDataStore,
    views: BTreeMap<JobId, ViewState>,
    pager: JobPager,
    selected: Option<JobId>,
    last_loaded: Option<JobId>,
    notifications: Vec<Notification>,
    status_line: Option<String>,
}

impl Session {
    pub fn new(jobs: impl IntoIterator<Item = JobId>, policy: PollPolicy, page_size: usize) -> Self {
        Self {
            poller: StatusPoller::new(policy),
            progress: ProgressPresenter::default(),
            graphs: GraphDataStore::default(),
            views: BTreeMap::new(),
            pager: JobPager::new(jobs, page_size),
            selected: None,
            last_loaded: None,
            notifications: Vec::new(),
            status_line: None,
        }
    }

    pub fn start(&mut self) -> Vec<SessionEvent> {
        let ids = self.pager.current_ids().to_vec();
        self.progress.track(&ids);
        match self.poller.start(&ids) {
            Some(request) => vec![SessionEvent::PollStarted(request)],
            None => vec![self.set_status("no jobs to watch")],
        }
    }

    pub fn poll_due(&mut self, now: Instant) -> Option<PollRequest> {
        self.poller.poll_due(now)
    }

    pub fn apply_poll_response(
        &mut self,
        generation: u64,
        statuses: Vec<SimulationStatus>,
        now: Instant,
    ) -> Vec<SessionEvent> {
        let outcome = self.poller.apply_response(generation, statuses, now);
        if outcome.stale {
            return Vec::new();
        }

        for status in &outcome.applied {
            self.progress.apply(status);
        }
        let mut events = outcome
            .succeeded
            .iter()
            .filter(|job| self.graphs.begin_load(**job))
            .map(|job| SessionEvent::DownloadRequested(*job))
            .collect::<Vec<_>>();
        if let Some(job) = outcome.failed.last() {
            events.push(self.set_status(format!("simulation {job} failed")));
        }
        events
    }

    pub fn apply_poll_failure(
        &mut self,
        generation: u64,
        error: &str,
        now: Instant,
    ) -> Vec<SessionEvent> {
        let outcome = self.poller.apply_failure(generation, error, now);
        if outcome.stale {
            return Vec::new();
        }
        if outcome.paused {
            let failures = self.poller.consecutive_failures();
            return vec![self.set_status(format!(
                "status polling paused after {failures} failures; press g to retry"
            ))];
        }
        match outcome.next_poll {
            Some(due) => {
                let delay = due.saturating_duration_since(now);
                vec![self.set_status(format!(
                    "status poll failed; retrying in {}s",
                    delay.as_secs()
                ))]
            }
            None => vec![self.set_status("status poll failed; press g to retry".to_owned())],
        }
    }

    pub fn apply_results(
        &mut self,
        job: JobId,
        payload: ResultPayload,
        received_at: OffsetDateTime,
    ) -> Vec<SessionEvent> {
        if self.graphs.is_loaded(job) {
            return Vec::new();
        }
        self.graphs.install(job, &payload);
        let Some(data) = self.graphs.get(job) else {
            return Vec::new();
        };
        self.views.insert(job, ViewState::for_data(data));
        self.notifications
            .extend(payload.messages.into_iter().map(|text| Notification {
                job,
                text,
                received_at,
            }));
        self.last_loaded = Some(job);

        let mut events = vec![self.set_status(format!("results for job {job} loaded"))];
        if self.displayed_job() == Some(job)
            && let Some(view) = self.active_view()
        {
            events.push(SessionEvent::Rerender(view));
        }
        events
    }

    pub fn apply_results_failure(&mut self, job: JobId, error: &str) -> Vec<SessionEvent> {
        self.graphs.abandon(job);
        tracing::warn!(%job, error, "results download failed");
        vec![self.set_status(format!(
            "could not download results for job {job}: {error} (press g to retry)"
        ))]
    }

    pub fn dispatch(&mut self, command: SessionCommand) -> Vec<SessionEvent> {
        match command {
            SessionCommand::SelectJob(job) => {
                self.selected = Some(job);
                let mut events = vec![SessionEvent::JobSelected(job)];
                if self.graphs.is_loaded(job) {
                    if let Some(view) = self.active_view() {
                        events.push(SessionEvent::Rerender(view));
                    }
                } else {
                    events.push(self.set_status(format!("job {job} has no results yet")));
                }
                events
            }
            SessionCommand::NextPage => {
                let moved = self.pager.next();
                self.change_page(moved)
            }
            SessionCommand::PrevPage => {
                let moved = self.pager.prev();
                self.change_page(moved)
            }
            SessionCommand::Refresh => {
                let mut events = self.start();
                events.push(self.set_status("refreshing"));
                events
            }
            SessionCommand::ActivateView(view) => self.with_view(|data, state| {
                ViewSwitcher::activate(data, state, view).into_iter().collect()
            }),
            SessionCommand::NextView => self.with_view(|data, state| {
                ViewSwitcher::cycle(data, state, 1).into_iter().collect()
            }),
            SessionCommand::PrevView => self.with_view(|data, state| {
                ViewSwitcher::cycle(data, state, -1).into_iter().collect()
            }),
            SessionCommand::ToggleSeries(series) => self.with_data(|data| {
                LegendToggle::toggle(data, series).into_iter().collect()
            }),
            SessionCommand::ToggleConfidence(percentage) => {
                self.with_data(|data| LegendToggle::toggle_confidence(data, &percentage))
            }
            SessionCommand::Zoom(rect) => {
                let Some(view) = self.active_view() else {
                    return Vec::new();
                };
                self.with_zoom(|data, state| ZoomController::select(data, state, view, rect))
            }
            SessionCommand::ResetZoom => {
                let Some(view) = self.active_view() else {
                    return Vec::new();
                };
                self.with_zoom(|_, state| ZoomController::reset(state, view))
            }
            SessionCommand::DismissNotifications => {
                self.notifications.clear();
                vec![SessionEvent::NotificationsDismissed]
            }
            SessionCommand::SetStatus(text) => vec![self.set_status(text)],
            SessionCommand::ClearStatus => {
                self.status_line = None;
                vec![SessionEvent::StatusCleared]
            }
        }
    }

    fn change_page(&mut self, moved: bool) -> Vec<SessionEvent> {
        if !moved {
            return Vec::new();
        }
        self.selected = None;
        let mut events = vec![SessionEvent::PageChanged(self.pager.page())];
        events.extend(self.start());
        events
    }

    fn with_view(
        &mut self,
        apply: impl FnOnce(&GraphData, &mut ViewState) -> Vec<ChartView>,
    ) -> Vec<SessionEvent> {
        let Some(job) = self.displayed_job() else {
            return Vec::new();
        };
        let (Some(data), Some(state)) = (self.graphs.get(job), self.views.get_mut(&job)) else {
            return Vec::new();
        };
        apply(data, state)
            .into_iter()
            .flat_map(|view| [SessionEvent::ViewActivated(view), SessionEvent::Rerender(view)])
            .collect()
    }

    fn with_data(&mut self, apply: impl FnOnce(&mut GraphData) -> Vec<ChartView>) -> Vec<SessionEvent> {
        let Some(job) = self.displayed_job() else {
            return Vec::new();
        };
        let Some(data) = self.graphs.get_mut(job) else {
            return Vec::new();
        };
        apply(data).into_iter().map(SessionEvent::Rerender).collect()
    }

    fn with_zoom(
        &mut self,
        apply: impl FnOnce(&GraphData, &mut ViewState) -> Option<ChartView>,
    ) -> Vec<SessionEvent> {
        let Some(job) = self.displayed_job() else {
            return Vec::new();
        };
        let (Some(data), Some(state)) = (self.graphs.get(job), self.views.get_mut(&job)) else {
            return Vec::new();
        };
        apply(data, state)
            .map(SessionEvent::Rerender)
            .into_iter()
            .collect()
    }

    fn set_status(&mut self, text: impl Into<String>) -> SessionEvent {
        let text = text.into();
        self.status_line = Some(text.clone());
        SessionEvent::StatusUpdated(text)
    }

    pub fn pager(&self) -> &JobPager {
        &self.pager
    }

    pub fn poller(&self) -> &StatusPoller {
        &self.poller
    }

    pub fn graphs(&self) -> &GraphDataStore {
        &self.graphs
    }

    pub fn status(&self, job: JobId) -> Option<&SimulationStatus> {
        self.poller.status(job)
    }

    pub fn progress(&self, job: JobId) -> Option<&ProgressBar> {
        self.progress.bar(job)
    }

    pub fn notifications(&self) -> &[Notification] {
        &self.notifications
    }

    pub fn status_line(&self) -> Option<&str> {
        self.status_line.as_deref()
    }

    pub fn selected_job(&self) -> Option<JobId> {
        self.selected
    }

    pub fn displayed_job(&self) -> Option<JobId> {
        self.selected
            .filter(|job| self.graphs.is_loaded(*job))
            .or(self.last_loaded)
    }

    pub fn displayed_graph(&self) -> Option<&GraphData> {
        self.graphs.get(self.displayed_job()?)
    }

    pub fn view_state(&self) -> Option<&ViewState> {
        self.views.get(&self.displayed_job()?)
    }

    pub fn active_view(&self) -> Option<ChartView> {
        self.view_state()?.active()
    }

    pub fn render_frame(&self) -> Option<RenderFrame> {
        let view = self.active_view()?;
        ChartRenderer::render(view, self.displayed_graph()?, self.view_state()?)
    }

    pub fn hover(&self, pointer: (f64, f64)) -> Option<HoverInfo> {
        let view = self.active_view()?;
        ZoomController::hover(self.displayed_graph()?, self.view_state()?, view, pointer)
    }

    pub fn legend(&self) -> Vec<LegendEntry> {
        match (self.active_view(), self.displayed_graph()) {
            (Some(view), Some(data)) => LegendToggle::entries(data, view),
            _ => Vec::new(),
        }
    }

    pub fn switch_controls(&self) -> Vec<SwitchControl> {
        match (self.displayed_graph(), self.view_state()) {
            (Some(data), Some(state)) => ViewSwitcher::controls(data, state),
            _ => Vec::new(),
        }
    }
}
