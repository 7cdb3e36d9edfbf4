// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Result, anyhow, bail};
use std::collections::BTreeMap;

use crate::{
    AxisBounds, AxisConfig, AxisScale, ChartView, ColorValue, JobId, ResultPayload, Series,
    SeriesRef,
};

pub const AUTOSCALE_MARGIN: f64 = 0.05;

pub trait ResultSource {
    fn fetch_results(&mut self, job: JobId) -> Result<ResultPayload>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct ViewData {
    pub series: Vec<Series>,
    pub axis: AxisConfig,
}

impl ViewData {
    fn from_payload(payload: &ResultPayload, view: ChartView) -> Self {
        let series = payload
            .series_for(view)
            .iter()
            .enumerate()
            .map(|(index, record)| Series {
                label: record.label.clone(),
                points: record.points(),
                color_index: color_index_for(view, index, record.color.as_ref()),
                enabled: record.enabled.unwrap_or(true),
            })
            .collect::<Vec<_>>();

        let (mut x, mut y, show_points) = view.default_axes();
        if let Some(axis_override) = payload.axis_override(view) {
            if let Some(scale) = parse_scale_override(axis_override.x_scale.as_deref(), view) {
                x.scale = scale;
            }
            if let Some(scale) = parse_scale_override(axis_override.y_scale.as_deref(), view) {
                y.scale = scale;
            }
        }

        let baseline = baseline_bounds(&series, x.scale, y.scale);
        Self {
            series,
            axis: AxisConfig {
                x,
                y,
                show_points,
                baseline,
            },
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.series.iter().any(Series::has_points)
    }
}

fn color_index_for(view: ChartView, index: usize, color: Option<&ColorValue>) -> usize {
    if view == ChartView::Traces {
        return index;
    }
    match color {
        Some(ColorValue::Index(value)) if *value >= 0 => *value as usize,
        _ => index,
    }
}

fn parse_scale_override(raw: Option<&str>, view: ChartView) -> Option<AxisScale> {
    let raw = raw?;
    let scale = AxisScale::parse(raw);
    if scale.is_none() {
        tracing::warn!(view = view.payload_key(), scale = raw, "ignoring unknown axis scale");
    }
    scale
}

pub fn baseline_bounds(series: &[Series], x_scale: AxisScale, y_scale: AxisScale) -> AxisBounds {
    let xs = series
        .iter()
        .flat_map(|series| series.points.iter().map(|point| point.0));
    let ys = series
        .iter()
        .flat_map(|series| series.points.iter().map(|point| point.1));
    let (x_min, x_max) = axis_range(xs, x_scale);
    let (y_min, y_max) = axis_range(ys, y_scale);
    AxisBounds::new(x_min, x_max, y_min, y_max)
}

fn axis_range(values: impl Iterator<Item = f64>, scale: AxisScale) -> (f64, f64) {
    let mut low = f64::INFINITY;
    let mut high = f64::NEG_INFINITY;
    for projected in values.filter_map(|value| scale.project(value)) {
        low = low.min(projected);
        high = high.max(projected);
    }
    if !low.is_finite() || !high.is_finite() {
        return match scale {
            AxisScale::Linear => (0.0, 1.0),
            AxisScale::Log => (1.0, 10.0),
        };
    }

    let span = high - low;
    let pad = if span > f64::EPSILON {
        span * AUTOSCALE_MARGIN
    } else if low.abs() > f64::EPSILON {
        low.abs() * AUTOSCALE_MARGIN
    } else {
        1.0
    };
    (scale.unproject(low - pad), scale.unproject(high + pad))
}

pub fn confidence_percentage(label: &str) -> Option<String> {
    let hz = label.find("Hz")?;
    let rest = &label[hz + 2..];
    let marker = rest.find("%CI")?;
    let before = &rest[..marker];

    let mut start = before.len();
    for (index, ch) in before.char_indices().rev() {
        if ch.is_ascii_digit() || ch == '.' {
            start = index;
        } else {
            break;
        }
    }
    let percentage = before[start..].trim_matches('.');
    if percentage.is_empty() || !percentage.chars().any(|ch| ch.is_ascii_digit()) {
        return None;
    }
    Some(percentage.to_owned())
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ConfidenceGroups {
    groups: BTreeMap<String, Vec<SeriesRef>>,
}

impl ConfidenceGroups {
    fn build(views: &BTreeMap<ChartView, ViewData>) -> Self {
        let mut groups: BTreeMap<String, Vec<SeriesRef>> = BTreeMap::new();
        for (view, data) in views {
            for (index, series) in data.series.iter().enumerate() {
                if let Some(percentage) = confidence_percentage(&series.label) {
                    groups
                        .entry(percentage)
                        .or_default()
                        .push(SeriesRef::new(*view, index));
                }
            }
        }
        Self { groups }
    }

    pub fn percentages(&self) -> impl Iterator<Item = &str> {
        self.groups.keys().map(String::as_str)
    }

    pub fn members(&self, percentage: &str) -> &[SeriesRef] {
        self.groups
            .get(percentage)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    pub fn group_of(&self, series: SeriesRef) -> Option<&str> {
        self.groups
            .iter()
            .find(|(_, members)| members.contains(&series))
            .map(|(percentage, _)| percentage.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.groups.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct GraphData {
    views: BTreeMap<ChartView, ViewData>,
    confidence: ConfidenceGroups,
    messages: Vec<String>,
}

impl GraphData {
    pub fn from_payload(payload: &ResultPayload) -> Self {
        let views = ChartView::ALL
            .into_iter()
            .map(|view| (view, ViewData::from_payload(payload, view)))
            .collect::<BTreeMap<_, _>>();
        let confidence = ConfidenceGroups::build(&views);
        Self {
            views,
            confidence,
            messages: payload.messages.clone(),
        }
    }

    pub fn view(&self, view: ChartView) -> Option<&ViewData> {
        self.views.get(&view)
    }

    pub fn series(&self, view: ChartView) -> &[Series] {
        self.views
            .get(&view)
            .map(|data| data.series.as_slice())
            .unwrap_or_default()
    }

    pub fn series_at(&self, series: SeriesRef) -> Option<&Series> {
        self.views.get(&series.view)?.series.get(series.index)
    }

    pub(crate) fn series_at_mut(&mut self, series: SeriesRef) -> Option<&mut Series> {
        self.views
            .get_mut(&series.view)?
            .series
            .get_mut(series.index)
    }

    pub fn axis(&self, view: ChartView) -> Option<&AxisConfig> {
        self.views.get(&view).map(|data| &data.axis)
    }

    pub fn baseline(&self, view: ChartView) -> Option<AxisBounds> {
        self.axis(view).map(|axis| axis.baseline)
    }

    pub fn is_empty(&self, view: ChartView) -> bool {
        self.views.get(&view).is_none_or(ViewData::is_empty)
    }

    pub fn non_empty_views(&self) -> Vec<ChartView> {
        ChartView::ALL
            .into_iter()
            .filter(|view| !self.is_empty(*view))
            .collect()
    }

    pub fn confidence(&self) -> &ConfidenceGroups {
        &self.confidence
    }

    pub fn messages(&self) -> &[String] {
        &self.messages
    }
}

#[derive(Debug, Clone, PartialEq)]
enum LoadState {
    Requested,
    Loaded(Box<GraphData>),
}

#[derive(Debug, Clone, Default)]
pub struct GraphDataStore {
    entries: BTreeMap<JobId, LoadState>,
}

impl GraphDataStore {
    /// Claims the download for `job`. Only the first call per job returns `true`.
    pub fn begin_load(&mut self, job: JobId) -> bool {
        if self.entries.contains_key(&job) {
            return false;
        }
        self.entries.insert(job, LoadState::Requested);
        tracing::info!(%job, "downloading results");
        true
    }

    pub fn install(&mut self, job: JobId, payload: &ResultPayload) {
        let entry = self.entries.entry(job).or_insert(LoadState::Requested);
        if matches!(entry, LoadState::Loaded(_)) {
            tracing::warn!(%job, "results already installed; keeping the first copy");
            return;
        }
        let data = GraphData::from_payload(payload);
        tracing::info!(
            %job,
            views = data.non_empty_views().len(),
            "results loaded"
        );
        *entry = LoadState::Loaded(Box::new(data));
    }

    /// Releases the download claim after a failed fetch so a later success
    /// observation may retry.
    pub fn abandon(&mut self, job: JobId) {
        if matches!(self.entries.get(&job), Some(LoadState::Requested)) {
            self.entries.remove(&job);
        }
    }

    pub fn load(&mut self, job: JobId, source: &mut dyn ResultSource) -> Result<&GraphData> {
        let loaded = self
            .entries
            .get(&job)
            .map(|entry| matches!(entry, LoadState::Loaded(_)));
        match loaded {
            Some(true) => {}
            Some(false) => bail!("results for job {job} are already being downloaded"),
            None => {
                self.begin_load(job);
                match source.fetch_results(job) {
                    Ok(payload) => self.install(job, &payload),
                    Err(error) => {
                        self.abandon(job);
                        return Err(error.context(format!("download results for job {job}")));
                    }
                }
            }
        }
        self.get(job)
            .ok_or_else(|| anyhow!("results for job {job} are missing after load"))
    }

    pub fn get(&self, job: JobId) -> Option<&GraphData> {
        match self.entries.get(&job) {
            Some(LoadState::Loaded(data)) => Some(data.as_ref()),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, job: JobId) -> Option<&mut GraphData> {
        match self.entries.get_mut(&job) {
            Some(LoadState::Loaded(data)) => Some(data.as_mut()),
            _ => None,
        }
    }

    pub fn is_loaded(&self, job: JobId) -> bool {
        self.get(job).is_some()
    }

    pub fn is_requested(&self, job: JobId) -> bool {
        matches!(self.entries.get(&job), Some(LoadState::Requested))
    }

    pub fn loaded_jobs(&self) -> Vec<JobId> {
        self.entries
            .iter()
            .filter(|(_, entry)| matches!(entry, LoadState::Loaded(_)))
            .map(|(job, _)| *job)
            .collect()
    }
}
