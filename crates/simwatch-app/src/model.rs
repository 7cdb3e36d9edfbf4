// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use crate::ids::JobId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Success,
    Failed,
}

impl JobStatus {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Running => "RUNNING",
            Self::Success => "SUCCESS",
            Self::Failed => "FAILED",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "PENDING" => Some(Self::Pending),
            "RUNNING" => Some(Self::Running),
            "SUCCESS" => Some(Self::Success),
            "FAILED" => Some(Self::Failed),
            _ => None,
        }
    }

    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Success | Self::Failed)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SimulationStatus {
    pub id: JobId,
    pub status: JobStatus,
    pub progress_text: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusRecord {
    pub pk: i64,
    pub status: String,
    #[serde(default)]
    pub progress: String,
}

impl StatusRecord {
    /// Unknown status strings stay non-terminal so the job keeps being polled.
    pub fn into_status(self) -> SimulationStatus {
        SimulationStatus {
            id: JobId::new(self.pk),
            status: JobStatus::parse(&self.status).unwrap_or(JobStatus::Pending),
            progress_text: self.progress,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChartView {
    PrimaryCurve,
    ChargeMetric,
    PkPdResult,
    Traces,
}

impl ChartView {
    pub const ALL: [Self; 4] = [
        Self::PrimaryCurve,
        Self::ChargeMetric,
        Self::PkPdResult,
        Self::Traces,
    ];

    pub const fn payload_key(self) -> &'static str {
        match self {
            Self::PrimaryCurve => "adp90",
            Self::ChargeMetric => "qnet",
            Self::PkPdResult => "pkpd_results",
            Self::Traces => "traces",
        }
    }

    pub fn parse_key(value: &str) -> Option<Self> {
        match value {
            "adp90" => Some(Self::PrimaryCurve),
            "qnet" => Some(Self::ChargeMetric),
            "pkpd_results" => Some(Self::PkPdResult),
            "traces" => Some(Self::Traces),
            _ => None,
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PrimaryCurve => "APD90",
            Self::ChargeMetric => "qNet",
            Self::PkPdResult => "PK/PD",
            Self::Traces => "traces",
        }
    }

    pub const fn title(self) -> &'static str {
        match self {
            Self::PrimaryCurve => "Δ APD90 dose-response",
            Self::ChargeMetric => "qNet charge metric",
            Self::PkPdResult => "PK/PD Δ APD90",
            Self::Traces => "voltage traces",
        }
    }

    pub const fn hover_labels(self) -> HoverLabels {
        match self {
            Self::PrimaryCurve => HoverLabels {
                x_label: "Conc.: ",
                x_unit: " µM",
                y_label: "Δ APD90: ",
                y_unit: " %",
            },
            Self::ChargeMetric => HoverLabels {
                x_label: "Conc.: ",
                x_unit: " µM",
                y_label: "qNet: ",
                y_unit: " C/F",
            },
            Self::PkPdResult => HoverLabels {
                x_label: "Time: ",
                x_unit: " h",
                y_label: "Δ APD90: ",
                y_unit: " %",
            },
            Self::Traces => HoverLabels {
                x_label: "Time: ",
                x_unit: " ms",
                y_label: "Membrane Voltage: ",
                y_unit: " mV",
            },
        }
    }

    pub fn default_axes(self) -> (AxisSpec, AxisSpec, bool) {
        match self {
            Self::PrimaryCurve => (
                AxisSpec::new("Concentration (µM)", AxisScale::Log),
                AxisSpec::new("Δ APD90 (%)", AxisScale::Linear),
                true,
            ),
            Self::ChargeMetric => (
                AxisSpec::new("Concentration (µM)", AxisScale::Log),
                AxisSpec::new("qNet (C/F)", AxisScale::Linear),
                true,
            ),
            Self::PkPdResult => (
                AxisSpec::new("Time (h)", AxisScale::Linear),
                AxisSpec::new("Δ APD90 (%)", AxisScale::Linear),
                true,
            ),
            Self::Traces => (
                AxisSpec::new("Time (ms)", AxisScale::Linear),
                AxisSpec::new("Membrane Voltage (mV)", AxisScale::Linear),
                false,
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HoverLabels {
    pub x_label: &'static str,
    pub x_unit: &'static str,
    pub y_label: &'static str,
    pub y_unit: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AxisScale {
    Linear,
    Log,
}

impl AxisScale {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::Log => "log",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "linear" => Some(Self::Linear),
            "log" => Some(Self::Log),
            _ => None,
        }
    }

    pub fn project(self, value: f64) -> Option<f64> {
        if !value.is_finite() {
            return None;
        }
        match self {
            Self::Linear => Some(value),
            Self::Log if value > 0.0 => Some(value.log10()),
            Self::Log => None,
        }
    }

    pub fn unproject(self, value: f64) -> f64 {
        match self {
            Self::Linear => value,
            Self::Log => 10_f64.powf(value),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AxisBounds {
    pub x_min: f64,
    pub x_max: f64,
    pub y_min: f64,
    pub y_max: f64,
}

impl AxisBounds {
    pub const fn new(x_min: f64, x_max: f64, y_min: f64, y_max: f64) -> Self {
        Self {
            x_min,
            x_max,
            y_min,
            y_max,
        }
    }

    pub fn from_corners(a: (f64, f64), b: (f64, f64)) -> Self {
        Self {
            x_min: a.0.min(b.0),
            x_max: a.0.max(b.0),
            y_min: a.1.min(b.1),
            y_max: a.1.max(b.1),
        }
    }

    pub fn normalized(self) -> Self {
        Self::from_corners((self.x_min, self.y_min), (self.x_max, self.y_max))
    }

    pub fn is_finite(&self) -> bool {
        self.x_min.is_finite()
            && self.x_max.is_finite()
            && self.y_min.is_finite()
            && self.y_max.is_finite()
    }

    pub fn is_degenerate(&self) -> bool {
        let normalized = self.normalized();
        normalized.x_max <= normalized.x_min || normalized.y_max <= normalized.y_min
    }

    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.x_min && x <= self.x_max && y >= self.y_min && y <= self.y_max
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AxisSpec {
    pub label: String,
    pub scale: AxisScale,
}

impl AxisSpec {
    pub fn new(label: &str, scale: AxisScale) -> Self {
        Self {
            label: label.to_owned(),
            scale,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AxisConfig {
    pub x: AxisSpec,
    pub y: AxisSpec,
    pub show_points: bool,
    /// Auto-scaled bounds captured when the payload was loaded. Never mutated.
    pub baseline: AxisBounds,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Series {
    pub label: String,
    pub points: Vec<(f64, f64)>,
    pub color_index: usize,
    pub enabled: bool,
}

impl Series {
    pub fn has_points(&self) -> bool {
        !self.points.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SeriesRef {
    pub view: ChartView,
    pub index: usize,
}

impl SeriesRef {
    pub const fn new(view: ChartView, index: usize) -> Self {
        Self { view, index }
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ResultPayload {
    #[serde(default)]
    pub adp90: Vec<SeriesRecord>,
    #[serde(default)]
    pub qnet: Vec<SeriesRecord>,
    #[serde(default)]
    pub pkpd_results: Vec<SeriesRecord>,
    #[serde(default)]
    pub traces: Vec<SeriesRecord>,
    #[serde(default)]
    pub axes: BTreeMap<String, AxisOverride>,
    #[serde(default)]
    pub messages: Vec<String>,
}

impl ResultPayload {
    pub fn series_for(&self, view: ChartView) -> &[SeriesRecord] {
        match view {
            ChartView::PrimaryCurve => &self.adp90,
            ChartView::ChargeMetric => &self.qnet,
            ChartView::PkPdResult => &self.pkpd_results,
            ChartView::Traces => &self.traces,
        }
    }

    pub fn axis_override(&self, view: ChartView) -> Option<&AxisOverride> {
        self.axes.get(view.payload_key())
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct SeriesRecord {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub data: Vec<[Option<f64>; 2]>,
    #[serde(default)]
    pub color: Option<ColorValue>,
    #[serde(default)]
    pub enabled: Option<bool>,
}

impl SeriesRecord {
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.data
            .iter()
            .filter_map(|pair| match pair {
                [Some(x), Some(y)] if x.is_finite() && y.is_finite() => Some((*x, *y)),
                _ => None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColorValue {
    Index(i64),
    Name(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct AxisOverride {
    #[serde(default)]
    pub x_scale: Option<String>,
    #[serde(default)]
    pub y_scale: Option<String>,
}
