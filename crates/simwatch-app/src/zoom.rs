// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AxisBounds, AxisScale, ChartView, GraphData, SeriesRef, ViewState};

pub const HOVER_TOLERANCE: f64 = 0.02;

#[derive(Debug, Clone, PartialEq)]
pub struct HoverItem {
    pub series: SeriesRef,
    pub label: String,
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct HoverInfo {
    pub view: ChartView,
    pub x: f64,
    pub y: f64,
    pub item: Option<HoverItem>,
}

impl HoverInfo {
    pub fn pointer_lines(&self) -> [String; 2] {
        let labels = self.view.hover_labels();
        [
            format!("{}{:.3}{}", labels.x_label, self.x, labels.x_unit),
            format!("{}{:.3}{}", labels.y_label, self.y, labels.y_unit),
        ]
    }

    pub fn tooltip(&self) -> Option<String> {
        let item = self.item.as_ref()?;
        let labels = self.view.hover_labels();
        Some(format!(
            "[{}] : {}{:.3}{} - {}{:.3}{}",
            item.label,
            labels.x_label,
            item.x,
            labels.x_unit,
            labels.y_label,
            item.y,
            labels.y_unit
        ))
    }
}

pub struct ZoomController;

impl ZoomController {
    pub fn select(
        data: &GraphData,
        state: &mut ViewState,
        view: ChartView,
        rect: AxisBounds,
    ) -> Option<ChartView> {
        if data.is_empty(view) {
            return None;
        }
        let rect = rect.normalized();
        if !rect.is_finite() || rect.is_degenerate() {
            tracing::debug!(view = view.payload_key(), "ignoring degenerate zoom selection");
            return None;
        }
        let axis = data.axis(view)?;
        if axis.x.scale.project(rect.x_min).is_none() || axis.y.scale.project(rect.y_min).is_none()
        {
            tracing::debug!(view = view.payload_key(), "zoom selection outside log axis range");
            return None;
        }
        state.set_zoom(view, rect);
        Some(view)
    }

    pub fn reset(state: &mut ViewState, view: ChartView) -> Option<ChartView> {
        state.clear_zoom(view).then_some(view)
    }

    pub fn hover(
        data: &GraphData,
        state: &ViewState,
        view: ChartView,
        pointer: (f64, f64),
    ) -> Option<HoverInfo> {
        if data.is_empty(view) || !pointer.0.is_finite() || !pointer.1.is_finite() {
            return None;
        }
        let axis = data.axis(view)?;
        let (x_scale, y_scale) = (axis.x.scale, axis.y.scale);
        let bounds = state.effective_bounds(view, data);
        let (px, py) = (x_scale.project(pointer.0)?, y_scale.project(pointer.1)?);
        let tol_x = span(bounds.x_min, bounds.x_max, x_scale)? * HOVER_TOLERANCE;
        let tol_y = span(bounds.y_min, bounds.y_max, y_scale)? * HOVER_TOLERANCE;

        let mut best: Option<(f64, HoverItem)> = None;
        for (index, series) in data.series(view).iter().enumerate() {
            if !series.enabled {
                continue;
            }
            for (x, y) in &series.points {
                let (Some(sx), Some(sy)) = (x_scale.project(*x), y_scale.project(*y)) else {
                    continue;
                };
                let (dx, dy) = ((sx - px).abs(), (sy - py).abs());
                if dx > tol_x || dy > tol_y {
                    continue;
                }
                let distance = (dx / tol_x).hypot(dy / tol_y);
                if best.as_ref().is_none_or(|(nearest, _)| distance < *nearest) {
                    best = Some((
                        distance,
                        HoverItem {
                            series: SeriesRef::new(view, index),
                            label: series.label.clone(),
                            x: *x,
                            y: *y,
                        },
                    ));
                }
            }
        }

        Some(HoverInfo {
            view,
            x: pointer.0,
            y: pointer.1,
            item: best.map(|(_, item)| item),
        })
    }
}

fn span(min: f64, max: f64, scale: AxisScale) -> Option<f64> {
    let span = scale.project(max)? - scale.project(min)?;
    (span > 0.0).then_some(span)
}
