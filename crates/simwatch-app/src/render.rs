// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use crate::{AxisScale, ChartView, GraphData, SeriesRef, ViewState};

#[derive(Debug, Clone, PartialEq)]
pub struct AxisFrame {
    pub label: String,
    pub scale: AxisScale,
    pub bounds: [f64; 2],
    pub data_bounds: [f64; 2],
}

impl AxisFrame {
    fn new(label: &str, scale: AxisScale, min: f64, max: f64) -> Self {
        let projected = match (scale.project(min), scale.project(max)) {
            (Some(low), Some(high)) if high > low => [low, high],
            _ => [0.0, 1.0],
        };
        Self {
            label: label.to_owned(),
            scale,
            bounds: projected,
            data_bounds: [min, max],
        }
    }

    pub fn tick_labels(&self) -> [String; 3] {
        let [low, high] = self.bounds;
        let mid = (low + high) / 2.0;
        [low, mid, high].map(|value| format_tick(self.scale.unproject(value)))
    }
}

pub fn format_tick(value: f64) -> String {
    let magnitude = value.abs();
    if magnitude != 0.0 && !(0.01..10_000.0).contains(&magnitude) {
        return format!("{value:.1e}");
    }
    let text = format!("{value:.2}");
    let text = text.trim_end_matches('0').trim_end_matches('.');
    if text == "-0" {
        "0".to_owned()
    } else {
        text.to_owned()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedSeries {
    pub series: SeriesRef,
    pub label: String,
    pub color_index: usize,
    pub points: Vec<(f64, f64)>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RenderFrame {
    pub view: ChartView,
    pub title: &'static str,
    pub x_axis: AxisFrame,
    pub y_axis: AxisFrame,
    pub fixed_axes: bool,
    pub show_points: bool,
    pub series: Vec<RenderedSeries>,
}

pub struct ChartRenderer;

impl ChartRenderer {
    pub fn render(view: ChartView, data: &GraphData, state: &ViewState) -> Option<RenderFrame> {
        let axis = data.axis(view)?;
        let bounds = state.effective_bounds(view, data);
        let (x_scale, y_scale) = (axis.x.scale, axis.y.scale);

        let series = data
            .series(view)
            .iter()
            .enumerate()
            .filter(|(_, series)| series.enabled)
            .map(|(index, series)| RenderedSeries {
                series: SeriesRef::new(view, index),
                label: series.label.clone(),
                color_index: series.color_index,
                points: series
                    .points
                    .iter()
                    .filter_map(|(x, y)| Some((x_scale.project(*x)?, y_scale.project(*y)?)))
                    .collect(),
            })
            .collect();

        Some(RenderFrame {
            view,
            title: view.title(),
            x_axis: AxisFrame::new(&axis.x.label, x_scale, bounds.x_min, bounds.x_max),
            y_axis: AxisFrame::new(&axis.y.label, y_scale, bounds.y_min, bounds.y_max),
            fixed_axes: state.is_zoomed(view),
            show_points: axis.show_points,
            series,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::{ChartRenderer, format_tick};
    use crate::{
        AxisBounds, AxisScale, ChartView, GraphData, LegendToggle, ResultPayload, SeriesRecord,
        SeriesRef, ViewState, ZoomController,
    };

    fn record(label: &str, points: &[(f64, f64)]) -> SeriesRecord {
        SeriesRecord {
            label: label.to_owned(),
            data: points.iter().map(|(x, y)| [Some(*x), Some(*y)]).collect(),
            color: None,
            enabled: None,
        }
    }

    fn data() -> GraphData {
        GraphData::from_payload(&ResultPayload {
            adp90: vec![
                record("control", &[(0.0, 0.0), (1.0, 5.0), (100.0, 40.0)]),
                record("Simulation @ 1 Hz 90%CI lower", &[(1.0, 3.0), (100.0, 35.0)]),
            ],
            ..ResultPayload::default()
        })
    }

    #[test]
    fn projects_log_axis_and_drops_non_positive_points() {
        let data = data();
        let state = ViewState::for_data(&data);
        let frame = ChartRenderer::render(ChartView::PrimaryCurve, &data, &state).expect("frame");

        assert_eq!(frame.x_axis.scale, AxisScale::Log);
        assert_eq!(frame.series[0].points, vec![(0.0, 5.0), (2.0, 40.0)]);
        assert!(frame.show_points);
        assert!(!frame.fixed_axes);
        assert_eq!(frame.x_axis.label, "Concentration (µM)");
    }

    #[test]
    fn only_enabled_series_are_rendered_each_call() {
        let mut data = data();
        let state = ViewState::for_data(&data);
        LegendToggle::toggle(&mut data, SeriesRef::new(ChartView::PrimaryCurve, 0));

        let frame = ChartRenderer::render(ChartView::PrimaryCurve, &data, &state).expect("frame");
        let rendered = frame.series.iter().map(|series| series.series).collect::<Vec<_>>();
        assert_eq!(rendered, vec![SeriesRef::new(ChartView::PrimaryCurve, 1)]);

        LegendToggle::toggle(&mut data, SeriesRef::new(ChartView::PrimaryCurve, 0));
        let frame = ChartRenderer::render(ChartView::PrimaryCurve, &data, &state).expect("frame");
        assert_eq!(frame.series.len(), 2);
    }

    #[test]
    fn zoom_pins_axes_to_selection() {
        let data = data();
        let mut state = ViewState::for_data(&data);
        ZoomController::select(
            &data,
            &mut state,
            ChartView::PrimaryCurve,
            AxisBounds::new(1.0, 10.0, 0.0, 20.0),
        );

        let frame = ChartRenderer::render(ChartView::PrimaryCurve, &data, &state).expect("frame");
        assert!(frame.fixed_axes);
        assert_eq!(frame.x_axis.bounds, [0.0, 1.0]);
        assert_eq!(frame.x_axis.data_bounds, [1.0, 10.0]);
        assert_eq!(frame.y_axis.bounds, [0.0, 20.0]);
        assert_eq!(frame.x_axis.tick_labels()[2], "10");
    }

    #[test]
    fn ticks_are_compact() {
        assert_eq!(format_tick(0.0), "0");
        assert_eq!(format_tick(12.5), "12.5");
        assert_eq!(format_tick(-80.0), "-80");
        assert_eq!(format_tick(0.001), "1.0e-3");
        assert_eq!(format_tick(25_000.0), "2.5e4");
    }
}
