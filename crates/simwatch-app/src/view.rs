// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeMap;

use crate::{AxisBounds, ChartView, GraphData};

#[derive(Debug, Clone, PartialEq, Default)]
pub struct ViewState {
    active: Option<ChartView>,
    zoom: BTreeMap<ChartView, AxisBounds>,
}

impl ViewState {
    pub fn for_data(data: &GraphData) -> Self {
        Self {
            active: ViewSwitcher::initial_view(data),
            zoom: BTreeMap::new(),
        }
    }

    pub fn active(&self) -> Option<ChartView> {
        self.active
    }

    pub fn zoom(&self, view: ChartView) -> Option<AxisBounds> {
        self.zoom.get(&view).copied()
    }

    pub fn is_zoomed(&self, view: ChartView) -> bool {
        self.zoom.contains_key(&view)
    }

    pub fn effective_bounds(&self, view: ChartView, data: &GraphData) -> AxisBounds {
        self.zoom(view)
            .or_else(|| data.baseline(view))
            .unwrap_or(AxisBounds::new(0.0, 1.0, 0.0, 1.0))
    }

    pub(crate) fn set_zoom(&mut self, view: ChartView, bounds: AxisBounds) {
        self.zoom.insert(view, bounds);
    }

    pub(crate) fn clear_zoom(&mut self, view: ChartView) -> bool {
        self.zoom.remove(&view).is_some()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SwitchControl {
    pub view: ChartView,
    pub active: bool,
    pub enabled: bool,
}

pub struct ViewSwitcher;

impl ViewSwitcher {
    pub fn initial_view(data: &GraphData) -> Option<ChartView> {
        ChartView::ALL
            .into_iter()
            .find(|view| !data.is_empty(*view))
    }

    pub fn can_activate(data: &GraphData, state: &ViewState, view: ChartView) -> bool {
        !data.is_empty(view) && state.active != Some(view)
    }

    pub fn activate(data: &GraphData, state: &mut ViewState, view: ChartView) -> Option<ChartView> {
        if !Self::can_activate(data, state, view) {
            return None;
        }
        state.active = Some(view);
        Some(view)
    }

    pub fn controls(data: &GraphData, state: &ViewState) -> Vec<SwitchControl> {
        ChartView::ALL
            .into_iter()
            .map(|view| SwitchControl {
                view,
                active: state.active == Some(view),
                enabled: Self::can_activate(data, state, view),
            })
            .collect()
    }

    pub fn cycle(data: &GraphData, state: &mut ViewState, delta: isize) -> Option<ChartView> {
        let available = data.non_empty_views();
        if available.len() < 2 {
            return None;
        }
        let current = state
            .active
            .and_then(|active| available.iter().position(|view| *view == active))
            .unwrap_or(0) as isize;
        let len = available.len() as isize;
        let next = (current + delta).rem_euclid(len) as usize;
        Self::activate(data, state, available[next])
    }
}
