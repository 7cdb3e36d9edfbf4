// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use std::collections::BTreeSet;

use crate::{ChartView, GraphData, SeriesRef};

pub const CHECKED_GLYPH: &str = "[x]";
pub const UNCHECKED_GLYPH: &str = "[ ]";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LegendEntry {
    pub series: SeriesRef,
    pub label: String,
    pub color_index: usize,
    pub enabled: bool,
    pub confidence: Option<String>,
}

impl LegendEntry {
    pub fn glyph(&self) -> &'static str {
        if self.enabled {
            CHECKED_GLYPH
        } else {
            UNCHECKED_GLYPH
        }
    }
}

pub struct LegendToggle;

impl LegendToggle {
    pub fn entries(data: &GraphData, view: ChartView) -> Vec<LegendEntry> {
        data.series(view)
            .iter()
            .enumerate()
            .map(|(index, series)| {
                let series_ref = SeriesRef::new(view, index);
                LegendEntry {
                    series: series_ref,
                    label: series.label.clone(),
                    color_index: series.color_index,
                    enabled: series.enabled,
                    confidence: data.confidence().group_of(series_ref).map(str::to_owned),
                }
            })
            .collect()
    }

    pub fn toggle(data: &mut GraphData, series: SeriesRef) -> Option<ChartView> {
        let target = data.series_at_mut(series)?;
        target.enabled = !target.enabled;
        tracing::debug!(
            view = series.view.payload_key(),
            index = series.index,
            enabled = target.enabled,
            "series toggled"
        );
        Some(series.view)
    }

    pub fn toggle_confidence(data: &mut GraphData, percentage: &str) -> Vec<ChartView> {
        let members = data.confidence().members(percentage).to_vec();
        let mut views = BTreeSet::new();
        for member in members {
            if let Some(view) = Self::toggle(data, member) {
                views.insert(view);
            }
        }
        views.into_iter().collect()
    }
}
