// Copyright 2026 Phillip Cloud
// Licensed under the Apache License, Version 2.0

use anyhow::{Context, Result, bail};
use simwatch_app::{
    AxisOverride, ColorValue, JobId, JobStatus, ResultPayload, ResultSource, SeriesRecord,
    SimulationStatus, StatusRecord,
};
use std::collections::BTreeMap;
use std::path::PathBuf;
use time::OffsetDateTime;
use time::macros::datetime;

const CONCENTRATIONS: [f64; 8] = [0.001, 0.01, 0.1, 0.3, 1.0, 3.0, 10.0, 100.0];
const PACING_FREQUENCIES: [&str; 3] = ["0.5", "1", "2"];
const CONFIDENCE_LEVELS: [&str; 3] = ["68", "90", "95"];
const TRACE_SAMPLES: usize = 40;
const TRACE_DURATION_MS: f64 = 400.0;

#[derive(Debug, Clone)]
struct DeterministicRng {
    state: u64,
}

impl DeterministicRng {
    fn new(seed: u64) -> Self {
        let mut state = seed ^ 0x9E37_79B9_7F4A_7C15;
        if state == 0 {
            state = 0xA409_3822_299F_31D0;
        }
        Self { state }
    }

    fn next_u64(&mut self) -> u64 {
        self.state = self
            .state
            .wrapping_mul(6_364_136_223_846_793_005)
            .wrapping_add(1_442_695_040_888_963_407);

        let mut x = self.state;
        x ^= x >> 13;
        x ^= x << 7;
        x ^= x >> 17;
        x
    }

    fn int_n(&mut self, n: usize) -> usize {
        if n <= 1 {
            return 0;
        }
        (self.next_u64() % (n as u64)) as usize
    }

    fn float_in(&mut self, low: f64, high: f64) -> f64 {
        let unit = (self.next_u64() >> 11) as f64 / (1_u64 << 53) as f64;
        low + unit * (high - low)
    }
}

#[derive(Debug, Clone)]
pub struct SimulationFaker {
    rng: DeterministicRng,
}

impl SimulationFaker {
    pub fn new(seed: u64) -> Self {
        let normalized = if seed == 0 { 1 } else { seed };
        Self {
            rng: DeterministicRng::new(normalized),
        }
    }

    pub fn pacing_frequency(&mut self) -> &'static str {
        PACING_FREQUENCIES[self.rng.int_n(PACING_FREQUENCIES.len())]
    }

    pub fn confidence_level(&mut self) -> &'static str {
        CONFIDENCE_LEVELS[self.rng.int_n(CONFIDENCE_LEVELS.len())]
    }

    pub fn dose_response(&mut self, label: &str, scale: f64) -> SeriesRecord {
        let ic50 = self.rng.float_in(0.3, 30.0);
        let hill = self.rng.float_in(0.8, 1.6);
        let max_effect = self.rng.float_in(20.0, 80.0) * scale;
        let data = CONCENTRATIONS
            .iter()
            .map(|conc| {
                let effect = max_effect / (1.0 + (ic50 / conc).powf(hill));
                [Some(*conc), Some(effect)]
            })
            .collect();
        SeriesRecord {
            label: label.to_owned(),
            data,
            color: None,
            enabled: None,
        }
    }

    pub fn qnet_curve(&mut self, label: &str) -> SeriesRecord {
        let baseline = self.rng.float_in(0.05, 0.09);
        let slope = self.rng.float_in(0.002, 0.01);
        let data = CONCENTRATIONS
            .iter()
            .map(|conc| [Some(*conc), Some(baseline - slope * conc.log10().max(-3.0))])
            .collect();
        SeriesRecord {
            label: label.to_owned(),
            data,
            color: None,
            enabled: None,
        }
    }

    pub fn voltage_trace(&mut self, label: &str) -> SeriesRecord {
        let rest = self.rng.float_in(-88.0, -82.0);
        let peak = self.rng.float_in(20.0, 40.0);
        let apd = self.rng.float_in(200.0, 320.0);
        let data = (0..TRACE_SAMPLES)
            .map(|sample| {
                let time = TRACE_DURATION_MS * sample as f64 / (TRACE_SAMPLES - 1) as f64;
                let voltage = if time < 5.0 {
                    rest + (peak - rest) * time / 5.0
                } else if time < apd {
                    peak - (peak - rest) * ((time - 5.0) / (apd - 5.0)).powi(3)
                } else {
                    rest
                };
                [Some(time), Some(voltage)]
            })
            .collect();
        SeriesRecord {
            label: label.to_owned(),
            data,
            color: None,
            enabled: None,
        }
    }

    pub fn result_payload(&mut self) -> ResultPayload {
        let frequency = self.pacing_frequency();
        let confidence = self.confidence_level();
        let main = format!("Simulation @ {frequency} Hz");
        let lower = format!("Simulation @ {frequency} Hz {confidence}%CI lower");
        let upper = format!("Simulation @ {frequency} Hz {confidence}%CI upper");

        let mut adp90 = vec![
            self.dose_response(&main, 1.0),
            self.dose_response(&lower, 0.8),
            self.dose_response(&upper, 1.2),
        ];
        for (index, record) in adp90.iter_mut().enumerate() {
            record.color = Some(ColorValue::Index(index as i64));
        }

        let qnet = vec![
            self.qnet_curve(&format!("qNet @ {frequency} Hz")),
            self.qnet_curve(&format!("qNet @ {frequency} Hz {confidence}%CI")),
        ];
        let traces = ["0 µM", "1 µM", "10 µM"]
            .iter()
            .map(|label| self.voltage_trace(label))
            .collect();
        let pkpd_results = vec![SeriesRecord {
            label: "PK/PD @ 1 Hz".to_owned(),
            data: (0..24)
                .map(|hour| [Some(f64::from(hour)), Some(self.rng.float_in(0.0, 15.0))])
                .collect(),
            color: None,
            enabled: None,
        }];

        ResultPayload {
            adp90,
            qnet,
            pkpd_results,
            traces,
            axes: BTreeMap::new(),
            messages: Vec::new(),
        }
    }
}

pub fn payload_without_qnet() -> ResultPayload {
    let mut payload = SimulationFaker::new(7).result_payload();
    payload.qnet = vec![SeriesRecord {
        label: "qNet @ 1 Hz".to_owned(),
        data: Vec::new(),
        color: None,
        enabled: None,
    }];
    payload.pkpd_results.clear();
    payload
}

pub fn payload_with_notes() -> ResultPayload {
    let mut payload = SimulationFaker::new(11).result_payload();
    payload.axes.insert(
        "traces".to_owned(),
        AxisOverride {
            x_scale: Some("linear".to_owned()),
            y_scale: Some("linear".to_owned()),
        },
    );
    payload.messages = vec![
        "Hill coefficient clamped to 0.5".to_owned(),
        "PK/PD data missing for 0.5 Hz".to_owned(),
    ];
    payload
}

pub fn status(id: i64, status: JobStatus, progress: &str) -> SimulationStatus {
    SimulationStatus {
        id: JobId::new(id),
        status,
        progress_text: progress.to_owned(),
    }
}

pub fn status_record(id: i64, status: &str, progress: &str) -> StatusRecord {
    StatusRecord {
        pk: id,
        status: status.to_owned(),
        progress: progress.to_owned(),
    }
}

pub fn status_json(records: &[StatusRecord]) -> Result<String> {
    serde_json::to_string(records).context("encode status fixture")
}

pub fn payload_json(payload: &ResultPayload) -> Result<String> {
    serde_json::to_string(payload).context("encode payload fixture")
}

#[derive(Debug, Clone, Default)]
pub struct FakeResultSource {
    payloads: BTreeMap<JobId, ResultPayload>,
    fetches: BTreeMap<JobId, usize>,
}

impl FakeResultSource {
    pub fn with_payload(mut self, job: JobId, payload: ResultPayload) -> Self {
        self.payloads.insert(job, payload);
        self
    }

    pub fn fetches(&self, job: JobId) -> usize {
        self.fetches.get(&job).copied().unwrap_or(0)
    }
}

impl ResultSource for FakeResultSource {
    fn fetch_results(&mut self, job: JobId) -> Result<ResultPayload> {
        *self.fetches.entry(job).or_default() += 1;
        match self.payloads.get(&job) {
            Some(payload) => Ok(payload.clone()),
            None => bail!("server returned 404"),
        }
    }
}

pub fn temp_config_path() -> Result<(tempfile::TempDir, PathBuf)> {
    let dir = tempfile::tempdir().context("create temp dir")?;
    let path = dir.path().join("config.toml");
    Ok((dir, path))
}

pub fn fixture_datetime() -> OffsetDateTime {
    datetime!(2026-02-19 12:34:56 UTC)
}

#[cfg(test)]
mod tests {
    use super::{FakeResultSource, SimulationFaker, payload_without_qnet};
    use simwatch_app::{ChartView, GraphData, JobId, ResultSource, confidence_percentage};

    #[test]
    fn new_deterministic_seed() {
        let left = SimulationFaker::new(42).result_payload();
        let right = SimulationFaker::new(42).result_payload();
        assert_eq!(left, right);
    }

    #[test]
    fn payload_fills_every_view() {
        let data = GraphData::from_payload(&SimulationFaker::new(3).result_payload());
        assert_eq!(data.non_empty_views(), ChartView::ALL.to_vec());
        assert!(!data.confidence().is_empty());
    }

    #[test]
    fn confidence_labels_are_recognized() {
        let payload = SimulationFaker::new(5).result_payload();
        let grouped = payload
            .adp90
            .iter()
            .filter(|record| confidence_percentage(&record.label).is_some())
            .count();
        assert_eq!(grouped, 2);
    }

    #[test]
    fn without_qnet_leaves_charge_metric_empty() {
        let data = GraphData::from_payload(&payload_without_qnet());
        assert!(data.is_empty(ChartView::ChargeMetric));
        assert!(!data.is_empty(ChartView::PrimaryCurve));
    }

    #[test]
    fn fake_source_counts_fetches() {
        let job = JobId::new(5);
        let mut source = FakeResultSource::default().with_payload(job, payload_without_qnet());
        assert!(source.fetch_results(job).is_ok());
        assert!(source.fetch_results(JobId::new(6)).is_err());
        assert_eq!(source.fetches(job), 1);
        assert_eq!(source.fetches(JobId::new(6)), 1);
    }
}
