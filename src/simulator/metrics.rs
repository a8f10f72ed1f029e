//! Observation: per-tick time series, per-flight records, summary
//! statistics and the plot-ready result document.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::layout::AircraftClass;
use crate::simulator::movement::TickObservables;
use crate::simulator::spawning::Aircraft;

/// Series longer than this are strided down before plotting.
const MAX_SERIES_POINTS: usize = 500;
/// Completions are bucketed into windows of this many seconds.
const THROUGHPUT_WINDOW: f64 = 300.0;
const MAX_HISTOGRAM_BINS: usize = 20;
/// Only the first N flight records are returned in the result document.
const MAX_FLIGHT_RECORDS: usize = 100;

#[derive(Debug, Clone, Serialize)]
pub struct FlightRecord {
    pub id: String,
    pub direction: String,
    pub class: AircraftClass,
    pub duration: f64,
    pub gate: Option<String>,
    pub spawning_time: f64,
    pub completion_time: f64,
    pub taxi_time: Option<f64>,
    pub wait_time: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct SeriesSpec {
    pub label: String,
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// One plot for the UI: either a single x/y pair or a `series` list.
#[derive(Debug, Clone, Serialize)]
pub struct PlotSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub x: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub y: Option<Vec<f64>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<Vec<SeriesSpec>>,
}

#[derive(Debug, Clone, Serialize, Default)]
pub struct Summary {
    pub total_flights: usize,
    pub total_arrivals: usize,
    pub total_departures: usize,
    pub avg_duration: f64,
    pub min_duration: f64,
    pub max_duration: f64,
    pub avg_taxi_time: f64,
    pub avg_taxi_time_departures: f64,
    pub avg_taxi_time_arrivals: f64,
    pub avg_wait_time: f64,
    pub max_wait_time: f64,
    pub throughput_per_hour: f64,
    pub avg_queue_length: f64,
    pub max_queue_length: usize,
}

/// Collects per-tick observables and completed-flight records, and
/// renders the aggregate result document.
#[derive(Debug, Default)]
pub struct MetricsCollector {
    aircraft_on_ground: Vec<(f64, f64)>,
    departures_on_ground: Vec<(f64, f64)>,
    arrivals_on_ground: Vec<(f64, f64)>,
    queue_length_total: Vec<(f64, f64)>,
    queue_length_max: Vec<(f64, f64)>,
    runways_occupied: Vec<(f64, f64)>,
    completed_flights: Vec<FlightRecord>,
    sim_duration: f64,
}

impl MetricsCollector {
    pub fn new(sim_duration: f64) -> Self {
        Self { sim_duration, ..Default::default() }
    }

    /// Record one tick's observables at the given time.
    pub fn record(&mut self, time: f64, obs: &TickObservables) {
        self.aircraft_on_ground.push((time, obs.aircraft_on_ground as f64));
        self.departures_on_ground.push((time, obs.departures_on_ground as f64));
        self.arrivals_on_ground.push((time, obs.arrivals_on_ground as f64));
        self.queue_length_total.push((time, obs.queue_length_total as f64));
        self.queue_length_max.push((time, obs.queue_length_max as f64));
        self.runways_occupied.push((time, obs.runways_occupied as f64));
    }

    /// Record one completed flight.
    pub fn record_flight(&mut self, aircraft: &Aircraft) {
        let completion_time = aircraft.completion_time.unwrap_or(aircraft.spawning_time);
        self.completed_flights.push(FlightRecord {
            id: aircraft.id.clone(),
            direction: aircraft.direction().to_string(),
            class: aircraft.aircraft_class,
            duration: completion_time - aircraft.spawning_time,
            gate: aircraft.gate_id.clone(),
            spawning_time: aircraft.spawning_time,
            completion_time,
            taxi_time: aircraft.taxi_time,
            wait_time: Some(aircraft.wait_time),
        });
    }

    pub fn completed_count(&self) -> usize {
        self.completed_flights.len()
    }

    pub fn time_series_len(&self) -> usize {
        self.aircraft_on_ground.len()
    }

    pub fn summary(&self) -> Summary {
        let flights = &self.completed_flights;
        let total = flights.len();
        let arrivals = flights.iter().filter(|f| f.direction == "arrival").count();

        let durations: Vec<f64> = flights.iter().map(|f| f.duration).collect();
        let taxi_all: Vec<f64> = flights.iter().filter_map(|f| f.taxi_time).collect();
        let taxi_dep: Vec<f64> = flights
            .iter()
            .filter(|f| f.direction == "departure")
            .filter_map(|f| f.taxi_time)
            .collect();
        let taxi_arr: Vec<f64> = flights
            .iter()
            .filter(|f| f.direction == "arrival")
            .filter_map(|f| f.taxi_time)
            .collect();
        let waits: Vec<f64> = flights.iter().filter_map(|f| f.wait_time).collect();

        let queue_values: Vec<f64> = self.queue_length_total.iter().map(|p| p.1).collect();
        let max_queue = self
            .queue_length_max
            .iter()
            .map(|p| p.1)
            .fold(0.0_f64, f64::max);

        let throughput_per_hour = if self.sim_duration > 0.0 {
            total as f64 / (self.sim_duration / 3600.0)
        } else {
            0.0
        };

        let min_duration = if durations.is_empty() {
            0.0
        } else {
            durations.iter().copied().fold(f64::INFINITY, f64::min)
        };

        Summary {
            total_flights: total,
            total_arrivals: arrivals,
            total_departures: total - arrivals,
            avg_duration: mean(&durations),
            min_duration,
            max_duration: durations.iter().copied().fold(0.0, f64::max),
            avg_taxi_time: mean(&taxi_all),
            avg_taxi_time_departures: mean(&taxi_dep),
            avg_taxi_time_arrivals: mean(&taxi_arr),
            avg_wait_time: mean(&waits),
            max_wait_time: waits.iter().copied().fold(0.0, f64::max),
            throughput_per_hour,
            avg_queue_length: mean(&queue_values),
            max_queue_length: max_queue as usize,
        }
    }

    pub fn plots(&self) -> Vec<PlotSpec> {
        let mut plots = Vec::new();

        plots.push(PlotSpec {
            id: "aircraft_on_ground".to_string(),
            kind: "line".to_string(),
            title: "Aircraft on Ground".to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Count".to_string(),
            x: None,
            y: None,
            series: Some(vec![
                series("total", &self.aircraft_on_ground),
                series("departures", &self.departures_on_ground),
                series("arrivals", &self.arrivals_on_ground),
            ]),
        });

        plots.push(PlotSpec {
            id: "queue_length".to_string(),
            kind: "line".to_string(),
            title: "Hold Queue Length".to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Aircraft".to_string(),
            x: None,
            y: None,
            series: Some(vec![
                series("total", &self.queue_length_total),
                series("max", &self.queue_length_max),
            ]),
        });

        let (x, y) = downsample(&self.runways_occupied);
        plots.push(PlotSpec {
            id: "runways_occupied".to_string(),
            kind: "line".to_string(),
            title: "Runways Occupied".to_string(),
            x_label: "Time (s)".to_string(),
            y_label: "Count".to_string(),
            x: Some(x),
            y: Some(y),
            series: None,
        });

        let (x, y) = self.throughput_windows();
        plots.push(PlotSpec {
            id: "throughput".to_string(),
            kind: "bar".to_string(),
            title: "Throughput per 5 min".to_string(),
            x_label: "Window start (s)".to_string(),
            y_label: "Completions".to_string(),
            x: Some(x),
            y: Some(y),
            series: None,
        });

        let taxi_times: Vec<f64> =
            self.completed_flights.iter().filter_map(|f| f.taxi_time).collect();
        let (x, y) = histogram(&taxi_times);
        plots.push(PlotSpec {
            id: "taxi_time_histogram".to_string(),
            kind: "bar".to_string(),
            title: "Taxi Time Distribution".to_string(),
            x_label: "Taxi time (s)".to_string(),
            y_label: "Flights".to_string(),
            x: Some(x),
            y: Some(y),
            series: None,
        });

        plots
    }

    /// Completions bucketed into fixed windows over the run horizon.
    fn throughput_windows(&self) -> (Vec<f64>, Vec<f64>) {
        let windows = (self.sim_duration / THROUGHPUT_WINDOW).ceil().max(1.0) as usize;
        let mut counts = vec![0.0; windows];
        for flight in &self.completed_flights {
            let idx = (flight.completion_time / THROUGHPUT_WINDOW) as usize;
            if let Some(slot) = counts.get_mut(idx.min(windows - 1)) {
                *slot += 1.0;
            }
        }
        let starts = (0..windows).map(|i| i as f64 * THROUGHPUT_WINDOW).collect();
        (starts, counts)
    }

    /// Render the full result document.
    pub fn results(&self) -> serde_json::Value {
        let flights: Vec<&FlightRecord> =
            self.completed_flights.iter().take(MAX_FLIGHT_RECORDS).collect();
        serde_json::json!({
            "summary": self.summary(),
            "plots": self.plots(),
            "flights": flights,
        })
    }
}

fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        0.0
    } else {
        values.iter().sum::<f64>() / values.len() as f64
    }
}

fn series(label: &str, points: &[(f64, f64)]) -> SeriesSpec {
    let (x, y) = downsample(points);
    SeriesSpec { label: label.to_string(), x, y }
}

/// Stride long series down to roughly `MAX_SERIES_POINTS` points.
fn downsample(points: &[(f64, f64)]) -> (Vec<f64>, Vec<f64>) {
    let stride = (points.len() / MAX_SERIES_POINTS).max(1);
    let kept = points.iter().step_by(stride);
    kept.map(|p| (p.0, p.1)).unzip()
}

/// Equal-width histogram over [min, max] with at most
/// `MAX_HISTOGRAM_BINS` bins, never more than the number of distinct
/// values. Returns (bin centres, counts).
fn histogram(values: &[f64]) -> (Vec<f64>, Vec<f64>) {
    if values.is_empty() {
        return (Vec::new(), Vec::new());
    }
    let unique: BTreeSet<u64> = values.iter().map(|v| v.to_bits()).collect();
    let bins = unique.len().min(MAX_HISTOGRAM_BINS).max(1);

    let min = values.iter().copied().fold(f64::INFINITY, f64::min);
    let max = values.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let width = (max - min) / bins as f64;

    let mut counts = vec![0.0; bins];
    for v in values {
        let idx = if width > 0.0 {
            (((v - min) / width) as usize).min(bins - 1)
        } else {
            0
        };
        counts[idx] += 1.0;
    }
    let centres = (0..bins)
        .map(|i| min + width * (i as f64 + 0.5))
        .collect();
    (centres, counts)
}
