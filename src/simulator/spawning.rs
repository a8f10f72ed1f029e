//! Aircraft admission: arrival/departure spawning under the traffic
//! parameters, gate assignment, endpoint selection and route attach.

use std::fmt;

use rand::rngs::StdRng;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::layout::{AircraftClass, Layout};
use crate::params::{Environment, SimulationParams};
use crate::simulator::capacity::CapacityState;
use crate::simulator::routing::{Route, Router};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlightStatus {
    Scheduled,
    TaxiingOut,
    TakingOff,
    Departed,
    Landing,
    TaxiingIn,
    Parked,
}

impl FlightStatus {
    /// Terminal states: the flight is finished and only retained for
    /// late metric accounting.
    pub fn is_terminal(&self) -> bool {
        matches!(self, FlightStatus::Departed | FlightStatus::Parked)
    }
}

/// A single aircraft. Created by the spawner, mutated only by the
/// driver and movement kernel.
#[derive(Debug, Clone)]
pub struct Aircraft {
    pub id: String,
    pub aircraft_class: AircraftClass,
    pub is_arrival: bool,
    pub route: Option<Route>,
    /// Index into route.edges of the edge currently occupied.
    pub current_edge_idx: usize,
    /// Metres from the start of the current edge.
    pub position_on_edge: f64,
    /// m/s, never negative.
    pub speed: f64,
    pub status: FlightStatus,
    pub gate_id: Option<String>,
    pub spawning_time: f64,
    pub completion_time: Option<f64>,
    pub taxi_time: Option<f64>,
    /// Seconds spent queued at hold points.
    pub wait_time: f64,
}

impl Aircraft {
    pub fn current_edge_id(&self) -> Option<&str> {
        self.route
            .as_ref()
            .and_then(|r| r.edges.get(self.current_edge_idx))
            .map(|s| s.as_str())
    }

    pub fn direction(&self) -> &'static str {
        if self.is_arrival {
            "arrival"
        } else {
            "departure"
        }
    }
}

impl fmt::Display for Aircraft {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} {:?}) edge={} pos={:.1}m speed={:.1}m/s",
            self.id,
            self.direction(),
            self.status,
            self.current_edge_id().unwrap_or("-"),
            self.position_on_edge,
            self.speed,
        )
    }
}

/// Spawns at most one aircraft per direction per tick, approximating a
/// Poisson arrival process with a Bernoulli trial per tick.
#[derive(Debug, Default)]
pub struct Spawner {
    dep_seq: u32,
    arr_seq: u32,
}

impl Spawner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Try to spawn one departure: gate origin, active runway end
    /// destination. Returns None (with the gate released) when no gate
    /// or no route is available.
    pub fn spawn_departure(
        &mut self,
        layout: &Layout,
        params: &SimulationParams,
        env: &Environment,
        capacity: &mut CapacityState,
        router: &mut Router,
        rng: &mut StdRng,
        time: f64,
        dt: f64,
    ) -> Option<Aircraft> {
        let rate = params.spawn_rate(false, rng);
        if rate <= 0.0 {
            return None;
        }
        let p = (rate / 60.0) * dt;
        if rng.gen::<f64>() > p {
            return None;
        }

        let class = params.sample_aircraft_class(false, rng);

        let gate_id = match capacity.assign_gate("PENDING", None, None, Some(class)) {
            Some(g) => g,
            None => {
                debug!("[SPAWNER] No free gate for {} departure, spawn skipped", class.as_str());
                return None;
            }
        };

        let destinations = router.departure_destinations(layout, env.wind_direction);
        if destinations.is_empty() {
            capacity.release_gate(&gate_id);
            return None;
        }
        let destination = destinations[rng.gen_range(0..destinations.len())].id.clone();

        let route = match router.get_route(layout, &gate_id, &destination, class, false) {
            Some(r) if !r.is_empty() => r,
            _ => {
                debug!("[SPAWNER] No route from {} to {}, departure spawn skipped", gate_id, destination);
                capacity.release_gate(&gate_id);
                return None;
            }
        };

        self.dep_seq += 1;
        let id = format!("DEP_{:04}", self.dep_seq);
        capacity.set_gate_occupant(&gate_id, &id);
        capacity.add_to_edge(&id, &route.edges[0]);

        debug!("[SPAWNER] Spawned departure {} at gate {} bound for {}", id, gate_id, destination);
        Some(Aircraft {
            id,
            aircraft_class: class,
            is_arrival: false,
            route: Some(route),
            current_edge_idx: 0,
            position_on_edge: 0.0,
            speed: 0.0,
            status: FlightStatus::TaxiingOut,
            gate_id: Some(gate_id),
            spawning_time: time,
            completion_time: None,
            taxi_time: None,
            wait_time: 0.0,
        })
    }

    /// Try to spawn one arrival: active runway end origin, gate
    /// destination. The gate is reserved at spawn time.
    pub fn spawn_arrival(
        &mut self,
        layout: &Layout,
        params: &SimulationParams,
        env: &Environment,
        capacity: &mut CapacityState,
        router: &mut Router,
        rng: &mut StdRng,
        time: f64,
        dt: f64,
    ) -> Option<Aircraft> {
        let rate = params.spawn_rate(true, rng);
        if rate <= 0.0 {
            return None;
        }
        let p = (rate / 60.0) * dt;
        if rng.gen::<f64>() > p {
            return None;
        }

        let class = params.sample_aircraft_class(true, rng);

        let origins = router.arrival_origins(layout, env.wind_direction);
        if origins.is_empty() {
            return None;
        }
        let origin = origins[rng.gen_range(0..origins.len())].id.clone();

        let gate_id = match capacity.assign_gate("PENDING", None, None, Some(class)) {
            Some(g) => g,
            None => {
                debug!("[SPAWNER] No free gate for {} arrival, spawn skipped", class.as_str());
                return None;
            }
        };

        let route = match router.get_route(layout, &origin, &gate_id, class, true) {
            Some(r) if !r.is_empty() => r,
            _ => {
                debug!("[SPAWNER] No route from {} to gate {}, arrival spawn skipped", origin, gate_id);
                capacity.release_gate(&gate_id);
                return None;
            }
        };

        self.arr_seq += 1;
        let id = format!("ARR_{:04}", self.arr_seq);
        capacity.set_gate_occupant(&gate_id, &id);
        capacity.add_to_edge(&id, &route.edges[0]);

        debug!("[SPAWNER] Spawned arrival {} at {} bound for gate {}", id, origin, gate_id);
        Some(Aircraft {
            id,
            aircraft_class: class,
            is_arrival: true,
            route: Some(route),
            current_edge_idx: 0,
            position_on_edge: 0.0,
            speed: 0.0,
            status: FlightStatus::Landing,
            gate_id: Some(gate_id),
            spawning_time: time,
            completion_time: None,
            taxi_time: None,
            wait_time: 0.0,
        })
    }
}
