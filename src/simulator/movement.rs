//! Nagel-Schreckenberg movement kernel: per-tick per-aircraft local
//! rules (accelerate, gap-brake, random-brake, advance), hold-point
//! gating before runway entry, and edge/runway transitions.
//!
//! Aircraft are processed front-to-back (highest edge index and
//! position first) so gap calculations observe already-updated
//! positions of the aircraft ahead.

use std::cmp::Ordering;

use rand::rngs::StdRng;
use rand::Rng;
use tracing::debug;

use crate::layout::{EdgeType, Layout, NodeType};
use crate::params::{Environment, SimulationParams};
use crate::simulator::capacity::CapacityState;
use crate::simulator::rules;
use crate::simulator::spawning::{Aircraft, FlightStatus};

/// Acceleration and braking rate, m/s^2.
pub const ACCELERATION: f64 = 2.0;
/// Random braking probability per tick.
pub const P_SLOW: f64 = 0.2;
/// Minimum gap kept to the aircraft ahead, metres.
const SAFETY_BUFFER: f64 = 10.0;
/// An aircraft is "at" a hold point within the last 5% of its edge.
const HOLD_ZONE_FRACTION: f64 = 0.95;
/// Finished aircraft stay in the active set this long for late metric
/// accounting, seconds of simulated time.
const COMPLETED_RETENTION: f64 = 60.0;

/// Complete mutable state of the running simulation.
#[derive(Debug, Default)]
pub struct SimulationState {
    pub aircraft: Vec<Aircraft>,
    pub time: f64,
    /// Finished aircraft evicted from the active set.
    pub completed: Vec<Aircraft>,
}

impl SimulationState {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Observables computed at the end of one movement step.
#[derive(Debug, Clone)]
pub struct TickObservables {
    pub time: f64,
    pub aircraft_on_ground: usize,
    pub departures_on_ground: usize,
    pub arrivals_on_ground: usize,
    pub queue_length_total: usize,
    pub queue_length_max: usize,
    pub runways_occupied: usize,
    pub newly_completed: Vec<String>,
}

/// Advance the simulation by one tick.
pub fn step(
    state: &mut SimulationState,
    layout: &Layout,
    params: &SimulationParams,
    env: &Environment,
    capacity: &mut CapacityState,
    dt: f64,
    rng: &mut StdRng,
) -> TickObservables {
    let new_time = state.time + dt;

    // Evict aircraft that finished more than the retention period ago.
    let mut active = Vec::with_capacity(state.aircraft.len());
    for ac in state.aircraft.drain(..) {
        let evict = ac.status.is_terminal()
            && ac.completion_time.map_or(false, |t| new_time - t > COMPLETED_RETENTION);
        if evict {
            state.completed.push(ac);
        } else {
            active.push(ac);
        }
    }
    state.aircraft = active;

    // Front-to-back order: leaders move first.
    let mut order: Vec<usize> = (0..state.aircraft.len()).collect();
    order.sort_by(|&a, &b| {
        let ka = &state.aircraft[a];
        let kb = &state.aircraft[b];
        kb.current_edge_idx
            .cmp(&ka.current_edge_idx)
            .then(
                kb.position_on_edge
                    .partial_cmp(&ka.position_on_edge)
                    .unwrap_or(Ordering::Equal),
            )
    });

    let mut newly_completed = Vec::new();
    for &idx in &order {
        if state.aircraft[idx].status.is_terminal() {
            continue;
        }
        if route_finished(&state.aircraft[idx]) {
            finish_aircraft(&mut state.aircraft[idx], new_time, capacity);
            newly_completed.push(state.aircraft[idx].id.clone());
            continue;
        }

        nasch_step(&mut state.aircraft, idx, layout, params, env, capacity, dt, rng);

        if route_finished(&state.aircraft[idx]) {
            finish_aircraft(&mut state.aircraft[idx], new_time, capacity);
            newly_completed.push(state.aircraft[idx].id.clone());
        }
    }

    state.time = new_time;

    let (queue_length_total, queue_length_max) = capacity.queue_lengths();
    let non_terminal = state.aircraft.iter().filter(|a| !a.status.is_terminal());
    let (mut on_ground, mut departures, mut arrivals) = (0, 0, 0);
    for ac in non_terminal {
        on_ground += 1;
        if ac.is_arrival {
            arrivals += 1;
        } else {
            departures += 1;
        }
    }

    TickObservables {
        time: new_time,
        aircraft_on_ground: on_ground,
        departures_on_ground: departures,
        arrivals_on_ground: arrivals,
        queue_length_total,
        queue_length_max,
        runways_occupied: capacity.occupied_runways(),
        newly_completed,
    }
}

fn route_finished(ac: &Aircraft) -> bool {
    ac.route.as_ref().map_or(true, |r| ac.current_edge_idx >= r.edges.len())
}

/// Apply the local update rules to one aircraft.
fn nasch_step(
    aircraft: &mut [Aircraft],
    idx: usize,
    layout: &Layout,
    params: &SimulationParams,
    env: &Environment,
    capacity: &mut CapacityState,
    dt: f64,
    rng: &mut StdRng,
) {
    let (id, class, is_arrival, edge_idx, edge_id, next_edge_id, position, speed) = {
        let ac = &aircraft[idx];
        let route = match ac.route.as_ref() {
            Some(r) => r,
            None => return,
        };
        let edge_id = match route.edges.get(ac.current_edge_idx) {
            Some(e) => e.clone(),
            None => return,
        };
        (
            ac.id.clone(),
            ac.aircraft_class,
            ac.is_arrival,
            ac.current_edge_idx,
            edge_id,
            route.edges.get(ac.current_edge_idx + 1).cloned(),
            ac.position_on_edge,
            ac.speed,
        )
    };

    let edge = match layout.get_edge(&edge_id) {
        Some(e) => e,
        None => {
            // Broken route: the edge id is unknown. Finish immediately.
            debug!("[MOVEMENT] {} route references unknown edge {}, finishing", id, edge_id);
            capacity.remove_from_edge(&id, &edge_id);
            let route_len = aircraft[idx].route.as_ref().map_or(0, |r| r.edges.len());
            aircraft[idx].current_edge_idx = route_len;
            return;
        }
    };
    let edge_len = layout.edge_length(edge);

    // Hold-point gating before runway entry.
    let at_hold_zone = position >= HOLD_ZONE_FRACTION * edge_len;
    let end_is_hold = layout
        .get_node(&edge.end_node)
        .map_or(false, |n| n.node_type == NodeType::HoldPoint);
    if at_hold_zone && end_is_hold {
        if let Some(next_id) = next_edge_id.as_deref() {
            let next_is_runway = layout
                .get_edge(next_id)
                .map_or(false, |e| e.edge_type == EdgeType::Runway);
            // An aircraft that already claimed a runway has been
            // released; it must not gate on its own occupation.
            if next_is_runway && capacity.runway_for(&id).is_none() {
                let can_release =
                    capacity.is_runway_available(None) && !capacity.is_edge_full(next_id);
                if !can_release {
                    aircraft[idx].speed = 0.0;
                    capacity.add_to_hold(&id, &edge.end_node);
                    return;
                }
                // Cleared: claim the first available runway and leave
                // the queue, crediting the time spent waiting.
                if let Some(runway) = capacity.available_runway().map(str::to_string) {
                    capacity.occupy_runway(&runway, &id, is_arrival);
                    debug!("[MOVEMENT] {} released from hold, occupying {}", id, runway);
                }
                if let Some(waited) = capacity.remove_from_hold(&id, &edge.end_node) {
                    aircraft[idx].wait_time += waited;
                }
            }
        }
    }

    // 1. Accelerate towards the speed limit.
    let vmax = rules::speed_limit(edge, class, params, env.weather);
    let mut v = (speed + ACCELERATION * dt).min(vmax);

    // 2. Brake for the aircraft ahead.
    if let Some(gap) = gap_to_leader(aircraft, idx, layout) {
        let max_safe = (gap - SAFETY_BUFFER).max(0.0) / dt;
        v = v.min(max_safe);
    }

    // 3. Random braking.
    if v > 0.0 && rng.gen::<f64>() < P_SLOW {
        v = (v - ACCELERATION * dt).max(0.0);
    }

    // 4. Advance.
    let v = v.max(0.0);
    {
        let ac = &mut aircraft[idx];
        ac.speed = v;
        ac.position_on_edge += v * dt;
    }

    // Edge transition; the overflow seeds the next edge's position.
    if aircraft[idx].position_on_edge >= edge_len {
        let overflow = aircraft[idx].position_on_edge - edge_len;
        capacity.remove_from_edge(&id, &edge_id);

        if edge.edge_type == EdgeType::Runway {
            if let Some(runway) = capacity.runway_for(&id) {
                capacity.release_runway(&runway);
            }
        }

        match next_edge_id {
            Some(next_id) => {
                capacity.add_to_edge(&id, &next_id);
                let next_is_runway = layout
                    .get_edge(&next_id)
                    .map_or(false, |e| e.edge_type == EdgeType::Runway);

                let ac = &mut aircraft[idx];
                ac.current_edge_idx = edge_idx + 1;
                ac.position_on_edge = overflow.max(0.0);
                if next_is_runway {
                    ac.status = if is_arrival {
                        FlightStatus::Landing
                    } else {
                        FlightStatus::TakingOff
                    };
                } else if ac.status == FlightStatus::TakingOff {
                    ac.status = FlightStatus::TaxiingOut;
                } else if ac.status == FlightStatus::Landing {
                    ac.status = FlightStatus::TaxiingIn;
                }
            }
            None => {
                // End of route; completion is handled by the caller.
                aircraft[idx].current_edge_idx = edge_idx + 1;
            }
        }
    }
}

/// Distance to the nearest aircraft ahead, on the same edge or the next
/// edge of the route. None means an unbounded gap. A gap across a
/// missing edge is treated as unbounded.
fn gap_to_leader(aircraft: &[Aircraft], idx: usize, layout: &Layout) -> Option<f64> {
    let ac = &aircraft[idx];
    let route = ac.route.as_ref()?;
    let edge_id = route.edges.get(ac.current_edge_idx)?;
    let next_edge_id = route.edges.get(ac.current_edge_idx + 1);
    let edge_len = layout.get_edge(edge_id).map(|e| layout.edge_length(e));

    let mut min_gap = f64::INFINITY;
    for (i, other) in aircraft.iter().enumerate() {
        if i == idx || other.status.is_terminal() {
            continue;
        }
        let other_edge = match other.current_edge_id() {
            Some(e) => e,
            None => continue,
        };
        if other_edge == edge_id {
            if other.position_on_edge > ac.position_on_edge {
                min_gap = min_gap.min(other.position_on_edge - ac.position_on_edge);
            }
        } else if let Some(next_id) = next_edge_id {
            if other_edge == next_id.as_str() {
                if let Some(len) = edge_len {
                    min_gap = min_gap.min((len - ac.position_on_edge) + other.position_on_edge);
                }
            }
        }
    }

    min_gap.is_finite().then_some(min_gap)
}

/// Mark an aircraft finished and release its resources. Arrivals park
/// and keep their gate; departures free it.
fn finish_aircraft(ac: &mut Aircraft, time: f64, capacity: &mut CapacityState) {
    ac.completion_time = Some(time);
    ac.speed = 0.0;
    ac.taxi_time = Some(time - ac.spawning_time);

    if ac.is_arrival {
        ac.status = FlightStatus::Parked;
    } else {
        ac.status = FlightStatus::Departed;
        if let Some(gate) = ac.gate_id.as_deref() {
            capacity.release_gate(gate);
        }
    }

    if let Some(runway) = capacity.runway_for(&ac.id) {
        capacity.release_runway(&runway);
    }
    if let Some(edge_id) = ac.current_edge_id().map(str::to_string) {
        capacity.remove_from_edge(&ac.id, &edge_id);
    }

    debug!(
        "[MOVEMENT] Flight completed after {:.1}s: {}",
        ac.taxi_time.unwrap_or(0.0),
        ac
    );
}
