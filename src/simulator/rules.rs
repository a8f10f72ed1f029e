//! Pure rule functions interpreting the layout and parameters into
//! movement constraints: access, speed, separation and priority.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use std::cmp::Reverse;

use crate::layout::{AircraftClass, Edge, EdgeType, AllowedFlow};
use crate::params::{PriorityMode, SectionType, SimulationParams, WeatherCondition};

/// Whether an aircraft may use an edge.
///
/// Arrival-only edges reject departures and vice versa; rapid exits are
/// arrival-only regardless of flow. Class restrictions on edges are
/// reserved for extension.
pub fn can_access(edge: &Edge, _class: AircraftClass, is_arrival: bool) -> bool {
    if edge.allowed_flow == AllowedFlow::Arrival && !is_arrival {
        return false;
    }
    if edge.allowed_flow == AllowedFlow::Departure && is_arrival {
        return false;
    }
    if edge.edge_type == EdgeType::RapidExit && !is_arrival {
        return false;
    }
    true
}

/// Section type of an edge for speed/separation lookups. Rapid exits
/// count as taxiway.
pub fn section_type(edge: &Edge) -> SectionType {
    match edge.edge_type {
        EdgeType::Runway => SectionType::Runway,
        EdgeType::ApronLink => SectionType::Apron,
        EdgeType::Taxiway | EdgeType::RapidExit => SectionType::Taxiway,
    }
}

/// Allowed speed on an edge, capped by the edge's speed hint if set.
pub fn speed_limit(
    edge: &Edge,
    class: AircraftClass,
    params: &SimulationParams,
    weather: WeatherCondition,
) -> f64 {
    let calculated = params.speed_limit(class, section_type(edge), weather);
    match edge.speed_hint {
        Some(hint) => calculated.min(hint),
        None => calculated,
    }
}

/// Required separation distance on an edge. On runways this is moot
/// (single occupancy) but still defined for approach/departure use.
pub fn separation_distance(
    edge: &Edge,
    params: &SimulationParams,
    weather: WeatherCondition,
) -> f64 {
    params.separation(section_type(edge), weather)
}

/// Permutation of queue indices in release order (first = highest
/// priority). Fifo is the stable identity; random consults the run RNG.
pub fn priority_order<A, S>(
    len: usize,
    mode: PriorityMode,
    arrival_of: A,
    size_of: S,
    rng: &mut StdRng,
) -> Vec<usize>
where
    A: Fn(usize) -> bool,
    S: Fn(usize) -> AircraftClass,
{
    let mut indices: Vec<usize> = (0..len).collect();
    match mode {
        PriorityMode::Fifo | PriorityMode::Weighted => {}
        PriorityMode::Random => indices.shuffle(rng),
        PriorityMode::DepartFirst => indices.sort_by_key(|&i| arrival_of(i)),
        PriorityMode::ArriveFirst => indices.sort_by_key(|&i| !arrival_of(i)),
        PriorityMode::SizePriority => indices.sort_by_key(|&i| Reverse(size_of(i))),
    }
    indices
}

/// Index of the next queue entry to release, or None for an empty queue.
pub fn next_to_release<A, S>(
    len: usize,
    mode: PriorityMode,
    arrival_of: A,
    size_of: S,
    rng: &mut StdRng,
) -> Option<usize>
where
    A: Fn(usize) -> bool,
    S: Fn(usize) -> AircraftClass,
{
    priority_order(len, mode, arrival_of, size_of, rng).into_iter().next()
}

/// Active runway direction from the wind, for an east-west airfield.
/// Aircraft face into the wind: wind from the western half selects "27".
pub fn active_runway_direction(wind_from_degrees: f64) -> &'static str {
    let wind = wind_from_degrees.rem_euclid(360.0);
    if (180.0..360.0).contains(&wind) {
        "27"
    } else {
        "09"
    }
}
