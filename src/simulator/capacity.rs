//! Book-keeping for every capacity-limited resource: gates, hold-point
//! queues, runways and per-edge occupancy. All per-tick mutation of
//! shared resources funnels through `CapacityState` so the invariants
//! can be audited in one place. Only aircraft ids are stored here; the
//! driver owns the aircraft themselves.

use std::collections::BTreeMap;

use rand::rngs::StdRng;
use serde::Serialize;

use crate::layout::{AircraftClass, EdgeType, Layout};
use crate::params::PriorityMode;
use crate::simulator::rules;

const DEFAULT_EDGE_CAPACITY: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum GateState {
    Free,
    Occupied,
    Reserved,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunwayState {
    Clear,
    OccupiedArrival,
    OccupiedDeparture,
}

#[derive(Debug, Clone)]
pub struct GateStatus {
    pub gate_id: String,
    pub apron: String,
    pub size_class: Option<AircraftClass>,
    pub state: GateState,
    pub occupied_by: Option<String>,
}

impl GateStatus {
    /// Free and size-compatible: aircraft class must not exceed the
    /// gate's size class; gates without one accept everything.
    pub fn is_available(&self, class: Option<AircraftClass>) -> bool {
        if self.state != GateState::Free {
            return false;
        }
        match (self.size_class, class) {
            (Some(gate_size), Some(ac_size)) => ac_size <= gate_size,
            _ => true,
        }
    }
}

/// Ordered queue of aircraft waiting at a hold point, with accumulated
/// waiting time per aircraft.
#[derive(Debug, Clone, Default)]
pub struct HoldQueue {
    pub hold_point_id: String,
    pub queue: Vec<String>,
    pub waiting_times: BTreeMap<String, f64>,
}

impl HoldQueue {
    pub fn new(hold_point_id: impl Into<String>) -> Self {
        Self { hold_point_id: hold_point_id.into(), ..Default::default() }
    }

    /// Deduplicated insert at the back of the queue.
    pub fn add(&mut self, aircraft_id: &str) {
        if !self.queue.iter().any(|id| id == aircraft_id) {
            self.queue.push(aircraft_id.to_string());
            self.waiting_times.insert(aircraft_id.to_string(), 0.0);
        }
    }

    /// Remove an aircraft, returning the waiting time it accumulated.
    pub fn remove(&mut self, aircraft_id: &str) -> Option<f64> {
        self.queue.retain(|id| id != aircraft_id);
        self.waiting_times.remove(aircraft_id)
    }

    pub fn advance_waiting(&mut self, dt: f64) {
        for id in &self.queue {
            *self.waiting_times.entry(id.clone()).or_insert(0.0) += dt;
        }
    }

    pub fn contains(&self, aircraft_id: &str) -> bool {
        self.queue.iter().any(|id| id == aircraft_id)
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }
}

#[derive(Debug, Clone)]
pub struct RunwayStatus {
    pub runway_id: String,
    pub state: RunwayState,
    pub current_aircraft: Option<String>,
    pub active_direction: Option<String>,
}

impl RunwayStatus {
    pub fn new(runway_id: impl Into<String>) -> Self {
        Self {
            runway_id: runway_id.into(),
            state: RunwayState::Clear,
            current_aircraft: None,
            active_direction: None,
        }
    }

    pub fn is_available(&self) -> bool {
        self.state == RunwayState::Clear
    }

    /// Occupy fails on a non-clear runway.
    pub fn occupy(&mut self, aircraft_id: &str, is_arrival: bool) -> bool {
        if !self.is_available() {
            return false;
        }
        self.current_aircraft = Some(aircraft_id.to_string());
        self.state = if is_arrival {
            RunwayState::OccupiedArrival
        } else {
            RunwayState::OccupiedDeparture
        };
        true
    }

    pub fn release(&mut self) {
        self.current_aircraft = None;
        self.state = RunwayState::Clear;
    }
}

/// Aircraft currently on one edge; `capacity` is the soft "full"
/// threshold.
#[derive(Debug, Clone)]
pub struct EdgeOccupancy {
    pub edge_id: String,
    pub aircraft_ids: Vec<String>,
    pub capacity: u32,
}

impl EdgeOccupancy {
    pub fn new(edge_id: impl Into<String>, capacity: u32) -> Self {
        Self { edge_id: edge_id.into(), aircraft_ids: Vec::new(), capacity }
    }

    pub fn add(&mut self, aircraft_id: &str) {
        if !self.aircraft_ids.iter().any(|id| id == aircraft_id) {
            self.aircraft_ids.push(aircraft_id.to_string());
        }
    }

    pub fn remove(&mut self, aircraft_id: &str) {
        self.aircraft_ids.retain(|id| id != aircraft_id);
    }

    pub fn count(&self) -> usize {
        self.aircraft_ids.len()
    }

    pub fn is_full(&self) -> bool {
        self.aircraft_ids.len() >= self.capacity as usize
    }
}

/// Pure-data view of the capacity state for observation.
#[derive(Debug, Clone, Serialize)]
pub struct CapacitySnapshot {
    pub gates: BTreeMap<String, GateSnapshot>,
    pub holds: BTreeMap<String, HoldSnapshot>,
    pub runways: BTreeMap<String, RunwaySnapshot>,
    pub edge_occupancies: BTreeMap<String, usize>,
}

#[derive(Debug, Clone, Serialize)]
pub struct GateSnapshot {
    pub state: GateState,
    pub occupied_by: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct HoldSnapshot {
    pub queue_length: usize,
    pub queue: Vec<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunwaySnapshot {
    pub state: RunwayState,
    pub aircraft: Option<String>,
}

/// Central state for all capacity-limited resources.
#[derive(Debug, Clone, Default)]
pub struct CapacityState {
    pub gates: BTreeMap<String, GateStatus>,
    pub holds: BTreeMap<String, HoldQueue>,
    pub runways: BTreeMap<String, RunwayStatus>,
    pub edges: BTreeMap<String, EdgeOccupancy>,
}

impl CapacityState {
    /// Scan the layout: one gate record per gate node, one hold queue
    /// per hold point, one runway record per runway edge (synthetic
    /// `RWY_MAIN` if there are none), one occupancy record per edge.
    pub fn from_layout(layout: &Layout) -> Self {
        let mut state = CapacityState::default();

        for node in layout.get_gates(None) {
            state.gates.insert(
                node.id.clone(),
                GateStatus {
                    gate_id: node.id.clone(),
                    apron: node.apron.clone().unwrap_or_else(|| "default".to_string()),
                    size_class: node.size_class,
                    state: GateState::Free,
                    occupied_by: None,
                },
            );
        }

        for node in layout.get_hold_points() {
            state.holds.insert(node.id.clone(), HoldQueue::new(node.id.clone()));
        }

        for edge in layout.get_edges_by_type(EdgeType::Runway) {
            let runway_id = format!("RWY_{}", edge.id);
            state
                .runways
                .entry(runway_id.clone())
                .or_insert_with(|| RunwayStatus::new(runway_id));
        }
        if state.runways.is_empty() {
            state.runways.insert("RWY_MAIN".to_string(), RunwayStatus::new("RWY_MAIN"));
        }

        for (edge_id, edge) in &layout.edges {
            let capacity = edge.capacity_hint.unwrap_or(DEFAULT_EDGE_CAPACITY);
            state
                .edges
                .insert(edge_id.clone(), EdgeOccupancy::new(edge_id.clone(), capacity));
        }

        state
    }

    // --- gates ---

    pub fn available_gates(
        &self,
        apron: Option<&str>,
        class: Option<AircraftClass>,
    ) -> Vec<String> {
        self.gates
            .values()
            .filter(|g| apron.map_or(true, |a| g.apron == a))
            .filter(|g| g.is_available(class))
            .map(|g| g.gate_id.clone())
            .collect()
    }

    /// Assign a gate (a specific one, or the first available match).
    /// Returns the gate id, or None if nothing suitable is free.
    pub fn assign_gate(
        &mut self,
        aircraft_id: &str,
        gate_id: Option<&str>,
        apron: Option<&str>,
        class: Option<AircraftClass>,
    ) -> Option<String> {
        let chosen = match gate_id {
            Some(id) => {
                let gate = self.gates.get(id)?;
                if !gate.is_available(class) {
                    return None;
                }
                id.to_string()
            }
            None => self.available_gates(apron, class).into_iter().next()?,
        };

        let gate = self.gates.get_mut(&chosen)?;
        gate.state = GateState::Occupied;
        gate.occupied_by = Some(aircraft_id.to_string());
        Some(chosen)
    }

    pub fn release_gate(&mut self, gate_id: &str) {
        if let Some(gate) = self.gates.get_mut(gate_id) {
            gate.state = GateState::Free;
            gate.occupied_by = None;
        }
    }

    /// Patch the occupant id (used after the real aircraft id is known).
    pub fn set_gate_occupant(&mut self, gate_id: &str, aircraft_id: &str) {
        if let Some(gate) = self.gates.get_mut(gate_id) {
            gate.occupied_by = Some(aircraft_id.to_string());
        }
    }

    pub fn gate_for(&self, aircraft_id: &str) -> Option<&str> {
        self.gates
            .values()
            .find(|g| g.occupied_by.as_deref() == Some(aircraft_id))
            .map(|g| g.gate_id.as_str())
    }

    // --- hold queues ---

    pub fn add_to_hold(&mut self, aircraft_id: &str, hold_point_id: &str) {
        self.holds
            .entry(hold_point_id.to_string())
            .or_insert_with(|| HoldQueue::new(hold_point_id))
            .add(aircraft_id);
    }

    /// Remove from a hold queue, returning accumulated waiting time.
    pub fn remove_from_hold(&mut self, aircraft_id: &str, hold_point_id: &str) -> Option<f64> {
        self.holds.get_mut(hold_point_id)?.remove(aircraft_id)
    }

    pub fn hold_queue_length(&self, hold_point_id: &str) -> usize {
        self.holds.get(hold_point_id).map_or(0, |h| h.len())
    }

    pub fn advance_waiting(&mut self, dt: f64) {
        for hold in self.holds.values_mut() {
            hold.advance_waiting(dt);
        }
    }

    /// Release is possible iff the queue is non-empty and the specified
    /// runway (or any runway) is clear.
    pub fn can_release_from_hold(&self, hold_point_id: &str, runway_id: Option<&str>) -> bool {
        if self.holds.get(hold_point_id).map_or(true, |h| h.is_empty()) {
            return false;
        }
        self.is_runway_available(runway_id)
    }

    /// Next aircraft to release from a hold under the given priority
    /// mode. `info` maps aircraft id to (is_arrival, class); missing
    /// entries default to a medium departure.
    pub fn next_from_hold(
        &self,
        hold_point_id: &str,
        mode: PriorityMode,
        info: &BTreeMap<String, (bool, AircraftClass)>,
        rng: &mut StdRng,
    ) -> Option<String> {
        let queue = &self.holds.get(hold_point_id)?.queue;
        if queue.is_empty() {
            return None;
        }
        let arrival_of = |i: usize| info.get(&queue[i]).map_or(false, |(a, _)| *a);
        let size_of =
            |i: usize| info.get(&queue[i]).map_or(AircraftClass::Medium, |(_, c)| *c);
        rules::next_to_release(queue.len(), mode, arrival_of, size_of, rng)
            .map(|i| queue[i].clone())
    }

    // --- runways ---

    pub fn is_runway_available(&self, runway_id: Option<&str>) -> bool {
        match runway_id {
            Some(id) => self.runways.get(id).map_or(false, |r| r.is_available()),
            None => self.runways.values().any(|r| r.is_available()),
        }
    }

    pub fn available_runway(&self) -> Option<&str> {
        self.runways
            .values()
            .find(|r| r.is_available())
            .map(|r| r.runway_id.as_str())
    }

    pub fn occupy_runway(&mut self, runway_id: &str, aircraft_id: &str, is_arrival: bool) -> bool {
        self.runways
            .get_mut(runway_id)
            .map_or(false, |r| r.occupy(aircraft_id, is_arrival))
    }

    pub fn release_runway(&mut self, runway_id: &str) {
        if let Some(runway) = self.runways.get_mut(runway_id) {
            runway.release();
        }
    }

    pub fn runway_for(&self, aircraft_id: &str) -> Option<String> {
        self.runways
            .values()
            .find(|r| r.current_aircraft.as_deref() == Some(aircraft_id))
            .map(|r| r.runway_id.clone())
    }

    pub fn occupied_runways(&self) -> usize {
        self.runways.values().filter(|r| !r.is_available()).count()
    }

    pub fn set_active_direction(&mut self, direction: &str) {
        for runway in self.runways.values_mut() {
            runway.active_direction = Some(direction.to_string());
        }
    }

    // --- edge occupancy ---

    pub fn add_to_edge(&mut self, aircraft_id: &str, edge_id: &str) {
        self.edges
            .entry(edge_id.to_string())
            .or_insert_with(|| EdgeOccupancy::new(edge_id, DEFAULT_EDGE_CAPACITY))
            .add(aircraft_id);
    }

    pub fn remove_from_edge(&mut self, aircraft_id: &str, edge_id: &str) {
        if let Some(edge) = self.edges.get_mut(edge_id) {
            edge.remove(aircraft_id);
        }
    }

    pub fn edge_count(&self, edge_id: &str) -> usize {
        self.edges.get(edge_id).map_or(0, |e| e.count())
    }

    pub fn is_edge_full(&self, edge_id: &str) -> bool {
        self.edges.get(edge_id).map_or(false, |e| e.is_full())
    }

    /// Total and maximum hold queue lengths, for observation.
    pub fn queue_lengths(&self) -> (usize, usize) {
        let total = self.holds.values().map(|h| h.len()).sum();
        let max = self.holds.values().map(|h| h.len()).max().unwrap_or(0);
        (total, max)
    }

    pub fn snapshot(&self) -> CapacitySnapshot {
        CapacitySnapshot {
            gates: self
                .gates
                .iter()
                .map(|(id, g)| {
                    (id.clone(), GateSnapshot { state: g.state, occupied_by: g.occupied_by.clone() })
                })
                .collect(),
            holds: self
                .holds
                .iter()
                .map(|(id, h)| {
                    (id.clone(), HoldSnapshot { queue_length: h.len(), queue: h.queue.clone() })
                })
                .collect(),
            runways: self
                .runways
                .iter()
                .map(|(id, r)| {
                    (
                        id.clone(),
                        RunwaySnapshot { state: r.state, aircraft: r.current_aircraft.clone() },
                    )
                })
                .collect(),
            edge_occupancies: self.edges.iter().map(|(id, e)| (id.clone(), e.count())).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;

    fn gate(id: &str, apron: &str, size_class: Option<AircraftClass>) -> GateStatus {
        GateStatus {
            gate_id: id.to_string(),
            apron: apron.to_string(),
            size_class,
            state: GateState::Free,
            occupied_by: None,
        }
    }

    fn state_with_gates() -> CapacityState {
        let mut state = CapacityState::default();
        state.gates.insert("G1".into(), gate("G1", "apron_A", Some(AircraftClass::Medium)));
        state.gates.insert("G2".into(), gate("G2", "apron_B", Some(AircraftClass::Large)));
        state.gates.insert("G3".into(), gate("G3", "apron_A", None));
        state.runways.insert("RWY_MAIN".into(), RunwayStatus::new("RWY_MAIN"));
        state
    }

    #[test]
    fn test_gate_size_compatibility() {
        let state = state_with_gates();

        // Large aircraft fit only large or unrestricted gates.
        let available = state.available_gates(None, Some(AircraftClass::Large));
        assert_eq!(available, vec!["G2".to_string(), "G3".to_string()]);

        // Small aircraft fit everywhere.
        let available = state.available_gates(None, Some(AircraftClass::Small));
        assert_eq!(available.len(), 3);

        // Apron filter applies on top.
        let available = state.available_gates(Some("apron_A"), Some(AircraftClass::Small));
        assert_eq!(available, vec!["G1".to_string(), "G3".to_string()]);
    }

    #[test]
    fn test_gate_assignment_cycle() {
        let mut state = state_with_gates();

        let gate = state.assign_gate("AC1", None, None, Some(AircraftClass::Medium)).unwrap();
        assert_eq!(gate, "G1");
        assert_eq!(state.gate_for("AC1"), Some("G1"));
        assert_eq!(state.gates["G1"].state, GateState::Occupied);

        // A second medium lands on the next free gate.
        let gate2 = state.assign_gate("AC2", None, None, Some(AircraftClass::Medium)).unwrap();
        assert_eq!(gate2, "G2");

        state.release_gate("G1");
        assert_eq!(state.gates["G1"].state, GateState::Free);
        assert_eq!(state.gate_for("AC1"), None);

        // Specific-gate assignment fails when the gate is occupied.
        assert!(state.assign_gate("AC3", Some("G2"), None, None).is_none());
    }

    #[test]
    fn test_runway_mutual_exclusion() {
        let mut state = state_with_gates();

        assert!(state.is_runway_available(None));
        assert!(state.occupy_runway("RWY_MAIN", "AC1", false));
        assert_eq!(state.runways["RWY_MAIN"].state, RunwayState::OccupiedDeparture);

        // Occupy on a non-clear runway fails.
        assert!(!state.occupy_runway("RWY_MAIN", "AC2", true));
        assert_eq!(state.runway_for("AC1"), Some("RWY_MAIN".to_string()));
        assert_eq!(state.occupied_runways(), 1);

        state.release_runway("RWY_MAIN");
        assert!(state.is_runway_available(Some("RWY_MAIN")));
    }

    #[test]
    fn test_hold_queue_waiting() {
        let mut state = state_with_gates();
        state.holds.insert("H1".into(), HoldQueue::new("H1"));

        state.add_to_hold("AC1", "H1");
        state.add_to_hold("AC1", "H1"); // deduplicated
        state.add_to_hold("AC2", "H1");
        assert_eq!(state.hold_queue_length("H1"), 2);

        state.advance_waiting(1.0);
        state.advance_waiting(1.0);
        let waited = state.remove_from_hold("AC1", "H1").unwrap();
        assert!((waited - 2.0).abs() < 1e-9);
        assert_eq!(state.hold_queue_length("H1"), 1);
    }

    #[test]
    fn test_can_release_requires_clear_runway() {
        let mut state = state_with_gates();
        state.holds.insert("H1".into(), HoldQueue::new("H1"));

        // Empty queue: nothing to release.
        assert!(!state.can_release_from_hold("H1", None));

        state.add_to_hold("AC1", "H1");
        assert!(state.can_release_from_hold("H1", None));

        state.occupy_runway("RWY_MAIN", "AC0", true);
        assert!(!state.can_release_from_hold("H1", None));
    }

    #[test]
    fn test_next_from_hold_priority() {
        let mut rng = StdRng::seed_from_u64(3);
        let mut state = state_with_gates();
        state.holds.insert("H1".into(), HoldQueue::new("H1"));
        state.add_to_hold("DEP_1", "H1");
        state.add_to_hold("ARR_1", "H1");

        let info = BTreeMap::from([
            ("DEP_1".to_string(), (false, AircraftClass::Small)),
            ("ARR_1".to_string(), (true, AircraftClass::Large)),
        ]);

        let next = state.next_from_hold("H1", PriorityMode::Fifo, &info, &mut rng);
        assert_eq!(next.as_deref(), Some("DEP_1"));

        let next = state.next_from_hold("H1", PriorityMode::ArriveFirst, &info, &mut rng);
        assert_eq!(next.as_deref(), Some("ARR_1"));

        let next = state.next_from_hold("H1", PriorityMode::SizePriority, &info, &mut rng);
        assert_eq!(next.as_deref(), Some("ARR_1"));
    }

    #[test]
    fn test_edge_occupancy() {
        let mut state = CapacityState::default();
        state.edges.insert("E1".into(), EdgeOccupancy::new("E1", 2));

        state.add_to_edge("AC1", "E1");
        state.add_to_edge("AC1", "E1"); // no double count
        assert_eq!(state.edge_count("E1"), 1);
        assert!(!state.is_edge_full("E1"));

        state.add_to_edge("AC2", "E1");
        assert!(state.is_edge_full("E1"));

        state.remove_from_edge("AC1", "E1");
        assert_eq!(state.edge_count("E1"), 1);
        assert!(!state.is_edge_full("E1"));
    }
}
