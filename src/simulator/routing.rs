//! Pathfinding over the layout graph: Dijkstra shortest paths under the
//! access rules, a route cache, and congestion-aware rerouting.

use std::cmp::Ordering;
use std::collections::{BTreeSet, BinaryHeap, HashMap};

use tracing::debug;

use crate::layout::{AircraftClass, Layout, Node, NodeType};
use crate::simulator::rules;

/// A planned route: ordered edge ids from origin to destination. An
/// empty edge list is the "no path" sentinel.
#[derive(Debug, Clone, PartialEq)]
pub struct Route {
    pub edges: Vec<String>,
    pub origin_node: String,
    pub destination_node: String,
    pub total_length: f64,
}

impl Route {
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

type RouteKey = (String, String, AircraftClass, bool);

/// Min-heap entry; ties broken by node id so the search order does not
/// depend on float quirks.
#[derive(PartialEq)]
struct HeapEntry {
    dist: f64,
    node: String,
}

impl Eq for HeapEntry {}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .dist
            .partial_cmp(&self.dist)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.node.cmp(&self.node))
    }
}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Route planner with a cache keyed by (origin, destination, class,
/// direction). The cache must be dropped when the layout changes.
#[derive(Debug, Default)]
pub struct Router {
    cache: HashMap<RouteKey, Route>,
}

impl Router {
    pub fn new() -> Self {
        Self::default()
    }

    /// Precompute routes between gates and every runway endpoint
    /// (ends, entries, exits), for all classes, in both directions.
    pub fn precompute(&mut self, layout: &Layout) {
        let gates = layout.get_gates(None);
        let mut runway_points = layout.get_runway_ends();
        runway_points.extend(layout.get_nodes_by_type(NodeType::RunwayEntry));
        runway_points.extend(layout.get_nodes_by_type(NodeType::RunwayExit));

        for class in AircraftClass::ALL {
            for gate in &gates {
                for point in &runway_points {
                    if let Some(route) =
                        self.find_route(layout, &gate.id, &point.id, class, false)
                    {
                        if !route.is_empty() {
                            self.cache
                                .insert((gate.id.clone(), point.id.clone(), class, false), route);
                        }
                    }
                    if let Some(route) =
                        self.find_route(layout, &point.id, &gate.id, class, true)
                    {
                        if !route.is_empty() {
                            self.cache
                                .insert((point.id.clone(), gate.id.clone(), class, true), route);
                        }
                    }
                }
            }
        }
        debug!("[ROUTER] Precomputed {} routes", self.cache.len());
    }

    /// Shortest route under the access rules, or None if unreachable.
    /// Does not consult or populate the cache.
    pub fn find_route(
        &self,
        layout: &Layout,
        origin_id: &str,
        destination_id: &str,
        class: AircraftClass,
        is_arrival: bool,
    ) -> Option<Route> {
        if layout.get_node(origin_id).is_none() || layout.get_node(destination_id).is_none() {
            return None;
        }
        dijkstra(layout, origin_id, destination_id, class, is_arrival, None, None)
    }

    /// Cached route lookup; computes and caches on a miss.
    pub fn get_route(
        &mut self,
        layout: &Layout,
        origin_id: &str,
        destination_id: &str,
        class: AircraftClass,
        is_arrival: bool,
    ) -> Option<Route> {
        let key = (origin_id.to_string(), destination_id.to_string(), class, is_arrival);
        if let Some(route) = self.cache.get(&key) {
            return Some(route.clone());
        }
        let route = self.find_route(layout, origin_id, destination_id, class, is_arrival)?;
        if !route.is_empty() {
            self.cache.insert(key, route.clone());
        }
        Some(route)
    }

    /// Replan only when a remaining edge of the current route is
    /// blocked. The search starts at the current node and expands
    /// forward-legal edges only, so the consumed route prefix is never
    /// re-entered; congested edges cost double.
    pub fn reroute_if_needed(
        &self,
        layout: &Layout,
        current_node_id: &str,
        original: &Route,
        current_edge_idx: usize,
        class: AircraftClass,
        is_arrival: bool,
        blocked: &BTreeSet<String>,
        congested: &BTreeSet<String>,
    ) -> Option<Route> {
        let remaining = original.edges.get(current_edge_idx..).unwrap_or(&[]);
        if !remaining.iter().any(|e| blocked.contains(e)) {
            return None;
        }
        dijkstra(
            layout,
            current_node_id,
            &original.destination_node,
            class,
            is_arrival,
            Some(blocked),
            Some(congested),
        )
    }

    /// Runway-end nodes matching the active direction for this wind;
    /// all runway ends if none match.
    pub fn active_runway_ends<'a>(&self, layout: &'a Layout, wind_direction: f64) -> Vec<&'a Node> {
        let runway_ends = layout.get_runway_ends();
        let direction = rules::active_runway_direction(wind_direction);

        let active: Vec<&Node> = runway_ends
            .iter()
            .copied()
            .filter(|n| n.name.contains(direction) || n.id.contains(direction))
            .collect();
        if active.is_empty() {
            runway_ends
        } else {
            active
        }
    }

    /// Destination candidates for departures: the active runway ends.
    pub fn departure_destinations<'a>(
        &self,
        layout: &'a Layout,
        wind_direction: f64,
    ) -> Vec<&'a Node> {
        self.active_runway_ends(layout, wind_direction)
    }

    /// Spawn-point candidates for arrivals: the active runway ends.
    pub fn arrival_origins<'a>(&self, layout: &'a Layout, wind_direction: f64) -> Vec<&'a Node> {
        self.active_runway_ends(layout, wind_direction)
    }

    pub fn cached_route_count(&self) -> usize {
        self.cache.len()
    }

    /// Drop all cached routes. Required whenever the layout changes.
    pub fn clear_cache(&mut self) {
        self.cache.clear();
    }
}

fn dijkstra(
    layout: &Layout,
    origin_id: &str,
    destination_id: &str,
    class: AircraftClass,
    is_arrival: bool,
    blocked: Option<&BTreeSet<String>>,
    congested: Option<&BTreeSet<String>>,
) -> Option<Route> {
    let mut dist: HashMap<String, f64> = HashMap::new();
    let mut prev: HashMap<String, (String, String)> = HashMap::new();
    let mut visited: BTreeSet<String> = BTreeSet::new();
    let mut heap = BinaryHeap::new();

    dist.insert(origin_id.to_string(), 0.0);
    heap.push(HeapEntry { dist: 0.0, node: origin_id.to_string() });

    while let Some(HeapEntry { dist: d, node }) = heap.pop() {
        if visited.contains(&node) {
            continue;
        }
        visited.insert(node.clone());

        if node == destination_id {
            let mut edges = Vec::new();
            let mut cursor = node;
            while let Some((prev_node, edge_id)) = prev.get(&cursor) {
                edges.push(edge_id.clone());
                cursor = prev_node.clone();
            }
            edges.reverse();
            return Some(Route {
                edges,
                origin_node: origin_id.to_string(),
                destination_node: destination_id.to_string(),
                total_length: d,
            });
        }

        for edge in layout.get_edges_from_node(&node) {
            let next = if edge.start_node == node {
                &edge.end_node
            } else if !edge.one_way {
                &edge.start_node
            } else {
                continue;
            };
            if visited.contains(next) {
                continue;
            }
            if blocked.map_or(false, |b| b.contains(&edge.id)) {
                continue;
            }
            if !rules::can_access(edge, class, is_arrival) {
                continue;
            }

            let mut cost = layout.edge_length(edge);
            if congested.map_or(false, |c| c.contains(&edge.id)) {
                cost *= 2.0;
            }

            let next_dist = d + cost;
            if next_dist < dist.get(next).copied().unwrap_or(f64::INFINITY) {
                dist.insert(next.clone(), next_dist);
                prev.insert(next.clone(), (node.clone(), edge.id.clone()));
                heap.push(HeapEntry { dist: next_dist, node: next.clone() });
            }
        }
    }

    None
}
