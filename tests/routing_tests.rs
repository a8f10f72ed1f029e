use std::collections::BTreeSet;

use airside_sim::layout::{AircraftClass, AllowedFlow, Edge, EdgeType, Layout, Node, NodeType};
use airside_sim::simulator::routing::Router;

fn node(id: &str, node_type: NodeType, x: f64, y: f64) -> Node {
    Node {
        id: id.to_string(),
        node_type,
        x,
        y,
        name: id.to_string(),
        apron: None,
        size_class: None,
    }
}

fn edge(id: &str, edge_type: EdgeType, start: &str, end: &str, length: f64) -> Edge {
    Edge {
        id: id.to_string(),
        edge_type,
        start_node: start.to_string(),
        end_node: end.to_string(),
        length,
        allowed_flow: AllowedFlow::Both,
        one_way: false,
        speed_hint: None,
        capacity_hint: None,
        polyline: Vec::new(),
    }
}

/// Two taxiway paths from A to D: a short one through B and a longer
/// one through C.
fn diamond_layout() -> Layout {
    let mut layout = Layout::new("Diamond", "1.0");
    layout.add_node(node("A", NodeType::Gate, 0.0, 0.0));
    layout.add_node(node("B", NodeType::Intersection, 100.0, 50.0));
    layout.add_node(node("C", NodeType::Intersection, 100.0, -80.0));
    layout.add_node(node("D", NodeType::RunwayEnd, 200.0, 0.0));
    layout.add_edge(edge("AB", EdgeType::Taxiway, "A", "B", 100.0));
    layout.add_edge(edge("BD", EdgeType::Taxiway, "B", "D", 100.0));
    layout.add_edge(edge("AC", EdgeType::Taxiway, "A", "C", 150.0));
    layout.add_edge(edge("CD", EdgeType::Taxiway, "C", "D", 150.0));
    // Keep validation happy: the diamond feeds a runway.
    layout.add_node(node("R27", NodeType::RunwayEnd, 300.0, 0.0));
    layout.add_edge(edge("RWY", EdgeType::Runway, "D", "R27", 100.0));
    layout
}

#[test]
fn test_shortest_path_wins() {
    let layout = diamond_layout();
    let router = Router::new();

    let route = router
        .find_route(&layout, "A", "D", AircraftClass::Medium, false)
        .expect("path exists");
    assert_eq!(route.edges, vec!["AB", "BD"]);
    assert!((route.total_length - 200.0).abs() < 1e-9);
    assert_eq!(route.origin_node, "A");
    assert_eq!(route.destination_node, "D");
}

#[test]
fn test_unreachable_is_none() {
    let mut layout = diamond_layout();
    layout.add_node(node("ISLAND", NodeType::Intersection, 999.0, 999.0));
    let router = Router::new();

    assert!(router
        .find_route(&layout, "A", "ISLAND", AircraftClass::Medium, false)
        .is_none());
    assert!(router
        .find_route(&layout, "A", "NO_SUCH_NODE", AircraftClass::Medium, false)
        .is_none());
}

#[test]
fn test_reroute_avoids_blocked_edge() {
    let layout = diamond_layout();
    let router = Router::new();

    let original = router
        .find_route(&layout, "A", "D", AircraftClass::Medium, false)
        .unwrap();

    // Blocking the short path forces the longer alternative with the
    // same endpoints.
    let blocked = BTreeSet::from(["BD".to_string()]);
    let rerouted = router
        .reroute_if_needed(
            &layout,
            "A",
            &original,
            0,
            AircraftClass::Medium,
            false,
            &blocked,
            &BTreeSet::new(),
        )
        .expect("an alternative exists");
    assert_eq!(rerouted.edges, vec!["AC", "CD"]);
    assert_eq!(rerouted.destination_node, original.destination_node);
}

#[test]
fn test_reroute_is_idempotent_when_nothing_blocked() {
    let layout = diamond_layout();
    let router = Router::new();

    let original = router
        .find_route(&layout, "A", "D", AircraftClass::Medium, false)
        .unwrap();

    // Blocked set disjoint from the remaining edges: keep the route.
    let blocked = BTreeSet::from(["AC".to_string()]);
    assert!(router
        .reroute_if_needed(
            &layout,
            "A",
            &original,
            0,
            AircraftClass::Medium,
            false,
            &blocked,
            &BTreeSet::new(),
        )
        .is_none());

    // Edges already consumed do not trigger a reroute either.
    let blocked = BTreeSet::from(["AB".to_string()]);
    assert!(router
        .reroute_if_needed(
            &layout,
            "B",
            &original,
            1,
            AircraftClass::Medium,
            false,
            &blocked,
            &BTreeSet::new(),
        )
        .is_none());
}

#[test]
fn test_congestion_doubles_cost() {
    let layout = diamond_layout();
    let router = Router::new();

    let original = router
        .find_route(&layout, "A", "D", AircraftClass::Medium, false)
        .unwrap();

    // AB blocked and CD congested: the bottom path still wins because
    // there is no other option, at doubled cost for CD.
    let blocked = BTreeSet::from(["AB".to_string()]);
    let congested = BTreeSet::from(["CD".to_string()]);
    let rerouted = router
        .reroute_if_needed(
            &layout,
            "A",
            &original,
            0,
            AircraftClass::Medium,
            false,
            &blocked,
            &congested,
        )
        .unwrap();
    assert_eq!(rerouted.edges, vec!["AC", "CD"]);
    assert!((rerouted.total_length - (150.0 + 300.0)).abs() < 1e-9);
}

#[test]
fn test_access_rules_shape_routes() {
    let mut layout = diamond_layout();
    // Make the short path departure-only; arrivals must go the long way.
    if let Some(e) = layout.edges.get_mut("BD") {
        e.allowed_flow = AllowedFlow::Departure;
    }
    let layout = layout;
    let router = Router::new();

    let dep = router
        .find_route(&layout, "A", "D", AircraftClass::Medium, false)
        .unwrap();
    assert_eq!(dep.edges, vec!["AB", "BD"]);

    let arr = router
        .find_route(&layout, "A", "D", AircraftClass::Medium, true)
        .unwrap();
    assert_eq!(arr.edges, vec!["AC", "CD"]);
}

#[test]
fn test_one_way_blocks_reverse_traversal() {
    let mut layout = Layout::new("OneWay", "1.0");
    layout.add_node(node("A", NodeType::Gate, 0.0, 0.0));
    layout.add_node(node("B", NodeType::RunwayEnd, 100.0, 0.0));
    let mut e = edge("AB", EdgeType::Taxiway, "A", "B", 100.0);
    e.one_way = true;
    layout.add_edge(e);
    layout.add_edge(edge("RWY", EdgeType::Runway, "A", "B", 100.0));
    let router = Router::new();

    let forward = router.find_route(&layout, "A", "B", AircraftClass::Medium, false);
    assert!(forward.is_some());

    // Only the bidirectional runway edge leads back.
    let back = router
        .find_route(&layout, "B", "A", AircraftClass::Medium, false)
        .unwrap();
    assert_eq!(back.edges, vec!["RWY"]);
}

#[test]
fn test_cache_populated_on_first_computation() {
    let layout = diamond_layout();
    let mut router = Router::new();
    assert_eq!(router.cached_route_count(), 0);

    let first = router
        .get_route(&layout, "A", "D", AircraftClass::Medium, false)
        .unwrap();
    assert_eq!(router.cached_route_count(), 1);

    let second = router
        .get_route(&layout, "A", "D", AircraftClass::Medium, false)
        .unwrap();
    assert_eq!(first, second);
    assert_eq!(router.cached_route_count(), 1);

    router.clear_cache();
    assert_eq!(router.cached_route_count(), 0);
}

#[test]
fn test_precompute_covers_gate_runway_pairs() {
    let layout = diamond_layout();
    let mut router = Router::new();
    router.precompute(&layout);

    // Gate A to runway ends D and R27, three classes, two directions.
    assert!(router.cached_route_count() >= 6);

    // Precomputed entries serve lookups without recomputation.
    let route = router
        .get_route(&layout, "A", "D", AircraftClass::Small, false)
        .unwrap();
    assert_eq!(route.edges, vec!["AB", "BD"]);
}

#[test]
fn test_active_runway_ends_follow_wind() {
    let mut layout = Layout::new("TwoEnds", "1.0");
    layout.add_node(node("G1", NodeType::Gate, 0.0, 0.0));
    layout.add_node(node("R09", NodeType::RunwayEnd, 0.0, 0.0));
    layout.add_node(node("R27", NodeType::RunwayEnd, 500.0, 0.0));
    layout.add_edge(edge("RWY", EdgeType::Runway, "R09", "R27", 500.0));
    let router = Router::new();

    // Wind from the west: land/take off on 27.
    let active = router.active_runway_ends(&layout, 270.0);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "R27");

    let active = router.active_runway_ends(&layout, 90.0);
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].id, "R09");
}

#[test]
fn test_unmatched_direction_falls_back_to_all_ends() {
    let mut layout = Layout::new("NoMatch", "1.0");
    layout.add_node(node("NORTH", NodeType::RunwayEnd, 0.0, 0.0));
    layout.add_node(node("SOUTH", NodeType::RunwayEnd, 0.0, 500.0));
    layout.add_edge(edge("RWY", EdgeType::Runway, "NORTH", "SOUTH", 500.0));
    let router = Router::new();

    // Neither node mentions "27": every runway end stays in play.
    let active = router.active_runway_ends(&layout, 270.0);
    assert_eq!(active.len(), 2);
}
