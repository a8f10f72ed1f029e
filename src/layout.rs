use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::errors::SimError;

/// Types of nodes in the airport graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NodeType {
    #[default]
    Intersection,
    RunwayEnd,
    RunwayEntry,
    RunwayExit,
    Gate,
    HoldPoint,
    ApronCenter,
}

/// Types of edges in the airport graph.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EdgeType {
    Runway,
    #[default]
    Taxiway,
    ApronLink,
    RapidExit,
}

/// Direction restrictions for edges.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum AllowedFlow {
    Arrival,
    Departure,
    #[default]
    Both,
}

/// Aircraft size categories, ordered so that gate size compatibility is
/// a plain `<=` comparison.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
#[serde(rename_all = "snake_case")]
pub enum AircraftClass {
    Small,
    #[default]
    Medium,
    Large,
}

impl AircraftClass {
    pub const ALL: [AircraftClass; 3] =
        [AircraftClass::Small, AircraftClass::Medium, AircraftClass::Large];

    pub fn as_str(&self) -> &'static str {
        match self {
            AircraftClass::Small => "small",
            AircraftClass::Medium => "medium",
            AircraftClass::Large => "large",
        }
    }
}

/// A node in the airport graph. The id is the key in the layout's node
/// map and is not repeated inside the JSON value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub node_type: NodeType,
    #[serde(default)]
    pub x: f64,
    #[serde(default)]
    pub y: f64,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub apron: Option<String>,
    #[serde(default)]
    pub size_class: Option<AircraftClass>,
}

/// An edge in the airport graph.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    #[serde(skip)]
    pub id: String,
    #[serde(rename = "type", default)]
    pub edge_type: EdgeType,
    #[serde(rename = "start", default)]
    pub start_node: String,
    #[serde(rename = "end", default)]
    pub end_node: String,
    #[serde(default)]
    pub length: f64,
    #[serde(default)]
    pub allowed_flow: AllowedFlow,
    #[serde(default)]
    pub one_way: bool,
    #[serde(default)]
    pub speed_hint: Option<f64>,
    #[serde(default)]
    pub capacity_hint: Option<u32>,
    #[serde(default)]
    pub polyline: Vec<(f64, f64)>,
}

/// On-disk form of a layout: maps keyed by node/edge id.
#[derive(Serialize, Deserialize)]
struct LayoutDoc {
    #[serde(default = "default_name")]
    name: String,
    #[serde(default = "default_version")]
    version: String,
    #[serde(default)]
    nodes: BTreeMap<String, Node>,
    #[serde(default)]
    edges: BTreeMap<String, Edge>,
}

fn default_name() -> String {
    "Untitled Layout".to_string()
}

fn default_version() -> String {
    "1.0".to_string()
}

/// Airport layout as a directed graph of nodes and edges, with cached
/// adjacency lists. Bidirectional edges appear in the outgoing list of
/// both endpoints.
#[derive(Debug, Clone)]
pub struct Layout {
    pub name: String,
    pub version: String,
    pub nodes: BTreeMap<String, Node>,
    pub edges: BTreeMap<String, Edge>,
    edges_from: BTreeMap<String, Vec<String>>,
    edges_to: BTreeMap<String, Vec<String>>,
}

impl Layout {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            nodes: BTreeMap::new(),
            edges: BTreeMap::new(),
            edges_from: BTreeMap::new(),
            edges_to: BTreeMap::new(),
        }
    }

    pub fn add_node(&mut self, node: Node) {
        self.edges_from.entry(node.id.clone()).or_default();
        self.edges_to.entry(node.id.clone()).or_default();
        self.nodes.insert(node.id.clone(), node);
    }

    pub fn add_edge(&mut self, edge: Edge) {
        self.edges_from
            .entry(edge.start_node.clone())
            .or_default()
            .push(edge.id.clone());
        self.edges_to
            .entry(edge.end_node.clone())
            .or_default()
            .push(edge.id.clone());

        if !edge.one_way {
            self.edges_from
                .entry(edge.end_node.clone())
                .or_default()
                .push(edge.id.clone());
            self.edges_to
                .entry(edge.start_node.clone())
                .or_default()
                .push(edge.id.clone());
        }

        self.edges.insert(edge.id.clone(), edge);
    }

    pub fn get_node(&self, node_id: &str) -> Option<&Node> {
        self.nodes.get(node_id)
    }

    pub fn get_edge(&self, edge_id: &str) -> Option<&Edge> {
        self.edges.get(edge_id)
    }

    /// Edges traversable out of a node. Includes bidirectional edges
    /// whose end node is the given node.
    pub fn get_edges_from_node(&self, node_id: &str) -> Vec<&Edge> {
        self.edges_from
            .get(node_id)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_edges_to_node(&self, node_id: &str) -> Vec<&Edge> {
        self.edges_to
            .get(node_id)
            .map(|ids| ids.iter().filter_map(|id| self.edges.get(id)).collect())
            .unwrap_or_default()
    }

    pub fn get_nodes_by_type(&self, node_type: NodeType) -> Vec<&Node> {
        self.nodes.values().filter(|n| n.node_type == node_type).collect()
    }

    pub fn get_edges_by_type(&self, edge_type: EdgeType) -> Vec<&Edge> {
        self.edges.values().filter(|e| e.edge_type == edge_type).collect()
    }

    /// All gate nodes, optionally restricted to one apron.
    pub fn get_gates(&self, apron: Option<&str>) -> Vec<&Node> {
        self.get_nodes_by_type(NodeType::Gate)
            .into_iter()
            .filter(|g| apron.map_or(true, |a| g.apron.as_deref() == Some(a)))
            .collect()
    }

    pub fn get_hold_points(&self) -> Vec<&Node> {
        self.get_nodes_by_type(NodeType::HoldPoint)
    }

    pub fn get_runway_ends(&self) -> Vec<&Node> {
        self.get_nodes_by_type(NodeType::RunwayEnd)
    }

    pub fn get_neighbors(&self, node_id: &str) -> Vec<String> {
        let mut neighbors = Vec::new();
        for edge in self.get_edges_from_node(node_id) {
            let other = if edge.start_node == node_id {
                &edge.end_node
            } else {
                &edge.start_node
            };
            if !neighbors.contains(other) {
                neighbors.push(other.clone());
            }
        }
        neighbors
    }

    /// Length of an edge in metres. A missing or zero stored length
    /// falls back to the Euclidean distance between the endpoints.
    pub fn edge_length(&self, edge: &Edge) -> f64 {
        if edge.length > 0.0 {
            return edge.length;
        }
        match (self.get_node(&edge.start_node), self.get_node(&edge.end_node)) {
            (Some(start), Some(end)) => {
                ((end.x - start.x).powi(2) + (end.y - start.y).powi(2)).sqrt()
            }
            _ => 0.0,
        }
    }

    /// Validate structural invariants. Returns a list of error
    /// messages, empty when the layout is usable.
    pub fn validate(&self) -> Vec<String> {
        let mut errors = Vec::new();

        for (edge_id, edge) in &self.edges {
            if !self.nodes.contains_key(&edge.start_node) {
                errors.push(format!(
                    "Edge {}: start node '{}' not found",
                    edge_id, edge.start_node
                ));
            }
            if !self.nodes.contains_key(&edge.end_node) {
                errors.push(format!(
                    "Edge {}: end node '{}' not found",
                    edge_id, edge.end_node
                ));
            }
        }

        if self.get_edges_by_type(EdgeType::Runway).is_empty() {
            errors.push("Layout has no runway edges".to_string());
        }
        if self.get_gates(None).is_empty() {
            errors.push("Layout has no gate nodes".to_string());
        }
        if self.get_runway_ends().is_empty() {
            errors.push("Layout has no runway end nodes".to_string());
        }

        errors
    }

    pub fn from_json(json: &str) -> Result<Self, SimError> {
        let doc: LayoutDoc = serde_json::from_str(json)?;
        let mut layout = Layout::new(doc.name, doc.version);
        for (id, mut node) in doc.nodes {
            node.id = id;
            layout.add_node(node);
        }
        for (id, mut edge) in doc.edges {
            edge.id = id;
            layout.add_edge(edge);
        }
        Ok(layout)
    }

    pub fn to_json(&self) -> String {
        let doc = LayoutDoc {
            name: self.name.clone(),
            version: self.version.clone(),
            nodes: self.nodes.clone(),
            edges: self.edges.clone(),
        };
        serde_json::to_string_pretty(&doc).unwrap_or_else(|_| "{}".to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn node(id: &str, node_type: NodeType, x: f64, y: f64) -> Node {
        Node {
            id: id.to_string(),
            node_type,
            x,
            y,
            name: String::new(),
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

    fn sample_layout() -> Layout {
        let mut layout = Layout::new("Test Field", "1.0");
        layout.add_node(node("G1", NodeType::Gate, 0.0, 0.0));
        layout.add_node(node("H1", NodeType::HoldPoint, 100.0, 0.0));
        layout.add_node(node("R27", NodeType::RunwayEnd, 300.0, 0.0));
        layout.add_edge(edge("E1", EdgeType::ApronLink, "G1", "H1", 100.0));
        layout.add_edge(edge("E2", EdgeType::Runway, "H1", "R27", 200.0));
        layout
    }

    #[test]
    fn test_validate_ok() {
        assert!(sample_layout().validate().is_empty());
    }

    #[test]
    fn test_validate_missing_pieces() {
        let mut layout = Layout::new("Broken", "1.0");
        layout.add_edge(edge("E1", EdgeType::Taxiway, "A", "B", 10.0));

        let errors = layout.validate();
        assert!(errors.iter().any(|e| e.contains("start node 'A' not found")));
        assert!(errors.contains(&"Layout has no runway edges".to_string()));
        assert!(errors.contains(&"Layout has no gate nodes".to_string()));
        assert!(errors.contains(&"Layout has no runway end nodes".to_string()));
    }

    #[test]
    fn test_adjacency_bidirectional() {
        let layout = sample_layout();

        // E1 is bidirectional so it is traversable out of both endpoints.
        let from_h1: Vec<&str> = layout
            .get_edges_from_node("H1")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert!(from_h1.contains(&"E1"));
        assert!(from_h1.contains(&"E2"));

        let mut neighbors = layout.get_neighbors("H1");
        neighbors.sort();
        assert_eq!(neighbors, vec!["G1".to_string(), "R27".to_string()]);
    }

    #[test]
    fn test_one_way_excluded_from_reverse() {
        let mut layout = sample_layout();
        let mut e = edge("E3", EdgeType::Taxiway, "H1", "G1", 50.0);
        e.one_way = true;
        layout.add_edge(e);

        let from_g1: Vec<&str> = layout
            .get_edges_from_node("G1")
            .iter()
            .map(|e| e.id.as_str())
            .collect();
        assert!(!from_g1.contains(&"E3"));
    }

    #[test]
    fn test_euclidean_fallback() {
        let mut layout = sample_layout();
        layout.add_node(node("A", NodeType::Intersection, 0.0, 0.0));
        layout.add_node(node("B", NodeType::Intersection, 3.0, 4.0));
        layout.add_edge(edge("E9", EdgeType::Taxiway, "A", "B", 0.0));

        let e9 = layout.get_edge("E9").unwrap();
        assert!((layout.edge_length(e9) - 5.0).abs() < 1e-9);

        // Stored lengths win over geometry.
        let e1 = layout.get_edge("E1").unwrap();
        assert!((layout.edge_length(e1) - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_round_trip() {
        let layout = sample_layout();
        let json = layout.to_json();
        let reloaded = Layout::from_json(&json).unwrap();
        // Serialize -> deserialize -> serialize is a fixed point.
        assert_eq!(json, reloaded.to_json());
        assert_eq!(reloaded.nodes.len(), 3);
        assert_eq!(reloaded.edges.len(), 2);
        assert_eq!(reloaded.get_edge("E2").unwrap().edge_type, EdgeType::Runway);
    }

    #[test]
    fn test_from_json_defaults() {
        let json = r#"{
            "nodes": {
                "G1": {"type": "gate", "x": 0, "y": 0},
                "R1": {"type": "runway_end", "x": 10, "y": 0}
            },
            "edges": {
                "E1": {"type": "runway", "start": "G1", "end": "R1"}
            }
        }"#;
        let layout = Layout::from_json(json).unwrap();
        assert_eq!(layout.name, "Untitled Layout");
        let e1 = layout.get_edge("E1").unwrap();
        assert_eq!(e1.length, 0.0);
        assert!((layout.edge_length(e1) - 10.0).abs() < 1e-9);
        assert_eq!(e1.allowed_flow, AllowedFlow::Both);
        assert!(!e1.one_way);
    }
}
