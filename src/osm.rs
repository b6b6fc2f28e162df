//! The OpenStreetMap track graph: nodes with tags, and ways that chain them.
//!
//! Two nodes that are adjacent in the node list of a [`Way`] are adjacent on the ground.
//! The node ordering of consecutive ways is not guaranteed to be consistent.

use std::collections::HashMap;

use geo::{HaversineDistance, Point};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Identifies a [`Node`] in the graph.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(pub i64);

/// Identifies a [`Way`] in the graph.
#[derive(Copy, Clone, Debug, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize, Deserialize)]
#[serde(transparent)]
pub struct WayId(pub i64);

/// Errors when looking up the topology of the graph.
#[derive(Error, Debug, PartialEq)]
pub enum TopologyError {
    /// No [`Node`] with that id exists in the graph.
    #[error("could not find node {0:?}")]
    NodeNotFound(NodeId),
    /// The [`Node`] does not carry the tag.
    #[error("could not find tag `{key}` on node {node:?}")]
    TagNotFound {
        /// The node that was inspected.
        node: NodeId,
        /// The missing key.
        key: String,
    },
    /// The [`Node`] is not referenced by the [`Way`].
    #[error("node {node:?} is not part of way {way:?}")]
    NodeNotInWay {
        /// The searched node.
        node: NodeId,
        /// The inspected way.
        way: WayId,
    },
    /// The [`Node`] is referenced by no [`Way`] at all.
    #[error("no way references node {0:?}")]
    NoWayForNode(NodeId),
    /// A [`Node`] with the same id is already in the graph.
    #[error("node {0:?} already exists")]
    DuplicatedNode(NodeId),
}

/// A key-value pair attached to a [`Node`], a [`Way`] or a [`Relation`].
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tag {
    /// Key of the tag.
    pub k: String,
    /// Value of the tag.
    pub v: String,
}

impl Tag {
    /// Builds a new [`Tag`].
    pub fn new(k: &str, v: &str) -> Self {
        Self {
            k: k.to_owned(),
            v: v.to_owned(),
        }
    }
}

/// A point of the graph, in decimal degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Node {
    /// Unique identifier.
    pub id: NodeId,
    /// Latitude in decimal degrees.
    pub lat: f64,
    /// Longitude in decimal degrees.
    pub lon: f64,
    /// The tags are ordered, the first matching key wins on lookup.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Node {
    /// Builds an untagged [`Node`].
    pub fn new(id: i64, lat: f64, lon: f64) -> Self {
        Self {
            id: NodeId(id),
            lat,
            lon,
            tags: vec![],
        }
    }

    /// Value of the first tag having the `key`.
    pub fn tag(&self, key: &str) -> Result<&str, TopologyError> {
        self.tags
            .iter()
            .find(|tag| tag.k == key)
            .map(|tag| tag.v.as_str())
            .ok_or_else(|| TopologyError::TagNotFound {
                node: self.id,
                key: key.to_owned(),
            })
    }

    /// Is the tag `key` present with the given `value`.
    pub fn has_tag(&self, key: &str, value: &str) -> bool {
        self.tag(key).is_ok_and(|v| v == value)
    }

    /// Do both nodes lie at the exact same coordinates.
    pub fn same_position(&self, other: &Node) -> bool {
        self.lat == other.lat && self.lon == other.lon
    }

    fn point(&self) -> Point {
        Point::new(self.lon, self.lat)
    }
}

/// Great-circle distance between two nodes, in kilometres.
pub fn great_circle_distance(a: &Node, b: &Node) -> f64 {
    a.point().haversine_distance(&b.point()) / 1000.
}

/// An ordered chain of [`Node`] references representing a piece of track.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Way {
    /// Unique identifier.
    pub id: WayId,
    /// References to the nodes, in their geometrical order.
    pub nodes: Vec<NodeId>,
    /// Tags of the way.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

impl Way {
    /// Builds an untagged [`Way`].
    pub fn new(id: i64, nodes: &[i64]) -> Self {
        Self {
            id: WayId(id),
            nodes: nodes.iter().map(|&n| NodeId(n)).collect(),
            tags: vec![],
        }
    }

    /// Position of the node in the way.
    pub fn index_of(&self, node: NodeId) -> Result<usize, TopologyError> {
        self.nodes
            .iter()
            .position(|&n| n == node)
            .ok_or(TopologyError::NodeNotInWay { node, way: self.id })
    }

    /// Does the way reference the node.
    pub fn contains(&self, node: NodeId) -> bool {
        self.nodes.contains(&node)
    }

    /// First node reference.
    pub fn first(&self) -> Option<NodeId> {
        self.nodes.first().copied()
    }

    /// Second node reference.
    pub fn second(&self) -> Option<NodeId> {
        self.nodes.get(1).copied()
    }

    /// Second to last node reference.
    pub fn second_last(&self) -> Option<NodeId> {
        self.nodes.len().checked_sub(2).map(|i| self.nodes[i])
    }

    /// Last node reference.
    pub fn last(&self) -> Option<NodeId> {
        self.nodes.last().copied()
    }
}

/// A member of a [`Relation`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Member {
    /// `node`, `way` or `relation`.
    #[serde(rename = "type")]
    pub member_type: String,
    /// Id of the referenced object.
    #[serde(rename = "ref")]
    pub reference: i64,
    /// Role of the member.
    #[serde(default)]
    pub role: String,
}

/// Relations are not used for the placement but are kept in the output.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Relation {
    /// Unique identifier.
    pub id: i64,
    /// The members of the relation.
    #[serde(default)]
    pub members: Vec<Member>,
    /// Tags of the relation.
    #[serde(default)]
    pub tags: Vec<Tag>,
}

/// The raw document as it is read from the extraction tool.
#[derive(Deserialize)]
struct OsmDocument {
    #[serde(default)]
    nodes: Vec<Node>,
    #[serde(default)]
    ways: Vec<Way>,
    #[serde(default)]
    relations: Vec<Relation>,
}

impl From<OsmDocument> for Osm {
    fn from(doc: OsmDocument) -> Self {
        let mut osm = Osm::new(doc.nodes, doc.ways);
        osm.relations = doc.relations;
        osm
    }
}

/// The track graph of a line.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
#[serde(from = "OsmDocument")]
pub struct Osm {
    /// All the nodes, in input order. New nodes are appended.
    pub nodes: Vec<Node>,
    /// All the ways.
    pub ways: Vec<Way>,
    /// Untouched relations.
    pub relations: Vec<Relation>,
    #[serde(skip)]
    node_index: HashMap<NodeId, usize>,
}

impl Osm {
    /// Builds the graph and indexes the nodes by id.
    /// When ids are duplicated, the first node wins on lookup.
    pub fn new(nodes: Vec<Node>, ways: Vec<Way>) -> Self {
        let mut node_index = HashMap::with_capacity(nodes.len());
        for (idx, node) in nodes.iter().enumerate() {
            node_index.entry(node.id).or_insert(idx);
        }
        Self {
            nodes,
            ways,
            relations: vec![],
            node_index,
        }
    }

    /// Finds a [`Node`] by its id.
    pub fn node(&self, id: NodeId) -> Result<&Node, TopologyError> {
        self.node_index
            .get(&id)
            .map(|&idx| &self.nodes[idx])
            .ok_or(TopologyError::NodeNotFound(id))
    }

    /// Finds a mutable [`Node`] by its id.
    pub fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, TopologyError> {
        match self.node_index.get(&id) {
            Some(&idx) => Ok(&mut self.nodes[idx]),
            None => Err(TopologyError::NodeNotFound(id)),
        }
    }

    /// All the [`Way`]s that reference the node.
    /// A node must be part of at least one way to be walked from.
    pub fn ways_of(&self, node: NodeId) -> Result<Vec<&Way>, TopologyError> {
        let ways: Vec<_> = self.ways.iter().filter(|way| way.contains(node)).collect();
        if ways.is_empty() {
            Err(TopologyError::NoWayForNode(node))
        } else {
            Ok(ways)
        }
    }

    /// Highest node id of the graph.
    pub fn max_node_id(&self) -> Option<NodeId> {
        self.nodes.iter().map(|n| n.id).max()
    }

    /// Inserts `new_node` into the graph, next to `reference` in every [`Way`] containing it.
    ///
    /// The new reference goes right after the reference node,
    /// unless the reference node ends the way: then it goes right before it.
    /// That way a reference node that was an endpoint remains one,
    /// and the track ends and junctions are still detected by later walks.
    pub fn splice(&mut self, new_node: Node, reference: NodeId) -> Result<(), TopologyError> {
        if self.node_index.contains_key(&new_node.id) {
            return Err(TopologyError::DuplicatedNode(new_node.id));
        }

        let mut found_way = false;
        for way in self.ways.iter_mut() {
            if let Some(index) = way.nodes.iter().position(|&n| n == reference) {
                found_way = true;
                if index == way.nodes.len() - 1 {
                    way.nodes.insert(index, new_node.id);
                } else {
                    way.nodes.insert(index + 1, new_node.id);
                }
            }
        }
        if !found_way {
            log::warn!("could not find a way for node {}", reference.0);
        }

        self.node_index.insert(new_node.id, self.nodes.len());
        self.nodes.push(new_node);
        Ok(())
    }
}

/// Graphs shared by the tests of the crate.
#[cfg(test)]
pub mod tests {
    use super::*;
    use approx::assert_relative_eq;

    /// Latitude step between consecutive nodes of [`chain`]: a bit more than a kilometre.
    pub const STEP: f64 = 0.009;

    /// A node on the meridian 0, `i` steps north of the equator.
    pub fn node_at(id: i64, i: f64) -> Node {
        Node::new(id, i * STEP, 0.)
    }

    /// Five nodes along a meridian, split in two ways sharing node 3:
    /// `1 - 2 - 3` and `3 - 4 - 5`.
    pub fn chain() -> Osm {
        Osm::new(
            (1..=5).map(|i| node_at(i, (i - 1) as f64)).collect(),
            vec![Way::new(101, &[1, 2, 3]), Way::new(102, &[3, 4, 5])],
        )
    }

    #[test]
    fn tag_lookup() {
        let mut node = Node::new(1, 0., 0.);
        node.tags = vec![
            Tag::new("railway", "signal"),
            Tag::new("ref", "A 1"),
            Tag::new("railway", "switch"),
        ];

        assert_eq!(node.tag("railway"), Ok("signal"));
        assert!(node.has_tag("ref", "A 1"));
        assert!(!node.has_tag("railway", "switch"));
        assert_eq!(
            node.tag("name"),
            Err(TopologyError::TagNotFound {
                node: NodeId(1),
                key: "name".to_owned()
            })
        );
    }

    #[test]
    fn lookups() {
        let osm = chain();
        assert_eq!(osm.node(NodeId(4)).unwrap().lat, 3. * STEP);
        assert_eq!(
            osm.node(NodeId(42)),
            Err(TopologyError::NodeNotFound(NodeId(42)))
        );

        assert_eq!(osm.ways[0].index_of(NodeId(3)), Ok(2));
        assert_eq!(
            osm.ways[0].index_of(NodeId(4)),
            Err(TopologyError::NodeNotInWay {
                node: NodeId(4),
                way: WayId(101)
            })
        );

        let ways = osm.ways_of(NodeId(3)).unwrap();
        assert_eq!(ways.len(), 2);
        assert_eq!(osm.ways_of(NodeId(2)).unwrap()[0].id, WayId(101));
        assert!(osm.ways_of(NodeId(42)).is_err());
        assert_eq!(osm.max_node_id(), Some(NodeId(5)));
    }

    #[test]
    fn way_ends() {
        let way = Way::new(1, &[7, 8, 9]);
        assert_eq!(way.first(), Some(NodeId(7)));
        assert_eq!(way.second(), Some(NodeId(8)));
        assert_eq!(way.second_last(), Some(NodeId(8)));
        assert_eq!(way.last(), Some(NodeId(9)));

        let way = Way::new(2, &[7]);
        assert_eq!(way.second(), None);
        assert_eq!(way.second_last(), None);
    }

    #[test]
    fn distance() {
        let a = Node::new(1, 48.85, 2.35);
        let b = Node::new(2, 52.52, 13.40);
        assert_relative_eq!(great_circle_distance(&a, &a), 0.);
        assert_relative_eq!(great_circle_distance(&a, &b), great_circle_distance(&b, &a));
        assert!((great_circle_distance(&a, &b) - 878.).abs() < 5.);

        // One step of the fixtures is a bit longer than a kilometre
        let step = great_circle_distance(&node_at(1, 0.), &node_at(2, 1.));
        assert!(step > 1. && step < 1.01);
    }

    #[test]
    fn splice_in_the_middle() {
        let mut osm = chain();
        osm.splice(Node::new(1000, 0., 0.), NodeId(2)).unwrap();

        assert_eq!(osm.ways[0], Way::new(101, &[1, 2, 1000, 3]));
        assert_eq!(osm.ways[1], Way::new(102, &[3, 4, 5]));
        assert_eq!(osm.nodes.len(), 6);
        assert!(osm.node(NodeId(1000)).is_ok());
    }

    #[test]
    fn splice_keeps_endpoints() {
        let mut osm = chain();
        osm.splice(Node::new(1000, 0., 0.), NodeId(3)).unwrap();

        // 3 is the last node of the first way and the first one of the second
        assert_eq!(osm.ways[0], Way::new(101, &[1, 2, 1000, 3]));
        assert_eq!(osm.ways[1], Way::new(102, &[3, 1000, 4, 5]));

        osm.splice(Node::new(1001, 0., 0.), NodeId(1)).unwrap();
        assert_eq!(osm.ways[0], Way::new(101, &[1, 1001, 2, 1000, 3]));
    }

    #[test]
    fn splice_rejects_duplicates() {
        let mut osm = chain();
        assert_eq!(
            osm.splice(Node::new(2, 0., 0.), NodeId(3)),
            Err(TopologyError::DuplicatedNode(NodeId(2)))
        );
        assert_eq!(osm.ways[0].nodes.len(), 3);
    }

    #[test]
    fn splice_without_way() {
        let mut osm = chain();
        osm.splice(Node::new(1000, 0., 0.), NodeId(42)).unwrap();
        assert!(osm.node(NodeId(1000)).is_ok());
        assert_eq!(osm.ways[0].nodes.len(), 3);
    }

    #[test]
    fn json_roundtrip_keeps_index() {
        let json = r#"{
            "nodes": [{"id": 1, "lat": 1.0, "lon": 2.0, "tags": [{"k": "railway", "v": "signal"}]},
                      {"id": 2, "lat": 1.5, "lon": 2.0}],
            "ways": [{"id": 10, "nodes": [1, 2]}],
            "relations": [{"id": 20, "members": [{"type": "way", "ref": 10, "role": ""}]}]
        }"#;
        let osm: Osm = serde_json::from_str(json).unwrap();
        assert_eq!(osm.node(NodeId(2)).unwrap().lat, 1.5);
        assert_eq!(osm.relations.len(), 1);

        let written = serde_json::to_string(&osm).unwrap();
        assert!(!written.contains("node_index"));
        let read: Osm = serde_json::from_str(&written).unwrap();
        assert_eq!(read.node(NodeId(1)).unwrap().tag("railway"), Ok("signal"));
    }
}
