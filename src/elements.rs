//! Synthetic nodes carrying the catalog elements in the output graph.

use crate::catalog::Heading;
use crate::osm::{Node, NodeId, Osm, Tag};

/// Hands out ids for the synthetic nodes. Every id is unused in the input graph.
#[derive(Clone, Debug)]
pub struct NodeIdCounter {
    next: i64,
}

impl NodeIdCounter {
    /// Starts at `seed`, or right above the highest id of `osm` if that is higher.
    pub fn new(osm: &Osm, seed: i64) -> Self {
        let above_input = osm.max_node_id().map_or(i64::MIN, |id| id.0.saturating_add(1));
        Self {
            next: seed.max(above_input),
        }
    }

    /// A fresh id.
    pub fn next_id(&mut self) -> NodeId {
        let id = NodeId(self.next);
        self.next += 1;
        id
    }
}

/// Builds the node of a catalog element, at the coordinates of `at`.
///
/// The tags are, in that order: `type=element`, `subtype`, `direction` when the element has
/// a heading, `id` when it has a name, then the `extras`.
pub fn element_node(
    id: NodeId,
    at: &Node,
    subtype: &str,
    heading: Option<Heading>,
    name: Option<&str>,
    extras: Vec<Tag>,
) -> Node {
    let mut tags = vec![Tag::new("type", "element"), Tag::new("subtype", subtype)];
    if let Some(heading) = heading {
        tags.push(Tag::new("direction", heading.tag_value()));
    }
    if let Some(name) = name {
        tags.push(Tag::new("id", name));
    }
    tags.extend(extras);

    Node {
        id,
        lat: at.lat,
        lon: at.lon,
        tags,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::osm::tests::chain;

    #[test]
    fn ids_are_above_the_input() {
        let osm = chain();
        let mut ids = NodeIdCounter::new(&osm, 1000);
        assert_eq!(ids.next_id(), NodeId(1000));
        assert_eq!(ids.next_id(), NodeId(1001));

        let mut ids = NodeIdCounter::new(&osm, 0);
        assert_eq!(ids.next_id(), NodeId(6));

        let mut ids = NodeIdCounter::new(&Osm::default(), 7);
        assert_eq!(ids.next_id(), NodeId(7));
    }

    #[test]
    fn tag_order() {
        let at = Node::new(3, 1.5, 2.5);
        let node = element_node(
            NodeId(1000),
            &at,
            "ms",
            Some(Heading::Falling),
            Some("A1"),
            vec![Tag::new("speed", "80")],
        );
        assert_eq!(node.id, NodeId(1000));
        assert!(node.same_position(&at));
        assert_eq!(
            node.tags,
            vec![
                Tag::new("type", "element"),
                Tag::new("subtype", "ms"),
                Tag::new("direction", "falling"),
                Tag::new("id", "A1"),
                Tag::new("speed", "80"),
            ]
        );

        let node = element_node(NodeId(1001), &at, "border", None, None, vec![]);
        assert_eq!(
            node.tags,
            vec![Tag::new("type", "element"), Tag::new("subtype", "border")]
        );
    }
}
