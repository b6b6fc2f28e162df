//! Converts a kilometrage into a graph node using the anchors of the line.
//!
//! The two anchors nearest to the target kilometrage are walked from, each for its own
//! remaining distance. When the walks meet on a node, that node is the answer.
//! Otherwise the closest pair of candidates decides.

use thiserror::Error;

use crate::anchors::AnchorMap;
use crate::kilometrage::Kilometrage;
use crate::osm::{great_circle_distance, NodeId, Osm, TopologyError};
use crate::walker::{walk_both_directions, Walk, WalkError, Walks};

/// Errors when resolving a kilometrage.
#[derive(Error, Debug, PartialEq)]
pub enum ResolveError {
    /// The line has less than two anchor kilometrages.
    #[error("at least two anchors are needed, {0} available")]
    NotEnoughAnchors(usize),
    /// Every anchor was tried without success.
    #[error("failed to find suitable anchors")]
    NoSuitableAnchors,
    /// The walk from an anchor failed, e.g. it sits on a junction.
    #[error("insufficient anchor {anchor:?}")]
    InsufficientAnchor {
        /// The node of the faulty anchor.
        anchor: NodeId,
        /// Why the walk failed.
        #[source]
        source: WalkError,
    },
    /// A candidate node is missing from the graph.
    #[error("topology error")]
    Topology(#[from] TopologyError),
}

impl ResolveError {
    /// Only the element is concerned: the line can go on.
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            ResolveError::NotEnoughAnchors(_)
                | ResolveError::NoSuitableAnchors
                | ResolveError::InsufficientAnchor { .. }
        )
    }
}

/// An anchor node and the distance, in kilometres, to walk from it.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Reference {
    /// The anchor node.
    pub node: NodeId,
    /// How far the target is.
    pub distance: f64,
}

impl Reference {
    fn new(node: NodeId, anchor_position: Kilometrage, target: Kilometrage) -> Self {
        Self {
            node,
            distance: (anchor_position - target).abs(),
        }
    }

    fn walk(&self, osm: &Osm) -> Result<Walks, ResolveError> {
        walk_both_directions(osm, self.node, self.distance).map_err(|source| {
            ResolveError::InsufficientAnchor {
                anchor: self.node,
                source,
            }
        })
    }
}

/// Finds the node at the target given two anchors.
pub fn resolve_with_pair(
    osm: &Osm,
    first: Reference,
    second: Reference,
) -> Result<NodeId, ResolveError> {
    if first.distance == 0. {
        return Ok(first.node);
    }

    let first_walks = first.walk(osm)?;
    let second_walks = second.walk(osm)?;

    for candidate in first_walks.candidates() {
        if second_walks
            .candidates()
            .iter()
            .any(|other| other.node == candidate.node)
        {
            return Ok(candidate.node);
        }
    }

    closest_match(osm, (first, first_walks), (second, second_walks))
}

// No candidate is shared: take the pair of candidates that are geographically the closest,
// and in that pair, the one whose walked distance deviates the least from its target distance.
fn closest_match(
    osm: &Osm,
    (first, first_walks): (Reference, Walks),
    (second, second_walks): (Reference, Walks),
) -> Result<NodeId, ResolveError> {
    let mut pairs: Vec<(f64, Walk, Walk)> = Vec::with_capacity(4);
    for a in first_walks.candidates() {
        for b in second_walks.candidates() {
            let gap = great_circle_distance(osm.node(a.node)?, osm.node(b.node)?);
            pairs.push((gap, a, b));
        }
    }

    let (_, a, b) = pairs
        .into_iter()
        .min_by(|x, y| x.0.total_cmp(&y.0))
        .ok_or(ResolveError::NoSuitableAnchors)?;

    let deviation_a = (a.distance - first.distance).abs();
    let deviation_b = (b.distance - second.distance).abs();
    if deviation_a <= deviation_b {
        Ok(a.node)
    } else {
        Ok(b.node)
    }
}

/// Finds the node at `target` kilometrage.
///
/// Requires at least two anchor kilometrages. The two nearest anchors are used first.
/// When the walk from one of them fails, it is replaced by the next nearest unused anchor.
pub fn resolve<T>(
    osm: &Osm,
    anchors: &AnchorMap<T>,
    target: Kilometrage,
) -> Result<NodeId, ResolveError> {
    if anchors.len() < 2 {
        return Err(ResolveError::NotEnoughAnchors(anchors.len()));
    }

    let sorted = anchors.by_proximity(target);
    let mut references = sorted
        .iter()
        .map(|(position, anchor)| Reference::new(anchor.node, *position, target));
    let (Some(mut first), Some(mut second)) = (references.next(), references.next()) else {
        return Err(ResolveError::NotEnoughAnchors(anchors.len()));
    };

    loop {
        match resolve_with_pair(osm, first, second) {
            Err(ResolveError::InsufficientAnchor { anchor, source }) => {
                log::debug!("discarding anchor {}: {source}", anchor.0);
                let Some(replacement) = references.next() else {
                    return Err(ResolveError::NoSuitableAnchors);
                };
                if anchor == first.node {
                    first = replacement;
                } else {
                    second = replacement;
                }
            }
            result => return result,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::anchors::Anchor;
    use crate::osm::tests::{chain, node_at, STEP};
    use crate::osm::{Node, Way};

    fn anchor_map(osm: &Osm, positions: &[(i64, Kilometrage)]) -> AnchorMap<()> {
        let mut anchors = AnchorMap::new();
        for &(id, position) in positions {
            anchors
                .insert(position, Anchor::new(osm.node(NodeId(id)).unwrap(), ()))
                .unwrap();
        }
        anchors
    }

    #[test]
    fn midpoint() {
        let osm = chain();
        let anchors = anchor_map(&osm, &[(2, 1.), (4, 3.)]);
        assert_eq!(resolve(&osm, &anchors, 2.), Ok(NodeId(3)));
    }

    #[test]
    fn on_an_anchor() {
        let osm = chain();
        let anchors = anchor_map(&osm, &[(2, 1.), (4, 3.)]);
        assert_eq!(resolve(&osm, &anchors, 3.), Ok(NodeId(4)));
    }

    #[test]
    fn not_enough_anchors() {
        let osm = chain();
        let anchors = anchor_map(&osm, &[(2, 1.)]);
        let err = resolve(&osm, &anchors, 2.).unwrap_err();
        assert_eq!(err, ResolveError::NotEnoughAnchors(1));
        assert!(err.is_recoverable());

        // Two anchors at the same kilometrage are a single position
        let mut anchors = anchors;
        let twin = Node::new(9, STEP, 0.);
        anchors.insert(1., Anchor::new(&twin, ())).unwrap();
        assert_eq!(
            resolve(&osm, &anchors, 2.),
            Err(ResolveError::NotEnoughAnchors(1))
        );
    }

    #[test]
    fn closest_pair_when_walks_do_not_meet() {
        // 1 - 2 - - 3 - - 4 on a single way, with uneven spacing
        let osm = Osm::new(
            vec![node_at(1, 0.), node_at(2, 1.), node_at(3, 2.5), node_at(4, 4.)],
            vec![Way::new(101, &[1, 2, 3, 4])],
        );
        let anchors = anchor_map(&osm, &[(1, 0.), (4, 4.)]);

        // From 1, down reaches 3 (2.5 km). From 4, up reaches 2 (3 km).
        // The closest pair is (1, 2), and 2 deviates the least from its 2 km target.
        assert_eq!(resolve(&osm, &anchors, 2.), Ok(NodeId(2)));
    }

    #[test]
    fn faulty_anchor_is_replaced() {
        // 3 is a junction: walking from it fails
        let mut nodes: Vec<_> = (1..=5).map(|i| node_at(i, (i - 1) as f64)).collect();
        nodes.push(Node::new(6, 2. * STEP, 0.01));
        let osm = Osm::new(
            nodes,
            vec![
                Way::new(101, &[1, 2, 3]),
                Way::new(102, &[3, 4, 5]),
                Way::new(103, &[3, 6]),
            ],
        );
        let anchors = anchor_map(&osm, &[(2, 1.), (3, 2.), (5, 4.)]);

        let err = resolve_with_pair(
            &osm,
            Reference::new(NodeId(3), 2., 2.1),
            Reference::new(NodeId(2), 1., 2.1),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ResolveError::InsufficientAnchor {
                anchor: NodeId(3),
                source: WalkError::TooManyWays { .. }
            }
        ));

        assert_eq!(resolve(&osm, &anchors, 2.1), Ok(NodeId(3)));
    }

    #[test]
    fn no_suitable_anchors() {
        // Neither anchor is on a way
        let mut nodes: Vec<_> = (1..=5).map(|i| node_at(i, (i - 1) as f64)).collect();
        nodes.push(Node::new(8, 0.5, 0.5));
        nodes.push(Node::new(9, 0.6, 0.5));
        let osm = Osm::new(nodes, vec![Way::new(101, &[1, 2, 3, 4, 5])]);
        let anchors = anchor_map(&osm, &[(8, 1.), (9, 3.)]);

        let err = resolve(&osm, &anchors, 2.).unwrap_err();
        assert_eq!(err, ResolveError::NoSuitableAnchors);
        assert!(err.is_recoverable());
    }

    #[test]
    fn missing_candidate_is_fatal() {
        assert!(!ResolveError::Topology(TopologyError::NodeNotFound(NodeId(1))).is_recoverable());
    }
}
