//! Walks the track graph for a given distance from a node, in both directions.
//!
//! The walk follows the node references of the ways, jumping from one way to the next
//! at shared endpoints, and stops at the first node where the accumulated great-circle
//! distance reaches the target. There is no interpolation: the walk overshoots to the next node.

use thiserror::Error;

use crate::linkage::{next_way, Boundary, Direction, LinkageError};
use crate::osm::{great_circle_distance, NodeId, Osm, TopologyError, Way, WayId};

/// Errors when walking the graph. They make the walk from that start node unusable.
#[derive(Error, Debug, PartialEq)]
pub enum WalkError {
    /// A lookup in the graph failed.
    #[error("topology error")]
    Topology(#[from] TopologyError),
    /// The way linkage at an endpoint could not be understood.
    #[error("linkage error")]
    Linkage(#[from] LinkageError),
    /// A walk can only start from a node that is part of one or two ways.
    #[error("too many ways ({count}) for node {node:?}")]
    TooManyWays {
        /// The start node.
        node: NodeId,
        /// How many ways reference it.
        count: usize,
    },
    /// The start node is part of two ways, but is not the start of one and the end of the other.
    #[error("could not pair the ways of node {0:?}")]
    UnpairedWays(NodeId),
    /// The start index is past the end of the way.
    #[error("index {index} is out of way {way:?}")]
    IndexOutOfWay {
        /// The way to walk.
        way: WayId,
        /// The faulty index.
        index: usize,
    },
    /// A way has less than two nodes and can not be walked.
    #[error("way of node {0:?} has less than two nodes")]
    DegenerateWay(NodeId),
}

/// Why a walk stopped.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Stop {
    /// The target distance was reached (or exceeded).
    Reached,
    /// The track ends before the target distance.
    TrackEnd,
    /// A junction was met before the target distance.
    Junction,
}

/// Outcome of a walk in one direction.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Walk {
    /// The node where the walk stopped.
    pub node: NodeId,
    /// The distance walked, in kilometres.
    pub distance: f64,
    /// Why the walk stopped.
    pub stop: Stop,
}

/// Outcomes of the walks in both directions.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Walks {
    /// Walking toward the start of the ways.
    pub up: Walk,
    /// Walking toward the end of the ways.
    pub down: Walk,
}

impl Walks {
    /// Both candidates, up first.
    pub fn candidates(&self) -> [Walk; 2] {
        [self.up, self.down]
    }
}

enum Next<'a> {
    Continue(&'a Way, usize, Direction),
    Stop(Stop),
}

// The two ways at an endpoint, or why the walk can not go further.
fn boundary_ways(osm: &Osm, node: NodeId) -> Result<Result<(&Way, &Way), Stop>, WalkError> {
    let ways = osm.ways_of(node)?;
    match ways.as_slice() {
        [_] => Ok(Err(Stop::TrackEnd)),
        [first, second] => Ok(Ok((*first, *second))),
        _ => Ok(Err(Stop::Junction)),
    }
}

fn cross_boundary<'a>(
    osm: &'a Osm,
    node: NodeId,
    incoming: WayId,
    direction: Direction,
) -> Result<Next<'a>, WalkError> {
    let (first, second) = match boundary_ways(osm, node)? {
        Ok(ways) => ways,
        Err(stop) => return Ok(Next::Stop(stop)),
    };
    let boundary = Boundary {
        node,
        incoming,
        first,
        second,
    };
    let continuation = next_way(&boundary, direction)?;
    if continuation.way.nodes.len() < 2 {
        return Err(WalkError::DegenerateWay(node));
    }
    Ok(Next::Continue(
        continuation.way,
        continuation.index,
        continuation.direction,
    ))
}

/// Follows `way` from `index` in `direction` for `distance` kilometres,
/// continuing on the next ways when needed.
pub fn walk_direction<'a>(
    osm: &'a Osm,
    way: &'a Way,
    index: usize,
    distance: f64,
    direction: Direction,
) -> Result<Walk, WalkError> {
    let mut way = way;
    let mut index = index;
    let mut direction = direction;
    let start = *way.nodes.get(index).ok_or(WalkError::IndexOutOfWay {
        way: way.id,
        index,
    })?;
    let mut current = osm.node(start)?;
    let mut total = 0.;

    while total < distance {
        if direction.at_boundary(index, way.nodes.len()) {
            match cross_boundary(osm, current.id, way.id, direction)? {
                Next::Continue(way_after, next_index, next_direction) => {
                    way = way_after;
                    index = next_index;
                    direction = next_direction;
                }
                Next::Stop(stop) => {
                    return Ok(Walk {
                        node: current.id,
                        distance: total,
                        stop,
                    })
                }
            }
        }

        index = direction.step(index);
        let next = osm.node(way.nodes[index])?;
        total += great_circle_distance(current, next);
        current = next;
    }

    Ok(Walk {
        node: current.id,
        distance: total,
        stop: Stop::Reached,
    })
}

/// Walks `distance` kilometres from `node` in both directions.
///
/// The node must be part of at most two ways.
/// If it is part of two ways, it must start one and end the other.
/// Reaching a track end or a junction is not an error: the partial walk is returned.
pub fn walk_both_directions(osm: &Osm, node: NodeId, distance: f64) -> Result<Walks, WalkError> {
    let ways = osm.ways_of(node)?;

    match ways.as_slice() {
        [way] => {
            if way.nodes.len() < 2 {
                return Err(WalkError::DegenerateWay(node));
            }
            let index = way.index_of(node)?;
            Ok(Walks {
                up: walk_direction(osm, way, index, distance, Direction::Up)?,
                down: walk_direction(osm, way, index, distance, Direction::Down)?,
            })
        }
        [first, second] => {
            let (up_way, down_way) = if first.first() == Some(node) && second.last() == Some(node) {
                (*second, *first)
            } else if second.first() == Some(node) && first.last() == Some(node) {
                (*first, *second)
            } else {
                return Err(WalkError::UnpairedWays(node));
            };
            if up_way.nodes.len() < 2 || down_way.nodes.len() < 2 {
                return Err(WalkError::DegenerateWay(node));
            }

            Ok(Walks {
                up: walk_direction(osm, up_way, up_way.nodes.len() - 1, distance, Direction::Up)?,
                down: walk_direction(osm, down_way, 0, distance, Direction::Down)?,
            })
        }
        _ => Err(WalkError::TooManyWays {
            node,
            count: ways.len(),
        }),
    }
}
