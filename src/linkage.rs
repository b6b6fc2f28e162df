//! How two ways are linked at a shared endpoint.
//!
//! OpenStreetMap does not guarantee that consecutive ways have a consistent node ordering.
//! When a walk reaches the end of a way, the way to continue on and the new walking direction
//! are found by testing a fixed, ordered list of [`Linkage`] patterns.

use thiserror::Error;

use crate::osm::{NodeId, Way, WayId};

/// Walking direction along a [`Way`].
/// `Up` goes toward the first node of the way, `Down` toward the last one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Direction {
    /// Toward decreasing indices.
    Up,
    /// Toward increasing indices.
    Down,
}

impl Direction {
    /// Is `index` the last node of a way of length `len` when walking in this direction.
    pub fn at_boundary(self, index: usize, len: usize) -> bool {
        match self {
            Direction::Up => index == 0,
            Direction::Down => index + 1 >= len,
        }
    }

    /// Index of the next node. The caller ensures it is not at the boundary.
    pub fn step(self, index: usize) -> usize {
        match self {
            Direction::Up => index - 1,
            Direction::Down => index + 1,
        }
    }
}

/// Errors when following the linkage between ways.
#[derive(Error, Debug, PartialEq)]
pub enum LinkageError {
    /// None of the patterns describes how the two ways are linked.
    #[error("failed to find the way {direction:?} for node {node:?}")]
    NoMatchingPattern {
        /// The endpoint where the walk stopped.
        node: NodeId,
        /// The direction of the walk.
        direction: Direction,
    },
}

/// The situation at the end of a way: the node where we stand, the way we arrive on,
/// and the exactly two ways that reference that node.
pub struct Boundary<'a> {
    /// The endpoint reached.
    pub node: NodeId,
    /// The way the walk arrives on. It is either `first` or `second`.
    pub incoming: WayId,
    /// One of the ways referencing `node`.
    pub first: &'a Way,
    /// The other way referencing `node`.
    pub second: &'a Way,
}

/// Where to continue the walk.
#[derive(Debug, PartialEq)]
pub struct Continuation<'a> {
    /// The way to follow.
    pub way: &'a Way,
    /// Index of the boundary node in `way`.
    pub index: usize,
    /// Direction to follow `way`.
    pub direction: Direction,
}

/// The ways in which two ways can be linked at an endpoint.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Linkage {
    /// The first way starts where the second way ends. The usual case.
    FirstAfterSecond,
    /// The second way starts where the first way ends.
    SecondAfterFirst,
    /// Both ways start at the node and we arrive on the first one.
    StartsMeetFromFirst,
    /// Both ways start at the node and we arrive on the second one.
    StartsMeetFromSecond,
    /// Both ways end at the node and we arrive on the first one.
    EndsMeetFromFirst,
    /// Both ways end at the node and we arrive on the second one.
    EndsMeetFromSecond,
}

impl Linkage {
    /// Patterns tested, in order, when walking up.
    pub const UP: [Linkage; 4] = [
        Linkage::FirstAfterSecond,
        Linkage::SecondAfterFirst,
        Linkage::StartsMeetFromFirst,
        Linkage::StartsMeetFromSecond,
    ];

    /// Patterns tested, in order, when walking down.
    pub const DOWN: [Linkage; 4] = [
        Linkage::FirstAfterSecond,
        Linkage::SecondAfterFirst,
        Linkage::EndsMeetFromFirst,
        Linkage::EndsMeetFromSecond,
    ];

    /// Does the pattern describe the `boundary`.
    pub fn matches(self, boundary: &Boundary) -> bool {
        let node = Some(boundary.node);
        let (first, second) = (boundary.first, boundary.second);
        // Nodes spliced next to a shared endpoint can make the neighbours of both ways equal,
        // so the ways are told apart by their id.
        let starts_meet = first.first() == node && second.first() == node;
        let ends_meet = first.last() == node && second.last() == node;
        match self {
            Linkage::FirstAfterSecond => first.first() == node && first.first() == second.last(),
            Linkage::SecondAfterFirst => second.first() == node && second.first() == first.last(),
            Linkage::StartsMeetFromFirst => starts_meet && boundary.incoming == first.id,
            Linkage::StartsMeetFromSecond => starts_meet && boundary.incoming == second.id,
            Linkage::EndsMeetFromFirst => ends_meet && boundary.incoming == first.id,
            Linkage::EndsMeetFromSecond => ends_meet && boundary.incoming == second.id,
        }
    }

    /// Where to continue when this pattern matched while walking in `direction`.
    pub fn continuation<'a>(
        self,
        boundary: &Boundary<'a>,
        direction: Direction,
    ) -> Continuation<'a> {
        let (first, second) = (boundary.first, boundary.second);
        let from_end = |way: &'a Way| Continuation {
            way,
            index: way.nodes.len().saturating_sub(1),
            direction: Direction::Up,
        };
        let from_start = |way: &'a Way| Continuation {
            way,
            index: 0,
            direction: Direction::Down,
        };

        match (self, direction) {
            (Linkage::FirstAfterSecond, Direction::Up) => from_end(second),
            (Linkage::FirstAfterSecond, Direction::Down) => from_start(first),
            (Linkage::SecondAfterFirst, Direction::Up) => from_end(first),
            (Linkage::SecondAfterFirst, Direction::Down) => from_start(second),
            (Linkage::StartsMeetFromFirst, _) => from_start(second),
            (Linkage::StartsMeetFromSecond, _) => from_start(first),
            (Linkage::EndsMeetFromFirst, _) => from_end(second),
            (Linkage::EndsMeetFromSecond, _) => from_end(first),
        }
    }
}

/// Finds how to continue the walk past the `boundary` when walking in `direction`.
pub fn next_way<'a>(
    boundary: &Boundary<'a>,
    direction: Direction,
) -> Result<Continuation<'a>, LinkageError> {
    let patterns = match direction {
        Direction::Up => Linkage::UP,
        Direction::Down => Linkage::DOWN,
    };

    patterns
        .into_iter()
        .find(|pattern| pattern.matches(boundary))
        .map(|pattern| pattern.continuation(boundary, direction))
        .ok_or(LinkageError::NoMatchingPattern {
            node: boundary.node,
            direction,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn boundary<'a>(node: i64, incoming: &Way, first: &'a Way, second: &'a Way) -> Boundary<'a> {
        Boundary {
            node: NodeId(node),
            incoming: incoming.id,
            first,
            second,
        }
    }

    #[test]
    fn direction_steps() {
        assert!(Direction::Up.at_boundary(0, 3));
        assert!(!Direction::Up.at_boundary(2, 3));
        assert!(Direction::Down.at_boundary(2, 3));
        assert!(!Direction::Down.at_boundary(0, 3));
        assert_eq!(Direction::Up.step(2), 1);
        assert_eq!(Direction::Down.step(0), 1);
    }

    #[test]
    fn first_after_second() {
        // second: 1 - 2 - 3, first: 3 - 4
        let first = Way::new(102, &[3, 4]);
        let second = Way::new(101, &[1, 2, 3]);
        let b = boundary(3, &first, &first, &second);
        assert!(Linkage::FirstAfterSecond.matches(&b));
        assert!(!Linkage::SecondAfterFirst.matches(&b));

        // Walking up on first, we continue up on second from its end
        let c = Linkage::FirstAfterSecond.continuation(&b, Direction::Up);
        assert_eq!(c.way.id, second.id);
        assert_eq!(c.index, 2);
        assert_eq!(c.direction, Direction::Up);

        // Walking down on second, we continue down on first from its start
        let b = boundary(3, &second, &first, &second);
        let c = next_way(&b, Direction::Down).unwrap();
        assert_eq!(c.way.id, first.id);
        assert_eq!(c.index, 0);
        assert_eq!(c.direction, Direction::Down);
    }

    #[test]
    fn second_after_first() {
        let first = Way::new(101, &[1, 2, 3]);
        let second = Way::new(102, &[3, 4]);
        let b = boundary(3, &second, &first, &second);
        assert!(Linkage::SecondAfterFirst.matches(&b));
        assert!(!Linkage::FirstAfterSecond.matches(&b));

        let c = next_way(&b, Direction::Up).unwrap();
        assert_eq!(c.way.id, first.id);
        assert_eq!(c.index, 2);
        assert_eq!(c.direction, Direction::Up);
    }

    #[test]
    fn starts_meet() {
        // Both ways start at 5: 5 - 4 and 5 - 6 - 7
        let first = Way::new(103, &[5, 4]);
        let second = Way::new(104, &[5, 6, 7]);

        // Coming up from 4, on first
        let b = boundary(5, &first, &first, &second);
        assert!(Linkage::StartsMeetFromFirst.matches(&b));
        assert!(!Linkage::StartsMeetFromSecond.matches(&b));
        let c = next_way(&b, Direction::Up).unwrap();
        assert_eq!(c.way.id, second.id);
        assert_eq!(c.index, 0);
        assert_eq!(c.direction, Direction::Down);

        // Coming up from 6, on second
        let b = boundary(5, &second, &first, &second);
        assert!(Linkage::StartsMeetFromSecond.matches(&b));
        let c = next_way(&b, Direction::Up).unwrap();
        assert_eq!(c.way.id, first.id);
        assert_eq!(c.direction, Direction::Down);

        // Starts meeting is not considered when walking down
        assert_eq!(
            next_way(&b, Direction::Down),
            Err(LinkageError::NoMatchingPattern {
                node: NodeId(5),
                direction: Direction::Down
            })
        );
    }

    #[test]
    fn starts_meet_with_a_shared_neighbour() {
        // 9 was spliced next to 5 in both ways: 5 - 9 - 4 and 5 - 9 - 6 - 7
        let first = Way::new(103, &[5, 9, 4]);
        let second = Way::new(104, &[5, 9, 6, 7]);

        let b = boundary(5, &first, &first, &second);
        assert!(!Linkage::StartsMeetFromSecond.matches(&b));
        let c = next_way(&b, Direction::Up).unwrap();
        assert_eq!(c.way.id, second.id);
        assert_eq!(c.direction, Direction::Down);

        let b = boundary(5, &second, &first, &second);
        assert!(!Linkage::StartsMeetFromFirst.matches(&b));
        let c = next_way(&b, Direction::Up).unwrap();
        assert_eq!(c.way.id, first.id);
        assert_eq!(c.direction, Direction::Down);
    }

    #[test]
    fn ends_meet() {
        // Both ways end at 4: 3 - 4 and 5 - 4
        let first = Way::new(102, &[3, 4]);
        let second = Way::new(103, &[5, 4]);

        let b = boundary(4, &first, &first, &second);
        assert!(Linkage::EndsMeetFromFirst.matches(&b));
        let c = next_way(&b, Direction::Down).unwrap();
        assert_eq!(c.way.id, second.id);
        assert_eq!(c.index, 1);
        assert_eq!(c.direction, Direction::Up);

        let b = boundary(4, &second, &first, &second);
        assert!(Linkage::EndsMeetFromSecond.matches(&b));
        let c = next_way(&b, Direction::Down).unwrap();
        assert_eq!(c.way.id, first.id);
        assert_eq!(c.direction, Direction::Up);

        // Ends meeting is not considered when walking up
        assert!(next_way(&b, Direction::Up).is_err());
    }

    #[test]
    fn unrelated_ways() {
        // 3 is in the middle of the second way
        let first = Way::new(102, &[3, 4]);
        let second = Way::new(106, &[2, 3, 5]);
        let b = boundary(3, &first, &first, &second);
        for pattern in Linkage::UP.iter().chain(Linkage::DOWN.iter()) {
            assert!(!pattern.matches(&b));
        }
    }
}
