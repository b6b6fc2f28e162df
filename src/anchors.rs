//! Anchors are graph nodes whose kilometrage is confirmed.
//! They are the reference points from which the other elements of a line are located.

use std::collections::BTreeMap;

use ordered_float::OrderedFloat;
use thiserror::Error;

use crate::kilometrage::Kilometrage;
use crate::osm::{Node, NodeId};

/// Errors when adding an anchor.
#[derive(Error, Debug, PartialEq)]
pub enum AnchorError {
    /// The anchors of a kilometrage must all share the same coordinates.
    #[error("node {node:?} is not at the coordinates of the anchors at kilometrage {position}")]
    MixedCoordinates {
        /// The rejected node.
        node: NodeId,
        /// The kilometrage of the bucket.
        position: Kilometrage,
    },
}

/// A node confirmed at a kilometrage, with whatever the caller needs to remember about it.
#[derive(Clone, Debug, PartialEq)]
pub struct Anchor<T> {
    /// The node in the graph.
    pub node: NodeId,
    /// Latitude of the node.
    pub lat: f64,
    /// Longitude of the node.
    pub lon: f64,
    /// Caller data, e.g. the catalog element that identified the node.
    pub payload: T,
}

impl<T> Anchor<T> {
    /// Builds an [`Anchor`] on `node`.
    pub fn new(node: &Node, payload: T) -> Self {
        Self {
            node: node.id,
            lat: node.lat,
            lon: node.lon,
            payload,
        }
    }

    /// Is the anchor at the exact coordinates of `node`.
    pub fn is_at(&self, node: &Node) -> bool {
        self.lat == node.lat && self.lon == node.lon
    }
}

/// Anchors of a line, grouped in buckets by kilometrage.
///
/// All the anchors of a bucket share the same coordinates.
/// A bucket is never empty.
#[derive(Clone, Debug)]
pub struct AnchorMap<T> {
    buckets: BTreeMap<OrderedFloat<Kilometrage>, Vec<Anchor<T>>>,
}

impl<T> Default for AnchorMap<T> {
    fn default() -> Self {
        Self {
            buckets: BTreeMap::new(),
        }
    }
}

impl<T> AnchorMap<T> {
    /// An empty map.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct kilometrages.
    pub fn len(&self) -> usize {
        self.buckets.len()
    }

    /// Is there no anchor at all.
    pub fn is_empty(&self) -> bool {
        self.buckets.is_empty()
    }

    /// Number of anchors, all buckets included.
    pub fn anchor_count(&self) -> usize {
        self.buckets.values().map(Vec::len).sum()
    }

    /// Adds an anchor to the bucket at `position`, creating the bucket if needed.
    /// The anchor is rejected if the bucket already holds anchors at other coordinates.
    pub fn insert(&mut self, position: Kilometrage, anchor: Anchor<T>) -> Result<(), AnchorError> {
        let bucket = self.buckets.entry(OrderedFloat(position)).or_default();
        if let Some(existing) = bucket.first() {
            if existing.lat != anchor.lat || existing.lon != anchor.lon {
                return Err(AnchorError::MixedCoordinates {
                    node: anchor.node,
                    position,
                });
            }
        }
        bucket.push(anchor);
        Ok(())
    }

    /// The anchors at `position`.
    pub fn get(&self, position: Kilometrage) -> Option<&[Anchor<T>]> {
        self.buckets
            .get(&OrderedFloat(position))
            .map(|bucket| bucket.as_slice())
    }

    /// Is there a bucket at `position`.
    pub fn contains_position(&self, position: Kilometrage) -> bool {
        self.buckets.contains_key(&OrderedFloat(position))
    }

    /// Removes the whole bucket at `position`.
    pub fn remove(&mut self, position: Kilometrage) -> Vec<Anchor<T>> {
        self.buckets
            .remove(&OrderedFloat(position))
            .unwrap_or_default()
    }

    /// The kilometrage of a bucket that contradicts anchoring `node` at `position`:
    /// either the bucket at `position` lies at other coordinates,
    /// or another bucket lies at the coordinates of `node`.
    pub fn conflicting_position(&self, node: &Node, position: Kilometrage) -> Option<Kilometrage> {
        let elsewhere = self
            .get(position)
            .and_then(|bucket| bucket.first())
            .is_some_and(|anchor| !anchor.is_at(node));
        if elsewhere {
            return Some(position);
        }

        self.buckets
            .iter()
            .find(|(key, bucket)| {
                key.0 != position && bucket.iter().any(|anchor| anchor.is_at(node))
            })
            .map(|(key, _)| key.0)
    }

    /// Is any anchor at the coordinates of `node`.
    pub fn has_anchor_at(&self, node: &Node) -> bool {
        self.iter().any(|(_, anchor)| anchor.is_at(node))
    }

    /// The first anchor of every bucket, nearest to `target` first.
    /// Buckets at the same distance are sorted by kilometrage.
    pub fn by_proximity(&self, target: Kilometrage) -> Vec<(Kilometrage, &Anchor<T>)> {
        let mut result: Vec<_> = self
            .buckets
            .iter()
            .filter_map(|(key, bucket)| bucket.first().map(|anchor| (key.0, anchor)))
            .collect();
        result.sort_by(|a, b| (a.0 - target).abs().total_cmp(&(b.0 - target).abs()));
        result
    }

    /// Iterates over all the anchors with their kilometrage, in increasing kilometrage.
    pub fn iter(&self) -> impl Iterator<Item = (Kilometrage, &Anchor<T>)> {
        self.buckets
            .iter()
            .flat_map(|(key, bucket)| bucket.iter().map(move |anchor| (key.0, anchor)))
    }
}
