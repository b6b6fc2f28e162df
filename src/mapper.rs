//! Places all the catalog elements of a line on its track graph.
//!
//! The placement runs in two passes over the same set of anchors:
//! 1. main signals and switches are identified by name among the tagged nodes of the graph.
//!    Every unique match becomes an anchor, unless it contradicts an existing anchor;
//! 2. every other element is located from its kilometrage, relative to the anchors.
//!
//! Elements that could not be placed are recorded in a [`NotFoundTracker`].

use std::collections::HashSet;

use thiserror::Error;

use crate::anchors::{Anchor, AnchorError, AnchorMap};
use crate::catalog::{Catalog, CatalogElement, Heading, NamedElement, TrackPlanNode};
use crate::elements::{element_node, NodeIdCounter};
use crate::kilometrage::{parse_kilometrage, Kilometrage, KilometrageError};
use crate::osm::{Node, NodeId, Osm, TopologyError};
use crate::resolver::{resolve, ResolveError};
use crate::tracker::{Category, NotFoundTracker};

/// Default first id of the synthetic nodes, well above the ids of real graphs.
pub const DEFAULT_ID_SEED: i64 = 1_000_000_000_000;

/// Settings of the placement.
#[derive(Clone, Debug, PartialEq)]
pub struct MapperOptions {
    /// First id given to a synthetic node.
    /// The ids start higher if the graph already has nodes above that seed.
    pub id_seed: i64,
}

impl Default for MapperOptions {
    fn default() -> Self {
        Self {
            id_seed: DEFAULT_ID_SEED,
        }
    }
}

/// Errors that stop the placement of a whole line.
#[derive(Error, Debug)]
pub enum MapperError {
    /// The kilometrage of an element can not be read.
    #[error("invalid kilometrage for {category} `{label}`")]
    Kilometrage {
        /// Category of the element.
        category: Category,
        /// Name or kilometrage of the element.
        label: String,
        /// The parsing error.
        #[source]
        source: KilometrageError,
    },
    /// The graph is inconsistent.
    #[error("topology error")]
    Topology(#[from] TopologyError),
    /// An anchor does not fit with the anchors at its kilometrage.
    #[error("invalid anchor")]
    Anchor(#[from] AnchorError),
    /// The resolution of an element failed for a reason other than the anchors.
    #[error("failed to place {category} `{label}`")]
    Resolve {
        /// Category of the element.
        category: Category,
        /// Name or kilometrage of the element.
        label: String,
        /// The resolution error.
        #[source]
        source: ResolveError,
    },
}

/// What identified an anchor.
#[derive(Clone, Debug, PartialEq)]
pub enum AnchorSource {
    /// A main signal matched by name.
    MainSignal {
        /// The catalog element.
        signal: NamedElement,
        /// Direction of the signal.
        heading: Heading,
        /// The synthetic node carrying the signal.
        marker: NodeId,
    },
    /// A switch matched by name.
    Switch {
        /// The catalog element.
        switch: NamedElement,
        /// The synthetic node carrying the switch.
        marker: NodeId,
    },
    /// A switch found through the name given by one of its stems or branches.
    Partner {
        /// The switch name.
        partner: String,
    },
}

/// The result of the placement of a line.
#[derive(Debug)]
pub struct MappedLine {
    /// The graph, with the synthetic nodes spliced in.
    pub osm: Osm,
    /// The elements that could not be placed.
    pub not_found: NotFoundTracker,
    /// Number of anchors at the end of the first pass.
    pub found_anchors: usize,
    /// Number of distinct kilometrages among these anchors.
    /// The elements can only be placed with at least two of them.
    pub anchor_kilometrages: usize,
}

// Metadata shared by all the elements of a list.
#[derive(Clone, Copy, Debug)]
struct Kind {
    category: Category,
    subtype: &'static str,
    heading: Option<Heading>,
}

impl Kind {
    const fn new(category: Category, subtype: &'static str, heading: Option<Heading>) -> Self {
        Self {
            category,
            subtype,
            heading,
        }
    }

    fn position(&self, element: &dyn CatalogElement) -> Result<Kilometrage, MapperError> {
        parse_kilometrage(element.kilometrage()).map_err(|source| MapperError::Kilometrage {
            category: self.category,
            label: element.label().to_owned(),
            source,
        })
    }
}

struct Batch<'a> {
    kind: Kind,
    elements: Vec<&'a dyn CatalogElement>,
}

impl<'a> Batch<'a> {
    fn new<E: CatalogElement>(kind: Kind, elements: &'a [E]) -> Self {
        Self {
            kind,
            elements: elements.iter().map(|e| e as &dyn CatalogElement).collect(),
        }
    }
}

fn directional<'a, E: CatalogElement>(
    category: Category,
    subtype: &'static str,
    falling: &'a [E],
    rising: &'a [E],
) -> [Batch<'a>; 2] {
    [
        Batch::new(Kind::new(category, subtype, Some(Heading::Falling)), falling),
        Batch::new(Kind::new(category, subtype, Some(Heading::Rising)), rising),
    ]
}

// The elements of a track plan node that are only placed by kilometrage.
fn positional_batches(node: &TrackPlanNode) -> Vec<Batch<'_>> {
    use Category::*;

    let mut batches = vec![];
    batches.extend(directional(
        ApproachSignals,
        "as",
        &node.approach_signals_falling,
        &node.approach_signals_rising,
    ));
    batches.extend(directional(
        ProtectionSignals,
        "ps",
        &node.protection_signals_falling,
        &node.protection_signals_rising,
    ));
    batches.push(Batch::new(
        Kind::new(Crosses, "cross", None),
        &node.cross_switch_begins,
    ));
    batches.extend(directional(
        Halts,
        "hlt",
        &node.freight_halts_falling,
        &node.freight_halts_rising,
    ));
    batches.extend(directional(
        Halts,
        "hlt",
        &node.passenger_halts_falling,
        &node.passenger_halts_rising,
    ));
    batches.extend(directional(
        SpeedLimits,
        "spl",
        &node.speed_limits_falling,
        &node.speed_limits_rising,
    ));
    batches.push(Batch::new(Kind::new(Slopes, "slope", None), &node.slopes));
    batches.push(Batch::new(Kind::new(Tunnels, "tunnel", None), &node.tunnels));
    batches.push(Batch::new(
        Kind::new(TrackEnds, "track_end", None),
        &node.track_ends,
    ));
    batches.push(Batch::new(Kind::new(Borders, "border", None), &node.borders));
    batches.push(Batch::new(Kind::new(Bumpers, "bumper", None), &node.bumpers));
    for jumps in [&node.km_jump_begins, &node.km_jump_ends] {
        batches.push(Batch::new(Kind::new(KilometrageJumps, "km_jump", None), jumps));
    }
    for switches in [&node.line_switches_from, &node.line_switches_to] {
        batches.push(Batch::new(
            Kind::new(LineSwitches, "line_switch", None),
            switches,
        ));
    }
    batches.extend(directional(
        Eotds,
        "eotd",
        &node.signal_eotds_falling,
        &node.signal_eotds_rising,
    ));
    batches.extend(directional(
        Eotds,
        "eotd",
        &node.route_eotds_falling,
        &node.route_eotds_rising,
    ));
    batches
}

fn is_signal_named(node: &Node, name: &str) -> bool {
    node.has_tag("railway", "signal") && node.tag("ref").is_ok_and(|r| r.replace(' ', "") == name)
}

fn is_switch_named(node: &Node, name: &str) -> bool {
    node.has_tag("railway", "switch") && (node.has_tag("ref", name) || node.has_tag("name", name))
}

const MAIN_SIGNAL: Kind = Kind::new(Category::MainSignals, "ms", None);
const SWITCH: Kind = Kind::new(Category::Switches, "simple_switch", None);

/// Placement state of one line: the graph being augmented, the anchors,
/// and the elements left for the second pass.
pub struct LineMapper {
    osm: Osm,
    anchors: AnchorMap<AnchorSource>,
    ids: NodeIdCounter,
    not_found: NotFoundTracker,
    conflicting_names: HashSet<(Category, String)>,
    pending_signals: Vec<(Heading, NamedElement)>,
    pending_switches: Vec<NamedElement>,
}

impl LineMapper {
    /// Starts the placement on the graph of a line.
    pub fn new(osm: Osm, options: &MapperOptions) -> Self {
        let ids = NodeIdCounter::new(&osm, options.id_seed);
        Self {
            osm,
            anchors: AnchorMap::new(),
            ids,
            not_found: NotFoundTracker::new(),
            conflicting_names: HashSet::new(),
            pending_signals: vec![],
            pending_switches: vec![],
        }
    }

    /// The graph in its current state.
    pub fn osm(&self) -> &Osm {
        &self.osm
    }

    /// The current anchors.
    pub fn anchors(&self) -> &AnchorMap<AnchorSource> {
        &self.anchors
    }

    /// Number of anchors, all kilometrages included.
    pub fn found_anchors(&self) -> usize {
        self.anchors.anchor_count()
    }

    /// The elements recorded as not found so far.
    pub fn not_found(&self) -> &NotFoundTracker {
        &self.not_found
    }

    fn find_unique(&self, matches: impl Fn(&Node) -> bool) -> Option<NodeId> {
        let mut found = self
            .osm
            .nodes
            .iter()
            .filter(|node| !node.tags.is_empty() && matches(node));
        match (found.next(), found.next()) {
            (Some(node), None) => Some(node.id),
            _ => None,
        }
    }

    /// First pass: anchors the main signals whose name matches exactly one signal of the graph.
    pub fn anchor_main_signals(&mut self, node: &TrackPlanNode) -> Result<(), MapperError> {
        let signals = node
            .main_signals_falling
            .iter()
            .map(|signal| (Heading::Falling, signal))
            .chain(
                node.main_signals_rising
                    .iter()
                    .map(|signal| (Heading::Rising, signal)),
            );

        for (heading, signal) in signals {
            let kind = Kind {
                heading: Some(heading),
                ..MAIN_SIGNAL
            };
            let anchored = match signal.name() {
                Some(name) => self.anchor_by_name(
                    kind,
                    signal,
                    |node| is_signal_named(node, name),
                    |marker| AnchorSource::MainSignal {
                        signal: signal.clone(),
                        heading,
                        marker,
                    },
                )?,
                None => false,
            };
            if !anchored {
                self.pending_signals.push((heading, signal.clone()));
            }
        }
        Ok(())
    }

    /// First pass: anchors the switches whose name matches exactly one switch of the graph.
    pub fn anchor_switches(&mut self, node: &TrackPlanNode) -> Result<(), MapperError> {
        for switch in &node.switch_begins {
            let anchored = match switch.name() {
                Some(name) => self.anchor_by_name(
                    SWITCH,
                    switch,
                    |node| is_switch_named(node, name),
                    |marker| AnchorSource::Switch {
                        switch: switch.clone(),
                        marker,
                    },
                )?,
                None => false,
            };
            if !anchored {
                self.pending_switches.push(switch.clone());
            }
        }
        Ok(())
    }

    /// First pass: anchors the switches named by their stems and branches.
    ///
    /// No element is created for them. A switch is only used if nothing is anchored yet
    /// at that kilometrage, nor at its coordinates.
    pub fn anchor_switch_partners(&mut self, node: &TrackPlanNode) -> Result<(), MapperError> {
        for end in node.switch_ends() {
            let position = SWITCH.position(end)?;
            let Some(matched) = self.find_unique(|node| is_switch_named(node, &end.partner)) else {
                continue;
            };
            let switch = self.osm.node(matched)?;
            if self.anchors.contains_position(position) || self.anchors.has_anchor_at(switch) {
                continue;
            }
            log::debug!("anchoring switch {} at kilometrage {position}", end.partner);
            let anchor = Anchor::new(
                switch,
                AnchorSource::Partner {
                    partner: end.partner.clone(),
                },
            );
            self.anchors.insert(position, anchor)?;
        }
        Ok(())
    }

    // A name is tried once: after a failure, every element with that name
    // is left to the second pass.
    fn anchor_by_name(
        &mut self,
        kind: Kind,
        element: &NamedElement,
        matches: impl Fn(&Node) -> bool,
        source: impl FnOnce(NodeId) -> AnchorSource,
    ) -> Result<bool, MapperError> {
        let Some(name) = element.name() else {
            return Ok(false);
        };
        let key = (kind.category, name.to_owned());
        if self.conflicting_names.contains(&key) {
            return Ok(false);
        }

        let anchored = match self.find_unique(matches) {
            Some(matched) => self.try_anchor(kind, element, matched, source)?,
            None => false,
        };
        if !anchored {
            self.conflicting_names.insert(key);
        }
        Ok(anchored)
    }

    // Adds the matched node as an anchor, and its element to the graph.
    // If another kilometrage is already anchored at the same coordinates, or the same
    // kilometrage at other coordinates, that kilometrage is invalidated instead.
    fn try_anchor(
        &mut self,
        kind: Kind,
        element: &NamedElement,
        matched: NodeId,
        source: impl FnOnce(NodeId) -> AnchorSource,
    ) -> Result<bool, MapperError> {
        let position = kind.position(element)?;
        let node = self.osm.node(matched)?.clone();

        if let Some(conflict) = self.anchors.conflicting_position(&node, position) {
            log::debug!(
                "{} `{}` at kilometrage {position} conflicts with anchors at kilometrage {conflict}",
                kind.category,
                element.label()
            );
            self.invalidate(conflict)?;
            return Ok(false);
        }

        let marker = self.ids.next_id();
        let new_node = element_node(
            marker,
            &node,
            kind.subtype,
            kind.heading,
            element.name(),
            vec![],
        );
        self.osm.splice(new_node, matched)?;
        self.anchors.insert(position, Anchor::new(&node, source(marker)))?;
        Ok(true)
    }

    // Removes all the anchors at `position`. Their elements go back to the second pass.
    fn invalidate(&mut self, position: Kilometrage) -> Result<(), MapperError> {
        for anchor in self.anchors.remove(position) {
            match anchor.payload {
                AnchorSource::MainSignal {
                    signal,
                    heading,
                    marker,
                } => {
                    self.osm.node_mut(marker)?.tags.clear();
                    self.pending_signals.push((heading, signal));
                }
                AnchorSource::Switch { switch, marker } => {
                    self.osm.node_mut(marker)?.tags.clear();
                    self.pending_switches.push(switch);
                }
                AnchorSource::Partner { partner } => {
                    log::debug!("dropping switch {partner} as anchor");
                }
            }
        }
        Ok(())
    }

    /// Second pass: places the elements left by the first pass and all the other elements
    /// of the `nodes`, from their kilometrage.
    ///
    /// With less than two anchor kilometrages, nothing can be placed
    /// and every element is recorded as not found.
    pub fn place_remaining<'c>(
        &mut self,
        nodes: impl IntoIterator<Item = &'c TrackPlanNode>,
    ) -> Result<(), MapperError> {
        let pending_signals = std::mem::take(&mut self.pending_signals);
        let pending_switches = std::mem::take(&mut self.pending_switches);

        let mut batches = vec![];
        for heading in [Heading::Falling, Heading::Rising] {
            batches.push(Batch {
                kind: Kind {
                    heading: Some(heading),
                    ..MAIN_SIGNAL
                },
                elements: pending_signals
                    .iter()
                    .filter(|(h, _)| *h == heading)
                    .map(|(_, signal)| signal as &dyn CatalogElement)
                    .collect(),
            });
        }
        batches.push(Batch::new(SWITCH, &pending_switches));
        for node in nodes {
            batches.extend(positional_batches(node));
        }

        if self.anchors.len() < 2 {
            log::warn!(
                "{} anchor kilometrage(s) only, the elements can not be placed",
                self.anchors.len()
            );
            for batch in &batches {
                for element in &batch.elements {
                    self.not_found.add(batch.kind.category, element.label());
                }
            }
            return Ok(());
        }

        for batch in &batches {
            self.place(batch)?;
        }
        Ok(())
    }

    fn place(&mut self, batch: &Batch) -> Result<(), MapperError> {
        let kind = batch.kind;
        for &element in &batch.elements {
            let position = kind.position(element)?;
            let at = match resolve(&self.osm, &self.anchors, position) {
                Ok(at) => at,
                Err(err) if err.is_recoverable() => {
                    log::debug!("{} `{}` not found: {err}", kind.category, element.label());
                    self.not_found.add(kind.category, element.label());
                    continue;
                }
                Err(source) => {
                    return Err(MapperError::Resolve {
                        category: kind.category,
                        label: element.label().to_owned(),
                        source,
                    })
                }
            };

            let id = self.ids.next_id();
            let new_node = element_node(
                id,
                self.osm.node(at)?,
                kind.subtype,
                kind.heading,
                element.name(),
                element.extra_tags(),
            );
            self.osm.splice(new_node, at)?;
            log::debug!(
                "placed {} `{}` next to node {}",
                kind.category,
                element.label(),
                at.0
            );
        }
        Ok(())
    }

    /// Ends the placement.
    pub fn finish(self) -> MappedLine {
        let found_anchors = self.found_anchors();
        let anchor_kilometrages = self.anchors.len();
        MappedLine {
            osm: self.osm,
            not_found: self.not_found,
            found_anchors,
            anchor_kilometrages,
        }
    }
}

/// Places every element of the `catalog` of a line on its graph.
///
/// Main signals and switches are anchored by name first, over the whole catalog.
/// Then all the remaining elements are placed relative to these anchors.
pub fn map_line(
    osm: Osm,
    catalog: &Catalog,
    options: &MapperOptions,
) -> Result<MappedLine, MapperError> {
    let mut mapper = LineMapper::new(osm, options);
    for node in catalog.track_plan_nodes() {
        mapper.anchor_main_signals(node)?;
        mapper.anchor_switches(node)?;
    }
    for node in catalog.track_plan_nodes() {
        mapper.anchor_switch_partners(node)?;
    }
    log::info!(
        "found {} anchors at {} kilometrages",
        mapper.found_anchors(),
        mapper.anchors().len()
    );

    mapper.place_remaining(catalog.track_plan_nodes())?;
    Ok(mapper.finish())
}
