//! The infrastructure catalog of a line, where every element is located by its kilometrage.
//!
//! The catalog is a hierarchy: [`Catalog`] → [`OperatingPoint`] → [`Section`] → [`TrackPlanNode`].
//! A track plan node holds one list per kind of element. Missing lists are read as empty.

use serde::{Deserialize, Serialize};

use crate::osm::Tag;

/// The direction an element applies to, relative to the kilometrage.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Heading {
    /// Decreasing kilometrage.
    Falling,
    /// Increasing kilometrage.
    Rising,
}

impl Heading {
    /// Value of the `direction` tag.
    pub fn tag_value(self) -> &'static str {
        match self {
            Heading::Falling => "falling",
            Heading::Rising => "rising",
        }
    }
}

/// What the placement needs to know about any catalog element.
pub trait CatalogElement {
    /// The raw kilometrage, e.g. `5,000+0,150`.
    fn kilometrage(&self) -> &str;

    /// The name, for the elements that carry one.
    fn name(&self) -> Option<&str> {
        None
    }

    /// How the element is designated in the not-found report.
    fn label(&self) -> &str {
        self.name().unwrap_or(self.kilometrage())
    }

    /// Category specific tags, appended after the common ones.
    fn extra_tags(&self) -> Vec<Tag> {
        vec![]
    }
}

/// An element known only by its position.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SimpleElement {
    /// Identifier in the catalog.
    #[serde(default)]
    pub id: String,
    /// Raw kilometrage.
    pub kilometrage: String,
}

impl CatalogElement for SimpleElement {
    fn kilometrage(&self) -> &str {
        &self.kilometrage
    }
}

/// An element with a name, like a signal or a switch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct NamedElement {
    /// Identifier in the catalog.
    #[serde(default)]
    pub id: String,
    /// Raw kilometrage.
    pub kilometrage: String,
    /// Name, as displayed on the ground.
    #[serde(default)]
    pub name: Option<String>,
}

impl CatalogElement for NamedElement {
    fn kilometrage(&self) -> &str {
        &self.kilometrage
    }

    fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }
}

/// A change of the maximum allowed speed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpeedLimit {
    /// Identifier in the catalog.
    #[serde(default)]
    pub id: String,
    /// Raw kilometrage.
    pub kilometrage: String,
    /// The new speed, in km/h.
    pub speed: String,
}

impl CatalogElement for SpeedLimit {
    fn kilometrage(&self) -> &str {
        &self.kilometrage
    }

    fn extra_tags(&self) -> Vec<Tag> {
        vec![Tag::new("speed", &self.speed)]
    }
}

/// A change of gradient.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Slope {
    /// Identifier in the catalog.
    #[serde(default)]
    pub id: String,
    /// Raw kilometrage.
    pub kilometrage: String,
    /// Gradient in the rising direction.
    pub rising: String,
    /// Gradient in the falling direction.
    pub falling: String,
}

impl CatalogElement for Slope {
    fn kilometrage(&self) -> &str {
        &self.kilometrage
    }

    fn extra_tags(&self) -> Vec<Tag> {
        vec![
            Tag::new("rising", &self.rising),
            Tag::new("falling", &self.falling),
        ]
    }
}

/// The stem or a branch of a switch. It refers to the switch by its name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SwitchEnd {
    /// Identifier in the catalog.
    #[serde(default)]
    pub id: String,
    /// Raw kilometrage.
    pub kilometrage: String,
    /// Name of the switch.
    pub partner: String,
}

impl CatalogElement for SwitchEnd {
    fn kilometrage(&self) -> &str {
        &self.kilometrage
    }

    fn name(&self) -> Option<&str> {
        Some(&self.partner)
    }
}

/// All the elements of one node of the track plan.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackPlanNode {
    /// Main signals for the falling direction.
    pub main_signals_falling: Vec<NamedElement>,
    /// Main signals for the rising direction.
    pub main_signals_rising: Vec<NamedElement>,
    /// Approach signals for the falling direction.
    pub approach_signals_falling: Vec<NamedElement>,
    /// Approach signals for the rising direction.
    pub approach_signals_rising: Vec<NamedElement>,
    /// Protection signals for the falling direction.
    pub protection_signals_falling: Vec<NamedElement>,
    /// Protection signals for the rising direction.
    pub protection_signals_rising: Vec<NamedElement>,

    /// Switches, located at their begin.
    pub switch_begins: Vec<NamedElement>,
    /// Switch stems.
    pub switch_stems: Vec<SwitchEnd>,
    /// Left branches of the switches.
    pub switch_branches_left: Vec<SwitchEnd>,
    /// Right branches of the switches.
    pub switch_branches_right: Vec<SwitchEnd>,
    /// Crossing switches, located at their left begin.
    pub cross_switch_begins: Vec<NamedElement>,

    /// Freight halts for the falling direction.
    pub freight_halts_falling: Vec<NamedElement>,
    /// Freight halts for the rising direction.
    pub freight_halts_rising: Vec<NamedElement>,
    /// Passenger halts for the falling direction.
    pub passenger_halts_falling: Vec<NamedElement>,
    /// Passenger halts for the rising direction.
    pub passenger_halts_rising: Vec<NamedElement>,

    /// Speed changes for the falling direction.
    pub speed_limits_falling: Vec<SpeedLimit>,
    /// Speed changes for the rising direction.
    pub speed_limits_rising: Vec<SpeedLimit>,
    /// Gradient changes, both directions at once.
    pub slopes: Vec<Slope>,

    /// Tunnels.
    pub tunnels: Vec<NamedElement>,
    /// Track ends.
    pub track_ends: Vec<NamedElement>,
    /// Borders of the operating point.
    pub borders: Vec<SimpleElement>,
    /// Buffer stops.
    pub bumpers: Vec<SimpleElement>,
    /// Where the kilometrage starts to jump.
    pub km_jump_begins: Vec<SimpleElement>,
    /// Where the kilometrage is continuous again.
    pub km_jump_ends: Vec<SimpleElement>,
    /// Line switches where the line number changes from the current one.
    pub line_switches_from: Vec<SimpleElement>,
    /// Line switches where the line number changes to the current one.
    pub line_switches_to: Vec<SimpleElement>,

    /// End-of-train detectors bound to a signal, falling direction.
    pub signal_eotds_falling: Vec<SimpleElement>,
    /// End-of-train detectors bound to a signal, rising direction.
    pub signal_eotds_rising: Vec<SimpleElement>,
    /// End-of-train detectors bound to a route, falling direction.
    pub route_eotds_falling: Vec<SimpleElement>,
    /// End-of-train detectors bound to a route, rising direction.
    pub route_eotds_rising: Vec<SimpleElement>,
}

impl TrackPlanNode {
    /// The stems and branches of the switches.
    pub fn switch_ends(&self) -> impl Iterator<Item = &SwitchEnd> {
        self.switch_stems
            .iter()
            .chain(&self.switch_branches_left)
            .chain(&self.switch_branches_right)
    }
}

/// A part of an operating point on a given line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Section {
    /// The line number.
    #[serde(default)]
    pub line: String,
    /// Nodes of the track plan.
    #[serde(default)]
    pub nodes: Vec<TrackPlanNode>,
}

/// A station, a junction or any named place of the line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct OperatingPoint {
    /// Name of the operating point.
    #[serde(default)]
    pub name: String,
    /// The sections of the operating point.
    #[serde(default)]
    pub sections: Vec<Section>,
}

/// The catalog of a line.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Catalog {
    /// The operating points of the line.
    #[serde(default)]
    pub operating_points: Vec<OperatingPoint>,
}

impl Catalog {
    /// Every node of the track plan, in document order.
    pub fn track_plan_nodes(&self) -> impl Iterator<Item = &TrackPlanNode> {
        self.operating_points
            .iter()
            .flat_map(|point| &point.sections)
            .flat_map(|section| &section.nodes)
    }
}
