//! Records the catalog elements of a line that could not be placed on the graph.

use std::collections::BTreeMap;
use std::fmt;

use serde::Serialize;

/// The kinds of catalog elements, as they appear in the not-found report.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Category {
    /// Main signals.
    #[serde(rename = "Main Signals")]
    MainSignals,
    /// Approach signals.
    #[serde(rename = "Approach Signals")]
    ApproachSignals,
    /// Protection signals.
    #[serde(rename = "Protection Signals")]
    ProtectionSignals,
    /// Switch begins.
    #[serde(rename = "Switches")]
    Switches,
    /// Crossing switches.
    #[serde(rename = "Crosses")]
    Crosses,
    /// Freight and passenger halts.
    #[serde(rename = "Halts")]
    Halts,
    /// Maximum speed changes.
    #[serde(rename = "Speed Limits")]
    SpeedLimits,
    /// Gradient changes.
    #[serde(rename = "Slopes")]
    Slopes,
    /// Tunnels.
    #[serde(rename = "Tunnels")]
    Tunnels,
    /// Track ends.
    #[serde(rename = "Track Ends")]
    TrackEnds,
    /// Operating point borders.
    #[serde(rename = "Borders")]
    Borders,
    /// Buffer stops.
    #[serde(rename = "Bumpers")]
    Bumpers,
    /// Kilometrage jump begins and ends.
    #[serde(rename = "Kilometrage Jump")]
    KilometrageJumps,
    /// Changes from one line to another.
    #[serde(rename = "Line Switchs")]
    LineSwitches,
    /// End-of-train detectors.
    #[serde(rename = "Eotds")]
    Eotds,
}

impl Category {
    /// Name used in the report and in the logs.
    pub fn name(self) -> &'static str {
        match self {
            Category::MainSignals => "Main Signals",
            Category::ApproachSignals => "Approach Signals",
            Category::ProtectionSignals => "Protection Signals",
            Category::Switches => "Switches",
            Category::Crosses => "Crosses",
            Category::Halts => "Halts",
            Category::SpeedLimits => "Speed Limits",
            Category::Slopes => "Slopes",
            Category::Tunnels => "Tunnels",
            Category::TrackEnds => "Track Ends",
            Category::Borders => "Borders",
            Category::Bumpers => "Bumpers",
            Category::KilometrageJumps => "Kilometrage Jump",
            Category::LineSwitches => "Line Switchs",
            Category::Eotds => "Eotds",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unplaced elements of a line, by [`Category`], in the order they were recorded.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct NotFoundTracker {
    elements: BTreeMap<Category, Vec<String>>,
}

impl NotFoundTracker {
    /// An empty tracker.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records that the element `label` of `category` could not be placed.
    pub fn add(&mut self, category: Category, label: impl Into<String>) {
        self.elements
            .entry(category)
            .or_default()
            .push(label.into());
    }

    /// The labels recorded for `category`.
    pub fn get(&self, category: Category) -> &[String] {
        self.elements
            .get(&category)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// Number of elements recorded for `category`.
    pub fn count(&self, category: Category) -> usize {
        self.get(category).len()
    }

    /// Number of elements recorded, all categories included.
    pub fn total(&self) -> usize {
        self.elements.values().map(Vec::len).sum()
    }

    /// Is nothing recorded.
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// The categories having recorded elements, with their labels.
    pub fn iter(&self) -> impl Iterator<Item = (Category, &[String])> {
        self.elements
            .iter()
            .map(|(category, labels)| (*category, labels.as_slice()))
    }

    /// Logs one line per category with its number of unplaced elements.
    pub fn log_summary(&self, line: &str) {
        for (category, labels) in self.iter() {
            log::info!("line {line}: {} {category} not found", labels.len());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn records_by_category() {
        let mut tracker = NotFoundTracker::new();
        assert!(tracker.is_empty());

        tracker.add(Category::Switches, "W1");
        tracker.add(Category::MainSignals, "A");
        tracker.add(Category::Switches, String::from("W2"));

        assert_eq!(tracker.get(Category::Switches), ["W1", "W2"]);
        assert_eq!(tracker.count(Category::MainSignals), 1);
        assert_eq!(tracker.count(Category::Slopes), 0);
        assert!(tracker.get(Category::Slopes).is_empty());
        assert_eq!(tracker.total(), 3);

        let categories: Vec<_> = tracker.iter().map(|(c, _)| c).collect();
        assert_eq!(categories, vec![Category::MainSignals, Category::Switches]);
    }

    #[test]
    fn report() {
        let mut tracker = NotFoundTracker::new();
        tracker.add(Category::LineSwitches, "12,300");
        tracker.add(Category::MainSignals, "A");

        assert_eq!(Category::KilometrageJumps.to_string(), "Kilometrage Jump");
        assert_eq!(
            serde_json::to_string(&tracker).unwrap(),
            r#"{"Main Signals":["A"],"Line Switchs":["12,300"]}"#
        );
    }
}
