//! Places the elements of a railway infrastructure catalog, located by their kilometrage,
//! on an OpenStreetMap track graph.

#[deny(missing_docs)]
pub mod anchors;
#[deny(missing_docs)]
pub mod catalog;
#[deny(missing_docs)]
pub mod elements;
#[deny(missing_docs)]
pub mod kilometrage;
#[deny(missing_docs)]
pub mod linkage;
#[deny(missing_docs)]
pub mod mapper;
#[deny(missing_docs)]
pub mod osm;
#[deny(missing_docs)]
pub mod resolver;
#[deny(missing_docs)]
pub mod tracker;
#[deny(missing_docs)]
pub mod walker;
