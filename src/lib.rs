//! Network Linked Data Index (NLDI).
//!
//! A read-only HTTP service that traverses the NHDPlus hydrography
//! network as a linked graph: resolve a starting feature to a flowline
//! anchor, expand it with the in-database navigation function, and
//! project the result onto flowlines, crawled features, or upstream
//! basins as GeoJSON.

pub mod cli;
pub mod config;
pub mod error;
pub mod geojson;
pub mod model;
pub mod pygeoapi;
pub mod registry;
pub mod repository;
pub mod server;
pub mod services;
pub mod util;
