pub mod cli;
pub mod config;
pub mod domain;
pub mod geometry;
pub mod parsers;
pub mod performance;
pub mod pipeline;
pub mod propagation;
pub mod seeds;
pub mod smoothing;
pub mod utils;

pub use config::GeodistanceConfig;
pub use domain::DomainIndex;
pub use geometry::{Geometry, NeighborTable};
pub use propagation::{Propagation, propagate};
pub use seeds::{SeedField, SeedMode};
