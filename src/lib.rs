//! Waypoint command-line library
//!
//! Exposes the command implementations for integration testing

pub mod commands;
pub mod config;
pub mod errors;
pub mod output;

pub use commands::{Page, ResolveReport, ScrollReport, TrackReport};
pub use config::{load_config, WaypointConfig};
pub use errors::{CliError, CliResult};
