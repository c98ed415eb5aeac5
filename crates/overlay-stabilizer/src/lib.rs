//! Overlay stabilizer - pin an overlay to an element whose geometry may still be settling
//!
//! A run polls the element's rectangle on a context-dependent schedule:
//! - Standard content, modal/portal content and expanding navigation get separate budgets
//! - Zero-size or detached targets fall back to the nearest visible ancestor
//! - Three unchanged samples stabilize the position, five stop polling
//! - Exhausting the budget forces the overlay visible with the last sample
//!
//! Runs are tokio tasks driven by an interval, an optional mutation feed and a
//! cancellation token. [`OverlaySlot`] keeps at most one run per overlay.

pub mod config;
pub mod context;
pub mod errors;
pub mod handle;
pub mod sampler;
pub mod scroll;
pub mod sink;
pub mod slot;
pub mod stabilizer;
pub mod state;

pub use config::*;
pub use context::*;
pub use errors::*;
pub use handle::StabilizationHandle;
pub use sampler::{ancestor_fallback, GeometrySample};
pub use scroll::*;
pub use sink::*;
pub use slot::OverlaySlot;
pub use stabilizer::PositionStabilizer;
pub use state::*;
