//! Error types for the stabilizer

use thiserror::Error;

/// Stabilizer error enumeration
///
/// Runs themselves never fail: unstable or missing geometry ends in a terminal phase.
/// Errors only arise while building a stabilizer from bad configuration.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StabilizerError {
    /// A timing profile or threshold is unusable
    #[error("Invalid stabilizer config: {0}")]
    InvalidConfig(String),

    /// A detector selector was rejected by the document
    #[error("Invalid detector selector '{selector}': {reason}")]
    InvalidDetector { selector: String, reason: String },
}
