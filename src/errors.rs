//! Error handling for the command-line front end
//!
//! Library crates report their own `thiserror` enums; this module wraps them with the
//! context the CLI needs (which file, which variable) before `anyhow` takes over in `main`.

use std::path::PathBuf;

use element_locator::LocatorError;
use overlay_stabilizer::StabilizerError;
use page_model::DomError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid configuration in {path}: {reason}")]
    Config { path: PathBuf, reason: String },

    #[error("Invalid value {value:?} for {var}")]
    InvalidOverride { var: &'static str, value: String },

    #[error("Page fixture error: {0}")]
    Fixture(#[from] DomError),

    #[error(transparent)]
    Stabilizer(#[from] StabilizerError),

    #[error(transparent)]
    Locator(#[from] LocatorError),
}

impl CliError {
    /// Process exit code for this failure.
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Locator(LocatorError::NotFound(_)) => 2,
            CliError::Locator(_) => 3,
            CliError::Io { .. } | CliError::Config { .. } | CliError::InvalidOverride { .. } => 4,
            CliError::Fixture(_) => 5,
            CliError::Stabilizer(_) => 4,
        }
    }
}

pub type CliResult<T> = Result<T, CliError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_has_its_own_exit_code() {
        let err = CliError::from(LocatorError::NotFound("#missing".to_string()));
        assert_eq!(err.exit_code(), 2);
        let err = CliError::InvalidOverride {
            var: "WAYPOINT_EXACT_MATCH",
            value: "maybe".to_string(),
        };
        assert_eq!(err.exit_code(), 4);
        assert!(err.to_string().contains("WAYPOINT_EXACT_MATCH"));
    }
}
