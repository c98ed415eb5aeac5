//! Error types for the document model

use thiserror::Error;
use waypoint_core_types::NodeId;

/// Document error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum DomError {
    /// Selector could not be parsed
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },

    /// Selector uses syntax this engine does not implement
    #[error("Unsupported selector '{selector}': {feature}")]
    UnsupportedSelector { selector: String, feature: String },

    /// Node handle does not refer to a node in this document
    #[error("Unknown node: {0}")]
    UnknownNode(NodeId),

    /// Operation requires an element but the node is text or the root
    #[error("Node {0} is not an element")]
    NotAnElement(NodeId),

    /// Page fixture could not be decoded or applied
    #[error("Fixture error: {0}")]
    Fixture(String),
}

impl DomError {
    pub(crate) fn invalid(selector: &str, reason: impl Into<String>) -> Self {
        DomError::InvalidSelector {
            selector: selector.to_string(),
            reason: reason.into(),
        }
    }

    pub(crate) fn unsupported(selector: &str, feature: impl Into<String>) -> Self {
        DomError::UnsupportedSelector {
            selector: selector.to_string(),
            feature: feature.into(),
        }
    }

    /// Selector failures are soft: callers drop the strategy and move on.
    pub fn is_selector_error(&self) -> bool {
        matches!(
            self,
            DomError::InvalidSelector { .. } | DomError::UnsupportedSelector { .. }
        )
    }
}
