//! Error types for the locator

use page_model::DomError;
use thiserror::Error;

/// Locator error enumeration
#[derive(Debug, Error, Clone, PartialEq)]
pub enum LocatorError {
    /// Every strategy ran and none produced an element
    #[error("Element not found: {0}")]
    NotFound(String),

    /// Descriptor carries neither a selector nor text
    #[error("Invalid descriptor: {0}")]
    InvalidDescriptor(String),

    /// Scope or target selector was rejected by the document
    #[error("Invalid selector '{selector}': {reason}")]
    InvalidSelector { selector: String, reason: String },
}

impl LocatorError {
    /// Whether trying again later may succeed (the page may still be rendering).
    pub fn is_retryable(&self) -> bool {
        matches!(self, LocatorError::NotFound(_))
    }

    /// Get error severity (0=low, 1=medium, 2=high, 3=critical)
    pub fn severity(&self) -> u8 {
        match self {
            LocatorError::NotFound(_) => 1,
            LocatorError::InvalidDescriptor(_) => 2,
            LocatorError::InvalidSelector { .. } => 0,
        }
    }

    pub(crate) fn from_dom(selector: &str, err: DomError) -> Self {
        LocatorError::InvalidSelector {
            selector: selector.to_string(),
            reason: err.to_string(),
        }
    }
}
