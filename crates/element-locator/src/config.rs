//! Locator configuration

use serde::{Deserialize, Serialize};

/// Elements that look interactive: links, buttons, ARIA buttons and `.btn`.
pub const INTERACTIVE_SCOPE: &str = "a, button, [role=\"button\"], .btn";

/// Every element in the document.
pub const DOCUMENT_SCOPE: &str = "*";

fn default_interactive_scope() -> String {
    INTERACTIVE_SCOPE.to_string()
}

fn default_document_scope() -> String {
    DOCUMENT_SCOPE.to_string()
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocatorConfig {
    /// Candidate scope for the text steps
    #[serde(default = "default_interactive_scope")]
    pub interactive_scope: String,

    /// Scope of the last-resort substring search
    #[serde(default = "default_document_scope")]
    pub document_scope: String,

    /// Used when a caller does not say whether text must match exactly
    #[serde(default = "default_true")]
    pub exact_match_by_default: bool,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            interactive_scope: default_interactive_scope(),
            document_scope: default_document_scope(),
            exact_match_by_default: true,
        }
    }
}
