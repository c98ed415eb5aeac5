//! Core types for the locator

use std::fmt;

use serde::{Deserialize, Serialize};
use waypoint_core_types::NodeId;

fn default_exact() -> bool {
    true
}

/// Caller-supplied hint identifying a target element.
///
/// Whitespace-only `selector` or `text` counts as absent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionDescriptor {
    /// CSS selector tried first
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selector: Option<String>,

    /// Visible text (or `value`) of the target
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Restrict text matching to exact trimmed equality
    #[serde(default = "default_exact")]
    pub require_exact_match: bool,
}

impl Default for InteractionDescriptor {
    fn default() -> Self {
        Self {
            selector: None,
            text: None,
            require_exact_match: true,
        }
    }
}

impl InteractionDescriptor {
    pub fn selector(selector: impl Into<String>) -> Self {
        Self {
            selector: Some(selector.into()),
            ..Self::default()
        }
    }

    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_exact_match(mut self, require_exact_match: bool) -> Self {
        self.require_exact_match = require_exact_match;
        self
    }

    /// Trimmed selector, if any.
    pub fn selector_hint(&self) -> Option<&str> {
        self.selector
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Trimmed text, if any.
    pub fn text_hint(&self) -> Option<&str> {
        self.text.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.selector_hint().is_none() && self.text_hint().is_none()
    }
}

impl fmt::Display for InteractionDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.selector_hint(), self.text_hint()) {
            (Some(selector), Some(text)) => write!(f, "selector={selector:?} text={text:?}")?,
            (Some(selector), None) => write!(f, "selector={selector:?}")?,
            (None, Some(text)) => write!(f, "text={text:?}")?,
            (None, None) => f.write_str("<empty>")?,
        }
        if !self.require_exact_match {
            f.write_str(" (loose)")?;
        }
        Ok(())
    }
}

/// Non-owning reference to an element in the live document.
///
/// The document may detach or replace the node at any time; consumers re-check it on
/// every read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResolvedElement(NodeId);

impl ResolvedElement {
    pub fn new(node: NodeId) -> Self {
        Self(node)
    }

    pub fn node(&self) -> NodeId {
        self.0
    }
}

impl fmt::Display for ResolvedElement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "element {}", self.0)
    }
}

/// Which step of the resolution order produced the element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LocatorStrategy {
    /// Direct selector query
    Selector,

    /// Exact trimmed text/value among interactive elements
    ExactText,

    /// Case-insensitive substring among interactive elements
    ScopedSubstring,

    /// Case-insensitive substring over every element
    DocumentSubstring,
}

impl LocatorStrategy {
    /// Get strategy name as string
    pub fn name(&self) -> &'static str {
        match self {
            LocatorStrategy::Selector => "selector",
            LocatorStrategy::ExactText => "exact-text",
            LocatorStrategy::ScopedSubstring => "scoped-substring",
            LocatorStrategy::DocumentSubstring => "document-substring",
        }
    }
}

/// Text comparison used by the text matcher.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TextMatchMode {
    /// Trimmed equality, case-sensitive
    Exact,

    /// Trimmed containment, case-insensitive
    Substring,
}

/// Element resolution result
#[derive(Debug, Clone, PartialEq)]
pub struct ResolutionResult {
    /// Resolved element
    pub element: ResolvedElement,

    /// Strategy used for resolution
    pub strategy: LocatorStrategy,

    /// Number of exact text matches seen (0 when the text step did not run)
    pub exact_matches: usize,
}

impl ResolutionResult {
    pub fn new(element: ResolvedElement, strategy: LocatorStrategy) -> Self {
        Self {
            element,
            strategy,
            exact_matches: 0,
        }
    }

    pub fn with_exact_matches(mut self, count: usize) -> Self {
        self.exact_matches = count;
        self
    }

    /// More than one element matched the text exactly; the first in document order won.
    pub fn is_ambiguous(&self) -> bool {
        self.exact_matches > 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn descriptor_defaults_to_exact() {
        let descriptor: InteractionDescriptor =
            serde_json::from_str(r#"{ "text": "Submit" }"#).unwrap();
        assert!(descriptor.require_exact_match);
        assert_eq!(descriptor.text_hint(), Some("Submit"));
        assert_eq!(descriptor.selector_hint(), None);
    }

    #[test]
    fn blank_hints_are_absent() {
        let descriptor = InteractionDescriptor::selector("  ").with_text("\n");
        assert!(descriptor.is_empty());
        assert_eq!(descriptor.to_string(), "<empty>");
    }

    #[test]
    fn strategy_names() {
        assert_eq!(LocatorStrategy::Selector.name(), "selector");
        assert_eq!(LocatorStrategy::ExactText.name(), "exact-text");
        assert_eq!(LocatorStrategy::DocumentSubstring.name(), "document-substring");
    }
}
