//! Text matching over a selector-defined scope

use std::sync::Arc;

use page_model::Document;
use tracing::debug;
use waypoint_core_types::NodeId;

use crate::{errors::LocatorError, types::TextMatchMode};

/// Finds elements whose text content or `value` attribute matches a string.
pub struct TextMatcher {
    document: Arc<dyn Document>,
}

impl TextMatcher {
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self { document }
    }

    /// Elements under `scope_selector` matching `text`, in document order.
    ///
    /// A rejected scope selector yields no matches.
    pub fn match_by_text(&self, scope_selector: &str, text: &str, mode: TextMatchMode) -> Vec<NodeId> {
        self.try_match_by_text(scope_selector, text, mode)
            .unwrap_or_else(|err| {
                debug!("text match skipped: {}", err);
                Vec::new()
            })
    }

    pub fn try_match_by_text(
        &self,
        scope_selector: &str,
        text: &str,
        mode: TextMatchMode,
    ) -> Result<Vec<NodeId>, LocatorError> {
        let needle = Needle::new(text, mode);
        if needle.is_empty() {
            return Ok(Vec::new());
        }

        let candidates = self
            .document
            .query_selector_all(scope_selector)
            .map_err(|err| LocatorError::from_dom(scope_selector, err))?;

        Ok(candidates
            .into_iter()
            .filter(|node| {
                needle.matches(&self.document.text_content(*node))
                    || self
                        .document
                        .attribute(*node, "value")
                        .is_some_and(|value| needle.matches(&value))
            })
            .collect())
    }
}

/// Pre-normalized search text.
struct Needle {
    text: String,
    mode: TextMatchMode,
}

impl Needle {
    fn new(text: &str, mode: TextMatchMode) -> Self {
        let trimmed = text.trim();
        let text = match mode {
            TextMatchMode::Exact => trimmed.to_string(),
            TextMatchMode::Substring => trimmed.to_lowercase(),
        };
        Self { text, mode }
    }

    fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    fn matches(&self, haystack: &str) -> bool {
        let haystack = haystack.trim();
        match self.mode {
            TextMatchMode::Exact => haystack == self.text,
            TextMatchMode::Substring => haystack.to_lowercase().contains(&self.text),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_model::MemoryDocument;

    fn page() -> (Arc<MemoryDocument>, Vec<NodeId>) {
        let doc = Arc::new(MemoryDocument::default());
        let a = doc.append_element(None, "button").unwrap();
        doc.append_text(a, "  Submit  ").unwrap();
        let b = doc.append_element(None, "a").unwrap();
        doc.append_text(b, "Submit order").unwrap();
        let c = doc.append_element(None, "input").unwrap();
        doc.set_attribute(c, "value", " Submit ").unwrap();
        doc.set_attribute(c, "role", "button").unwrap();
        let d = doc.append_element(None, "button").unwrap();
        doc.append_text(d, "submit").unwrap();
        (doc, vec![a, b, c, d])
    }

    #[test]
    fn exact_is_trimmed_and_case_sensitive() {
        let (doc, nodes) = page();
        let matcher = TextMatcher::new(doc);
        let found = matcher.match_by_text("button, a, [role=\"button\"]", "Submit ", TextMatchMode::Exact);
        assert_eq!(found, vec![nodes[0], nodes[2]]);
    }

    #[test]
    fn substring_is_case_insensitive() {
        let (doc, nodes) = page();
        let matcher = TextMatcher::new(doc);
        let found = matcher.match_by_text("*", "SUBMIT", TextMatchMode::Substring);
        assert_eq!(found, nodes);
    }

    #[test]
    fn empty_text_matches_nothing() {
        let (doc, _) = page();
        let matcher = TextMatcher::new(doc);
        assert!(matcher.match_by_text("*", "   ", TextMatchMode::Substring).is_empty());
    }

    #[test]
    fn bad_scope_is_soft() {
        let (doc, _) = page();
        let matcher = TextMatcher::new(doc);
        assert!(matcher.match_by_text("button:hover", "Submit", TextMatchMode::Exact).is_empty());
        let err = matcher
            .try_match_by_text("button:hover", "Submit", TextMatchMode::Exact)
            .unwrap_err();
        assert!(matches!(err, LocatorError::InvalidSelector { .. }));
    }
}
