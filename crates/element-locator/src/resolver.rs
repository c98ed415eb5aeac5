//! Element resolver with ordered fallback
//!
//! Order: selector query, exact text among interactive elements, substring among
//! interactive elements, substring over the whole document. Multiple exact matches are
//! settled by document order; no visibility scoring is attempted.

use std::sync::Arc;

use page_model::Document;
use tracing::{debug, info, warn};
use waypoint_core_types::NodeId;

use crate::{
    config::LocatorConfig,
    errors::LocatorError,
    matcher::TextMatcher,
    types::{InteractionDescriptor, LocatorStrategy, ResolutionResult, ResolvedElement, TextMatchMode},
};

/// Element resolver trait
pub trait ElementResolver: Send + Sync {
    /// Resolve a descriptor, reporting which strategy won.
    fn resolve_traced(
        &self,
        descriptor: &InteractionDescriptor,
    ) -> Result<ResolutionResult, LocatorError>;

    /// Resolve a descriptor. All failures collapse to `None`.
    fn resolve(&self, descriptor: &InteractionDescriptor) -> Option<ResolvedElement> {
        self.resolve_traced(descriptor).ok().map(|result| result.element)
    }
}

/// Default element resolver implementation
pub struct DefaultElementResolver {
    document: Arc<dyn Document>,
    matcher: TextMatcher,
    config: LocatorConfig,
}

impl DefaultElementResolver {
    pub fn new(document: Arc<dyn Document>) -> Self {
        Self::with_config(document, LocatorConfig::default())
    }

    pub fn with_config(document: Arc<dyn Document>, config: LocatorConfig) -> Self {
        Self {
            matcher: TextMatcher::new(document.clone()),
            document,
            config,
        }
    }

    pub fn config(&self) -> &LocatorConfig {
        &self.config
    }

    pub fn matcher(&self) -> &TextMatcher {
        &self.matcher
    }

    fn query_selector(&self, selector: &str) -> Option<NodeId> {
        match self.document.query_selector(selector) {
            Ok(found) => {
                if found.is_none() {
                    debug!("Selector {:?} matched nothing", selector);
                }
                found
            }
            Err(err) => {
                debug!("Selector {:?} rejected, skipping strategy: {}", selector, err);
                None
            }
        }
    }
}

impl ElementResolver for DefaultElementResolver {
    fn resolve_traced(
        &self,
        descriptor: &InteractionDescriptor,
    ) -> Result<ResolutionResult, LocatorError> {
        if descriptor.is_empty() {
            return Err(LocatorError::InvalidDescriptor(
                "descriptor has neither selector nor text".to_string(),
            ));
        }
        debug!("Resolving element: {}", descriptor);

        let exact_required = descriptor.require_exact_match;
        let mut found: Option<(NodeId, LocatorStrategy)> = None;
        let mut exact_matches = 0;

        if let Some(selector) = descriptor.selector_hint() {
            found = self
                .query_selector(selector)
                .map(|node| (node, LocatorStrategy::Selector));
        }

        if let Some(text) = descriptor.text_hint() {
            if found.is_none() || exact_required {
                let exact =
                    self.matcher
                        .match_by_text(&self.config.interactive_scope, text, TextMatchMode::Exact);
                exact_matches = exact.len();

                if exact_matches > 1 {
                    warn!(
                        "Ambiguous match: {} elements have text {:?}, taking the first in document order",
                        exact_matches, text
                    );
                }

                if let Some(first) = exact.first() {
                    found = Some((*first, LocatorStrategy::ExactText));
                } else if !exact_required {
                    found = self
                        .matcher
                        .match_by_text(&self.config.interactive_scope, text, TextMatchMode::Substring)
                        .first()
                        .map(|node| (*node, LocatorStrategy::ScopedSubstring));
                }
            }

            if found.is_none() && !exact_required {
                found = self
                    .matcher
                    .match_by_text(&self.config.document_scope, text, TextMatchMode::Substring)
                    .first()
                    .map(|node| (*node, LocatorStrategy::DocumentSubstring));
            }
        }

        match found {
            Some((node, strategy)) => {
                info!(
                    "Resolved {} using {} strategy (exact matches: {})",
                    node,
                    strategy.name(),
                    exact_matches
                );
                Ok(ResolutionResult::new(ResolvedElement::new(node), strategy)
                    .with_exact_matches(exact_matches))
            }
            None => {
                debug!("All strategies exhausted for {}", descriptor);
                Err(LocatorError::NotFound(format!(
                    "All strategies exhausted for {}",
                    descriptor
                )))
            }
        }
    }
}
