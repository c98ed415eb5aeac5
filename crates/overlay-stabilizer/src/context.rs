//! Stabilization context: where the target lives decides how patiently we poll.

use std::fmt;

use page_model::{Document, Selector};
use serde::{Deserialize, Serialize};
use tracing::debug;
use waypoint_core_types::NodeId;

use crate::{
    config::{StabilizerConfig, TimingProfile},
    errors::StabilizerError,
};

/// Environment classification of a resolved element.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StabilizationContext {
    /// Static page content
    Standard,

    /// Inside the active modal or portal container
    InModal,

    /// Inside a navigation panel that may still be animating open
    InExpandingNav,
}

impl StabilizationContext {
    pub fn name(&self) -> &'static str {
        match self {
            StabilizationContext::Standard => "standard",
            StabilizationContext::InModal => "in-modal",
            StabilizationContext::InExpandingNav => "in-expanding-nav",
        }
    }

    /// Timing budget for this context.
    pub fn timing(&self, config: &StabilizerConfig) -> TimingProfile {
        match self {
            StabilizationContext::Standard => config.standard,
            StabilizationContext::InModal => config.in_modal,
            StabilizationContext::InExpandingNav => config.in_expanding_nav,
        }
    }
}

impl fmt::Display for StabilizationContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Probe for the currently active modal-like container.
pub trait ModalDetector: Send + Sync {
    fn active_modal(&self, document: &dyn Document) -> Option<NodeId>;
}

/// Probe for an expanding navigation panel around a node.
pub trait NavPanelDetector: Send + Sync {
    fn nav_panel(&self, document: &dyn Document, node: NodeId) -> Option<NodeId>;
}

fn join_selectors(selectors: &[String]) -> Result<String, StabilizerError> {
    let joined = selectors
        .iter()
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join(", ");
    if joined.is_empty() {
        return Ok(joined);
    }
    Selector::parse(&joined).map_err(|err| StabilizerError::InvalidDetector {
        selector: joined.clone(),
        reason: err.to_string(),
    })?;
    Ok(joined)
}

/// Treats the last visible, connected element matching any selector as the active modal.
///
/// Later elements in document order are assumed to stack above earlier ones, which is
/// how portal containers are usually appended.
#[derive(Debug, Clone)]
pub struct SelectorModalDetector {
    selector: String,
}

impl SelectorModalDetector {
    pub fn new(selectors: &[String]) -> Result<Self, StabilizerError> {
        Ok(Self {
            selector: join_selectors(selectors)?,
        })
    }
}

impl ModalDetector for SelectorModalDetector {
    fn active_modal(&self, document: &dyn Document) -> Option<NodeId> {
        if self.selector.is_empty() {
            return None;
        }
        let candidates = document.query_selector_all(&self.selector).ok()?;
        candidates
            .into_iter()
            .rev()
            .find(|node| document.is_connected(*node) && document.client_rect(*node).has_area())
    }
}

/// Nearest ancestor matching any of the navigation selectors.
#[derive(Debug, Clone)]
pub struct SelectorNavDetector {
    selector: String,
}

impl SelectorNavDetector {
    pub fn new(selectors: &[String]) -> Result<Self, StabilizerError> {
        Ok(Self {
            selector: join_selectors(selectors)?,
        })
    }
}

impl NavPanelDetector for SelectorNavDetector {
    fn nav_panel(&self, document: &dyn Document, node: NodeId) -> Option<NodeId> {
        if self.selector.is_empty() {
            return None;
        }
        document.closest(node, &self.selector).ok().flatten()
    }
}

/// Classify `node`. Modal membership wins over navigation membership.
pub fn classify(
    document: &dyn Document,
    node: NodeId,
    modal: &dyn ModalDetector,
    nav: &dyn NavPanelDetector,
) -> StabilizationContext {
    if let Some(container) = modal.active_modal(document) {
        if document.is_inclusive_descendant(node, container) {
            debug!(%node, %container, "target is inside the active modal");
            return StabilizationContext::InModal;
        }
    }
    if let Some(panel) = nav.nav_panel(document, node) {
        debug!(%node, %panel, "target is inside a navigation panel");
        return StabilizationContext::InExpandingNav;
    }
    StabilizationContext::Standard
}
