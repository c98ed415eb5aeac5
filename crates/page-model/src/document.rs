//! The document port the locator and stabilizer read through.
//!
//! Everything the core knows about a page comes through [`Document`]. Implementations
//! wrap a real rendering engine or, for tests and fixtures, [`crate::MemoryDocument`].

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use waypoint_core_types::{NodeId, Rect, ScrollOffset, Size};

use crate::errors::DomError;

/// How a scroll request should be carried out.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScrollBehavior {
    /// Jump to the target offset at once
    Instant,

    /// Animate towards the target offset
    Smooth,
}

/// Kind of structural change reported by a document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    /// An attribute was set or removed
    Attributes { name: String },

    /// Children were added to or removed from the node
    ChildList,

    /// Text data under the node changed
    CharacterData,
}

/// A single mutation notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    /// Node whose attributes or children changed
    pub target: NodeId,

    /// What changed
    pub kind: MutationKind,
}

/// Read access to a live, mutating document tree.
///
/// Implementations must tolerate stale handles: every method taking a [`NodeId`] has a
/// defined answer for detached or unknown nodes.
pub trait Document: Send + Sync {
    /// All elements matching `selector`, in document order.
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError>;

    /// First element matching `selector` in document order.
    fn query_selector(&self, selector: &str) -> Result<Option<NodeId>, DomError> {
        Ok(self.query_selector_all(selector)?.into_iter().next())
    }

    /// Whether `node` matches `selector`. Non-elements never match.
    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError>;

    /// Nearest inclusive ancestor matching `selector`.
    fn closest(&self, node: NodeId, selector: &str) -> Result<Option<NodeId>, DomError> {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if self.matches(candidate, selector)? {
                return Ok(Some(candidate));
            }
            current = self.parent(candidate);
        }
        Ok(None)
    }

    /// Lower-case tag name, `None` for non-elements.
    fn tag_name(&self, node: NodeId) -> Option<String>;

    /// Attribute value, `None` when absent.
    fn attribute(&self, node: NodeId, name: &str) -> Option<String>;

    /// Concatenated text of all descendant text nodes.
    fn text_content(&self, node: NodeId) -> String;

    /// Parent element, `None` for top-level or detached nodes.
    fn parent(&self, node: NodeId) -> Option<NodeId>;

    /// Whether the node is currently attached to the document.
    fn is_connected(&self, node: NodeId) -> bool;

    /// Viewport-relative bounding rectangle. Detached nodes report [`Rect::ZERO`].
    fn client_rect(&self, node: NodeId) -> Rect;

    /// Current scroll position. Never cache this value across samples.
    fn scroll_offset(&self) -> ScrollOffset;

    /// Size of the visible viewport.
    fn viewport(&self) -> Size;

    /// Whether [`ScrollBehavior::Smooth`] is honoured.
    fn supports_smooth_scroll(&self) -> bool;

    /// Request a scroll to an absolute document offset.
    fn scroll_to(&self, offset: ScrollOffset, behavior: ScrollBehavior);

    /// Subscribe to attribute/child-list/text mutations.
    fn subscribe_mutations(&self) -> broadcast::Receiver<MutationRecord>;

    /// Whether `node` is `ancestor` or sits somewhere below it.
    fn is_inclusive_descendant(&self, node: NodeId, ancestor: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(candidate) = current {
            if candidate == ancestor {
                return true;
            }
            current = self.parent(candidate);
        }
        false
    }
}
