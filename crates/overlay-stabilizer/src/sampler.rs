//! Geometry sampling and ancestor fallback

use page_model::Document;
use waypoint_core_types::{NodeId, Rect};

/// One geometry read of the target, in document coordinates.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GeometrySample {
    pub rect: Rect,
    pub connected: bool,
}

impl GeometrySample {
    pub fn detached() -> Self {
        Self {
            rect: Rect::ZERO,
            connected: false,
        }
    }

    pub fn connected(rect: Rect) -> Self {
        Self {
            rect,
            connected: true,
        }
    }

    /// Usable for positioning: attached and with positive width and height.
    pub fn is_valid(&self) -> bool {
        self.connected && self.rect.has_area()
    }
}

/// Document-relative rectangle of `node`, using the scroll offset at this instant.
pub fn document_rect(document: &dyn Document, node: NodeId) -> Rect {
    document
        .client_rect(node)
        .translate(document.scroll_offset())
}

pub fn sample(document: &dyn Document, node: NodeId) -> GeometrySample {
    if !document.is_connected(node) {
        return GeometrySample::detached();
    }
    GeometrySample::connected(document_rect(document, node))
}

/// First ancestor within `max_hops` parent links that has a positive area.
///
/// Returns its document rectangle and the number of hops walked. A detached target has
/// no usable ancestry.
pub fn ancestor_fallback(
    document: &dyn Document,
    node: NodeId,
    max_hops: u8,
) -> Option<(Rect, u8)> {
    if !document.is_connected(node) {
        return None;
    }
    let mut current = node;
    for hops in 1..=max_hops {
        current = document.parent(current)?;
        let rect = document_rect(document, current);
        if rect.has_area() {
            return Some((rect, hops));
        }
    }
    None
}
