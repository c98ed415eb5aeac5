//! Viewport helpers: visibility check and scroll-into-view with settle detection

use std::time::Duration;

use page_model::{Document, ScrollBehavior};
use serde::{Deserialize, Serialize};
use tokio::time::{self, Instant};
use tracing::debug;
use waypoint_core_types::{NodeId, Rect, ScrollOffset, Size};

use crate::sampler::document_rect;

fn default_settle_check_ms() -> u64 {
    50
}

fn default_settle_timeout_ms() -> u64 {
    1000
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScrollConfig {
    /// Gap between scroll offset reads while a smooth scroll runs
    #[serde(default = "default_settle_check_ms")]
    pub settle_check_ms: u64,

    /// Give up waiting for the scroll to settle after this long
    #[serde(default = "default_settle_timeout_ms")]
    pub settle_timeout_ms: u64,
}

impl Default for ScrollConfig {
    fn default() -> Self {
        Self {
            settle_check_ms: default_settle_check_ms(),
            settle_timeout_ms: default_settle_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScrollOutcome {
    AlreadyVisible,
    /// Smooth scroll requested and the offset stopped changing
    Settled,
    /// Smooth scroll requested, still moving at the deadline
    TimedOut,
    /// No smooth scrolling; jumped straight to the target offset
    Jumped,
    Detached,
}

/// All four edges of a viewport-relative rectangle lie inside the viewport.
pub fn is_fully_visible(rect: Rect, viewport: Size) -> bool {
    rect.is_within(viewport)
}

/// Scroll offset that centres `node` in the viewport, clamped at the document origin.
pub fn centering_offset(document: &dyn Document, node: NodeId) -> ScrollOffset {
    let rect = document_rect(document, node);
    let viewport = document.viewport();
    let (cx, cy) = rect.center();
    ScrollOffset::new(
        (cx - viewport.width / 2.0).max(0.0),
        (cy - viewport.height / 2.0).max(0.0),
    )
}

pub async fn scroll_into_view(
    document: &dyn Document,
    node: NodeId,
    config: &ScrollConfig,
) -> ScrollOutcome {
    if !document.is_connected(node) {
        return ScrollOutcome::Detached;
    }
    if is_fully_visible(document.client_rect(node), document.viewport()) {
        return ScrollOutcome::AlreadyVisible;
    }

    let target = centering_offset(document, node);
    if !document.supports_smooth_scroll() {
        debug!(%node, x = target.x, y = target.y, "jumping to element");
        document.scroll_to(target, ScrollBehavior::Instant);
        return ScrollOutcome::Jumped;
    }

    debug!(%node, x = target.x, y = target.y, "smooth scrolling to element");
    document.scroll_to(target, ScrollBehavior::Smooth);

    let check = Duration::from_millis(config.settle_check_ms.max(1));
    let timeout = Duration::from_millis(config.settle_timeout_ms);
    let started = Instant::now();
    let mut previous = document.scroll_offset();
    while started.elapsed() < timeout {
        time::sleep(check).await;
        let current = document.scroll_offset();
        if current == previous {
            debug!(%node, elapsed_ms = started.elapsed().as_millis() as u64, "scroll settled");
            return ScrollOutcome::Settled;
        }
        previous = current;
    }
    debug!(%node, "scroll still moving at deadline");
    ScrollOutcome::TimedOut
}

#[cfg(test)]
mod tests {
    use super::*;
    use page_model::{DomError, MemoryDocument, MutationRecord};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::sync::broadcast;

    /// Document whose smooth scroll never comes to rest: every offset read is one pixel
    /// further down.
    struct EndlessScroll {
        inner: MemoryDocument,
        reads: AtomicU32,
    }

    impl Document for EndlessScroll {
        fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
            self.inner.query_selector_all(selector)
        }

        fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError> {
            self.inner.matches(node, selector)
        }

        fn tag_name(&self, node: NodeId) -> Option<String> {
            self.inner.tag_name(node)
        }

        fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
            self.inner.attribute(node, name)
        }

        fn text_content(&self, node: NodeId) -> String {
            self.inner.text_content(node)
        }

        fn parent(&self, node: NodeId) -> Option<NodeId> {
            self.inner.parent(node)
        }

        fn is_connected(&self, node: NodeId) -> bool {
            self.inner.is_connected(node)
        }

        fn client_rect(&self, node: NodeId) -> Rect {
            self.inner.client_rect(node)
        }

        fn scroll_offset(&self) -> ScrollOffset {
            let reads = self.reads.fetch_add(1, Ordering::SeqCst);
            ScrollOffset::new(0.0, reads as f64)
        }

        fn viewport(&self) -> Size {
            self.inner.viewport()
        }

        fn supports_smooth_scroll(&self) -> bool {
            true
        }

        fn scroll_to(&self, _offset: ScrollOffset, _behavior: ScrollBehavior) {}

        fn subscribe_mutations(&self) -> broadcast::Receiver<MutationRecord> {
            self.inner.subscribe_mutations()
        }
    }

    fn page() -> (MemoryDocument, NodeId) {
        let doc = MemoryDocument::new(Size::new(1000.0, 600.0));
        let node = doc.append_element(None, "button").unwrap();
        doc.set_layout(node, Rect::new(2000.0, 100.0, 200.0, 50.0))
            .unwrap();
        (doc, node)
    }

    #[test]
    fn centering_offset_clamps_at_origin() {
        let (doc, node) = page();
        assert_eq!(centering_offset(&doc, node), ScrollOffset::new(0.0, 1725.0));
    }

    #[tokio::test(start_paused = true)]
    async fn smooth_scroll_settles() {
        let (doc, node) = page();
        let outcome = scroll_into_view(&doc, node, &ScrollConfig::default()).await;
        assert_eq!(outcome, ScrollOutcome::Settled);
        assert!(is_fully_visible(doc.client_rect(node), doc.viewport()));
    }

    #[tokio::test]
    async fn jumps_without_smooth_scroll() {
        let (doc, node) = page();
        doc.set_smooth_scroll(false);
        let outcome = scroll_into_view(&doc, node, &ScrollConfig::default()).await;
        assert_eq!(outcome, ScrollOutcome::Jumped);
        assert_eq!(doc.scroll_offset(), ScrollOffset::new(0.0, 1725.0));
        assert_eq!(
            scroll_into_view(&doc, node, &ScrollConfig::default()).await,
            ScrollOutcome::AlreadyVisible
        );
    }

    #[tokio::test]
    async fn detached_element() {
        let (doc, node) = page();
        doc.detach(node).unwrap();
        assert_eq!(
            scroll_into_view(&doc, node, &ScrollConfig::default()).await,
            ScrollOutcome::Detached
        );
    }

    #[tokio::test(start_paused = true)]
    async fn scroll_that_never_settles_times_out() {
        let (inner, node) = page();
        let doc = EndlessScroll {
            inner,
            reads: AtomicU32::new(0),
        };
        let config = ScrollConfig {
            settle_check_ms: 50,
            settle_timeout_ms: 300,
        };

        let started = Instant::now();
        let outcome = scroll_into_view(&doc, node, &config).await;
        assert_eq!(outcome, ScrollOutcome::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(300));
        assert!(doc.reads.load(Ordering::SeqCst) >= 6);
    }
}
