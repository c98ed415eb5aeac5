//! JSON page fixtures: a static tree plus an optional timeline of changes.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use waypoint_core_types::{NodeId, Rect, ScrollOffset, Size};

use crate::document::{Document, ScrollBehavior};
use crate::errors::DomError;
use crate::memory::MemoryDocument;

fn default_viewport() -> Size {
    Size::new(1280.0, 800.0)
}

fn default_true() -> bool {
    true
}

/// A page description that can be materialized into a [`MemoryDocument`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageFixture {
    #[serde(default = "default_viewport")]
    pub viewport: Size,

    #[serde(default)]
    pub scroll: ScrollOffset,

    #[serde(default = "default_true")]
    pub smooth_scroll: bool,

    #[serde(default)]
    pub nodes: Vec<NodeFixture>,

    #[serde(default)]
    pub timeline: Vec<TimelineStep>,
}

/// One element and its subtree.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeFixture {
    pub tag: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub class: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub attrs: BTreeMap<String, String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    /// Layout box in document coordinates
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rect: Option<Rect>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<NodeFixture>,
}

/// A change applied to the page `at_ms` after playback starts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TimelineStep {
    pub at_ms: u64,

    /// Selector of the element to change (first match)
    pub target: String,

    #[serde(flatten)]
    pub change: TimelineChange,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum TimelineChange {
    Layout { rect: Rect },
    SetAttribute { name: String, value: String },
    Remove,
    Scroll { x: f64, y: f64 },
}

impl PageFixture {
    pub fn from_json(json: &str) -> Result<Self, DomError> {
        serde_json::from_str(json).map_err(|err| DomError::Fixture(err.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self, DomError> {
        let content = std::fs::read_to_string(path)
            .map_err(|err| DomError::Fixture(format!("{}: {}", path.display(), err)))?;
        Self::from_json(&content)
    }

    /// Build a live document from the fixture's static tree.
    pub fn build(&self) -> Result<MemoryDocument, DomError> {
        let doc = MemoryDocument::new(self.viewport);
        doc.set_smooth_scroll(self.smooth_scroll);
        for node in &self.nodes {
            insert(&doc, None, node)?;
        }
        doc.scroll_to(self.scroll, ScrollBehavior::Instant);
        debug!(
            nodes = self.nodes.len(),
            timeline = self.timeline.len(),
            "built page fixture"
        );
        Ok(doc)
    }
}

fn insert(
    doc: &MemoryDocument,
    parent: Option<NodeId>,
    node: &NodeFixture,
) -> Result<(), DomError> {
    let id = doc.append_element(parent, &node.tag)?;
    if let Some(element_id) = &node.id {
        doc.set_attribute(id, "id", element_id)?;
    }
    if let Some(class) = &node.class {
        doc.set_attribute(id, "class", class)?;
    }
    for (name, value) in &node.attrs {
        doc.set_attribute(id, name, value)?;
    }
    if let Some(text) = &node.text {
        doc.append_text(id, text)?;
    }
    if let Some(rect) = node.rect {
        doc.set_layout(id, rect)?;
    }
    for child in &node.children {
        insert(doc, Some(id), child)?;
    }
    Ok(())
}

impl TimelineStep {
    /// Apply this step to `doc`. A target that no longer matches is skipped.
    pub fn apply(&self, doc: &MemoryDocument) -> Result<(), DomError> {
        if let TimelineChange::Scroll { x, y } = self.change {
            doc.scroll_to(ScrollOffset::new(x, y), ScrollBehavior::Instant);
            return Ok(());
        }
        let Some(node) = doc.query_selector(&self.target)? else {
            debug!(selector = %self.target, "timeline target not present, skipping");
            return Ok(());
        };
        match &self.change {
            TimelineChange::Layout { rect } => doc.set_layout(node, *rect),
            TimelineChange::SetAttribute { name, value } => doc.set_attribute(node, name, value),
            TimelineChange::Remove => doc.detach(node),
            TimelineChange::Scroll { .. } => Ok(()),
        }
    }
}
