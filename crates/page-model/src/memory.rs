//! Arena-backed in-memory document.
//!
//! Layout boxes are stored in document coordinates; [`Document::client_rect`] subtracts
//! the current scroll offset so callers see viewport-relative geometry, the same way a
//! browser reports `getBoundingClientRect()`.

use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::trace;
use waypoint_core_types::{NodeId, Rect, ScrollOffset, Size};

use crate::document::{Document, MutationKind, MutationRecord, ScrollBehavior};
use crate::errors::DomError;
use crate::selector::{Selector, SelectorContext};

const MUTATION_CHANNEL_CAPACITY: usize = 64;
const ROOT: NodeId = NodeId(0);

#[derive(Debug, Clone)]
enum NodeKind {
    Root,
    Element {
        tag: String,
        attrs: Vec<(String, String)>,
    },
    Text(String),
}

#[derive(Debug, Clone)]
struct Node {
    parent: Option<NodeId>,
    children: Vec<NodeId>,
    kind: NodeKind,
    layout: Rect,
}

#[derive(Debug, Clone)]
struct Tree {
    nodes: Vec<Node>,
    scroll: ScrollOffset,
    viewport: Size,
    smooth_scroll: bool,
}

impl Tree {
    fn node(&self, id: NodeId) -> Option<&Node> {
        self.nodes.get(id.0)
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, DomError> {
        self.nodes.get_mut(id.0).ok_or(DomError::UnknownNode(id))
    }

    fn push(&mut self, parent: Option<NodeId>, kind: NodeKind) -> Result<NodeId, DomError> {
        let id = NodeId(self.nodes.len());
        if let Some(parent_id) = parent {
            match self.node(parent_id).map(|n| &n.kind) {
                Some(NodeKind::Text(_)) => return Err(DomError::NotAnElement(parent_id)),
                None => return Err(DomError::UnknownNode(parent_id)),
                _ => {}
            }
        }
        self.nodes.push(Node {
            parent,
            children: Vec::new(),
            kind,
            layout: Rect::ZERO,
        });
        if let Some(parent_id) = parent {
            self.node_mut(parent_id)?.children.push(id);
        }
        Ok(id)
    }

    fn is_connected(&self, id: NodeId) -> bool {
        let mut current = Some(id);
        while let Some(node_id) = current {
            if node_id == ROOT {
                return true;
            }
            current = self.node(node_id).and_then(|n| n.parent);
        }
        false
    }

    fn collect_elements(&self, id: NodeId, out: &mut Vec<NodeId>) {
        let Some(node) = self.node(id) else {
            return;
        };
        if matches!(node.kind, NodeKind::Element { .. }) {
            out.push(id);
        }
        for child in &node.children {
            self.collect_elements(*child, out);
        }
    }

    fn collect_text(&self, id: NodeId, out: &mut String) {
        let Some(node) = self.node(id) else {
            return;
        };
        if let NodeKind::Text(text) = &node.kind {
            out.push_str(text);
        }
        for child in &node.children {
            self.collect_text(*child, out);
        }
    }
}

impl SelectorContext for Tree {
    fn element_tag(&self, node: NodeId) -> Option<&str> {
        match &self.node(node)?.kind {
            NodeKind::Element { tag, .. } => Some(tag),
            _ => None,
        }
    }

    fn element_attr(&self, node: NodeId, name: &str) -> Option<&str> {
        match &self.node(node)?.kind {
            NodeKind::Element { attrs, .. } => attrs
                .iter()
                .find(|(key, _)| key == name)
                .map(|(_, value)| value.as_str()),
            _ => None,
        }
    }

    fn parent_element(&self, node: NodeId) -> Option<NodeId> {
        self.node(node)?.parent.filter(|parent| *parent != ROOT)
    }
}

/// Mutable document tree held entirely in memory.
pub struct MemoryDocument {
    tree: RwLock<Tree>,
    mutations: broadcast::Sender<MutationRecord>,
}

impl std::fmt::Debug for MemoryDocument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let tree = self.tree.read();
        f.debug_struct("MemoryDocument")
            .field("nodes", &tree.nodes.len())
            .field("scroll", &tree.scroll)
            .field("viewport", &tree.viewport)
            .finish()
    }
}

impl Default for MemoryDocument {
    fn default() -> Self {
        Self::new(Size::new(1280.0, 800.0))
    }
}

impl MemoryDocument {
    /// Create an empty document with the given viewport.
    pub fn new(viewport: Size) -> Self {
        let (mutations, _) = broadcast::channel(MUTATION_CHANNEL_CAPACITY);
        let root = Node {
            parent: None,
            children: Vec::new(),
            kind: NodeKind::Root,
            layout: Rect::ZERO,
        };
        Self {
            tree: RwLock::new(Tree {
                nodes: vec![root],
                scroll: ScrollOffset::default(),
                viewport,
                smooth_scroll: true,
            }),
            mutations,
        }
    }

    fn notify(&self, target: NodeId, kind: MutationKind) {
        trace!(%target, ?kind, "document mutation");
        // No subscribers is fine.
        let _ = self.mutations.send(MutationRecord { target, kind });
    }

    /// Append a new element. `parent == None` appends at the top level.
    pub fn append_element(&self, parent: Option<NodeId>, tag: &str) -> Result<NodeId, DomError> {
        let parent = parent.unwrap_or(ROOT);
        let id = self.tree.write().push(
            Some(parent),
            NodeKind::Element {
                tag: tag.to_ascii_lowercase(),
                attrs: Vec::new(),
            },
        )?;
        self.notify(parent, MutationKind::ChildList);
        Ok(id)
    }

    /// Append a text node under `parent`.
    pub fn append_text(&self, parent: NodeId, text: &str) -> Result<NodeId, DomError> {
        let id = self
            .tree
            .write()
            .push(Some(parent), NodeKind::Text(text.to_string()))?;
        self.notify(parent, MutationKind::ChildList);
        Ok(id)
    }

    /// Replace all children of `node` with a single text node.
    pub fn set_text(&self, node: NodeId, text: &str) -> Result<(), DomError> {
        {
            let mut tree = self.tree.write();
            let children = std::mem::take(&mut tree.node_mut(node)?.children);
            for child in children {
                tree.node_mut(child)?.parent = None;
            }
        }
        self.append_text(node, text)?;
        self.notify(node, MutationKind::CharacterData);
        Ok(())
    }

    pub fn set_attribute(&self, node: NodeId, name: &str, value: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        {
            let mut tree = self.tree.write();
            let NodeKind::Element { attrs, .. } = &mut tree.node_mut(node)?.kind else {
                return Err(DomError::NotAnElement(node));
            };
            match attrs.iter_mut().find(|(key, _)| *key == name) {
                Some(entry) => entry.1 = value.to_string(),
                None => attrs.push((name.clone(), value.to_string())),
            }
        }
        self.notify(node, MutationKind::Attributes { name });
        Ok(())
    }

    pub fn remove_attribute(&self, node: NodeId, name: &str) -> Result<(), DomError> {
        let name = name.to_ascii_lowercase();
        {
            let mut tree = self.tree.write();
            let NodeKind::Element { attrs, .. } = &mut tree.node_mut(node)?.kind else {
                return Err(DomError::NotAnElement(node));
            };
            attrs.retain(|(key, _)| *key != name);
        }
        self.notify(node, MutationKind::Attributes { name });
        Ok(())
    }

    /// Set the node's layout box in document coordinates. Layout is not a DOM mutation,
    /// so no record is broadcast.
    pub fn set_layout(&self, node: NodeId, rect: Rect) -> Result<(), DomError> {
        self.tree.write().node_mut(node)?.layout = rect;
        Ok(())
    }

    /// Detach `node` (and its subtree) from its parent.
    pub fn detach(&self, node: NodeId) -> Result<(), DomError> {
        let parent = {
            let mut tree = self.tree.write();
            let parent = tree.node_mut(node)?.parent.take();
            if let Some(parent_id) = parent {
                tree.node_mut(parent_id)?.children.retain(|c| *c != node);
            }
            parent
        };
        if let Some(parent_id) = parent {
            self.notify(parent_id, MutationKind::ChildList);
        }
        Ok(())
    }

    pub fn set_viewport(&self, viewport: Size) {
        self.tree.write().viewport = viewport;
    }

    pub fn set_smooth_scroll(&self, supported: bool) {
        self.tree.write().smooth_scroll = supported;
    }

    /// Layout box in document coordinates, regardless of attachment.
    pub fn layout(&self, node: NodeId) -> Option<Rect> {
        self.tree.read().node(node).map(|n| n.layout)
    }
}

impl Document for MemoryDocument {
    fn query_selector_all(&self, selector: &str) -> Result<Vec<NodeId>, DomError> {
        let parsed = Selector::parse(selector)?;
        let tree = self.tree.read();
        let mut elements = Vec::new();
        tree.collect_elements(ROOT, &mut elements);
        Ok(elements
            .into_iter()
            .filter(|id| parsed.matches(&*tree, *id))
            .collect())
    }

    fn matches(&self, node: NodeId, selector: &str) -> Result<bool, DomError> {
        let parsed = Selector::parse(selector)?;
        Ok(parsed.matches(&*self.tree.read(), node))
    }

    fn tag_name(&self, node: NodeId) -> Option<String> {
        self.tree.read().element_tag(node).map(str::to_string)
    }

    fn attribute(&self, node: NodeId, name: &str) -> Option<String> {
        self.tree
            .read()
            .element_attr(node, &name.to_ascii_lowercase())
            .map(str::to_string)
    }

    fn text_content(&self, node: NodeId) -> String {
        let mut text = String::new();
        self.tree.read().collect_text(node, &mut text);
        text
    }

    fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.tree.read().parent_element(node)
    }

    fn is_connected(&self, node: NodeId) -> bool {
        self.tree.read().is_connected(node)
    }

    fn client_rect(&self, node: NodeId) -> Rect {
        let tree = self.tree.read();
        if !tree.is_connected(node) {
            return Rect::ZERO;
        }
        match tree.node(node) {
            Some(n) => Rect {
                top: n.layout.top - tree.scroll.y,
                left: n.layout.left - tree.scroll.x,
                ..n.layout
            },
            None => Rect::ZERO,
        }
    }

    fn scroll_offset(&self) -> ScrollOffset {
        self.tree.read().scroll
    }

    fn viewport(&self) -> Size {
        self.tree.read().viewport
    }

    fn supports_smooth_scroll(&self) -> bool {
        self.tree.read().smooth_scroll
    }

    fn scroll_to(&self, offset: ScrollOffset, behavior: ScrollBehavior) {
        trace!(x = offset.x, y = offset.y, ?behavior, "scroll_to");
        let mut tree = self.tree.write();
        tree.scroll = ScrollOffset::new(offset.x.max(0.0), offset.y.max(0.0));
    }

    fn subscribe_mutations(&self) -> broadcast::Receiver<MutationRecord> {
        self.mutations.subscribe()
    }
}
