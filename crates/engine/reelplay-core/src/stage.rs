//! The target surface a backend renders into.
//!
//! A [`Stage`] stands in for the host container: the live-node backend keeps
//! one [`OutputNode`] per element in it, the raster backend attaches a single
//! canvas. Hosts read it back to mirror nodes or blit pixels.

use std::cell::RefCell;
use std::rc::Rc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tiny_skia::Pixmap;

/// Shared raster surface attached to a stage.
pub type CanvasHandle = Rc<RefCell<Pixmap>>;

/// Persistent output node for one element.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OutputNode {
    pub element_id: String,
    /// CSS-like style declarations, in insertion order.
    pub style: IndexMap<String, String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl OutputNode {
    pub fn new(element_id: impl Into<String>) -> Self {
        Self {
            element_id: element_id.into(),
            ..Self::default()
        }
    }

    #[inline]
    pub fn style(&self, name: &str) -> Option<&str> {
        self.style.get(name).map(String::as_str)
    }
}

pub enum StageChild {
    Node(OutputNode),
    Canvas(CanvasHandle),
}

#[derive(Default)]
struct StageInner {
    size: Option<(u32, u32)>,
    perspective: Option<String>,
    children: Vec<StageChild>,
}

/// Serializable view of a stage.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageSnapshot {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub perspective: Option<String>,
    pub nodes: Vec<OutputNode>,
    pub canvases: usize,
}

/// Cloneable handle to a host container.
#[derive(Clone, Default)]
pub struct Stage {
    inner: Rc<RefCell<StageInner>>,
}

impl Stage {
    /// A stage without a reported size; raster output uses the configured size.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_size(width: u32, height: u32) -> Self {
        let stage = Self::default();
        stage.inner.borrow_mut().size = Some((width, height));
        stage
    }

    #[inline]
    pub fn size(&self) -> Option<(u32, u32)> {
        self.inner.borrow().size
    }

    pub fn perspective(&self) -> Option<String> {
        self.inner.borrow().perspective.clone()
    }

    pub fn set_perspective(&self, value: Option<String>) {
        self.inner.borrow_mut().perspective = value;
    }

    // ---- nodes ----

    /// Append a node, replacing any node already holding the same element id.
    pub fn insert_node(&self, node: OutputNode) {
        let mut inner = self.inner.borrow_mut();
        let existing = inner
            .children
            .iter()
            .position(|c| matches!(c, StageChild::Node(n) if n.element_id == node.element_id));
        match existing {
            Some(idx) => inner.children[idx] = StageChild::Node(node),
            None => inner.children.push(StageChild::Node(node)),
        }
    }

    /// Mutate a node in place. Returns None when no such node exists.
    pub fn update_node<R>(&self, element_id: &str, f: impl FnOnce(&mut OutputNode) -> R) -> Option<R> {
        let mut inner = self.inner.borrow_mut();
        let node = inner.children.iter_mut().find_map(|c| match c {
            StageChild::Node(n) if n.element_id == element_id => Some(n),
            _ => None,
        });
        node.map(f)
    }

    pub fn remove_node(&self, element_id: &str) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.children.len();
        inner
            .children
            .retain(|c| !matches!(c, StageChild::Node(n) if n.element_id == element_id));
        inner.children.len() != before
    }

    pub fn node(&self, element_id: &str) -> Option<OutputNode> {
        self.inner.borrow().children.iter().find_map(|c| match c {
            StageChild::Node(n) if n.element_id == element_id => Some(n.clone()),
            _ => None,
        })
    }

    pub fn node_ids(&self) -> Vec<String> {
        self.inner
            .borrow()
            .children
            .iter()
            .filter_map(|c| match c {
                StageChild::Node(n) => Some(n.element_id.clone()),
                _ => None,
            })
            .collect()
    }

    // ---- canvases ----

    pub fn add_canvas(&self, canvas: CanvasHandle) {
        self.inner.borrow_mut().children.push(StageChild::Canvas(canvas));
    }

    pub fn remove_canvas(&self, canvas: &CanvasHandle) -> bool {
        let mut inner = self.inner.borrow_mut();
        let before = inner.children.len();
        inner
            .children
            .retain(|c| !matches!(c, StageChild::Canvas(h) if Rc::ptr_eq(h, canvas)));
        inner.children.len() != before
    }

    /// First attached canvas, if any.
    pub fn canvas(&self) -> Option<CanvasHandle> {
        self.inner.borrow().children.iter().find_map(|c| match c {
            StageChild::Canvas(h) => Some(h.clone()),
            _ => None,
        })
    }

    pub fn canvas_count(&self) -> usize {
        self.inner
            .borrow()
            .children
            .iter()
            .filter(|c| matches!(c, StageChild::Canvas(_)))
            .count()
    }

    pub fn child_count(&self) -> usize {
        self.inner.borrow().children.len()
    }

    pub fn snapshot(&self) -> StageSnapshot {
        let inner = self.inner.borrow();
        let mut snap = StageSnapshot {
            width: inner.size.map(|s| s.0),
            height: inner.size.map(|s| s.1),
            perspective: inner.perspective.clone(),
            ..StageSnapshot::default()
        };
        for child in &inner.children {
            match child {
                StageChild::Node(n) => snap.nodes.push(n.clone()),
                StageChild::Canvas(_) => snap.canvases += 1,
            }
        }
        snap
    }
}

impl std::fmt::Debug for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.borrow();
        f.debug_struct("Stage")
            .field("size", &inner.size)
            .field("children", &inner.children.len())
            .finish()
    }
}
