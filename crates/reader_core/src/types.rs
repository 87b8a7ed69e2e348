//! Core types for the canvas reader
//!
//! Geometry, the document tree, surfaces, fields and the records that
//! flow from a recognition to the result sink.

use chrono::{DateTime, Utc};
use image::RgbaImage;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use uuid::Uuid;

/// Unique identifier for a single recognition request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct RequestId(pub Uuid);

impl RequestId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for RequestId {
    fn default() -> Self {
        Self::new()
    }
}

/// Index of a node in a [`DocumentTree`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub usize);

/// Axis-aligned bounding rectangle in CSS pixels
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Rect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn area(&self) -> f64 {
        self.width * self.height
    }

    /// Center point as `(x, y)`
    pub fn center(&self) -> (f64, f64) {
        (self.left + self.width / 2.0, self.top + self.height / 2.0)
    }

    /// Euclidean distance between the centers of two rectangles
    pub fn center_distance(&self, other: &Rect) -> f64 {
        let (ax, ay) = self.center();
        let (bx, by) = other.center();
        (ax - bx).hypot(ay - by)
    }
}

/// Size of the visible window, anchored at the top-left corner
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub width: f64,
    pub height: f64,
}

impl Viewport {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    /// True if the rectangle starts above and left of the viewport's far edges
    pub fn intersects(&self, rect: &Rect) -> bool {
        rect.top < self.height && rect.left < self.width
    }
}

/// Parent links for every node on a page
///
/// Nodes are stored in insertion order; a node without a parent is a root.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentTree {
    parents: Vec<Option<NodeId>>,
}

impl DocumentTree {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a tree from a parent table, validating every parent index
    pub fn from_parents(parents: Vec<Option<NodeId>>) -> anyhow::Result<Self> {
        for (index, parent) in parents.iter().enumerate() {
            if let Some(parent) = parent {
                if parent.0 >= parents.len() {
                    anyhow::bail!("node {} has unknown parent {}", index, parent.0);
                }
                if parent.0 == index {
                    anyhow::bail!("node {} is its own parent", index);
                }
            }
        }
        Ok(Self { parents })
    }

    /// Append a node under `parent` (or as a root) and return its id
    pub fn add_node(&mut self, parent: Option<NodeId>) -> NodeId {
        self.parents.push(parent);
        NodeId(self.parents.len() - 1)
    }

    pub fn len(&self) -> usize {
        self.parents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parents.is_empty()
    }

    pub fn contains(&self, node: NodeId) -> bool {
        node.0 < self.parents.len()
    }

    pub fn parent(&self, node: NodeId) -> Option<NodeId> {
        self.parents.get(node.0).copied().flatten()
    }

    /// Walk from `node` up to its root, yielding `node` first
    pub fn ancestors(&self, node: NodeId) -> Ancestors<'_> {
        Ancestors {
            tree: self,
            next: self.contains(node).then_some(node),
            steps: 0,
        }
    }
}

/// Iterator over a node and its ancestors
pub struct Ancestors<'a> {
    tree: &'a DocumentTree,
    next: Option<NodeId>,
    steps: usize,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeId;

    fn next(&mut self) -> Option<NodeId> {
        let current = self.next?;
        // A malformed cycle would otherwise never terminate
        self.steps += 1;
        self.next = if self.steps > self.tree.len() {
            None
        } else {
            self.tree.parent(current)
        };
        Some(current)
    }
}

/// A rectangular raster region on the page (a canvas)
#[derive(Debug, Clone)]
pub struct Surface {
    /// Node of the surface in the document tree
    pub node: NodeId,
    /// On-screen bounding rectangle
    pub rect: Rect,
    /// Backing pixel buffer
    pub pixels: RgbaImage,
}

/// Kind of editable text-entry element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Email,
    Password,
    Search,
    TextArea,
}

/// An editable text-entry element that can receive extracted text
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Field {
    /// Node of the field in the document tree
    pub node: NodeId,
    /// On-screen bounding rectangle
    pub rect: Rect,
    pub kind: FieldKind,
    /// Current value of the field
    #[serde(default)]
    pub value: String,
    /// Highlight requested by the last fill, if any
    #[serde(skip)]
    pub highlight: Option<Duration>,
}

impl Field {
    pub fn new(node: NodeId, rect: Rect, kind: FieldKind) -> Self {
        Self {
            node,
            rect,
            kind,
            value: String::new(),
            highlight: None,
        }
    }
}

/// Raw output of an OCR engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recognition {
    /// Recognized text, untrimmed
    pub text: String,
    /// Engine confidence (0-100), when the engine reports one
    pub confidence: Option<f32>,
}

impl Recognition {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            confidence: None,
        }
    }
}

/// A successful extraction as delivered to the result sink
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractedText {
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl ExtractedText {
    pub fn now(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            timestamp: Utc::now(),
        }
    }

    /// Age of this result relative to `now`, clamped at zero
    pub fn age(&self, now: DateTime<Utc>) -> chrono::Duration {
        (now - self.timestamp).max(chrono::Duration::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_id_creation() {
        let id1 = RequestId::new();
        let id2 = RequestId::new();
        assert_ne!(id1, id2);
    }

    #[test]
    fn test_rect_center_distance() {
        let a = Rect::new(0.0, 0.0, 10.0, 10.0);
        let b = Rect::new(30.0, 40.0, 10.0, 10.0);
        assert_eq!(a.center(), (5.0, 5.0));
        assert!((a.center_distance(&b) - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_viewport_intersects_from_top_left() {
        let viewport = Viewport::new(800.0, 600.0);
        assert!(viewport.intersects(&Rect::new(-50.0, -50.0, 100.0, 100.0)));
        assert!(viewport.intersects(&Rect::new(799.0, 599.0, 100.0, 100.0)));
        assert!(!viewport.intersects(&Rect::new(800.0, 0.0, 100.0, 100.0)));
        assert!(!viewport.intersects(&Rect::new(0.0, 600.0, 100.0, 100.0)));
    }

    #[test]
    fn test_tree_ancestors() {
        let mut tree = DocumentTree::new();
        let root = tree.add_node(None);
        let child = tree.add_node(Some(root));
        let leaf = tree.add_node(Some(child));

        let chain: Vec<_> = tree.ancestors(leaf).collect();
        assert_eq!(chain, vec![leaf, child, root]);
        assert_eq!(tree.ancestors(NodeId(42)).count(), 0);
    }

    #[test]
    fn test_tree_from_parents_rejects_bad_index() {
        assert!(DocumentTree::from_parents(vec![None, Some(NodeId(5))]).is_err());
        assert!(DocumentTree::from_parents(vec![Some(NodeId(0))]).is_err());
        assert!(DocumentTree::from_parents(vec![None, Some(NodeId(0))]).is_ok());
    }

    #[test]
    fn test_field_kind_serialization() {
        let json = serde_json::to_string(&FieldKind::TextArea).unwrap();
        assert_eq!(json, "\"text_area\"");
        let kind: FieldKind = serde_json::from_str("\"search\"").unwrap();
        assert_eq!(kind, FieldKind::Search);
    }

    #[test]
    fn test_extracted_text_age_is_never_negative() {
        let result = ExtractedText::now("AB12");
        let earlier = result.timestamp - chrono::Duration::seconds(5);
        assert_eq!(result.age(earlier), chrono::Duration::zero());
    }
}
