//! Page model
//!
//! [`PageHost`] is what the reader needs from the page it reads: the
//! viewport, the document tree, the candidate surfaces and text fields, and
//! a way to write into a field. [`Page`] is an in-memory implementation that
//! can be loaded from a JSON [`PageSnapshot`].

use crate::types::{DocumentTree, Field, FieldKind, NodeId, Rect, Surface, Viewport};
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Access to the page being read
pub trait PageHost {
    fn viewport(&self) -> Viewport;

    fn tree(&self) -> &DocumentTree;

    fn surfaces(&self) -> &[Surface];

    /// Editable text-entry fields, in document order
    fn fields(&self) -> &[Field];

    /// Write `text` into the field at `node` and highlight it for `highlight`
    fn fill_field(&mut self, node: NodeId, text: &str, highlight: Duration) -> bool;
}

/// In-memory page
#[derive(Debug, Clone)]
pub struct Page {
    pub viewport: Viewport,
    pub tree: DocumentTree,
    pub surfaces: Vec<Surface>,
    pub fields: Vec<Field>,
}

impl Page {
    pub fn new(viewport: Viewport, tree: DocumentTree) -> Self {
        Self {
            viewport,
            tree,
            surfaces: Vec::new(),
            fields: Vec::new(),
        }
    }

    pub fn field(&self, node: NodeId) -> Option<&Field> {
        self.fields.iter().find(|f| f.node == node)
    }

    /// Load a page from a snapshot file; surface images resolve relative to it
    pub fn load(path: &Path) -> Result<Self> {
        let json = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read page snapshot {}", path.display()))?;
        let snapshot: PageSnapshot = serde_json::from_str(&json)
            .with_context(|| format!("Invalid page snapshot {}", path.display()))?;
        let base = path.parent().unwrap_or_else(|| Path::new("."));
        snapshot.into_page(base)
    }
}

impl PageHost for Page {
    fn viewport(&self) -> Viewport {
        self.viewport
    }

    fn tree(&self) -> &DocumentTree {
        &self.tree
    }

    fn surfaces(&self) -> &[Surface] {
        &self.surfaces
    }

    fn fields(&self) -> &[Field] {
        &self.fields
    }

    fn fill_field(&mut self, node: NodeId, text: &str, highlight: Duration) -> bool {
        match self.fields.iter_mut().find(|f| f.node == node) {
            Some(field) => {
                field.value = text.to_string();
                field.highlight = Some(highlight);
                true
            }
            None => false,
        }
    }
}

/// Serialized description of a page
///
/// ```json
/// {
///   "viewport": { "width": 1280, "height": 720 },
///   "nodes": [null, 0, 1, 1],
///   "surfaces": [{ "node": 2, "rect": { ... }, "image": "captcha.png" }],
///   "fields": [{ "node": 3, "rect": { ... }, "kind": "text" }]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PageSnapshot {
    pub viewport: Viewport,
    /// Parent of each node by index; `null` for roots
    pub nodes: Vec<Option<NodeId>>,
    #[serde(default)]
    pub surfaces: Vec<SurfaceSnapshot>,
    #[serde(default)]
    pub fields: Vec<FieldSnapshot>,
}

/// A surface whose pixels live in an image file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SurfaceSnapshot {
    pub node: NodeId,
    pub rect: Rect,
    /// Image path, relative to the snapshot file
    pub image: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FieldSnapshot {
    pub node: NodeId,
    pub rect: Rect,
    pub kind: FieldKind,
    #[serde(default)]
    pub value: String,
}

impl PageSnapshot {
    /// Validate the tree and load every surface image
    pub fn into_page(self, base: &Path) -> Result<Page> {
        let tree = DocumentTree::from_parents(self.nodes).context("Invalid node table")?;
        let mut page = Page::new(self.viewport, tree);

        for surface in self.surfaces {
            check_node(&page.tree, surface.node)?;
            let path = base.join(&surface.image);
            let pixels = image::open(&path)
                .with_context(|| format!("Failed to load surface image {}", path.display()))?
                .to_rgba8();
            page.surfaces.push(Surface {
                node: surface.node,
                rect: surface.rect,
                pixels,
            });
        }

        for field in self.fields {
            check_node(&page.tree, field.node)?;
            let mut loaded = Field::new(field.node, field.rect, field.kind);
            loaded.value = field.value;
            page.fields.push(loaded);
        }

        Ok(page)
    }
}

fn check_node(tree: &DocumentTree, node: NodeId) -> Result<()> {
    if !tree.contains(node) {
        anyhow::bail!("node {} is not in the node table", node.0);
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{ImageBuffer, Rgba};

    const SNAPSHOT: &str = r#"{
        "viewport": { "width": 800, "height": 600 },
        "nodes": [null, 0, 1, 1],
        "surfaces": [
            { "node": 2, "rect": { "left": 0, "top": 0, "width": 120, "height": 40 }, "image": "canvas.png" }
        ],
        "fields": [
            { "node": 3, "rect": { "left": 0, "top": 50, "width": 120, "height": 20 }, "kind": "text" }
        ]
    }"#;

    #[test]
    fn test_load_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        ImageBuffer::from_pixel(60, 20, Rgba([255u8, 255, 255, 255]))
            .save(dir.path().join("canvas.png"))
            .unwrap();
        let path = dir.path().join("page.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let page = Page::load(&path).unwrap();
        assert_eq!(page.surfaces.len(), 1);
        assert_eq!(page.surfaces[0].pixels.dimensions(), (60, 20));
        assert_eq!(page.fields[0].kind, FieldKind::Text);
        assert_eq!(page.tree.parent(NodeId(3)), Some(NodeId(1)));
    }

    #[test]
    fn test_load_missing_image_fails() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("page.json");
        std::fs::write(&path, SNAPSHOT).unwrap();

        let err = Page::load(&path).unwrap_err();
        assert!(format!("{:#}", err).contains("canvas.png"));
    }

    #[test]
    fn test_unknown_field_node_is_rejected() {
        let snapshot = PageSnapshot {
            viewport: Viewport::new(100.0, 100.0),
            nodes: vec![None],
            surfaces: Vec::new(),
            fields: vec![FieldSnapshot {
                node: NodeId(7),
                rect: Rect::default(),
                kind: FieldKind::Email,
                value: String::new(),
            }],
        };
        assert!(snapshot.into_page(Path::new(".")).is_err());
    }

    #[test]
    fn test_fill_field() {
        let mut tree = DocumentTree::new();
        let root = tree.add_node(None);
        let input = tree.add_node(Some(root));
        let mut page = Page::new(Viewport::new(100.0, 100.0), tree);
        page.fields.push(Field::new(input, Rect::default(), FieldKind::Search));

        assert!(page.fill_field(input, "AB12", Duration::from_secs(2)));
        let field = page.field(input).unwrap();
        assert_eq!(field.value, "AB12");
        assert_eq!(field.highlight, Some(Duration::from_secs(2)));

        assert!(!page.fill_field(root, "AB12", Duration::from_secs(2)));
    }
}
