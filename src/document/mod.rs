//! Collaborator seams for the document tree and the viewport.
//!
//! The engine never assumes a concrete tree API. It asks for ordered text
//! leaves, substitute-container lookups, structural wrap/unwrap of byte
//! sub-ranges, and on-screen geometry, and nothing else. [`arena`] provides
//! an index-based in-memory implementation of both traits for hosts without
//! a live mutable tree (and for every test in this crate).

pub mod arena;

use anyhow::Result;
use std::ops::Range;

pub use arena::ArenaDocument;

/// Opaque handle to a node owned by the document-tree collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId(pub usize);

/// Handle to an active highlight marker, returned by [`DocumentTree::wrap_range`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MarkerId(pub NodeId);

/// Narratable unit kind. Formula blocks are spoken from a substitute
/// description as a single utterance and are never highlighted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Text,
    Formula,
}

/// A top-level narratable unit: paragraph, list item, heading, or formula.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Block {
    pub node: NodeId,
    pub kind: BlockKind,
}

/// Axis-aligned rectangle in document coordinates (y grows downward).
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub top: f32,
    pub bottom: f32,
    pub left: f32,
    pub right: f32,
}

impl Rect {
    /// True when the rectangle overlaps the vertical band `[top, bottom)`.
    pub fn intersects_band(&self, top: f32, bottom: f32) -> bool {
        self.bottom > top && self.top < bottom
    }
}

/// Structural access to the document being narrated.
///
/// All ranges are byte offsets into UTF-8 leaf text; callers only pass
/// offsets derived from that text, so they always land on `char` boundaries.
pub trait DocumentTree {
    /// Narratable blocks in document order.
    fn blocks(&self) -> Vec<Block>;

    /// Text-bearing leaves under `block`, in document order. Leaves inside
    /// substitute containers and inside active highlight markers are
    /// included; the extractor decides what they contribute.
    fn text_leaves(&self, block: NodeId) -> Vec<NodeId>;

    /// Current content of a text leaf.
    fn leaf_text(&self, leaf: NodeId) -> String;

    /// Nearest enclosing substitute container of `leaf`, if any.
    fn substitute_ancestor(&self, leaf: NodeId) -> Option<NodeId>;

    /// Author-supplied spoken form of a substitute container or formula
    /// block. `None` or blank means "use the fallback placeholder".
    fn spoken_form(&self, container: NodeId) -> Option<String>;

    /// Wrap `range` of `leaf` in a highlight marker, preserving net text
    /// content and order. Implementations that cannot wrap in place must
    /// fall back to extracting the sub-range and reinserting it inside the
    /// marker at the same position.
    fn wrap_range(&mut self, leaf: NodeId, range: Range<usize>) -> Result<MarkerId>;

    /// Remove a marker, restoring the affected nodes to their prior
    /// structure. No residual wrapper nodes, no lost text.
    fn unwrap(&mut self, marker: MarkerId) -> Result<()>;
}

/// Geometry and scrolling, provided by the host's layout.
pub trait Viewport {
    /// Currently visible vertical band `(top, bottom)` in document
    /// coordinates.
    fn visible_extent(&self) -> (f32, f32);

    /// Bounding rectangle of a block, or `None` before layout has settled.
    fn block_rect(&self, block: NodeId) -> Option<Rect>;

    /// Rectangles covering `range` of a text leaf, one per rendered line.
    fn leaf_range_rects(&self, leaf: NodeId, range: Range<usize>) -> Vec<Rect>;

    /// Bring a highlight marker into view, centered when requested.
    fn scroll_into_view(&mut self, marker: MarkerId, centered: bool);
}

#[cfg(test)]
mod tests {
    use super::Rect;

    #[test]
    fn band_intersection_is_half_open() {
        let rect = Rect {
            top: 10.0,
            bottom: 20.0,
            left: 0.0,
            right: 100.0,
        };
        assert!(rect.intersects_band(15.0, 30.0));
        assert!(rect.intersects_band(0.0, 11.0));
        assert!(!rect.intersects_band(20.0, 40.0));
        assert!(!rect.intersects_band(0.0, 10.0));
    }
}
