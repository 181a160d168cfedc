//! Index-based in-memory document tree.
//!
//! Nodes live in a flat arena and reference each other by index, so handles
//! stay valid across structural edits. Geometry uses a deliberately simple
//! deterministic layout: a fixed number of characters per line and a fixed
//! line height, in the same spirit as approximating page capacity from font
//! size. The constants are easy to tweak and make every rectangle assertable
//! in tests.

use super::{Block, BlockKind, DocumentTree, MarkerId, NodeId, Rect, Viewport};
use anyhow::{Context, Result, bail};
use std::ops::Range;

enum Node {
    Element {
        tag: String,
        substitute: bool,
        spoken_form: Option<String>,
        parent: Option<NodeId>,
        children: Vec<NodeId>,
    },
    Text {
        content: String,
        parent: Option<NodeId>,
    },
    Marker {
        parent: Option<NodeId>,
        children: Vec<NodeId>,
    },
}

pub struct ArenaDocument {
    nodes: Vec<Node>,
    blocks: Vec<Block>,
    chars_per_line: usize,
    line_height: f32,
    char_width: f32,
    viewport_height: f32,
    scroll_top: f32,
}

impl Default for ArenaDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl ArenaDocument {
    pub fn new() -> Self {
        ArenaDocument {
            nodes: Vec::new(),
            blocks: Vec::new(),
            chars_per_line: 40,
            line_height: 16.0,
            char_width: 8.0,
            viewport_height: 64.0,
            scroll_top: 0.0,
        }
    }

    /// Characters per rendered line used by the layout.
    pub fn set_chars_per_line(&mut self, chars: usize) {
        self.chars_per_line = chars.max(1);
    }

    pub fn set_viewport_height(&mut self, height: f32) {
        self.viewport_height = height.max(self.line_height);
    }

    pub fn set_scroll_top(&mut self, top: f32) {
        self.scroll_top = top.max(0.0);
    }

    pub fn scroll_top(&self) -> f32 {
        self.scroll_top
    }

    pub fn line_height(&self) -> f32 {
        self.line_height
    }

    /// Append a text block (paragraph, list item, heading).
    pub fn push_block(&mut self, tag: &str) -> NodeId {
        let id = self.alloc(Node::Element {
            tag: tag.to_string(),
            substitute: false,
            spoken_form: None,
            parent: None,
            children: Vec::new(),
        });
        self.blocks.push(Block {
            node: id,
            kind: BlockKind::Text,
        });
        id
    }

    /// Append a formula block spoken from `spoken_form` as one utterance.
    pub fn push_formula_block(&mut self, tag: &str, spoken_form: Option<&str>) -> NodeId {
        let id = self.alloc(Node::Element {
            tag: tag.to_string(),
            substitute: false,
            spoken_form: spoken_form.map(str::to_string),
            parent: None,
            children: Vec::new(),
        });
        self.blocks.push(Block {
            node: id,
            kind: BlockKind::Formula,
        });
        id
    }

    pub fn push_element(&mut self, parent: NodeId, tag: &str) -> NodeId {
        let id = self.alloc(Node::Element {
            tag: tag.to_string(),
            substitute: false,
            spoken_form: None,
            parent: Some(parent),
            children: Vec::new(),
        });
        self.attach(parent, id);
        id
    }

    /// Append an inline substitute container (e.g. an embedded formula) whose
    /// author-supplied spoken form replaces its entire textual content.
    pub fn push_substitute(
        &mut self,
        parent: NodeId,
        tag: &str,
        spoken_form: Option<&str>,
    ) -> NodeId {
        let id = self.alloc(Node::Element {
            tag: tag.to_string(),
            substitute: true,
            spoken_form: spoken_form.map(str::to_string),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.attach(parent, id);
        id
    }

    /// Append literal text under `parent`. Adjacent text siblings are kept
    /// coalesced, which is what lets `unwrap` restore the exact pre-highlight
    /// shape after a wrap split a leaf.
    pub fn push_text(&mut self, parent: NodeId, text: &str) -> NodeId {
        if let Some(&last) = self.children_of(parent).last() {
            if let Node::Text { content, .. } = &mut self.nodes[last.0] {
                content.push_str(text);
                return last;
            }
        }
        let id = self.alloc(Node::Text {
            content: text.to_string(),
            parent: Some(parent),
        });
        self.attach(parent, id);
        id
    }

    /// Replace the content of a text leaf, simulating a dynamic re-render.
    pub fn set_text(&mut self, leaf: NodeId, text: &str) {
        if let Node::Text { content, .. } = &mut self.nodes[leaf.0] {
            *content = text.to_string();
        }
    }

    /// Structural serialization used by tests to compare tree shapes.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for block in &self.blocks {
            self.render_node(block.node, &mut out);
        }
        out
    }

    fn render_node(&self, id: NodeId, out: &mut String) {
        match &self.nodes[id.0] {
            Node::Element {
                tag,
                substitute,
                spoken_form,
                children,
                ..
            } => {
                out.push('<');
                out.push_str(tag);
                if *substitute || spoken_form.is_some() {
                    out.push_str(" speech=\"");
                    if let Some(form) = spoken_form {
                        out.push_str(form);
                    }
                    out.push('"');
                }
                out.push('>');
                for &child in children {
                    self.render_node(child, out);
                }
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
            Node::Marker { children, .. } => {
                out.push_str("<mark>");
                for &child in children {
                    self.render_node(child, out);
                }
                out.push_str("</mark>");
            }
            Node::Text { content, .. } => out.push_str(content),
        }
    }

    fn alloc(&mut self, node: Node) -> NodeId {
        let id = NodeId(self.nodes.len());
        self.nodes.push(node);
        id
    }

    fn attach(&mut self, parent: NodeId, child: NodeId) {
        match &mut self.nodes[parent.0] {
            Node::Element { children, .. } | Node::Marker { children, .. } => children.push(child),
            Node::Text { .. } => {}
        }
    }

    fn children_of(&self, id: NodeId) -> &[NodeId] {
        match &self.nodes[id.0] {
            Node::Element { children, .. } | Node::Marker { children, .. } => children,
            Node::Text { .. } => &[],
        }
    }

    fn parent_of(&self, id: NodeId) -> Option<NodeId> {
        match &self.nodes[id.0] {
            Node::Element { parent, .. }
            | Node::Text { parent, .. }
            | Node::Marker { parent, .. } => *parent,
        }
    }

    fn set_parent(&mut self, id: NodeId, new_parent: Option<NodeId>) {
        match &mut self.nodes[id.0] {
            Node::Element { parent, .. }
            | Node::Text { parent, .. }
            | Node::Marker { parent, .. } => *parent = new_parent,
        }
    }

    fn collect_text_leaves(&self, id: NodeId, out: &mut Vec<NodeId>) {
        match &self.nodes[id.0] {
            Node::Text { .. } => out.push(id),
            Node::Element { children, .. } | Node::Marker { children, .. } => {
                for &child in children {
                    self.collect_text_leaves(child, out);
                }
            }
        }
    }

    fn block_root(&self, mut id: NodeId) -> NodeId {
        while let Some(parent) = self.parent_of(id) {
            id = parent;
        }
        id
    }

    /// All rendered text under `root`, in document order. Substitute
    /// containers contribute their literal interior here because that is
    /// what occupies screen space; spoken substitution is an extraction
    /// concern, not a layout one.
    fn visible_text(&self, root: NodeId) -> String {
        let mut leaves = Vec::new();
        self.collect_text_leaves(root, &mut leaves);
        let mut text = String::new();
        for leaf in leaves {
            text.push_str(&self.leaf_text(leaf));
        }
        text
    }

    fn block_lines(&self, root: NodeId) -> usize {
        let chars = self.visible_text(root).chars().count();
        chars.div_ceil(self.chars_per_line).max(1)
    }

    fn block_start_line(&self, root: NodeId) -> Option<usize> {
        let mut line = 0;
        for block in &self.blocks {
            if block.node == root {
                return Some(line);
            }
            line += self.block_lines(block.node);
        }
        None
    }

    /// Byte offset of `leaf`'s content within its block's visible text.
    fn leaf_start_in_block(&self, root: NodeId, leaf: NodeId) -> Option<usize> {
        let mut leaves = Vec::new();
        self.collect_text_leaves(root, &mut leaves);
        let mut offset = 0;
        for candidate in leaves {
            if candidate == leaf {
                return Some(offset);
            }
            offset += self.leaf_text(candidate).len();
        }
        None
    }

    /// Merge adjacent text children after a splice so wrap/unwrap cycles are
    /// invisible to later structural comparisons.
    fn coalesce_children(&mut self, parent: NodeId) {
        let children = self.children_of(parent).to_vec();
        let mut merged: Vec<NodeId> = Vec::new();
        for child in children {
            let absorbed = match (&self.nodes[child.0], merged.last()) {
                (Node::Text { content, .. }, Some(&prev)) => {
                    if matches!(self.nodes[prev.0], Node::Text { .. }) {
                        Some((prev, content.clone()))
                    } else {
                        None
                    }
                }
                _ => None,
            };
            match absorbed {
                Some((prev, extra)) => {
                    if let Node::Text { content, .. } = &mut self.nodes[prev.0] {
                        content.push_str(&extra);
                    }
                    self.set_parent(child, None);
                }
                None => merged.push(child),
            }
        }
        match &mut self.nodes[parent.0] {
            Node::Element { children, .. } | Node::Marker { children, .. } => *children = merged,
            Node::Text { .. } => {}
        }
    }

    fn child_position(&self, parent: NodeId, child: NodeId) -> Option<usize> {
        self.children_of(parent).iter().position(|&c| c == child)
    }

    fn replace_children_range(
        &mut self,
        parent: NodeId,
        pos: usize,
        replacement: Vec<NodeId>,
    ) {
        match &mut self.nodes[parent.0] {
            Node::Element { children, .. } | Node::Marker { children, .. } => {
                children.splice(pos..pos + 1, replacement);
            }
            Node::Text { .. } => {}
        }
    }

    fn first_text_descendant(&self, id: NodeId) -> Option<NodeId> {
        let mut leaves = Vec::new();
        self.collect_text_leaves(id, &mut leaves);
        leaves.first().copied()
    }
}

impl DocumentTree for ArenaDocument {
    fn blocks(&self) -> Vec<Block> {
        self.blocks.clone()
    }

    fn text_leaves(&self, block: NodeId) -> Vec<NodeId> {
        let mut leaves = Vec::new();
        self.collect_text_leaves(block, &mut leaves);
        leaves
    }

    fn leaf_text(&self, leaf: NodeId) -> String {
        match &self.nodes[leaf.0] {
            Node::Text { content, .. } => content.clone(),
            _ => String::new(),
        }
    }

    fn substitute_ancestor(&self, leaf: NodeId) -> Option<NodeId> {
        let mut current = self.parent_of(leaf);
        while let Some(id) = current {
            if let Node::Element { substitute: true, .. } = &self.nodes[id.0] {
                return Some(id);
            }
            current = self.parent_of(id);
        }
        None
    }

    fn spoken_form(&self, container: NodeId) -> Option<String> {
        match &self.nodes[container.0] {
            Node::Element { spoken_form, .. } => spoken_form.clone(),
            _ => None,
        }
    }

    fn wrap_range(&mut self, leaf: NodeId, range: Range<usize>) -> Result<MarkerId> {
        if range.start >= range.end {
            bail!("cannot wrap an empty range");
        }
        match &self.nodes[leaf.0] {
            Node::Text { content, .. } => {
                let content = content.clone();
                if range.end > content.len()
                    || !content.is_char_boundary(range.start)
                    || !content.is_char_boundary(range.end)
                {
                    bail!(
                        "range {}..{} does not lie on char boundaries of a {}-byte leaf",
                        range.start,
                        range.end,
                        content.len()
                    );
                }
                let parent = self
                    .parent_of(leaf)
                    .context("text leaf has no parent to host a marker")?;
                let pos = self
                    .child_position(parent, leaf)
                    .context("leaf not found among its parent's children")?;

                let marker = self.alloc(Node::Marker {
                    parent: Some(parent),
                    children: vec![leaf],
                });

                if range.start == 0 && range.end == content.len() {
                    self.set_parent(leaf, Some(marker));
                    self.replace_children_range(parent, pos, vec![marker]);
                    return Ok(MarkerId(marker));
                }

                let pre = content[..range.start].to_string();
                let post = content[range.end..].to_string();
                self.set_text(leaf, &content[range.clone()]);
                self.set_parent(leaf, Some(marker));

                let mut replacement = Vec::new();
                if !pre.is_empty() {
                    replacement.push(self.alloc(Node::Text {
                        content: pre,
                        parent: Some(parent),
                    }));
                }
                replacement.push(marker);
                if !post.is_empty() {
                    replacement.push(self.alloc(Node::Text {
                        content: post,
                        parent: Some(parent),
                    }));
                }
                self.replace_children_range(parent, pos, replacement);
                Ok(MarkerId(marker))
            }
            Node::Element { .. } => {
                // Structural conflict: the target is not a plain text leaf.
                // Extract its content and reinsert it inside the marker at
                // the same position; net text content and order unchanged.
                tracing::debug!(node = leaf.0, "Wrapping element content via extract-and-reinsert");
                let children = self.children_of(leaf).to_vec();
                let marker = self.alloc(Node::Marker {
                    parent: Some(leaf),
                    children: children.clone(),
                });
                for child in children {
                    self.set_parent(child, Some(marker));
                }
                match &mut self.nodes[leaf.0] {
                    Node::Element { children, .. } => *children = vec![marker],
                    _ => unreachable!(),
                }
                Ok(MarkerId(marker))
            }
            Node::Marker { .. } => bail!("node is already a highlight marker"),
        }
    }

    fn unwrap(&mut self, marker: MarkerId) -> Result<()> {
        let MarkerId(id) = marker;
        let children = match &self.nodes[id.0] {
            Node::Marker { children, .. } => children.clone(),
            _ => bail!("unwrap target is not a marker"),
        };
        let parent = self
            .parent_of(id)
            .context("marker has no parent; already unwrapped?")?;
        let pos = self
            .child_position(parent, id)
            .context("marker not found among its parent's children")?;
        for &child in &children {
            self.set_parent(child, Some(parent));
        }
        self.replace_children_range(parent, pos, children);
        self.set_parent(id, None);
        self.coalesce_children(parent);
        Ok(())
    }
}

impl Viewport for ArenaDocument {
    fn visible_extent(&self) -> (f32, f32) {
        (self.scroll_top, self.scroll_top + self.viewport_height)
    }

    fn block_rect(&self, block: NodeId) -> Option<Rect> {
        let start = self.block_start_line(block)?;
        let lines = self.block_lines(block);
        Some(Rect {
            top: start as f32 * self.line_height,
            bottom: (start + lines) as f32 * self.line_height,
            left: 0.0,
            right: (self.chars_per_line as f32) * self.char_width,
        })
    }

    fn leaf_range_rects(&self, leaf: NodeId, range: Range<usize>) -> Vec<Rect> {
        if range.start >= range.end {
            return Vec::new();
        }
        let root = self.block_root(leaf);
        let Some(block_line) = self.block_start_line(root) else {
            return Vec::new();
        };
        let Some(leaf_start) = self.leaf_start_in_block(root, leaf) else {
            return Vec::new();
        };
        let text = self.visible_text(root);
        let start_byte = leaf_start + range.start;
        let end_byte = (leaf_start + range.end).min(text.len());
        if start_byte >= end_byte {
            return Vec::new();
        }
        let start_char = text[..start_byte].chars().count();
        let end_char = start_char + text[start_byte..end_byte].chars().count();

        let first_line = start_char / self.chars_per_line;
        let last_line = (end_char - 1) / self.chars_per_line;
        let mut rects = Vec::new();
        for line in first_line..=last_line {
            let left_char = if line == first_line {
                start_char % self.chars_per_line
            } else {
                0
            };
            let right_char = if line == last_line {
                (end_char - 1) % self.chars_per_line + 1
            } else {
                self.chars_per_line
            };
            rects.push(Rect {
                top: (block_line + line) as f32 * self.line_height,
                bottom: (block_line + line + 1) as f32 * self.line_height,
                left: left_char as f32 * self.char_width,
                right: right_char as f32 * self.char_width,
            });
        }
        rects
    }

    fn scroll_into_view(&mut self, marker: MarkerId, centered: bool) {
        let Some(leaf) = self.first_text_descendant(marker.0) else {
            return;
        };
        let len = self.leaf_text(leaf).len();
        let Some(rect) = self.leaf_range_rects(leaf, 0..len).first().copied() else {
            return;
        };
        let target = if centered {
            (rect.top + rect.bottom) / 2.0 - self.viewport_height / 2.0
        } else {
            rect.top
        };
        self.scroll_top = target.max(0.0);
    }
}
