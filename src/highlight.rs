//! Highlight marker management.
//!
//! The set of active markers is owned exclusively here: every `apply` starts
//! by removing the previous highlight, and `clear` restores the tree to its
//! pre-highlight shape before playback stops or moves on. Substitute runs
//! are never wrapped; their length only positions the literal runs around
//! them.

use crate::document::{DocumentTree, MarkerId, Viewport};
use crate::extract::TextRun;
use crate::offsets::PlayableRange;
use tracing::{debug, warn};

#[derive(Debug, Default)]
pub struct Highlighter {
    markers: Vec<MarkerId>,
}

impl Highlighter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_active(&self) -> bool {
        !self.markers.is_empty()
    }

    /// Wrap every literal sub-range of `range` in a highlight marker, then
    /// bring the first marker into view. A sub-range that cannot be wrapped
    /// is skipped with a diagnostic; playback is never aborted over it.
    pub fn apply<D: DocumentTree + Viewport>(
        &mut self,
        doc: &mut D,
        runs: &[TextRun],
        range: &PlayableRange,
        centered: bool,
    ) {
        self.clear(doc);

        for span in &range.spans {
            let run = &runs[span.run_index];
            if run.is_substitute || span.range.is_empty() {
                continue;
            }
            match doc.wrap_range(run.node, span.range.clone()) {
                Ok(marker) => self.markers.push(marker),
                Err(err) => {
                    warn!(
                        run_index = span.run_index,
                        "Could not wrap sub-range for highlight: {err:#}"
                    );
                }
            }
        }

        debug!(markers = self.markers.len(), "Applied highlight");
        if let Some(&first) = self.markers.first() {
            doc.scroll_into_view(first, centered);
        }
    }

    /// Remove all active markers. Idempotent: with no active highlight this
    /// touches nothing.
    pub fn clear<D: DocumentTree>(&mut self, doc: &mut D) {
        for marker in self.markers.drain(..) {
            if let Err(err) = doc.unwrap(marker) {
                warn!("Failed to unwrap highlight marker: {err:#}");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ArenaDocument;
    use crate::extract::extract_block;
    use crate::offsets::resolve_range;

    fn formula_doc() -> (ArenaDocument, crate::document::NodeId) {
        let mut doc = ArenaDocument::new();
        let block = doc.push_block("p");
        doc.push_text(block, "Veja: ");
        let formula = doc.push_substitute(block, "span", Some("x ao quadrado"));
        doc.push_text(formula, "x²");
        doc.push_text(block, " é positivo.");
        (doc, block)
    }

    #[test]
    fn highlights_literal_runs_only() {
        let (mut doc, block) = formula_doc();
        let extraction = extract_block(&doc, block);
        // Whole flat text: "Veja: x ao quadrado é positivo."
        let range = resolve_range(&extraction.runs, 0, extraction.full_text.len()).unwrap();

        let mut highlighter = Highlighter::new();
        highlighter.apply(&mut doc, &extraction.runs, &range, true);

        let rendered = doc.render();
        assert!(rendered.contains("<mark>Veja: </mark>"));
        assert!(rendered.contains("<mark> é positivo.</mark>"));
        // The formula container itself is never wrapped.
        assert!(rendered.contains("<span speech=\"x ao quadrado\">x²</span>"));
    }

    #[test]
    fn clear_restores_tree_and_is_idempotent() {
        let (mut doc, block) = formula_doc();
        let before = doc.render();
        let extraction = extract_block(&doc, block);
        let range = resolve_range(&extraction.runs, 0, extraction.full_text.len()).unwrap();

        let mut highlighter = Highlighter::new();
        highlighter.apply(&mut doc, &extraction.runs, &range, false);
        assert!(highlighter.is_active());

        highlighter.clear(&mut doc);
        assert_eq!(doc.render(), before);
        assert!(!highlighter.is_active());

        // Second clear, and clears with nothing active, change nothing.
        highlighter.clear(&mut doc);
        assert_eq!(doc.render(), before);
    }

    #[test]
    fn apply_replaces_previous_highlight() {
        let (mut doc, block) = formula_doc();
        let before = doc.render();

        let extraction = extract_block(&doc, block);
        let first = resolve_range(&extraction.runs, 0, 6).unwrap();
        let mut highlighter = Highlighter::new();
        highlighter.apply(&mut doc, &extraction.runs, &first, false);

        // Re-extract after mutation, as the read loop does.
        highlighter.clear(&mut doc);
        let extraction = extract_block(&doc, block);
        let start = extraction.full_text.len() - " é positivo.".len();
        let second = resolve_range(&extraction.runs, start, extraction.full_text.len()).unwrap();
        highlighter.apply(&mut doc, &extraction.runs, &second, false);

        let rendered = doc.render();
        assert!(!rendered.contains("<mark>Veja: </mark>"));
        assert!(rendered.contains("<mark> é positivo.</mark>"));

        highlighter.clear(&mut doc);
        assert_eq!(doc.render(), before);
    }

    #[test]
    fn scrolls_first_marker_into_view() {
        let mut doc = ArenaDocument::new();
        doc.set_chars_per_line(10);
        doc.set_viewport_height(32.0);
        let block = doc.push_block("p");
        doc.push_text(block, "aaaaaaaaaabbbbbbbbbbccccc ddddd.");

        let extraction = extract_block(&doc, block);
        let range = resolve_range(&extraction.runs, 20, 32).unwrap();
        let mut highlighter = Highlighter::new();
        highlighter.apply(&mut doc, &extraction.runs, &range, false);

        // The highlight starts on the third line (top = 32).
        assert_eq!(doc.scroll_top(), 32.0);
    }
}
