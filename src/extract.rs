//! Text extraction: flatten one block into ordered text runs.
//!
//! Extraction is a pure function of the current tree state and runs again
//! every time playback enters a block, so content that mutated since the
//! last visit never leaves the highlight pointing at stale offsets.

use crate::document::{DocumentTree, NodeId};

/// Spoken in place of a substitute container whose author supplied no
/// description. Never empty, so offset math never degenerates to a
/// zero-length run that cannot be targeted.
pub const SUBSTITUTE_FALLBACK: &str = "no textual description available";

/// One contiguous contribution to a block's flat text: either a literal text
/// leaf or an entire substitute container spoken from its description.
#[derive(Debug, Clone)]
pub struct TextRun {
    /// The source leaf (literal runs) or the substitute container.
    pub node: NodeId,
    pub is_substitute: bool,
    pub spoken: String,
}

/// Result of one extraction pass over a block.
#[derive(Debug, Clone)]
pub struct Extraction {
    pub runs: Vec<TextRun>,
    /// Concatenation of every run's spoken text in document order.
    pub full_text: String,
}

/// Walk the text-bearing leaves under `block` in document order. A leaf
/// inside a substitute container emits one run for the outermost such
/// container (its spoken form, or the fallback placeholder) and suppresses
/// the container's remaining leaves, nested substitutes included; any other
/// leaf emits one literal run.
pub fn extract_block<D: DocumentTree>(doc: &D, block: NodeId) -> Extraction {
    let mut runs: Vec<TextRun> = Vec::new();
    let mut full_text = String::new();
    let mut current_container: Option<NodeId> = None;

    for leaf in doc.text_leaves(block) {
        match doc.substitute_ancestor(leaf) {
            Some(nearest) => {
                // A substitute nested inside another substitute belongs to
                // the enclosing container's single run.
                let mut container = nearest;
                while let Some(outer) = doc.substitute_ancestor(container) {
                    container = outer;
                }
                if current_container == Some(container) {
                    continue;
                }
                current_container = Some(container);
                let spoken = doc
                    .spoken_form(container)
                    .filter(|form| !form.trim().is_empty())
                    .unwrap_or_else(|| SUBSTITUTE_FALLBACK.to_string());
                full_text.push_str(&spoken);
                runs.push(TextRun {
                    node: container,
                    is_substitute: true,
                    spoken,
                });
            }
            None => {
                current_container = None;
                let text = doc.leaf_text(leaf);
                if text.is_empty() {
                    continue;
                }
                full_text.push_str(&text);
                runs.push(TextRun {
                    node: leaf,
                    is_substitute: false,
                    spoken: text,
                });
            }
        }
    }

    tracing::debug!(
        block = block.0,
        runs = runs.len(),
        bytes = full_text.len(),
        "Extracted block text"
    );
    Extraction { runs, full_text }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::document::ArenaDocument;

    #[test]
    fn run_lengths_sum_to_full_text() {
        let mut doc = ArenaDocument::new();
        let block = doc.push_block("p");
        doc.push_text(block, "Veja: ");
        doc.push_substitute(block, "span", Some("x ao quadrado"));
        doc.push_text(block, " é positivo.");

        let extraction = extract_block(&doc, block);
        let total: usize = extraction.runs.iter().map(|run| run.spoken.len()).sum();
        assert_eq!(total, extraction.full_text.len());
    }

    #[test]
    fn substitute_container_is_one_atomic_run() {
        let mut doc = ArenaDocument::new();
        let block = doc.push_block("p");
        doc.push_text(block, "Veja: ");
        let formula = doc.push_substitute(block, "span", Some("x ao quadrado"));
        // Internal leaves contribute nothing, however deeply nested.
        let inner = doc.push_element(formula, "var");
        doc.push_text(inner, "x");
        doc.push_text(formula, "²");
        doc.push_text(block, " é positivo.");

        let extraction = extract_block(&doc, block);
        assert_eq!(extraction.full_text, "Veja: x ao quadrado é positivo.");
        assert_eq!(extraction.runs.len(), 3);
        assert!(extraction.runs[1].is_substitute);
        assert_eq!(extraction.runs[1].spoken, "x ao quadrado");
    }

    #[test]
    fn missing_spoken_form_yields_fallback_not_empty_run() {
        let mut doc = ArenaDocument::new();
        let block = doc.push_block("p");
        let formula = doc.push_substitute(block, "span", None);
        doc.push_text(formula, "x²");

        let extraction = extract_block(&doc, block);
        assert_eq!(extraction.runs.len(), 1);
        assert_eq!(extraction.runs[0].spoken, SUBSTITUTE_FALLBACK);
        assert!(!extraction.full_text.is_empty());
    }

    #[test]
    fn blank_spoken_form_also_falls_back() {
        let mut doc = ArenaDocument::new();
        let block = doc.push_block("p");
        let formula = doc.push_substitute(block, "span", Some("   "));
        doc.push_text(formula, "x²");

        let extraction = extract_block(&doc, block);
        assert_eq!(extraction.runs[0].spoken, SUBSTITUTE_FALLBACK);
    }

    #[test]
    fn nested_substitute_collapses_into_outermost_container() {
        let mut doc = ArenaDocument::new();
        let block = doc.push_block("p");
        doc.push_text(block, "Antes ");
        let outer = doc.push_substitute(block, "span", Some("toda a fórmula"));
        doc.push_text(outer, "f(");
        let inner = doc.push_substitute(outer, "span", Some("x ao quadrado"));
        doc.push_text(inner, "x²");
        doc.push_text(outer, ")");
        doc.push_text(block, " depois.");

        let extraction = extract_block(&doc, block);
        assert_eq!(extraction.full_text, "Antes toda a fórmula depois.");
        assert_eq!(extraction.runs.len(), 3);
        assert!(extraction.runs[1].is_substitute);
        assert_eq!(extraction.runs[1].node, outer);
    }

    #[test]
    fn adjacent_substitute_containers_emit_separate_runs() {
        let mut doc = ArenaDocument::new();
        let block = doc.push_block("p");
        let a = doc.push_substitute(block, "span", Some("alfa"));
        doc.push_text(a, "α");
        let b = doc.push_substitute(block, "span", Some("beta"));
        doc.push_text(b, "β");

        let extraction = extract_block(&doc, block);
        assert_eq!(extraction.full_text, "alfabeta");
        assert_eq!(extraction.runs.len(), 2);
    }
}
