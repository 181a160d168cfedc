//! Resume-point location: narrate what the user is looking at.
//!
//! Visibility is advisory and computed once per fresh `start()`; the read
//! loop never re-checks it mid-sentence.

use crate::document::{BlockKind, DocumentTree, Viewport};
use crate::extract::extract_block;
use crate::offsets::{compute_offsets, resolve_range};
use crate::segment::split_sentences;
use tracing::debug;

/// Where narration should begin: indices into the block list and into that
/// block's sentence sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ResumePoint {
    pub block_index: usize,
    pub sentence_index: usize,
}

/// First block intersecting the viewport (block 0 when none does, e.g.
/// before layout has settled), then the first sentence in it with at least
/// one visible rectangle (sentence 0 when none has).
pub fn locate_resume_point<D: DocumentTree + Viewport>(doc: &D) -> ResumePoint {
    let blocks = doc.blocks();
    let (top, bottom) = doc.visible_extent();

    let mut block_index = 0;
    for (index, block) in blocks.iter().enumerate() {
        if let Some(rect) = doc.block_rect(block.node) {
            if rect.intersects_band(top, bottom) {
                block_index = index;
                break;
            }
        }
    }

    let Some(block) = blocks.get(block_index) else {
        return ResumePoint {
            block_index: 0,
            sentence_index: 0,
        };
    };
    if block.kind == BlockKind::Formula {
        return ResumePoint {
            block_index,
            sentence_index: 0,
        };
    }

    let extraction = extract_block(doc, block.node);
    let sentences = split_sentences(&extraction.full_text);
    let offsets = compute_offsets(&extraction.full_text, &sentences);

    let mut sentence_index = 0;
    'sentences: for (index, offset) in offsets.iter().enumerate() {
        let Some((start, end)) = offset else { continue };
        let Some(range) = resolve_range(&extraction.runs, *start, *end) else {
            continue;
        };
        for span in &range.spans {
            let run = &extraction.runs[span.run_index];
            if run.is_substitute {
                continue;
            }
            for rect in doc.leaf_range_rects(run.node, span.range.clone()) {
                if rect.intersects_band(top, bottom) {
                    sentence_index = index;
                    break 'sentences;
                }
            }
        }
    }

    debug!(block_index, sentence_index, "Located resume point");
    ResumePoint {
        block_index,
        sentence_index,
    }
}
