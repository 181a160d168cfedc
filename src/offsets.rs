//! Bidirectional mapping between flat spoken text and the run sequence.
//!
//! `compute_offsets` locates each segmented sentence inside the block's flat
//! text; `resolve_range` re-expresses a `[start, end)` span as positions
//! within the original run sequence. Both sides treat failure as "skip this
//! sentence", never as a fatal error.

use crate::extract::TextRun;
use std::ops::Range;

/// A sentence span projected onto one run: byte range within that run's
/// spoken text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSpan {
    pub run_index: usize,
    pub range: Range<usize>,
}

/// A sentence's character span re-expressed over the run sequence. May cover
/// several runs; substitute runs are kept (their length positions the spans
/// that follow) and callers skip them when building highlight geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlayableRange {
    pub spans: Vec<RunSpan>,
}

/// For each sentence in order, find its literal occurrence in `full_text`
/// starting at the cursor left by the previous match. A sentence that cannot
/// be found (segmentation and flat text can disagree after trimming) maps to
/// `None` and must be skipped by the caller, not spoken or highlighted.
pub fn compute_offsets(full_text: &str, sentences: &[String]) -> Vec<Option<(usize, usize)>> {
    let mut offsets = Vec::with_capacity(sentences.len());
    let mut cursor = 0usize;

    for sentence in sentences {
        let found = full_text
            .get(cursor..)
            .and_then(|tail| tail.find(sentence.as_str()));
        match found {
            Some(relative) => {
                let start = cursor + relative;
                let end = start + sentence.len();
                offsets.push(Some((start, end)));
                cursor = end;
            }
            None => {
                tracing::debug!(
                    cursor,
                    sentence_bytes = sentence.len(),
                    "Sentence not found in flat text; marking unresolvable"
                );
                offsets.push(None);
            }
        }
    }
    offsets
}

/// Walk `runs` accumulating a length cursor and carve `[start, end)` into
/// per-run spans. Every run consumes its full spoken length, substitute or
/// not, so offsets of later literal runs stay correct. Returns `None` when
/// the runs are exhausted before the range closes.
pub fn resolve_range(runs: &[TextRun], start: usize, end: usize) -> Option<PlayableRange> {
    if end <= start {
        return None;
    }
    let mut spans = Vec::new();
    let mut cursor = 0usize;

    for (run_index, run) in runs.iter().enumerate() {
        let run_start = cursor;
        let run_end = cursor + run.spoken.len();
        if run_end > start && run_start < end {
            let from = start.saturating_sub(run_start);
            let to = (end - run_start).min(run.spoken.len());
            spans.push(RunSpan {
                run_index,
                range: from..to,
            });
        }
        if run_end >= end {
            return if spans.is_empty() {
                None
            } else {
                Some(PlayableRange { spans })
            };
        }
        cursor = run_end;
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::split_sentences;

    fn literal(text: &str) -> TextRun {
        TextRun {
            node: crate::document::NodeId(0),
            is_substitute: false,
            spoken: text.to_string(),
        }
    }

    fn substitute(text: &str) -> TextRun {
        TextRun {
            node: crate::document::NodeId(1),
            is_substitute: true,
            spoken: text.to_string(),
        }
    }

    #[test]
    fn offsets_are_monotone_and_non_overlapping() {
        let full_text = "Primeira frase. Segunda frase! Terceira?";
        let sentences = split_sentences(full_text);
        let offsets = compute_offsets(full_text, &sentences);

        let resolved: Vec<_> = offsets.into_iter().flatten().collect();
        assert_eq!(resolved.len(), 3);
        for pair in resolved.windows(2) {
            assert!(pair[0].1 <= pair[1].0);
        }
        for (i, (start, end)) in resolved.iter().enumerate() {
            assert_eq!(&full_text[*start..*end], sentences[i]);
        }
    }

    #[test]
    fn missing_sentence_maps_to_none_without_moving_cursor() {
        let full_text = "Um dois três.";
        let sentences = vec!["inexistente.".to_string(), "Um dois três.".to_string()];
        let offsets = compute_offsets(full_text, &sentences);
        assert_eq!(offsets[0], None);
        assert_eq!(offsets[1], Some((0, full_text.len())));
    }

    #[test]
    fn every_resolved_sentence_survives_the_round_trip() {
        let runs = vec![literal("Veja: "), substitute("x ao quadrado"), literal(" é positivo.")];
        let full_text: String = runs.iter().map(|run| run.spoken.as_str()).collect();
        let sentences = split_sentences(&full_text);
        let offsets = compute_offsets(&full_text, &sentences);
        for offset in offsets.into_iter().flatten() {
            assert!(resolve_range(&runs, offset.0, offset.1).is_some());
        }
    }

    #[test]
    fn range_spanning_substitute_keeps_later_offsets_correct() {
        let runs = vec![literal("Veja: "), substitute("x ao quadrado"), literal(" é positivo.")];
        // " é positivo." starts after 6 + 13 bytes of spoken text.
        let start = 6 + 13;
        let end = start + " é positivo.".len();
        let range = resolve_range(&runs, start, end).unwrap();
        assert_eq!(range.spans.len(), 1);
        assert_eq!(range.spans[0].run_index, 2);
        assert_eq!(range.spans[0].range, 0.." é positivo.".len());
    }

    #[test]
    fn range_covering_all_runs_produces_spans_in_order() {
        let runs = vec![literal("abc"), substitute("defg"), literal("hij")];
        let range = resolve_range(&runs, 1, 9).unwrap();
        assert_eq!(
            range.spans,
            vec![
                RunSpan { run_index: 0, range: 1..3 },
                RunSpan { run_index: 1, range: 0..4 },
                RunSpan { run_index: 2, range: 0..2 },
            ]
        );
    }

    #[test]
    fn range_past_the_end_is_unresolvable() {
        let runs = vec![literal("abc")];
        assert!(resolve_range(&runs, 0, 4).is_none());
        assert!(resolve_range(&runs, 2, 2).is_none());
    }
}
