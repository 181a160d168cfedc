//! Punctuation-based sentence segmentation.

/// Split flat text into trimmed, non-empty sentences. A boundary sits
/// immediately after `.`, `!`, `?` or `…` when the next character is
/// whitespace; the punctuation stays with the preceding sentence. This is a
/// heuristic, not a grammar: multi-sentence abbreviations are not
/// special-cased.
pub fn split_sentences(full_text: &str) -> Vec<String> {
    let mut sentences = Vec::new();
    let mut start = 0usize;
    let mut chars = full_text.char_indices().peekable();

    while let Some((_, ch)) = chars.next() {
        if matches!(ch, '.' | '!' | '?' | '…') {
            if let Some(&(next_idx, next)) = chars.peek() {
                if next.is_whitespace() {
                    push_trimmed(&mut sentences, &full_text[start..next_idx]);
                    start = next_idx;
                }
            }
        }
    }
    push_trimmed(&mut sentences, &full_text[start..]);
    sentences
}

fn push_trimmed(out: &mut Vec<String>, fragment: &str) {
    let trimmed = fragment.trim();
    if !trimmed.is_empty() {
        out.push(trimmed.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::split_sentences;

    #[test]
    fn splits_on_terminal_punctuation() {
        let sentences = split_sentences("Isso custa R$ 10,00. Obrigado.");
        assert_eq!(sentences, vec!["Isso custa R$ 10,00.", "Obrigado."]);
    }

    #[test]
    fn keeps_punctuation_with_preceding_sentence() {
        let sentences = split_sentences("Sério?! Sim. Claro…");
        assert_eq!(sentences, vec!["Sério?!", "Sim.", "Claro…"]);
    }

    #[test]
    fn punctuation_without_following_whitespace_does_not_split() {
        let sentences = split_sentences("Versão 2.5 do motor.");
        assert_eq!(sentences, vec!["Versão 2.5 do motor."]);
    }

    #[test]
    fn discards_whitespace_only_fragments() {
        let sentences = split_sentences("Primeira.   \n  Segunda!  ");
        assert_eq!(sentences, vec!["Primeira.", "Segunda!"]);
    }

    #[test]
    fn empty_input_yields_no_sentences() {
        assert!(split_sentences("").is_empty());
        assert!(split_sentences("   ").is_empty());
    }

    #[test]
    fn trailing_fragment_without_punctuation_is_kept() {
        let sentences = split_sentences("Uma frase. E um resto sem ponto final");
        assert_eq!(sentences, vec!["Uma frase.", "E um resto sem ponto final"]);
    }
}
