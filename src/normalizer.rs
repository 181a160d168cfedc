//! Speech normalization for utterance text.
//!
//! Sentences are cleaned just before being handed to the synthesizer:
//! currency literals become words, abbreviations are expanded, whitespace is
//! collapsed. The highlight always anchors to the *unnormalized* sentence's
//! offsets; normalization affects only what is spoken. A sentence that ends
//! up empty or unspeakable maps to `None` and is skipped by the read loop.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::Path;

const DEFAULT_NORMALIZER_PATH: &str = "conf/normalizer.toml";

static RE_CURRENCY_BRL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"R\$\s*(?P<reais>\d+(?:\.\d{3})*)(?:,(?P<cents>\d{2}))?").unwrap()
});
static RE_HORIZONTAL_WS: Lazy<Regex> = Lazy::new(|| Regex::new(r"[ \t\u{00A0}]+").unwrap());
static RE_SPACE_BEFORE_PUNCT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+([,.;:!?])").unwrap());

#[derive(Debug, Clone, Default)]
pub struct SpeechNormalizer {
    config: NormalizerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
struct NormalizerFile {
    normalization: NormalizerConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
struct NormalizerConfig {
    enabled: bool,
    expand_currency: bool,
    collapse_whitespace: bool,
    remove_space_before_punctuation: bool,
    min_sentence_chars: usize,
    require_alphanumeric: bool,
    replacements: BTreeMap<String, String>,
    abbreviations: BTreeMap<String, String>,
}

impl Default for NormalizerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            expand_currency: true,
            collapse_whitespace: true,
            remove_space_before_punctuation: true,
            min_sentence_chars: 1,
            require_alphanumeric: true,
            replacements: BTreeMap::new(),
            abbreviations: default_abbreviations(),
        }
    }
}

impl SpeechNormalizer {
    pub fn load_default() -> Self {
        Self::load(Path::new(DEFAULT_NORMALIZER_PATH))
    }

    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => match toml::from_str::<NormalizerFile>(&contents) {
                Ok(file) => {
                    tracing::info!(path = %path.display(), "Loaded speech normalizer config");
                    Self {
                        config: file.normalization,
                    }
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), "Invalid normalizer config TOML: {err}");
                    Self::default()
                }
            },
            Err(err) => {
                tracing::warn!(path = %path.display(), "Falling back to default normalizer config: {err}");
                Self::default()
            }
        }
    }

    /// Clean one sentence for speech. Returns `None` when nothing speakable
    /// remains, in which case the caller advances without an utterance.
    pub fn normalize(&self, sentence: &str) -> Option<String> {
        if !self.config.enabled {
            return self.finalize(sentence);
        }

        let mut text = sentence.to_string();

        if self.config.expand_currency {
            text = expand_brl_currency(&text);
        }

        if !self.config.abbreviations.is_empty() {
            text = apply_abbreviation_map(&text, &self.config.abbreviations);
        }

        if !self.config.replacements.is_empty() {
            let mut entries: Vec<_> = self.config.replacements.iter().collect();
            entries.sort_by_key(|(from, _)| Reverse(from.len()));
            for (from, to) in entries {
                text = text.replace(from.as_str(), to.as_str());
            }
        }

        if self.config.collapse_whitespace {
            text = RE_HORIZONTAL_WS.replace_all(&text, " ").to_string();
        }

        if self.config.remove_space_before_punctuation {
            text = RE_SPACE_BEFORE_PUNCT.replace_all(&text, "$1").to_string();
        }

        self.finalize(&text)
    }

    fn finalize(&self, text: &str) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return None;
        }
        if self.config.require_alphanumeric && !trimmed.chars().any(|ch| ch.is_alphanumeric()) {
            return None;
        }
        if trimmed.chars().count() < self.config.min_sentence_chars.max(1) {
            return None;
        }
        Some(trimmed.to_string())
    }
}

/// `R$ 10,00` → `10 reais`; `R$ 9,50` → `9 reais e 50 centavos`;
/// `R$ 1,00` → `1 real`. Digits stay digits, only the currency symbol and
/// the cents notation become words.
fn expand_brl_currency(text: &str) -> String {
    RE_CURRENCY_BRL
        .replace_all(text, |caps: &regex::Captures| {
            let reais = caps["reais"].replace('.', "");
            let reais_word = if reais == "1" { "real" } else { "reais" };
            let cents = caps
                .name("cents")
                .map(|m| m.as_str().trim_start_matches('0'))
                .unwrap_or("");
            if cents.is_empty() {
                format!("{reais} {reais_word}")
            } else {
                let cents_word = if cents == "1" { "centavo" } else { "centavos" };
                format!("{reais} {reais_word} e {cents} {cents_word}")
            }
        })
        .to_string()
}

fn default_abbreviations() -> BTreeMap<String, String> {
    let mut map = BTreeMap::new();
    map.insert("Sr.".to_string(), "Senhor".to_string());
    map.insert("Sra.".to_string(), "Senhora".to_string());
    map.insert("Dr.".to_string(), "Doutor".to_string());
    map.insert("Dra.".to_string(), "Doutora".to_string());
    map.insert("Prof.".to_string(), "Professor".to_string());
    map
}

fn apply_abbreviation_map(text: &str, abbreviations: &BTreeMap<String, String>) -> String {
    let mut out = text.to_string();
    let mut entries: Vec<_> = abbreviations.iter().collect();
    entries.sort_by_key(|(token, _)| Reverse(token.len()));

    for (token, replacement) in entries {
        let trimmed = token.trim();
        if trimmed.is_empty() {
            continue;
        }
        let pattern = if let Some(base) = trimmed.strip_suffix('.') {
            format!(r"\b{}\.", regex::escape(base))
        } else {
            format!(r"\b{}\b", regex::escape(trimmed))
        };
        if let Ok(re) = Regex::new(&pattern) {
            out = re.replace_all(&out, replacement.as_str()).to_string();
        }
    }
    out
}
