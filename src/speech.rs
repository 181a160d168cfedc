//! Speech-synthesis collaborator seam.
//!
//! The engine never produces audio itself. It submits one utterance at a
//! time to a host-provided synthesizer and is told about completion through
//! [`crate::controller::PlaybackController::utterance_finished`], which the
//! host must call exactly once per utterance.

use crate::cancellation::CancellationToken;
use anyhow::Result;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// One entry of the synthesizer's voice catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Voice {
    pub name: String,
    /// BCP 47 language tag, e.g. `pt-BR`.
    pub language: String,
}

/// Handle identifying a submitted utterance in completion callbacks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct UtteranceId(pub u64);

/// What the read loop hands to the synthesizer.
#[derive(Debug, Clone)]
pub struct UtteranceRequest {
    pub text: String,
    pub voice: Option<Voice>,
    /// Playback rate, already clamped by the controller.
    pub rate: f32,
}

/// Terminal signal for an utterance. `Failed` advances the read loop like
/// `Completed` so narration is never permanently stuck; `Cancelled` never
/// advances.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UtteranceOutcome {
    Completed,
    Failed,
    Cancelled,
}

pub trait SpeechSynthesizer {
    /// Current voice catalog; may be empty until the engine finishes loading.
    fn voices(&self) -> Vec<Voice>;

    /// Submit an utterance. At most one utterance is in flight at any time.
    fn speak(&mut self, request: UtteranceRequest) -> Result<UtteranceId>;

    /// Cancel the active utterance immediately, if any.
    fn cancel(&mut self);
}

/// Preference chain for the narration voice: exact tag match, then primary
/// subtag match, then the first catalog entry.
pub fn choose_voice(voices: &[Voice], preferred: &str) -> Option<Voice> {
    if let Some(exact) = voices.iter().find(|voice| voice.language == preferred) {
        return Some(exact.clone());
    }
    let primary = preferred
        .split_once(['-', '_'])
        .map_or(preferred, |(primary, _)| primary);
    if let Some(subtag) = voices.iter().find(|voice| {
        voice.language == primary || voice.language.starts_with(&format!("{primary}-"))
    }) {
        return Some(subtag.clone());
    }
    voices.first().cloned()
}

/// Poll the voice catalog until it is non-empty, the token is cancelled, or
/// the deadline passes. On expiry the engine proceeds voiceless rather than
/// blocking forever.
pub fn wait_for_voices<S: SpeechSynthesizer>(
    synth: &S,
    token: &CancellationToken,
    poll_interval: Duration,
    deadline: Duration,
) -> Vec<Voice> {
    let started = Instant::now();
    loop {
        let voices = synth.voices();
        if !voices.is_empty() {
            debug!(count = voices.len(), "Voice catalog ready");
            return voices;
        }
        if token.is_cancelled() {
            debug!("Voice wait cancelled");
            return Vec::new();
        }
        let elapsed = started.elapsed();
        if elapsed >= deadline {
            warn!(
                waited_ms = elapsed.as_millis() as u64,
                "Voice catalog never populated; proceeding with the engine default"
            );
            return Vec::new();
        }
        let remaining = deadline - elapsed;
        std::thread::sleep(poll_interval.min(remaining));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Voice> {
        vec![
            Voice {
                name: "Helena".to_string(),
                language: "pt-PT".to_string(),
            },
            Voice {
                name: "Luciana".to_string(),
                language: "pt-BR".to_string(),
            },
            Voice {
                name: "Samantha".to_string(),
                language: "en-US".to_string(),
            },
        ]
    }

    #[test]
    fn prefers_exact_language_match() {
        let voice = choose_voice(&catalog(), "pt-BR").unwrap();
        assert_eq!(voice.name, "Luciana");
    }

    #[test]
    fn falls_back_to_primary_subtag() {
        let voice = choose_voice(&catalog(), "pt-AO").unwrap();
        assert_eq!(voice.name, "Helena");
    }

    #[test]
    fn bare_primary_tag_matches_regional_voice() {
        let voice = choose_voice(&catalog(), "pt").unwrap();
        assert_eq!(voice.name, "Helena");
    }

    #[test]
    fn falls_back_to_first_catalog_entry() {
        let voice = choose_voice(&catalog(), "ja-JP").unwrap();
        assert_eq!(voice.name, "Helena");
    }

    #[test]
    fn empty_catalog_yields_no_voice() {
        assert!(choose_voice(&[], "pt-BR").is_none());
    }

    struct EmptyCatalog;

    impl SpeechSynthesizer for EmptyCatalog {
        fn voices(&self) -> Vec<Voice> {
            Vec::new()
        }

        fn speak(&mut self, _request: UtteranceRequest) -> Result<UtteranceId> {
            unreachable!("never spoken in this test")
        }

        fn cancel(&mut self) {}
    }

    #[test]
    fn wait_gives_up_after_deadline() {
        let token = CancellationToken::new();
        let voices = wait_for_voices(
            &EmptyCatalog,
            &token,
            Duration::from_millis(1),
            Duration::from_millis(5),
        );
        assert!(voices.is_empty());
    }

    #[test]
    fn cancelled_wait_returns_immediately() {
        let token = CancellationToken::new();
        token.cancel();
        let voices = wait_for_voices(
            &EmptyCatalog,
            &token,
            Duration::from_millis(1),
            Duration::from_secs(60),
        );
        assert!(voices.is_empty());
    }
}
