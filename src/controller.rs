//! Playback orchestration: the read loop and its state machine.
//!
//! One controller instance owns the document, the synthesizer handle, the
//! highlight marker set, and the playback cursor. There is at most one
//! utterance in flight; the loop submits a sentence, returns to the host,
//! and continues only when the host reports that utterance's completion via
//! [`PlaybackController::utterance_finished`]. Stale completions (after
//! `stop`, `pause`, or a newer session) are identified by a monotonically
//! increasing request id and dropped.

use crate::cancellation::CancellationToken;
use crate::config::{EngineConfig, MAX_RATE, MIN_RATE};
use crate::document::{BlockKind, DocumentTree, Viewport};
use crate::extract::{SUBSTITUTE_FALLBACK, extract_block};
use crate::highlight::Highlighter;
use crate::normalizer::SpeechNormalizer;
use crate::offsets::{compute_offsets, resolve_range};
use crate::segment::split_sentences;
use crate::speech::{
    SpeechSynthesizer, UtteranceId, UtteranceOutcome, UtteranceRequest, Voice, choose_voice,
    wait_for_voices,
};
use crate::visibility::locate_resume_point;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Externally visible playback status.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Advance {
    NextSentence,
    NextBlock,
}

#[derive(Debug, Clone, Copy)]
struct PendingUtterance {
    request_id: u64,
    utterance: UtteranceId,
    advance: Advance,
}

pub struct PlaybackController<D, S>
where
    D: DocumentTree + Viewport,
    S: SpeechSynthesizer,
{
    doc: D,
    synth: S,
    config: EngineConfig,
    normalizer: SpeechNormalizer,
    highlighter: Highlighter,
    state: PlaybackState,
    block_index: usize,
    sentence_index: usize,
    rate: f32,
    voice: Option<Voice>,
    voices_ready: bool,
    request_id: u64,
    pending: Option<PendingUtterance>,
    teardown: CancellationToken,
}

impl<D, S> PlaybackController<D, S>
where
    D: DocumentTree + Viewport,
    S: SpeechSynthesizer,
{
    pub fn new(doc: D, synth: S, config: EngineConfig) -> Self {
        let rate = config.rate.clamp(MIN_RATE, MAX_RATE);
        PlaybackController {
            doc,
            synth,
            config,
            normalizer: SpeechNormalizer::default(),
            highlighter: Highlighter::new(),
            state: PlaybackState::Stopped,
            block_index: 0,
            sentence_index: 0,
            rate,
            voice: None,
            voices_ready: false,
            request_id: 0,
            pending: None,
            teardown: CancellationToken::new(),
        }
    }

    pub fn with_normalizer(mut self, normalizer: SpeechNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn document(&self) -> &D {
        &self.doc
    }

    pub fn document_mut(&mut self) -> &mut D {
        &mut self.doc
    }

    pub fn synthesizer(&self) -> &S {
        &self.synth
    }

    pub fn synthesizer_mut(&mut self) -> &mut S {
        &mut self.synth
    }

    pub fn status(&self) -> PlaybackState {
        self.state
    }

    /// Current `(block, sentence)` cursor, 0-indexed.
    pub fn cursor(&self) -> (usize, usize) {
        (self.block_index, self.sentence_index)
    }

    pub fn rate(&self) -> f32 {
        self.rate
    }

    /// Clamp and store the playback rate. Applies to future utterances; an
    /// utterance already submitted keeps the rate it was submitted with.
    pub fn set_rate(&mut self, rate: f32) {
        self.rate = rate.clamp(MIN_RATE, MAX_RATE);
        info!(rate = self.rate, "Adjusted narration rate");
    }

    /// Token cancelling the voice-readiness wait when the host tears the
    /// engine down while `start()` is blocked on it.
    pub fn teardown_token(&self) -> CancellationToken {
        self.teardown.clone()
    }

    /// Begin narration from the content currently visible in the viewport.
    /// Any previous session is stopped and settled first.
    pub fn start(&mut self) {
        self.stop();
        self.ensure_voice();
        let resume = locate_resume_point(&self.doc);
        self.block_index = resume.block_index;
        self.sentence_index = resume.sentence_index;
        info!(
            block = self.block_index,
            sentence = self.sentence_index,
            "Starting narration from visible content"
        );
        self.state = PlaybackState::Playing;
        self.step();
    }

    /// Continue from the stored cursor after a pause. From `Stopped` this
    /// behaves as a fresh `start()`.
    pub fn resume(&mut self) {
        match self.state {
            PlaybackState::Paused => {
                debug!(
                    block = self.block_index,
                    sentence = self.sentence_index,
                    "Resuming narration at stored cursor"
                );
                self.state = PlaybackState::Playing;
                self.step();
            }
            PlaybackState::Stopped => self.start(),
            PlaybackState::Playing => {}
        }
    }

    /// Stop speech immediately but keep the cursor and highlight, so
    /// `resume()` re-reads the interrupted sentence from its start.
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.state = PlaybackState::Paused;
        self.pending = None;
        self.synth.cancel();
        info!(
            block = self.block_index,
            sentence = self.sentence_index,
            "Paused narration"
        );
    }

    /// Cancel any in-flight utterance, clear the highlight, reset the cursor
    /// and settle briefly so a late cancellation callback cannot race a
    /// fresh `start()`.
    pub fn stop(&mut self) {
        self.request_id = self.request_id.wrapping_add(1);
        self.pending = None;
        self.synth.cancel();
        self.highlighter.clear(&mut self.doc);
        self.block_index = 0;
        self.sentence_index = 0;
        if self.state != PlaybackState::Stopped {
            info!("Stopped narration");
        }
        self.state = PlaybackState::Stopped;
        if self.config.stop_settle_ms > 0 {
            std::thread::sleep(Duration::from_millis(self.config.stop_settle_ms));
        }
    }

    /// Host-side completion report for a submitted utterance. Must be called
    /// exactly once per utterance; stale or duplicate reports are dropped.
    pub fn utterance_finished(&mut self, utterance: UtteranceId, outcome: UtteranceOutcome) {
        let Some(pending) = self.pending else {
            debug!(utterance = utterance.0, "Ignoring completion with no pending utterance");
            return;
        };
        if pending.utterance != utterance || pending.request_id != self.request_id {
            debug!(
                utterance = utterance.0,
                current = self.request_id,
                "Ignoring stale utterance completion"
            );
            return;
        }
        self.pending = None;
        if self.state != PlaybackState::Playing {
            debug!(state = ?self.state, "Completion outside playback; holding position");
            return;
        }
        match outcome {
            UtteranceOutcome::Cancelled => {
                debug!("Utterance cancelled; holding position");
                return;
            }
            UtteranceOutcome::Failed => {
                // Treated as an implicit completion so narration is never
                // permanently stuck; not retried.
                warn!("Speech engine reported an utterance error; continuing");
            }
            UtteranceOutcome::Completed => {}
        }
        match pending.advance {
            Advance::NextSentence => self.sentence_index += 1,
            Advance::NextBlock => {
                self.block_index += 1;
                self.sentence_index = 0;
            }
        }
        self.step();
    }

    fn ensure_voice(&mut self) {
        if self.voices_ready {
            return;
        }
        let voices = wait_for_voices(
            &self.synth,
            &self.teardown,
            Duration::from_millis(self.config.voice_poll_interval_ms),
            Duration::from_millis(self.config.voice_wait_deadline_ms),
        );
        self.voices_ready = !voices.is_empty();
        self.voice = choose_voice(&voices, &self.config.preferred_language);
        match &self.voice {
            Some(voice) => info!(
                voice = %voice.name,
                language = %voice.language,
                "Selected narration voice"
            ),
            None => warn!("No narration voice available; utterances use the engine default"),
        }
    }

    /// One pass of the read loop: skip forward over empty blocks and
    /// unspeakable sentences until an utterance is submitted or the blocks
    /// are exhausted.
    fn step(&mut self) {
        loop {
            if self.state != PlaybackState::Playing {
                return;
            }
            debug_assert!(self.pending.is_none(), "read loop entered with an utterance in flight");
            if self.pending.is_some() {
                return;
            }

            let blocks = self.doc.blocks();
            let Some(block) = blocks.get(self.block_index).copied() else {
                info!("Narration finished; blocks exhausted");
                self.highlighter.clear(&mut self.doc);
                self.block_index = 0;
                self.sentence_index = 0;
                self.state = PlaybackState::Stopped;
                return;
            };

            match block.kind {
                BlockKind::Formula => {
                    if self.sentence_index > 0 {
                        self.block_index += 1;
                        self.sentence_index = 0;
                        continue;
                    }
                    let text = self
                        .doc
                        .spoken_form(block.node)
                        .filter(|form| !form.trim().is_empty())
                        .unwrap_or_else(|| SUBSTITUTE_FALLBACK.to_string());
                    // Formula blocks are spoken whole and never highlighted.
                    self.highlighter.clear(&mut self.doc);
                    if !self.submit(text, Advance::NextBlock) {
                        self.block_index += 1;
                        self.sentence_index = 0;
                        continue;
                    }
                    return;
                }
                BlockKind::Text => {
                    // Clear before re-extraction so run handles stay valid,
                    // then rebuild runs/sentences/offsets: the content may
                    // have mutated since this block was last visited.
                    self.highlighter.clear(&mut self.doc);
                    let extraction = extract_block(&self.doc, block.node);
                    let sentences = split_sentences(&extraction.full_text);
                    if self.sentence_index >= sentences.len() {
                        if sentences.is_empty() {
                            debug!(block = self.block_index, "Block has no sentences; skipping");
                        }
                        self.block_index += 1;
                        self.sentence_index = 0;
                        continue;
                    }
                    let offsets = compute_offsets(&extraction.full_text, &sentences);
                    let sentence = &sentences[self.sentence_index];
                    let Some((start, end)) = offsets[self.sentence_index] else {
                        debug!(
                            block = self.block_index,
                            sentence = self.sentence_index,
                            "Unresolvable sentence offsets; skipping"
                        );
                        self.sentence_index += 1;
                        continue;
                    };
                    let Some(spoken) = self.normalizer.normalize(sentence) else {
                        debug!(
                            block = self.block_index,
                            sentence = self.sentence_index,
                            "Sentence empty after normalization; skipping"
                        );
                        self.sentence_index += 1;
                        continue;
                    };
                    let Some(range) = resolve_range(&extraction.runs, start, end) else {
                        debug!(
                            block = self.block_index,
                            sentence = self.sentence_index,
                            "Sentence range did not resolve over runs; skipping"
                        );
                        self.sentence_index += 1;
                        continue;
                    };
                    self.highlighter.apply(
                        &mut self.doc,
                        &extraction.runs,
                        &range,
                        self.config.center_highlight,
                    );
                    if !self.submit(spoken, Advance::NextSentence) {
                        self.sentence_index += 1;
                        continue;
                    }
                    return;
                }
            }
        }
    }

    /// Submit one utterance. Returns false when the synthesizer rejected it,
    /// which the loop treats as an implicit completion.
    fn submit(&mut self, text: String, advance: Advance) -> bool {
        self.request_id = self.request_id.wrapping_add(1);
        let request = UtteranceRequest {
            text,
            voice: self.voice.clone(),
            rate: self.rate,
        };
        match self.synth.speak(request) {
            Ok(utterance) => {
                debug!(
                    utterance = utterance.0,
                    request_id = self.request_id,
                    block = self.block_index,
                    sentence = self.sentence_index,
                    "Submitted utterance"
                );
                self.pending = Some(PendingUtterance {
                    request_id: self.request_id,
                    utterance,
                    advance,
                });
                true
            }
            Err(err) => {
                warn!("Speech engine rejected utterance: {err:#}");
                false
            }
        }
    }
}
