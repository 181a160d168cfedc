//! Read-aloud synchronization engine.
//!
//! `lectern` narrates structured documents sentence by sentence while keeping
//! a visual highlight aligned with the utterance currently being spoken. The
//! engine owns no rendering and no audio: it operates on a document tree and
//! a speech synthesizer supplied by the host through the [`document`] and
//! [`speech`] trait seams, and resumes narration from whatever content is
//! visible in the host viewport.
//!
//! The pipeline per block: [`extract`] flattens the tree into text runs,
//! [`segment`] splits the flat text into sentences, [`offsets`] maps each
//! sentence back onto run positions, [`highlight`] wraps the on-screen range
//! in marker nodes, and [`controller`] drives one utterance at a time through
//! the synthesizer. Extraction is repeated every time playback enters a
//! block, so dynamically re-rendered content never desynchronizes the
//! highlight.

pub mod cancellation;
pub mod config;
pub mod controller;
pub mod document;
pub mod extract;
pub mod highlight;
pub mod normalizer;
pub mod offsets;
pub mod segment;
pub mod speech;
pub mod visibility;

pub use cancellation::CancellationToken;
pub use config::{EngineConfig, MAX_RATE, MIN_RATE};
pub use controller::{PlaybackController, PlaybackState};
pub use document::{ArenaDocument, Block, BlockKind, DocumentTree, MarkerId, NodeId, Rect, Viewport};
pub use extract::{Extraction, TextRun, SUBSTITUTE_FALLBACK};
pub use highlight::Highlighter;
pub use normalizer::SpeechNormalizer;
pub use offsets::{PlayableRange, RunSpan};
pub use speech::{SpeechSynthesizer, UtteranceId, UtteranceOutcome, UtteranceRequest, Voice};
pub use visibility::ResumePoint;

#[cfg(test)]
pub(crate) mod test_support {
    use tracing_subscriber::EnvFilter;

    /// Install a log subscriber for the test run; `RUST_LOG` controls the
    /// filter. Repeated calls are no-ops, only the first one wins.
    pub(crate) fn init_tracing() {
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    }
}
