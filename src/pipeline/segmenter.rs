//! Phrase segmentation state machine.
//!
//! Turns a stream of recognition events into finalized phrases:
//!
//! ```text
//! Idle --(non-empty partial)--> Listening
//! Listening --(recognizer final)--> Idle   [emit]
//! Listening --(silence timeout)--> Idle    [emit]
//! Listening --(partial)--> Listening       [reset activity timer]
//! ```
//!
//! The segmenter is pure: it reads time from a [`Clock`] and asks the caller
//! to force a final result when the silence timeout expires.

use crate::clock::Clock;
use crate::config::SegmentationConfig;
use crate::pipeline::types::{Phrase, RecognitionEvent};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub struct SegmenterConfig {
    pub min_phrase_len: usize,
    pub silence_finalize: Duration,
    pub partial_throttle: Duration,
}

impl SegmenterConfig {
    pub fn from_config(config: &SegmentationConfig) -> Self {
        Self {
            min_phrase_len: config.min_phrase_len,
            silence_finalize: config.silence_finalize(),
            partial_throttle: config.partial_throttle(),
        }
    }
}

impl Default for SegmenterConfig {
    fn default() -> Self {
        Self::from_config(&SegmentationConfig::default())
    }
}

/// Per-utterance state, reset on every phrase emission.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SegmentState {
    pub speech_seen: bool,
    /// Text of the last partial that was surfaced.
    pub last_partial_text: String,
    pub last_activity: Option<Instant>,
    pub last_partial_surfaced: Option<Instant>,
}

/// Result of feeding one event to the segmenter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SegmentOutput {
    /// Partial transcript that passed the throttle.
    Partial(String),
    Phrase(Phrase),
    /// Finalized text too short to be a phrase.
    Discarded(String),
}

pub struct Segmenter<C: Clock> {
    config: SegmenterConfig,
    clock: C,
    state: SegmentState,
    sequence: Arc<AtomicU64>,
}

impl<C: Clock> Segmenter<C> {
    pub fn new(config: SegmenterConfig, clock: C) -> Self {
        Self::with_sequence(config, clock, Arc::new(AtomicU64::new(0)))
    }

    /// Share the phrase numbering with other segmenters (e.g. across restarts).
    pub fn with_sequence(config: SegmenterConfig, clock: C, sequence: Arc<AtomicU64>) -> Self {
        Self {
            config,
            clock,
            state: SegmentState::default(),
            sequence,
        }
    }

    pub fn state(&self) -> &SegmentState {
        &self.state
    }

    pub fn is_listening(&self) -> bool {
        self.state.speech_seen
    }

    /// Feed one event.
    ///
    /// `force_final` is called at most once, only when the silence timeout
    /// fires, and must return the recognizer's forced final text.
    pub fn handle(
        &mut self,
        event: RecognitionEvent,
        force_final: impl FnOnce() -> String,
    ) -> Option<SegmentOutput> {
        match event {
            RecognitionEvent::FinalizedBySource(text) => {
                self.state = SegmentState::default();
                self.make_phrase(&text)
            }
            RecognitionEvent::Partial(text) if !text.trim().is_empty() => {
                self.on_partial(text.trim())
            }
            RecognitionEvent::Partial(_) | RecognitionEvent::Silence => {
                self.check_silence(force_final)
            }
        }
    }

    /// Final text read on shutdown; emitted as a last phrase if long enough.
    pub fn flush(&mut self, final_text: String) -> Option<SegmentOutput> {
        self.state = SegmentState::default();
        self.make_phrase(&final_text)
    }

    fn on_partial(&mut self, text: &str) -> Option<SegmentOutput> {
        let now = self.clock.now();
        self.state.speech_seen = true;
        self.state.last_activity = Some(now);

        if text == self.state.last_partial_text {
            return None;
        }
        let window_open = self
            .state
            .last_partial_surfaced
            .is_none_or(|at| now.saturating_duration_since(at) >= self.config.partial_throttle);
        if !window_open {
            return None;
        }

        self.state.last_partial_surfaced = Some(now);
        self.state.last_partial_text = text.to_string();
        Some(SegmentOutput::Partial(text.to_string()))
    }

    fn check_silence(&mut self, force_final: impl FnOnce() -> String) -> Option<SegmentOutput> {
        let last_activity = self.state.last_activity?;
        if !self.state.speech_seen {
            return None;
        }
        let quiet_for = self.clock.now().saturating_duration_since(last_activity);
        if quiet_for < self.config.silence_finalize {
            return None;
        }

        tracing::debug!(?quiet_for, "silence timeout, forcing final result");
        let text = force_final();
        self.state = SegmentState::default();
        self.make_phrase(&text)
    }

    fn make_phrase(&self, text: &str) -> Option<SegmentOutput> {
        let text = text.trim();
        if text.is_empty() {
            return None;
        }
        if text.chars().count() < self.config.min_phrase_len {
            tracing::debug!(text, "phrase below minimum length, discarded");
            return Some(SegmentOutput::Discarded(text.to_string()));
        }
        Some(SegmentOutput::Phrase(Phrase {
            text: text.to_string(),
            sequence: self.sequence.fetch_add(1, Ordering::SeqCst),
        }))
    }
}
