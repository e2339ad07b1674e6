use crate::error::{Result, RevoiceError};
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// Trait for streaming speech recognizers.
///
/// Audio is pushed frame by frame. The recognizer keeps an in-progress
/// hypothesis for the current utterance until it is finalized.
pub trait StreamingRecognizer: Send {
    /// Feed 16-bit mono PCM.
    ///
    /// # Returns
    /// `true` when the recognizer has decided the utterance is complete;
    /// `final_result` then returns its text.
    fn accept(&mut self, samples: &[i16]) -> Result<bool>;

    /// Current hypothesis for the in-progress utterance (may be empty).
    fn partial_result(&mut self) -> String;

    /// Finalize the current utterance and return its text.
    ///
    /// Can be forced mid-utterance. Clears the recognizer's utterance state.
    fn final_result(&mut self) -> String;

    /// Get the name of the loaded model
    fn name(&self) -> &str;
}

impl<T: StreamingRecognizer + ?Sized> StreamingRecognizer for Box<T> {
    fn accept(&mut self, samples: &[i16]) -> Result<bool> {
        (**self).accept(samples)
    }

    fn partial_result(&mut self) -> String {
        (**self).partial_result()
    }

    fn final_result(&mut self) -> String {
        (**self).final_result()
    }

    fn name(&self) -> &str {
        (**self).name()
    }
}

/// One scripted reaction of [`ScriptedRecognizer`] to an accepted frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Hypothesis grows to this text.
    Partial(String),
    /// Utterance complete with this text (`accept` returns true).
    Final(String),
    /// No new words; the partial reads empty but pending text is kept.
    Silence,
    /// `accept` fails.
    Error(String),
}

impl ScriptStep {
    pub fn partial(text: &str) -> Self {
        ScriptStep::Partial(text.to_string())
    }

    pub fn final_text(text: &str) -> Self {
        ScriptStep::Final(text.to_string())
    }
}

/// Counters shared between a [`ScriptedRecognizer`] and the test driving it.
#[derive(Debug, Clone, Default)]
pub struct RecognizerProbe {
    accepted: Arc<AtomicUsize>,
    finals: Arc<AtomicUsize>,
}

impl RecognizerProbe {
    /// Frames passed to `accept`.
    pub fn accepted(&self) -> usize {
        self.accepted.load(Ordering::SeqCst)
    }

    /// Calls to `final_result`.
    pub fn final_calls(&self) -> usize {
        self.finals.load(Ordering::SeqCst)
    }
}

/// Mock recognizer that replays a script, one step per accepted frame.
///
/// Once the script runs out every further frame behaves like [`ScriptStep::Silence`].
#[derive(Debug, Clone)]
pub struct ScriptedRecognizer {
    name: String,
    script: VecDeque<ScriptStep>,
    partial: String,
    pending: String,
    finalized: Option<String>,
    probe: RecognizerProbe,
}

impl ScriptedRecognizer {
    pub fn new(steps: Vec<ScriptStep>) -> Self {
        Self {
            name: "scripted".to_string(),
            script: steps.into(),
            partial: String::new(),
            pending: String::new(),
            finalized: None,
            probe: RecognizerProbe::default(),
        }
    }

    /// Script that builds `words` up one partial per frame and finalizes on the last frame.
    pub fn speaking(words: &[&str]) -> Self {
        let mut steps = Vec::new();
        for i in 1..words.len() {
            steps.push(ScriptStep::Partial(words[..i].join(" ")));
        }
        steps.push(ScriptStep::Final(words.join(" ")));
        Self::new(steps)
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = name.to_string();
        self
    }

    pub fn probe(&self) -> RecognizerProbe {
        self.probe.clone()
    }
}

impl StreamingRecognizer for ScriptedRecognizer {
    fn accept(&mut self, _samples: &[i16]) -> Result<bool> {
        self.probe.accepted.fetch_add(1, Ordering::SeqCst);
        match self.script.pop_front().unwrap_or(ScriptStep::Silence) {
            ScriptStep::Partial(text) => {
                self.partial = text.clone();
                self.pending = text;
                Ok(false)
            }
            ScriptStep::Final(text) => {
                self.partial.clear();
                self.pending.clear();
                self.finalized = Some(text);
                Ok(true)
            }
            ScriptStep::Silence => {
                self.partial.clear();
                Ok(false)
            }
            ScriptStep::Error(message) => Err(RevoiceError::Recognition { message }),
        }
    }

    fn partial_result(&mut self) -> String {
        self.partial.clone()
    }

    fn final_result(&mut self) -> String {
        self.probe.finals.fetch_add(1, Ordering::SeqCst);
        self.partial.clear();
        match self.finalized.take() {
            Some(text) => {
                self.pending.clear();
                text
            }
            None => std::mem::take(&mut self.pending),
        }
    }

    fn name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_speaking_script_builds_partials() {
        let mut recognizer = ScriptedRecognizer::speaking(&["hello", "there", "world"]);
        assert!(!recognizer.accept(&[0; 10]).unwrap());
        assert_eq!(recognizer.partial_result(), "hello");
        assert!(!recognizer.accept(&[0; 10]).unwrap());
        assert_eq!(recognizer.partial_result(), "hello there");
        assert!(recognizer.accept(&[0; 10]).unwrap());
        assert_eq!(recognizer.final_result(), "hello there world");
        assert_eq!(recognizer.final_result(), "");
    }

    #[test]
    fn test_silence_keeps_pending_text() {
        let mut recognizer =
            ScriptedRecognizer::new(vec![ScriptStep::partial("good morning"), ScriptStep::Silence]);
        recognizer.accept(&[]).unwrap();
        recognizer.accept(&[]).unwrap();
        assert_eq!(recognizer.partial_result(), "");
        assert_eq!(recognizer.final_result(), "good morning");
    }

    #[test]
    fn test_exhausted_script_is_silence() {
        let mut recognizer = ScriptedRecognizer::new(vec![]);
        assert!(!recognizer.accept(&[]).unwrap());
        assert_eq!(recognizer.partial_result(), "");
    }

    #[test]
    fn test_error_step() {
        let mut recognizer = ScriptedRecognizer::new(vec![ScriptStep::Error("boom".to_string())]);
        assert!(matches!(
            recognizer.accept(&[]),
            Err(RevoiceError::Recognition { .. })
        ));
    }

    #[test]
    fn test_probe_counts() {
        let mut recognizer = ScriptedRecognizer::speaking(&["a", "b"]);
        let probe = recognizer.probe();
        recognizer.accept(&[]).unwrap();
        recognizer.accept(&[]).unwrap();
        recognizer.final_result();
        assert_eq!(probe.accepted(), 2);
        assert_eq!(probe.final_calls(), 1);
    }

    #[test]
    fn test_boxed_recognizer_delegates() {
        let mut boxed: Box<dyn StreamingRecognizer> =
            Box::new(ScriptedRecognizer::new(vec![]).with_name("boxed"));
        assert_eq!(boxed.name(), "boxed");
        assert!(!boxed.accept(&[1, 2, 3]).unwrap());
    }
}
