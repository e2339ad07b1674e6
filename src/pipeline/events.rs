//! Observational status channel from the engine to whatever presents it.
//!
//! Sinks never apply backpressure: emitting must not block a pipeline stage.

use crate::pipeline::types::Phrase;
use crossbeam_channel::Sender;
use std::sync::{Arc, Mutex};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    Status(String),
    Partial(String),
    Phrase(Phrase),
    Error { stage: String, message: String },
}

impl EngineEvent {
    pub fn status(message: impl Into<String>) -> Self {
        EngineEvent::Status(message.into())
    }

    pub fn error(stage: &str, message: impl Into<String>) -> Self {
        EngineEvent::Error {
            stage: stage.to_string(),
            message: message.into(),
        }
    }
}

/// Receiver of engine status, partial transcripts, phrases and errors.
pub trait EventSink: Send + Sync {
    fn emit(&self, event: EngineEvent);
}

impl<T: EventSink + ?Sized> EventSink for Arc<T> {
    fn emit(&self, event: EngineEvent) {
        (**self).emit(event)
    }
}

/// Forwards events to `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn emit(&self, event: EngineEvent) {
        match event {
            EngineEvent::Status(message) => tracing::info!("{}", message),
            EngineEvent::Partial(text) => tracing::debug!(partial = %text),
            EngineEvent::Phrase(phrase) => {
                tracing::info!(sequence = phrase.sequence, "phrase: {}", phrase.text)
            }
            EngineEvent::Error { stage, message } => tracing::error!(%stage, "{}", message),
        }
    }
}

/// Hands events to another thread. Events are dropped if the receiver lags.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: Sender<EngineEvent>,
}

impl ChannelSink {
    pub fn new(tx: Sender<EngineEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn emit(&self, event: EngineEvent) {
        if let Err(e) = self.tx.try_send(event) {
            tracing::trace!("status event dropped: {}", e);
        }
    }
}

/// Sink that collects events for later inspection (testing).
#[derive(Debug, Clone, Default)]
pub struct CollectorSink {
    events: Arc<Mutex<Vec<EngineEvent>>>,
}

impl CollectorSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn phrases(&self) -> Vec<Phrase> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Phrase(phrase) => Some(phrase),
                _ => None,
            })
            .collect()
    }

    pub fn partials(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Partial(text) => Some(text),
                _ => None,
            })
            .collect()
    }

    /// `(stage, message)` of every reported error.
    pub fn errors(&self) -> Vec<(String, String)> {
        self.events()
            .into_iter()
            .filter_map(|event| match event {
                EngineEvent::Error { stage, message } => Some((stage, message)),
                _ => None,
            })
            .collect()
    }
}

impl EventSink for CollectorSink {
    fn emit(&self, event: EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crossbeam_channel::bounded;

    #[test]
    fn test_collector_filters_by_kind() {
        let sink = CollectorSink::new();
        sink.emit(EngineEvent::status("listening"));
        sink.emit(EngineEvent::Partial("hel".to_string()));
        sink.emit(EngineEvent::Phrase(Phrase {
            text: "hello world".to_string(),
            sequence: 0,
        }));
        sink.emit(EngineEvent::error("synthesis", "boom"));

        assert_eq!(sink.events().len(), 4);
        assert_eq!(sink.partials(), vec!["hel"]);
        assert_eq!(sink.phrases()[0].text, "hello world");
        assert_eq!(
            sink.errors(),
            vec![("synthesis".to_string(), "boom".to_string())]
        );
    }

    #[test]
    fn test_channel_sink_never_blocks() {
        let (tx, rx) = bounded(1);
        let sink = ChannelSink::new(tx);
        sink.emit(EngineEvent::status("one"));
        sink.emit(EngineEvent::status("two"));
        assert_eq!(rx.try_recv().unwrap(), EngineEvent::status("one"));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_arc_sink_delegates() {
        let collector = Arc::new(CollectorSink::new());
        let sink: Arc<dyn EventSink> = collector.clone();
        sink.emit(EngineEvent::status("ok"));
        assert_eq!(collector.events().len(), 1);
    }

    #[test]
    fn test_log_sink_accepts_every_kind() {
        let sink = LogSink;
        sink.emit(EngineEvent::status("ok"));
        sink.emit(EngineEvent::Partial("p".to_string()));
        sink.emit(EngineEvent::error("capture", "lost device"));
    }
}
