//! Station that feeds frames to the recognizer and cuts the stream into phrases.

use crate::audio::frame::AudioFrame;
use crate::clock::Clock;
use crate::pipeline::error::StationError;
use crate::pipeline::events::{EngineEvent, EventSink};
use crate::pipeline::segmenter::{SegmentOutput, Segmenter};
use crate::pipeline::station::Station;
use crate::pipeline::types::{Phrase, RecognitionEvent};
use crate::stt::recognizer::StreamingRecognizer;
use std::sync::Arc;

pub struct SegmentationStation {
    recognizer: Box<dyn StreamingRecognizer>,
    segmenter: Segmenter<Arc<dyn Clock>>,
    events: Arc<dyn EventSink>,
    print_partials: bool,
}

impl SegmentationStation {
    pub fn new(
        recognizer: Box<dyn StreamingRecognizer>,
        segmenter: Segmenter<Arc<dyn Clock>>,
        events: Arc<dyn EventSink>,
        print_partials: bool,
    ) -> Self {
        Self {
            recognizer,
            segmenter,
            events,
            print_partials,
        }
    }

    /// Give the recognizer back once the station has stopped.
    pub fn into_recognizer(self) -> Box<dyn StreamingRecognizer> {
        self.recognizer
    }

    fn route(&mut self, output: Option<SegmentOutput>) -> Option<Phrase> {
        match output? {
            SegmentOutput::Partial(text) => {
                if self.print_partials {
                    self.events.emit(EngineEvent::Partial(text));
                }
                None
            }
            SegmentOutput::Phrase(phrase) => {
                self.events.emit(EngineEvent::Phrase(phrase.clone()));
                Some(phrase)
            }
            SegmentOutput::Discarded(_) => None,
        }
    }

    fn handle(&mut self, event: RecognitionEvent) -> Option<Phrase> {
        let recognizer = &mut self.recognizer;
        let output = self.segmenter.handle(event, || recognizer.final_result());
        self.route(output)
    }
}

impl Station for SegmentationStation {
    type Input = AudioFrame;
    type Output = Phrase;

    fn process(&mut self, frame: AudioFrame) -> Result<Option<Phrase>, StationError> {
        let is_final = self
            .recognizer
            .accept(&frame.samples)
            .map_err(|e| StationError::Recoverable(e.to_string()))?;

        let event = if is_final {
            RecognitionEvent::FinalizedBySource(self.recognizer.final_result())
        } else {
            RecognitionEvent::Partial(self.recognizer.partial_result())
        };
        Ok(self.handle(event))
    }

    fn name(&self) -> &'static str {
        "segmentation"
    }

    fn on_idle(&mut self) -> Result<Option<Phrase>, StationError> {
        Ok(self.handle(RecognitionEvent::Silence))
    }

    fn shutdown(&mut self) -> Option<Phrase> {
        let pending = self.recognizer.final_result();
        let output = self.segmenter.flush(pending);
        self.route(output)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::MockClock;
    use crate::pipeline::events::CollectorSink;
    use crate::pipeline::segmenter::SegmenterConfig;
    use crate::stt::recognizer::{ScriptStep, ScriptedRecognizer};
    use std::time::{Duration, Instant};

    fn frame(sequence: u64) -> AudioFrame {
        AudioFrame {
            samples: vec![1000; 1600],
            sample_rate: 16000,
            captured_at: Instant::now(),
            sequence,
        }
    }

    fn station(
        recognizer: ScriptedRecognizer,
        print_partials: bool,
    ) -> (SegmentationStation, Arc<CollectorSink>, Arc<MockClock>) {
        let clock = Arc::new(MockClock::new());
        let sink = Arc::new(CollectorSink::new());
        let config = SegmenterConfig {
            min_phrase_len: 6,
            silence_finalize: Duration::from_millis(800),
            partial_throttle: Duration::ZERO,
        };
        let clock_dyn: Arc<dyn Clock> = clock.clone();
        let station = SegmentationStation::new(
            Box::new(recognizer),
            Segmenter::new(config, clock_dyn),
            sink.clone(),
            print_partials,
        );
        (station, sink, clock)
    }

    #[test]
    fn test_final_on_last_frame_yields_one_phrase() {
        let (mut station, sink, _clock) =
            station(ScriptedRecognizer::speaking(&["hello", "world"]), true);

        assert_eq!(station.process(frame(0)).unwrap(), None);
        let phrase = station.process(frame(1)).unwrap().unwrap();
        assert_eq!(phrase.text, "hello world");

        assert_eq!(sink.partials(), vec!["hello"]);
        assert_eq!(sink.phrases(), vec![phrase]);
    }

    #[test]
    fn test_partials_hidden_unless_enabled() {
        let (mut station, sink, _clock) =
            station(ScriptedRecognizer::speaking(&["hello", "world"]), false);
        station.process(frame(0)).unwrap();
        assert!(sink.partials().is_empty());
    }

    #[test]
    fn test_idle_after_speech_finalizes_via_silence() {
        let recognizer = ScriptedRecognizer::new(vec![ScriptStep::partial("testing one two")]);
        let probe = recognizer.probe();
        let (mut station, sink, clock) = station(recognizer, false);

        station.process(frame(0)).unwrap();
        clock.advance(Duration::from_millis(1000));
        let phrase = station.on_idle().unwrap().unwrap();

        assert_eq!(phrase.text, "testing one two");
        assert_eq!(probe.final_calls(), 1);
        assert_eq!(sink.phrases().len(), 1);
        assert_eq!(station.on_idle().unwrap(), None);
    }

    #[test]
    fn test_recognizer_error_is_recoverable() {
        let recognizer = ScriptedRecognizer::new(vec![ScriptStep::Error("decoder hiccup".into())]);
        let (mut station, _sink, _clock) = station(recognizer, false);
        match station.process(frame(0)) {
            Err(StationError::Recoverable(msg)) => assert!(msg.contains("decoder hiccup")),
            other => panic!("expected recoverable error, got {other:?}"),
        }
    }

    #[test]
    fn test_shutdown_flushes_pending_utterance() {
        let recognizer = ScriptedRecognizer::new(vec![ScriptStep::partial("almost done")]);
        let (mut station, sink, _clock) = station(recognizer, false);
        station.process(frame(0)).unwrap();

        let phrase = station.shutdown().unwrap();
        assert_eq!(phrase.text, "almost done");
        assert_eq!(sink.phrases().len(), 1);
    }

    #[test]
    fn test_short_final_never_leaves_station() {
        let recognizer = ScriptedRecognizer::new(vec![ScriptStep::final_text("ok")]);
        let (mut station, sink, _clock) = station(recognizer, false);
        assert_eq!(station.process(frame(0)).unwrap(), None);
        assert!(sink.phrases().is_empty());
    }
}
