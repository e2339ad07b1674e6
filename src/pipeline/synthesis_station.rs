use crate::pipeline::controller::SynthesisController;
use crate::pipeline::error::StationError;
use crate::pipeline::events::{EngineEvent, EventSink};
use crate::pipeline::signal::StopSignal;
use crate::pipeline::station::Station;
use crate::pipeline::types::{Phrase, SynthesisJob};
use crate::tts::synthesizer::VoiceParams;
use std::sync::Arc;

/// Terminal station: turns each phrase into played-back synthesized speech.
pub struct SynthesisStation {
    controller: Arc<SynthesisController>,
    voice: VoiceParams,
    gain_db: f32,
    stop: StopSignal,
    events: Arc<dyn EventSink>,
}

impl SynthesisStation {
    pub fn new(
        controller: Arc<SynthesisController>,
        voice: VoiceParams,
        gain_db: f32,
        stop: StopSignal,
        events: Arc<dyn EventSink>,
    ) -> Self {
        Self {
            controller,
            voice,
            gain_db,
            stop,
            events,
        }
    }
}

impl Station for SynthesisStation {
    type Input = Phrase;
    type Output = ();

    fn process(&mut self, phrase: Phrase) -> Result<Option<()>, StationError> {
        // A phrase flushed during shutdown may still arrive here
        if self.stop.is_raised() {
            tracing::debug!(sequence = phrase.sequence, "stopping, phrase not synthesized");
            return Ok(None);
        }

        let sequence = phrase.sequence;
        let job = SynthesisJob {
            phrase,
            voice: self.voice.clone(),
            gain_db: self.gain_db,
        };
        match self.controller.process_job(&job) {
            Ok(_) => {
                if !self.stop.is_raised() {
                    self.events.emit(EngineEvent::status("Listening"));
                }
                Ok(None)
            }
            Err(e) => Err(StationError::Recoverable(format!(
                "phrase {} dropped: {}",
                sequence, e
            ))),
        }
    }

    fn name(&self) -> &'static str {
        "synthesis"
    }
}
