//! Live voice replacement pipeline.
//!
//! Three stages run concurrently, each in its own thread: the frame source
//! (capture), segmentation (recognition into phrases) and synthesis
//! (text-to-speech and playback). They communicate only through the frame
//! queue, the phrase queue and the shared stop and ducking signals.

pub mod cache;
pub mod controller;
pub mod ducking;
pub mod engine;
pub mod error;
pub mod events;
pub mod frame_source;
pub mod segmentation_station;
pub mod segmenter;
pub mod signal;
pub mod station;
pub mod synthesis_station;
pub mod types;

pub use cache::ArtifactCache;
pub use controller::{ControllerConfig, CycleOptions, SynthesisController};
pub use ducking::{CaptureControl, DuckGuard, DuckingState};
pub use engine::{StopReport, VoiceEngine};
pub use error::{ErrorReporter, LogReporter, SinkReporter, StationError};
pub use events::{ChannelSink, CollectorSink, EngineEvent, EventSink, LogSink};
pub use frame_source::{CaptureHandle, FrameSource, FrameSourceConfig};
pub use segmentation_station::SegmentationStation;
pub use segmenter::{SegmentOutput, SegmentState, Segmenter, SegmenterConfig};
pub use signal::StopSignal;
pub use station::{Station, StationRunner};
pub use synthesis_station::SynthesisStation;
pub use types::{AudioClip, EngineState, Phrase, RecognitionEvent, SynthesisJob};
