pub mod activity;
#[cfg(feature = "cpal-audio")]
pub mod capture;
pub mod decode;
pub mod device;
pub mod dsp;
pub mod frame;
pub mod frame_queue;
pub mod gate;
pub mod playback;
pub mod recorder;
pub mod wav;
