//! Real audio capture using CPAL (Cross-Platform Audio Library).

use crate::audio::dsp;
use crate::audio::recorder::{AudioSource, AudioSourceConfig};
use crate::error::{Result, RevoiceError};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use crossbeam_channel::{Receiver, Sender};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

/// Chunks buffered between the device callback and `read_samples`.
///
/// Callbacks arrive every few milliseconds; this covers several seconds
/// of reader stall before chunks are dropped.
const CALLBACK_CHANNEL_CAPACITY: usize = 512;

/// Run a closure with stderr temporarily redirected to /dev/null.
///
/// This suppresses noisy ALSA/JACK/PipeWire messages that CPAL triggers
/// when probing audio backends.
///
/// # Safety
/// Uses `libc::dup`/`libc::dup2` to save and restore file descriptor 2 (stderr).
/// Safe as long as no other thread is concurrently manipulating fd 2.
fn with_suppressed_stderr<F, R>(f: F) -> R
where
    F: FnOnce() -> R,
{
    unsafe {
        let saved_fd = libc::dup(2);
        let devnull = libc::open(c"/dev/null".as_ptr(), libc::O_WRONLY);
        if saved_fd >= 0 && devnull >= 0 {
            libc::dup2(devnull, 2);
            libc::close(devnull);
        }

        let result = f();

        if saved_fd >= 0 {
            libc::dup2(saved_fd, 2);
            libc::close(saved_fd);
        }

        result
    }
}

/// Suppress noisy JACK/ALSA error messages that occur during audio backend probing.
///
/// # Safety
/// This modifies environment variables which is safe when called before spawning threads.
pub fn suppress_audio_warnings() {
    // SAFETY: Called at startup before any threads are spawned
    unsafe {
        std::env::set_var("JACK_NO_START_SERVER", "1");
        std::env::set_var("JACK_NO_AUDIO_RESERVATION", "1");
        std::env::set_var("PIPEWIRE_DEBUG", "0");
        std::env::set_var("ALSA_DEBUG", "0");
        std::env::set_var("PW_LOG", "0");
    }
}

/// Preferred device names for PipeWire/PulseAudio environments.
const PREFERRED_DEVICES: &[&str] = &["pipewire", "pulse", "PulseAudio"];

/// Device name patterns that are never useful as a microphone.
const FILTERED_PATTERNS: &[&str] = &[
    "surround",
    "front:",
    "rear:",
    "center:",
    "side:",
    "Digital Output",
    "HDMI",
    "S/PDIF",
];

fn should_filter_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    FILTERED_PATTERNS
        .iter()
        .any(|pattern| lower.contains(&pattern.to_lowercase()))
}

fn is_preferred_device(name: &str) -> bool {
    let lower = name.to_lowercase();
    PREFERRED_DEVICES
        .iter()
        .any(|pref| lower.contains(&pref.to_lowercase()))
}

/// List audio input devices, marking PipeWire/PulseAudio as "\[recommended\]".
///
/// Filters out obviously unusable devices (surround channels, HDMI, etc.).
pub fn list_input_devices() -> Result<Vec<String>> {
    let (host, devices) = with_suppressed_stderr(|| {
        let host = cpal::default_host();
        let devices = host.input_devices();
        (host, devices)
    });
    let _ = host; // keep host alive while iterating devices
    let devices = devices.map_err(|e| RevoiceError::AudioCapture {
        message: format!("Failed to enumerate input devices: {}", e),
    })?;

    let mut device_names = Vec::new();
    for device in devices {
        if let Ok(name) = device.name() {
            if should_filter_device(&name) {
                continue;
            }
            if is_preferred_device(&name) {
                device_names.push(format!("{} [recommended]", name));
            } else {
                device_names.push(name);
            }
        }
    }

    Ok(device_names)
}

/// Pick PipeWire, then PulseAudio, then the system default input.
fn get_best_default_device() -> Result<cpal::Device> {
    with_suppressed_stderr(|| {
        let host = cpal::default_host();

        if let Ok(devices) = host.input_devices() {
            for device in devices {
                if let Ok(name) = device.name()
                    && is_preferred_device(&name)
                {
                    return Ok(device);
                }
            }
        }

        host.default_input_device()
            .ok_or_else(|| RevoiceError::AudioDeviceNotFound {
                device: "default".to_string(),
            })
    })
}

/// Wrapper for cpal::Stream to make it Send.
///
/// SAFETY: the stream is only touched through the Mutex in CpalAudioSource,
/// from one thread at a time.
struct SendableStream(cpal::Stream);

unsafe impl Send for SendableStream {}

/// Real audio capture implementation using CPAL.
///
/// Captures 16-bit mono PCM at the configured rate. Tries the preferred
/// format first (i16, then f32), then falls back to the device's default
/// config with software downmix and resampling.
///
/// The data callback only performs a non-blocking `try_send`; `read_samples`
/// drains whatever has arrived.
pub struct CpalAudioSource {
    device: cpal::Device,
    stream: Arc<Mutex<Option<SendableStream>>>,
    chunk_tx: Sender<Vec<i16>>,
    chunk_rx: Receiver<Vec<i16>>,
    callback_count: Arc<AtomicU64>,
    overruns: Arc<AtomicU64>,
    sample_rate: u32,
    channels: u16,
}

impl CpalAudioSource {
    /// Open the named input device, or the best default when `config.device` is None.
    pub fn new(config: &AudioSourceConfig) -> Result<Self> {
        let device = with_suppressed_stderr(|| {
            let host = cpal::default_host();

            if let Some(name) = config.device.as_deref() {
                let devices = host
                    .input_devices()
                    .map_err(|e| RevoiceError::AudioCapture {
                        message: format!("Failed to enumerate devices: {}", e),
                    })?;

                let wanted = name.trim_end_matches(" [recommended]");
                let mut found_device = None;
                for dev in devices {
                    if let Ok(dev_name) = dev.name()
                        && dev_name == wanted
                    {
                        found_device = Some(dev);
                        break;
                    }
                }

                found_device.ok_or_else(|| RevoiceError::AudioDeviceNotFound {
                    device: name.to_string(),
                })
            } else {
                get_best_default_device()
            }
        })?;

        let (chunk_tx, chunk_rx) = crossbeam_channel::bounded(CALLBACK_CHANNEL_CAPACITY);

        Ok(Self {
            device,
            stream: Arc::new(Mutex::new(None)),
            chunk_tx,
            chunk_rx,
            callback_count: Arc::new(AtomicU64::new(0)),
            overruns: Arc::new(AtomicU64::new(0)),
            sample_rate: config.sample_rate,
            channels: config.channels.max(1),
        })
    }

    /// Chunks dropped because the reader fell behind.
    pub fn overruns(&self) -> u64 {
        self.overruns.load(Ordering::Relaxed)
    }

    fn deliver(tx: &Sender<Vec<i16>>, overruns: &AtomicU64, chunk: Vec<i16>) {
        if tx.try_send(chunk).is_err() {
            overruns.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Build the stream at the configured rate.
    ///
    /// Tries in order:
    /// 1. i16 at the configured rate and channel count
    /// 2. f32 at the configured rate and channel count
    /// 3. Device default config with software conversion
    fn build_stream(&self) -> Result<cpal::Stream> {
        let preferred_config = cpal::StreamConfig {
            channels: self.channels,
            sample_rate: cpal::SampleRate(self.sample_rate),
            buffer_size: cpal::BufferSize::Default,
        };
        let channels = self.channels as usize;

        let err_callback = |err| {
            tracing::error!("audio input stream error: {}", err);
        };

        let tx = self.chunk_tx.clone();
        let counter = Arc::clone(&self.callback_count);
        let overruns = Arc::clone(&self.overruns);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[i16], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                let mono = downmix_i16(data, channels);
                Self::deliver(&tx, &overruns, mono);
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        let tx = self.chunk_tx.clone();
        let counter = Arc::clone(&self.callback_count);
        let overruns = Arc::clone(&self.overruns);
        if let Ok(stream) = self.device.build_input_stream(
            &preferred_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                counter.fetch_add(1, Ordering::Relaxed);
                let i16_data = dsp::to_i16(data);
                Self::deliver(&tx, &overruns, downmix_i16(&i16_data, channels));
            },
            err_callback,
            None,
        ) {
            return Ok(stream);
        }

        self.build_stream_native()
    }

    /// Build a stream using the device's native config, converting in software.
    fn build_stream_native(&self) -> Result<cpal::Stream> {
        use cpal::SampleFormat;

        let default_config =
            self.device
                .default_input_config()
                .map_err(|e| RevoiceError::AudioCapture {
                    message: format!("Failed to query default input config: {}", e),
                })?;

        let native_rate = default_config.sample_rate().0;
        let native_channels = default_config.channels() as usize;
        let target_rate = self.sample_rate;

        let stream_config: cpal::StreamConfig = default_config.clone().into();

        tracing::info!(
            channels = native_channels,
            rate = native_rate,
            format = ?default_config.sample_format(),
            "using native input format, converting in software"
        );

        let err_callback = |err| {
            tracing::error!("audio input stream error: {}", err);
        };

        let tx = self.chunk_tx.clone();
        let counter = Arc::clone(&self.callback_count);
        let overruns = Arc::clone(&self.overruns);

        match default_config.sample_format() {
            SampleFormat::I16 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[i16], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let converted =
                            convert_to_mono_i16(data, native_channels, native_rate, target_rate);
                        Self::deliver(&tx, &overruns, converted);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| RevoiceError::AudioCapture {
                    message: format!("Failed to build native i16 stream: {}", e),
                }),
            SampleFormat::F32 => self
                .device
                .build_input_stream(
                    &stream_config,
                    move |data: &[f32], _: &cpal::InputCallbackInfo| {
                        counter.fetch_add(1, Ordering::Relaxed);
                        let i16_data = dsp::to_i16(data);
                        let converted = convert_to_mono_i16(
                            &i16_data,
                            native_channels,
                            native_rate,
                            target_rate,
                        );
                        Self::deliver(&tx, &overruns, converted);
                    },
                    err_callback,
                    None,
                )
                .map_err(|e| RevoiceError::AudioCapture {
                    message: format!("Failed to build native f32 stream: {}", e),
                }),
            fmt => Err(RevoiceError::AudioCapture {
                message: format!(
                    "Unsupported native sample format: {:?}. \
                     Try specifying a device with --input-device.",
                    fmt
                ),
            }),
        }
    }

    fn drain_pending(&self) {
        while self.chunk_rx.try_recv().is_ok() {}
    }
}

fn downmix_i16(samples: &[i16], channels: usize) -> Vec<i16> {
    if channels <= 1 {
        return samples.to_vec();
    }
    samples
        .chunks_exact(channels)
        .map(|frame| {
            let sum: i32 = frame.iter().map(|&s| s as i32).sum();
            (sum / channels as i32) as i16
        })
        .collect()
}

/// Mix multi-channel audio to mono and resample to the target rate.
fn convert_to_mono_i16(
    samples: &[i16],
    channels: usize,
    source_rate: u32,
    target_rate: u32,
) -> Vec<i16> {
    let mono = downmix_i16(samples, channels);
    if source_rate == target_rate {
        mono
    } else {
        dsp::resample_i16(&mono, source_rate, target_rate)
    }
}

impl AudioSource for CpalAudioSource {
    fn start(&mut self) -> Result<()> {
        {
            let stream_guard = self.stream.lock().map_err(|e| RevoiceError::AudioCapture {
                message: format!("Failed to lock stream: {}", e),
            })?;
            if stream_guard.is_some() {
                return Ok(());
            }
        }

        let stream = self.build_stream()?;
        stream.play().map_err(|e| RevoiceError::AudioCapture {
            message: format!("Failed to start audio stream: {}", e),
        })?;

        // Some PipeWire-ALSA setups accept non-native configs but never fire the callback.
        std::thread::sleep(std::time::Duration::from_millis(200));

        let final_stream = if self.callback_count.load(Ordering::Relaxed) == 0 {
            drop(stream);
            self.drain_pending();

            let native_stream = self.build_stream_native()?;
            native_stream
                .play()
                .map_err(|e| RevoiceError::AudioCapture {
                    message: format!("Failed to start native audio stream: {}", e),
                })?;
            native_stream
        } else {
            stream
        };

        let mut stream_guard = self.stream.lock().map_err(|e| RevoiceError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;
        *stream_guard = Some(SendableStream(final_stream));
        Ok(())
    }

    fn stop(&mut self) -> Result<()> {
        let mut stream_guard = self.stream.lock().map_err(|e| RevoiceError::AudioCapture {
            message: format!("Failed to lock stream: {}", e),
        })?;

        if let Some(sendable_stream) = stream_guard.take() {
            sendable_stream
                .0
                .pause()
                .map_err(|e| RevoiceError::AudioCapture {
                    message: format!("Failed to stop audio stream: {}", e),
                })?;
        }
        drop(stream_guard);
        self.drain_pending();
        Ok(())
    }

    fn read_samples(&mut self) -> Result<Vec<i16>> {
        let mut samples = Vec::new();
        for chunk in self.chunk_rx.try_iter() {
            samples.extend_from_slice(&chunk);
        }
        Ok(samples)
    }
}
