//! Bounded frame queue that never blocks the capture side.
//!
//! When the queue is full the oldest frame is discarded to make room, so the
//! recognizer always sees the most recent audio.

use crate::audio::frame::AudioFrame;
use crossbeam_channel::{Receiver, Sender, bounded};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

/// Result of pushing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushOutcome {
    Queued,
    /// Queued after evicting the oldest frame.
    DroppedOldest,
}

/// Owner of the queue; hands out producer and consumer ends.
#[derive(Debug, Clone)]
pub struct FrameQueue {
    tx: Sender<AudioFrame>,
    rx: Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameQueue {
    pub fn bounded(capacity: usize) -> Self {
        let (tx, rx) = bounded(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicU64::new(0)),
        }
    }

    pub fn producer(&self) -> FrameProducer {
        FrameProducer {
            tx: self.tx.clone(),
            rx: self.rx.clone(),
            dropped: Arc::clone(&self.dropped),
        }
    }

    pub fn receiver(&self) -> Receiver<AudioFrame> {
        self.rx.clone()
    }

    /// Frames evicted since the queue was created.
    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    pub fn len(&self) -> usize {
        self.rx.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rx.is_empty()
    }

    /// Discard everything queued. Returns the number of frames removed.
    pub fn drain(&self) -> usize {
        self.rx.try_iter().count()
    }
}

/// Capture-side handle. `push` never blocks.
///
/// Holds a receiver of its own to evict from, so the channel never
/// disconnects while a producer exists.
#[derive(Debug, Clone)]
pub struct FrameProducer {
    tx: Sender<AudioFrame>,
    rx: Receiver<AudioFrame>,
    dropped: Arc<AtomicU64>,
}

impl FrameProducer {
    pub fn push(&self, frame: AudioFrame) -> PushOutcome {
        let mut frame = frame;
        let mut evicted = false;
        loop {
            match self.tx.try_send(frame) {
                Ok(()) => {
                    return if evicted {
                        PushOutcome::DroppedOldest
                    } else {
                        PushOutcome::Queued
                    };
                }
                Err(full) => {
                    if self.rx.try_recv().is_ok() {
                        self.dropped.fetch_add(1, Ordering::Relaxed);
                        evicted = true;
                    }
                    frame = full.into_inner();
                }
            }
        }
    }
}
