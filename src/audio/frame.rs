//! Fixed-size capture frames.

use std::time::Instant;

/// One block of mono 16-bit PCM.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    pub samples: Vec<i16>,
    pub sample_rate: u32,
    pub captured_at: Instant,
    pub sequence: u64,
}

impl AudioFrame {
    pub fn duration_ms(&self) -> u32 {
        if self.sample_rate == 0 {
            return 0;
        }
        (self.samples.len() as u64 * 1000 / self.sample_rate as u64) as u32
    }
}

/// Splits an irregular sample stream into frames of exactly `frame_len` samples.
#[derive(Debug)]
pub struct FrameAssembler {
    frame_len: usize,
    sample_rate: u32,
    pending: Vec<i16>,
    next_sequence: u64,
}

impl FrameAssembler {
    pub fn new(sample_rate: u32, frame_ms: u32) -> Self {
        let frame_len = ((sample_rate as u64 * frame_ms as u64) / 1000).max(1) as usize;
        Self {
            frame_len,
            sample_rate,
            pending: Vec::with_capacity(frame_len * 2),
            next_sequence: 0,
        }
    }

    pub fn frame_len(&self) -> usize {
        self.frame_len
    }

    /// Append samples and return every completed frame.
    pub fn push(&mut self, samples: &[i16]) -> Vec<AudioFrame> {
        self.pending.extend_from_slice(samples);
        let mut frames = Vec::new();
        while self.pending.len() >= self.frame_len {
            let rest = self.pending.split_off(self.frame_len);
            let samples = std::mem::replace(&mut self.pending, rest);
            frames.push(AudioFrame {
                samples,
                sample_rate: self.sample_rate,
                captured_at: Instant::now(),
                sequence: self.next_sequence,
            });
            self.next_sequence += 1;
        }
        frames
    }

    /// Drop a partially filled frame, e.g. when capture is suspended.
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}
