//! Rolling window of frame times.

use std::collections::VecDeque;

/// Fixed-capacity window of the most recent frame times in milliseconds.
#[derive(Debug, Clone)]
pub struct FrameHistory {
    samples: VecDeque<f32>,
    capacity: usize,
    sum: f64,
}

impl FrameHistory {
    /// A window holding at most `capacity` samples (minimum 1).
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            samples: VecDeque::with_capacity(capacity),
            capacity,
            sum: 0.0,
        }
    }

    /// Append a sample, evicting the oldest when full. Non-finite and
    /// negative samples are ignored.
    pub fn push(&mut self, frame_ms: f32) {
        if !frame_ms.is_finite() || frame_ms < 0.0 {
            return;
        }
        if self.samples.len() == self.capacity
            && let Some(old) = self.samples.pop_front()
        {
            self.sum -= f64::from(old);
        }
        self.samples.push_back(frame_ms);
        self.sum += f64::from(frame_ms);
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.samples.len() == self.capacity
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn last(&self) -> Option<f32> {
        self.samples.back().copied()
    }

    /// Mean frame time, or `None` when empty.
    pub fn average_ms(&self) -> Option<f32> {
        if self.samples.is_empty() {
            None
        } else {
            Some((self.sum / self.samples.len() as f64) as f32)
        }
    }

    /// Frames per second implied by the mean frame time.
    pub fn average_fps(&self) -> Option<f32> {
        self.average_ms()
            .map(|ms| if ms > 0.0 { 1000.0 / ms } else { f32::INFINITY })
    }

    pub fn clear(&mut self) {
        self.samples.clear();
        self.sum = 0.0;
    }
}
