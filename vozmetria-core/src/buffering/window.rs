//! Small fixed-capacity windows.
//!
//! Per-tick state (smoother window, vote buffer) and the rolling analysis
//! window are bounded so tick cost stays O(window) no matter how long a
//! recording runs.

use std::collections::VecDeque;

use super::frame::AudioFrame;

/// Fixed-capacity FIFO. Pushing into a full history evicts the oldest entry.
#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    items: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedHistory<T> {
    /// A capacity of zero is bumped to one.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Append `item`, returning the evicted entry if the history was full.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.items.len() == self.capacity {
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(item);
        evicted
    }

    /// Most recently pushed entry.
    pub fn last(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.items.len() == self.capacity
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

/// Rolling window over the most recent `size` samples of a stream.
#[derive(Debug, Clone)]
pub struct SampleWindow {
    buf: VecDeque<f32>,
    size: usize,
}

impl SampleWindow {
    pub fn new(size: usize) -> Self {
        let size = size.max(1);
        Self {
            buf: VecDeque::with_capacity(size),
            size,
        }
    }

    /// Append samples, discarding the oldest ones beyond the window size.
    pub fn extend(&mut self, samples: &[f32]) {
        let tail = &samples[samples.len().saturating_sub(self.size)..];
        let overflow = (self.buf.len() + tail.len()).saturating_sub(self.size);
        self.buf.drain(..overflow);
        self.buf.extend(tail.iter().copied());
    }

    pub fn is_full(&self) -> bool {
        self.buf.len() == self.size
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn clear(&mut self) {
        self.buf.clear();
    }

    /// Copy the current contents into a frame (oldest sample first).
    pub fn to_frame(&self, sample_rate: u32) -> AudioFrame {
        AudioFrame::new(self.buf.iter().copied().collect(), sample_rate)
    }
}
