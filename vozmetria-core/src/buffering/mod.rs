//! Frame buffering between the sample source and the analysis tick.
//!
//! Raw samples travel from the host's source thread to the pipeline through a
//! `ringbuf::HeapRb<f32>`, whose `push_slice` is wait-free. The pipeline keeps
//! the most recent analysis window in a [`window::SampleWindow`] and hands
//! ready-made [`frame::AudioFrame`]s to the analyzer.

pub mod frame;
pub mod window;

use ringbuf::{traits::Split, HeapRb};

pub use ringbuf::traits::{Consumer, Observer, Producer};

/// Type alias for the producer half, held by the source thread.
pub type SampleProducer = ringbuf::HeapProd<f32>;

/// Type alias for the consumer half, held by the pipeline thread.
pub type SampleConsumer = ringbuf::HeapCons<f32>;

/// Buffer capacity: 2^20 = 1 048 576 f32 samples ≈ 23.8 s at 44.1 kHz.
pub const RING_CAPACITY: usize = 1 << 20;

/// Create a matched producer/consumer pair backed by a heap-allocated ring buffer.
pub fn create_sample_ring() -> (SampleProducer, SampleConsumer) {
    HeapRb::<f32>::new(RING_CAPACITY).split()
}
