//! The one concurrency boundary in the core: finished chunks of stereo
//! samples cross from the APU (driven by the CPU thread) to whatever thread
//! feeds the host's audio device.
//!
//! Modeled as exactly two fixed-size buffers changing hands through a pair of
//! capacity-1 `crossbeam::queue::ArrayQueue`s rather than a pair of raw
//! counting semaphores: `free` hands an empty buffer to the producer, `ready`
//! hands a full one to the consumer. At any instant one buffer is "current"
//! (owned directly by the producer) and the other sits in exactly one of the
//! two queues, so pushing/popping an owned `Vec<f32>` through them *is* the
//! counting-permit handshake, without a separate primitive to track permit
//! counts apart from the data they guard.
use std::fmt;
use std::sync::Arc;

use crossbeam::queue::ArrayQueue;

use crate::hardware::apu::SAMPLE_SIZE_BUFFER;

const BUFFER_FRAMES: usize = SAMPLE_SIZE_BUFFER * 2; // stereo

struct Shared {
    free: ArrayQueue<Vec<f32>>,
    ready: ArrayQueue<Vec<f32>>,
}

/// Owned by the APU. Appends samples into the buffer it currently holds and
/// hands it off to the consumer once full.
pub struct AudioProducer {
    shared: Arc<Shared>,
    current: Vec<f32>,
}

/// Handed to the host's audio callback. `try_recv` never blocks: on an empty
/// `ready` queue the caller is expected to emit silence for that period.
pub struct AudioConsumer {
    shared: Arc<Shared>,
}

pub fn channel() -> (AudioProducer, AudioConsumer) {
    let free = ArrayQueue::new(1);
    let ready = ArrayQueue::new(1);
    let _ = free.push(Vec::with_capacity(BUFFER_FRAMES));
    let shared = Arc::new(Shared { free, ready });

    (
        AudioProducer { shared: shared.clone(), current: Vec::with_capacity(BUFFER_FRAMES) },
        AudioConsumer { shared },
    )
}

impl AudioProducer {
    /// Pushes one stereo frame. Once the current buffer is full it's handed
    /// to the `ready` queue and the other buffer is taken from `free`.
    pub fn push_sample(&mut self, left: f32, right: f32) {
        self.current.push(left);
        self.current.push(right);

        if self.current.len() >= BUFFER_FRAMES {
            let full = std::mem::replace(&mut self.current, self.take_free_buffer());
            // A full `ready` queue just means the host hasn't drained the
            // previous buffer yet; drop it rather than block the CPU thread
            // on audio.
            if let Err(full) = self.shared.ready.push(full) {
                let _ = self.shared.ready.pop();
                let _ = self.shared.ready.push(full);
            }
        }
    }

    fn take_free_buffer(&self) -> Vec<f32> {
        self.shared.free.pop().unwrap_or_else(|| Vec::with_capacity(BUFFER_FRAMES))
    }
}

impl AudioConsumer {
    /// Non-blocking: returns the next full buffer if the producer has
    /// finished one, recycling it back to `free` is the caller's
    /// responsibility via [`AudioConsumer::recycle`].
    pub fn try_recv(&self) -> Option<Vec<f32>> {
        self.shared.ready.pop()
    }

    /// Returns a drained buffer to the producer for reuse.
    pub fn recycle(&self, mut buffer: Vec<f32>) {
        buffer.clear();
        let _ = self.shared.free.push(buffer);
    }
}

impl fmt::Debug for AudioProducer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioProducer {{ current_len: {} }}", self.current.len())
    }
}

impl fmt::Debug for AudioConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AudioConsumer")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consumer_sees_nothing_before_a_buffer_fills() {
        let (mut producer, consumer) = channel();
        producer.push_sample(0.1, -0.1);
        assert!(consumer.try_recv().is_none());
    }

    #[test]
    fn consumer_receives_exactly_one_buffer_once_full() {
        let (mut producer, consumer) = channel();
        for i in 0..BUFFER_FRAMES / 2 {
            producer.push_sample(i as f32, -(i as f32));
        }

        let buffer = consumer.try_recv().expect("buffer should be ready");
        assert_eq!(buffer.len(), BUFFER_FRAMES);
        assert_eq!(buffer[0], 0.0);
        assert_eq!(buffer[1], 0.0);
        assert!(consumer.try_recv().is_none());
    }

    #[test]
    fn recycled_buffer_is_reused_rather_than_reallocated() {
        let (mut producer, consumer) = channel();
        for i in 0..BUFFER_FRAMES / 2 {
            producer.push_sample(i as f32, -(i as f32));
        }
        let first = consumer.try_recv().unwrap();
        let first_ptr = first.as_ptr();
        consumer.recycle(first);

        for i in 0..BUFFER_FRAMES / 2 {
            producer.push_sample(i as f32, -(i as f32));
        }
        let second = consumer.try_recv().unwrap();
        assert_eq!(second.as_ptr(), first_ptr);
    }

    #[test]
    fn an_undrained_ready_buffer_is_replaced_not_queued() {
        let (mut producer, consumer) = channel();
        for i in 0..BUFFER_FRAMES / 2 {
            producer.push_sample(i as f32, -(i as f32));
        }
        // Second buffer fills before the first is drained; the stale one is
        // dropped in favour of the newer data rather than blocking the
        // producer or silently losing the new buffer's samples.
        for i in 0..BUFFER_FRAMES / 2 {
            producer.push_sample((100 + i) as f32, -((100 + i) as f32));
        }

        let buffer = consumer.try_recv().expect("buffer should be ready");
        assert_eq!(buffer[0], 100.0);
        assert!(consumer.try_recv().is_none());
    }
}
