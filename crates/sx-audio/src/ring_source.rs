//! Lock-free feed for streaming buffers.
//!
//! A producer thread pushes interleaved f32 samples; the mixer pulls them
//! through the `FillSource` installed on a stream. Missing samples are
//! replaced by silence and counted.

use ringbuf::traits::{Consumer, Observer, Producer, Split};
use ringbuf::{HeapCons, HeapProd, HeapRb};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use sx_engine::FillSource;
use sx_ir::SamplesMut;

/// Create a feed holding up to `capacity` samples.
pub fn ring_source(capacity: usize) -> (RingProducer, RingSource) {
    let rb = HeapRb::<f32>::new(capacity);
    let (producer, consumer) = rb.split();
    let underruns = Arc::new(AtomicU64::new(0));
    (
        RingProducer { producer, underruns: underruns.clone() },
        RingSource { consumer, underruns },
    )
}

/// Writing half of a feed.
pub struct RingProducer {
    producer: HeapProd<f32>,
    underruns: Arc<AtomicU64>,
}

impl RingProducer {
    /// Push as many samples as fit; returns how many were taken.
    pub fn push(&mut self, samples: &[f32]) -> usize {
        self.producer.push_slice(samples)
    }

    /// Push every sample, spinning until the reader makes room.
    pub fn push_spin(&mut self, mut samples: &[f32]) {
        while !samples.is_empty() {
            let n = self.producer.push_slice(samples);
            samples = &samples[n..];
            if n == 0 {
                std::hint::spin_loop();
            }
        }
    }

    /// Free space in samples.
    pub fn vacant(&self) -> usize {
        self.producer.vacant_len()
    }

    /// Samples the reader had to replace with silence so far.
    pub fn underruns(&self) -> u64 {
        self.underruns.load(Ordering::Relaxed)
    }
}

/// Reading half of a feed, installed as a stream's fill source.
pub struct RingSource {
    consumer: HeapCons<f32>,
    underruns: Arc<AtomicU64>,
}

impl RingSource {
    /// Samples waiting to be read.
    pub fn available(&self) -> usize {
        self.consumer.occupied_len()
    }
}

impl FillSource for RingSource {
    fn fill(&mut self, out: SamplesMut<'_>, _frames: usize) {
        let wanted = out.len();
        let got = match out {
            SamplesMut::F32(s) => {
                let n = self.consumer.pop_slice(s);
                s[n..].fill(0.0);
                n
            }
            SamplesMut::S16(s) => {
                let mut n = 0;
                for dst in s.iter_mut() {
                    *dst = match self.consumer.try_pop() {
                        Some(v) => {
                            n += 1;
                            (v.clamp(-1.0, 1.0) * 32767.0) as i16
                        }
                        None => 0,
                    };
                }
                n
            }
            SamplesMut::U8(s) => {
                let mut n = 0;
                for dst in s.iter_mut() {
                    *dst = match self.consumer.try_pop() {
                        Some(v) => {
                            n += 1;
                            (v.clamp(-1.0, 1.0) * 127.0 + 128.0) as u8
                        }
                        None => 128,
                    };
                }
                n
            }
        };
        if got < wanted {
            self.underruns.fetch_add((wanted - got) as u64, Ordering::Relaxed);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn f32_feed_passes_samples_through() {
        let (mut tx, mut rx) = ring_source(8);
        assert_eq!(tx.push(&[0.1, 0.2, 0.3]), 3);
        let mut out = [9.0f32; 3];
        rx.fill(SamplesMut::F32(&mut out), 3);
        assert_eq!(out, [0.1, 0.2, 0.3]);
        assert_eq!(tx.underruns(), 0);
    }

    #[test]
    fn underrun_is_silenced_and_counted() {
        let (mut tx, mut rx) = ring_source(8);
        tx.push(&[0.5]);
        let mut out = [9.0f32; 4];
        rx.fill(SamplesMut::F32(&mut out), 4);
        assert_eq!(out, [0.5, 0.0, 0.0, 0.0]);
        assert_eq!(tx.underruns(), 3);
    }

    #[test]
    fn integer_views_are_scaled() {
        let (mut tx, mut rx) = ring_source(8);
        tx.push(&[1.0, -1.0, 0.0]);
        let mut out = [0i16; 2];
        rx.fill(SamplesMut::S16(&mut out), 2);
        assert_eq!(out, [32767, -32767]);

        let mut bytes = [0u8; 2];
        rx.fill(SamplesMut::U8(&mut bytes), 2);
        assert_eq!(bytes, [128, 128]);
        assert_eq!(rx.available(), 0);
    }

    #[test]
    fn push_stops_at_capacity() {
        let (mut tx, _rx) = ring_source(4);
        assert_eq!(tx.push(&[0.0; 6]), 4);
        assert_eq!(tx.vacant(), 0);
    }
}
