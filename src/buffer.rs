// Notes:
// - occupancy is a per-row tag, there is no separate length counter that could
//   fall out of sync with the rows themselves
// - the scans are O(capacity), which is fine for tens of rows
// - a writer that comes in while a drain holds the lock just waits for it, so
//   writes and drains are serialized and nothing is lost to the reset

use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::sample::Sample;

#[derive(Debug)]
enum Slot {
    Empty,
    Occupied(Sample),
}

impl Slot {
    fn is_empty(&self) -> bool {
        matches!(self, Slot::Empty)
    }

    fn into_sample(self) -> Option<Sample> {
        match self {
            Slot::Empty => None,
            Slot::Occupied(sample) => Some(sample),
        }
    }
}

fn empty_slots(capacity: usize) -> Vec<Slot> {
    std::iter::repeat_with(|| Slot::Empty)
        .take(capacity)
        .collect()
}

/// Fixed-capacity table of samples shared between the poller and the host.
///
/// Writing never blocks on a full buffer: the oldest row is discarded to make
/// room (drop-oldest, freshest-wins). This is expected behavior under load,
/// not an error. Draining hands out every occupied row, oldest first, and
/// leaves the table empty.
#[derive(Debug)]
pub struct SampleBuffer {
    capacity: usize,
    width: usize,
    slots: Mutex<Vec<Slot>>,
}

impl SampleBuffer {
    pub fn new(capacity: usize, width: usize) -> SampleBuffer {
        assert!(capacity > 0, "sample buffer capacity must be non-zero");
        assert!(width > 0, "sample width must be non-zero");

        SampleBuffer {
            capacity,
            width,
            slots: Mutex::new(empty_slots(capacity)),
        }
    }

    // a panicking writer never leaves a half-written row behind (the width is
    // checked before the lock is taken), so a poisoned lock is still usable
    fn lock(&self) -> MutexGuard<'_, Vec<Slot>> {
        self.slots.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn width(&self) -> usize {
        self.width
    }

    /// Stores `sample` in the first empty row. When the table is full every row
    /// moves up by one, the oldest is discarded and `sample` takes the last row.
    ///
    /// Returns `true` when a sample was discarded to make room.
    ///
    /// Panics if the sample's channel count is not the buffer's width.
    pub fn write(&self, sample: Sample) -> bool {
        assert_eq!(
            sample.width(),
            self.width,
            "sample has {} channels but the buffer holds {}",
            sample.width(),
            self.width
        );

        let mut slots = self.lock();

        if let Some(slot) = slots.iter_mut().find(|slot| slot.is_empty()) {
            *slot = Slot::Occupied(sample);
            return false;
        }

        slots.rotate_left(1);
        if let Some(last) = slots.last_mut() {
            *last = Slot::Occupied(sample);
        }

        true
    }

    pub fn drain(&self) -> Vec<Sample> {
        let fresh = empty_slots(self.capacity);

        let snapshot = std::mem::replace(&mut *self.lock(), fresh);

        snapshot.into_iter().filter_map(Slot::into_sample).collect()
    }

    pub fn clear(&self) {
        self.lock().iter_mut().for_each(|slot| *slot = Slot::Empty);
    }

    pub fn occupied(&self) -> usize {
        self.lock().iter().filter(|slot| !slot.is_empty()).count()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use std::thread;

    use super::*;

    fn sample(value: f64, t: u64) -> Sample {
        Sample::new(vec![value, value], t)
    }

    #[test]
    fn never_holds_more_than_capacity() {
        let buffer = SampleBuffer::new(4, 2);

        for i in 0..20 {
            buffer.write(sample(i as f64, i));
            assert!(buffer.occupied() <= buffer.capacity());
        }

        assert_eq!(buffer.occupied(), 4);
    }

    #[test]
    fn drain_preserves_write_order() {
        let buffer = SampleBuffer::new(8, 2);

        let written: Vec<_> = (0..5).map(|i| sample(i as f64, i * 10)).collect();
        for s in &written {
            assert!(!buffer.write(s.clone()));
        }

        assert_eq!(buffer.drain(), written);
    }

    #[test]
    fn drain_leaves_buffer_empty() {
        let buffer = SampleBuffer::new(3, 2);
        buffer.write(sample(1.0, 1));
        buffer.write(sample(2.0, 2));

        assert_eq!(buffer.drain().len(), 2);
        assert_eq!(buffer.occupied(), 0);
        assert!(buffer.drain().is_empty());
    }

    #[test]
    fn full_buffer_drops_oldest() {
        let capacity = 5;
        let k = 3;
        let buffer = SampleBuffer::new(capacity, 2);

        let mut dropped = 0;
        for i in 0..(capacity + k) {
            if buffer.write(sample(i as f64, i as u64)) {
                dropped += 1;
            }
        }
        assert_eq!(dropped, k);

        let drained = buffer.drain();
        let expected: Vec<_> = (k..capacity + k)
            .map(|i| sample(i as f64, i as u64))
            .collect();
        assert_eq!(drained, expected);
    }

    #[test]
    fn clear_empties_every_row() {
        let buffer = SampleBuffer::new(3, 2);
        for i in 0..5 {
            buffer.write(sample(i as f64, i));
        }

        buffer.clear();

        assert_eq!(buffer.occupied(), 0);
        assert_eq!(buffer.capacity(), 3);
    }

    #[test]
    #[should_panic(expected = "channels")]
    fn wrong_width_is_a_programming_error() {
        let buffer = SampleBuffer::new(3, 2);
        buffer.write(Sample::new(vec![1.0, 2.0, 3.0], 0));
    }

    #[test]
    fn concurrent_writers_and_drainer_lose_nothing_but_overwrites() {
        const WRITERS: usize = 4;
        const PER_WRITER: usize = 2_000;

        let buffer = Arc::new(SampleBuffer::new(16, 2));

        let writers: Vec<_> = (0..WRITERS)
            .map(|w| {
                let buffer = Arc::clone(&buffer);
                thread::spawn(move || {
                    let mut dropped = 0;
                    for i in 0..PER_WRITER {
                        if buffer.write(sample(w as f64, i as u64)) {
                            dropped += 1;
                        }
                    }
                    dropped
                })
            })
            .collect();

        let mut drained = 0;
        while !writers.iter().all(|w| w.is_finished()) {
            let batch = buffer.drain();
            assert!(batch.len() <= 16);
            assert!(batch.iter().all(|s| s.width() == 2));
            drained += batch.len();
        }

        let dropped: usize = writers.into_iter().map(|w| w.join().unwrap()).sum();
        drained += buffer.drain().len();

        assert_eq!(buffer.occupied(), 0);
        assert_eq!(drained + dropped, WRITERS * PER_WRITER);
    }
}
