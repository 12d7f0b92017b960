//! Registry: every live buffer, in insertion order.
//!
//! Buffers live in a slot map keyed by `BufferKey`; the mixing order is
//! kept as prev/next keys so both insert and remove stay O(1).

use slotmap::SlotMap;
use sx_ir::BufferKey;

use crate::buffer::AudioBuffer;

struct Entry {
    buffer: AudioBuffer,
    prev: Option<BufferKey>,
    next: Option<BufferKey>,
}

/// Ordered collection of live buffers.
#[derive(Default)]
pub struct Registry {
    entries: SlotMap<BufferKey, Entry>,
    head: Option<BufferKey>,
    tail: Option<BufferKey>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a buffer at the tail. It is mixed from the next render on.
    pub fn track(&mut self, buffer: AudioBuffer) -> BufferKey {
        let prev = self.tail;
        let key = self.entries.insert(Entry { buffer, prev, next: None });
        match prev.and_then(|k| self.entries.get_mut(k)) {
            Some(last) => last.next = Some(key),
            None => self.head = Some(key),
        }
        self.tail = Some(key);
        key
    }

    /// Unlink a buffer and hand it back.
    ///
    /// The caller drops the returned buffer, ideally after releasing any
    /// lock shared with the render thread.
    pub fn untrack(&mut self, key: BufferKey) -> Option<AudioBuffer> {
        let entry = self.entries.remove(key)?;
        match entry.prev.and_then(|k| self.entries.get_mut(k)) {
            Some(prev) => prev.next = entry.next,
            None => self.head = entry.next,
        }
        match entry.next.and_then(|k| self.entries.get_mut(k)) {
            Some(next) => next.prev = entry.prev,
            None => self.tail = entry.prev,
        }
        Some(entry.buffer)
    }

    pub fn get(&self, key: BufferKey) -> Option<&AudioBuffer> {
        self.entries.get(key).map(|e| &e.buffer)
    }

    pub fn get_mut(&mut self, key: BufferKey) -> Option<&mut AudioBuffer> {
        self.entries.get_mut(key).map(|e| &mut e.buffer)
    }

    pub fn contains(&self, key: BufferKey) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate buffers in insertion order.
    pub fn iter(&self) -> Iter<'_> {
        Iter { entries: &self.entries, cursor: self.head }
    }

    pub fn keys(&self) -> impl Iterator<Item = BufferKey> + '_ {
        self.iter().map(|(key, _)| key)
    }

    /// Visit every buffer mutably, in insertion order.
    pub fn for_each_mut<F>(&mut self, mut f: F)
    where
        F: FnMut(BufferKey, &mut AudioBuffer),
    {
        let mut cursor = self.head;
        while let Some(key) = cursor {
            let Some(entry) = self.entries.get_mut(key) else { break };
            cursor = entry.next;
            f(key, &mut entry.buffer);
        }
    }
}

/// Insertion-order iterator over a [`Registry`].
pub struct Iter<'a> {
    entries: &'a SlotMap<BufferKey, Entry>,
    cursor: Option<BufferKey>,
}

impl<'a> Iterator for Iter<'a> {
    type Item = (BufferKey, &'a AudioBuffer);

    fn next(&mut self) -> Option<Self::Item> {
        let key = self.cursor?;
        let entry = self.entries.get(key)?;
        self.cursor = entry.next;
        Some((key, &entry.buffer))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferUsage;
    use alloc::vec;
    use alloc::vec::Vec;
    use sx_ir::{DeviceFormat, SampleData};

    fn buffer(tag: f32) -> AudioBuffer {
        AudioBuffer::from_samples(
            SampleData::F32(vec![tag; 4]),
            1,
            8000,
            BufferUsage::Static,
            DeviceFormat::new(1, 8000),
        )
        .unwrap()
    }

    fn tags(registry: &Registry) -> Vec<u32> {
        registry.iter().map(|(_, b)| b.size_in_frames()).collect()
    }

    fn sized(frames: usize) -> AudioBuffer {
        AudioBuffer::from_samples(
            SampleData::F32(vec![0.0; frames]),
            1,
            8000,
            BufferUsage::Static,
            DeviceFormat::new(1, 8000),
        )
        .unwrap()
    }

    #[test]
    fn track_keeps_insertion_order() {
        let mut reg = Registry::new();
        reg.track(sized(1));
        reg.track(sized(2));
        reg.track(sized(3));
        assert_eq!(tags(&reg), vec![1, 2, 3]);
        assert_eq!(reg.len(), 3);
    }

    #[test]
    fn untrack_middle_head_and_tail() {
        let mut reg = Registry::new();
        let a = reg.track(sized(1));
        let b = reg.track(sized(2));
        let c = reg.track(sized(3));

        assert!(reg.untrack(b).is_some());
        assert_eq!(tags(&reg), vec![1, 3]);
        assert!(reg.untrack(a).is_some());
        assert_eq!(tags(&reg), vec![3]);
        assert!(reg.untrack(c).is_some());
        assert!(reg.is_empty());
        assert_eq!(reg.iter().count(), 0);

        reg.track(sized(4));
        assert_eq!(tags(&reg), vec![4]);
    }

    #[test]
    fn stale_key_is_ignored() {
        let mut reg = Registry::new();
        let a = reg.track(buffer(0.5));
        assert!(reg.untrack(a).is_some());
        assert!(reg.untrack(a).is_none());
        assert!(!reg.contains(a));
        assert!(reg.get_mut(a).is_none());

        // A new buffer may reuse the slot but not the key.
        let b = reg.track(buffer(0.5));
        assert_ne!(a, b);
        assert!(reg.get(a).is_none());
    }

    #[test]
    fn for_each_mut_visits_in_order() {
        let mut reg = Registry::new();
        let keys: Vec<_> = (1..=3).map(|n| reg.track(sized(n))).collect();
        let mut seen = Vec::new();
        reg.for_each_mut(|key, buf| {
            buf.play();
            seen.push(key);
        });
        assert_eq!(seen, keys);
        assert!(reg.iter().all(|(_, b)| b.is_playing()));
        assert_eq!(reg.keys().collect::<Vec<_>>(), keys);
    }
}
