// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Vertex attribute buffers addressed through stable generational handles.
//!
//! Collision entries need to reach back into the vertex data of the tile that
//! produced them in order to flip label visibility. Rather than holding offsets
//! into storage that may grow or be replaced, they hold a [`BufferRange`]
//! whose [`BufferKey`] is resolved through a [`BufferArena`]. A key whose
//! buffer was released resolves to nothing, so late toggles are no-ops.
//!
//! Every vertex record starts with a component whose lowest bit is the
//! visibility bit (`1` = visible). Vertex writers reserve that bit by storing
//! even values in the first component.

use alloc::vec::Vec;
use core::ops::Range;

/// Generational handle to a buffer in a [`BufferArena`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BufferKey(u32, u32);

impl BufferKey {
    #[allow(
        clippy::cast_possible_truncation,
        reason = "Buffer keys use 32-bit slot indices; a display never holds 2^32 buffers."
    )]
    const fn new(idx: usize, generation: u32) -> Self {
        Self(idx as u32, generation)
    }

    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// A run of vertices `start..stop` inside one buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct BufferRange {
    /// Buffer holding the vertices.
    pub buffer: BufferKey,
    /// First vertex.
    pub start: u32,
    /// One past the last vertex.
    pub stop: u32,
}

impl BufferRange {
    /// Vertex indices covered by the range.
    pub fn vertices(&self) -> Range<usize> {
        self.start as usize..self.stop as usize
    }
}

/// Interleaved `i16` vertex attributes with a fixed stride.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct AttributeBuffer {
    data: Vec<i16>,
    stride: usize,
}

impl AttributeBuffer {
    /// Create an empty buffer whose vertices have `stride` components.
    pub fn new(stride: usize) -> Self {
        debug_assert!(stride > 0, "vertex stride must be positive");
        Self {
            data: Vec::new(),
            stride,
        }
    }

    /// Components per vertex.
    pub fn stride(&self) -> usize {
        self.stride
    }

    /// Raw interleaved data.
    pub fn data(&self) -> &[i16] {
        &self.data
    }

    /// Number of complete vertices.
    pub fn vertex_count(&self) -> usize {
        self.data.len().checked_div(self.stride).unwrap_or(0)
    }

    /// Append one vertex and return its index. Missing components are zero
    /// filled and extra ones are dropped.
    pub fn push_vertex(&mut self, components: &[i16]) -> u32 {
        let idx = self.vertex_count();
        for i in 0..self.stride {
            self.data.push(components.get(i).copied().unwrap_or(0));
        }
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Tile buffers stay far below 2^32 vertices."
        )]
        let idx = idx as u32;
        idx
    }

    /// Visibility bit of a vertex, or `None` if out of bounds.
    pub fn is_visible(&self, vertex: usize) -> Option<bool> {
        self.data.get(vertex * self.stride).map(|v| v & 1 == 1)
    }

    /// Set the visibility bit of every vertex in `range`.
    ///
    /// Returns true if any bit changed. Out-of-bounds vertices are ignored.
    pub fn set_visible(&mut self, range: Range<usize>, visible: bool) -> bool {
        let mut changed = false;
        for vertex in range {
            let Some(v) = self.data.get_mut(vertex * self.stride) else {
                break;
            };
            if (*v & 1 == 1) != visible {
                *v ^= 1;
                changed = true;
            }
        }
        changed
    }
}

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Mark {
    Added,
    Updated,
}

#[derive(Clone, Debug)]
struct Entry {
    generation: u32,
    buffer: AttributeBuffer,
    mark: Option<Mark>,
}

/// Buffers that need a GPU-side action, returned by [`BufferArena::commit`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Uploads {
    /// Buffers created since the last commit (full upload).
    pub added: Vec<BufferKey>,
    /// Buffers whose contents changed since the last commit (re-upload).
    pub updated: Vec<BufferKey>,
    /// Buffers released since the last commit (free GPU storage).
    pub released: Vec<BufferKey>,
}

impl Uploads {
    /// True if nothing needs to be uploaded or freed.
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.updated.is_empty() && self.released.is_empty()
    }
}

/// Slot arena of attribute buffers with generational keys and dirty tracking.
#[derive(Debug, Default)]
pub struct BufferArena {
    entries: Vec<Option<Entry>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    released: Vec<BufferKey>,
}

impl BufferArena {
    /// Create an empty arena.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live buffers.
    pub fn len(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    /// True if the arena holds no live buffer.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Store a buffer and return its handle.
    pub fn insert(&mut self, buffer: AttributeBuffer) -> BufferKey {
        let (idx, generation) = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].saturating_add(1);
            self.generations[idx] = generation;
            (idx, generation)
        } else {
            self.entries.push(None);
            self.generations.push(1);
            (self.entries.len() - 1, 1)
        };
        self.entries[idx] = Some(Entry {
            generation,
            buffer,
            mark: Some(Mark::Added),
        });
        BufferKey::new(idx, generation)
    }

    /// Replace the contents behind a live key. Returns false for stale keys.
    pub fn replace(&mut self, key: BufferKey, buffer: AttributeBuffer) -> bool {
        let Some(e) = self.entry_mut(key) else {
            return false;
        };
        e.buffer = buffer;
        if e.mark.is_none() {
            e.mark = Some(Mark::Updated);
        }
        true
    }

    /// Release a buffer. Its key and every copy of it become stale.
    pub fn remove(&mut self, key: BufferKey) -> Option<AttributeBuffer> {
        let entry = self.entry_mut(key)?;
        let was_uploaded = !matches!(entry.mark, Some(Mark::Added));
        let entry = self.entries[key.idx()].take()?;
        self.free_list.push(key.idx());
        if was_uploaded {
            self.released.push(key);
        }
        Some(entry.buffer)
    }

    /// True if `key` refers to a live buffer.
    pub fn is_alive(&self, key: BufferKey) -> bool {
        self.get(key).is_some()
    }

    /// Resolve a key.
    pub fn get(&self, key: BufferKey) -> Option<&AttributeBuffer> {
        let e = self.entries.get(key.idx())?.as_ref()?;
        (e.generation == key.1).then_some(&e.buffer)
    }

    /// Current visibility of a range, read from its first vertex.
    pub fn is_range_visible(&self, range: &BufferRange) -> Option<bool> {
        self.get(range.buffer)?.is_visible(range.start as usize)
    }

    /// Flip the visibility bits of a range to `visible`.
    ///
    /// Returns `Some(true)` if any bit changed (the buffer is then marked for
    /// re-upload), `Some(false)` if it already matched, and `None` if the key is stale.
    pub fn set_range_visible(&mut self, range: &BufferRange, visible: bool) -> Option<bool> {
        let e = self.entry_mut(range.buffer)?;
        let changed = e.buffer.set_visible(range.vertices(), visible);
        if changed && e.mark.is_none() {
            e.mark = Some(Mark::Updated);
        }
        Some(changed)
    }

    /// Collect the pending upload list and reset dirty marks.
    pub fn commit(&mut self) -> Uploads {
        let mut uploads = Uploads {
            released: core::mem::take(&mut self.released),
            ..Uploads::default()
        };
        for (i, slot) in self.entries.iter_mut().enumerate() {
            let Some(entry) = slot.as_mut() else {
                continue;
            };
            match entry.mark.take() {
                Some(Mark::Added) => uploads.added.push(BufferKey::new(i, entry.generation)),
                Some(Mark::Updated) => uploads.updated.push(BufferKey::new(i, entry.generation)),
                None => {}
            }
        }
        uploads
    }

    fn entry_mut(&mut self, key: BufferKey) -> Option<&mut Entry> {
        let e = self.entries.get_mut(key.idx())?.as_mut()?;
        if e.generation != key.1 {
            return None;
        }
        Some(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn quad(buffer: &mut AttributeBuffer, visible: bool) -> Range<usize> {
        let bit = i16::from(visible);
        let start = buffer.push_vertex(&[10 | bit, 20]) as usize;
        for _ in 0..3 {
            buffer.push_vertex(&[30 | bit, 40]);
        }
        start..start + 4
    }

    #[test]
    fn toggles_only_when_different() {
        let mut buffer = AttributeBuffer::new(2);
        let r = quad(&mut buffer, false);
        assert!(buffer.set_visible(r.clone(), true));
        assert!(!buffer.set_visible(r.clone(), true), "second toggle is a no-op");
        assert_eq!(buffer.is_visible(3), Some(true));
        assert_eq!(buffer.data()[0], 11);
        assert!(buffer.set_visible(r, false));
        assert_eq!(buffer.data()[0], 10);
    }

    #[test]
    fn stale_keys_resolve_to_nothing() {
        let mut arena = BufferArena::new();
        let a = arena.insert(AttributeBuffer::new(2));
        assert!(arena.remove(a).is_some());
        let b = arena.insert(AttributeBuffer::new(2));
        assert!(!arena.is_alive(a));
        assert!(arena.is_alive(b));
        let stale = BufferRange {
            buffer: a,
            start: 0,
            stop: 4,
        };
        assert_eq!(arena.set_range_visible(&stale, true), None);
    }

    #[test]
    fn commit_reports_adds_updates_and_releases() {
        let mut arena = BufferArena::new();
        let mut buffer = AttributeBuffer::new(2);
        quad(&mut buffer, true);
        let key = arena.insert(buffer);
        let first = arena.commit();
        assert_eq!(first.added, [key]);
        assert!(arena.commit().is_empty());

        let range = BufferRange {
            buffer: key,
            start: 0,
            stop: 4,
        };
        assert_eq!(arena.set_range_visible(&range, true), Some(false));
        assert!(arena.commit().is_empty(), "unchanged bits do not dirty the buffer");
        assert_eq!(arena.set_range_visible(&range, false), Some(true));
        assert_eq!(arena.is_range_visible(&range), Some(false));
        assert_eq!(arena.commit().updated, [key]);

        arena.remove(key);
        assert_eq!(arena.commit().released, [key]);
    }

    #[test]
    fn removing_unuploaded_buffer_reports_nothing() {
        let mut arena = BufferArena::new();
        let key = arena.insert(AttributeBuffer::new(3));
        arena.remove(key);
        assert!(arena.commit().is_empty());
    }
}
