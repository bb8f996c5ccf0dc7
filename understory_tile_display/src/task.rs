// Copyright 2025 the Understory Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Cooperative, resumable tasks.
//!
//! Long work is split into [`Task::step`] calls, each handling a bounded
//! slice. The [`Scheduler`] runs a fixed number of steps per frame, round
//! robin. Cancellation is a flag checked before each step: a cancelled task
//! is finished early and reported with [`Completed::cancelled`] set, so that
//! whatever it holds can be released, but its output must not be applied.

use std::collections::{BTreeMap, VecDeque};
use std::fmt;

use understory_tile_index::TileSize;

/// Result of one step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Step {
    /// More work remains.
    Continue,
    /// The task is complete; [`Task::finish`] may be called.
    Done,
}

/// A resumable unit of work.
pub trait Task {
    /// What the task produces.
    type Output;

    /// Do a bounded amount of work.
    fn step(&mut self) -> Step;

    /// Consume the task. Also called on cancelled tasks, whose output is then
    /// partial.
    fn finish(self) -> Self::Output;
}

/// Identifies the work a task does; at most one live task runs per key.
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskKey {
    /// Layer identifier.
    pub layer: String,
    /// Tile quadkey.
    pub quadkey: String,
    /// Tile size of the layer.
    pub tile_size: TileSize,
}

impl TaskKey {
    /// Build a key.
    pub fn new(layer: &str, quadkey: &str, tile_size: TileSize) -> Self {
        Self {
            layer: layer.into(),
            quadkey: quadkey.into(),
            tile_size,
        }
    }
}

/// Generational handle of a scheduled task.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct TaskId(u32, u32);

impl TaskId {
    const fn idx(self) -> usize {
        self.0 as usize
    }
}

/// Outcome of [`Scheduler::spawn`].
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Spawn {
    /// A new task was queued.
    Started(TaskId),
    /// A live task with the same key exists; no new work was queued.
    Coalesced(TaskId),
}

impl Spawn {
    /// The task doing the work.
    pub fn id(self) -> TaskId {
        match self {
            Self::Started(id) | Self::Coalesced(id) => id,
        }
    }
}

/// A task that left the scheduler.
#[derive(Debug)]
pub struct Completed<O> {
    /// Task handle.
    pub id: TaskId,
    /// Task key.
    pub key: TaskKey,
    /// Output, partial if `cancelled`.
    pub output: O,
    /// The task was cancelled before completing.
    pub cancelled: bool,
    /// The inputs changed while the task ran.
    pub outdated: bool,
}

impl<O> Completed<O> {
    /// True if the output must be discarded.
    pub fn is_stale(&self) -> bool {
        self.cancelled || self.outdated
    }
}

struct Slot<T> {
    generation: u32,
    key: TaskKey,
    task: T,
    cancelled: bool,
    outdated: bool,
}

/// Round-robin runner of [`Task`]s.
pub struct Scheduler<T> {
    slots: Vec<Option<Slot<T>>>,
    generations: Vec<u32>,
    free_list: Vec<usize>,
    by_key: BTreeMap<TaskKey, TaskId>,
    queue: VecDeque<TaskId>,
}

impl<T> fmt::Debug for Scheduler<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scheduler")
            .field("live", &self.len())
            .field("queued", &self.queue.len())
            .field("keys", &self.by_key.len())
            .finish_non_exhaustive()
    }
}

impl<T> Default for Scheduler<T> {
    fn default() -> Self {
        Self {
            slots: Vec::new(),
            generations: Vec::new(),
            free_list: Vec::new(),
            by_key: BTreeMap::new(),
            queue: VecDeque::new(),
        }
    }
}

impl<T> Scheduler<T> {
    /// Empty scheduler.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live tasks, including cancelled ones not yet collected.
    pub fn len(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }

    /// True if nothing is scheduled.
    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

}

impl<T: Task> Scheduler<T> {
    /// The live, non-cancelled, non-outdated task for `key`.
    pub fn active(&self, key: &TaskKey) -> Option<TaskId> {
        self.by_key.get(key).copied()
    }

    /// True if `id` refers to a task still in the scheduler.
    pub fn is_alive(&self, id: TaskId) -> bool {
        self.slot(id).is_some()
    }

    /// Queue the task built by `make`, unless an active task with the same key
    /// exists, in which case `make` is not called.
    pub fn spawn(&mut self, key: TaskKey, make: impl FnOnce() -> T) -> Spawn {
        if let Some(id) = self.active(&key) {
            tracing::trace!(?key, "task coalesced");
            return Spawn::Coalesced(id);
        }
        let slot = Slot {
            generation: 0,
            key: key.clone(),
            task: make(),
            cancelled: false,
            outdated: false,
        };
        let id = if let Some(idx) = self.free_list.pop() {
            let generation = self.generations[idx].wrapping_add(1);
            self.generations[idx] = generation;
            self.slots[idx] = Some(Slot { generation, ..slot });
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Task slots are reused; fewer than 2^32 run at once."
            )]
            TaskId(idx as u32, generation)
        } else {
            let idx = self.slots.len();
            self.slots.push(Some(slot));
            self.generations.push(0);
            #[allow(
                clippy::cast_possible_truncation,
                reason = "Task slots are reused; fewer than 2^32 run at once."
            )]
            TaskId(idx as u32, 0)
        };
        self.by_key.insert(key, id);
        self.queue.push_back(id);
        Spawn::Started(id)
    }

    /// Flag a task as cancelled. It is collected at its next turn.
    pub fn cancel(&mut self, id: TaskId) -> bool {
        let Some(slot) = self.slot_mut(id) else {
            return false;
        };
        slot.cancelled = true;
        let key = slot.key.clone();
        if self.by_key.get(&key) == Some(&id) {
            self.by_key.remove(&key);
        }
        true
    }

    /// Cancel every active task whose key matches. Returns how many were
    /// cancelled.
    pub fn cancel_where(&mut self, mut pred: impl FnMut(&TaskKey) -> bool) -> usize {
        let ids: Vec<TaskId> = self
            .by_key
            .iter()
            .filter(|(k, _)| pred(k))
            .map(|(_, id)| *id)
            .collect();
        ids.into_iter().filter(|id| self.cancel(*id)).count()
    }

    /// Flag the active task for `key` as outdated: it runs to completion but
    /// its output must be discarded, and a new task may be spawned for `key`.
    pub fn mark_outdated(&mut self, key: &TaskKey) -> bool {
        let Some(id) = self.by_key.remove(key) else {
            return false;
        };
        if let Some(slot) = self.slot_mut(id) {
            slot.outdated = true;
        }
        true
    }

    /// Run up to `steps` steps, round robin. Returns the tasks that finished
    /// or were cancelled.
    pub fn run(&mut self, steps: usize) -> Vec<Completed<T::Output>> {
        let mut done = Vec::new();
        let mut budget = steps;
        while budget > 0 {
            let Some(id) = self.queue.pop_front() else {
                break;
            };
            let Some(slot) = self.slot_mut(id) else {
                continue;
            };
            if slot.cancelled {
                tracing::trace!(key = ?slot.key, "cancelled task collected");
                done.extend(self.release(id));
                continue;
            }
            budget -= 1;
            match slot.task.step() {
                Step::Continue => self.queue.push_back(id),
                Step::Done => done.extend(self.release(id)),
            }
        }
        done
    }

    fn release(&mut self, id: TaskId) -> Option<Completed<T::Output>> {
        let slot = self.slots.get_mut(id.idx())?.take()?;
        self.free_list.push(id.idx());
        if self.by_key.get(&slot.key) == Some(&id) {
            self.by_key.remove(&slot.key);
        }
        Some(Completed {
            id,
            key: slot.key,
            output: slot.task.finish(),
            cancelled: slot.cancelled,
            outdated: slot.outdated,
        })
    }

    fn slot(&self, id: TaskId) -> Option<&Slot<T>> {
        let slot = self.slots.get(id.idx())?.as_ref()?;
        (slot.generation == id.1).then_some(slot)
    }

    fn slot_mut(&mut self, id: TaskId) -> Option<&mut Slot<T>> {
        let slot = self.slots.get_mut(id.idx())?.as_mut()?;
        (slot.generation == id.1).then_some(slot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Counts down, one per step.
    struct Countdown {
        left: u32,
        steps: u32,
    }

    impl Task for Countdown {
        type Output = u32;

        fn step(&mut self) -> Step {
            self.steps += 1;
            self.left = self.left.saturating_sub(1);
            if self.left == 0 { Step::Done } else { Step::Continue }
        }

        fn finish(self) -> u32 {
            self.steps
        }
    }

    fn countdown(left: u32) -> Countdown {
        Countdown { left, steps: 0 }
    }

    fn key(q: &str) -> TaskKey {
        TaskKey::new("roads", q, TileSize::Size512)
    }

    #[test]
    fn same_key_coalesces() {
        let mut s = Scheduler::new();
        let a = s.spawn(key("0"), || countdown(3));
        let mut built = false;
        let b = s.spawn(key("0"), || {
            built = true;
            countdown(3)
        });
        assert!(matches!(a, Spawn::Started(_)));
        assert_eq!(b, Spawn::Coalesced(a.id()));
        assert!(!built);
    }

    #[test]
    fn round_robin_within_budget() {
        let mut s = Scheduler::new();
        s.spawn(key("0"), || countdown(2));
        s.spawn(key("1"), || countdown(1));
        assert!(s.run(1).is_empty());
        let done = s.run(2);
        assert_eq!(done.len(), 2);
        assert_eq!(done[0].key, key("1"));
        assert_eq!(done[1].output, 2);
        assert!(done.iter().all(|c| !c.is_stale()));
        assert!(s.is_empty());
    }

    #[test]
    fn cancelled_tasks_are_collected_without_running() {
        let mut s = Scheduler::new();
        let id = s.spawn(key("0"), || countdown(5)).id();
        s.run(1);
        assert!(s.cancel(id));
        assert_eq!(s.active(&key("0")), None);
        let done = s.run(10);
        assert_eq!(done.len(), 1);
        assert!(done[0].cancelled);
        assert_eq!(done[0].output, 1);
        assert!(!s.is_alive(id));
        assert!(!s.cancel(id));
    }

    #[test]
    fn outdated_task_runs_but_is_stale_and_key_is_free() {
        let mut s = Scheduler::new();
        let old = s.spawn(key("0"), || countdown(2)).id();
        assert!(s.mark_outdated(&key("0")));
        let new = s.spawn(key("0"), || countdown(1));
        assert!(matches!(new, Spawn::Started(id) if id != old));
        let done = s.run(10);
        assert_eq!(done.len(), 2);
        let stale: Vec<_> = done.iter().map(|c| c.is_stale()).collect();
        assert_eq!(stale, [false, true]);
        assert_eq!(s.active(&key("0")), None);
    }

    #[test]
    fn reused_slots_get_new_generations() {
        let mut s = Scheduler::new();
        let a = s.spawn(key("0"), || countdown(1)).id();
        s.run(1);
        let b = s.spawn(key("1"), || countdown(1)).id();
        assert_ne!(a, b);
        assert!(!s.is_alive(a));
        assert!(s.is_alive(b));
        assert_eq!(s.cancel_where(|k| k.quadkey == "1"), 1);
    }

    #[test]
    fn debug_lists_live_tasks() {
        let mut s = Scheduler::new();
        s.spawn(key("0"), || countdown(2));
        s.spawn(key("1"), || countdown(2));
        let text = format!("{s:?}");
        assert!(text.starts_with("Scheduler"), "unexpected debug output: {text}");
        assert!(text.contains("live: 2"), "unexpected debug output: {text}");
        let empty: Scheduler<Countdown> = Scheduler::new();
        assert_eq!(empty.len(), 0);
        assert!(empty.is_empty());
    }
}
