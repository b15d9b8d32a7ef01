//! Load-balancing heap.
//!
//! An array-backed binary min-heap of slot ids keyed on the number of
//! outstanding borrows. Each slot records its own position in the heap so
//! that an arbitrary slot can be re-ordered after its count changes, not only
//! the root.
//!
//! Equal counts are ordered by an acquisition stamp, least recently acquired
//! first, which makes idle slots come out round-robin.

/// Position of a slot that is no longer part of the heap.
pub(crate) const INVALID_POSITION: usize = usize::MAX;

#[derive(Debug, Clone, Copy)]
struct Entry {
    use_count: usize,
    stamp: u64,
    position: usize,
}

impl Entry {
    fn key(&self) -> (usize, u64) {
        (self.use_count, self.stamp)
    }
}

/// What a release did to its slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ReleaseOutcome {
    /// The count was decremented.
    Released,
    /// The count was already zero and was left untouched.
    Underflow,
    /// The slot is not in the heap any more.
    Detached,
}

#[derive(Debug)]
pub(crate) struct LoadHeap {
    /// Heap array of slot ids.
    order: Vec<usize>,
    /// Per-slot bookkeeping, indexed by slot id.
    entries: Vec<Entry>,
    clock: u64,
}

impl LoadHeap {
    /// Build a heap over `len` idle slots.
    pub(crate) fn new(len: usize) -> Self {
        let entries = (0..len)
            .map(|position| Entry {
                use_count: 0,
                stamp: 0,
                position,
            })
            .collect();
        Self {
            order: (0..len).collect(),
            entries,
            clock: 0,
        }
    }

    /// Slot with the fewest outstanding borrows.
    pub(crate) fn peek_min(&self) -> Option<usize> {
        self.order.first().copied()
    }

    pub(crate) fn use_count(&self, slot: usize) -> usize {
        self.entries.get(slot).map_or(0, |e| e.use_count)
    }

    pub(crate) fn position(&self, slot: usize) -> usize {
        self.entries
            .get(slot)
            .map_or(INVALID_POSITION, |e| e.position)
    }

    /// Record a borrow of `slot` and restore heap order.
    pub(crate) fn acquire(&mut self, slot: usize) {
        let Some(entry) = self.entries.get_mut(slot) else {
            return;
        };
        if entry.position == INVALID_POSITION {
            return;
        }
        self.clock += 1;
        entry.use_count += 1;
        entry.stamp = self.clock;
        let position = entry.position;
        self.fix(position);
    }

    /// Record the return of a borrow of `slot` and restore heap order.
    pub(crate) fn release(&mut self, slot: usize) -> ReleaseOutcome {
        let Some(entry) = self.entries.get_mut(slot) else {
            return ReleaseOutcome::Detached;
        };
        if entry.position == INVALID_POSITION {
            return ReleaseOutcome::Detached;
        }
        if entry.use_count == 0 {
            return ReleaseOutcome::Underflow;
        }
        entry.use_count -= 1;
        let position = entry.position;
        self.fix(position);
        ReleaseOutcome::Released
    }

    /// Restore heap order after the slot at `position` changed its count.
    pub(crate) fn fix(&mut self, position: usize) {
        if position >= self.order.len() {
            return;
        }
        if !self.sift_down(position) {
            self.sift_up(position);
        }
    }

    /// Empty the heap, returning `(slot, use_count)` for every slot.
    ///
    /// Every slot's position becomes [`INVALID_POSITION`], so later releases
    /// are no-ops.
    pub(crate) fn drain(&mut self) -> Vec<(usize, usize)> {
        self.order.clear();
        self.entries
            .iter_mut()
            .enumerate()
            .map(|(slot, entry)| {
                entry.position = INVALID_POSITION;
                (slot, entry.use_count)
            })
            .collect()
    }

    /// Counts of all slots, indexed by slot id.
    pub(crate) fn use_counts(&self) -> Vec<usize> {
        self.entries.iter().map(|e| e.use_count).collect()
    }

    fn less(&self, i: usize, j: usize) -> bool {
        self.entries[self.order[i]].key() < self.entries[self.order[j]].key()
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.order.swap(i, j);
        self.entries[self.order[i]].position = i;
        self.entries[self.order[j]].position = j;
    }

    fn sift_up(&mut self, mut i: usize) {
        while i > 0 {
            let parent = (i - 1) / 2;
            if !self.less(i, parent) {
                break;
            }
            self.swap(i, parent);
            i = parent;
        }
    }

    /// Returns whether the element moved.
    fn sift_down(&mut self, start: usize) -> bool {
        let n = self.order.len();
        let mut i = start;
        loop {
            let left = 2 * i + 1;
            if left >= n {
                break;
            }
            let mut child = left;
            let right = left + 1;
            if right < n && self.less(right, left) {
                child = right;
            }
            if !self.less(child, i) {
                break;
            }
            self.swap(i, child);
            i = child;
        }
        i > start
    }

    #[cfg(test)]
    fn check_invariants(&self) {
        for (position, &slot) in self.order.iter().enumerate() {
            assert_eq!(self.entries[slot].position, position, "stale position");
            if position > 0 {
                assert!(
                    !self.less(position, (position - 1) / 2),
                    "child sorts before its parent"
                );
            }
        }
        if let Some(root) = self.peek_min() {
            let min = self.entries.iter().map(|e| e.use_count).min();
            assert_eq!(Some(self.entries[root].use_count), min);
        }
    }
}
