//! Move minimization for keyed child lists.
//!
//! After matching, every surviving child knows the index it had in the
//! previous list. Children whose previous indices form a longest increasing
//! subsequence are already in relative order and can stay where they are;
//! only the rest need a `MoveNode`.
//!
//! Emitting those moves needs the live index of a child at the moment it is
//! moved. Every child that is live at some point of a reconciliation gets a
//! slot in one fixed order (see [`layout`]), and [`LiveOrder`] counts the
//! occupied slots in front of a given one in O(log n).

use crate::tree::Hid;

/// Mark the positions of `sources` that lie on one longest strictly
/// increasing subsequence.
///
/// Runs in O(n log n). Ties are broken towards the earliest-ending
/// subsequence, so the result is deterministic.
pub(crate) fn stable_set(sources: &[usize]) -> Vec<bool> {
    let mut stable = vec![false; sources.len()];
    if sources.is_empty() {
        return stable;
    }

    // tails[k]: position of the smallest tail of an increasing run of length k + 1.
    let mut tails: Vec<usize> = Vec::with_capacity(sources.len());
    let mut predecessor: Vec<Option<usize>> = vec![None; sources.len()];

    for (position, &value) in sources.iter().enumerate() {
        let length = tails.partition_point(|&tail| sources[tail] < value);
        if length > 0 {
            predecessor[position] = Some(tails[length - 1]);
        }
        if length == tails.len() {
            tails.push(position);
        } else {
            tails[length] = position;
        }
    }

    let mut cursor = tails.last().copied();
    while let Some(position) = cursor {
        stable[position] = true;
        cursor = predecessor[position];
    }
    stable
}

/// Slot assignment for one reconciliation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Layout {
    /// Slot of each surviving previous child, `None` for removed ones.
    pub(crate) prev: Vec<Option<usize>>,
    /// Slot each next child ends up in.
    pub(crate) next: Vec<usize>,
    pub(crate) len: usize,
}

/// Lay out the slots of a reconciliation.
///
/// Stable children are anchors and keep a single slot. Between two anchors
/// the next children placed there come first, in next order, followed by the
/// previous children that used to sit there and will be moved away, in
/// previous order. Placing each next child right after the one before it
/// never has to look outside its own slot.
pub(crate) fn layout(prev_len: usize, matches: &[Option<usize>], stable: &[bool]) -> Layout {
    let mut anchored = vec![false; prev_len];
    let mut survives = vec![false; prev_len];
    let mut anchors: Vec<usize> = Vec::new();
    // placed[g]: next children placed after the g-th anchor.
    let mut placed: Vec<Vec<usize>> = vec![Vec::new()];

    let mut rank = 0;
    for (index, matched) in matches.iter().enumerate() {
        if let Some(source) = *matched {
            survives[source] = true;
            let is_stable = stable.get(rank).copied().unwrap_or(false);
            rank += 1;
            if is_stable {
                anchored[source] = true;
                anchors.push(index);
                placed.push(Vec::new());
                continue;
            }
        }
        if let Some(gap) = placed.last_mut() {
            gap.push(index);
        }
    }

    // departing[g]: previous children between anchor g and g + 1 that move.
    let mut departing: Vec<Vec<usize>> = vec![Vec::new(); placed.len()];
    let mut gap = 0;
    for source in 0..prev_len {
        if anchored[source] {
            gap += 1;
        } else if survives[source] {
            departing[gap].push(source);
        }
    }

    let mut prev = vec![None; prev_len];
    let mut next = vec![0; matches.len()];
    let mut len = 0;
    for (gap, (placed, departing)) in placed.iter().zip(&departing).enumerate() {
        if gap > 0 {
            let anchor = anchors[gap - 1];
            next[anchor] = len;
            if let Some(source) = matches[anchor] {
                prev[source] = Some(len);
            }
            len += 1;
        }
        for &index in placed {
            next[index] = len;
            len += 1;
        }
        for &source in departing {
            prev[source] = Some(len);
            len += 1;
        }
    }

    Layout { prev, next, len }
}

/// The live children of one parent, as occupied slots of a [`Layout`].
///
/// A Fenwick tree over the slots answers "how many live children precede
/// this slot" and "which child comes next" in O(log n).
#[derive(Debug)]
pub(crate) struct LiveOrder {
    tree: Vec<usize>,
    occupants: Vec<Option<Hid>>,
}

impl LiveOrder {
    pub(crate) fn new(len: usize) -> Self {
        Self {
            tree: vec![0; len + 1],
            occupants: vec![None; len],
        }
    }

    pub(crate) fn occupy(&mut self, slot: usize, hid: Hid) {
        if self.occupants[slot].replace(hid).is_none() {
            self.update(slot, true);
        }
    }

    pub(crate) fn vacate(&mut self, slot: usize) {
        if self.occupants[slot].take().is_some() {
            self.update(slot, false);
        }
    }

    /// Live index a child in `slot` has, or would have once placed.
    pub(crate) fn index_of(&self, slot: usize) -> usize {
        let mut cursor = slot;
        let mut count = 0;
        while cursor > 0 {
            count += self.tree[cursor];
            cursor &= cursor - 1;
        }
        count
    }

    /// The first live child after the empty `slot`.
    pub(crate) fn after(&self, slot: usize) -> Option<Hid> {
        self.nth(self.index_of(slot)).and_then(|slot| self.occupants[slot])
    }

    /// Slot of the live child at index `n`.
    fn nth(&self, mut n: usize) -> Option<usize> {
        let len = self.occupants.len();
        let mut position = 0;
        let mut step = len.next_power_of_two();
        while step > 0 {
            let candidate = position + step;
            if candidate <= len && self.tree[candidate] <= n {
                position = candidate;
                n -= self.tree[candidate];
            }
            step >>= 1;
        }
        (position < len).then_some(position)
    }

    fn update(&mut self, slot: usize, occupied: bool) {
        let mut cursor = slot + 1;
        while cursor < self.tree.len() {
            if occupied {
                self.tree[cursor] += 1;
            } else {
                self.tree[cursor] -= 1;
            }
            cursor += cursor & cursor.wrapping_neg();
        }
    }
}

// ---- Tests ----
