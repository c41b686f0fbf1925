// SPDX-License-Identifier: MPL-2.0
//! Kernel-partition enumeration in `(priority DESC, tries DESC, successful DESC, index ASC)`
//! order (§4.2, §8 law 3), plus the TRY/BAD mutation hooks.

use heapless::consts::U128;
use heapless::Vec;

use crate::gpt::entry::Entry;
use crate::gpt::table::GptTable;

/// A candidate kernel partition ready for verification: its index into `GptTable::entries`, and
/// its LBA span.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Candidate {
    pub index: usize,
    pub start_lba: u64,
    pub size_lba: u64,
}

/// Sort key such that a plain ascending sort on the key yields the required order: priority and
/// tries and successful are negated (DESC becomes ASC), index is kept ascending, so the whole key
/// is a total order with no ties (§8 law 3) and `sort_unstable_by_key` is safe to use without a
/// stability requirement.
fn sort_key(entry: &Entry, index: usize) -> (u8, u8, u8, usize) {
    (
        u8::MAX - entry.priority(),
        u8::MAX - entry.tries(),
        if entry.successful() { 0 } else { 1 },
        index,
    )
}

pub struct KernelIterator {
    order: Vec<usize, U128>,
    position: usize,
    current_kernel: isize,
}

impl KernelIterator {
    /// Builds the iteration order from the eligible kernel entries in `table` (§4.2 steps 1-2).
    pub fn new(table: &GptTable) -> Self {
        let mut indices: Vec<usize, U128> = Vec::new();
        for (i, e) in table.entries.iter().enumerate() {
            if e.is_kernel() && e.eligible() {
                let _ = indices.push(i);
            }
        }
        let mut indexed: Vec<(usize, Entry), U128> = Vec::new();
        for &i in indices.iter() {
            let _ = indexed.push((i, table.entries[i]));
        }
        indexed.sort_unstable_by_key(|(i, e)| sort_key(e, *i));

        let mut order: Vec<usize, U128> = Vec::new();
        for (i, _) in indexed.iter() {
            let _ = order.push(*i);
        }

        KernelIterator {
            order,
            position: 0,
            current_kernel: -1,
        }
    }

    /// Yields the next candidate, or `None` once the ordered set is exhausted.
    pub fn next(&mut self, table: &GptTable) -> Option<Candidate> {
        if self.position >= self.order.len() {
            return None;
        }
        let index = self.order[self.position];
        self.position += 1;
        self.current_kernel = index as isize;

        let entry = table.entries[index];

        Some(Candidate {
            index,
            start_lba: entry.starting_lba,
            size_lba: entry.ending_lba - entry.starting_lba + 1,
        })
    }

    pub fn current_index(&self) -> Option<usize> {
        if self.current_kernel < 0 {
            None
        } else {
            Some(self.current_kernel as usize)
        }
    }

    /// §4.2 `update_current(TRY)`. A no-op on an already-`successful` entry does not mark the
    /// entries array dirty (§8 law / scenario S1).
    pub fn apply_try(&self, table: &mut GptTable) {
        if let Some(i) = self.current_index() {
            if table.entries[i].apply_try() {
                table.mark_entries_dirty();
            }
        }
    }

    /// §4.2 `update_current(BAD)`.
    pub fn apply_bad(&self, table: &mut GptTable) {
        if let Some(i) = self.current_index() {
            table.entries[i].apply_bad();
            table.mark_entries_dirty();
        }
    }
}
