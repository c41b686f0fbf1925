// SPDX-License-Identifier: MPL-2.0
//! On-disk GPT partition entry (UEFI spec §5.3.3) and the kernel-partition attribute bits.

use static_assertions::assert_eq_size;
use uuid::Uuid;
use zerocopy::{AsBytes, FromBytes};

use crate::error::GptError;

/// ChromeOS kernel partition type GUID (`FE3A2A5D-4F32-41A7-B725-ACCC3285A309`).
pub const KERNEL_TYPE_GUID: [u8; 16] = [
    0x5D, 0x2A, 0x3A, 0xFE, 0x32, 0x4F, 0xA7, 0x41, 0xB7, 0x25, 0xAC, 0xCC, 0x32, 0x85, 0xA3, 0x09,
];

const TRIES_SHIFT: u64 = 48;
const TRIES_MASK: u64 = 0xF;
const PRIORITY_SHIFT: u64 = 52;
const PRIORITY_MASK: u64 = 0xF;
const SUCCESSFUL_BIT: u64 = 1 << 56;

#[repr(C)]
#[derive(Clone, Copy, FromBytes, AsBytes)]
pub struct Entry {
    pub type_guid: [u8; 16],
    pub unique_guid: [u8; 16],
    pub starting_lba: u64,
    pub ending_lba: u64,
    pub attributes: u64,
    pub name: [u16; 36],
}
assert_eq_size!(Entry, [u8; 128]);

impl Default for Entry {
    fn default() -> Self {
        Entry {
            type_guid: [0; 16],
            unique_guid: [0; 16],
            starting_lba: 0,
            ending_lba: 0,
            attributes: 0,
            name: [0; 36],
        }
    }
}

impl Entry {
    pub fn is_unused(&self) -> bool {
        self.type_guid == [0u8; 16]
    }

    pub fn is_kernel(&self) -> bool {
        self.type_guid == KERNEL_TYPE_GUID
    }

    pub fn type_guid_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.type_guid)
    }

    pub fn unique_guid_uuid(&self) -> Uuid {
        Uuid::from_bytes(self.unique_guid)
    }

    pub fn tries(&self) -> u8 {
        ((self.attributes >> TRIES_SHIFT) & TRIES_MASK) as u8
    }

    pub fn priority(&self) -> u8 {
        ((self.attributes >> PRIORITY_SHIFT) & PRIORITY_MASK) as u8
    }

    pub fn successful(&self) -> bool {
        self.attributes & SUCCESSFUL_BIT != 0
    }

    pub fn set_tries(&mut self, tries: u8) {
        let tries = (tries as u64 & TRIES_MASK) << TRIES_SHIFT;
        self.attributes = (self.attributes & !(TRIES_MASK << TRIES_SHIFT)) | tries;
    }

    pub fn set_priority(&mut self, priority: u8) {
        let priority = (priority as u64 & PRIORITY_MASK) << PRIORITY_SHIFT;
        self.attributes = (self.attributes & !(PRIORITY_MASK << PRIORITY_SHIFT)) | priority;
    }

    pub fn set_successful(&mut self, successful: bool) {
        if successful {
            self.attributes |= SUCCESSFUL_BIT;
        } else {
            self.attributes &= !SUCCESSFUL_BIT;
        }
    }

    /// §4.2 `update_current(TRY)`: decrement `tries` while not yet successful. Returns whether
    /// the entry's attributes actually changed, so a caller only marks the entries array dirty
    /// when there's something to write back (a no-op on an already-`successful` entry must not
    /// schedule a rewrite).
    pub fn apply_try(&mut self) -> bool {
        if !self.successful() && self.tries() > 0 {
            self.set_tries(self.tries() - 1);
            true
        } else {
            false
        }
    }

    /// §4.2 `update_current(BAD)`: permanent ejection from future boots.
    pub fn apply_bad(&mut self) {
        self.set_priority(0);
        self.set_tries(0);
        self.set_successful(false);
    }

    pub fn eligible(&self) -> bool {
        self.priority() > 0 || self.successful()
    }
}

/// Validates `number_of_entries × 128` bytes of entry data against the header's usable range:
/// no entry outside `[first_usable_lba, last_usable_lba]`, no overlap, no duplicate GUID.
pub fn validate_entries(
    entries: &[Entry],
    first_usable_lba: u64,
    last_usable_lba: u64,
) -> Result<(), GptError> {
    for (i, a) in entries.iter().enumerate() {
        if a.is_unused() {
            continue;
        }
        if a.starting_lba > a.ending_lba {
            return Err(GptError::EntryOutOfRange);
        }
        if a.starting_lba < first_usable_lba || a.ending_lba > last_usable_lba {
            return Err(GptError::EntryOutOfRange);
        }
        for b in entries[i + 1..].iter() {
            if b.is_unused() {
                continue;
            }
            if a.unique_guid == b.unique_guid {
                return Err(GptError::DuplicateGuid);
            }
            if a.starting_lba <= b.ending_lba && b.starting_lba <= a.ending_lba {
                return Err(GptError::StartLbaOverlap);
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn kernel_entry(start: u64, end: u64, guid_tag: u8) -> Entry {
        let mut e = Entry::default();
        e.type_guid = KERNEL_TYPE_GUID;
        e.unique_guid = [guid_tag; 16];
        e.starting_lba = start;
        e.ending_lba = end;
        e
    }

    #[test]
    fn try_decrements_only_when_not_successful() {
        let mut e = Entry::default();
        e.set_tries(3);
        assert!(e.apply_try());
        assert_eq!(e.tries(), 2);
        assert!(!e.successful());

        let mut e2 = Entry::default();
        e2.set_tries(3);
        e2.set_successful(true);
        assert!(!e2.apply_try());
        assert_eq!(e2.tries(), 3);
    }

    #[test]
    fn bad_is_final() {
        let mut e = Entry::default();
        e.set_priority(4);
        e.set_tries(2);
        e.set_successful(true);
        e.apply_bad();
        assert_eq!(e.priority(), 0);
        assert_eq!(e.tries(), 0);
        assert!(!e.successful());
        assert!(!e.eligible());
    }

    #[test]
    fn attribute_fields_round_trip() {
        let mut e = Entry::default();
        e.set_tries(9);
        e.set_priority(7);
        e.set_successful(true);
        assert_eq!(e.tries(), 9);
        assert_eq!(e.priority(), 7);
        assert!(e.successful());
    }

    #[test]
    fn validate_entries_rejects_overlap() {
        let entries = [kernel_entry(100, 200, 1), kernel_entry(150, 250, 2)];
        assert_eq!(
            validate_entries(&entries, 34, 1000),
            Err(GptError::StartLbaOverlap)
        );
    }

    #[test]
    fn validate_entries_rejects_duplicate_guid() {
        let entries = [kernel_entry(100, 200, 1), kernel_entry(300, 400, 1)];
        assert_eq!(
            validate_entries(&entries, 34, 1000),
            Err(GptError::DuplicateGuid)
        );
    }

    #[test]
    fn validate_entries_accepts_disjoint_entries() {
        let entries = [kernel_entry(100, 200, 1), kernel_entry(300, 400, 2)];
        assert_eq!(validate_entries(&entries, 34, 1000), Ok(()));
    }
}
