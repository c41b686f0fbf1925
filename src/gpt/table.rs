// SPDX-License-Identifier: MPL-2.0
//! The primary/secondary header+entries aggregate: load, cross-validate, repair, and the
//! `modified` dirty mask that gates which copies get written back (§4.1, §5).

use bitflags::bitflags;
use heapless::consts::U128;
use heapless::Vec;
use zerocopy::AsBytes;

use crate::error::GptError;
use crate::gpt::entry::{validate_entries, Entry};
use crate::gpt::header::{total_entries_bytes, validate_header, Header, Which, GPT_ENTRY_SIZE};

bitflags! {
    /// Which on-disk copies need to be (re-)written, mirroring `GPT_MODIFIED_*` in the original
    /// library. The writer only ever writes what is flagged here.
    pub struct Modified: u8 {
        const HEADER1  = 0b0001;
        const HEADER2  = 0b0010;
        const ENTRIES1 = 0b0100;
        const ENTRIES2 = 0b1000;
    }
}

/// Geometry flags read off the drive. `EXTERNAL` is rejected until a host sets both
/// `gpt_drive_sectors` and `stored_on_device` explicitly (see DESIGN.md Open Question).
bitflags! {
    pub struct GptFlags: u8 {
        const EXTERNAL = 0b0001;
    }
}

pub struct GptTable {
    pub primary_header: Header,
    pub secondary_header: Header,
    pub entries: Vec<Entry, U128>,
    pub modified: Modified,
    pub(crate) header_valid: [bool; 2],
}

impl GptTable {
    /// Loads and cross-validates both copies. At least one header and one entries array must be
    /// valid or this fails with `InvalidHeaders` / `InvalidEntries` (§4.1 invariant 4).
    pub fn load(
        primary_header_buf: &[u8],
        primary_entries_buf: &[u8],
        secondary_header_buf: &[u8],
        secondary_entries_buf: &[u8],
        sector_bytes: u32,
        drive_sectors: u64,
        flags: GptFlags,
    ) -> Result<Self, GptError> {
        if flags.contains(GptFlags::EXTERNAL) {
            return Err(GptError::ExternalGptUnsupported);
        }

        let primary = validate_header(primary_header_buf, Which::Primary, sector_bytes, drive_sectors);
        let secondary =
            validate_header(secondary_header_buf, Which::Secondary, sector_bytes, drive_sectors);

        let (header, header_valid, modified_header) = match (primary, secondary) {
            (Ok(p), Ok(_)) => (p, [true, true], Modified::empty()),
            (Ok(p), Err(_)) => (p, [true, false], Modified::HEADER2),
            (Err(_), Ok(s)) => (s, [false, true], Modified::HEADER1),
            (Err(_), Err(_)) => return Err(GptError::InvalidHeaders),
        };

        let n = header.number_of_entries as usize;
        let entries_len = total_entries_bytes(header.number_of_entries);
        if primary_entries_buf.len() < entries_len || secondary_entries_buf.len() < entries_len {
            return Err(GptError::EntriesOutOfRegion);
        }

        let parse_entries = |buf: &[u8]| -> Option<Vec<Entry, U128>> {
            let mut out: Vec<Entry, U128> = Vec::new();
            for chunk in buf[..entries_len].chunks(GPT_ENTRY_SIZE as usize) {
                let e = *zerocopy::LayoutVerified::<&[u8], Entry>::new(chunk)?;
                out.push(e).ok()?;
            }
            Some(out)
        };

        let primary_entries_crc = crate::crc::crc32(&primary_entries_buf[..entries_len]);
        let secondary_entries_crc = crate::crc::crc32(&secondary_entries_buf[..entries_len]);

        let primary_entries_ok = primary_entries_crc == header.entries_crc32;
        let secondary_entries_ok = secondary_entries_crc == header.entries_crc32;

        let (entries, modified_entries) = if primary_entries_ok {
            (
                parse_entries(primary_entries_buf).ok_or(GptError::BadEntrySize)?,
                if secondary_entries_ok {
                    Modified::empty()
                } else {
                    Modified::ENTRIES2
                },
            )
        } else if secondary_entries_ok {
            (
                parse_entries(secondary_entries_buf).ok_or(GptError::BadEntrySize)?,
                Modified::ENTRIES1,
            )
        } else {
            return Err(GptError::InvalidEntries);
        };

        if entries.len() != n {
            return Err(GptError::BadEntrySize);
        }

        validate_entries(&entries, header.first_usable_lba, header.last_usable_lba)?;

        Ok(GptTable {
            primary_header: if header_valid[0] {
                header
            } else {
                derive_sibling(&header, Which::Primary, sector_bytes, drive_sectors)
            },
            secondary_header: if header_valid[1] {
                header
            } else {
                derive_sibling(&header, Which::Secondary, sector_bytes, drive_sectors)
            },
            entries,
            modified: modified_header | modified_entries,
            header_valid,
        })
    }

    /// Recomputes the CRCs of whichever copies are flagged dirty, the way `repair()` regenerates
    /// a header copied from its sibling before it's written back.
    pub fn repair(&mut self) {
        if self.modified.contains(Modified::HEADER1) {
            self.primary_header.recompute_crc32();
        }
        if self.modified.contains(Modified::HEADER2) {
            self.secondary_header.recompute_crc32();
        }
        let entries_crc = self.entries_crc32();
        if self.modified.contains(Modified::ENTRIES1) || self.modified.contains(Modified::ENTRIES2) {
            self.primary_header.entries_crc32 = entries_crc;
            self.secondary_header.entries_crc32 = entries_crc;
        }
    }

    pub fn entries_crc32(&self) -> u32 {
        let mut buf = [0u8; crate::gpt::header::MAX_GPT_ENTRIES as usize * GPT_ENTRY_SIZE as usize];
        let mut n = 0;
        for e in self.entries.iter() {
            let bytes = e.as_bytes();
            buf[n..n + bytes.len()].copy_from_slice(bytes);
            n += bytes.len();
        }
        crate::crc::crc32(&buf[..n])
    }

    /// Marks an entries-array write needed after mutating an entry (TRY/BAD).
    pub fn mark_entries_dirty(&mut self) {
        self.modified.insert(Modified::ENTRIES1 | Modified::ENTRIES2);
    }
}

fn derive_sibling(valid: &Header, which: Which, sector_bytes: u32, drive_sectors: u64) -> Header {
    let mut sibling = *valid;
    let entries_sectors = (total_entries_bytes(valid.number_of_entries) as u64
        + sector_bytes as u64
        - 1)
        / sector_bytes as u64;
    match which {
        Which::Primary => {
            sibling.my_lba = 1;
            sibling.alternate_lba = drive_sectors - 1;
            sibling.entries_lba = 2;
        }
        Which::Secondary => {
            sibling.my_lba = drive_sectors - 1;
            sibling.alternate_lba = 1;
            sibling.entries_lba = drive_sectors - 1 - entries_sectors;
        }
    }
    sibling.recompute_crc32();
    sibling
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn modified_flags_combine() {
        let m = Modified::HEADER1 | Modified::ENTRIES1;
        assert!(m.contains(Modified::HEADER1));
        assert!(m.contains(Modified::ENTRIES1));
        assert!(!m.contains(Modified::HEADER2));
    }

    #[test]
    fn external_flag_is_rejected_before_any_crc_work() {
        let result = GptTable::load(&[], &[], &[], &[], 512, 2048, GptFlags::EXTERNAL);
        assert_eq!(result.unwrap_err(), GptError::ExternalGptUnsupported);
    }
}
