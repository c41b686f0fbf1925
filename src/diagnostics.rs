// SPDX-License-Identifier: MPL-2.0
//! Shared diagnostic record (C8): fixed-size power-of-two rings of per-call and per-partition
//! outcomes for post-mortem, read-only from the consumer's side (§3, §9).

use crate::error::Error;
use crate::policy::BootMode;

pub const MAX_KERNEL_CALLS: usize = 8;
pub const MAX_KERNEL_PARTS: usize = 16;

/// Outcome of verifying a single candidate partition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CheckResult {
    Unchecked,
    Ok,
    Failed(FailureCode),
}

/// A coarse, `Copy`-friendly mirror of `Error` for storage in the ring (the ring must stay
/// `Copy`/zeroable; `Error` already is, but this keeps the ring's own shape stable even if
/// `Error`'s variant set grows).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureCode {
    Io,
    Gpt,
    Verify,
    Policy,
    Nv,
}

impl From<Error> for FailureCode {
    fn from(e: Error) -> Self {
        match e {
            Error::Io(_) => FailureCode::Io,
            Error::Gpt(_) => FailureCode::Gpt,
            Error::Verify(_) => FailureCode::Verify,
            Error::Policy(_) => FailureCode::Policy,
            Error::Nv(_) => FailureCode::Nv,
            Error::Load(_) => FailureCode::Gpt,
        }
    }
}

/// Per-partition diagnostic record (mirrors `VbSharedDataKernelPart`).
#[derive(Debug, Clone, Copy)]
pub struct PartitionRecord {
    pub gpt_index: usize,
    pub combined_version: u32,
    pub key_block_trusted: bool,
    pub check_result: CheckResult,
}

impl Default for PartitionRecord {
    fn default() -> Self {
        PartitionRecord {
            gpt_index: 0,
            combined_version: 0,
            key_block_trusted: false,
            check_result: CheckResult::Unchecked,
        }
    }
}

/// Per-call diagnostic record (mirrors `VbSharedDataKernelCall`): the boot-flags snapshot and
/// disk geometry recorded at the start of `load_kernel`, plus every partition tried.
#[derive(Debug, Clone, Copy)]
pub struct CallRecord {
    pub sector_size: u32,
    pub sector_count: u64,
    pub boot_mode: BootMode,
    parts: [PartitionRecord; MAX_KERNEL_PARTS],
    part_count: usize,
}

impl CallRecord {
    pub fn new(sector_size: u32, sector_count: u64, boot_mode: BootMode) -> Self {
        CallRecord {
            sector_size,
            sector_count,
            boot_mode,
            parts: [PartitionRecord::default(); MAX_KERNEL_PARTS],
            part_count: 0,
        }
    }

    pub fn record_partition(&mut self, record: PartitionRecord) {
        let idx = self.part_count & (MAX_KERNEL_PARTS - 1);
        self.parts[idx] = record;
        self.part_count += 1;
    }

    pub fn partitions(&self) -> &[PartitionRecord] {
        let n = self.part_count.min(MAX_KERNEL_PARTS);
        &self.parts[..n]
    }
}

/// The ring of call records. Indexing is `count AND (capacity-1)`; entries are zeroed on reuse.
pub struct DiagnosticRing {
    calls: [Option<CallRecord>; MAX_KERNEL_CALLS],
    count: usize,
}

impl DiagnosticRing {
    pub fn new() -> Self {
        DiagnosticRing {
            calls: [None; MAX_KERNEL_CALLS],
            count: 0,
        }
    }

    pub fn begin_call(&mut self, record: CallRecord) -> &mut CallRecord {
        let idx = self.count & (MAX_KERNEL_CALLS - 1);
        self.calls[idx] = Some(record);
        self.count += 1;
        self.calls[idx].as_mut().unwrap()
    }

    pub fn latest(&self) -> Option<&CallRecord> {
        if self.count == 0 {
            return None;
        }
        let idx = (self.count - 1) & (MAX_KERNEL_CALLS - 1);
        self.calls[idx].as_ref()
    }
}

impl Default for DiagnosticRing {
    fn default() -> Self {
        Self::new()
    }
}
