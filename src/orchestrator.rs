// SPDX-License-Identifier: MPL-2.0
//! `load_kernel` (C7): reads and cross-validates the GPT, walks candidates in priority order,
//! verifies each one's signature chain, and selects the first that also passes its body
//! verification, mirroring `LoadKernel()` in the original library's `vboot_kernel.c` (§4.5).

use log::{debug, error, info, warn};
use zerocopy::AsBytes;

use crate::collaborators::{Crypto, Digest, Disk, NvStorage, PublicKey, SecureCounter};
use crate::diagnostics::{CallRecord, CheckResult, DiagnosticRing, FailureCode, PartitionRecord};
use crate::error::{IoError, LoadError};
use crate::gpt::header::{GPT_ENTRY_SIZE, MAX_GPT_ENTRIES};
use crate::gpt::table::{GptFlags, GptTable, Modified};
use crate::gpt::{Entry, Header, KernelIterator};
use crate::nvdata::{FwResult, NvContext, RecoveryReason};
use crate::policy::{check_key_block_policy, check_rollback, BootMode, ModeInputs};
use crate::verify::{verify_body, verify_key_block, verify_preamble};

/// Largest prefix of a candidate partition read before any verification is attempted, matching
/// the original library's `KBUF_SIZE`: large enough to hold a key block and preamble together.
pub const KBUF_SIZE: usize = 65536;

const MAX_SECTOR_BYTES: usize = 4096;
const TOTAL_ENTRIES_SIZE: usize = MAX_GPT_ENTRIES as usize * GPT_ENTRY_SIZE as usize;

/// Everything the core needs to judge a candidate that the caller, not the disk, supplies (§4.4,
/// §6). `recovery_line`/`developer_line`/`force_dev_on` are the hardware/GBB inputs; the
/// NV-sourced inputs (`require_official_os`, `rec_request`, `previous_boot_failed`) are read from
/// the NV block directly by `load_kernel`, not supplied here.
pub struct VerificationContext {
    pub recovery_line: bool,
    pub developer_line: bool,
    pub force_dev_on: bool,
    pub firmware_root_key: PublicKey,
    pub recovery_root_key: PublicKey,
    /// Trusted hash of a known-good key block, for developer-mode hash-only acceptance.
    pub trusted_key_block_hash: Option<Digest>,
}

/// The winning partition (§4.5 contract).
#[derive(Debug, Clone, Copy)]
pub struct Selected {
    pub gpt_index: usize,
    pub partition_guid: [u8; 16],
    pub body_load_address: u64,
    pub bootloader_address: u64,
    pub bootloader_size: u32,
    pub combined_version: u32,
    /// Mirrors `VBSD_KERNEL_KEY_VERIFIED`: `false` if the winning key block was only accepted by
    /// hash, so callers gate secure-counter writes on this before trusting `combined_version`.
    pub key_block_valid: bool,
}

/// Reads, validates, and cross-checks both GPT copies. Entries are always read as a fixed
/// `TOTAL_ENTRIES_SIZE` window immediately adjoining each header, matching the layout this core's
/// header validator expects (§4.1, §9 GPT buffer sizing).
fn read_gpt(disk: &mut dyn Disk, sector_bytes: u32, sector_count: u64) -> Result<GptTable, LoadError> {
    let entries_sectors = (TOTAL_ENTRIES_SIZE as u64 + sector_bytes as u64 - 1) / sector_bytes as u64;
    let primary_entries_lba = 2u64;
    let secondary_header_lba = sector_count - 1;
    let secondary_entries_lba = secondary_header_lba - entries_sectors;

    let mut primary_header_buf = [0u8; MAX_SECTOR_BYTES];
    let mut secondary_header_buf = [0u8; MAX_SECTOR_BYTES];
    let mut primary_entries_buf = [0u8; TOTAL_ENTRIES_SIZE];
    let mut secondary_entries_buf = [0u8; TOTAL_ENTRIES_SIZE];

    let reads: [Result<(), IoError>; 4] = [
        disk.read(1, 1, &mut primary_header_buf[..sector_bytes as usize]),
        disk.read(primary_entries_lba, entries_sectors, &mut primary_entries_buf),
        disk.read(secondary_header_lba, 1, &mut secondary_header_buf[..sector_bytes as usize]),
        disk.read(secondary_entries_lba, entries_sectors, &mut secondary_entries_buf),
    ];
    if reads.iter().any(Result::is_err) {
        warn!("GPT read failed");
        return Err(LoadError::GptRead);
    }

    GptTable::load(
        &primary_header_buf[..sector_bytes as usize],
        &primary_entries_buf,
        &secondary_header_buf[..sector_bytes as usize],
        &secondary_entries_buf,
        sector_bytes,
        sector_count,
        GptFlags::empty(),
    )
    .map_err(|e| {
        warn!("GPT parse failed: {}", e);
        LoadError::GptParse
    })
}

fn entries_buf(table: &GptTable) -> [u8; TOTAL_ENTRIES_SIZE] {
    let mut buf = [0u8; TOTAL_ENTRIES_SIZE];
    let mut n = 0;
    for e in table.entries.iter() {
        let bytes = e.as_bytes();
        buf[n..n + bytes.len()].copy_from_slice(bytes);
        n += bytes.len();
    }
    buf
}

/// Writes back whichever copies `table.modified` flags, in the fixed order primary header,
/// primary entries, secondary header, secondary entries, stopping at the first failure (§5).
fn write_back_gpt(table: &GptTable, disk: &mut dyn Disk, sector_bytes: u32, sector_count: u64) {
    let entries_sectors = (TOTAL_ENTRIES_SIZE as u64 + sector_bytes as u64 - 1) / sector_bytes as u64;
    let secondary_header_lba = sector_count - 1;
    let secondary_entries_lba = secondary_header_lba - entries_sectors;

    let mut header_buf = [0u8; MAX_SECTOR_BYTES];

    if table.modified.contains(Modified::HEADER1) {
        header_buf[..core::mem::size_of::<Header>()].copy_from_slice(table.primary_header.as_bytes());
        if disk.write(1, 1, &header_buf[..sector_bytes as usize]).is_err() {
            error!("failed writing primary GPT header");
            return;
        }
    }
    if table.modified.contains(Modified::ENTRIES1) {
        let buf = entries_buf(table);
        if disk.write(2, entries_sectors, &buf).is_err() {
            error!("failed writing primary GPT entries");
            return;
        }
    }
    if table.modified.contains(Modified::HEADER2) {
        header_buf = [0u8; MAX_SECTOR_BYTES];
        header_buf[..core::mem::size_of::<Header>()]
            .copy_from_slice(table.secondary_header.as_bytes());
        if disk.write(secondary_header_lba, 1, &header_buf[..sector_bytes as usize]).is_err() {
            error!("failed writing secondary GPT header");
            return;
        }
    }
    if table.modified.contains(Modified::ENTRIES2) {
        let buf = entries_buf(table);
        if disk.write(secondary_entries_lba, entries_sectors, &buf).is_err() {
            error!("failed writing secondary GPT entries");
        }
    }
}

/// `load_kernel(ctx, disk, crypto, secure_counter, nv_storage, load_buffer, diagnostics)` (§4.5).
///
/// `load_buffer` is the caller-owned destination the winning kernel body is read into; its length
/// is the load-buffer bound `verify_body` checks candidates against (§4.3 `BodyExceedsBuffer`).
pub fn load_kernel(
    ctx: &VerificationContext,
    disk: &mut dyn Disk,
    crypto: &dyn Crypto,
    secure_counter: &mut dyn SecureCounter,
    nv_storage: &mut dyn NvStorage,
    load_buffer: &mut [u8],
    diagnostics: &mut DiagnosticRing,
) -> Result<Selected, LoadError> {
    let sector_bytes = disk.sector_bytes();
    let sector_count = disk.sector_count();
    if sector_bytes == 0 || sector_bytes as usize > MAX_SECTOR_BYTES || sector_count < 3 {
        return Err(LoadError::InvalidParameter);
    }

    let mut nv = NvContext::setup(nv_storage.read_block());
    nv.expire_stale_trying();

    let mode_inputs = ModeInputs {
        recovery_line: ctx.recovery_line,
        developer_line: ctx.developer_line,
        force_dev_on: ctx.force_dev_on,
        require_official_os: nv.dev_boot_signed_only(),
        rec_request: nv.recovery_request(),
        previous_boot_failed: nv.fw_prev_result() == FwResult::Failure,
    };
    let mode = mode_inputs.derive_mode();
    info!("load_kernel: boot mode {:?}", mode);

    let mut table = match read_gpt(disk, sector_bytes, sector_count) {
        Ok(t) => t,
        Err(e) => {
            nv.set_recovery_request(match e {
                LoadError::GptRead => RecoveryReason::RwNoOs,
                _ => RecoveryReason::RwInvalidOs,
            });
            persist_nv(nv, nv_storage);
            return Err(e);
        }
    };

    let call_record = diagnostics.begin_call(CallRecord::new(sector_bytes, sector_count, mode));

    let mut iter = KernelIterator::new(&table);
    let mut best: Option<Selected> = None;
    let mut lowest_version: Option<u32> = None;
    let mut any_signature_verified = false;
    let mut found_any_kernel = false;

    let root_key = match mode {
        BootMode::Recovery => &ctx.recovery_root_key,
        _ => &ctx.firmware_root_key,
    };
    let allow_hash_only = mode == BootMode::Developer;

    while let Some(candidate) = iter.next(&table) {
        found_any_kernel = true;
        let entry: Entry = table.entries[candidate.index];
        let partition_size_bytes = candidate.size_lba.saturating_mul(sector_bytes as u64);
        let mut record = PartitionRecord {
            gpt_index: candidate.index,
            combined_version: 0,
            key_block_trusted: false,
            check_result: CheckResult::Unchecked,
        };

        let mut kbuf = [0u8; KBUF_SIZE];
        let read_len = KBUF_SIZE.min(partition_size_bytes as usize);
        let kbuf_sectors = (read_len as u64 + sector_bytes as u64 - 1) / sector_bytes as u64;
        if disk.read(candidate.start_lba, kbuf_sectors, &mut kbuf[..read_len]).is_err() {
            debug!("partition {}: short read, skipping", candidate.index);
            record.check_result = CheckResult::Failed(FailureCode::Io);
            call_record.record_partition(record);
            continue;
        }

        let key_block = match verify_key_block(&kbuf[..read_len], root_key, ctx.trusted_key_block_hash.as_ref(), allow_hash_only, crypto) {
            Ok(kb) => kb,
            Err(e) => {
                debug!("partition {}: key block rejected: {}", candidate.index, e);
                if mode != BootMode::Developer {
                    iter.apply_bad(&mut table);
                }
                record.check_result = CheckResult::Failed(FailureCode::Verify);
                call_record.record_partition(record);
                continue;
            }
        };
        record.key_block_trusted = key_block.trusted;

        if let Err(e) = check_key_block_policy(mode, key_block.flags, key_block.trusted, mode_inputs.require_official_os) {
            debug!("partition {}: key block policy rejected: {}", candidate.index, e);
            iter.apply_bad(&mut table);
            record.check_result = CheckResult::Failed(FailureCode::Policy);
            call_record.record_partition(record);
            continue;
        }

        let preamble_buf = &kbuf[key_block.key_block_size..read_len];
        let preamble = match verify_preamble(
            preamble_buf,
            &key_block.data_key,
            key_block.data_key_algorithm,
            sector_bytes,
            key_block.key_block_size as u64,
            crypto,
        ) {
            Ok(p) => p,
            Err(e) => {
                debug!("partition {}: preamble rejected: {}", candidate.index, e);
                iter.apply_bad(&mut table);
                record.check_result = CheckResult::Failed(FailureCode::Verify);
                call_record.record_partition(record);
                continue;
            }
        };

        let combined = ((key_block.key_version as u32) << 16) | (preamble.kernel_version as u32);
        record.combined_version = combined;

        if key_block.trusted {
            any_signature_verified = true;
            lowest_version = Some(lowest_version.map_or(combined, |l| l.min(combined)));

            if mode != BootMode::Recovery {
                if let Err(e) = check_rollback(mode, key_block.trusted, combined, secure_counter.read()) {
                    debug!("partition {}: rollback rejected: {}", candidate.index, e);
                    if mode != BootMode::Developer {
                        iter.apply_bad(&mut table);
                    }
                    record.check_result = CheckResult::Failed(FailureCode::Policy);
                    call_record.record_partition(record);
                    continue;
                }
            }
        }

        if best.is_some() {
            record.check_result = CheckResult::Ok;
            call_record.record_partition(record);
            continue;
        }

        let body_offset = preamble.body_offset;
        let body_start_lba = candidate.start_lba + body_offset / sector_bytes as u64;
        let data_size = preamble.body_data_size as usize;

        if data_size > load_buffer.len() {
            warn!("partition {}: body exceeds load buffer", candidate.index);
            iter.apply_bad(&mut table);
            record.check_result = CheckResult::Failed(FailureCode::Verify);
            call_record.record_partition(record);
            continue;
        }
        let body_sectors = (data_size as u64 + sector_bytes as u64 - 1) / sector_bytes as u64;
        if disk.read(body_start_lba, body_sectors, &mut load_buffer[..data_size]).is_err() {
            debug!("partition {}: body read failed", candidate.index);
            record.check_result = CheckResult::Failed(FailureCode::Io);
            call_record.record_partition(record);
            continue;
        }

        if let Err(e) = verify_body(
            &load_buffer[..data_size],
            preamble_buf,
            &preamble,
            &key_block.data_key,
            load_buffer.len() as u64,
            partition_size_bytes,
            crypto,
        ) {
            debug!("partition {}: body rejected: {}", candidate.index, e);
            iter.apply_bad(&mut table);
            record.check_result = CheckResult::Failed(FailureCode::Verify);
            call_record.record_partition(record);
            continue;
        }

        iter.apply_try(&mut table);
        record.check_result = CheckResult::Ok;
        call_record.record_partition(record);

        let selected = Selected {
            gpt_index: candidate.index,
            partition_guid: entry.unique_guid,
            body_load_address: preamble.body_load_address,
            bootloader_address: preamble.bootloader_address,
            bootloader_size: preamble.bootloader_size,
            combined_version: combined,
            key_block_valid: key_block.trusted,
        };
        let early_exit = mode == BootMode::Recovery || !key_block.trusted || Some(combined) == Some(secure_counter.read());
        best = Some(selected);
        if early_exit {
            break;
        }
    }

    match best {
        Some(selected) => {
            if any_signature_verified && mode != BootMode::Recovery && mode != BootMode::Developer {
                let lv = lowest_version.unwrap_or(secure_counter.read());
                let new_counter = secure_counter.read().max(lv);
                if new_counter > secure_counter.read() {
                    let _ = secure_counter.write(new_counter);
                }
            }
            let _ = secure_counter.lock(mode == BootMode::Recovery);

            table.repair();
            write_back_gpt(&table, disk, sector_bytes, sector_count);

            persist_nv(nv, nv_storage);
            info!("load_kernel: selected partition {}", selected.gpt_index);
            Ok(selected)
        }
        None => {
            let reason = if found_any_kernel {
                RecoveryReason::RwInvalidOs
            } else {
                RecoveryReason::RwNoOs
            };
            nv.set_recovery_request(reason);
            persist_nv(nv, nv_storage);
            Err(if found_any_kernel {
                LoadError::InvalidKernelFound
            } else {
                LoadError::NoKernelFound
            })
        }
    }
}

fn persist_nv(nv: NvContext, nv_storage: &mut dyn NvStorage) {
    let (raw, changed) = nv.teardown();
    if changed {
        let _ = nv_storage.write_block(&raw);
    }
}
