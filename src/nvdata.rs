// SPDX-License-Identifier: MPL-2.0
//! The 16-byte CRC-protected NV policy block codec (C2), its closed recovery-reason enum, and
//! the A/B firmware try logic that interacts with it (§4.6, §4.7).

use crate::crc::crc8;
use crate::error::NvError;

const HEADER_TAG_MASK: u8 = 0xF0;
const HEADER_TAG: u8 = 0x70;
const FIRMWARE_SETTINGS_RESET_BIT: u8 = 1 << 0;
const KERNEL_SETTINGS_RESET_BIT: u8 = 1 << 1;
const DEBUG_RESET_MODE_BIT: u8 = 1 << 2;

const DEV_BOOT_USB_BIT: u8 = 1 << 4;
const DEV_BOOT_SIGNED_ONLY_BIT: u8 = 1 << 5;
const DISABLE_DEV_REQUEST_BIT: u8 = 1 << 6;
const OPROM_NEEDED_BIT: u8 = 1 << 7;

const CLEAR_TPM_OWNER_REQUEST_BIT: u8 = 1 << 0;
const CLEAR_TPM_OWNER_DONE_BIT: u8 = 1 << 1;
const FW_TRY_NEXT_BIT: u8 = 1 << 2;
const FW_TRIED_BIT: u8 = 1 << 3;
const FW_RESULT_SHIFT: u8 = 4;
const FW_RESULT_MASK: u8 = 0b11;
const FW_PREV_TRIED_BIT: u8 = 1 << 6;

/// Mirrors `VBNV_RECOVERY_*` in the original library: C7/C6 both need to latch a specific
/// reason, not just "recovery: yes/no" (§3 supplement).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryReason {
    NotRequested,
    LegacyRecoveryBit,
    RoManual,
    RoInvalidRw,
    RoFirmware,
    RoTpmError,
    RoSharedData,
    RoTestS3,
    RoTestLfs,
    RoTestLk,
    RwDevScreen,
    RwNoOs,
    RwInvalidOs,
    RwTpmError,
    RwDevMismatch,
    RwSharedData,
    RwTestLk,
    RwNoDiskSpace,
    RwUnspecified,
    KernelManual,
    UsTest,
    Train,
    Unknown,
}

impl RecoveryReason {
    pub const fn to_u8(self) -> u8 {
        match self {
            RecoveryReason::NotRequested => 0,
            RecoveryReason::LegacyRecoveryBit => 1,
            RecoveryReason::RoManual => 2,
            RecoveryReason::RoInvalidRw => 3,
            RecoveryReason::RoFirmware => 4,
            RecoveryReason::RoTpmError => 5,
            RecoveryReason::RoSharedData => 6,
            RecoveryReason::RoTestS3 => 7,
            RecoveryReason::RoTestLfs => 8,
            RecoveryReason::RoTestLk => 9,
            RecoveryReason::RwDevScreen => 10,
            RecoveryReason::RwNoOs => 11,
            RecoveryReason::RwInvalidOs => 12,
            RecoveryReason::RwTpmError => 13,
            RecoveryReason::RwDevMismatch => 14,
            RecoveryReason::RwSharedData => 15,
            RecoveryReason::RwTestLk => 16,
            RecoveryReason::RwNoDiskSpace => 17,
            RecoveryReason::RwUnspecified => 18,
            RecoveryReason::KernelManual => 19,
            RecoveryReason::UsTest => 20,
            RecoveryReason::Train => 21,
            RecoveryReason::Unknown => 0xFF,
        }
    }

    pub const fn from_u8(value: u8) -> RecoveryReason {
        match value {
            0 => RecoveryReason::NotRequested,
            1 => RecoveryReason::LegacyRecoveryBit,
            2 => RecoveryReason::RoManual,
            3 => RecoveryReason::RoInvalidRw,
            4 => RecoveryReason::RoFirmware,
            5 => RecoveryReason::RoTpmError,
            6 => RecoveryReason::RoSharedData,
            7 => RecoveryReason::RoTestS3,
            8 => RecoveryReason::RoTestLfs,
            9 => RecoveryReason::RoTestLk,
            10 => RecoveryReason::RwDevScreen,
            11 => RecoveryReason::RwNoOs,
            12 => RecoveryReason::RwInvalidOs,
            13 => RecoveryReason::RwTpmError,
            14 => RecoveryReason::RwDevMismatch,
            15 => RecoveryReason::RwSharedData,
            16 => RecoveryReason::RwTestLk,
            17 => RecoveryReason::RwNoDiskSpace,
            18 => RecoveryReason::RwUnspecified,
            19 => RecoveryReason::KernelManual,
            20 => RecoveryReason::UsTest,
            21 => RecoveryReason::Train,
            _ => RecoveryReason::Unknown,
        }
    }
}

/// A/B firmware slot try-result (`FW_RESULT`/`FW_PREV_RESULT`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FwResult {
    Unknown,
    Success,
    Failure,
    Trying,
}

impl FwResult {
    const fn to_bits(self) -> u8 {
        match self {
            FwResult::Unknown => 0,
            FwResult::Success => 1,
            FwResult::Failure => 2,
            FwResult::Trying => 3,
        }
    }
    const fn from_bits(bits: u8) -> FwResult {
        match bits & FW_RESULT_MASK {
            0 => FwResult::Unknown,
            1 => FwResult::Success,
            2 => FwResult::Failure,
            _ => FwResult::Trying,
        }
    }
}

/// In-memory view of the 16-byte NV block, loaded once per boot (§4.6).
#[derive(Debug, Clone, Copy)]
pub struct NvContext {
    raw: [u8; 16],
    dirty: bool,
}

impl NvContext {
    /// `setup()`: loads from `raw`, verifying the CRC. A bad CRC or unrecognised header tag
    /// resets the block to defaults and latches `dirty` so the caller knows to persist it.
    pub fn setup(raw: [u8; 16]) -> Self {
        let header_ok = raw[0] & HEADER_TAG_MASK == HEADER_TAG;
        let crc_ok = header_ok && crc8(&raw[..15]) == raw[15];
        if crc_ok {
            NvContext { raw, dirty: false }
        } else {
            let mut defaults = [0u8; 16];
            defaults[0] = HEADER_TAG;
            let mut ctx = NvContext { raw: defaults, dirty: true };
            ctx.regenerate_crc();
            ctx
        }
    }

    fn regenerate_crc(&mut self) {
        self.raw[15] = crc8(&self.raw[..15]);
    }

    /// `teardown()`: recomputes the CRC if anything changed, and reports whether `raw` changed.
    pub fn teardown(mut self) -> ([u8; 16], bool) {
        if self.dirty {
            self.regenerate_crc();
        }
        (self.raw, self.dirty)
    }

    pub fn firmware_settings_reset(&self) -> bool {
        self.raw[0] & FIRMWARE_SETTINGS_RESET_BIT != 0
    }
    pub fn kernel_settings_reset(&self) -> bool {
        self.raw[0] & KERNEL_SETTINGS_RESET_BIT != 0
    }
    pub fn debug_reset_mode(&self) -> bool {
        self.raw[0] & DEBUG_RESET_MODE_BIT != 0
    }

    pub fn try_b_count(&self) -> u8 {
        self.raw[1] & 0x0F
    }
    pub fn set_try_b_count(&mut self, count: u8) -> Result<(), NvError> {
        if count > 0x0F {
            return Err(NvError::ValueOutOfRange);
        }
        self.set_field(1, 0x0F, count);
        Ok(())
    }

    pub fn dev_boot_usb(&self) -> bool {
        self.raw[1] & DEV_BOOT_USB_BIT != 0
    }
    pub fn dev_boot_signed_only(&self) -> bool {
        self.raw[1] & DEV_BOOT_SIGNED_ONLY_BIT != 0
    }
    pub fn disable_dev_request(&self) -> bool {
        self.raw[1] & DISABLE_DEV_REQUEST_BIT != 0
    }
    pub fn oprom_needed(&self) -> bool {
        self.raw[1] & OPROM_NEEDED_BIT != 0
    }

    pub fn recovery_request(&self) -> RecoveryReason {
        RecoveryReason::from_u8(self.raw[2])
    }
    pub fn set_recovery_request(&mut self, reason: RecoveryReason) {
        if self.raw[2] != reason.to_u8() {
            self.raw[2] = reason.to_u8();
            self.dirty = true;
        }
    }

    pub fn localization_index(&self) -> u8 {
        self.raw[3]
    }
    pub fn set_localization_index(&mut self, index: u8) {
        if self.raw[3] != index {
            self.raw[3] = index;
            self.dirty = true;
        }
    }

    pub fn kernel_field(&self) -> u32 {
        u32::from_le_bytes([self.raw[4], self.raw[5], self.raw[6], self.raw[7]])
    }
    pub fn set_kernel_field(&mut self, value: u32) {
        let bytes = value.to_le_bytes();
        if self.raw[4..8] != bytes {
            self.raw[4..8].copy_from_slice(&bytes);
            self.dirty = true;
        }
    }

    pub fn clear_tpm_owner_request(&self) -> bool {
        self.raw[8] & CLEAR_TPM_OWNER_REQUEST_BIT != 0
    }
    pub fn set_clear_tpm_owner_request(&mut self, value: bool) {
        self.set_bit(8, CLEAR_TPM_OWNER_REQUEST_BIT, value);
    }
    pub fn clear_tpm_owner_done(&self) -> bool {
        self.raw[8] & CLEAR_TPM_OWNER_DONE_BIT != 0
    }
    pub fn set_clear_tpm_owner_done(&mut self, value: bool) {
        self.set_bit(8, CLEAR_TPM_OWNER_DONE_BIT, value);
    }

    pub fn fw_try_next(&self) -> bool {
        self.raw[8] & FW_TRY_NEXT_BIT != 0
    }
    pub fn set_fw_try_next(&mut self, value: bool) {
        self.set_bit(8, FW_TRY_NEXT_BIT, value);
    }
    pub fn fw_tried(&self) -> bool {
        self.raw[8] & FW_TRIED_BIT != 0
    }
    pub fn set_fw_tried(&mut self, value: bool) {
        self.set_bit(8, FW_TRIED_BIT, value);
    }
    pub fn fw_result(&self) -> FwResult {
        FwResult::from_bits(self.raw[8] >> FW_RESULT_SHIFT)
    }
    pub fn set_fw_result(&mut self, result: FwResult) {
        let bits = (self.raw[8] & !(FW_RESULT_MASK << FW_RESULT_SHIFT)) | (result.to_bits() << FW_RESULT_SHIFT);
        if self.raw[8] != bits {
            self.raw[8] = bits;
            self.dirty = true;
        }
    }
    pub fn fw_prev_tried(&self) -> bool {
        self.raw[8] & FW_PREV_TRIED_BIT != 0
    }
    pub fn set_fw_prev_tried(&mut self, value: bool) {
        self.set_bit(8, FW_PREV_TRIED_BIT, value);
    }
    pub fn fw_prev_result(&self) -> FwResult {
        FwResult::from_bits(self.raw[9])
    }
    pub fn set_fw_prev_result(&mut self, result: FwResult) {
        if self.raw[9] & FW_RESULT_MASK != result.to_bits() {
            self.raw[9] = (self.raw[9] & !FW_RESULT_MASK) | result.to_bits();
            self.dirty = true;
        }
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    fn set_field(&mut self, byte: usize, mask: u8, value: u8) {
        let new_byte = (self.raw[byte] & !mask) | (value & mask);
        if self.raw[byte] != new_byte {
            self.raw[byte] = new_byte;
            self.dirty = true;
        }
    }

    fn set_bit(&mut self, byte: usize, bit: u8, value: bool) {
        let new_byte = if value { self.raw[byte] | bit } else { self.raw[byte] & !bit };
        if self.raw[byte] != new_byte {
            self.raw[byte] = new_byte;
            self.dirty = true;
        }
    }

    /// §4.7: expired tries and `fail()` slot redirection. `other_slot_failed` lets the caller
    /// report whether the alternate slot has already failed, per the original's "only one slot
    /// has failed -> redirect, both failed -> request recovery" rule.
    pub fn on_boot_failure(&mut self, other_slot_failed: bool, reason: RecoveryReason) {
        if other_slot_failed {
            self.set_recovery_request(reason);
        } else {
            self.set_fw_try_next(true);
            self.set_fw_result(FwResult::Failure);
        }
    }

    /// Called at the start of a boot, before any firmware-slot decision is made: an expired
    /// `TRYING` result means the slot never confirmed success.
    pub fn expire_stale_trying(&mut self) {
        if self.fw_tried() && self.fw_result() == FwResult::Trying {
            self.set_fw_result(FwResult::Failure);
            self.set_fw_try_next(true);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bad_crc_resets_to_defaults_and_marks_dirty() {
        let raw = [0xFFu8; 16];
        let ctx = NvContext::setup(raw);
        assert!(ctx.is_dirty());
        assert_eq!(ctx.recovery_request(), RecoveryReason::NotRequested);
    }

    #[test]
    fn setup_teardown_idempotent_after_reset() {
        let raw = [0u8; 16];
        let ctx = NvContext::setup(raw);
        let (persisted, _) = ctx.teardown();
        let ctx2 = NvContext::setup(persisted);
        assert!(!ctx2.is_dirty());
        let (persisted2, _) = ctx2.teardown();
        assert_eq!(persisted, persisted2);
    }

    #[test]
    fn set_then_get_round_trips_for_every_typed_field() {
        let mut ctx = NvContext::setup([0u8; 16]);
        ctx.set_try_b_count(9).unwrap();
        assert_eq!(ctx.try_b_count(), 9);

        ctx.set_recovery_request(RecoveryReason::RwInvalidOs);
        assert_eq!(ctx.recovery_request(), RecoveryReason::RwInvalidOs);

        ctx.set_kernel_field(0xDEAD_BEEF);
        assert_eq!(ctx.kernel_field(), 0xDEAD_BEEF);

        ctx.set_fw_result(FwResult::Trying);
        assert_eq!(ctx.fw_result(), FwResult::Trying);
    }

    #[test]
    fn out_of_range_try_b_count_rejected() {
        let mut ctx = NvContext::setup([0u8; 16]);
        assert_eq!(ctx.set_try_b_count(0x10), Err(NvError::ValueOutOfRange));
    }

    #[test]
    fn stale_trying_result_expires_to_failure() {
        let mut ctx = NvContext::setup([0u8; 16]);
        ctx.set_fw_tried(true);
        ctx.set_fw_result(FwResult::Trying);
        ctx.expire_stale_trying();
        assert_eq!(ctx.fw_result(), FwResult::Failure);
        assert!(ctx.fw_try_next());
    }
}
