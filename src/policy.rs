// SPDX-License-Identifier: MPL-2.0
//! Boot-mode derivation and the per-mode key-block-flag policy table (§4.4). Implemented as an
//! explicit lookup rather than scattered conditionals so property tests can cover every cell.

use crate::error::PolicyError;
use crate::nvdata::RecoveryReason;
use crate::verify::keyblock::KeyBlockFlags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootMode {
    Normal,
    Developer,
    Recovery,
}

/// Inputs to mode derivation (§4.4).
#[derive(Debug, Clone, Copy)]
pub struct ModeInputs {
    pub recovery_line: bool,
    pub developer_line: bool,
    pub force_dev_on: bool,
    pub require_official_os: bool,
    pub rec_request: RecoveryReason,
    pub previous_boot_failed: bool,
}

impl ModeInputs {
    pub fn derive_mode(&self) -> BootMode {
        if self.recovery_line
            || self.rec_request != RecoveryReason::NotRequested
            || self.previous_boot_failed
        {
            BootMode::Recovery
        } else if self.developer_line || self.force_dev_on {
            BootMode::Developer
        } else {
            BootMode::Normal
        }
    }
}

/// Per-candidate judgement a verified key block must pass for the current mode (§4.4 per-mode
/// rules). `trusted` mirrors `KeyBlockInfo::trusted` (signature- vs hash-verified).
pub fn check_key_block_policy(
    mode: BootMode,
    flags: KeyBlockFlags,
    trusted: bool,
    require_official_os: bool,
) -> Result<(), PolicyError> {
    match mode {
        BootMode::Normal => {
            if !trusted {
                return Err(PolicyError::SelfSignedDisallowed);
            }
            if !flags.contains(KeyBlockFlags::RECOVERY_0) || !flags.contains(KeyBlockFlags::DEVELOPER_0) {
                return Err(PolicyError::KeyBlockFlagMismatch);
            }
            Ok(())
        }
        BootMode::Developer => {
            if !trusted && require_official_os {
                return Err(PolicyError::SelfSignedDisallowed);
            }
            let allowed = flags.contains(KeyBlockFlags::DEVELOPER_1) || flags.contains(KeyBlockFlags::RECOVERY_0);
            if !allowed {
                return Err(PolicyError::KeyBlockFlagMismatch);
            }
            Ok(())
        }
        BootMode::Recovery => {
            if !trusted {
                return Err(PolicyError::SelfSignedDisallowed);
            }
            if !flags.contains(KeyBlockFlags::RECOVERY_1) {
                return Err(PolicyError::KeyBlockFlagMismatch);
            }
            Ok(())
        }
    }
}

/// Rollback check against the secure counter (§4.4, §8 law 6). Recovery mode skips this
/// entirely; developer mode checks but does not treat failure as fatal unless the key block was
/// fully trusted.
pub fn check_rollback(
    mode: BootMode,
    trusted: bool,
    combined_version: u32,
    secure_counter: u32,
) -> Result<(), PolicyError> {
    if mode == BootMode::Recovery {
        return Ok(());
    }
    if combined_version < secure_counter {
        if mode == BootMode::Developer && !trusted {
            return Ok(());
        }
        return Err(PolicyError::Rollback);
    }
    Ok(())
}
