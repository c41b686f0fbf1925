// SPDX-License-Identifier: MPL-2.0
//! Kernel preamble self-description and signature verification, including the body-offset
//! sector-alignment check folded in here per the original library's `VBSD_LKP_CHECK_BODY_OFFSET`
//! (§4.3) since it is a property of the preamble's own declared fields, not of the caller's
//! load buffer.

use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

use crate::collaborators::{Crypto, PublicKey};
use crate::error::VerifyError;
use crate::verify::algorithm::Algorithm;

const PREAMBLE_MAGIC: [u8; 8] = *b"KERNBLCK";
const MEMBER_ALIGN: u32 = 4;

#[repr(packed)]
#[derive(Clone, Copy, FromBytes, AsBytes)]
struct PreambleHeader {
    magic: [u8; 8],
    header_version_major: u32,
    header_version_minor: u32,
    preamble_size: u32,
    signature_offset: u32,
    signature_size: u32,
    signature_algorithm: u32,
    kernel_version: u32,
    body_load_address: u64,
    bootloader_address: u64,
    bootloader_size: u32,
    body_signature_algorithm: u32,
    body_signature_offset: u32,
    body_signature_size: u32,
    body_data_size: u32,
}
assert_eq_size!(PreambleHeader, [u8; 72]);

pub struct PreambleInfo {
    pub kernel_version: u16,
    pub body_load_address: u64,
    pub bootloader_address: u64,
    pub bootloader_size: u32,
    pub body_data_size: u32,
    /// Offset of the signed body relative to the start of the partition, in bytes
    /// (`preceding_bytes + preamble_size`).
    pub body_offset: u64,
    /// Location of the body's signature within the preamble buffer, for `body.rs` to re-slice.
    pub body_signature_offset: usize,
    pub body_signature_size: usize,
    pub body_algorithm: Algorithm,
}

/// Verifies `buf` as a kernel preamble signed by `data_key` (the key block's public sub-key).
///
/// `preceding_bytes` is the number of bytes the key block consumed ahead of `buf` within the
/// partition's read prefix; the body's partition-relative offset is `preceding_bytes` plus this
/// preamble's own declared size, and that sum must be a multiple of `sector_bytes` or the
/// partition is rejected before any body bytes are read.
pub fn verify_preamble(
    buf: &[u8],
    data_key: &PublicKey,
    data_key_algorithm: Algorithm,
    sector_bytes: u32,
    preceding_bytes: u64,
    crypto: &dyn Crypto,
) -> Result<PreambleInfo, VerifyError> {
    let header_size = core::mem::size_of::<PreambleHeader>();
    if buf.len() < header_size {
        return Err(VerifyError::SigHeaderSize);
    }
    let header = *LayoutVerified::<&[u8], PreambleHeader>::new(&buf[..header_size])
        .ok_or(VerifyError::SigHeaderSize)?;

    if header.magic != PREAMBLE_MAGIC {
        return Err(VerifyError::BadMagic);
    }
    if header.header_version_major != 2 {
        return Err(VerifyError::UnpackKeyStructVersion);
    }

    let total_size = header.preamble_size as usize;
    if total_size > buf.len() || total_size < header_size {
        return Err(VerifyError::SigTotalSize);
    }

    let expected_size = data_key_algorithm.signature().signature_size();
    let signature_offset = header.signature_offset as usize;
    let signature_size = header.signature_size as usize;
    if header.signature_offset % MEMBER_ALIGN != 0 {
        return Err(VerifyError::CommonMemberUnaligned);
    }
    if signature_size != expected_size {
        return Err(VerifyError::UnpackKeyArraySize);
    }
    if signature_offset
        .checked_add(signature_size)
        .ok_or(VerifyError::CommonMemberSize)?
        > total_size
    {
        return Err(VerifyError::CommonMemberSize);
    }
    if signature_offset < header_size {
        return Err(VerifyError::InsideDataOutside);
    }

    let body_algorithm =
        Algorithm::from_u32(header.body_signature_algorithm).ok_or(VerifyError::UnpackKeySigAlgorithm)?;
    let body_expected_size = body_algorithm.signature().signature_size();
    if header.body_signature_offset % MEMBER_ALIGN != 0 {
        return Err(VerifyError::CommonMemberUnaligned);
    }
    if header.body_signature_size as usize != body_expected_size {
        return Err(VerifyError::UnpackKeyArraySize);
    }
    let body_sig_end = (header.body_signature_offset as usize)
        .checked_add(header.body_signature_size as usize)
        .ok_or(VerifyError::CommonMemberSize)?;
    if body_sig_end > total_size {
        return Err(VerifyError::CommonMemberSize);
    }

    if header.kernel_version > u16::MAX as u32 {
        return Err(VerifyError::UnpackKeyStructVersion);
    }

    let body_offset = preceding_bytes + total_size as u64;
    if body_offset % sector_bytes as u64 != 0 {
        return Err(VerifyError::BodyOffset);
    }

    let signature_bytes = &buf[signature_offset..signature_offset + signature_size];
    let signed_region = &buf[..signature_offset];
    let digest = crypto.hash(data_key_algorithm.hash(), signed_region);
    if !crypto.verify_digest(data_key, signature_bytes, &digest) {
        return Err(VerifyError::SignatureMismatch);
    }

    Ok(PreambleInfo {
        kernel_version: header.kernel_version as u16,
        body_load_address: header.body_load_address,
        bootloader_address: header.bootloader_address,
        bootloader_size: header.bootloader_size,
        body_data_size: header.body_data_size,
        body_offset,
        body_signature_offset: header.body_signature_offset as usize,
        body_signature_size: header.body_signature_size as usize,
        body_algorithm,
    })
}
