// SPDX-License-Identifier: MPL-2.0
//! Kernel body verification: hash exactly the preamble's declared body length and check it
//! against the body signature extracted from the preamble, using the key block's data key.
//! The body must additionally fit both the caller's load buffer and the partition's own sector
//! span — both distinct, non-fatal-to-other-candidates error kinds (§4.3).

use crate::collaborators::{Crypto, PublicKey};
use crate::error::VerifyError;
use crate::verify::preamble::PreambleInfo;

/// Verifies `body` (exactly `preamble.body_data_size` bytes) against the signature embedded in
/// `preamble_buf` at the offset recorded when the preamble was parsed.
///
/// `load_buffer_len` is the size of the caller's load destination; `partition_size_bytes` is the
/// full size of the partition the body lives in, so `preamble.body_offset + data_size` is checked
/// against it directly.
pub fn verify_body(
    body: &[u8],
    preamble_buf: &[u8],
    preamble: &PreambleInfo,
    data_key: &PublicKey,
    load_buffer_len: u64,
    partition_size_bytes: u64,
    crypto: &dyn Crypto,
) -> Result<(), VerifyError> {
    let data_size = preamble.body_data_size as u64;

    if data_size > load_buffer_len {
        return Err(VerifyError::BodyExceedsBuffer);
    }
    if preamble
        .body_offset
        .checked_add(data_size)
        .ok_or(VerifyError::BodyExceedsPartition)?
        > partition_size_bytes
    {
        return Err(VerifyError::BodyExceedsPartition);
    }
    if (body.len() as u64) < data_size {
        return Err(VerifyError::BodyExceedsBuffer);
    }

    let sig_end = preamble
        .body_signature_offset
        .checked_add(preamble.body_signature_size)
        .ok_or(VerifyError::CommonMemberSize)?;
    if sig_end > preamble_buf.len() {
        return Err(VerifyError::CommonMemberSize);
    }
    let signature = &preamble_buf[preamble.body_signature_offset..sig_end];

    let digest = crypto.hash(preamble.body_algorithm.hash(), &body[..data_size as usize]);
    if !crypto.verify_digest(data_key, signature, &digest) {
        return Err(VerifyError::HashMismatch);
    }

    Ok(())
}
