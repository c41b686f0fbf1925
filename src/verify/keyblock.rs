// SPDX-License-Identifier: MPL-2.0
//! Key block self-description and signature/hash verification (§4.3).
//!
//! Every length and offset in the on-disk header is checked against the containing buffer before
//! it is ever used to slice that buffer — a structure that fails self-consistency returns one of
//! the distinct `VerifyError` kinds below rather than panicking or silently truncating.

use bitflags::bitflags;
use static_assertions::assert_eq_size;
use zerocopy::{AsBytes, FromBytes, LayoutVerified};

use crate::collaborators::{Crypto, Digest, PublicKey};
use crate::error::VerifyError;
use crate::verify::algorithm::{Algorithm, HashAlgorithm};

const KEY_BLOCK_MAGIC: [u8; 8] = *b"CHROMEOS";
const MEMBER_ALIGN: u32 = 4;

bitflags! {
    /// Policy bits carried in the key block, crossed against boot mode by `policy.rs` (§4.4).
    pub struct KeyBlockFlags: u32 {
        const DEVELOPER_0 = 0b0001;
        const DEVELOPER_1 = 0b0010;
        const RECOVERY_0  = 0b0100;
        const RECOVERY_1  = 0b1000;
    }
}

#[repr(packed)]
#[derive(Clone, Copy, FromBytes, AsBytes)]
struct KeyBlockHeader {
    magic: [u8; 8],
    header_version_major: u32,
    header_version_minor: u32,
    key_block_size: u32,
    signature_offset: u32,
    signature_size: u32,
    data_key_algorithm: u32,
    data_key_version: u32,
    data_key_offset: u32,
    data_key_size: u32,
    key_block_flags: u32,
}
assert_eq_size!(KeyBlockHeader, [u8; 48]);

/// Result of a verified (or hash-only-accepted) key block.
pub struct KeyBlockInfo {
    pub flags: KeyBlockFlags,
    pub key_version: u16,
    pub data_key_algorithm: Algorithm,
    pub data_key: PublicKey,
    /// `false` when accepted only by hash-only developer-mode verification (§4.3).
    pub trusted: bool,
    /// Total size of this key block in bytes, i.e. the `preceding_bytes` the caller passes to
    /// `verify_preamble` for the structure that immediately follows it in the partition.
    pub key_block_size: usize,
}

/// Verifies `buf` as a key block.
///
/// `root_key` signs the block in signature mode. `trusted_hash`, when `Some`, allows hash-only
/// acceptance (developer mode only); `allow_hash_only` gates whether that path is even attempted.
pub fn verify_key_block(
    buf: &[u8],
    root_key: &PublicKey,
    trusted_hash: Option<&Digest>,
    allow_hash_only: bool,
    crypto: &dyn Crypto,
) -> Result<KeyBlockInfo, VerifyError> {
    let header_size = core::mem::size_of::<KeyBlockHeader>();
    if buf.len() < header_size {
        return Err(VerifyError::SigHeaderSize);
    }
    let header = *LayoutVerified::<&[u8], KeyBlockHeader>::new(&buf[..header_size])
        .ok_or(VerifyError::SigHeaderSize)?;

    if header.magic != KEY_BLOCK_MAGIC {
        return Err(VerifyError::BadMagic);
    }
    if header.header_version_major != 2 {
        return Err(VerifyError::UnpackKeyStructVersion);
    }

    let total_size = header.key_block_size as usize;
    if total_size > buf.len() || total_size < header_size {
        return Err(VerifyError::SigTotalSize);
    }

    let algorithm = Algorithm::from_u32(header.data_key_algorithm)
        .ok_or(VerifyError::UnpackKeySigAlgorithm)?;
    let expected_key_size = algorithm.signature().signature_size();

    let data_key_offset = header.data_key_offset as usize;
    let data_key_size = header.data_key_size as usize;
    if header.data_key_offset % MEMBER_ALIGN != 0 {
        return Err(VerifyError::CommonMemberUnaligned);
    }
    if data_key_size != expected_key_size {
        return Err(VerifyError::UnpackKeyArraySize);
    }
    if data_key_offset.checked_add(data_key_size).ok_or(VerifyError::CommonMemberSize)? > total_size {
        return Err(VerifyError::CommonMemberSize);
    }

    let signature_offset = header.signature_offset as usize;
    let signature_size = header.signature_size as usize;
    if header.signature_offset % MEMBER_ALIGN != 0 {
        return Err(VerifyError::CommonMemberUnaligned);
    }
    if signature_size != expected_key_size {
        return Err(VerifyError::UnpackKeyArraySize);
    }
    if signature_offset
        .checked_add(signature_size)
        .ok_or(VerifyError::CommonMemberSize)?
        > total_size
    {
        return Err(VerifyError::CommonMemberSize);
    }
    // The signed region must precede the signature it's covered by; a signature that claims to
    // sign data beyond its own offset is the "inside data outside" shape.
    if signature_offset < header_size {
        return Err(VerifyError::InsideDataOutside);
    }

    let data_key_bytes = &buf[data_key_offset..data_key_offset + data_key_size];
    let data_key = PublicKey::from_slice(data_key_bytes).ok_or(VerifyError::UnpackKeySize)?;

    if header.data_key_version > u16::MAX as u32 {
        return Err(VerifyError::UnpackKeyStructVersion);
    }
    let key_version = header.data_key_version as u16;
    let flags = KeyBlockFlags::from_bits_truncate(header.key_block_flags);

    let signature_bytes = &buf[signature_offset..signature_offset + signature_size];
    let signed_region = &buf[..signature_offset];
    let digest = crypto.hash(algorithm.hash(), signed_region);

    if crypto.verify_digest(root_key, signature_bytes, &digest) {
        return Ok(KeyBlockInfo {
            flags,
            key_version,
            data_key_algorithm: algorithm,
            data_key,
            trusted: true,
            key_block_size: total_size,
        });
    }

    if allow_hash_only {
        if let Some(expected) = trusted_hash {
            let self_digest = crypto.hash(HashAlgorithm::Sha512, &buf[..total_size]);
            if &self_digest == expected {
                return Ok(KeyBlockInfo {
                    flags,
                    key_version,
                    data_key_algorithm: algorithm,
                    data_key,
                    trusted: false,
                    key_block_size: total_size,
                });
            }
            return Err(VerifyError::HashMismatch);
        }
    }

    Err(VerifyError::SignatureMismatch)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::collaborators::MAX_PUBLIC_KEY_BYTES;

    struct AlwaysOkCrypto;
    impl Crypto for AlwaysOkCrypto {
        fn verify_digest(&self, _pubkey: &PublicKey, _sig: &[u8], _digest: &Digest) -> bool {
            true
        }
        fn hash(&self, alg: HashAlgorithm, bytes: &[u8]) -> Digest {
            // deterministic stand-in: first bytes of input, zero-padded.
            let mut buf = [0u8; 64];
            let n = bytes.len().min(64);
            buf[..n].copy_from_slice(&bytes[..n]);
            Digest::new(alg, &buf)
        }
    }

    struct AlwaysFailCrypto;
    impl Crypto for AlwaysFailCrypto {
        fn verify_digest(&self, _pubkey: &PublicKey, _sig: &[u8], _digest: &Digest) -> bool {
            false
        }
        fn hash(&self, alg: HashAlgorithm, _bytes: &[u8]) -> Digest {
            Digest::new(alg, &[0u8; 64])
        }
    }

    fn build_block(algorithm_id: u32, key_size: usize, flags: u32) -> heapless::Vec<u8, heapless::consts::U2048> {
        let header_size = core::mem::size_of::<KeyBlockHeader>();
        let data_key_offset = header_size as u32;
        let signature_offset = data_key_offset + key_size as u32;
        let total_size = signature_offset + key_size as u32;

        let header = KeyBlockHeader {
            magic: KEY_BLOCK_MAGIC,
            header_version_major: 2,
            header_version_minor: 0,
            key_block_size: total_size,
            signature_offset,
            signature_size: key_size as u32,
            data_key_algorithm: algorithm_id,
            data_key_version: 1,
            data_key_offset,
            data_key_size: key_size as u32,
            key_block_flags: flags,
        };

        let mut buf: heapless::Vec<u8, heapless::consts::U2048> = heapless::Vec::new();
        buf.extend_from_slice(header.as_bytes()).unwrap();
        buf.resize(total_size as usize, 0xAA).unwrap();
        buf
    }

    #[test]
    fn accepts_well_formed_signature_mode_block() {
        let buf = build_block(3, 256, KeyBlockFlags::RECOVERY_0.bits() | KeyBlockFlags::DEVELOPER_0.bits());
        let root_key = PublicKey::from_slice(&[0u8; MAX_PUBLIC_KEY_BYTES]).unwrap();
        let info = verify_key_block(&buf, &root_key, None, false, &AlwaysOkCrypto).unwrap();
        assert!(info.trusted);
        assert_eq!(info.key_version, 1);
    }

    #[test]
    fn rejects_unknown_magic() {
        let mut buf = build_block(3, 256, 0);
        buf[0] = 0;
        let root_key = PublicKey::from_slice(&[0u8; MAX_PUBLIC_KEY_BYTES]).unwrap();
        assert_eq!(
            verify_key_block(&buf, &root_key, None, false, &AlwaysOkCrypto),
            Err(VerifyError::BadMagic)
        );
    }

    #[test]
    fn rejects_unknown_algorithm() {
        let buf = build_block(99, 256, 0);
        let root_key = PublicKey::from_slice(&[0u8; MAX_PUBLIC_KEY_BYTES]).unwrap();
        assert_eq!(
            verify_key_block(&buf, &root_key, None, false, &AlwaysOkCrypto),
            Err(VerifyError::UnpackKeySigAlgorithm)
        );
    }

    #[test]
    fn signature_failure_without_hash_fallback_is_mismatch() {
        let buf = build_block(3, 256, 0);
        let root_key = PublicKey::from_slice(&[0u8; MAX_PUBLIC_KEY_BYTES]).unwrap();
        assert_eq!(
            verify_key_block(&buf, &root_key, None, false, &AlwaysFailCrypto),
            Err(VerifyError::SignatureMismatch)
        );
    }
}
