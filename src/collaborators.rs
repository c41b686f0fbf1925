// SPDX-License-Identifier: MPL-2.0
//! External collaborator contracts (§6): disk I/O, crypto primitives, the secure counter and NV
//! storage. The core only ever calls through these traits — it never owns a disk handle, a TPM
//! session, or a crypto library directly, the same boundary `VbExDiskRead`/`VbExDiskWrite` and
//! friends draw in the original firmware.

use crate::error::IoError;
use crate::verify::algorithm::HashAlgorithm;

/// Maximum digest size this core ever carries (SHA-512).
pub const MAX_DIGEST_SIZE: usize = 64;

/// A hash output, sized for the largest supported algorithm but only `len` bytes significant.
#[derive(Debug, Clone, Copy)]
pub struct Digest {
    bytes: [u8; MAX_DIGEST_SIZE],
    len: usize,
}

impl Digest {
    pub fn new(alg: HashAlgorithm, bytes: &[u8]) -> Self {
        let mut out = [0u8; MAX_DIGEST_SIZE];
        let len = alg.digest_size();
        out[..len].copy_from_slice(&bytes[..len]);
        Digest { bytes: out, len }
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

impl PartialEq for Digest {
    fn eq(&self, other: &Self) -> bool {
        self.as_slice() == other.as_slice()
    }
}
impl Eq for Digest {}

/// Block-addressed storage. The core never computes byte offsets itself; every read/write is
/// sector-aligned.
pub trait Disk {
    fn sector_bytes(&self) -> u32;
    fn sector_count(&self) -> u64;
    fn read(&mut self, start_lba: u64, count_lba: u64, dest: &mut [u8]) -> Result<(), IoError>;
    fn write(&mut self, start_lba: u64, count_lba: u64, src: &[u8]) -> Result<(), IoError>;
}

/// A fixed-size public key large enough for the biggest modulus this core recognises (RSA-8192).
pub const MAX_PUBLIC_KEY_BYTES: usize = 1024;

#[derive(Debug, Clone, Copy)]
pub struct PublicKey {
    bytes: [u8; MAX_PUBLIC_KEY_BYTES],
    len: usize,
}

impl PublicKey {
    pub fn from_slice(bytes: &[u8]) -> Option<Self> {
        if bytes.len() > MAX_PUBLIC_KEY_BYTES {
            return None;
        }
        let mut out = [0u8; MAX_PUBLIC_KEY_BYTES];
        out[..bytes.len()].copy_from_slice(bytes);
        Some(PublicKey { bytes: out, len: bytes.len() })
    }

    pub fn as_slice(&self) -> &[u8] {
        &self.bytes[..self.len]
    }
}

/// Synchronous, deterministic, side-effect-free signature and hash primitives. The core treats
/// both as opaque; RSA padding, PKCS#1 details, etc. live entirely behind this trait.
pub trait Crypto {
    fn verify_digest(&self, pubkey: &PublicKey, signature: &[u8], digest: &Digest) -> bool;
    fn hash(&self, alg: HashAlgorithm, bytes: &[u8]) -> Digest;
}

/// The tamper-resistant monotonic counter (`(key_version << 16) | data_version`).
pub trait SecureCounter {
    fn read(&self) -> u32;
    fn write(&mut self, value: u32) -> Result<(), IoError>;
    /// Locks the counter against further writes for the remainder of this boot. Called with
    /// `recovery = true` when booting in recovery mode, per §4.5.
    fn lock(&mut self, recovery: bool) -> Result<(), IoError>;
}

/// Raw 16-byte NV policy block storage. Atomicity of the write is the collaborator's problem.
pub trait NvStorage {
    fn read_block(&self) -> [u8; 16];
    fn write_block(&mut self, block: &[u8; 16]) -> Result<(), IoError>;
}
