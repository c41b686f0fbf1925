// SPDX-License-Identifier: MPL-2.0
//! Shared fake collaborators and on-disk fixture builders for the scenario tests (§8 S1-S6).
//!
//! These fixtures poke raw bytes at the same offsets the unit tests in `src/verify/keyblock.rs`
//! and `src/verify/preamble.rs` use, since the on-disk header structs are private to those modules
//! and not reachable from an integration test.

#![allow(dead_code)]

use vboot_core::crc;
use vboot_core::gpt::entry::KERNEL_TYPE_GUID;
use vboot_core::gpt::header::{GPT_ENTRY_SIZE, MAX_GPT_ENTRIES};
use vboot_core::gpt::{Entry, Header, Which};
use vboot_core::verify::HashAlgorithm;
use vboot_core::{Crypto, Digest, Disk, IoError, NvStorage, PublicKey, SecureCounter};
use zerocopy::AsBytes;

pub const SECTOR_BYTES: u32 = 512;
pub const DRIVE_SECTORS: u64 = 1024;
const ENTRIES_SECTORS: u64 = MAX_GPT_ENTRIES as u64 * GPT_ENTRY_SIZE as u64 / SECTOR_BYTES as u64;

pub const KEY_BLOCK_SIZE: usize = 952;
pub const PREAMBLE_SIZE: usize = 584;
pub const BODY_OFFSET: u64 = (KEY_BLOCK_SIZE + PREAMBLE_SIZE) as u64;

/// A `Crypto` whose "signature" is just the digest bytes, zero-padded to the algorithm's fixed
/// signature size, and whose "hash" is a deterministic fold -- good enough to exercise every
/// success/failure branch in the verifier without pulling in a real RSA/SHA implementation.
pub struct FakeCrypto;

impl Crypto for FakeCrypto {
    fn verify_digest(&self, _pubkey: &PublicKey, signature: &[u8], digest: &Digest) -> bool {
        let d = digest.as_slice();
        signature.len() >= d.len() && &signature[..d.len()] == d
    }

    fn hash(&self, alg: HashAlgorithm, bytes: &[u8]) -> Digest {
        let size = alg.digest_size();
        let mut acc = [0u8; 64];
        for (i, b) in bytes.iter().enumerate() {
            acc[i % size] ^= *b;
        }
        Digest::new(alg, &acc)
    }
}

fn sign(data_key_or_root: &[u8], signed_region: &[u8], sig_size: usize) -> std::vec::Vec<u8> {
    let _ = data_key_or_root;
    let digest = FakeCrypto.hash(HashAlgorithm::Sha256, signed_region);
    let mut sig = std::vec![0xAAu8; sig_size];
    let d = digest.as_slice();
    sig[..d.len()].copy_from_slice(d);
    sig
}

/// Builds one kernel partition's byte contents: key block + preamble + body, laid out so the
/// body starts exactly on a sector boundary (§4.3 body-offset check).
///
/// `flags` are the key block's policy bits; `corrupt_preamble_signature` flips a body-independent
/// byte inside the preamble's signed region after the signature was computed, to simulate a
/// tampered/invalid kernel without needing a real asymmetric signature scheme.
pub struct PartitionSpec {
    pub flags: u32,
    pub key_version: u16,
    pub kernel_version: u16,
    pub body: std::vec::Vec<u8>,
    pub corrupt_preamble_signature: bool,
    /// Flips a byte inside the embedded key block signature after it was computed, so the
    /// signature-mode check fails and only hash-only acceptance (developer mode) can let it
    /// through.
    pub corrupt_key_block_signature: bool,
}

impl PartitionSpec {
    pub fn new(flags: u32, key_version: u16, kernel_version: u16, body_len: usize) -> Self {
        PartitionSpec {
            flags,
            key_version,
            kernel_version,
            body: std::vec![0x5Au8; body_len],
            corrupt_preamble_signature: false,
            corrupt_key_block_signature: false,
        }
    }

    pub fn build(&self) -> std::vec::Vec<u8> {
        let data_key_offset = 48u32;
        let data_key_size = 256u32;
        let signature_offset = data_key_offset + data_key_size;
        let signature_size = 256u32;
        let real_key_block_len = (signature_offset + signature_size) as usize;
        assert!(real_key_block_len <= KEY_BLOCK_SIZE);

        let mut kb = std::vec![0u8; KEY_BLOCK_SIZE];
        kb[0..8].copy_from_slice(b"CHROMEOS");
        kb[8..12].copy_from_slice(&2u32.to_le_bytes());
        kb[12..16].copy_from_slice(&0u32.to_le_bytes());
        kb[16..20].copy_from_slice(&(KEY_BLOCK_SIZE as u32).to_le_bytes());
        kb[20..24].copy_from_slice(&signature_offset.to_le_bytes());
        kb[24..28].copy_from_slice(&signature_size.to_le_bytes());
        kb[28..32].copy_from_slice(&4u32.to_le_bytes()); // Rsa2048Sha256
        kb[32..36].copy_from_slice(&(self.key_version as u32).to_le_bytes());
        kb[36..40].copy_from_slice(&data_key_offset.to_le_bytes());
        kb[40..44].copy_from_slice(&data_key_size.to_le_bytes());
        kb[44..48].copy_from_slice(&self.flags.to_le_bytes());
        // data key bytes are arbitrary; the fake crypto never inspects them.
        for i in 0..data_key_size as usize {
            kb[data_key_offset as usize + i] = 0x11;
        }
        let signed_region = kb[..signature_offset as usize].to_vec();
        let sig = sign(&[], &signed_region, signature_size as usize);
        kb[signature_offset as usize..signature_offset as usize + signature_size as usize]
            .copy_from_slice(&sig);

        if self.corrupt_key_block_signature {
            kb[signature_offset as usize] ^= 0xFF;
        }

        let mut preamble = std::vec![0u8; PREAMBLE_SIZE];
        let preamble_header_size = 72u32;
        let sig_offset = preamble_header_size;
        let sig_size = 256u32;
        let body_sig_offset = sig_offset + sig_size;
        let body_sig_size = 256u32;
        preamble[0..8].copy_from_slice(b"KERNBLCK");
        preamble[8..12].copy_from_slice(&2u32.to_le_bytes());
        preamble[12..16].copy_from_slice(&0u32.to_le_bytes());
        preamble[16..20].copy_from_slice(&(PREAMBLE_SIZE as u32).to_le_bytes());
        preamble[20..24].copy_from_slice(&sig_offset.to_le_bytes());
        preamble[24..28].copy_from_slice(&sig_size.to_le_bytes());
        preamble[28..32].copy_from_slice(&4u32.to_le_bytes());
        preamble[32..36].copy_from_slice(&(self.kernel_version as u32).to_le_bytes());
        preamble[36..44].copy_from_slice(&0x1000_0000u64.to_le_bytes()); // body_load_address
        preamble[44..52].copy_from_slice(&0x1100_0000u64.to_le_bytes()); // bootloader_address
        preamble[52..56].copy_from_slice(&4096u32.to_le_bytes()); // bootloader_size
        preamble[56..60].copy_from_slice(&4u32.to_le_bytes()); // body_signature_algorithm
        preamble[60..64].copy_from_slice(&body_sig_offset.to_le_bytes());
        preamble[64..68].copy_from_slice(&body_sig_size.to_le_bytes());
        preamble[68..72].copy_from_slice(&(self.body.len() as u32).to_le_bytes());

        let signed_region = preamble[..sig_offset as usize].to_vec();
        let sig = sign(&[], &signed_region, sig_size as usize);
        preamble[sig_offset as usize..(sig_offset + sig_size) as usize].copy_from_slice(&sig);

        if self.corrupt_preamble_signature {
            // Tamper with a signed header byte after the signature was computed, so the
            // recomputed hash no longer matches the embedded signature (a real bit-flip attack).
            preamble[33] ^= 0xFF;
        }

        let body_sig = sign(&[], &self.body, body_sig_size as usize);
        preamble[body_sig_offset as usize..(body_sig_offset + body_sig_size) as usize]
            .copy_from_slice(&body_sig);

        let mut out = std::vec::Vec::new();
        out.extend_from_slice(&kb);
        out.extend_from_slice(&preamble);
        out.extend_from_slice(&self.body);
        out
    }
}

pub fn root_key() -> PublicKey {
    PublicKey::from_slice(&[0u8; 32]).unwrap()
}

/// `verify_key_block`'s hash-only fallback hashes the whole key block (`Sha512` over
/// `buf[..key_block_size]`); callers building a `trusted_key_block_hash` fixture need the same
/// digest over the partition's first `KEY_BLOCK_SIZE` bytes.
pub fn key_block_self_hash(partition_bytes: &[u8]) -> Digest {
    FakeCrypto.hash(HashAlgorithm::Sha512, &partition_bytes[..KEY_BLOCK_SIZE])
}

fn write_header(disk: &mut FakeDisk, which: Which, number_of_entries: u32, entries_crc32: u32) {
    let mut h = Header::default();
    h.signature = 0x5452_4150_2049_4645;
    h.revision = 0x0001_0000;
    h.header_size = 92;
    h.my_lba = match which {
        Which::Primary => 1,
        Which::Secondary => DRIVE_SECTORS - 1,
    };
    h.alternate_lba = match which {
        Which::Primary => DRIVE_SECTORS - 1,
        Which::Secondary => 1,
    };
    h.first_usable_lba = 2 + ENTRIES_SECTORS;
    h.last_usable_lba = DRIVE_SECTORS - 2 - ENTRIES_SECTORS;
    h.disk_guid = [0xAB; 16];
    h.entries_lba = match which {
        Which::Primary => 2,
        Which::Secondary => DRIVE_SECTORS - 1 - ENTRIES_SECTORS,
    };
    h.number_of_entries = number_of_entries;
    h.size_of_entry = GPT_ENTRY_SIZE;
    h.entries_crc32 = entries_crc32;
    h.recompute_crc32();

    let lba = match which {
        Which::Primary => 1,
        Which::Secondary => DRIVE_SECTORS - 1,
    };
    let mut buf = std::vec![0u8; SECTOR_BYTES as usize];
    buf[..92].copy_from_slice(h.as_bytes());
    disk.write(lba, 1, &buf).unwrap();
}

/// One kernel candidate's placement on the fixture disk.
pub struct Candidate {
    pub start_lba: u64,
    pub size_lba: u64,
    pub guid_tag: u8,
    pub priority: u8,
    pub tries: u8,
    pub successful: bool,
    pub spec: PartitionSpec,
}

pub fn build_disk(candidates: &[Candidate]) -> FakeDisk {
    let mut disk = FakeDisk::new(DRIVE_SECTORS);

    let mut entries = std::vec![Entry::default(); MAX_GPT_ENTRIES as usize];
    for (i, c) in candidates.iter().enumerate() {
        let mut e = Entry::default();
        e.type_guid = KERNEL_TYPE_GUID;
        e.unique_guid = [c.guid_tag; 16];
        e.starting_lba = c.start_lba;
        e.ending_lba = c.start_lba + c.size_lba - 1;
        e.set_priority(c.priority);
        e.set_tries(c.tries);
        e.set_successful(c.successful);
        entries[i] = e;

        let bytes = c.spec.build();
        let sectors = (bytes.len() as u64 + SECTOR_BYTES as u64 - 1) / SECTOR_BYTES as u64;
        let mut padded = bytes.clone();
        padded.resize((sectors * SECTOR_BYTES as u64) as usize, 0);
        disk.write(c.start_lba, sectors, &padded).unwrap();
    }

    let mut entries_buf = std::vec::Vec::new();
    for e in entries.iter() {
        entries_buf.extend_from_slice(e.as_bytes());
    }
    let entries_crc = crc::crc32(&entries_buf);

    disk.write(2, ENTRIES_SECTORS, &entries_buf).unwrap();
    disk.write(DRIVE_SECTORS - 1 - ENTRIES_SECTORS, ENTRIES_SECTORS, &entries_buf)
        .unwrap();
    write_header(&mut disk, Which::Primary, MAX_GPT_ENTRIES, entries_crc);
    write_header(&mut disk, Which::Secondary, MAX_GPT_ENTRIES, entries_crc);

    disk
}

pub struct FakeDisk {
    sector_bytes: u32,
    pub sectors: std::vec::Vec<u8>,
}

impl FakeDisk {
    pub fn new(sector_count: u64) -> Self {
        FakeDisk {
            sector_bytes: SECTOR_BYTES,
            sectors: std::vec![0u8; (sector_count * SECTOR_BYTES as u64) as usize],
        }
    }

    pub fn corrupt_primary_header_crc(&mut self) {
        self.sectors[SECTOR_BYTES as usize + 16] ^= 0xFF;
    }
}

impl Disk for FakeDisk {
    fn sector_bytes(&self) -> u32 {
        self.sector_bytes
    }
    fn sector_count(&self) -> u64 {
        self.sectors.len() as u64 / self.sector_bytes as u64
    }
    fn read(&mut self, start_lba: u64, count_lba: u64, dest: &mut [u8]) -> Result<(), IoError> {
        let start = (start_lba * self.sector_bytes as u64) as usize;
        let len = (count_lba * self.sector_bytes as u64) as usize;
        dest[..len].copy_from_slice(&self.sectors[start..start + len]);
        Ok(())
    }
    fn write(&mut self, start_lba: u64, count_lba: u64, src: &[u8]) -> Result<(), IoError> {
        let start = (start_lba * self.sector_bytes as u64) as usize;
        let len = (count_lba * self.sector_bytes as u64) as usize;
        self.sectors[start..start + len].copy_from_slice(&src[..len]);
        Ok(())
    }
}

pub struct FakeSecureCounter(pub u32);
impl SecureCounter for FakeSecureCounter {
    fn read(&self) -> u32 {
        self.0
    }
    fn write(&mut self, value: u32) -> Result<(), IoError> {
        self.0 = value;
        Ok(())
    }
    fn lock(&mut self, _recovery: bool) -> Result<(), IoError> {
        Ok(())
    }
}

pub struct FakeNv(pub [u8; 16]);
impl NvStorage for FakeNv {
    fn read_block(&self) -> [u8; 16] {
        self.0
    }
    fn write_block(&mut self, block: &[u8; 16]) -> Result<(), IoError> {
        self.0 = *block;
        Ok(())
    }
}
