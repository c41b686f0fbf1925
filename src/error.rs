// SPDX-License-Identifier: MPL-2.0
//! Closed, matchable error kinds for every subsystem.
//!
//! The original C library (`gpt_misc.h`, `vboot_kernel.c`, `2common.h`) represents failures as
//! small integer enums precisely so callers and tests can switch on *which* check failed, not just
//! "it failed". A dynamically-typed error (`anyhow::Error`) would throw that away, so each
//! subsystem gets its own `#[non_exhaustive]` enum here instead.

use core::fmt;

/// GPT structural errors (`GPT_ERROR_*` in the original library).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GptError {
    BadSignature,
    BadHeaderCrc,
    BadEntriesCrc,
    BadMyLba,
    BadAlternateLba,
    BadHeaderSize,
    BadEntrySize,
    TooManyEntries,
    InvalidSectorSize,
    InvalidSectorNumber,
    EntriesOutOfRegion,
    EntryOutOfRange,
    StartLbaOverlap,
    EndLbaOverlap,
    DuplicateGuid,
    NoSuchEntry,
    InvalidHeaders,
    InvalidEntries,
    ExternalGptUnsupported,
}

impl fmt::Display for GptError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            GptError::BadSignature => "GPT header signature mismatch",
            GptError::BadHeaderCrc => "GPT header CRC32 mismatch",
            GptError::BadEntriesCrc => "GPT entries array CRC32 mismatch",
            GptError::BadMyLba => "GPT header my_lba does not match expected location",
            GptError::BadAlternateLba => "GPT header alternate_lba does not match the other copy",
            GptError::BadHeaderSize => "GPT header_size out of bounds",
            GptError::BadEntrySize => "GPT size_of_entry is not 128",
            GptError::TooManyEntries => "GPT number_of_entries exceeds the supported maximum",
            GptError::InvalidSectorSize => "unsupported sector size",
            GptError::InvalidSectorNumber => "drive too small for a valid GPT layout",
            GptError::EntriesOutOfRegion => "entries_lba overlaps the usable region or device",
            GptError::EntryOutOfRange => "entry LBA range outside first/last usable LBA",
            GptError::StartLbaOverlap => "entry start_lba overlaps another entry",
            GptError::EndLbaOverlap => "entry end_lba overlaps another entry",
            GptError::DuplicateGuid => "duplicate unique_guid across entries",
            GptError::NoSuchEntry => "no such GPT entry",
            GptError::InvalidHeaders => "neither GPT header copy is valid",
            GptError::InvalidEntries => "neither GPT entries copy is valid",
            GptError::ExternalGptUnsupported => "external GPT geometry is not supported by this core",
        };
        f.write_str(msg)
    }
}

/// Self-description and signature-chain errors for key blocks, preambles and bodies.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyError {
    UnpackKeySize,
    UnpackKeyAlign,
    UnpackKeyArraySize,
    UnpackKeySigAlgorithm,
    UnpackKeyHashAlgorithm,
    UnpackKeyStructVersion,
    SigHeaderSize,
    SigTotalSize,
    InsideDataOutside,
    CommonMemberSize,
    CommonMemberUnaligned,
    BadMagic,
    SignatureMismatch,
    HashMismatch,
    WorkbufTooSmall,
    BodyOffset,
    BodyExceedsBuffer,
    BodyExceedsPartition,
}

impl fmt::Display for VerifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            VerifyError::UnpackKeySize => "key size inconsistent with buffer",
            VerifyError::UnpackKeyAlign => "key data unaligned",
            VerifyError::UnpackKeyArraySize => "key array size invalid for its modulus size",
            VerifyError::UnpackKeySigAlgorithm => "unknown signature algorithm",
            VerifyError::UnpackKeyHashAlgorithm => "unknown hash algorithm",
            VerifyError::UnpackKeyStructVersion => "struct version too new to parse",
            VerifyError::SigHeaderSize => "signature header size inconsistent with buffer",
            VerifyError::SigTotalSize => "signature total size inconsistent with buffer",
            VerifyError::InsideDataOutside => "member claims to be inside data it lies outside of",
            VerifyError::CommonMemberSize => "variable member offset/size outside total_size",
            VerifyError::CommonMemberUnaligned => "variable member offset violates required alignment",
            VerifyError::BadMagic => "structure magic mismatch",
            VerifyError::SignatureMismatch => "signature verification failed",
            VerifyError::HashMismatch => "hash verification failed",
            VerifyError::WorkbufTooSmall => "caller-supplied work buffer too small",
            VerifyError::BodyOffset => "kernel body does not start on a sector boundary",
            VerifyError::BodyExceedsBuffer => "kernel body does not fit the caller's load buffer",
            VerifyError::BodyExceedsPartition => "kernel body does not fit inside its partition",
        };
        f.write_str(msg)
    }
}

/// Mode-policy rejections (distinct from pure structural/signature failures).
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PolicyError {
    KeyBlockFlagMismatch,
    SelfSignedDisallowed,
    Rollback,
}

impl fmt::Display for PolicyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            PolicyError::KeyBlockFlagMismatch => "key block flags do not permit this boot mode",
            PolicyError::SelfSignedDisallowed => "self-signed (hash-only) kernels are disabled",
            PolicyError::Rollback => "version is lower than the secure counter",
        };
        f.write_str(msg)
    }
}

/// Collaborator I/O failures. The collaborator's own error is opaque to the core (§6); only the
/// direction of the failure is preserved.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IoError {
    ReadFailed,
    WriteFailed,
}

impl fmt::Display for IoError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            IoError::ReadFailed => "disk read failed",
            IoError::WriteFailed => "disk write failed",
        };
        f.write_str(msg)
    }
}

/// NV policy block errors. `CrcBad` is recoverable (the block resets to defaults); the others are
/// programmer errors in the caller, surfaced rather than silently clamped.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NvError {
    CrcBad,
    UnknownField,
    ValueOutOfRange,
}

impl fmt::Display for NvError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            NvError::CrcBad => "NV block CRC invalid, reset to defaults",
            NvError::UnknownField => "unknown NV field",
            NvError::ValueOutOfRange => "NV field value out of range",
        };
        f.write_str(msg)
    }
}

/// Top-level orchestrator failure classification (§4.5, §7). Every lower-level error collapses
/// into one of these four at the `load_kernel` boundary.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadError {
    InvalidParameter,
    GptRead,
    GptParse,
    InvalidKernelFound,
    NoKernelFound,
}

impl fmt::Display for LoadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msg = match self {
            LoadError::InvalidParameter => "load_kernel called with invalid parameters",
            LoadError::GptRead => "unable to read GPT data from disk",
            LoadError::GptParse => "GPT data failed validation",
            LoadError::InvalidKernelFound => "kernel partitions were found but none were usable",
            LoadError::NoKernelFound => "no kernel partitions were found",
        };
        f.write_str(msg)
    }
}

/// Aggregate error type threading any subsystem error through a single `Result` alias.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Gpt(GptError),
    Verify(VerifyError),
    Policy(PolicyError),
    Io(IoError),
    Nv(NvError),
    Load(LoadError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Gpt(e) => e.fmt(f),
            Error::Verify(e) => e.fmt(f),
            Error::Policy(e) => e.fmt(f),
            Error::Io(e) => e.fmt(f),
            Error::Nv(e) => e.fmt(f),
            Error::Load(e) => e.fmt(f),
        }
    }
}

impl From<GptError> for Error {
    fn from(e: GptError) -> Self {
        Error::Gpt(e)
    }
}
impl From<VerifyError> for Error {
    fn from(e: VerifyError) -> Self {
        Error::Verify(e)
    }
}
impl From<PolicyError> for Error {
    fn from(e: PolicyError) -> Self {
        Error::Policy(e)
    }
}
impl From<IoError> for Error {
    fn from(e: IoError) -> Self {
        Error::Io(e)
    }
}
impl From<NvError> for Error {
    fn from(e: NvError) -> Self {
        Error::Nv(e)
    }
}
impl From<LoadError> for Error {
    fn from(e: LoadError) -> Self {
        Error::Load(e)
    }
}

pub type Result<T, E = Error> = core::result::Result<T, E>;
