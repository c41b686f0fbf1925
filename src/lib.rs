// SPDX-License-Identifier: MPL-2.0
#![cfg_attr(not(test), no_std)]
#![allow(dead_code)]
#![deny(
    array_into_iter,
    bare_trait_objects,
    deprecated,
    ellipsis_inclusive_range_patterns,
    exported_private_dependencies,
    illegal_floating_point_literal_pattern,
    improper_ctypes,
    incomplete_features,
    intra_doc_link_resolution_failure,
    invalid_value,
    irrefutable_let_patterns,
    late_bound_lifetime_arguments,
    mutable_borrow_reservation_conflict,
    non_shorthand_field_patterns,
    non_snake_case,
    non_upper_case_globals,
    no_mangle_generic_items,
    overlapping_patterns,
    path_statements,
    private_in_public,
    proc_macro_derive_resolution_fallback,
    redundant_semicolons,
    renamed_and_removed_lints,
    safe_packed_borrows,
    stable_features,
    trivial_bounds,
    type_alias_bounds,
    tyvar_behind_raw_pointer,
    unconditional_recursion,
    unknown_lints,
    unnameable_test_items,
    unreachable_code,
    unreachable_patterns,
    unstable_name_collisions,
    unused_allocation,
    unused_assignments,
    unused_attributes,
    unused_comparisons,
    unused_doc_comments,
    unused_features,
    unused_imports,
    unused_labels,
    unused_macros,
    unused_must_use,
    unused_mut,
    unused_parens,
    unused_unsafe,
    unused_variables,
    where_clauses_object_safety,
    while_true,
    ambiguous_associated_items,
    arithmetic_overflow,
    const_err,
    ill_formed_attribute_input,
    invalid_type_param_default,
    macro_expanded_macro_exports_accessed_by_absolute_paths,
    missing_fragment_specifier,
    mutable_transmutes,
    no_mangle_const_items,
    order_dependent_trait_objects,
    overflowing_literals,
    patterns_in_fns_without_body,
    pub_use_of_private_extern_crate,
    soft_unstable,
    unknown_crate_types
)]
#![deny(clippy::all)]

//! Verified-boot decision core.
//!
//! This crate holds no I/O of its own: every disk read/write, cryptographic primitive, secure
//! counter and NV-storage access crosses the [`collaborators`] traits, so the same decision logic
//! runs unmodified on real firmware and on the fakes used by this crate's own test suite.

/// CRC-8 and CRC-32 routines shared by the NV block codec and the GPT header/entries checks.
pub mod crc;
/// Crate-wide error types, one enum per subsystem plus an aggregate [`error::Error`].
pub mod error;
/// Collaborator traits the host firmware implements: `Disk`, `Crypto`, `SecureCounter`, `NvStorage`.
pub mod collaborators;
/// GPT parsing, cross-validation, repair and the priority-ordered kernel-partition iterator.
pub mod gpt;
/// Signed key-block, preamble and body verification (the signature chain, §4.3).
pub mod verify;
/// Boot-mode derivation and the per-mode key-block-flag/rollback policy table (§4.4).
pub mod policy;
/// The 16-byte NV policy block: codec, typed field accessors, A/B firmware try logic (§4.6, §4.7).
pub mod nvdata;
/// Fixed-size diagnostic rings recording the outcome of every `load_kernel` call (§9a).
pub mod diagnostics;
/// `load_kernel`: the top-level orchestrator tying GPT selection, verification, policy, anti-rollback
/// and diagnostics together (§4.5).
pub mod orchestrator;

pub use collaborators::{Crypto, Digest, Disk, NvStorage, PublicKey, SecureCounter};
pub use diagnostics::{CallRecord, CheckResult, DiagnosticRing, FailureCode, PartitionRecord};
pub use error::{Error, GptError, IoError, LoadError, NvError, PolicyError, VerifyError};
pub use nvdata::{FwResult, NvContext, RecoveryReason};
pub use orchestrator::{load_kernel, Selected, VerificationContext, KBUF_SIZE};
pub use policy::BootMode;
