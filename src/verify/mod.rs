// SPDX-License-Identifier: MPL-2.0
//! The signed-structure verifier (C5): algorithm enumeration, key block, preamble, and body.

pub mod algorithm;
pub mod body;
pub mod keyblock;
pub mod preamble;

pub use algorithm::{Algorithm, HashAlgorithm, SignatureAlgorithm};
pub use body::verify_body;
pub use keyblock::{verify_key_block, KeyBlockFlags, KeyBlockInfo};
pub use preamble::{verify_preamble, PreambleInfo};
