// SPDX-License-Identifier: MPL-2.0
//! The GPT engine (C3/C4): header and entry validation, the primary/secondary aggregate, and
//! kernel-partition enumeration.

pub mod entry;
pub mod header;
pub mod iterator;
pub mod table;

pub use entry::Entry;
pub use header::{Header, Which};
pub use iterator::{Candidate, KernelIterator};
pub use table::{GptFlags, GptTable, Modified};
