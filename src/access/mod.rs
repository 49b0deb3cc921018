// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Access Bitstring Encoder
//!
//! Each document carries a fixed-width bitstring of hashed principals (owner
//! and groups) plus a reserved public bit. Search-time visibility is a coarse
//! pre-filter: a set bit means "maybe readable", a clear bit means "not
//! readable by this principal". Distinct principals may share a bit.
//!
//! # Example
//!
//! ```rust
//! use stac_compiler::access::AccessBitstring;
//!
//! let mut bits = AccessBitstring::encode(1024, Some("alice"), &["analysts"], false).unwrap();
//! assert!(bits.visible_to(Some("alice"), &[] as &[&str]));
//!
//! bits.add("bob");
//! bits.remove("bob");
//! assert!(!bits.contains("bob"));
//!
//! let stored = bits.to_string();
//! assert_eq!(stored.len(), 1024);
//! assert_eq!(stored.parse::<AccessBitstring>().unwrap(), bits);
//! ```

mod bitstring;

pub use bitstring::{principal_index, AccessBitstring, BitstringError, MIN_BITSTRING_SIZE};
