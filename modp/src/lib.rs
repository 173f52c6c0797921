#![no_std]
#![cfg_attr(docsrs, feature(doc_auto_cfg))]
#![doc = include_str!("../README.md")]
#![forbid(unsafe_code)]
#![warn(
    clippy::mod_module_files,
    clippy::unwrap_used,
    missing_docs,
    rust_2018_idioms,
    unused_lifetimes,
    unused_qualifications
)]

//! ## Usage
//!
//! ```
//! use modp::{ModpGroup, Uint};
//!
//! let group = ModpGroup::new(14).expect("group 14 is registered");
//! assert_eq!(group.prime_len(), 256);
//!
//! // 2 generates the prime-order subgroup of every registered group.
//! let g = Uint::from_u8(2);
//! assert!(bool::from(group.is_subgroup_element(&g)));
//! ```

mod error;
mod group;
mod primes;

pub use crate::{
    error::{Error, Result},
    group::{MAX_PRIME_LEN, ModpGroup, Uint},
};
pub use crypto_bigint as bigint;
pub use subtle;

/// IANA ids of every registered MODP group, smallest prime first.
pub const GROUP_IDS: [u16; 6] = [1, 2, 5, 14, 15, 16];
