//! Checks that `modp` builds without `std`.

#![no_std]

pub use modp::ModpGroup;
