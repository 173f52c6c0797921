//! Checks that `sae` builds without `std`.

#![no_std]

pub use sae::{Config, Session, TokenIssuer};
