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
//! use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
//! use sae::{Config, Outcome, Session, State};
//!
//! let mut rng = ChaCha20Rng::seed_from_u64(0x5ae);
//! let ap: [u8; 6] = [0x02, 0, 0, 0, 0, 1];
//! let sta: [u8; 6] = [0x02, 0, 0, 0, 0, 2];
//!
//! let mut alice = Session::new(Config::default());
//! let mut bob = Session::new(Config::default());
//! alice.derive_pwe(&mut rng, b"correcthorse", &ap, &sta, None)?;
//! bob.derive_pwe(&mut rng, b"correcthorse", &sta, &ap, None)?;
//!
//! let commit = alice.build_commit(None, None)?;
//! assert_eq!(bob.parse_commit(&commit)?, Outcome::Accepted);
//! let commit = bob.build_commit(None, None)?;
//! assert_eq!(alice.parse_commit(&commit)?, Outcome::Accepted);
//!
//! alice.derive_keys()?;
//! bob.derive_keys()?;
//!
//! let confirm = alice.build_confirm()?;
//! assert_eq!(bob.check_confirm(&confirm)?, Outcome::Accepted);
//! let confirm = bob.build_confirm()?;
//! assert_eq!(alice.check_confirm(&confirm)?, Outcome::Accepted);
//!
//! assert_eq!(alice.state(), State::Accepted);
//! assert_eq!(alice.pmk(), bob.pmk());
//! # Ok::<(), sae::Error>(())
//! ```

extern crate alloc;

pub mod status;

mod commit;
mod config;
mod confirm;
mod error;
mod exchange;
mod group;
mod kdf;
mod pwe;
mod session;
mod token;

pub use crate::{
    config::{Config, DEFAULT_ANTI_CLOGGING_THRESHOLD, DEFAULT_GROUPS},
    error::{Error, Result},
    group::{Curve, Group, SUITABLE_GROUPS, is_suitable, select_group},
    kdf::{KCK_LEN, PMK_LEN, PMKID_LEN},
    session::{Outcome, Session, State},
    token::{TOKEN_LEN, TokenIssuer, token_request},
};
pub use modp;
