//! Anti-clogging tokens.
//!
//! A responder under load answers a commit with a token request instead of
//! processing it. The peer must repeat its commit with the token included,
//! which proves that it receives frames sent to its claimed address.
//!
//! ```text
//! token = idx (BE16) || HMAC-SHA-256(key, address || idx)[2..32]
//! ```
//!
//! The index lets a token be matched against the pending table without
//! storing per-peer state beyond one counter per address slot.

use crate::{
    Error, Result,
    confirm::mac_eq,
    kdf::{self, MAC_LEN},
};
use alloc::vec::Vec;
use rand_core::CryptoRngCore;
use tracing::{debug, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Length of an anti-clogging token.
pub const TOKEN_LEN: usize = MAC_LEN;

/// Number of pending-token slots.
const SLOTS: usize = 256;

/// Issues and verifies anti-clogging tokens for a responder.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct TokenIssuer {
    key: [u8; MAC_LEN],
    counter: u16,
    pending: [u16; SLOTS],
}

impl TokenIssuer {
    /// Create an issuer with a fresh random key.
    pub fn new<R: CryptoRngCore + ?Sized>(rng: &mut R) -> Result<Self> {
        let mut issuer = Self {
            key: [0; MAC_LEN],
            counter: 0,
            pending: [0; SLOTS],
        };
        issuer.rotate(rng)?;
        Ok(issuer)
    }

    /// Replace the key, invalidating every outstanding token.
    ///
    /// Also happens automatically when the token counter wraps. Callers
    /// are expected to rotate periodically, e.g. every minute.
    pub fn rotate<R: CryptoRngCore + ?Sized>(&mut self, rng: &mut R) -> Result<()> {
        rng.try_fill_bytes(&mut self.key)
            .map_err(|_| Error::DerivationFailure)?;
        self.counter = 0;
        self.pending = [0; SLOTS];
        debug!("anti-clogging token key rotated");
        Ok(())
    }

    /// Issue a token for the peer with link-layer address `peer`.
    pub fn issue<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        peer: &[u8],
    ) -> Result<[u8; TOKEN_LEN]> {
        if self.counter == u16::MAX {
            self.rotate(rng)?;
        }
        self.counter += 1;
        let idx = self.counter;

        let slot = self.slot(peer)?;
        self.pending[slot] = idx;

        let mac = self.mac(peer, idx)?;
        let mut token = [0u8; TOKEN_LEN];
        token[..2].copy_from_slice(&idx.to_be_bytes());
        token[2..].copy_from_slice(&mac[2..]);

        debug!(idx, "anti-clogging token issued");
        Ok(token)
    }

    /// Check a token received from `peer`. A token verifies at most once.
    pub fn verify(&mut self, peer: &[u8], token: &[u8]) -> bool {
        if token.len() != TOKEN_LEN {
            warn!(len = token.len(), "anti-clogging token has wrong length");
            return false;
        }

        let idx = u16::from_be_bytes([token[0], token[1]]);
        let Ok(slot) = self.slot(peer) else {
            return false;
        };
        if idx == 0 || self.pending[slot] != idx {
            warn!(idx, "anti-clogging token not pending");
            return false;
        }

        let Ok(mac) = self.mac(peer, idx) else {
            return false;
        };
        if !mac_eq(&mac[2..], &token[2..]) {
            warn!(idx, "anti-clogging token does not authenticate");
            return false;
        }

        self.pending[slot] = 0;
        true
    }

    fn slot(&self, peer: &[u8]) -> Result<usize> {
        kdf::hmac_sha256(&self.key, &[peer])
            .map(|mac| usize::from(mac[0]))
            .map_err(|_| Error::DerivationFailure)
    }

    fn mac(&self, peer: &[u8], idx: u16) -> Result<[u8; MAC_LEN]> {
        kdf::hmac_sha256(&self.key, &[peer, &idx.to_be_bytes()])
            .map_err(|_| Error::DerivationFailure)
    }
}

impl core::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("counter", &self.counter)
            .finish_non_exhaustive()
    }
}

/// Build a token request: the group id followed by the token.
pub fn token_request(group: u16, token: &[u8]) -> Vec<u8> {
    let mut msg = Vec::with_capacity(2 + token.len());
    msg.extend_from_slice(&group.to_le_bytes());
    msg.extend_from_slice(token);
    msg
}
