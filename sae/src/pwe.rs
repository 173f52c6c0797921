//! Hunting-and-pecking helpers shared by both group backends.
//!
//! Each candidate is derived from a seed keyed with both peer identities:
//!
//! ```text
//! pwd-seed  = HMAC-SHA-256(max(A, B) || min(A, B), password [|| identifier] || counter)
//! pwd-value = KDF-Hash-Length(pwd-seed, "SAE Hunting and Pecking", p, len(p))
//! ```
//!
//! The backends decide which candidates are valid; this module owns the
//! loop that keeps iterating past the first valid candidate so that the
//! number of iterations reveals nothing about the password.

use crate::{
    Error, Result,
    kdf::{self, MAC_LEN},
};
use alloc::vec::Vec;
use subtle::Choice;
use tracing::trace;
use zeroize::Zeroizing;

/// Hard cap on derivation iterations.
pub(crate) const MAX_ITERATIONS: u8 = 200;

/// Minimum iterations for elliptic curve groups.
pub(crate) const MIN_ECC_ITERATIONS: u8 = 40;

/// Minimum iterations for safe-prime MODP groups.
pub(crate) const MIN_SAFE_PRIME_ITERATIONS: u8 = 1;

const HUNT_LABEL: &[u8] = b"SAE Hunting and Pecking";

/// Key for the seed HMAC: the larger identity first.
pub(crate) fn seed_key(id_a: &[u8], id_b: &[u8]) -> Vec<u8> {
    let (first, second) = if id_a > id_b { (id_a, id_b) } else { (id_b, id_a) };
    let mut key = Vec::with_capacity(first.len() + second.len());
    key.extend_from_slice(first);
    key.extend_from_slice(second);
    key
}

/// `pwd-seed` for one iteration.
pub(crate) fn pwd_seed(
    seed_key: &[u8],
    password: &[u8],
    identifier: Option<&[u8]>,
    counter: u8,
) -> Result<Zeroizing<[u8; MAC_LEN]>> {
    let seed = match identifier {
        Some(identifier) => kdf::hmac_sha256(seed_key, &[password, identifier, &[counter]]),
        None => kdf::hmac_sha256(seed_key, &[password, &[counter]]),
    };

    seed.map(Zeroizing::new)
        .map_err(|_| Error::DerivationFailure)
}

/// `pwd-value` for one iteration, written into `out` as a big-endian
/// integer of `prime_bits` bits.
pub(crate) fn pwd_value(
    seed: &[u8; MAC_LEN],
    prime: &[u8],
    prime_bits: usize,
    out: &mut [u8],
) -> Result<()> {
    kdf::prf_bits(seed, HUNT_LABEL, prime, prime_bits, out).map_err(|_| Error::DerivationFailure)?;

    if prime_bits % 8 != 0 {
        shift_right(out, 8 - (prime_bits % 8) as u32);
    }

    Ok(())
}

/// Low bit of the seed; selects the parity of the recovered coordinate.
pub(crate) fn seed_parity(seed: &[u8; MAC_LEN]) -> u8 {
    seed[MAC_LEN - 1] & 1
}

/// Shift a big-endian buffer right by `bits` (less than 8) bits.
pub(crate) fn shift_right(buf: &mut [u8], bits: u32) {
    debug_assert!(bits > 0 && bits < 8);
    let mut carry = 0u8;
    for byte in buf.iter_mut() {
        let next = *byte << (8 - bits);
        *byte = (*byte >> bits) | carry;
        carry = next;
    }
}

/// Run the derivation loop.
///
/// `attempt` is called with the iteration counter and whether a valid
/// candidate has already been found, and returns whether this iteration's
/// candidate is valid. It must record only the first valid candidate and
/// must do so without branching on either flag.
///
/// The loop runs at least `min_iterations` times and stops at the first
/// iteration after that with a recorded candidate. Exceeding
/// [`MAX_ITERATIONS`] is a [`Error::DerivationFailure`].
pub(crate) fn hunt<F>(min_iterations: u8, mut attempt: F) -> Result<()>
where
    F: FnMut(u8, Choice) -> Result<Choice>,
{
    let mut found = Choice::from(0);
    let mut counter = 1u8;

    loop {
        if counter > MAX_ITERATIONS {
            return Err(Error::DerivationFailure);
        }

        found |= attempt(counter, found)?;

        if counter >= min_iterations && bool::from(found) {
            trace!(iterations = counter, "password element found");
            return Ok(());
        }

        counter += 1;
    }
}
