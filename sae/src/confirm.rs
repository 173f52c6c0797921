//! Confirm message framing and the confirm function `CN`.
//!
//! ```text
//! send-confirm (LE16) || HMAC-SHA-256(KCK, send-confirm || scalar1 || element1 || scalar2 || element2)
//! ```

use crate::{
    Error, Result,
    kdf::{self, MAC_LEN},
};
use subtle::ConstantTimeEq;
use tracing::debug;

/// Minimum length of a confirm message.
pub(crate) const CONFIRM_LEN: usize = 2 + MAC_LEN;

/// Compute `CN(KCK, send_confirm, scalar1, element1, scalar2, element2)`.
pub(crate) fn confirm_mac(
    kck: &[u8],
    send_confirm: u16,
    scalar1: &[u8],
    element1: &[u8],
    scalar2: &[u8],
    element2: &[u8],
) -> Result<[u8; MAC_LEN]> {
    kdf::hmac_sha256(
        kck,
        &[
            &send_confirm.to_le_bytes(),
            scalar1,
            element1,
            scalar2,
            element2,
        ],
    )
    .map_err(|_| Error::KeyDerivationFailure)
}

/// Split a confirm message into its send-confirm counter and MAC.
///
/// Bytes beyond the MAC are ignored.
pub(crate) fn split(msg: &[u8]) -> Result<(u16, &[u8])> {
    if msg.len() < CONFIRM_LEN {
        debug!(len = msg.len(), "confirm too short");
        return Err(Error::MalformedMessage);
    }

    let send_confirm = u16::from_le_bytes([msg[0], msg[1]]);
    Ok((send_confirm, &msg[2..CONFIRM_LEN]))
}

/// Constant-time comparison of a received MAC with the expected one.
pub(crate) fn mac_eq(expected: &[u8], received: &[u8]) -> bool {
    expected.len() == received.len() && bool::from(expected.ct_eq(received))
}
