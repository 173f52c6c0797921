//! SHA-256 based key derivation (IEEE 802.11 KDF) and the SAE key schedule.

use hmac::{Hmac, Mac, digest::InvalidLength};
use sha2::Sha256;
use zeroize::{Zeroize, ZeroizeOnDrop, Zeroizing};

pub(crate) type HmacSha256 = Hmac<Sha256>;

/// Output length of HMAC-SHA-256.
pub(crate) const MAC_LEN: usize = 32;

/// Length of the key confirmation key.
pub const KCK_LEN: usize = 32;

/// Length of the pairwise master key.
pub const PMK_LEN: usize = 32;

/// Length of the pairwise master key identifier.
pub const PMKID_LEN: usize = 16;

const KEYS_LABEL: &[u8] = b"SAE KCK and PMK";

/// HMAC-SHA-256 over the concatenation of `parts`.
pub(crate) fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> Result<[u8; MAC_LEN], InvalidLength> {
    let mut mac = HmacSha256::new_from_slice(key)?;
    for part in parts {
        mac.update(part);
    }
    Ok(mac.finalize().into_bytes().into())
}

/// `KDF-Hash-Length` with SHA-256, producing `bits` bits into `out`.
///
/// `out` must be `ceil(bits / 8)` bytes. When `bits` is not a multiple of
/// eight the unused low-order bits of the final byte are cleared.
pub(crate) fn prf_bits(
    key: &[u8],
    label: &[u8],
    data: &[u8],
    bits: usize,
    out: &mut [u8],
) -> Result<(), InvalidLength> {
    debug_assert_eq!(out.len(), bits.div_ceil(8));
    let length = (bits as u16).to_le_bytes();

    for (i, chunk) in out.chunks_mut(MAC_LEN).enumerate() {
        let counter = (i as u16 + 1).to_le_bytes();
        let block = Zeroizing::new(hmac_sha256(key, &[&counter, label, data, &length])?);
        chunk.copy_from_slice(&block[..chunk.len()]);
    }

    if bits % 8 != 0 {
        if let Some(last) = out.last_mut() {
            *last &= 0xffu8 << (8 - bits % 8);
        }
    }

    Ok(())
}

/// Keys produced by a completed exchange.
#[derive(Zeroize, ZeroizeOnDrop)]
pub(crate) struct Keys {
    pub(crate) kck: [u8; KCK_LEN],
    pub(crate) pmk: [u8; PMK_LEN],
    pub(crate) pmkid: [u8; PMKID_LEN],
}

impl Keys {
    /// Derive KCK, PMK and PMKID from the shared secret `k` and the
    /// serialized scalar sum `context`.
    pub(crate) fn derive(k: &[u8], context: &[u8]) -> Result<Self, InvalidLength> {
        let keyseed = Zeroizing::new(hmac_sha256(&[0u8; MAC_LEN], &[k])?);
        let mut okm = Zeroizing::new([0u8; KCK_LEN + PMK_LEN]);
        prf_bits(&*keyseed, KEYS_LABEL, context, okm.len() * 8, &mut *okm)?;

        let mut keys = Self {
            kck: [0; KCK_LEN],
            pmk: [0; PMK_LEN],
            pmkid: [0; PMKID_LEN],
        };
        keys.kck.copy_from_slice(&okm[..KCK_LEN]);
        keys.pmk.copy_from_slice(&okm[KCK_LEN..]);
        keys.pmkid.copy_from_slice(&context[..PMKID_LEN]);
        Ok(keys)
    }
}
