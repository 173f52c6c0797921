//! MODP group arithmetic.

use crate::{Error, Result, primes};
use core::fmt;
use crypto_bigint::{
    Encoding, U4096,
    modular::runtime_mod::{DynResidue, DynResidueParams},
};
use subtle::{Choice, ConstantTimeEq, ConstantTimeLess};
use zeroize::Zeroize;

/// Integer type wide enough for the largest registered prime.
///
/// Smaller groups use the same width; values are always `< p`.
pub type Uint = U4096;

const LIMBS: usize = Uint::LIMBS;

/// Byte length of the largest registered prime.
pub const MAX_PRIME_LEN: usize = Uint::BYTES;

/// A registered MODP group: a safe prime `p = 2q + 1` and its subgroup of
/// prime order `q`.
#[derive(Clone)]
pub struct ModpGroup {
    id: u16,
    prime_bits: usize,
    prime: Uint,
    prime_minus_one: Uint,
    order: Uint,
    params: DynResidueParams<LIMBS>,
}

impl ModpGroup {
    /// Load the group registered under the given IANA id.
    pub fn new(id: u16) -> Option<Self> {
        let bytes = primes::lookup(id)?;
        let prime = decode_padded(bytes);
        let prime_minus_one = prime.wrapping_sub(&Uint::ONE);

        Some(Self {
            id,
            // every registered prime has its top bit set
            prime_bits: bytes.len() * 8,
            prime,
            prime_minus_one,
            order: prime.shr_vartime(1),
            params: DynResidueParams::new(&prime),
        })
    }

    /// IANA group id.
    pub fn id(&self) -> u16 {
        self.id
    }

    /// Bit length of `p`.
    pub fn prime_bits(&self) -> usize {
        self.prime_bits
    }

    /// Byte length of `p`; all values are serialized at this width.
    pub fn prime_len(&self) -> usize {
        self.prime_bits.div_ceil(8)
    }

    /// Bit length of the subgroup order `q`.
    pub fn order_bits(&self) -> usize {
        self.prime_bits - 1
    }

    /// The prime modulus `p`.
    pub fn prime(&self) -> &Uint {
        &self.prime
    }

    /// The subgroup order `q = (p - 1) / 2`.
    pub fn order(&self) -> &Uint {
        &self.order
    }

    /// Decode exactly [`ModpGroup::prime_len`] big-endian bytes.
    ///
    /// No range check is performed.
    pub fn decode(&self, bytes: &[u8]) -> Result<Uint> {
        if bytes.len() != self.prime_len() {
            return Err(Error);
        }

        Ok(decode_padded(bytes))
    }

    /// Encode `value` into `out`, which must be exactly
    /// [`ModpGroup::prime_len`] bytes long.
    pub fn encode(&self, value: &Uint, out: &mut [u8]) -> Result<()> {
        if out.len() != self.prime_len() {
            return Err(Error);
        }

        let mut bytes = value.to_be_bytes();
        out.copy_from_slice(&bytes[MAX_PRIME_LEN - out.len()..]);
        bytes.zeroize();
        Ok(())
    }

    /// Is `x < p`?
    pub fn is_reduced(&self, x: &Uint) -> Choice {
        x.ct_lt(&self.prime)
    }

    /// Is `1 < x < p - 1`?
    pub fn is_in_range(&self, x: &Uint) -> Choice {
        Uint::ONE.ct_lt(x) & x.ct_lt(&self.prime_minus_one)
    }

    /// Is `1 < s < q`?
    pub fn is_valid_scalar(&self, s: &Uint) -> Choice {
        Uint::ONE.ct_lt(s) & s.ct_lt(&self.order)
    }

    /// Is `x` in range and a member of the order-`q` subgroup?
    pub fn is_subgroup_element(&self, x: &Uint) -> Choice {
        let in_range = self.is_in_range(x);
        let power = self.pow(x, &self.order, self.order_bits());
        in_range & power.ct_eq(&Uint::ONE)
    }

    /// Compute `a * b mod p`.
    pub fn mul(&self, a: &Uint, b: &Uint) -> Uint {
        (&self.residue(a) * &self.residue(b)).retrieve()
    }

    /// Compute `base^exponent mod p`.
    ///
    /// Only the low `exponent_bits` bits of the exponent are used; the
    /// running time depends on `exponent_bits` but not on the exponent.
    pub fn pow(&self, base: &Uint, exponent: &Uint, exponent_bits: usize) -> Uint {
        self.residue(base)
            .pow_bounded_exp(exponent, exponent_bits)
            .retrieve()
    }

    /// Compute `a^-1 mod p` as `a^(p - 2)`.
    ///
    /// Returns zero for zero.
    pub fn invert(&self, a: &Uint) -> Uint {
        let exponent = self.prime.wrapping_sub(&Uint::from_u8(2));
        self.pow(a, &exponent, self.prime_bits)
    }

    /// Compute `(a + b) mod q` for scalars already reduced mod `q`.
    pub fn add_scalars(&self, a: &Uint, b: &Uint) -> Uint {
        a.add_mod(b, &self.order)
    }

    fn residue(&self, x: &Uint) -> DynResidue<LIMBS> {
        DynResidue::new(x, self.params)
    }
}

impl fmt::Debug for ModpGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModpGroup")
            .field("id", &self.id)
            .field("prime_bits", &self.prime_bits)
            .finish_non_exhaustive()
    }
}

/// Decode up to [`MAX_PRIME_LEN`] big-endian bytes.
fn decode_padded(bytes: &[u8]) -> Uint {
    let mut buf = [0u8; MAX_PRIME_LEN];
    buf[MAX_PRIME_LEN - bytes.len()..].copy_from_slice(bytes);
    let value = Uint::from_be_slice(&buf);
    buf.zeroize();
    value
}

#[cfg(test)]
mod tests {
    use super::{ModpGroup, Uint};
    use crate::GROUP_IDS;

    #[test]
    fn order_is_half_of_prime_minus_one() {
        for id in GROUP_IDS {
            let group = ModpGroup::new(id).unwrap();
            let doubled = group.order().wrapping_add(group.order());
            assert_eq!(doubled.wrapping_add(&Uint::ONE), *group.prime());
        }
    }

    #[test]
    fn unknown_group() {
        assert!(ModpGroup::new(19).is_none());
        assert!(ModpGroup::new(0).is_none());
    }

    #[test]
    fn prime_lengths() {
        let lengths: [usize; 6] = GROUP_IDS.map(|id| ModpGroup::new(id).unwrap().prime_len());
        assert_eq!(lengths, [96, 128, 192, 256, 384, 512]);
    }
}
