//! Finite field backend over the MODP groups.

use super::Backend;
use crate::{
    Error, Result,
    pwe::{self, MIN_SAFE_PRIME_ITERATIONS},
};
use alloc::vec;
use modp::{ModpGroup, Uint};
use rand_core::CryptoRngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::Zeroizing;

/// Attempts allowed when sampling random scalars.
const MAX_RANDOM_ATTEMPTS: usize = 100;

/// `(p - 1) / q` for a safe prime.
const SAFE_PRIME_COFACTOR: u8 = 2;

/// Finite field backend for one MODP group.
pub(crate) struct Ffc {
    group: ModpGroup,
}

impl Ffc {
    pub(crate) fn new(group: ModpGroup) -> Self {
        Self { group }
    }

    fn decode(&self, bytes: &[u8]) -> Result<Uint> {
        self.group.decode(bytes).map_err(|_| Error::MalformedMessage)
    }

    fn encode(&self, value: &Uint, out: &mut [u8]) {
        // callers size `out` from `prime_len`
        let encoded = self.group.encode(value, out);
        debug_assert!(
            encoded.is_ok(),
            "{}-byte buffer for a {}-byte prime",
            out.len(),
            self.group.prime_len()
        );
    }
}

impl Backend for Ffc {
    type Scalar = Uint;
    type Element = Uint;

    fn prime_len(&self) -> usize {
        self.group.prime_len()
    }

    fn element_len(&self) -> usize {
        self.group.prime_len()
    }

    fn derive_pwe<R: CryptoRngCore + ?Sized>(
        &self,
        _rng: &mut R,
        seed_key: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<Uint> {
        let group = &self.group;
        let mut prime = vec![0u8; group.prime_len()];
        self.encode(group.prime(), &mut prime);

        let cofactor = Uint::from_u8(SAFE_PRIME_COFACTOR);
        let mut pwe = Uint::ZERO;
        let mut value = Zeroizing::new(vec![0u8; group.prime_len()]);

        // every registered MODP prime is a safe prime: no candidate masking
        pwe::hunt(MIN_SAFE_PRIME_ITERATIONS, |counter, found| {
            let seed = pwe::pwd_seed(seed_key, password, identifier, counter)?;
            pwe::pwd_value(&seed, &prime, group.prime_bits(), &mut value)?;

            let mut candidate = Zeroizing::new(self.decode(&value)?);
            let in_range = group.is_reduced(&candidate);
            candidate.conditional_assign(&Uint::ZERO, !in_range);

            let element = Zeroizing::new(group.pow(&candidate, &cofactor, 2));
            let valid = in_range & !element.ct_eq(&Uint::ZERO) & !element.ct_eq(&Uint::ONE);
            pwe.conditional_assign(&element, valid & !found);
            Ok(valid)
        })?;

        Ok(pwe)
    }

    fn random_scalar<R: CryptoRngCore + ?Sized>(&self, rng: &mut R) -> Result<Uint> {
        let len = self.group.prime_len();
        let excess_bits = len * 8 - self.group.order_bits();
        let mut bytes = Zeroizing::new(vec![0u8; len]);

        for _ in 0..MAX_RANDOM_ATTEMPTS {
            rng.try_fill_bytes(&mut bytes)
                .map_err(|_| Error::DerivationFailure)?;
            bytes[0] &= 0xffu8 >> excess_bits;

            let scalar = self.decode(&bytes)?;
            if bool::from(self.group.is_valid_scalar(&scalar)) {
                return Ok(scalar);
            }
        }

        Err(Error::DerivationFailure)
    }

    fn is_valid_scalar(&self, s: &Uint) -> Choice {
        self.group.is_valid_scalar(s)
    }

    fn add_scalars(&self, a: &Uint, b: &Uint) -> Uint {
        self.group.add_scalars(a, b)
    }

    fn scale(&self, element: &Uint, scalar: &Uint) -> Uint {
        self.group.pow(element, scalar, self.group.order_bits())
    }

    fn combine(&self, a: &Uint, b: &Uint) -> Uint {
        self.group.mul(a, b)
    }

    fn invert(&self, element: &Uint) -> Uint {
        self.group.invert(element)
    }

    fn is_identity(&self, element: &Uint) -> Choice {
        element.ct_eq(&Uint::ONE)
    }

    fn decode_scalar(&self, bytes: &[u8]) -> Result<Uint> {
        let scalar = self.decode(bytes)?;
        if !bool::from(self.group.is_valid_scalar(&scalar)) {
            return Err(Error::OutOfRangeValue);
        }

        Ok(scalar)
    }

    fn encode_scalar(&self, scalar: &Uint, out: &mut [u8]) {
        self.encode(scalar, out);
    }

    fn decode_element(&self, bytes: &[u8]) -> Result<Uint> {
        let element = self.decode(bytes)?;
        if !bool::from(self.group.is_in_range(&element)) {
            return Err(Error::OutOfRangeValue);
        }

        if !bool::from(self.group.is_subgroup_element(&element)) {
            return Err(Error::InvalidElement);
        }

        Ok(element)
    }

    fn encode_element(&self, element: &Uint, out: &mut [u8]) {
        self.encode(element, out);
    }

    fn encode_secret(&self, element: &Uint, out: &mut [u8]) {
        self.encode(element, out);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};

    fn backend() -> Ffc {
        Ffc::new(ModpGroup::new(15).unwrap())
    }

    #[test]
    fn pwe_is_subgroup_element() {
        let backend = backend();
        let mut rng = ChaCha20Rng::seed_from_u64(15);
        let pwe = backend
            .derive_pwe(&mut rng, b"\x02\x00\x00\x00\x00\x01\x02\x00\x00\x00\x00\x02", b"password", None)
            .unwrap();
        assert!(bool::from(backend.group.is_subgroup_element(&pwe)));
    }

    #[test]
    fn random_scalars_are_valid() {
        let backend = backend();
        let mut rng = ChaCha20Rng::seed_from_u64(16);
        for _ in 0..4 {
            let s = backend.random_scalar(&mut rng).unwrap();
            assert!(bool::from(backend.is_valid_scalar(&s)));
        }
    }

    #[test]
    fn element_range_is_checked_before_membership() {
        let backend = backend();
        let mut bytes = vec![0xffu8; backend.prime_len()];
        assert_eq!(backend.decode_element(&bytes), Err(Error::OutOfRangeValue));

        bytes.fill(0);
        bytes[backend.prime_len() - 1] = 1;
        assert_eq!(backend.decode_element(&bytes), Err(Error::OutOfRangeValue));

        // -2 is a quadratic non-residue for these primes
        let minus_two = backend.group.prime().wrapping_sub(&Uint::from_u8(2));
        backend.encode_element(&minus_two, &mut bytes);
        assert_eq!(backend.decode_element(&bytes), Err(Error::InvalidElement));
    }

    #[test]
    #[cfg(debug_assertions)]
    #[should_panic(expected = "byte prime")]
    fn encode_rejects_short_buffer() {
        let backend = backend();
        let mut bytes = vec![0u8; backend.prime_len() - 1];
        backend.encode_element(&Uint::from_u8(2), &mut bytes);
    }
}
