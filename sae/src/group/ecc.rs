//! Elliptic curve backend over the short Weierstrass prime curves.

use super::Backend;
use crate::{
    Error, Result,
    pwe::{self, MIN_ECC_ITERATIONS},
};
use alloc::{vec, vec::Vec};
use core::marker::PhantomData;
use elliptic_curve::{
    FieldBytes,
    ff::{Field, PrimeField},
    generic_array::GenericArray,
    group::{Curve as _, Group as _},
    point::AffineCoordinates,
    sec1::{EncodedPoint, FromEncodedPoint, ModulusSize, ToEncodedPoint},
};
use primeorder::PrimeCurveParams;
use rand_core::CryptoRngCore;
use subtle::{Choice, ConditionallySelectable, ConstantTimeEq};
use zeroize::{Zeroize, Zeroizing};

/// Attempts allowed when sampling random field elements and scalars.
const MAX_RANDOM_ATTEMPTS: usize = 100;

/// Elliptic curve backend for curve `C`.
pub(crate) struct Ecc<C>(PhantomData<C>);

impl<C> Ecc<C> {
    pub(crate) fn new() -> Self {
        Self(PhantomData)
    }
}

impl<C> Backend for Ecc<C>
where
    C: PrimeCurveParams,
    C::AffinePoint: FromEncodedPoint<C> + ToEncodedPoint<C>,
    C::FieldBytesSize: ModulusSize,
    C::FieldElement: Zeroize,
{
    type Scalar = C::Scalar;
    type Element = C::AffinePoint;

    fn prime_len(&self) -> usize {
        field_modulus::<C>().len()
    }

    fn element_len(&self) -> usize {
        2 * self.prime_len()
    }

    fn derive_pwe<R: CryptoRngCore + ?Sized>(
        &self,
        rng: &mut R,
        seed_key: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<C::AffinePoint> {
        let prime = field_modulus::<C>();
        let prime_bits = C::FieldElement::NUM_BITS as usize;
        let legendre = legendre_exponent(&prime);
        let (qr, qnr) = random_qr_qnr::<C::FieldElement, R>(rng, &legendre)?;

        let mut x = Zeroizing::new(C::FieldElement::ZERO);
        let mut parity = Zeroizing::new(0u8);
        let mut value = Zeroizing::new(vec![0u8; prime.len()]);

        pwe::hunt(MIN_ECC_ITERATIONS, |counter, found| {
            let seed = pwe::pwd_seed(seed_key, password, identifier, counter)?;
            pwe::pwd_value(&seed, &prime, prime_bits, &mut value)?;

            // values >= p decode to none and are tested as x = 0
            let mut repr = GenericArray::clone_from_slice(&value);
            let candidate = C::FieldElement::from_repr(repr.clone());
            repr.as_mut_slice().zeroize();
            let in_range = candidate.is_some();
            let candidate = Zeroizing::new(candidate.unwrap_or(C::FieldElement::ZERO));

            let y_squared = Zeroizing::new(curve_equation::<C>(&candidate));
            let is_residue = is_quadratic_residue_blind(rng, &*y_squared, &qr, &qnr, &legendre)?;

            let valid = in_range & is_residue;
            let first = valid & !found;
            x.conditional_assign(&candidate, first);
            parity.conditional_assign(&pwe::seed_parity(&seed), first);
            Ok(valid)
        })?;

        let y_squared = Zeroizing::new(curve_equation::<C>(&x));
        let y = Zeroizing::new(
            Option::<C::FieldElement>::from(y_squared.sqrt()).ok_or(Error::DerivationFailure)?,
        );
        let neg_y = Zeroizing::new(-*y);
        let flip = y.is_odd() ^ Choice::from(*parity);
        let y = Zeroizing::new(C::FieldElement::conditional_select(&y, &neg_y, flip));

        let mut x_repr = x.to_repr();
        let mut y_repr = y.to_repr();
        let point = EncodedPoint::<C>::from_affine_coordinates(&x_repr, &y_repr, false);
        x_repr.as_mut_slice().zeroize();
        y_repr.as_mut_slice().zeroize();

        Option::from(C::AffinePoint::from_encoded_point(&point)).ok_or(Error::DerivationFailure)
    }

    fn random_scalar<R: CryptoRngCore + ?Sized>(&self, rng: &mut R) -> Result<C::Scalar> {
        random_field_element(rng, true)
    }

    fn is_valid_scalar(&self, s: &C::Scalar) -> Choice {
        !s.is_zero() & !s.ct_eq(&C::Scalar::ONE)
    }

    fn add_scalars(&self, a: &C::Scalar, b: &C::Scalar) -> C::Scalar {
        *a + *b
    }

    fn scale(&self, element: &C::AffinePoint, scalar: &C::Scalar) -> C::AffinePoint {
        (C::ProjectivePoint::from(*element) * scalar).to_affine()
    }

    fn combine(&self, a: &C::AffinePoint, b: &C::AffinePoint) -> C::AffinePoint {
        (C::ProjectivePoint::from(*a) + C::ProjectivePoint::from(*b)).to_affine()
    }

    fn invert(&self, element: &C::AffinePoint) -> C::AffinePoint {
        (-C::ProjectivePoint::from(*element)).to_affine()
    }

    fn is_identity(&self, element: &C::AffinePoint) -> Choice {
        C::ProjectivePoint::from(*element).is_identity()
    }

    fn decode_scalar(&self, bytes: &[u8]) -> Result<C::Scalar> {
        let scalar: Option<C::Scalar> =
            C::Scalar::from_repr(GenericArray::clone_from_slice(bytes)).into();

        scalar
            .filter(|s| bool::from(self.is_valid_scalar(s)))
            .ok_or(Error::OutOfRangeValue)
    }

    fn encode_scalar(&self, scalar: &C::Scalar, out: &mut [u8]) {
        out.copy_from_slice(&scalar.to_repr());
    }

    fn decode_element(&self, bytes: &[u8]) -> Result<C::AffinePoint> {
        let (x, y) = bytes.split_at(self.prime_len());
        let x = GenericArray::clone_from_slice(x);
        let y = GenericArray::clone_from_slice(y);

        // both coordinates must be reduced modulo p
        let in_range = C::FieldElement::from_repr(x.clone()).is_some()
            & C::FieldElement::from_repr(y.clone()).is_some();
        if !bool::from(in_range) {
            return Err(Error::OutOfRangeValue);
        }

        let point = EncodedPoint::<C>::from_affine_coordinates(&x, &y, false);
        Option::from(C::AffinePoint::from_encoded_point(&point)).ok_or(Error::InvalidElement)
    }

    fn encode_element(&self, element: &C::AffinePoint, out: &mut [u8]) {
        let point = element.to_encoded_point(false);

        // only the identity lacks coordinates, and it is never serialized
        match (point.x(), point.y()) {
            (Some(px), Some(py)) => {
                let (x, y) = out.split_at_mut(self.prime_len());
                x.copy_from_slice(px);
                y.copy_from_slice(py);
            }
            _ => out.fill(0),
        }
    }

    fn encode_secret(&self, element: &C::AffinePoint, out: &mut [u8]) {
        out.copy_from_slice(&element.x());
    }
}

/// Big-endian field modulus `p`.
fn field_modulus<C: PrimeCurveParams>() -> FieldBytes<C> {
    // p - 1 is even, so p differs from it only in the lowest bit
    let mut prime = (-C::FieldElement::ONE).to_repr();
    let last = prime.len() - 1;
    prime[last] |= 1;
    prime
}

/// `x^3 + ax + b`.
fn curve_equation<C: PrimeCurveParams>(x: &C::FieldElement) -> C::FieldElement {
    x.square() * x + C::EQUATION_A * x + C::EQUATION_B
}

/// `(p - 1) / 2` as little-endian 64-bit limbs, the exponent computing the
/// Legendre symbol by Euler's criterion.
fn legendre_exponent(prime: &[u8]) -> Vec<u64> {
    let mut half = prime.to_vec();
    pwe::shift_right(&mut half, 1);

    half.rchunks(8)
        .map(|chunk| {
            let mut limb = [0u8; 8];
            limb[8 - chunk.len()..].copy_from_slice(chunk);
            u64::from_be_bytes(limb)
        })
        .collect()
}

/// Uniformly random element of a prime field with a big-endian
/// representation: in `[1, p)`, or in `(1, p)` when `exclude_one` is set.
fn random_field_element<F, R>(rng: &mut R, exclude_one: bool) -> Result<F>
where
    F: PrimeField,
    R: CryptoRngCore + ?Sized,
{
    let excess_bits = F::Repr::default().as_ref().len() * 8 - F::NUM_BITS as usize;

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let mut repr = F::Repr::default();
        rng.try_fill_bytes(repr.as_mut())
            .map_err(|_| Error::DerivationFailure)?;
        repr.as_mut()[0] &= 0xffu8 >> excess_bits;

        let candidate: Option<F> = F::from_repr(repr).into();
        repr.as_mut().zeroize();

        if let Some(element) = candidate {
            let excluded =
                element.is_zero() | (element.ct_eq(&F::ONE) & Choice::from(exclude_one as u8));
            if !bool::from(excluded) {
                return Ok(element);
            }
        }
    }

    Err(Error::DerivationFailure)
}

/// Draw a random quadratic residue and a random quadratic non-residue.
fn random_qr_qnr<F, R>(rng: &mut R, legendre: &[u64]) -> Result<(F, F)>
where
    F: PrimeField,
    R: CryptoRngCore + ?Sized,
{
    let mut qr = None;
    let mut qnr = None;

    for _ in 0..MAX_RANDOM_ATTEMPTS {
        let candidate = random_field_element::<F, R>(rng, false)?;
        let symbol = candidate.pow(legendre);

        if qr.is_none() && bool::from(symbol.ct_eq(&F::ONE)) {
            qr = Some(candidate);
        } else if qnr.is_none() && bool::from(symbol.ct_eq(&-F::ONE)) {
            qnr = Some(candidate);
        }

        if let (Some(qr), Some(qnr)) = (qr, qnr) {
            return Ok((qr, qnr));
        }
    }

    Err(Error::DerivationFailure)
}

/// Blinded quadratic residuosity test of `value`.
///
/// `value` is multiplied by the square of a fresh random `r` and then by
/// either `qr` (when `r` is odd) or `qnr` (when `r` is even). The product
/// is a residue exactly when `value` is and the mask was `qr`, so the
/// expected Legendre symbol follows the parity of `r` and the comparison
/// pattern is independent of `value`.
fn is_quadratic_residue_blind<F, R>(
    rng: &mut R,
    value: &F,
    qr: &F,
    qnr: &F,
    legendre: &[u64],
) -> Result<Choice>
where
    F: PrimeField,
    R: CryptoRngCore + ?Sized,
{
    let r = random_field_element::<F, R>(rng, false)?;
    let r_is_odd = r.is_odd();

    let mask = F::conditional_select(qnr, qr, r_is_odd);
    let symbol = (*value * r.square() * mask).pow(legendre);

    let is_one = symbol.ct_eq(&F::ONE);
    let is_minus_one = symbol.ct_eq(&-F::ONE);
    Ok(Choice::conditional_select(&is_minus_one, &is_one, r_is_odd))
}
