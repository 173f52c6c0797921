//! Finite cyclic groups usable for SAE.
//!
//! A [`Group`] is either one of the NIST prime curves or one of the MODP
//! groups. Both variants implement the same set of operations through the
//! crate-private [`Backend`] trait; the protocol code is written once
//! against that trait.

mod ecc;
mod ffc;

pub(crate) use self::{ecc::Ecc, ffc::Ffc};

use crate::{Config, Error, Result};
use modp::ModpGroup;
use rand_core::CryptoRngCore;
use subtle::{Choice, ConstantTimeEq};
use tracing::debug;
use zeroize::Zeroize;

/// Groups suitable for production use.
///
/// Other registered groups (MODP groups 1, 2, 5 and 14) are accepted only
/// with [`Config::allow_unsuitable_groups`].
pub const SUITABLE_GROUPS: [u16; 5] = [19, 20, 21, 15, 16];

/// Is the group with this id suitable for production use?
pub fn is_suitable(id: u16) -> bool {
    SUITABLE_GROUPS.contains(&id)
}

/// Look up a group by id and check it against local policy.
pub fn select_group(id: u16, config: &Config) -> Result<Group> {
    if !config.is_enabled(id) {
        debug!(group = id, "group not enabled");
        return Err(Error::GroupNotSupported);
    }

    if !is_suitable(id) && !config.allow_unsuitable_groups {
        debug!(group = id, "rejecting unsuitable group");
        return Err(Error::GroupNotSupported);
    }

    Group::new(id).ok_or(Error::GroupNotSupported)
}

/// NIST prime curves.
#[derive(Clone, Copy, Debug, Eq, PartialEq, Hash)]
pub enum Curve {
    /// NIST P-256, IANA group 19.
    P256,
    /// NIST P-384, IANA group 20.
    P384,
    /// NIST P-521, IANA group 21.
    P521,
}

impl Curve {
    /// Curve registered under the given IANA group id.
    pub fn from_id(id: u16) -> Option<Self> {
        match id {
            19 => Some(Curve::P256),
            20 => Some(Curve::P384),
            21 => Some(Curve::P521),
            _ => None,
        }
    }

    /// IANA group id.
    pub fn id(self) -> u16 {
        match self {
            Curve::P256 => 19,
            Curve::P384 => 20,
            Curve::P521 => 21,
        }
    }

    /// Bit length of the field prime.
    pub fn prime_bits(self) -> usize {
        match self {
            Curve::P256 => 256,
            Curve::P384 => 384,
            Curve::P521 => 521,
        }
    }
}

/// A finite cyclic group.
#[derive(Clone, Debug)]
pub enum Group {
    /// Elliptic curve group over a prime field.
    EllipticCurve(Curve),
    /// Prime-order subgroup of the multiplicative group modulo a safe prime.
    FiniteField(ModpGroup),
}

impl Group {
    /// Group registered under the given IANA id, without any policy check.
    pub fn new(id: u16) -> Option<Self> {
        Curve::from_id(id)
            .map(Group::EllipticCurve)
            .or_else(|| ModpGroup::new(id).map(Group::FiniteField))
    }

    /// IANA group id.
    pub fn id(&self) -> u16 {
        match self {
            Group::EllipticCurve(curve) => curve.id(),
            Group::FiniteField(group) => group.id(),
        }
    }

    /// Bit length of the prime.
    pub fn prime_bits(&self) -> usize {
        match self {
            Group::EllipticCurve(curve) => curve.prime_bits(),
            Group::FiniteField(group) => group.prime_bits(),
        }
    }

    /// Byte length of the prime; the width of every serialized scalar and
    /// coordinate.
    pub fn prime_len(&self) -> usize {
        self.prime_bits().div_ceil(8)
    }

    /// Byte length of a serialized element.
    pub fn element_len(&self) -> usize {
        match self {
            Group::EllipticCurve(_) => 2 * self.prime_len(),
            Group::FiniteField(_) => self.prime_len(),
        }
    }

    /// Is this an elliptic curve group?
    pub fn is_elliptic_curve(&self) -> bool {
        matches!(self, Group::EllipticCurve(_))
    }
}

/// Operations SAE needs from a group.
///
/// All serialized forms have fixed width: scalars are `prime_len` bytes
/// and elements are `element_len` bytes, independent of their value.
pub(crate) trait Backend {
    /// Integer modulo the group order.
    type Scalar: Clone + ConstantTimeEq + Zeroize;

    /// Group element.
    type Element: Clone + Zeroize;

    /// Byte length of the prime.
    fn prime_len(&self) -> usize;

    /// Byte length of a serialized element.
    fn element_len(&self) -> usize;

    /// Derive the password element by hunting and pecking.
    fn derive_pwe<R: CryptoRngCore + ?Sized>(
        &self,
        rng: &mut R,
        seed_key: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<Self::Element>;

    /// Uniformly random scalar in `(1, order)`.
    fn random_scalar<R: CryptoRngCore + ?Sized>(&self, rng: &mut R) -> Result<Self::Scalar>;

    /// `1 < s < order`.
    fn is_valid_scalar(&self, s: &Self::Scalar) -> Choice;

    /// `(a + b) mod order`.
    fn add_scalars(&self, a: &Self::Scalar, b: &Self::Scalar) -> Self::Scalar;

    /// Combine a scalar with an element: `s·E`, or `E^s` written
    /// multiplicatively.
    fn scale(&self, element: &Self::Element, scalar: &Self::Scalar) -> Self::Element;

    /// Combine two elements with the group operation.
    fn combine(&self, a: &Self::Element, b: &Self::Element) -> Self::Element;

    /// Inverse of an element under the group operation.
    fn invert(&self, element: &Self::Element) -> Self::Element;

    /// Is `element` the identity?
    fn is_identity(&self, element: &Self::Element) -> Choice;

    /// Parse a scalar, rejecting `0`, `1` and anything `>= order`.
    fn decode_scalar(&self, bytes: &[u8]) -> Result<Self::Scalar>;

    /// Serialize a scalar into exactly `prime_len` bytes.
    fn encode_scalar(&self, scalar: &Self::Scalar, out: &mut [u8]);

    /// Parse an element, rejecting out-of-range encodings and
    /// non-members of the group.
    fn decode_element(&self, bytes: &[u8]) -> Result<Self::Element>;

    /// Serialize an element into exactly `element_len` bytes.
    fn encode_element(&self, element: &Self::Element, out: &mut [u8]);

    /// Serialize the value keyed into the KDF when `element` is the shared
    /// secret: the x coordinate of a point, or the integer itself.
    fn encode_secret(&self, element: &Self::Element, out: &mut [u8]);
}
