//! Commit values and shared secret of one exchange, generic over the group
//! backend.

use crate::{
    Error, Outcome, Result,
    group::{Backend, Curve, Ecc, Ffc, Group},
    kdf::Keys,
};
use alloc::{vec, vec::Vec};
use p256::NistP256;
use p384::NistP384;
use p521::NistP521;
use rand_core::CryptoRngCore;
use tracing::warn;
use zeroize::{Zeroize, Zeroizing};

/// Attempts allowed to draw a `rand`/`mask` pair with a usable sum.
const MAX_COMMIT_ATTEMPTS: usize = 100;

/// One party's commit: scalar and element, together with their fixed-width
/// encodings as they appear on the wire.
struct Commit<B: Backend> {
    scalar: B::Scalar,
    element: B::Element,
    scalar_bytes: Vec<u8>,
    element_bytes: Vec<u8>,
}

/// State of one exchange over backend `B`.
pub(crate) struct Exchange<B: Backend> {
    backend: B,
    pwe: Option<B::Element>,
    rand: Option<B::Scalar>,
    own: Option<Commit<B>>,
    peer: Option<Commit<B>>,
}

impl<B: Backend> Exchange<B> {
    pub(crate) fn new(backend: B) -> Self {
        Self {
            backend,
            pwe: None,
            rand: None,
            own: None,
            peer: None,
        }
    }

    /// Derive the password element and a fresh commit from it.
    ///
    /// A previously received peer commit is kept.
    pub(crate) fn derive<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        seed_key: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<()> {
        let pwe = Zeroizing::new(self.backend.derive_pwe(rng, seed_key, password, identifier)?);

        for _ in 0..MAX_COMMIT_ATTEMPTS {
            let rand = Zeroizing::new(self.backend.random_scalar(rng)?);
            let mask = Zeroizing::new(self.backend.random_scalar(rng)?);
            if self.commit(&pwe, &rand, &mask) {
                return Ok(());
            }
        }

        Err(Error::DerivationFailure)
    }

    /// Derive the password element and commit with the given `rand` and
    /// `mask` encodings.
    #[cfg(test)]
    pub(crate) fn derive_with<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        seed_key: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
        rand: &[u8],
        mask: &[u8],
    ) -> Result<()> {
        let pwe = Zeroizing::new(self.backend.derive_pwe(rng, seed_key, password, identifier)?);
        let rand = Zeroizing::new(self.backend.decode_scalar(rand)?);
        let mask = Zeroizing::new(self.backend.decode_scalar(mask)?);

        if self.commit(&pwe, &rand, &mask) {
            Ok(())
        } else {
            Err(Error::DerivationFailure)
        }
    }

    /// Compute our commit `(rand + mask, -(mask·PWE))` and keep `pwe` and
    /// `rand` for key derivation. Returns false, leaving the exchange
    /// untouched, if the scalar sum is 0 or 1.
    fn commit(&mut self, pwe: &B::Element, rand: &B::Scalar, mask: &B::Scalar) -> bool {
        let backend = &self.backend;
        let scalar = backend.add_scalars(rand, mask);
        if !bool::from(backend.is_valid_scalar(&scalar)) {
            return false;
        }

        let masked = Zeroizing::new(backend.scale(pwe, mask));
        let element = backend.invert(&masked);
        let own = self.encode(scalar, element);

        self.pwe.zeroize();
        self.rand.zeroize();
        self.pwe = Some(pwe.clone());
        self.rand = Some(rand.clone());
        self.own = Some(own);
        true
    }

    fn encode(&self, scalar: B::Scalar, element: B::Element) -> Commit<B> {
        let mut scalar_bytes = vec![0u8; self.backend.prime_len()];
        let mut element_bytes = vec![0u8; self.backend.element_len()];
        self.backend.encode_scalar(&scalar, &mut scalar_bytes);
        self.backend.encode_element(&element, &mut element_bytes);

        Commit {
            scalar,
            element,
            scalar_bytes,
            element_bytes,
        }
    }

    /// Validate a peer commit and store it.
    ///
    /// `accepted` is the peer scalar of an exchange already accepted on this
    /// session; repeating it is a replay. `check` runs once both values
    /// are known to be valid and before the reflection test. Nothing is
    /// stored unless the result is [`Outcome::Accepted`].
    pub(crate) fn receive(
        &mut self,
        scalar_bytes: &[u8],
        element_bytes: &[u8],
        accepted: Option<&[u8]>,
        check: impl FnOnce() -> Result<()>,
    ) -> Result<Outcome> {
        let scalar = self.backend.decode_scalar(scalar_bytes).inspect_err(|_| {
            warn!("peer scalar out of range");
        })?;

        if accepted == Some(scalar_bytes) {
            warn!("peer repeated the scalar of the accepted exchange");
            return Err(Error::Replay);
        }

        let element = self.backend.decode_element(element_bytes).inspect_err(|err| {
            warn!(%err, "invalid peer element");
        })?;

        check()?;

        if let Some(own) = &self.own {
            if own.scalar_bytes == scalar_bytes && own.element_bytes == element_bytes {
                warn!("peer reflected our own commit");
                return Ok(Outcome::SilentDiscard);
            }
        }

        self.peer = Some(Commit {
            scalar,
            element,
            scalar_bytes: scalar_bytes.to_vec(),
            element_bytes: element_bytes.to_vec(),
        });
        Ok(Outcome::Accepted)
    }

    /// Combine the shared secret and derive the session keys.
    ///
    /// Consumes `rand`; a second call fails.
    pub(crate) fn derive_keys(&mut self) -> Result<Keys> {
        let (Some(pwe), Some(own), Some(peer)) = (&self.pwe, &self.own, &self.peer) else {
            return Err(Error::KeyDerivationFailure);
        };
        let rand = Zeroizing::new(self.rand.take().ok_or(Error::KeyDerivationFailure)?);
        let backend = &self.backend;

        let base = Zeroizing::new(backend.scale(pwe, &peer.scalar));
        let base = Zeroizing::new(backend.combine(&base, &peer.element));
        let secret = Zeroizing::new(backend.scale(&base, &rand));

        if bool::from(backend.is_identity(&secret)) {
            warn!("shared secret is the identity element");
            return Err(Error::KeyDerivationFailure);
        }

        let mut k = Zeroizing::new(vec![0u8; backend.prime_len()]);
        backend.encode_secret(&secret, &mut k);

        let mut context = Zeroizing::new(vec![0u8; backend.prime_len()]);
        let sum = Zeroizing::new(backend.add_scalars(&own.scalar, &peer.scalar));
        backend.encode_scalar(&sum, &mut context);

        Keys::derive(&k, &context).map_err(|_| Error::KeyDerivationFailure)
    }

    /// Our commit as `(scalar, element)` encodings.
    pub(crate) fn own_commit(&self) -> Option<(&[u8], &[u8])> {
        self.own
            .as_ref()
            .map(|own| (own.scalar_bytes.as_slice(), own.element_bytes.as_slice()))
    }

    /// The peer's commit as `(scalar, element)` encodings.
    pub(crate) fn peer_commit(&self) -> Option<(&[u8], &[u8])> {
        self.peer
            .as_ref()
            .map(|peer| (peer.scalar_bytes.as_slice(), peer.element_bytes.as_slice()))
    }

    #[cfg(test)]
    fn pwe_bytes(&self) -> Option<Vec<u8>> {
        self.pwe.as_ref().map(|pwe| {
            let mut out = vec![0u8; self.backend.element_len()];
            self.backend.encode_element(pwe, &mut out);
            out
        })
    }
}

impl<B: Backend> Drop for Exchange<B> {
    fn drop(&mut self) {
        self.pwe.zeroize();
        self.rand.zeroize();
        if let Some(own) = &mut self.own {
            own.scalar.zeroize();
        }
    }
}

/// An [`Exchange`] over any supported group.
pub(crate) enum AnyExchange {
    P256(Exchange<Ecc<NistP256>>),
    P384(Exchange<Ecc<NistP384>>),
    P521(Exchange<Ecc<NistP521>>),
    Modp(Exchange<Ffc>),
}

macro_rules! dispatch {
    ($any:expr, $exchange:ident => $body:expr) => {
        match $any {
            AnyExchange::P256($exchange) => $body,
            AnyExchange::P384($exchange) => $body,
            AnyExchange::P521($exchange) => $body,
            AnyExchange::Modp($exchange) => $body,
        }
    };
}

impl AnyExchange {
    pub(crate) fn new(group: &Group) -> Self {
        match group {
            Group::EllipticCurve(Curve::P256) => AnyExchange::P256(Exchange::new(Ecc::new())),
            Group::EllipticCurve(Curve::P384) => AnyExchange::P384(Exchange::new(Ecc::new())),
            Group::EllipticCurve(Curve::P521) => AnyExchange::P521(Exchange::new(Ecc::new())),
            Group::FiniteField(modp) => AnyExchange::Modp(Exchange::new(Ffc::new(modp.clone()))),
        }
    }

    pub(crate) fn derive<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        seed_key: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
    ) -> Result<()> {
        dispatch!(self, exchange => exchange.derive(rng, seed_key, password, identifier))
    }

    pub(crate) fn receive(
        &mut self,
        scalar: &[u8],
        element: &[u8],
        accepted: Option<&[u8]>,
        check: impl FnOnce() -> Result<()>,
    ) -> Result<Outcome> {
        dispatch!(self, exchange => exchange.receive(scalar, element, accepted, check))
    }

    pub(crate) fn derive_keys(&mut self) -> Result<Keys> {
        dispatch!(self, exchange => exchange.derive_keys())
    }

    pub(crate) fn own_commit(&self) -> Option<(&[u8], &[u8])> {
        dispatch!(self, exchange => exchange.own_commit())
    }

    pub(crate) fn peer_commit(&self) -> Option<(&[u8], &[u8])> {
        dispatch!(self, exchange => exchange.peer_commit())
    }

    #[cfg(test)]
    pub(crate) fn derive_with<R: CryptoRngCore + ?Sized>(
        &mut self,
        rng: &mut R,
        seed_key: &[u8],
        password: &[u8],
        identifier: Option<&[u8]>,
        rand: &[u8],
        mask: &[u8],
    ) -> Result<()> {
        dispatch!(self, exchange => exchange.derive_with(rng, seed_key, password, identifier, rand, mask))
    }

    #[cfg(test)]
    pub(crate) fn pwe_bytes(&self) -> Option<Vec<u8>> {
        dispatch!(self, exchange => exchange.pwe_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{confirm, pwe};
    use hex_literal::hex;
    use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};

    const ID_A: [u8; 6] = hex!("000000000000");
    const ID_B: [u8; 6] = hex!("ffffffffffff");

    fn derived(group: u16, seed: u64, password: &[u8]) -> AnyExchange {
        let mut exchange = AnyExchange::new(&Group::new(group).unwrap());
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        exchange
            .derive(&mut rng, &pwe::seed_key(&ID_A, &ID_B), password, None)
            .unwrap();
        exchange
    }

    fn connect(a: &mut AnyExchange, b: &mut AnyExchange) {
        let (s, e) = b.own_commit().map(|(s, e)| (s.to_vec(), e.to_vec())).unwrap();
        assert_eq!(a.receive(&s, &e, None, || Ok(())).unwrap(), Outcome::Accepted);
        let (s, e) = a.own_commit().map(|(s, e)| (s.to_vec(), e.to_vec())).unwrap();
        assert_eq!(b.receive(&s, &e, None, || Ok(())).unwrap(), Outcome::Accepted);
    }

    #[test]
    fn pwe_is_independent_of_randomness() {
        for group in [19, 20, 21, 15] {
            let a = derived(group, 1, b"correcthorse");
            let b = derived(group, 2, b"correcthorse");
            assert_eq!(a.pwe_bytes(), b.pwe_bytes(), "group {group}");
            assert_ne!(a.own_commit(), b.own_commit());
        }
    }

    #[test]
    fn pwe_depends_on_password() {
        let a = derived(19, 1, b"correcthorse");
        let b = derived(19, 1, b"batterystaple");
        assert_ne!(a.pwe_bytes(), b.pwe_bytes());
    }

    #[test]
    fn shared_keys_agree() {
        for group in [19, 20, 21, 15] {
            let mut a = derived(group, 3, b"correcthorse");
            let mut b = derived(group, 4, b"correcthorse");
            connect(&mut a, &mut b);

            let ka = a.derive_keys().unwrap();
            let kb = b.derive_keys().unwrap();
            assert_eq!(ka.pmk, kb.pmk, "group {group}");
            assert_eq!(ka.pmkid, kb.pmkid);
            assert_eq!(ka.kck, kb.kck);
        }
    }

    #[test]
    fn keys_need_both_commits_and_fresh_rand() {
        let mut a = derived(19, 5, b"pw");
        assert_eq!(a.derive_keys().err(), Some(Error::KeyDerivationFailure));

        let mut b = derived(19, 6, b"pw");
        connect(&mut a, &mut b);
        assert!(a.derive_keys().is_ok());
        assert_eq!(a.derive_keys().err(), Some(Error::KeyDerivationFailure));
    }

    #[test]
    fn reflection_is_discarded_without_storing() {
        let mut a = derived(19, 7, b"pw");
        let (s, e) = a.own_commit().map(|(s, e)| (s.to_vec(), e.to_vec())).unwrap();
        assert_eq!(a.receive(&s, &e, None, || Ok(())).unwrap(), Outcome::SilentDiscard);
        assert!(a.peer_commit().is_none());
    }

    #[test]
    fn check_failure_leaves_peer_unset() {
        let mut a = derived(19, 8, b"pw");
        let b = derived(19, 9, b"pw");
        let (s, e) = b.own_commit().unwrap();
        let result = a.receive(s, e, None, || Err(Error::UnknownPasswordIdentifier));
        assert_eq!(result, Err(Error::UnknownPasswordIdentifier));
        assert!(a.peer_commit().is_none());
    }

    #[test]
    fn replayed_scalar() {
        let mut a = derived(19, 10, b"pw");
        let b = derived(19, 11, b"pw");
        let (s, e) = b.own_commit().unwrap();
        assert_eq!(a.receive(s, e, Some(s), || Ok(())), Err(Error::Replay));
    }

    #[test]
    fn p256_known_answer() {
        let seed_key = pwe::seed_key(&hex!("827b919dd4b9"), &hex!("1eec49ea6488"));
        let group = Group::new(19).unwrap();
        let mut rng = ChaCha20Rng::seed_from_u64(19);

        let mut a = AnyExchange::new(&group);
        a.derive_with(
            &mut rng,
            &seed_key,
            b"mekmitasdigoat",
            None,
            &hex!("a906f61e4d3a5d4eb2965ff34cf917dd044445c878c17ca5d5b93786da9f83cf"),
            &hex!("4234b4fb17aa435c52fbfdebe64039b43478200e54ff7b6e07b69cad74153c15"),
        )
        .unwrap();

        let mut b = AnyExchange::new(&group);
        b.derive_with(
            &mut rng,
            &seed_key,
            b"mekmitasdigoat",
            None,
            &hex!("99c5e2f1a8b3d40c5e2f6a7b8c9d0e1f2a3b4c5d6e7f8091a2b3c4d5e6f70812"),
            &hex!("1f2e3d4c5b6a79880796a5b4c3d2e1f00f1e2d3c4b5a69788796a5b4c3d2e1f0"),
        )
        .unwrap();

        assert_eq!(
            a.pwe_bytes().unwrap(),
            hex!(
                "69fdf86f627405902901384ca7ac713dcc6e89b3f5707d5980a3d6af7ee4c925"
                "db41b30c5b8cf9d292959e1dd6a63d79669ee28d1b3281d4a6ad015cfb5c4a4f"
            )
        );

        let (scalar_a, element_a) = a.own_commit().unwrap();
        assert_eq!(
            scalar_a,
            hex!("eb3bab1964e4a0ab05925ddf3339519138bc65d6cdc0f813dd6fd4344eb4bfe4")
        );
        assert_eq!(
            element_a,
            hex!(
                "2f724776fb3077e2c4af219662c055400e3724188e1108fe66f41573516d1f68"
                "da5c1b636eba3ffe47bedb19d4c4c7720f82c248cb55a196e47a0ae4c7eedc3a"
            )
        );

        let (scalar_b, element_b) = b.own_commit().unwrap();
        assert_eq!(
            scalar_b,
            hex!("b8f4203e041e4d9465c61030506ff00f39597999b9d9ea0a2a4a6a8aaac9ea02")
        );
        assert_eq!(
            element_b,
            hex!(
                "c8b422c0dd17a430930ac23678f6c74207630620a12cd8e22ae15e2663f4415d"
                "529589368a1b7cef43d60bc894483d5d1265d9959fea0716f857147a1aae78de"
            )
        );

        connect(&mut a, &mut b);
        let keys = a.derive_keys().unwrap();
        assert_eq!(
            keys.kck,
            hex!("c845a3086473632f067efeb92b21d6a7ccac4233c369c93ba55dda6f1206346b")
        );
        assert_eq!(
            keys.pmk,
            hex!("9aacb159cd801e47d11ba632c001dbe9241c5ed695d6e3564b23c9b4a1e82282")
        );
        assert_eq!(keys.pmkid, hex!("a42fcb586902ee3e6b586e0f83a941a0"));
        assert_eq!(b.derive_keys().unwrap().pmk, keys.pmk);

        let (scalar_a, element_a) = a.own_commit().unwrap();
        let (scalar_b, element_b) = b.own_commit().unwrap();
        let mac =
            confirm::confirm_mac(&keys.kck, 0, scalar_a, element_a, scalar_b, element_b).unwrap();
        assert_eq!(
            mac,
            hex!("148608ef79c95830d8dd3eb708d23e3bc5c2219a550aa02912b8cd287a5e98e9")
        );
    }
}
