//! Validation of received commit messages.

use elliptic_curve::ff::{Field, PrimeField};
use hex_literal::hex;
use proptest::prelude::*;
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
use rand_core::{CryptoRng, RngCore};
use sae::{
    Config, Error, Group, Outcome, Session, State, TOKEN_LEN, TokenIssuer,
    modp::{ModpGroup, Uint},
    token_request,
};

const ID_A: [u8; 6] = hex!("000000000000");
const ID_B: [u8; 6] = hex!("ffffffffffff");
const PEER: [u8; 6] = hex!("020000000001");

fn config(group: u16) -> Config {
    Config::default()
        .with_groups(vec![group])
        .with_unsuitable_groups(true)
}

fn commit(group: u16, seed: u64) -> Vec<u8> {
    let mut session = Session::new(config(group));
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    session
        .derive_pwe(&mut rng, b"password", &ID_A, &ID_B, None)
        .unwrap();
    session.build_commit(None, None).unwrap()
}

/// Add one to a big-endian integer.
fn increment(bytes: &mut [u8]) {
    for byte in bytes.iter_mut().rev() {
        let (sum, carry) = byte.overflowing_add(1);
        *byte = sum;
        if !carry {
            break;
        }
    }
}

/// Big-endian group order, `prime_len` bytes wide.
fn order(group: u16) -> Vec<u8> {
    let mut order = match group {
        19 => (-p256::Scalar::ONE).to_repr().to_vec(),
        20 => (-p384::Scalar::ONE).to_repr().to_vec(),
        21 => (-p521::Scalar::ONE).to_repr().to_vec(),
        _ => {
            let modp = ModpGroup::new(group).unwrap();
            let mut out = vec![0u8; modp.prime_len()];
            modp.encode(&modp.order().wrapping_sub(&Uint::ONE), &mut out)
                .unwrap();
            out
        }
    };
    increment(&mut order);
    order
}

/// Replace the scalar of a commit without token or identifier.
fn with_scalar(msg: &[u8], scalar: &[u8]) -> Vec<u8> {
    let mut msg = msg.to_vec();
    msg[2..2 + scalar.len()].copy_from_slice(scalar);
    msg
}

#[test]
fn scalar_range_for_every_group() {
    for group in [19, 20, 21, 1, 2, 5, 14, 15, 16] {
        let prime_len = Group::new(group).unwrap().prime_len();
        let msg = commit(group, u64::from(group));

        let mut one = vec![0u8; prime_len];
        one[prime_len - 1] = 1;
        let mut above = order(group);
        increment(&mut above);

        for scalar in [vec![0u8; prime_len], one, order(group), above, vec![0xff; prime_len]] {
            let mut session = Session::new(config(group));
            assert_eq!(
                session.parse_commit(&with_scalar(&msg, &scalar)),
                Err(Error::OutOfRangeValue),
                "group {group}"
            );
            assert_eq!(session.state(), State::Aborted);
        }

        let mut session = Session::new(config(group));
        assert_eq!(session.parse_commit(&msg).unwrap(), Outcome::Accepted, "group {group}");
    }
}

#[test]
fn ecc_coordinate_at_prime() {
    let msg = commit(19, 1);
    let p = hex!("ffffffff00000001000000000000000000000000ffffffffffffffffffffffff");

    for offset in [2 + 32, 2 + 64] {
        let mut bad = msg.clone();
        bad[offset..offset + 32].copy_from_slice(&p);
        let mut session = Session::new(config(19));
        assert_eq!(session.parse_commit(&bad), Err(Error::OutOfRangeValue));
    }
}

#[test]
fn ecc_point_off_curve() {
    let mut msg = commit(19, 2);
    let last = msg.len() - 1;
    msg[last] ^= 1;

    let mut session = Session::new(config(19));
    assert_eq!(session.parse_commit(&msg), Err(Error::InvalidElement));
    assert_eq!(session.state(), State::Aborted);
}

#[test]
fn ffc_element_checks() {
    let msg = commit(15, 3);
    let modp = ModpGroup::new(15).unwrap();
    let len = modp.prime_len();
    let element = 2 + len;

    let mut one = vec![0u8; len];
    one[len - 1] = 1;
    let mut prime = vec![0u8; len];
    modp.encode(modp.prime(), &mut prime).unwrap();
    let mut minus_two = vec![0u8; len];
    modp.encode(&modp.prime().wrapping_sub(&Uint::from_u8(2)), &mut minus_two)
        .unwrap();

    for (value, expected) in [
        (one, Error::OutOfRangeValue),
        (prime, Error::OutOfRangeValue),
        (minus_two, Error::InvalidElement),
    ] {
        let mut bad = msg.clone();
        bad[element..element + len].copy_from_slice(&value);
        let mut session = Session::new(config(15));
        assert_eq!(session.parse_commit(&bad), Err(expected));
    }
}

#[test]
fn truncated_commit_is_malformed_and_not_fatal() {
    let msg = commit(19, 4);
    let mut session = Session::new(config(19));

    for len in [0, 1, 2, 33, msg.len() - 1] {
        assert_eq!(session.parse_commit(&msg[..len]), Err(Error::MalformedMessage), "{len}");
    }
    assert_eq!(session.state(), State::Nothing);
    assert_eq!(session.parse_commit(&msg).unwrap(), Outcome::Accepted);
}

#[test]
fn unsuitable_group_needs_testing_flag() {
    let msg = commit(14, 5);
    let mut session = Session::new(Config::default().with_groups(vec![14]));
    assert_eq!(session.parse_commit(&msg), Err(Error::GroupNotSupported));
}

#[test]
fn anti_clogging_round_trip() {
    let mut rng = ChaCha20Rng::seed_from_u64(6);
    let policy = config(19).with_anti_clogging_threshold(1);
    assert!(!policy.requires_token(0));
    assert!(policy.requires_token(1));

    let mut issuer = TokenIssuer::new(&mut rng).unwrap();
    let token = issuer.issue(&mut rng, &PEER).unwrap();

    let mut initiator = Session::new(config(19));
    initiator
        .derive_pwe(&mut rng, b"password", &ID_A, &ID_B, Some(&b"id"[..]))
        .unwrap();
    initiator
        .parse_token_request(&token_request(19, &token))
        .unwrap();

    let msg = initiator.build_commit(None, None).unwrap();
    assert_eq!(msg[2..2 + TOKEN_LEN], token);

    let mut responder = Session::new(policy);
    assert_eq!(responder.parse_commit(&msg).unwrap(), Outcome::Accepted);
    assert_eq!(responder.peer_token(), Some(&token[..]));
    assert_eq!(responder.password_identifier(), Some(&b"id"[..]));

    assert!(issuer.verify(&PEER, responder.peer_token().unwrap()));
    assert!(!issuer.verify(&PEER, &token));
}

#[test]
fn explicit_token_overrides_stored() {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let mut session = Session::new(config(19));
    session
        .derive_pwe(&mut rng, b"password", &ID_A, &ID_B, None)
        .unwrap();
    session.set_anti_clogging_token(&[0x11; TOKEN_LEN]);

    let msg = session.build_commit(Some(&[0x22; TOKEN_LEN]), None).unwrap();
    assert_eq!(msg[2..2 + TOKEN_LEN], [0x22; TOKEN_LEN]);
}

#[test]
fn token_for_other_peer_fails() {
    let mut rng = ChaCha20Rng::seed_from_u64(8);
    let mut issuer = TokenIssuer::new(&mut rng).unwrap();
    let token = issuer.issue(&mut rng, &PEER).unwrap();
    assert!(!issuer.verify(&hex!("020000000002"), &token));
    assert!(!issuer.verify(&PEER, &token[..TOKEN_LEN - 1]));

    issuer.rotate(&mut rng).unwrap();
    assert!(!issuer.verify(&PEER, &token));
}

#[test]
fn token_request_checks() {
    let mut session = Session::new(config(19));
    session.set_group(19).unwrap();
    assert_eq!(session.parse_token_request(&[19, 0]), Err(Error::MalformedMessage));
    assert_eq!(session.state(), State::Nothing);
    assert_eq!(
        session.parse_token_request(&token_request(20, &[1; TOKEN_LEN])),
        Err(Error::GroupNotSupported)
    );
}

/// RNG that always fails.
struct FailingRng;

impl RngCore for FailingRng {
    fn next_u32(&mut self) -> u32 {
        unimplemented!()
    }

    fn next_u64(&mut self) -> u64 {
        unimplemented!()
    }

    fn fill_bytes(&mut self, _dest: &mut [u8]) {
        unimplemented!()
    }

    fn try_fill_bytes(&mut self, _dest: &mut [u8]) -> Result<(), rand_core::Error> {
        let code = core::num::NonZeroU32::new(rand_core::Error::CUSTOM_START).unwrap();
        Err(rand_core::Error::from(code))
    }
}

impl CryptoRng for FailingRng {}

#[test]
fn failing_rng() {
    for group in [19, 21, 15] {
        let mut session = Session::new(config(group));
        assert_eq!(
            session.derive_pwe(&mut FailingRng, b"password", &ID_A, &ID_B, None),
            Err(Error::DerivationFailure),
            "group {group}"
        );
        assert_eq!(session.state(), State::Aborted);
    }

    assert!(TokenIssuer::new(&mut FailingRng).is_err());
}

proptest! {
    #[test]
    fn arbitrary_commit_never_panics(tail in proptest::collection::vec(any::<u8>(), 0..200)) {
        let mut msg = vec![19, 0];
        msg.extend_from_slice(&tail);
        let mut session = Session::new(Config::default());
        let _ = session.parse_commit(&msg);
    }

    #[test]
    fn arbitrary_confirm_never_panics(msg in proptest::collection::vec(any::<u8>(), 0..64)) {
        let mut session = Session::new(Config::default());
        prop_assert_eq!(session.check_confirm(&msg), Err(Error::InvalidState));
    }
}
