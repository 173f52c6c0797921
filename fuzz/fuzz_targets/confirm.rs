#![no_main]
use libfuzzer_sys::fuzz_target;
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
use sae::{Error, Session};

fuzz_target!(|data: &[u8]| {
    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let mut alice = Session::new(Default::default());
    let mut bob = Session::new(Default::default());
    alice
        .derive_pwe(&mut rng, b"password", &[0; 6], &[0xff; 6], None)
        .unwrap();
    bob.derive_pwe(&mut rng, b"password", &[0; 6], &[0xff; 6], None)
        .unwrap();

    let commit = alice.build_commit(None, None).unwrap();
    let _ = bob.parse_commit(&commit).unwrap();
    let commit = bob.build_commit(None, None).unwrap();
    let _ = alice.parse_commit(&commit).unwrap();
    bob.derive_keys().unwrap();

    // a forged confirm must never authenticate
    match bob.check_confirm(data) {
        Ok(_) => panic!("forged confirm accepted"),
        Err(err) => assert!(matches!(err, Error::MalformedMessage | Error::ConfirmMismatch)),
    }
});
