#![no_main]
use libfuzzer_sys::fuzz_target;
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
use sae::{Session, TokenIssuer};

fuzz_target!(|data: &[u8]| {
    let mut session = Session::new(Default::default());
    if session.set_group(19).is_ok() {
        let _ = session.parse_token_request(data);
    }

    let mut rng = ChaCha20Rng::seed_from_u64(0);
    if let Ok(mut issuer) = TokenIssuer::new(&mut rng) {
        assert!(!issuer.verify(&[0x02, 0, 0, 0, 0, 1], data));
    }
});
