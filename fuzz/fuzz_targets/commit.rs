#![no_main]
// Commits for every registered group, parsed both as responder and as a
// committed initiator.
use libfuzzer_sys::fuzz_target;
use rand_chacha::{ChaCha20Rng, rand_core::SeedableRng};
use sae::{Config, Session};

const GROUPS: [u16; 9] = [19, 20, 21, 1, 2, 5, 14, 15, 16];

fn config() -> Config {
    Config::default()
        .with_groups(GROUPS.to_vec())
        .with_unsuitable_groups(true)
}

fuzz_target!(|data: &[u8]| {
    let mut responder = Session::new(config());
    let _ = responder.parse_commit(data);

    if data.len() < 2 {
        return;
    }

    // skip the expensive path for groups the initiator has not committed to
    if data[..2] != 19u16.to_le_bytes() {
        return;
    }

    let mut rng = ChaCha20Rng::seed_from_u64(0);
    let mut initiator = Session::new(config());
    if initiator
        .derive_pwe(&mut rng, b"password", &[0; 6], &[0xff; 6], None)
        .is_ok()
    {
        let _ = initiator.parse_commit(data);
        let _ = initiator.derive_keys();
    }
});
