use rand::{rngs::StdRng, SeedableRng};
use sha2::{Digest, Sha256};

/// First eight bytes of the seed string's SHA-256, little-endian.
pub fn seed_value(seed: &str) -> u64 {
    let digest = Sha256::digest(seed.as_bytes());
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&digest[..8]);
    u64::from_le_bytes(bytes)
}

pub fn seeded_rng(seed: &str) -> StdRng {
    StdRng::seed_from_u64(seed_value(seed))
}
