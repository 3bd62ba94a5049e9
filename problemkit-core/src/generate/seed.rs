use sha2::{Digest, Sha512};

/// Seeds live in `[0, 2^31)`.
pub const SEED_MODULUS: u64 = 1 << 31;

/// Placeholders replaced by the seed in generator arguments.
pub const SEED_PLACEHOLDERS: [&str; 2] = ["$SEED", "{seed}"];

/// Seed for the `retry`-th attempt of `invocation`.
///
/// The base seed is `sha512(salt + invocation) mod 2^31`. Since 2^31 divides
/// 2^32, only the low 31 bits of the digest's last four bytes matter.
pub fn seed(invocation: &str, salt: &str, retry: u32) -> u32 {
    let mut hasher = Sha512::new();
    hasher.update(salt.as_bytes());
    hasher.update(invocation.as_bytes());
    let digest = hasher.finalize();

    let mut tail = [0u8; 4];
    tail.copy_from_slice(&digest[digest.len() - 4..]);
    let base = u64::from(u32::from_be_bytes(tail)) % SEED_MODULUS;
    ((base + u64::from(retry)) % SEED_MODULUS) as u32
}

/// Replace every seed placeholder in `argument`.
pub fn substitute_seed(argument: &str, seed: u32) -> String {
    SEED_PLACEHOLDERS
        .iter()
        .fold(argument.to_owned(), |argument, placeholder| {
            argument.replace(placeholder, &seed.to_string())
        })
}
