//! Anchor-style 8 byte discriminators for instructions and accounts

use sha2::{Digest, Sha256};

fn sighash(namespace: &str, name: &str) -> [u8; 8] {
    let mut hasher = Sha256::new();
    hasher.update(format!("{namespace}:{name}").as_bytes());
    let result = hasher.finalize();
    let mut disc = [0u8; 8];
    disc.copy_from_slice(&result[..8]);
    disc
}

/// Prefix of the instruction data for the snake_case instruction `name`.
pub fn instruction_discriminator(name: &str) -> [u8; 8] {
    sighash("global", name)
}

/// Prefix of the account data for the account struct `name`.
pub fn account_discriminator(name: &str) -> [u8; 8] {
    sighash("account", name)
}
