// SPDX-License-Identifier: MIT

//! Password derivation and verification (PBKDF2-HMAC-SHA256 via ring).

use crate::error::{AppError, Result};
use anyhow::anyhow;
use ring::pbkdf2;
use ring::rand::{SecureRandom, SystemRandom};
use std::num::NonZeroU32;

static PBKDF2_ALG: pbkdf2::Algorithm = pbkdf2::PBKDF2_HMAC_SHA256;

const PBKDF2_ITERATIONS: u32 = 100_000;
const SALT_LEN: usize = 16;
const HASH_LEN: usize = 32;

/// Minimum acceptable password: more than 10 characters, alphanumeric only.
pub fn meets_requirements(password: &str) -> bool {
    password.chars().count() > 10 && password.chars().all(|c| c.is_ascii_alphanumeric())
}

/// Derive a hash from a password with a fresh random salt.
///
/// Returns `(salt, hash)` for storage alongside the user record.
pub fn derive(password: &str) -> Result<(Vec<u8>, Vec<u8>)> {
    let rng = SystemRandom::new();
    let mut salt = [0u8; SALT_LEN];
    rng.fill(&mut salt)
        .map_err(|_| AppError::Internal(anyhow!("system RNG failure")))?;

    let mut hash = [0u8; HASH_LEN];
    pbkdf2::derive(
        PBKDF2_ALG,
        iterations(),
        &salt,
        password.as_bytes(),
        &mut hash,
    );

    Ok((salt.to_vec(), hash.to_vec()))
}

/// Constant-time verification of a candidate password against a stored
/// salt + hash pair.
pub fn verify(password: &str, salt: &[u8], expected_hash: &[u8]) -> bool {
    pbkdf2::verify(
        PBKDF2_ALG,
        iterations(),
        salt,
        password.as_bytes(),
        expected_hash,
    )
    .is_ok()
}

fn iterations() -> NonZeroU32 {
    // PBKDF2_ITERATIONS is a nonzero constant
    NonZeroU32::new(PBKDF2_ITERATIONS).unwrap()
}
