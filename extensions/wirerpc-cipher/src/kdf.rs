//! Argon2id key derivation.
//!
//! Turns a password and salt into a 256-bit symmetric key using a
//! memory-hard function, so brute-forcing the password through the
//! payload costs real memory and CPU per guess.

use crate::error::CipherError;
use crate::payload::SALT_SIZE;
use argon2::{Algorithm, Argon2, Params, Version};
use zeroize::{Zeroize, ZeroizeOnDrop};

/// Argon2id cost parameters.
///
/// Not encoded into the payload; the payload version byte pins the
/// defaults, and both sides of a `*_with_params` pair must agree.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct KdfParams {
    /// Memory cost in KiB.
    pub m_cost: u32,
    /// Number of passes.
    pub t_cost: u32,
    /// Degree of parallelism.
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 19_456, // 19 MiB
            t_cost: 2,
            p_cost: 1,
        }
    }
}

/// 256-bit derived key, zeroized on drop.
#[derive(Zeroize, ZeroizeOnDrop)]
pub struct DerivedKey([u8; 32]);

impl DerivedKey {
    pub const LEN: usize = 32;

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

pub fn derive_key(
    password: &str,
    salt: &[u8; SALT_SIZE],
    params: KdfParams,
) -> Result<DerivedKey, CipherError> {
    let params = Params::new(params.m_cost, params.t_cost, params.p_cost, Some(DerivedKey::LEN))
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);
    let mut key = [0u8; DerivedKey::LEN];
    argon2
        .hash_password_into(password.as_bytes(), salt, &mut key)
        .map_err(|e| CipherError::KeyDerivation(e.to_string()))?;
    Ok(DerivedKey(key))
}
