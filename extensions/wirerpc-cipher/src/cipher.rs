use crate::error::CipherError;
use crate::kdf::{KdfParams, derive_key};
use crate::payload::{EncryptedPayload, NONCE_SIZE, PAYLOAD_VERSION, SALT_SIZE};
use chacha20poly1305::aead::rand_core::RngCore;
use chacha20poly1305::aead::{Aead, KeyInit, OsRng};
use chacha20poly1305::{Key, XChaCha20Poly1305, XNonce};

/// Encrypts `plaintext` under a key derived from `password`.
///
/// Draws a fresh salt and nonce from OS entropy on every call, so the
/// output differs between calls even for identical inputs.
pub fn encrypt(plaintext: &[u8], password: &str) -> Result<EncryptedPayload, CipherError> {
    encrypt_with_params(plaintext, password, KdfParams::default())
}

pub fn encrypt_with_params(
    plaintext: &[u8],
    password: &str,
    params: KdfParams,
) -> Result<EncryptedPayload, CipherError> {
    let mut salt = [0u8; SALT_SIZE];
    OsRng.fill_bytes(&mut salt);
    let mut nonce = [0u8; NONCE_SIZE];
    OsRng.fill_bytes(&mut nonce);

    let key = derive_key(password, &salt, params)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    let ciphertext = cipher
        .encrypt(XNonce::from_slice(&nonce), plaintext)
        .map_err(|e| CipherError::EncryptionFailed(e.to_string()))?;

    Ok(EncryptedPayload::new(salt, nonce, ciphertext))
}

/// Decrypts a payload produced by [`encrypt`] under the same password.
///
/// Re-derives the key from the embedded salt; tag verification happens
/// inside the AEAD (constant-time) and a failure yields
/// [`CipherError::AuthenticationFailed`] with no partial plaintext. A
/// wrong password and tampered ciphertext are indistinguishable.
pub fn decrypt(payload: &EncryptedPayload, password: &str) -> Result<Vec<u8>, CipherError> {
    decrypt_with_params(payload, password, KdfParams::default())
}

pub fn decrypt_with_params(
    payload: &EncryptedPayload,
    password: &str,
    params: KdfParams,
) -> Result<Vec<u8>, CipherError> {
    if payload.version() != PAYLOAD_VERSION {
        return Err(CipherError::UnsupportedVersion(payload.version()));
    }
    let key = derive_key(password, payload.salt(), params)?;
    let cipher = XChaCha20Poly1305::new(Key::from_slice(key.as_bytes()));
    cipher
        .decrypt(XNonce::from_slice(payload.nonce()), payload.ciphertext())
        .map_err(|_| CipherError::AuthenticationFailed)
}
