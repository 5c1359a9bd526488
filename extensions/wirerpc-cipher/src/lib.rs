//! Password-based authenticated encryption of arbitrary byte payloads.
//!
//! The scheme is XChaCha20-Poly1305 keyed by Argon2id over the password
//! and a fresh random salt. Every encryption draws a new salt and a new
//! 192-bit nonce from OS entropy, so encrypting the same input twice never
//! yields the same bytes.
//!
//! The wire form of an [`EncryptedPayload`] is fixed:
//! `[version:1][salt:16][nonce:24][ciphertext+tag]`. Text-safe encodings
//! (base64, hex) are an outer concern and never applied inside the record.

pub mod cipher;
pub mod error;
pub mod kdf;
pub mod payload;

pub use cipher::{decrypt, decrypt_with_params, encrypt, encrypt_with_params};
pub use error::CipherError;
pub use kdf::KdfParams;
pub use payload::EncryptedPayload;
