use std::fmt;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CipherError {
    /// The key derivation function rejected its parameters or input.
    KeyDerivation(String),

    /// The underlying AEAD rejected the encryption (plaintext too large).
    EncryptionFailed(String),

    /// Tag verification rejected the payload. Deliberately does not
    /// distinguish a wrong password from tampered ciphertext.
    AuthenticationFailed,

    /// The payload's version tag is not one this build understands.
    UnsupportedVersion(u8),

    /// The serialized payload is too short to contain the fixed header
    /// and authentication tag.
    MalformedPayload(String),
}

impl fmt::Display for CipherError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CipherError::KeyDerivation(reason) => {
                write!(f, "key derivation failed: {reason}")
            }
            CipherError::EncryptionFailed(reason) => {
                write!(f, "encryption failed: {reason}")
            }
            CipherError::AuthenticationFailed => {
                write!(f, "authentication failed: payload rejected")
            }
            CipherError::UnsupportedVersion(version) => {
                write!(f, "unsupported payload version: {version}")
            }
            CipherError::MalformedPayload(reason) => {
                write!(f, "malformed payload: {reason}")
            }
        }
    }
}

impl std::error::Error for CipherError {}
