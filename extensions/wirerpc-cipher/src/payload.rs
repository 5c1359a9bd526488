use crate::error::CipherError;

/// Current payload format version.
pub const PAYLOAD_VERSION: u8 = 1;

/// Byte length of the key-derivation salt.
pub const SALT_SIZE: usize = 16;

/// Byte length of the XChaCha20-Poly1305 nonce (192 bits).
pub const NONCE_SIZE: usize = 24;

/// Byte length of the Poly1305 authentication tag appended to the
/// ciphertext.
pub const TAG_SIZE: usize = 16;

/// Size of the fixed prefix: version + salt + nonce.
pub const HEADER_SIZE: usize = 1 + SALT_SIZE + NONCE_SIZE;

/// Versioned, authenticated ciphertext record.
///
/// Immutable once produced; [`crate::decrypt`] is the only consumer.
/// The wire form is the concatenation
/// `[version:1][salt:16][nonce:24][ciphertext+tag]`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EncryptedPayload {
    version: u8,
    salt: [u8; SALT_SIZE],
    nonce: [u8; NONCE_SIZE],
    /// Ciphertext with the 16-byte authentication tag appended.
    ciphertext: Vec<u8>,
}

impl EncryptedPayload {
    pub(crate) fn new(salt: [u8; SALT_SIZE], nonce: [u8; NONCE_SIZE], ciphertext: Vec<u8>) -> Self {
        Self { version: PAYLOAD_VERSION, salt, nonce, ciphertext }
    }

    pub fn version(&self) -> u8 {
        self.version
    }

    pub fn salt(&self) -> &[u8; SALT_SIZE] {
        &self.salt
    }

    pub fn nonce(&self) -> &[u8; NONCE_SIZE] {
        &self.nonce
    }

    /// Ciphertext including the trailing authentication tag.
    pub fn ciphertext(&self) -> &[u8] {
        &self.ciphertext
    }

    /// Serializes the record into its wire form.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(HEADER_SIZE + self.ciphertext.len());
        buf.push(self.version);
        buf.extend(&self.salt);
        buf.extend(&self.nonce);
        buf.extend(&self.ciphertext);
        buf
    }

    /// Parses a wire-form record.
    ///
    /// Fails with `UnsupportedVersion` on an unrecognized version tag and
    /// with `MalformedPayload` when the input cannot contain the fixed
    /// header plus an authentication tag.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CipherError> {
        let version = *bytes.first().ok_or_else(|| {
            CipherError::MalformedPayload("empty payload".to_string())
        })?;
        if version != PAYLOAD_VERSION {
            return Err(CipherError::UnsupportedVersion(version));
        }
        if bytes.len() < HEADER_SIZE + TAG_SIZE {
            return Err(CipherError::MalformedPayload(format!(
                "{} bytes, need at least {}",
                bytes.len(),
                HEADER_SIZE + TAG_SIZE
            )));
        }
        let mut salt = [0u8; SALT_SIZE];
        salt.copy_from_slice(&bytes[1..1 + SALT_SIZE]);
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[1 + SALT_SIZE..HEADER_SIZE]);
        Ok(Self {
            version,
            salt,
            nonce,
            ciphertext: bytes[HEADER_SIZE..].to_vec(),
        })
    }
}
