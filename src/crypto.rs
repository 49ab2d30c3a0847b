//! Per-user encryption of stored credentials.
//!
//! Blob layout (base64, standard alphabet, padded):
//!
//! ```text
//! IV (16 bytes) || AES-256-CBC/PKCS7 ciphertext || HMAC-SHA256 tag (32 bytes)
//! ```
//!
//! The encryption key is PBKDF2-HMAC-SHA256 over the master secret salted
//! with the user identifier; the MAC key is a second PBKDF2 pass over the
//! encryption key salted with `"{user}:hmac"`. The tag covers `IV || ciphertext`
//! and is verified before any decryption is attempted.

use aes::cipher::block_padding::Pkcs7;
use aes::cipher::{BlockDecryptMut, BlockEncryptMut, KeyIvInit};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use hmac::{Hmac, Mac};
use rand::RngCore;
use secrecy::{ExposeSecret, SecretString};
use sha2::Sha256;
use thiserror::Error;
use tracing::debug;

type Aes256CbcEnc = cbc::Encryptor<aes::Aes256>;
type Aes256CbcDec = cbc::Decryptor<aes::Aes256>;
type HmacSha256 = Hmac<Sha256>;

pub const IV_LEN: usize = 16;
pub const TAG_LEN: usize = 32;
const KEY_LEN: usize = 32;
pub const KDF_ROUNDS: u32 = 10_000;

pub const MIN_CREDENTIAL_LEN: usize = 8;
pub const MAX_CREDENTIAL_LEN: usize = 500;

/// A credential rejected before encryption. Nothing should be stored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("credential is empty")]
    Empty,

    #[error("credential is too short ({len} characters, minimum {MIN_CREDENTIAL_LEN})")]
    TooShort { len: usize },

    #[error("credential is too long ({len} characters, maximum {MAX_CREDENTIAL_LEN})")]
    TooLong { len: usize },

    #[error("user identifier is empty")]
    EmptyUser,
}

#[derive(Debug, Error)]
pub enum CryptoError {
    #[error("Invalid credential: {0}")]
    Validation(#[from] ValidationError),

    #[error("Encryption failed: {0}")]
    Encryption(String),

    #[error("ENCRYPTION_KEY is not set")]
    MissingMasterKey,
}

/// Why a blob could not be opened. Only ever logged; callers see `""`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum OpenFailure {
    Empty,
    Base64,
    TooShort,
    TagMismatch,
    Padding,
    NotUtf8,
}

/// Encrypts and decrypts credentials bound to a user identifier.
///
/// Holds only the immutable master secret, so one instance can be shared
/// freely across tasks.
pub struct CredentialCipher {
    master: SecretString,
}

impl CredentialCipher {
    pub fn new(master: SecretString) -> Result<Self, CryptoError> {
        if master.expose_secret().is_empty() {
            return Err(CryptoError::MissingMasterKey);
        }
        Ok(Self { master })
    }

    /// Encrypt a trimmed credential for `user`.
    ///
    /// A fresh IV is drawn for every call, so equal inputs never produce
    /// equal blobs.
    pub fn encrypt(&self, plaintext: &str, user: &str) -> Result<String, CryptoError> {
        let credential = validate(plaintext, user)?;
        let (key, mac_key) = self.derive_keys(user);

        let mut iv = [0u8; IV_LEN];
        rand::thread_rng().fill_bytes(&mut iv);

        let ciphertext = Aes256CbcEnc::new_from_slices(&key, &iv)
            .map_err(|e| CryptoError::Encryption(e.to_string()))?
            .encrypt_padded_vec_mut::<Pkcs7>(credential.as_bytes());

        let tag = compute_tag(&mac_key, &iv, &ciphertext)?;

        let mut blob = Vec::with_capacity(IV_LEN + ciphertext.len() + TAG_LEN);
        blob.extend_from_slice(&iv);
        blob.extend_from_slice(&ciphertext);
        blob.extend_from_slice(&tag);
        Ok(STANDARD.encode(blob))
    }

    /// Decrypt a blob produced by [`encrypt`](Self::encrypt) for the same user.
    ///
    /// Returns an empty string for anything that does not open cleanly:
    /// absent, malformed, tampered, or encrypted for a different user.
    pub fn decrypt(&self, blob: &str, user: &str) -> String {
        match self.open(blob, user) {
            Ok(plaintext) => plaintext,
            Err(reason) => {
                debug!(?reason, "stored credential could not be decrypted");
                String::new()
            }
        }
    }

    fn open(&self, blob: &str, user: &str) -> Result<String, OpenFailure> {
        let blob = blob.trim();
        if blob.is_empty() || user.is_empty() {
            return Err(OpenFailure::Empty);
        }
        let raw = STANDARD.decode(blob).map_err(|_| OpenFailure::Base64)?;
        if raw.len() < IV_LEN + TAG_LEN {
            return Err(OpenFailure::TooShort);
        }

        let (iv, rest) = raw.split_at(IV_LEN);
        let (ciphertext, tag) = rest.split_at(rest.len() - TAG_LEN);

        let (key, mac_key) = self.derive_keys(user);

        let mut mac = HmacSha256::new_from_slice(&mac_key).map_err(|_| OpenFailure::TagMismatch)?;
        mac.update(iv);
        mac.update(ciphertext);
        // constant-time comparison
        mac.verify_slice(tag).map_err(|_| OpenFailure::TagMismatch)?;

        let plaintext = Aes256CbcDec::new_from_slices(&key, iv)
            .map_err(|_| OpenFailure::Padding)?
            .decrypt_padded_vec_mut::<Pkcs7>(ciphertext)
            .map_err(|_| OpenFailure::Padding)?;

        let text = String::from_utf8(plaintext).map_err(|_| OpenFailure::NotUtf8)?;
        if text.is_empty() {
            return Err(OpenFailure::Empty);
        }
        Ok(text)
    }

    fn derive_keys(&self, user: &str) -> ([u8; KEY_LEN], [u8; KEY_LEN]) {
        let mut key = [0u8; KEY_LEN];
        pbkdf2::pbkdf2_hmac::<Sha256>(self.master.expose_secret().as_bytes(), user.as_bytes(), KDF_ROUNDS, &mut key);

        let mut mac_key = [0u8; KEY_LEN];
        let mac_salt = format!("{}:hmac", user);
        pbkdf2::pbkdf2_hmac::<Sha256>(&key, mac_salt.as_bytes(), KDF_ROUNDS, &mut mac_key);

        (key, mac_key)
    }
}

fn validate<'a>(plaintext: &'a str, user: &str) -> Result<&'a str, ValidationError> {
    if user.trim().is_empty() {
        return Err(ValidationError::EmptyUser);
    }
    let credential = plaintext.trim();
    let len = credential.chars().count();
    if len == 0 {
        return Err(ValidationError::Empty);
    }
    if len < MIN_CREDENTIAL_LEN {
        return Err(ValidationError::TooShort { len });
    }
    if len > MAX_CREDENTIAL_LEN {
        return Err(ValidationError::TooLong { len });
    }
    Ok(credential)
}

fn compute_tag(mac_key: &[u8], iv: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>, CryptoError> {
    let mut mac = HmacSha256::new_from_slice(mac_key).map_err(|e| CryptoError::Encryption(e.to_string()))?;
    mac.update(iv);
    mac.update(ciphertext);
    Ok(mac.finalize().into_bytes().to_vec())
}
