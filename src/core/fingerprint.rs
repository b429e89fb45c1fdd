//! Change-detection fingerprinting.
//!
//! Re-encrypting a secret is never byte-stable (the encryption backend uses
//! a fresh nonce per run), so an unchanged secret must be detected *before*
//! encryption to keep generated files diff-clean. Instead of storing a
//! comparable hash of the plaintext, a fingerprint record is an AES-256-GCM
//! ciphertext of a throwaway payload, keyed by an Argon2id derivation over
//! the secret's full identity (name, type, key, value, recipient set).
//! Opening the record with freshly derived key material acts as an equality
//! oracle: authentication succeeds only when nothing changed.

use aes_gcm::aead::{Aead, KeyInit, OsRng};
use aes_gcm::{Aes256Gcm, Key, Nonce};
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use rand::RngCore;
use std::borrow::Cow;
use zeroize::Zeroizing;

use crate::core::recipient::Recipient;
use crate::error::{CipherError, Result};

/// AES-GCM standard nonce size; the nonce doubles as the derivation salt.
pub const NONCE_SIZE: usize = 12;

const DIGEST_SIZE: usize = 32;
const MEMORY_COST_KIB: u32 = 46 * 1024;
const TIME_COST: u32 = 1;
const PARALLELISM: u32 = 1;

/// The tuple a fingerprint record commits to.
///
/// Two inputs derive the same key material exactly when every field matches
/// after value normalization, so `try_open` on a record sealed from an equal
/// tuple succeeds and any single-field change makes it fail.
#[derive(Debug, Clone, Copy)]
pub struct FingerprintInput<'a> {
    pub secret_name: &'a str,
    pub secret_type: &'a str,
    pub key: &'a str,
    pub value: &'a str,
    /// Whether `value` is already base64-encoded. Raw values are encoded
    /// before derivation so both representations fingerprint identically.
    pub b64encoded: bool,
    pub recipients: &'a [Recipient],
}

impl FingerprintInput<'_> {
    /// Seals a new fingerprint record for this tuple.
    ///
    /// The encrypted payload is a current timestamp and carries no meaning;
    /// only the authentication tag matters. Output is
    /// `base64(nonce || ciphertext)` with a fresh random nonce.
    ///
    /// # Errors
    ///
    /// Returns a [`CipherError`] when the random source fails or the cipher
    /// cannot seal.
    pub fn seal(&self) -> Result<String> {
        let mut nonce = [0u8; NONCE_SIZE];
        OsRng
            .try_fill_bytes(&mut nonce)
            .map_err(CipherError::Nonce)?;

        let key = self.key_material(&nonce)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));

        let payload = Utc::now().to_rfc3339();
        let sealed = cipher
            .encrypt(Nonce::from_slice(&nonce), payload.as_bytes())
            .map_err(|_| CipherError::Encrypt)?;

        let mut record = Vec::with_capacity(NONCE_SIZE + sealed.len());
        record.extend_from_slice(&nonce);
        record.extend_from_slice(&sealed);
        Ok(BASE64.encode(record))
    }

    /// Tests whether `record` was sealed from a tuple equal to this one.
    ///
    /// An empty record means "never sealed" and yields `Ok(false)`. An
    /// authentication failure also yields `Ok(false)`: the tuple changed or
    /// the record belongs to something else, and both answers are "encrypt
    /// again". Only a record too malformed to attempt authentication is an
    /// error.
    ///
    /// # Errors
    ///
    /// Returns [`CipherError::RecordDecode`] for invalid base64 and
    /// [`CipherError::RecordTruncated`] when the decoded record is shorter
    /// than a nonce.
    pub fn try_open(&self, record: &str) -> Result<bool> {
        if record.is_empty() {
            return Ok(false);
        }

        let decoded = BASE64.decode(record).map_err(CipherError::RecordDecode)?;
        if decoded.len() < NONCE_SIZE {
            return Err(CipherError::RecordTruncated(decoded.len()).into());
        }
        let (nonce, sealed) = decoded.split_at(NONCE_SIZE);

        let key = self.key_material(nonce)?;
        let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key.as_ref()));

        Ok(cipher.decrypt(Nonce::from_slice(nonce), sealed).is_ok())
    }

    /// Derives the 32-byte cipher key for this tuple under `salt`.
    ///
    /// Every field is individually obfuscated, the digests are concatenated
    /// in a fixed order (name, type, key, value, then scheme and identifier
    /// per recipient), and the concatenation is digested once more.
    fn key_material(&self, salt: &[u8]) -> Result<Zeroizing<[u8; DIGEST_SIZE]>> {
        let value = self.normalized_value();

        let mut material = Zeroizing::new(Vec::new());
        material.extend_from_slice(&obfuscate(self.secret_name, salt)?);
        material.extend_from_slice(&obfuscate(self.secret_type, salt)?);
        material.extend_from_slice(&obfuscate(self.key, salt)?);
        material.extend_from_slice(&obfuscate(&value, salt)?);
        for recipient in self.recipients {
            material.extend_from_slice(&obfuscate(recipient.scheme.as_str(), salt)?);
            material.extend_from_slice(&obfuscate(&recipient.recipient, salt)?);
        }

        Ok(Zeroizing::new(memory_hard_digest(&material, salt)?))
    }

    fn normalized_value(&self) -> Cow<'_, str> {
        if self.b64encoded {
            Cow::Borrowed(self.value)
        } else {
            Cow::Owned(BASE64.encode(self.value))
        }
    }
}

/// Salted digest of one field, truncated to a length in `[16, 31]` derived
/// from the digest itself so concatenated fields never sit at fixed offsets.
fn obfuscate(value: &str, salt: &[u8]) -> Result<Vec<u8>> {
    let digest = memory_hard_digest(value.as_bytes(), salt)?;

    let mut modulus = usize::from(digest[DIGEST_SIZE - 1]) % 16;
    if modulus == 0 {
        modulus = 1;
    }
    let length = 16 + usize::from(digest[0]) % modulus;

    Ok(digest[..length].to_vec())
}

/// Argon2id digest with the fixed fingerprint parameters: time cost 1,
/// 46 MiB memory, single lane, 32-byte output.
fn memory_hard_digest(input: &[u8], salt: &[u8]) -> std::result::Result<[u8; DIGEST_SIZE], CipherError> {
    let params = Params::new(MEMORY_COST_KIB, TIME_COST, PARALLELISM, Some(DIGEST_SIZE))
        .map_err(|e| CipherError::KeyDerivation(format!("invalid Argon2id parameters: {e}")))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let mut output = [0u8; DIGEST_SIZE];
    argon2
        .hash_password_into(input, salt, &mut output)
        .map_err(|e| CipherError::KeyDerivation(format!("Argon2id digest failed: {e}")))?;
    Ok(output)
}
