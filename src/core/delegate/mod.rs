//! External cryptographic delegates.
//!
//! Bulk encryption and public key management are delegated to external
//! CLIs. Both are modeled as traits so the orchestrator can be exercised
//! with in-memory fakes while production shells out:
//!
//! - [`Encrypter`]: encrypts a complete secret document for a recipient
//!   set (production: [`SopsCli`]).
//! - [`KeyManager`]: fetches or imports public keys ahead of encryption
//!   (production: [`GpgCli`]).

use crate::core::recipient::Recipient;
use crate::error::Result;

mod gpg;
mod sops;

pub use gpg::GpgCli;
pub use sops::SopsCli;

/// Bulk encryption backend.
pub trait Encrypter {
    /// Encrypts a YAML secret document for every recipient, returning the
    /// encrypted document text.
    ///
    /// # Errors
    ///
    /// Returns a `DelegateError` when the backend is unavailable or exits
    /// unsuccessfully.
    fn encrypt(&self, input: &str, recipients: &[Recipient]) -> Result<String>;
}

/// Public key management backend.
///
/// Both operations return the backend's diagnostic output on success.
pub trait KeyManager {
    /// Fetches public keys from a key server by fingerprint.
    ///
    /// # Errors
    ///
    /// Returns a `DelegateError` when the backend is unavailable or any
    /// fingerprint cannot be fetched.
    fn receive_keys(&self, fingerprints: &[&str]) -> Result<String>;

    /// Imports armored public key material.
    ///
    /// # Errors
    ///
    /// Returns a `DelegateError` when the backend is unavailable or rejects
    /// the key material.
    fn import_key(&self, data: &str) -> Result<String>;
}
