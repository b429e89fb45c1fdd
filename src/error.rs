//! Error types for warren.
//!
//! Errors are grouped by concern: function configuration, secret
//! resolution, fingerprint cipher machinery, and external delegates.
//! Most failures do not abort a run — they are folded into the
//! ResourceList results with a severity instead (see `core::report`).

use thiserror::Error;

/// Top-level error type.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Resolve(#[from] ResolveError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Delegate(#[from] DelegateError),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// Function configuration errors. These abort the whole run.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("the functionConfig must be a {expected}, got {got}")]
    WrongKind { expected: &'static str, got: String },

    #[error("the ResourceList has no functionConfig")]
    MissingFunctionConfig,

    #[error("input is not a {0} document")]
    InvalidDocument(&'static str),

    #[error("functionConfig has no metadata.name")]
    MissingName,

    #[error("unable to parse functionConfig: {0}")]
    Parse(#[source] serde_yaml::Error),
}

/// Secret resolution errors. Recoverable per key.
#[derive(Error, Debug)]
pub enum ResolveError {
    #[error("secret: {0}, secret was not found in the references")]
    NotFound(String),

    #[error("secret: {key}, invalid base64 in data field of '{name}': {source}")]
    Decode {
        key: String,
        name: String,
        #[source]
        source: base64::DecodeError,
    },

    #[error("secret: {key}, public key data in '{name}' is not valid UTF-8")]
    NotUtf8 { key: String, name: String },
}

/// Fingerprint cipher errors. These are machinery failures, never an
/// authentication mismatch (a mismatch is a plain `false` from try_open).
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("fingerprint record is not valid base64: {0}")]
    RecordDecode(#[from] base64::DecodeError),

    #[error("fingerprint record too short: {0} bytes")]
    RecordTruncated(usize),

    #[error("random nonce error: {0}")]
    Nonce(#[from] rand::Error),

    #[error("key derivation error: {0}")]
    KeyDerivation(String),

    #[error("aead encryption error")]
    Encrypt,
}

/// External delegate errors (sops / gpg subprocess failures).
#[derive(Error, Debug)]
pub enum DelegateError {
    #[error("{tool} binary not found: {hint}")]
    MissingBinary { tool: &'static str, hint: &'static str },

    #[error("failed to spawn {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("sops encryption failed: {0}")]
    Encrypt(String),

    #[error("gpg key receive failed: {0}")]
    KeyReceive(String),

    #[error("gpg key import failed: {0}")]
    KeyImport(String),

    #[error("{tool} produced non-UTF-8 output")]
    Output { tool: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
