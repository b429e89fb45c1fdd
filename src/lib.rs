//! Warren - A KRM function that keeps KSOPS-encrypted secrets up to date.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── mod           # Argument parsing and the stdin/stdout pipeline
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── config        # UpdateKSopsSecrets function configuration
//!     ├── document      # KRM document and ResourceList plumbing
//!     ├── recipient     # Encryption recipients and PGP classification
//!     ├── resolver      # Secret value lookup across referenced documents
//!     ├── fingerprint   # Change-detection records (argon2id + AES-GCM)
//!     ├── generate      # Manifest builders and the per-key pipeline
//!     ├── delegate/     # External tool delegates
//!     │   ├── mod       # Encrypter / KeyManager traits
//!     │   ├── sops      # sops encryption delegate
//!     │   └── gpg       # gpg keyring delegate
//!     ├── processor     # One invocation over a ResourceList
//!     └── report        # Run diagnostics and exit codes
//! ```
//!
//! # Features
//!
//! - Drop-in kpt function: ResourceList in, ResourceList out
//! - Encrypts only the keys whose values actually changed
//! - Obfuscated, authenticated fingerprints — no plaintext digests at rest
//! - age and PGP recipients, with keyring preloading for PGP
//! - Generated manifests wired for kustomize + KSOPS out of the box
//!
//! # Update detection
//!
//! Every declared key gets a fingerprint record sealed next to its
//! encrypted file. On the next run the record is opened against the
//! current value, name, type, and recipient set; only a mismatch
//! triggers re-encryption, so unchanged keys keep stable ciphertext
//! and clean diffs.

pub mod cli;
pub mod core;
pub mod error;
