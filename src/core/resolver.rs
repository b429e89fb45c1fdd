//! Layered secret value resolution.
//!
//! Secret values live in Kubernetes Secret documents named by the function
//! configuration's references. A value may appear as plaintext under
//! `stringData` or base64-encoded under `data`, in any referenced document.
//! The catalog resolves a key with deterministic precedence: the plaintext
//! view is consulted before the encoded view, and within a view the last
//! matching document in input order overrides earlier ones.
//!
//! Documents whose path marks them as generated encryption output are never
//! value sources (their contents are ciphertext from a previous run), but
//! they are exactly where fingerprint records are looked up.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use regex::Regex;
use serde_yaml::Value;
use std::sync::LazyLock;

use crate::core::config::UpdateSecrets;
use crate::core::document::{doc_api_version, doc_kind, doc_name, doc_path, nested_str};
use crate::error::ResolveError;

/// Group/version and kind of the dedicated fingerprint record document.
pub const FINGERPRINT_API_VERSION: &str = "config.kubernetes.io/v1alpha1";
pub const FINGERPRINT_KIND: &str = "SecretFingerprint";

/// Paths of documents produced by a previous invocation.
static GENERATED_ARTIFACT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"generated/secrets\..*\.(enc|fp)\.yaml").unwrap());

/// A successfully resolved secret value and its representation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedValue {
    pub value: String,
    pub b64encoded: bool,
}

/// The referenced documents of one invocation, partitioned into value
/// sources and generated artifacts.
#[derive(Debug)]
pub struct SecretCatalog<'a> {
    sources: Vec<&'a Value>,
    generated: Vec<&'a Value>,
}

impl<'a> SecretCatalog<'a> {
    /// Selects the catalog documents from the ResourceList items.
    ///
    /// A document participates when its name is one of the configuration's
    /// reference names and it is either a `v1/Secret` or a dedicated
    /// fingerprint document. Generated artifacts are recognized by their
    /// path annotation and kept apart from value sources.
    pub fn new(items: &'a [Value], config: &UpdateSecrets) -> Self {
        let references = config.reference_names();
        let mut sources = Vec::new();
        let mut generated = Vec::new();

        for item in items {
            if !references.iter().any(|r| r == doc_name(item)) {
                continue;
            }

            let secret = doc_api_version(item) == "v1" && doc_kind(item) == "Secret";
            let fingerprint = doc_api_version(item) == FINGERPRINT_API_VERSION
                && doc_kind(item) == FINGERPRINT_KIND;

            if GENERATED_ARTIFACT.is_match(doc_path(item)) {
                if secret || fingerprint {
                    generated.push(item);
                }
            } else if secret {
                sources.push(item);
            }
        }

        Self { sources, generated }
    }

    /// Resolves a key across all source documents.
    ///
    /// # Errors
    ///
    /// Returns [`ResolveError::NotFound`] when no document declares the key
    /// and [`ResolveError::Decode`] when the winning `data` entry is not
    /// valid base64.
    pub fn get(&self, key: &str) -> Result<ResolvedValue, ResolveError> {
        self.get_exact(None, key)
    }

    /// Resolves a key, optionally restricted to documents with one name.
    ///
    /// # Errors
    ///
    /// Same conditions as [`SecretCatalog::get`].
    pub fn get_exact(&self, name: Option<&str>, key: &str) -> Result<ResolvedValue, ResolveError> {
        if let Some((value, _)) = self.lookup(name, key, "stringData") {
            return Ok(ResolvedValue {
                value: value.to_string(),
                b64encoded: false,
            });
        }

        if let Some((value, owner)) = self.lookup(name, key, "data") {
            BASE64
                .decode(value)
                .map_err(|source| ResolveError::Decode {
                    key: key.to_string(),
                    name: owner.to_string(),
                    source,
                })?;
            return Ok(ResolvedValue {
                value: value.to_string(),
                b64encoded: true,
            });
        }

        Err(ResolveError::NotFound(key.to_string()))
    }

    /// Fingerprint record for `(name, key)` from the generated artifacts,
    /// or empty when the key was never sealed.
    ///
    /// The record normally lives in a dedicated fingerprint document;
    /// earlier releases embedded it under `sops.encrypted_fp` inside the
    /// encrypted secret itself, which is still honored as a fallback.
    pub fn fingerprint_record(&self, name: &str, key: &str) -> String {
        for doc in &self.generated {
            if doc_kind(doc) != FINGERPRINT_KIND || doc_name(doc) != name {
                continue;
            }
            if let Some(record) = nested_str(doc, &["data", key]) {
                return record.to_string();
            }
        }

        for doc in &self.generated {
            if doc_kind(doc) != "Secret" || doc_name(doc) != name {
                continue;
            }
            if let Some(record) = nested_str(doc, &["sops", "encrypted_fp", key]) {
                return record.to_string();
            }
        }

        String::new()
    }

    /// Last matching `(value, document name)` for a key within one field
    /// view, later documents overriding earlier ones.
    fn lookup(&self, name: Option<&str>, key: &str, field: &str) -> Option<(&'a str, &'a str)> {
        let mut winner = None;

        for doc in &self.sources {
            if let Some(required) = name {
                if doc_name(doc) != required {
                    continue;
                }
            }
            if let Some(value) = nested_str(doc, &[field, key]) {
                winner = Some((value, doc_name(doc)));
            }
        }

        winner
    }
}
