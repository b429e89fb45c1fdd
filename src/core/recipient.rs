//! Encryption recipient model and classification.
//!
//! A recipient couples a scheme (`age` or `pgp`) with the identifier handed
//! to the encryption backend: an age public key or a PGP fingerprint. PGP
//! recipients may additionally carry a `publicKeySecretReference` naming a
//! Kubernetes secret that holds the armored public key, in which case the
//! key is imported from that secret instead of fetched from a key server.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported encryption schemes. Unknown schemes are rejected at parse time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RecipientScheme {
    Age,
    Pgp,
}

impl RecipientScheme {
    pub fn as_str(&self) -> &'static str {
        match self {
            RecipientScheme::Age => "age",
            RecipientScheme::Pgp => "pgp",
        }
    }
}

impl fmt::Display for RecipientScheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to a Kubernetes secret entry carrying an armored PGP public key.
///
/// Both fields must be present for the reference to be usable; a reference
/// with either field empty falls back to key-server retrieval.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKeyReference {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub key: String,
}

impl PublicKeyReference {
    pub fn is_complete(&self) -> bool {
        !self.name.is_empty() && !self.key.is_empty()
    }
}

/// One encryption recipient from the function configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Recipient {
    #[serde(rename = "type")]
    pub scheme: RecipientScheme,
    pub recipient: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_key_secret_reference: Option<PublicKeyReference>,
}

impl Recipient {
    /// Secret reference to import the public key from, when complete.
    pub fn preload_reference(&self) -> Option<&PublicKeyReference> {
        self.public_key_secret_reference
            .as_ref()
            .filter(|r| r.is_complete())
    }
}

/// PGP recipients partitioned by public key source.
///
/// Age recipients never appear here: age encrypts directly to the public
/// key in the configuration and needs no keyring preparation.
#[derive(Debug, Default)]
pub struct ClassifiedRecipients<'a> {
    /// Keys fetched from a key server by fingerprint.
    pub key_server: Vec<&'a Recipient>,
    /// Keys imported from a referenced in-cluster secret.
    pub preload: Vec<&'a Recipient>,
}

/// Partitions PGP recipients by whether their public key comes from a
/// referenced secret or a key server, preserving declaration order.
pub fn classify(recipients: &[Recipient]) -> ClassifiedRecipients<'_> {
    let mut classified = ClassifiedRecipients::default();
    for recipient in recipients {
        if recipient.scheme != RecipientScheme::Pgp {
            continue;
        }
        if recipient.preload_reference().is_some() {
            classified.preload.push(recipient);
        } else {
            classified.key_server.push(recipient);
        }
    }
    classified
}
