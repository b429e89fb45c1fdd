//! Function configuration parsing and validation.
//!
//! The orchestrator is driven by an `UpdateKSopsSecrets` document passed as
//! the ResourceList `functionConfig`. This module parses that document,
//! enforces its group/version/kind, and exposes the views the rest of the
//! pipeline consumes: the sorted item list, the effective secret type, and
//! the names of documents eligible as secret value references.

use crate::core::recipient::{Recipient, RecipientScheme};
use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

pub const EXPECTED_API_VERSION: &str = "fn.kpt.dev/v1alpha1";
pub const EXPECTED_KIND: &str = "UpdateKSopsSecrets";

const EXPECTED_GVK: &str = "fn.kpt.dev/v1alpha1/UpdateKSopsSecrets";
const DEFAULT_SECRET_TYPE: &str = "Opaque";

/// Parsed `UpdateKSopsSecrets` function configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSecrets {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub secret: SecretSpec,
    #[serde(default)]
    pub recipients: Vec<Recipient>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub labels: BTreeMap<String, String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub annotations: BTreeMap<String, String>,
}

/// The `secret` block: what to encrypt and where the plaintexts live.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SecretSpec {
    /// Kubernetes secret type for the generated secret, `Opaque` if unset.
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    pub secret_type: Option<String>,
    /// Names of unencrypted secret documents to resolve values from.
    #[serde(default)]
    pub references: Vec<String>,
    /// Keys to encrypt.
    #[serde(default)]
    pub items: Vec<String>,
}

impl UpdateSecrets {
    /// Parses and validates a functionConfig document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] when the document does not deserialize
    /// (including unknown recipient schemes), [`ConfigError::WrongKind`] when
    /// the group/version/kind is not `fn.kpt.dev/v1alpha1/UpdateKSopsSecrets`,
    /// and [`ConfigError::MissingName`] when `metadata.name` is empty.
    pub fn from_value(value: &Value) -> Result<Self, ConfigError> {
        let config: UpdateSecrets =
            serde_yaml::from_value(value.clone()).map_err(ConfigError::Parse)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.api_version != EXPECTED_API_VERSION || self.kind != EXPECTED_KIND {
            return Err(ConfigError::WrongKind {
                expected: EXPECTED_GVK,
                got: format!("{}/{}", self.api_version, self.kind),
            });
        }
        if self.metadata.name.is_empty() {
            return Err(ConfigError::MissingName);
        }
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.metadata.name
    }

    /// Effective Kubernetes secret type.
    pub fn secret_type(&self) -> &str {
        self.secret
            .secret_type
            .as_deref()
            .filter(|t| !t.is_empty())
            .unwrap_or(DEFAULT_SECRET_TYPE)
    }

    /// Secret keys to process, lexicographically sorted and deduplicated so
    /// the generated file set is stable across configuration reordering.
    pub fn secret_items(&self) -> Vec<String> {
        let mut items = self.secret.items.clone();
        items.sort();
        items.dedup();
        items
    }

    /// Names of documents that may supply secret values: the configured
    /// references, any PGP recipient public key secrets, and the
    /// configuration's own name (so previously generated output can be
    /// consulted for fingerprint records).
    pub fn reference_names(&self) -> Vec<String> {
        let mut names = self.secret.references.clone();
        for recipient in &self.recipients {
            if recipient.scheme != RecipientScheme::Pgp {
                continue;
            }
            if let Some(reference) = &recipient.public_key_secret_reference {
                if !reference.name.is_empty() {
                    names.push(reference.name.clone());
                }
            }
        }
        if !names.iter().any(|n| n == &self.metadata.name) {
            names.push(self.metadata.name.clone());
        }
        names
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::recipient::RecipientScheme;

    const CONFIG_YAML: &str = r"
apiVersion: fn.kpt.dev/v1alpha1
kind: UpdateKSopsSecrets
metadata:
  name: user-secrets
secret:
  type: Opaque
  references:
    - unencrypted-secrets
    - unencrypted-secrets-config-txt
  items:
    - test2
    - test
    - UPPER_CASE
recipients:
  - type: age
    recipient: age1x7pzjx4r05aeduggjxy6fmx8c5sp49gjgewzee025tv3hyn0gq2sru55qy
  - type: pgp
    recipient: 6DBFDBA2ABED52FDA0ABF9EA8AD0C521B11E224A
    publicKeySecretReference:
      name: gpg-publickeys
      key: 6DBFDBA2.gpg
";

    fn parse(yaml: &str) -> Result<UpdateSecrets, ConfigError> {
        let value: Value = serde_yaml::from_str(yaml).unwrap();
        UpdateSecrets::from_value(&value)
    }

    #[test]
    fn test_parses_full_config() {
        let config = parse(CONFIG_YAML).unwrap();

        assert_eq!(config.name(), "user-secrets");
        assert_eq!(config.secret_type(), "Opaque");
        assert_eq!(config.recipients.len(), 2);
        assert_eq!(config.recipients[0].scheme, RecipientScheme::Age);
    }

    #[test]
    fn test_items_sorted_and_deduplicated() {
        let mut config = parse(CONFIG_YAML).unwrap();
        config.secret.items.push("test".to_string());

        assert_eq!(config.secret_items(), vec!["UPPER_CASE", "test", "test2"]);
    }

    #[test]
    fn test_reference_names_include_key_secrets_and_own_name() {
        let config = parse(CONFIG_YAML).unwrap();

        assert_eq!(
            config.reference_names(),
            vec![
                "unencrypted-secrets",
                "unencrypted-secrets-config-txt",
                "gpg-publickeys",
                "user-secrets",
            ]
        );
    }

    #[test]
    fn test_secret_type_defaults_to_opaque() {
        let yaml = r"
apiVersion: fn.kpt.dev/v1alpha1
kind: UpdateKSopsSecrets
metadata:
  name: user-secrets
";
        let config = parse(yaml).unwrap();
        assert_eq!(config.secret_type(), "Opaque");
    }

    #[test]
    fn test_rejects_wrong_kind() {
        let yaml = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: cm\n";
        let err = parse(yaml).unwrap_err();

        assert!(matches!(err, ConfigError::WrongKind { .. }));
        assert!(err.to_string().contains("v1/ConfigMap"));
    }

    #[test]
    fn test_rejects_missing_name() {
        let yaml = "apiVersion: fn.kpt.dev/v1alpha1\nkind: UpdateKSopsSecrets\n";
        assert!(matches!(parse(yaml), Err(ConfigError::MissingName)));
    }

    #[test]
    fn test_rejects_unknown_recipient_scheme() {
        let yaml = r"
apiVersion: fn.kpt.dev/v1alpha1
kind: UpdateKSopsSecrets
metadata:
  name: user-secrets
recipients:
  - type: rsa
    recipient: someone
";
        assert!(matches!(parse(yaml), Err(ConfigError::Parse(_))));
    }
}
