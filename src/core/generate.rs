//! Manifest generation and the per-key encryption decision.
//!
//! One invocation produces four groups of documents: the base secret
//! (empty, merged over by the encrypted files), the kustomization wiring,
//! one ksops generator entry per key, and the encrypted secret plus
//! fingerprint record files. The last group is where the work happens:
//! every declared key walks a resolve → fingerprint-check → encrypt
//! decision, and each key's outcome is isolated — a failure becomes an
//! error diagnostic for that key while the rest of the batch proceeds.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use tracing::debug;

use crate::core::config::UpdateSecrets;
use crate::core::delegate::{Encrypter, KeyManager};
use crate::core::document::{set_filename, KubeDoc, SEQINDENT_ANNOTATION};
use crate::core::fingerprint::FingerprintInput;
use crate::core::recipient::classify;
use crate::core::report::{Diagnostic, Report};
use crate::core::resolver::{ResolvedValue, SecretCatalog};
use crate::error::{ResolveError, Result};

pub const FILE_BASE_SECRETS: &str = "secrets.yaml";
pub const FILE_KUSTOMIZATION: &str = "kustomization.yaml";
pub const FILE_KSOPS_GENERATOR: &str = "generated/ksops-generator.yaml";
pub const FILE_ENCRYPTED_BASE: &str = "generated/secrets";

const BEHAVIOR_ANNOTATION: &str = "kustomize.config.k8s.io/behavior";
const WIDE_SEQ_INDENT: &str = "wide";

/// Scalar shape sops gives encrypted fields. A resolved value that already
/// matches it is refused as a source (it would be double-encrypted).
const ENVELOPE_PREFIX: &str = "ENC[AES256_GCM,data:";
const ENVELOPE_SUFFIX: &str = ",type:str]";

/// Annotation namespaces that are orchestrator bookkeeping, never copied
/// from the function configuration onto generated documents.
const INTERNAL_ANNOTATION_PREFIX: &str = "internal.config.kubernetes.io/";
const BOOKKEEPING_ANNOTATION_PREFIX: &str = "config.kubernetes.io/";

const SECRET_TEMPLATE: &str = "\
apiVersion: v1
kind: Secret
metadata:
  name: secret
type: Opaque
data: {}
";

const FINGERPRINT_TEMPLATE: &str = "\
apiVersion: config.kubernetes.io/v1alpha1
kind: SecretFingerprint
metadata:
  name: secret
type: Opaque
data: {}
";

const KUSTOMIZATION_TEMPLATE: &str = "\
apiVersion: kustomize.config.k8s.io/v1beta1
kind: Kustomization
resources:
  - secrets.yaml
generators:
  - generated/ksops-generator.yaml
";

const KSOPS_GENERATOR_TEMPLATE: &str = "\
apiVersion: viaduct.ai/v1
kind: ksops
metadata:
  name: generator
files: []
";

/// Builds the empty base secret the encrypted files merge over.
///
/// User annotations and labels from the configuration metadata carry over;
/// bookkeeping annotations do not.
pub fn base_secret(config: &UpdateSecrets) -> (Vec<KubeDoc>, Report) {
    let mut report = Report::new();

    let mut doc = match KubeDoc::parse(SECRET_TEMPLATE) {
        Ok(doc) => doc,
        Err(err) => {
            report.push(Diagnostic::error(format!(
                "Base secret '{}' generation error, {err}",
                config.name()
            )));
            return (Vec::new(), report);
        }
    };

    doc.set_name(config.name());
    doc.set_field("type", config.secret_type());
    for (key, value) in &config.metadata.annotations {
        if key.starts_with(INTERNAL_ANNOTATION_PREFIX)
            || key.starts_with(BOOKKEEPING_ANNOTATION_PREFIX)
        {
            continue;
        }
        doc.set_annotation(key, value);
    }
    doc.set_annotation(BEHAVIOR_ANNOTATION, "merge");
    if !config.metadata.labels.is_empty() {
        doc.set_labels(
            config
                .metadata
                .labels
                .iter()
                .map(|(k, v)| (k.as_str(), v.as_str())),
        );
    }

    report.push(Diagnostic::info(format!(
        "Base secret '{}' generated",
        config.name()
    )));
    (vec![doc], report)
}

/// Builds the kustomization that wires the base secret and the generator.
pub fn kustomization() -> (Vec<KubeDoc>, Report) {
    let mut report = Report::new();

    match KubeDoc::parse(KUSTOMIZATION_TEMPLATE) {
        Ok(doc) => {
            report.push(Diagnostic::info("Kustomization generated"));
            (vec![doc], report)
        }
        Err(err) => {
            report.push(Diagnostic::error(format!(
                "Kustomization generation error, {err}"
            )));
            (Vec::new(), report)
        }
    }
}

/// Builds one ksops generator entry per declared key, in sorted key order.
pub fn ksops_generators(config: &UpdateSecrets) -> (Vec<KubeDoc>, Report) {
    let mut docs = Vec::new();
    let mut report = Report::new();

    for key in config.secret_items() {
        let mut doc = match KubeDoc::parse(KSOPS_GENERATOR_TEMPLATE) {
            Ok(doc) => doc,
            Err(err) => {
                report.push(Diagnostic::error(format!(
                    "KSOPS Generator manifest generation error, {err}"
                )));
                return (Vec::new(), report);
            }
        };

        let normalized = normalized_key_name(&key);
        doc.set_name(&format!("ksops-generator-{}-{}", config.name(), normalized));
        doc.set_string_sequence(
            "files",
            &[format!("{FILE_ENCRYPTED_BASE}.{normalized}.enc.yaml")],
        );
        docs.push(doc);

        report.push(Diagnostic::info(format!(
            "KSOPS Generator key '{key}' generated"
        )));
    }

    (docs, report)
}

/// Key names become file name components: dots collapse to dashes, edge
/// dashes are trimmed, the rest is lowercased.
pub fn normalized_key_name(key: &str) -> String {
    key.replace('.', "-").trim_matches('-').to_lowercase()
}

fn looks_encrypted(value: &str) -> bool {
    value.starts_with(ENVELOPE_PREFIX) && value.ends_with(ENVELOPE_SUFFIX)
}

/// Per-key encryption pipeline over the catalog, behind explicit delegates.
pub struct Generator<'a> {
    encrypter: &'a dyn Encrypter,
    keys: &'a dyn KeyManager,
}

impl<'a> Generator<'a> {
    pub fn new(encrypter: &'a dyn Encrypter, keys: &'a dyn KeyManager) -> Self {
        Self { encrypter, keys }
    }

    /// Prepares the keyring for every PGP recipient before encryption.
    ///
    /// Recipients with a complete public key reference are imported from
    /// the resolved secret; a failure there (missing entry, rejected key)
    /// is a warning for that recipient only. The rest are fetched from a
    /// key server, and the first fetch failure is an error that ends the
    /// pass — without the key, every subsequent encryption would fail.
    pub fn preload_keys(&self, config: &UpdateSecrets, catalog: &SecretCatalog<'_>) -> Report {
        let classified = classify(&config.recipients);
        let mut report = Report::new();

        for recipient in &classified.preload {
            let reference = match recipient.preload_reference() {
                Some(reference) => reference,
                None => continue,
            };

            match self.public_key_data(catalog, &reference.name, &reference.key) {
                Ok(data) => match self.keys.import_key(&data) {
                    Ok(_) => report.push(Diagnostic::info(format!(
                        "PGP/GPG public key {} imported",
                        recipient.recipient
                    ))),
                    Err(err) => report.push(Diagnostic::warning(err.to_string())),
                },
                Err(err) => report.push(Diagnostic::warning(err.to_string())),
            }
        }

        for recipient in &classified.key_server {
            match self.keys.receive_keys(&[recipient.recipient.as_str()]) {
                Ok(_) => report.push(Diagnostic::info(format!(
                    "PGP/GPG public key {} received from key server",
                    recipient.recipient
                ))),
                Err(err) => {
                    report.push(Diagnostic::error(err.to_string()));
                    return report;
                }
            }
        }

        report
    }

    /// Walks every declared key through resolve → fingerprint → encrypt,
    /// returning the encrypted secret and fingerprint documents of the
    /// keys that needed (re-)encryption.
    pub fn encrypted_files(
        &self,
        config: &UpdateSecrets,
        catalog: &SecretCatalog<'_>,
    ) -> (Vec<KubeDoc>, Report) {
        let mut docs = Vec::new();
        let mut report = Report::new();

        for key in config.secret_items() {
            if let Some((encrypted, fingerprint)) =
                self.process_key(config, catalog, &key, &mut report)
            {
                docs.push(encrypted);
                docs.push(fingerprint);
            }
        }

        (docs, report)
    }

    /// One key's decision walk. Produces the document pair on the encrypt
    /// path, `None` on every skip or failure.
    fn process_key(
        &self,
        config: &UpdateSecrets,
        catalog: &SecretCatalog<'_>,
        key: &str,
        report: &mut Report,
    ) -> Option<(KubeDoc, KubeDoc)> {
        let resolved = match catalog.get(key) {
            Ok(resolved) => resolved,
            Err(ResolveError::NotFound(_)) => {
                report.push(Diagnostic::warning(format!(
                    "Secret '{key}' not found in the secrets references, encryption skipped"
                )));
                return None;
            }
            Err(err) => {
                report.push(Diagnostic::warning(format!(
                    "Secret '{key}' get failure: {err}, encryption skipped"
                )));
                return None;
            }
        };

        if looks_encrypted(&resolved.value) {
            report.push(Diagnostic::warning(format!(
                "Secret '{key}' value is already encrypted, encryption skipped"
            )));
            return None;
        }

        let input = FingerprintInput {
            secret_name: config.name(),
            secret_type: config.secret_type(),
            key,
            value: &resolved.value,
            b64encoded: resolved.b64encoded,
            recipients: &config.recipients,
        };

        let record = catalog.fingerprint_record(config.name(), key);
        match input.try_open(&record) {
            Ok(true) => {
                report.push(Diagnostic::warning(format!(
                    "Secret '{key}' has been encrypted and not changed, encryption skipped"
                )));
                return None;
            }
            Ok(false) => {}
            // fail open: a broken record must trigger re-encryption, not
            // hide a change
            Err(err) => report.push(Diagnostic::warning(format!(
                "Secret '{key}' fingerprint record error: {err}, re-encrypting"
            ))),
        }

        debug!(key, "encrypting");

        let mut encrypted = match self.encrypted_secret_doc(config, key, &resolved) {
            Ok(doc) => doc,
            Err(err) => {
                report.push(Diagnostic::error(format!(
                    "Secret '{key}' encryption error, {err}"
                )));
                return None;
            }
        };

        let mut fingerprint = match self.fingerprint_doc(config, input) {
            Ok(doc) => doc,
            Err(err) => {
                report.push(Diagnostic::error(format!(
                    "Secret '{key}' fingerprint seal error, {err}"
                )));
                return None;
            }
        };

        let normalized = normalized_key_name(key);
        let encrypted_file = format!("{FILE_ENCRYPTED_BASE}.{normalized}.enc.yaml");
        let fingerprint_file = format!("{FILE_ENCRYPTED_BASE}.{normalized}.fp.yaml");
        set_filename(std::slice::from_mut(&mut encrypted), &encrypted_file);
        set_filename(std::slice::from_mut(&mut fingerprint), &fingerprint_file);

        report.push(Diagnostic::info(format!(
            "Secret key '{key}' => {encrypted_file} encrypted"
        )));
        report.push(Diagnostic::info(format!(
            "SecretFingerprint key '{key}' => {fingerprint_file} updated"
        )));

        Some((encrypted, fingerprint))
    }

    /// Builds the plaintext single-key secret and passes it through the
    /// encryption delegate.
    fn encrypted_secret_doc(
        &self,
        config: &UpdateSecrets,
        key: &str,
        resolved: &ResolvedValue,
    ) -> Result<KubeDoc> {
        let mut plain = KubeDoc::parse(SECRET_TEMPLATE)?;
        plain.set_name(config.name());
        plain.set_field("type", config.secret_type());
        plain.set_annotation(BEHAVIOR_ANNOTATION, "merge");

        let data_value = if resolved.b64encoded {
            resolved.value.clone()
        } else {
            BASE64.encode(&resolved.value)
        };
        plain.set_entry("data", key, &data_value);

        let output = self
            .encrypter
            .encrypt(&plain.to_yaml()?, &config.recipients)?;

        let mut doc = KubeDoc::parse(&output)?;
        doc.set_annotation(SEQINDENT_ANNOTATION, WIDE_SEQ_INDENT);
        Ok(doc)
    }

    /// Seals a fresh fingerprint record and wraps it in its document.
    fn fingerprint_doc(&self, config: &UpdateSecrets, input: FingerprintInput<'_>) -> Result<KubeDoc> {
        let record = input.seal()?;

        let mut doc = KubeDoc::parse(FINGERPRINT_TEMPLATE)?;
        doc.set_name(config.name());
        doc.set_field("type", config.secret_type());
        doc.set_entry("data", input.key, &record);
        doc.set_annotation(SEQINDENT_ANNOTATION, WIDE_SEQ_INDENT);
        Ok(doc)
    }

    fn public_key_data(
        &self,
        catalog: &SecretCatalog<'_>,
        name: &str,
        key: &str,
    ) -> Result<String> {
        let resolved = catalog.get_exact(Some(name), key)?;

        if resolved.b64encoded {
            let decoded = BASE64
                .decode(&resolved.value)
                .map_err(|source| ResolveError::Decode {
                    key: key.to_string(),
                    name: name.to_string(),
                    source,
                })?;
            let armored = String::from_utf8(decoded).map_err(|_| ResolveError::NotUtf8 {
                key: key.to_string(),
                name: name.to_string(),
            })?;
            Ok(armored)
        } else {
            Ok(resolved.value)
        }
    }
}
