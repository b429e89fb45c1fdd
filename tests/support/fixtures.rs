//! ResourceList fixtures and constants.

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_yaml::{Mapping, Value};
use warren::core::document::{doc_kind, doc_path, ResourceList};

/// A valid age public key for recipient fixtures.
pub const AGE_RECIPIENT: &str =
    "age1x7pzjx4r05aeduggjxy6fmx8c5sp49gjgewzee025tv3hyn0gq2sru55qy";

/// A PGP fingerprint resolved through a key server.
pub const PGP_KEY_SERVER: &str = "6DBFDBA2ABED52FDA0ABF9EA8AD0C521B11E224A";

/// A PGP fingerprint whose public key is imported from a referenced secret.
pub const PGP_REFERENCED: &str = "9A3C4E21D7F05B68C1D2A44EF10B83D55C937A02";

/// Secret and entry holding the armored key for [`PGP_REFERENCED`].
pub const PGP_KEYS_SECRET: &str = "gpg-publickeys";
pub const PGP_KEYS_ENTRY: &str = "9A3C4E21.gpg";

/// Armored public key material stored under [`PGP_KEYS_ENTRY`].
pub const ARMORED_PUBLIC_KEY: &str = "\
-----BEGIN PGP PUBLIC KEY BLOCK-----

mQENBGQtest1AQAAno2YXJyZW4tdGVzdC1rZXktbWF0ZXJpYWw=
=tEsT
-----END PGP PUBLIC KEY BLOCK-----
";

/// Function configuration with an age recipient and the standard
/// `unencrypted-secrets` reference.
pub fn age_config(items: &[&str]) -> String {
    let mut yaml = String::from(
        "\
apiVersion: fn.kpt.dev/v1alpha1
kind: UpdateKSopsSecrets
metadata:
  name: user-secrets
secret:
  type: Opaque
  references:
    - unencrypted-secrets
  items:
",
    );
    for item in items {
        yaml.push_str(&format!("    - {item}\n"));
    }
    yaml.push_str(&format!(
        "recipients:\n  - type: age\n    recipient: {AGE_RECIPIENT}\n"
    ));
    yaml
}

/// Function configuration with age plus both kinds of PGP recipient.
pub fn mixed_recipients_config(items: &[&str]) -> String {
    let mut yaml = age_config(items);
    yaml.push_str(&format!(
        "  - type: pgp
    recipient: {PGP_KEY_SERVER}
  - type: pgp
    recipient: {PGP_REFERENCED}
    publicKeySecretReference:
      name: {PGP_KEYS_SECRET}
      key: {PGP_KEYS_ENTRY}
",
    ));
    yaml
}

/// A plaintext source secret with `stringData` entries.
pub fn string_data_secret(name: &str, entries: &[(&str, &str)]) -> String {
    let mut yaml = format!(
        "apiVersion: v1\nkind: Secret\nmetadata:\n  name: {name}\ntype: Opaque\nstringData:\n"
    );
    for (key, value) in entries {
        yaml.push_str(&format!("  {key}: '{value}'\n"));
    }
    yaml
}

/// A source secret with base64 `data` entries (values encoded here).
pub fn data_secret(name: &str, entries: &[(&str, &str)]) -> String {
    let mut yaml =
        format!("apiVersion: v1\nkind: Secret\nmetadata:\n  name: {name}\ntype: Opaque\ndata:\n");
    for (key, value) in entries {
        yaml.push_str(&format!("  {key}: {}\n", BASE64.encode(value)));
    }
    yaml
}

/// A previously generated encrypted secret at its generated path.
pub fn generated_enc_secret(name: &str, key: &str, envelope: &str) -> String {
    format!(
        "\
apiVersion: v1
kind: Secret
metadata:
  name: {name}
  annotations:
    kustomize.config.k8s.io/behavior: merge
    internal.config.kubernetes.io/path: generated/secrets.{key}.enc.yaml
type: Opaque
data:
  {key}: {envelope}
"
    )
}

/// A previously written fingerprint record at its generated path.
pub fn fingerprint_record_doc(name: &str, key: &str, record: &str) -> String {
    format!(
        "\
apiVersion: config.kubernetes.io/v1alpha1
kind: SecretFingerprint
metadata:
  name: {name}
  annotations:
    internal.config.kubernetes.io/path: generated/secrets.{key}.fp.yaml
type: Opaque
data:
  {key}: '{record}'
"
    )
}

/// Assembles a ResourceList from a function configuration and item docs.
pub fn resource_list(function_config: &str, items: &[&str]) -> String {
    let config: Value = serde_yaml::from_str(function_config).expect("fixture functionConfig");
    let docs: Vec<Value> = items
        .iter()
        .map(|item| serde_yaml::from_str(item).expect("fixture item"))
        .collect();

    let mut list = Mapping::new();
    list.insert(
        Value::from("apiVersion"),
        Value::from("config.kubernetes.io/v1"),
    );
    list.insert(Value::from("kind"), Value::from("ResourceList"));
    list.insert(Value::from("items"), Value::Sequence(docs));
    list.insert(Value::from("functionConfig"), config);
    serde_yaml::to_string(&Value::Mapping(list)).expect("fixture serializes")
}

/// First output item with the given file path and kind.
pub fn find_item<'a>(list: &'a ResourceList, path: &str, kind: &str) -> Option<&'a Value> {
    list.items
        .iter()
        .find(|item| doc_path(item) == path && doc_kind(item) == kind)
}

/// Every output item with the given file path, in list order.
pub fn find_items<'a>(list: &'a ResourceList, path: &str) -> Vec<&'a Value> {
    list.items
        .iter()
        .filter(|item| doc_path(item) == path)
        .collect()
}

/// All result messages, in order.
pub fn result_messages(list: &ResourceList) -> Vec<String> {
    list.results.iter().map(|d| d.message.clone()).collect()
}

/// Whether any result message contains the given fragment.
pub fn has_message(list: &ResourceList, fragment: &str) -> bool {
    list.results.iter().any(|d| d.message.contains(fragment))
}
