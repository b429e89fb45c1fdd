//! KRM document model.
//!
//! The function protocol exchanges a `ResourceList` whose items are
//! arbitrary Kubernetes-style YAML documents. This module provides the
//! borrowed accessors the resolver and processor use to inspect items in
//! place, and [`KubeDoc`], an owned builder for the documents the generator
//! emits. Both understand the orchestrator file annotations that record
//! which output file a document belongs to.

use crate::core::report::Diagnostic;
use crate::error::{ConfigError, Error, Result};
use serde::{Deserialize, Serialize};
use serde_yaml::{Mapping, Value};

/// Annotation recording the file a document is written back to.
pub const PATH_ANNOTATION: &str = "internal.config.kubernetes.io/path";
/// Annotation recording the document's position within its file.
pub const INDEX_ANNOTATION: &str = "internal.config.kubernetes.io/index";
/// Pre-v1 spelling of the path annotation, still honored on read.
pub const LEGACY_PATH_ANNOTATION: &str = "config.kubernetes.io/path";
/// Pre-v1 spelling of the index annotation, still written for old readers.
pub const LEGACY_INDEX_ANNOTATION: &str = "config.kubernetes.io/index";
/// Annotation selecting the sequence indentation style on write-out.
pub const SEQINDENT_ANNOTATION: &str = "internal.config.kubernetes.io/seqindent";

pub const RESOURCE_LIST_API_VERSION: &str = "config.kubernetes.io/v1";
pub const RESOURCE_LIST_KIND: &str = "ResourceList";

/// Looks up a nested string through a chain of mapping keys, returning
/// `None` when any step is missing or not the expected shape.
pub fn nested_str<'a>(value: &'a Value, path: &[&str]) -> Option<&'a str> {
    let mut current = value;
    for key in path {
        current = current.as_mapping()?.get(Value::from(*key))?;
    }
    current.as_str()
}

pub fn doc_api_version(value: &Value) -> &str {
    nested_str(value, &["apiVersion"]).unwrap_or_default()
}

pub fn doc_kind(value: &Value) -> &str {
    nested_str(value, &["kind"]).unwrap_or_default()
}

pub fn doc_name(value: &Value) -> &str {
    nested_str(value, &["metadata", "name"]).unwrap_or_default()
}

/// File path a document belongs to, honoring the legacy annotation spelling.
pub fn doc_path(value: &Value) -> &str {
    nested_str(value, &["metadata", "annotations", PATH_ANNOTATION])
        .or_else(|| nested_str(value, &["metadata", "annotations", LEGACY_PATH_ANNOTATION]))
        .unwrap_or_default()
}

/// An owned Kubernetes-style document under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct KubeDoc {
    root: Mapping,
}

impl KubeDoc {
    pub fn from_value(value: Value) -> Option<Self> {
        match value {
            Value::Mapping(root) => Some(Self { root }),
            _ => None,
        }
    }

    /// Parses a single YAML document.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not valid YAML or the top level is
    /// not a mapping.
    pub fn parse(text: &str) -> Result<Self> {
        let value: Value = serde_yaml::from_str(text)?;
        Self::from_value(value).ok_or(Error::Config(ConfigError::InvalidDocument("mapping")))
    }

    pub fn as_value(&self) -> Value {
        Value::Mapping(self.root.clone())
    }

    pub fn into_value(self) -> Value {
        Value::Mapping(self.root)
    }

    /// Serializes the document back to YAML.
    ///
    /// # Errors
    ///
    /// Returns an error when the tree cannot be represented as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(&self.root)?)
    }

    pub fn name(&self) -> &str {
        self.get_str(&["metadata", "name"]).unwrap_or_default()
    }

    pub fn path(&self) -> &str {
        self.get_str(&["metadata", "annotations", PATH_ANNOTATION])
            .or_else(|| self.get_str(&["metadata", "annotations", LEGACY_PATH_ANNOTATION]))
            .unwrap_or_default()
    }

    pub fn annotation(&self, key: &str) -> Option<&str> {
        self.get_str(&["metadata", "annotations", key])
    }

    pub fn set_name(&mut self, name: &str) {
        self.subtree(&["metadata"])
            .insert(Value::from("name"), Value::from(name));
    }

    pub fn set_annotation(&mut self, key: &str, value: &str) {
        self.subtree(&["metadata", "annotations"])
            .insert(Value::from(key), Value::from(value));
    }

    pub fn set_labels<'a, I>(&mut self, labels: I)
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let tree = self.subtree(&["metadata", "labels"]);
        for (key, value) in labels {
            tree.insert(Value::from(key), Value::from(value));
        }
    }

    /// Sets a top-level scalar field such as `type`.
    pub fn set_field(&mut self, key: &str, value: &str) {
        self.root.insert(Value::from(key), Value::from(value));
    }

    /// Inserts one entry into a top-level string map such as `data`.
    pub fn set_entry(&mut self, field: &str, key: &str, value: &str) {
        self.subtree(&[field])
            .insert(Value::from(key), Value::from(value));
    }

    /// Replaces a top-level field with a sequence of strings.
    pub fn set_string_sequence(&mut self, field: &str, values: &[String]) {
        let sequence: Vec<Value> = values.iter().map(|v| Value::from(v.as_str())).collect();
        self.root
            .insert(Value::from(field), Value::Sequence(sequence));
    }

    fn get_str(&self, path: &[&str]) -> Option<&str> {
        let (first, rest) = path.split_first()?;
        let mut current = self.root.get(Value::from(*first))?;
        for key in rest {
            current = current.as_mapping()?.get(Value::from(*key))?;
        }
        current.as_str()
    }

    /// Returns the mapping at the given path, creating intermediate
    /// mappings as needed. A non-mapping value found on the way is replaced.
    fn subtree(&mut self, path: &[&str]) -> &mut Mapping {
        let mut current = &mut self.root;
        for key in path {
            let entry = current
                .entry(Value::from(*key))
                .or_insert_with(|| Value::Mapping(Mapping::new()));
            if !entry.is_mapping() {
                *entry = Value::Mapping(Mapping::new());
            }
            match entry.as_mapping_mut() {
                Some(mapping) => current = mapping,
                None => unreachable!("entry was just set to a mapping"),
            }
        }
        current
    }
}

/// Stamps a group of documents with the file they belong to: the path
/// annotation plus per-document index annotations in both spellings.
pub fn set_filename(docs: &mut [KubeDoc], path: &str) {
    for (index, doc) in docs.iter_mut().enumerate() {
        let index = index.to_string();
        doc.set_annotation(PATH_ANNOTATION, path);
        doc.set_annotation(INDEX_ANNOTATION, &index);
        doc.set_annotation(LEGACY_INDEX_ANNOTATION, &index);
    }
}

/// The wire format of one function invocation: input documents, the
/// function configuration, and accumulated diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceList {
    #[serde(default)]
    pub api_version: String,
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub items: Vec<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_config: Option<Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<Diagnostic>,
}

impl ResourceList {
    /// Parses a ResourceList document from YAML text.
    ///
    /// # Errors
    ///
    /// Returns an error when the text is not valid YAML or the document
    /// kind is not `ResourceList`.
    pub fn parse(input: &str) -> Result<Self> {
        let list: ResourceList = serde_yaml::from_str(input)?;
        if list.kind != RESOURCE_LIST_KIND {
            return Err(Error::Config(ConfigError::InvalidDocument(
                RESOURCE_LIST_KIND,
            )));
        }
        Ok(list)
    }

    /// Serializes the list for write-out.
    ///
    /// # Errors
    ///
    /// Returns an error when the tree cannot be represented as YAML.
    pub fn to_yaml(&self) -> Result<String> {
        Ok(serde_yaml::to_string(self)?)
    }

    /// Inserts a generated document, replacing an existing item that has
    /// the same file path and name, otherwise appending.
    pub fn upsert(&mut self, doc: KubeDoc) {
        let replacement = doc.into_value();
        let position = self.items.iter().position(|item| {
            doc_path(item) == doc_path(&replacement) && doc_name(item) == doc_name(&replacement)
        });

        match position {
            Some(index) => self.items[index] = replacement,
            None => self.items.push(replacement),
        }
    }

    /// Upserts every document from a group of generated files.
    pub fn upsert_all<I>(&mut self, docs: I)
    where
        I: IntoIterator<Item = KubeDoc>,
    {
        for doc in docs {
            self.upsert(doc);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::report::Severity;

    const SECRET_YAML: &str = r"
apiVersion: v1
kind: Secret
metadata:
  name: user-secrets
  annotations:
    internal.config.kubernetes.io/path: secrets.yaml
type: Opaque
data:
  test: aGVsbG8=
";

    #[test]
    fn test_nested_str_walks_mappings() {
        let value: Value = serde_yaml::from_str(SECRET_YAML).unwrap();

        assert_eq!(nested_str(&value, &["data", "test"]), Some("aGVsbG8="));
        assert_eq!(nested_str(&value, &["data", "missing"]), None);
        assert_eq!(nested_str(&value, &["metadata", "name", "deep"]), None);
        assert_eq!(doc_kind(&value), "Secret");
        assert_eq!(doc_name(&value), "user-secrets");
    }

    #[test]
    fn test_doc_path_honors_legacy_annotation() {
        let yaml = r"
apiVersion: v1
kind: Secret
metadata:
  name: s
  annotations:
    config.kubernetes.io/path: generated/secrets.test.enc.yaml
";
        let value: Value = serde_yaml::from_str(yaml).unwrap();

        assert_eq!(doc_path(&value), "generated/secrets.test.enc.yaml");
    }

    #[test]
    fn test_kube_doc_builder() {
        let mut doc = KubeDoc::parse("apiVersion: v1\nkind: Secret\ndata: {}\n").unwrap();
        doc.set_name("user-secrets");
        doc.set_field("type", "Opaque");
        doc.set_entry("data", "test", "aGVsbG8=");
        doc.set_annotation("kustomize.config.k8s.io/behavior", "merge");

        assert_eq!(doc.name(), "user-secrets");
        let yaml = doc.to_yaml().unwrap();
        assert!(yaml.contains("test: aGVsbG8="));
        assert!(yaml.contains("kustomize.config.k8s.io/behavior: merge"));
    }

    #[test]
    fn test_kube_doc_rejects_non_mapping() {
        assert!(KubeDoc::parse("- just\n- a\n- list\n").is_err());
    }

    #[test]
    fn test_set_filename_indexes_documents() {
        let mut docs = vec![
            KubeDoc::parse("apiVersion: v1\nkind: Secret\n").unwrap(),
            KubeDoc::parse("apiVersion: v1\nkind: Secret\n").unwrap(),
        ];
        set_filename(&mut docs, "generated/ksops-generator.yaml");

        assert_eq!(docs[0].path(), "generated/ksops-generator.yaml");
        assert_eq!(docs[0].annotation(INDEX_ANNOTATION), Some("0"));
        assert_eq!(docs[1].annotation(INDEX_ANNOTATION), Some("1"));
        assert_eq!(docs[1].annotation(LEGACY_INDEX_ANNOTATION), Some("1"));
    }

    #[test]
    fn test_resource_list_parse_rejects_other_kinds() {
        let err = ResourceList::parse("apiVersion: v1\nkind: Pod\n").unwrap_err();
        assert!(err.to_string().contains("ResourceList"));
    }

    #[test]
    fn test_resource_list_roundtrip() {
        let yaml = r"
apiVersion: config.kubernetes.io/v1
kind: ResourceList
functionConfig:
  apiVersion: fn.kpt.dev/v1alpha1
  kind: UpdateKSopsSecrets
  metadata:
    name: user-secrets
items:
  - apiVersion: v1
    kind: Secret
    metadata:
      name: unencrypted-secrets
";
        let mut list = ResourceList::parse(yaml).unwrap();
        assert_eq!(list.items.len(), 1);
        assert!(list.function_config.is_some());

        list.results.push(Diagnostic {
            message: "Secret key 'test' encrypted".to_string(),
            severity: Severity::Info,
        });
        let out = list.to_yaml().unwrap();
        assert!(out.contains("severity: info"));
    }

    #[test]
    fn test_upsert_replaces_matching_path_and_name() {
        let yaml = r"
apiVersion: config.kubernetes.io/v1
kind: ResourceList
items:
  - apiVersion: v1
    kind: Secret
    metadata:
      name: user-secrets
      annotations:
        internal.config.kubernetes.io/path: secrets.yaml
    data:
      old: dmFsdWU=
";
        let mut list = ResourceList::parse(yaml).unwrap();

        let mut replacement = KubeDoc::parse("apiVersion: v1\nkind: Secret\ndata: {}\n").unwrap();
        replacement.set_name("user-secrets");
        replacement.set_annotation(PATH_ANNOTATION, "secrets.yaml");
        list.upsert(replacement);

        assert_eq!(list.items.len(), 1);
        assert_eq!(nested_str(&list.items[0], &["data", "old"]), None);

        let mut appended = KubeDoc::parse("apiVersion: v1\nkind: Secret\n").unwrap();
        appended.set_name("user-secrets");
        appended.set_annotation(PATH_ANNOTATION, "generated/secrets.test.enc.yaml");
        list.upsert(appended);

        assert_eq!(list.items.len(), 2);
    }
}
