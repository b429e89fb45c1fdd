//! In-memory delegate fakes.

use std::cell::RefCell;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde_yaml::{Mapping, Value};

use warren::core::delegate::{Encrypter, KeyManager};
use warren::core::recipient::{Recipient, RecipientScheme};
use warren::error::{DelegateError, Result};

/// [`Encrypter`] producing sops-shaped output without the binary.
///
/// Every `data` / `stringData` scalar is wrapped in the sops envelope
/// and a `sops` metadata block naming the recipients is appended.
#[derive(Default)]
pub struct FakeEncrypter {
    fail_with: Option<String>,
    calls: RefCell<usize>,
}

impl FakeEncrypter {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake whose every call fails with the given backend message.
    pub fn failing(message: &str) -> Self {
        Self {
            fail_with: Some(message.to_string()),
            calls: RefCell::new(0),
        }
    }

    pub fn calls(&self) -> usize {
        *self.calls.borrow()
    }
}

impl Encrypter for FakeEncrypter {
    fn encrypt(&self, input: &str, recipients: &[Recipient]) -> Result<String> {
        *self.calls.borrow_mut() += 1;
        if let Some(message) = &self.fail_with {
            return Err(DelegateError::Encrypt(message.clone()).into());
        }

        let mut doc: Mapping = serde_yaml::from_str(input).map_err(warren::error::Error::Yaml)?;
        for field in ["data", "stringData"] {
            if let Some(Value::Mapping(entries)) = doc.get_mut(Value::from(field)) {
                for (_, value) in entries.iter_mut() {
                    if let Some(plain) = value.as_str() {
                        *value = Value::from(format!(
                            "ENC[AES256_GCM,data:{},type:str]",
                            BASE64.encode(plain)
                        ));
                    }
                }
            }
        }
        doc.insert(Value::from("sops"), sops_metadata(recipients));

        serde_yaml::to_string(&doc).map_err(warren::error::Error::Yaml)
    }
}

fn sops_metadata(recipients: &[Recipient]) -> Value {
    let mut age = Vec::new();
    let mut pgp = Vec::new();
    for recipient in recipients {
        match recipient.scheme {
            RecipientScheme::Age => {
                let mut entry = Mapping::new();
                entry.insert(
                    Value::from("recipient"),
                    Value::from(recipient.recipient.as_str()),
                );
                entry.insert(
                    Value::from("enc"),
                    Value::from("-----BEGIN AGE ENCRYPTED FILE-----"),
                );
                age.push(Value::Mapping(entry));
            }
            RecipientScheme::Pgp => {
                let mut entry = Mapping::new();
                entry.insert(Value::from("fp"), Value::from(recipient.recipient.as_str()));
                pgp.push(Value::Mapping(entry));
            }
        }
    }

    let mut sops = Mapping::new();
    if !age.is_empty() {
        sops.insert(Value::from("age"), Value::Sequence(age));
    }
    if !pgp.is_empty() {
        sops.insert(Value::from("pgp"), Value::Sequence(pgp));
    }
    sops.insert(
        Value::from("encrypted_regex"),
        Value::from("^(data|stringData)$"),
    );
    sops.insert(Value::from("version"), Value::from("3.8.1"));
    Value::Mapping(sops)
}

/// [`KeyManager`] recording keyring operations instead of running gpg.
#[derive(Default)]
pub struct FakeKeyManager {
    fail_receive: bool,
    fail_import: bool,
    received: RefCell<Vec<String>>,
    imported: RefCell<Vec<String>>,
}

impl FakeKeyManager {
    pub fn new() -> Self {
        Self::default()
    }

    /// A fake whose key server fetches fail.
    pub fn failing_receive() -> Self {
        Self {
            fail_receive: true,
            ..Self::default()
        }
    }

    /// A fake that rejects imported key material.
    pub fn failing_import() -> Self {
        Self {
            fail_import: true,
            ..Self::default()
        }
    }

    /// Fingerprints fetched from the key server, in call order.
    pub fn received(&self) -> Vec<String> {
        self.received.borrow().clone()
    }

    /// Key material handed to import, in call order.
    pub fn imported(&self) -> Vec<String> {
        self.imported.borrow().clone()
    }
}

impl KeyManager for FakeKeyManager {
    fn receive_keys(&self, fingerprints: &[&str]) -> Result<String> {
        if self.fail_receive {
            return Err(
                DelegateError::KeyReceive("keyserver receive failed: no route to host".into())
                    .into(),
            );
        }
        self.received
            .borrow_mut()
            .extend(fingerprints.iter().map(|f| f.to_string()));
        Ok(format!(
            "gpg: Total number processed: {}",
            fingerprints.len()
        ))
    }

    fn import_key(&self, data: &str) -> Result<String> {
        if self.fail_import {
            return Err(DelegateError::KeyImport("no valid OpenPGP data found".into()).into());
        }
        self.imported.borrow_mut().push(data.to_string());
        Ok("gpg: key imported".to_string())
    }
}
