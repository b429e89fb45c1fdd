//! GnuPG key management backend.
//!
//! Prepares the local keyring before sops runs: `--receive-keys` fetches
//! public keys from a key server by fingerprint, `--import` loads armored
//! key material resolved from a referenced secret. gpg writes its
//! diagnostics to stderr even on success, so both streams are combined
//! into the returned output.

use std::io::Write;
use std::process::{Command, Stdio};
use tracing::trace;

use super::KeyManager;
use crate::error::{DelegateError, Result};

const GPG_BIN: &str = "gpg";

/// Production [`KeyManager`] backed by the gpg CLI.
pub struct GpgCli;

impl GpgCli {
    fn check_gpg() -> Result<()> {
        which::which(GPG_BIN).map_err(|_| DelegateError::MissingBinary {
            tool: GPG_BIN,
            hint: "install GnuPG from https://gnupg.org/download/",
        })?;
        Ok(())
    }

    fn combined_output(output: &std::process::Output) -> String {
        let mut combined = String::from_utf8_lossy(&output.stdout).into_owned();
        combined.push_str(&String::from_utf8_lossy(&output.stderr));
        combined
    }
}

impl KeyManager for GpgCli {
    fn receive_keys(&self, fingerprints: &[&str]) -> Result<String> {
        trace!(keys = fingerprints.len(), "receiving keys from key server");

        Self::check_gpg()?;

        let output = Command::new(GPG_BIN)
            .arg("--receive-keys")
            .args(fingerprints)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| DelegateError::Spawn {
                tool: GPG_BIN,
                source,
            })?;

        let combined = Self::combined_output(&output);
        if !output.status.success() {
            return Err(DelegateError::KeyReceive(combined.trim().to_string()).into());
        }
        Ok(combined)
    }

    fn import_key(&self, data: &str) -> Result<String> {
        trace!(data_len = data.len(), "importing key material");

        Self::check_gpg()?;

        let mut child = Command::new(GPG_BIN)
            .arg("--import")
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|source| DelegateError::Spawn {
                tool: GPG_BIN,
                source,
            })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(data.as_bytes())
                .map_err(|source| DelegateError::Spawn {
                    tool: GPG_BIN,
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|source| DelegateError::Spawn {
                tool: GPG_BIN,
                source,
            })?;

        let combined = Self::combined_output(&output);
        if !output.status.success() {
            return Err(DelegateError::KeyImport(combined.trim().to_string()).into());
        }
        Ok(combined)
    }
}
