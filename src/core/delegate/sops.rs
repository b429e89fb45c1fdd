//! sops encryption backend.
//!
//! Shells out to the `sops` CLI, feeding the plaintext document on stdin
//! and reading the encrypted document from stdout. Only the `data` and
//! `stringData` fields are encrypted so the document keeps its Kubernetes
//! shape; recipients are passed as comma-joined `--age` and `--pgp`
//! options.

use std::io::Write;
use std::process::{Command, Stdio};
use tracing::trace;

use super::Encrypter;
use crate::core::recipient::{Recipient, RecipientScheme};
use crate::error::{DelegateError, Result};

const SOPS_BIN: &str = "sops";

/// Production [`Encrypter`] backed by the sops CLI.
pub struct SopsCli;

impl SopsCli {
    fn check_sops() -> Result<()> {
        which::which(SOPS_BIN).map_err(|_| DelegateError::MissingBinary {
            tool: SOPS_BIN,
            hint: "install sops from https://github.com/getsops/sops",
        })?;
        Ok(())
    }

    /// Recipient options grouped by scheme, one comma-joined option each.
    fn recipient_options(recipients: &[Recipient]) -> Vec<String> {
        let mut age: Vec<&str> = Vec::new();
        let mut pgp: Vec<&str> = Vec::new();

        for recipient in recipients {
            match recipient.scheme {
                RecipientScheme::Age => age.push(&recipient.recipient),
                RecipientScheme::Pgp => pgp.push(&recipient.recipient),
            }
        }

        let mut options = Vec::new();
        if !age.is_empty() {
            options.push(format!("--age={}", age.join(",")));
        }
        if !pgp.is_empty() {
            options.push(format!("--pgp={}", pgp.join(",")));
        }
        options
    }
}

impl Encrypter for SopsCli {
    fn encrypt(&self, input: &str, recipients: &[Recipient]) -> Result<String> {
        trace!(
            recipients = recipients.len(),
            input_len = input.len(),
            "encrypting with sops"
        );

        Self::check_sops()?;

        let mut cmd = Command::new(SOPS_BIN);
        cmd.args([
            "--input-type=yaml",
            "--output-type=yaml",
            "--encrypted-regex=^(data|stringData)$",
            "--encrypt",
        ]);
        cmd.args(Self::recipient_options(recipients));
        cmd.arg("/dev/stdin");

        cmd.stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());

        let mut child = cmd.spawn().map_err(|source| DelegateError::Spawn {
            tool: SOPS_BIN,
            source,
        })?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(input.as_bytes())
                .map_err(|source| DelegateError::Spawn {
                    tool: SOPS_BIN,
                    source,
                })?;
        }

        let output = child
            .wait_with_output()
            .map_err(|source| DelegateError::Spawn {
                tool: SOPS_BIN,
                source,
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DelegateError::Encrypt(format!(
                "{}: {}",
                output.status,
                stderr.trim()
            ))
            .into());
        }

        let encrypted = String::from_utf8(output.stdout)
            .map_err(|_| DelegateError::Output { tool: SOPS_BIN })?;

        trace!(output_len = encrypted.len(), "encrypted with sops");
        Ok(encrypted)
    }
}
