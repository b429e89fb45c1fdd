//! The ResourceList pipeline.
//!
//! [`run`] is the whole program behind the wire protocol: parse the
//! function configuration out of the list, generate every manifest group,
//! and upsert the documents back into the list items. The input `results`
//! field is replaced by this run's report — stale diagnostics from a
//! previous invocation never survive.

use crate::core::config::UpdateSecrets;
use crate::core::delegate::{Encrypter, KeyManager};
use crate::core::document::{set_filename, ResourceList};
use crate::core::generate::{
    base_secret, ksops_generators, kustomization, Generator, FILE_BASE_SECRETS,
    FILE_KSOPS_GENERATOR, FILE_KUSTOMIZATION,
};
use crate::core::report::{Diagnostic, Report};
use crate::core::resolver::SecretCatalog;
use crate::error::{ConfigError, Result};

/// Runs one invocation over a parsed ResourceList.
///
/// A configuration failure aborts before anything is generated. A key
/// preload failure aborts before any document is written back — encrypting
/// against a keyring that is missing a recipient would produce files only
/// some recipients can open. Everything after that is per-key: the report
/// carries each outcome and the list is updated with whatever succeeded.
pub fn run(list: &mut ResourceList, encrypter: &dyn Encrypter, keys: &dyn KeyManager) -> Report {
    let config = match parse_config(list) {
        Ok(config) => config,
        Err(err) => {
            let report = [Diagnostic::error(err.to_string())].into_iter().collect();
            return publish(list, report);
        }
    };

    let mut report = Report::new();

    let (mut base, base_report) = base_secret(&config);
    set_filename(&mut base, FILE_BASE_SECRETS);
    report.extend(base_report);

    let (mut manifest, manifest_report) = kustomization();
    set_filename(&mut manifest, FILE_KUSTOMIZATION);
    report.extend(manifest_report);

    let (mut generators, generator_report) = ksops_generators(&config);
    set_filename(&mut generators, FILE_KSOPS_GENERATOR);
    report.extend(generator_report);

    let generator = Generator::new(encrypter, keys);
    let encrypted = {
        let catalog = SecretCatalog::new(&list.items, &config);

        let preload = generator.preload_keys(&config, &catalog);
        let fatal = preload.has_errors();
        report.extend(preload);
        if fatal {
            None
        } else {
            let (docs, encrypt_report) = generator.encrypted_files(&config, &catalog);
            report.extend(encrypt_report);
            Some(docs)
        }
    };

    let encrypted = match encrypted {
        Some(docs) => docs,
        None => return publish(list, report),
    };

    list.upsert_all(manifest);
    list.upsert_all(base);
    list.upsert_all(generators);
    list.upsert_all(encrypted);

    publish(list, report)
}

fn parse_config(list: &ResourceList) -> Result<UpdateSecrets> {
    match &list.function_config {
        Some(value) => Ok(UpdateSecrets::from_value(value)?),
        None => Err(ConfigError::MissingFunctionConfig.into()),
    }
}

fn publish(list: &mut ResourceList, report: Report) -> Report {
    list.results = report.clone().into_diagnostics();
    report
}
