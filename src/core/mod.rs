//! Core library components.
//!
//! This module contains the reusable business logic for secret
//! resolution, fingerprinting, manifest generation, and the
//! ResourceList pipeline.

pub mod config;
pub mod delegate;
pub mod document;
pub mod fingerprint;
pub mod generate;
pub mod processor;
pub mod recipient;
pub mod report;
pub mod resolver;
