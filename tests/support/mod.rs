//! Test support utilities for warren integration tests.
//!
//! Provides in-memory delegate fakes and ResourceList fixtures.

#![allow(dead_code)]

pub mod fakes;
pub mod fixtures;

#[allow(unused_imports)]
pub use fakes::*;
#[allow(unused_imports)]
pub use fixtures::*;
