//! Terminology hierarchy engine
//!
//! Stores immutable versions of code systems as concept graphs and answers
//! hierarchy questions about them:
//! - Commit new code system versions (validated, all-or-nothing)
//! - Transitive ancestor/descendant queries
//! - `$lookup` of a single code
//! - CodeSystem resource hook feeding the version store

// Allow clippy lints that are acceptable for this domain-specific codebase
#![allow(
    clippy::too_many_arguments,      // Functions with many args are acceptable for domain operations
    clippy::type_complexity,         // Complex types are acceptable when they represent domain concepts
)]

pub mod config;
pub mod db;
pub mod error;
pub mod hooks;
pub mod logging;
pub mod models;
pub mod services;

pub use config::Config;
pub use error::{Error, Result};
