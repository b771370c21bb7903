#![deny(warnings)]
#![deny(dead_code)]
#![deny(unused_variables)]
#![deny(unused_imports)]

//! Shared types, traits, configuration and errors for the docsearch crates.

pub mod config;
pub mod error;
pub mod source;
pub mod spec;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
