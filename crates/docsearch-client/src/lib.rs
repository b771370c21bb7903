//! docsearch-client
//!
//! [`Client`] is the stateless entry point: every operation names its index
//! explicitly and the client can be shared freely. [`Session`] wraps a client
//! with single-caller conveniences (default index, last built spec, last
//! search result).

pub mod client;
pub mod session;

pub use client::Client;
pub use session::{Session, SessionState, SpecSource};
