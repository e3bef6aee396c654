//! ep-core: shared types, errors and policy configuration.
//!
//! This crate is the foundational dependency for the other ep-* crates,
//! providing the unified error type, media-domain enums (stream kinds,
//! dispositions, strictness levels, output formats), ISO 639 language
//! normalisation and the declarative [`config::Policy`] tree.

pub mod config;
pub mod error;
pub mod lang;
pub mod media;

// Re-export the most commonly used items at the crate root.
pub use config::Policy;
pub use error::{Error, Result};
pub use media::*;
