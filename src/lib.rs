//! encodeplan - transcode plan compiler
//!
//! The binary glue around `ep-plan`: log setup and discovery of subtitle
//! files next to a source. Exposed as a library for integration testing.

pub mod discover;
pub mod logging;
