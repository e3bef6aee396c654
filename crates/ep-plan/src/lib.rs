//! # ep-plan
//!
//! The transcode plan compiler. Given a probed [`ep_probe::SourceFile`] and a
//! [`ep_core::Policy`], it decides per stream whether to copy or re-encode,
//! which filters, bitrates and dispositions apply, how streams are ordered,
//! and produces the flat encoder argument list.
//!
//! Pipeline, leaves first:
//!
//! - [`filter`]: language and disposition selection with allow-list relaxation
//! - [`decision`] and [`geometry`]: video copy/encode, scaling, bitrate estimates
//! - [`audio`] and [`dedup`]: audio steps, universal companions, duplicate purge
//! - [`subtitle`] and [`external`]: burn, embed, rip or drop
//! - [`sort`] and [`defaults`]: stream order and the single default stream
//! - [`emit`]: the argument list
//!
//! [`Compiler`] runs the whole pipeline.

pub mod audio;
pub mod codecs;
pub mod compiler;
pub mod decision;
pub mod dedup;
pub mod defaults;
pub mod emit;
pub mod external;
pub mod filter;
pub mod geometry;
pub mod plan;
pub mod sort;
pub mod subtitle;
pub mod warning;

pub use codecs::{AudioEncoder, CodecChoice, CodecTable, Encoder, Pool, SubtitleEncoder, VideoEncoder};
pub use compiler::{compile, validate, Compiler};
pub use plan::{Action, BurnIn, Compiled, DebugTag, EncodePlan, EncodeReason, Extraction, PlanStep};
pub use warning::Warning;
