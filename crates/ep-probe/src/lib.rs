//! # ep-probe
//!
//! The source model consumed by the plan compiler, plus the collaborators
//! that produce it:
//!
//! - [`Prober`] with an ffprobe-backed implementation ([`FfprobeProber`]),
//!   and [`ffprobe::parse_output`] for saved probe dumps
//! - [`SubtitleClassifier`] with a codec-table implementation, and
//!   [`classify_subtitles`] to classify every subtitle of a source in parallel
//!
//! ## Quick start
//!
//! ```no_run
//! use ep_probe::{classify_subtitles, CodecClassifier, FfprobeProber, Prober};
//! use std::path::Path;
//!
//! let prober = FfprobeProber::from_path().expect("ffprobe on PATH");
//! let mut source = prober.probe(Path::new("movie.mkv")).unwrap();
//! classify_subtitles(&mut source, &CodecClassifier);
//! println!("{} streams", source.streams.len());
//! ```

pub mod classify;
pub mod ffprobe;
pub mod prober;
pub mod types;

// Re-export key types at crate root for convenience.
pub use classify::{classify_subtitles, CodecClassifier, SubtitleClass, SubtitleClassifier};
pub use ffprobe::FfprobeProber;
pub use prober::Prober;
pub use types::{
    AttachmentInfo, AudioInfo, ColorInfo, ContentLight, ExternalSubtitle, MasteringDisplay,
    SourceFile, Stream, StreamDetails, SubtitleInfo, VideoInfo,
};
