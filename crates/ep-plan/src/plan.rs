//! The encode plan: resolved per-stream steps plus global flags.

use std::fmt;
use std::path::PathBuf;

use ep_core::{Disposition, DispositionSet, OutputFormat, Strictness, StreamKind};
use ep_probe::Stream;
use serde::{Serialize, Serializer};

use crate::codecs::{Encoder, SubtitleEncoder};
use crate::emit;
use crate::warning::Warning;

// ---------------------------------------------------------------------------
// Action
// ---------------------------------------------------------------------------

/// What happens to one output stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    Copy,
    Encode(Encoder),
}

impl Action {
    pub fn is_copy(&self) -> bool {
        matches!(self, Action::Copy)
    }

    pub fn encoder(&self) -> Option<Encoder> {
        match self {
            Action::Copy => None,
            Action::Encode(e) => Some(*e),
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Action::Copy => write!(f, "copy"),
            Action::Encode(e) => write!(f, "encode:{}", e.name()),
        }
    }
}

impl Serialize for Action {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Debug tag
// ---------------------------------------------------------------------------

/// A rule that forced a stream to be re-encoded (or a companion to exist).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeReason {
    Codec,
    Veto,
    MaxBitrate,
    MaxWidth,
    MaxLevel,
    Profile,
    PixFmt,
    BitDepth,
    ForceFilter,
    Deinterlace,
    Dimensions,
    MaxChannels,
    BurnIn,
    Universal,
}

impl EncodeReason {
    pub fn name(self) -> &'static str {
        match self {
            Self::Codec => "codec",
            Self::Veto => "veto",
            Self::MaxBitrate => "max-bitrate",
            Self::MaxWidth => "max-width",
            Self::MaxLevel => "max-level",
            Self::Profile => "profile",
            Self::PixFmt => "pix-fmt",
            Self::BitDepth => "bit-depth",
            Self::ForceFilter => "force-filter",
            Self::Deinterlace => "deinterlace",
            Self::Dimensions => "dimensions",
            Self::MaxChannels => "max-channels",
            Self::BurnIn => "burn-in",
            Self::Universal => "universal",
        }
    }
}

/// Ordered list of the reasons recorded for a step. Diagnostic only.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DebugTag {
    kind: Option<StreamKind>,
    reasons: Vec<EncodeReason>,
}

impl DebugTag {
    pub fn new(kind: StreamKind) -> Self {
        Self {
            kind: Some(kind),
            reasons: Vec::new(),
        }
    }

    pub fn push(&mut self, reason: EncodeReason) {
        self.reasons.push(reason);
    }

    pub fn reasons(&self) -> &[EncodeReason] {
        &self.reasons
    }

    pub fn contains(&self, reason: EncodeReason) -> bool {
        self.reasons.contains(&reason)
    }

    pub fn is_empty(&self) -> bool {
        self.reasons.is_empty()
    }
}

impl fmt::Display for DebugTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(kind) = self.kind {
            write!(f, "{kind}")?;
        }
        for reason in &self.reasons {
            write!(f, ".{}", reason.name())?;
        }
        Ok(())
    }
}

impl Serialize for DebugTag {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// ---------------------------------------------------------------------------
// Step parameters
// ---------------------------------------------------------------------------

/// Constant-quality rate control.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CrfSettings {
    pub crf: u32,
    pub maxrate: Option<String>,
    pub bufsize: Option<String>,
}

/// HDR signalling carried into a re-encoded video stream.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HdrParams {
    pub primaries: Option<String>,
    pub transfer: Option<String>,
    pub space: Option<String>,
    /// Value for `-x265-params`, when the encoder is libx265.
    pub x265_params: Option<String>,
}

/// One output stream.
#[derive(Debug, Clone, Serialize)]
pub struct PlanStep {
    pub kind: StreamKind,
    /// Encoder input number (0 is the source file).
    pub input: usize,
    /// Stream index within the input.
    pub source_index: u32,
    pub action: Action,
    /// Codec of the output stream.
    pub codec: String,
    pub source_codec: String,
    /// Bitrate in kbps. Informational for copies.
    pub bitrate: Option<u32>,
    pub channels: Option<u32>,
    pub filters: Vec<String>,
    pub profile: Option<String>,
    pub level: Option<f64>,
    pub pix_fmt: Option<String>,
    pub crf: Option<CrfSettings>,
    pub preset: Option<String>,
    pub hdr: Option<HdrParams>,
    pub disposition: DispositionSet,
    pub title: Option<String>,
    pub language: String,
    /// Whether the source stream carried "default".
    pub source_default: bool,
    /// Minimum source index of the duplicate combination this step belongs to.
    pub group: Option<u32>,
    /// Source index of the primary step this companion follows.
    pub parent: Option<u32>,
    pub filename: Option<String>,
    pub mimetype: Option<String>,
    pub debug: DebugTag,
}

impl PlanStep {
    /// A step for `stream` read from `input`, with everything but the action
    /// taken from the source.
    pub fn new(input: usize, stream: &Stream, action: Action) -> Self {
        let kind = stream.kind();
        let codec = action
            .encoder()
            .map(|e| e.codec().to_string())
            .unwrap_or_else(|| stream.codec.clone());
        Self {
            kind,
            input,
            source_index: stream.index,
            action,
            codec,
            source_codec: stream.codec.clone(),
            bitrate: None,
            channels: None,
            filters: Vec::new(),
            profile: None,
            level: None,
            pix_fmt: None,
            crf: None,
            preset: None,
            hdr: None,
            disposition: stream.disposition,
            title: None,
            language: stream.language.clone(),
            source_default: stream.is_default(),
            group: None,
            parent: None,
            filename: None,
            mimetype: None,
            debug: DebugTag::new(kind),
        }
    }

    pub fn is_default(&self) -> bool {
        self.disposition.contains(Disposition::Default)
    }

    /// Stream specifier for `-map`, e.g. `0:3`.
    pub fn map_spec(&self) -> String {
        format!("{}:{}", self.input, self.source_index)
    }

    /// Position used by the `map` sort key: combinations sort by their
    /// first member.
    pub fn map_key(&self) -> (usize, u32) {
        (self.input, self.group.unwrap_or(self.source_index))
    }
}

// ---------------------------------------------------------------------------
// Side jobs
// ---------------------------------------------------------------------------

/// A subtitle written to its own file instead of being embedded.
#[derive(Debug, Clone, Serialize)]
pub struct Extraction {
    pub input: PathBuf,
    pub source_index: u32,
    /// `None` copies the stream as is.
    #[serde(serialize_with = "serialize_encoder")]
    pub encoder: Option<SubtitleEncoder>,
    pub output: PathBuf,
    pub language: String,
    pub disposition: DispositionSet,
}

fn serialize_encoder<S: Serializer>(
    encoder: &Option<SubtitleEncoder>,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use crate::codecs::CodecTable;
    match encoder {
        Some(e) => serializer.serialize_str(e.name()),
        None => serializer.serialize_str("copy"),
    }
}

impl Extraction {
    /// Encoder arguments for this extraction, ending with the output path.
    pub fn args(&self) -> Vec<String> {
        emit::extraction_args(self)
    }
}

/// The subtitle burned into the video.
#[derive(Debug, Clone, Serialize)]
pub struct BurnIn {
    pub path: PathBuf,
    /// Index of the stream among the subtitle streams of `path`.
    pub subtitle_index: u32,
    pub language: String,
    pub filter: String,
}

// ---------------------------------------------------------------------------
// EncodePlan
// ---------------------------------------------------------------------------

/// The fully-resolved result of one compile.
#[derive(Debug, Clone, Serialize)]
pub struct EncodePlan {
    pub source: PathBuf,
    pub source_format: String,
    pub format: OutputFormat,
    pub video: Vec<PlanStep>,
    pub audio: Vec<PlanStep>,
    pub subtitle: Vec<PlanStep>,
    pub attachment: Vec<PlanStep>,
    /// Additional encoder inputs; input `n` is `external_inputs[n - 1]`.
    pub external_inputs: Vec<PathBuf>,
    pub extractions: Vec<Extraction>,
    pub burn: Option<BurnIn>,
    pub preopts: Vec<String>,
    pub postopts: Vec<String>,
    pub strict: Strictness,
    /// Whether the output's trailing index should be moved to the front.
    pub relocate_index: bool,
}

impl EncodePlan {
    /// Every step in emission order.
    pub fn steps(&self) -> impl Iterator<Item = &PlanStep> {
        self.video
            .iter()
            .chain(&self.audio)
            .chain(&self.subtitle)
            .chain(&self.attachment)
    }

    /// The flat encoder argument list.
    pub fn args(&self) -> Vec<String> {
        emit::arguments(self)
    }
}

/// A plan together with the warnings raised while compiling it.
#[derive(Debug, Clone, Serialize)]
pub struct Compiled {
    pub plan: EncodePlan,
    pub warnings: Vec<Warning>,
}

impl Compiled {
    /// Pretty JSON rendering of the plan and its warnings.
    pub fn to_json(&self) -> ep_core::Result<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| ep_core::Error::Internal(format!("plan encode: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::{AudioEncoder, VideoEncoder};

    #[test]
    fn action_display() {
        assert_eq!(Action::Copy.to_string(), "copy");
        assert_eq!(
            Action::Encode(Encoder::Video(VideoEncoder::H265)).to_string(),
            "encode:h265"
        );
    }

    #[test]
    fn debug_tag_display() {
        let mut tag = DebugTag::new(StreamKind::Video);
        assert_eq!(tag.to_string(), "video");
        tag.push(EncodeReason::Codec);
        tag.push(EncodeReason::MaxWidth);
        assert_eq!(tag.to_string(), "video.codec.max-width");
        assert!(tag.contains(EncodeReason::MaxWidth));
    }

    #[test]
    fn step_from_stream() {
        let stream = Stream::audio(2, "dts", 6)
            .with_language("ger")
            .with_disposition(Disposition::Default);
        let step = PlanStep::new(0, &stream, Action::Encode(Encoder::Audio(AudioEncoder::Aac)));
        assert_eq!(step.codec, "aac");
        assert_eq!(step.source_codec, "dts");
        assert_eq!(step.language, "deu");
        assert!(step.source_default);
        assert!(step.is_default());
        assert_eq!(step.map_spec(), "0:2");
        assert_eq!(step.map_key(), (0, 2));
    }

    #[test]
    fn step_serializes_action_as_string() {
        let stream = Stream::video(0, "h264", 1920, 1080);
        let step = PlanStep::new(0, &stream, Action::Copy);
        let json = serde_json::to_value(&step).unwrap();
        assert_eq!(json["action"], "copy");
        assert_eq!(json["debug"], "video");
    }
}
