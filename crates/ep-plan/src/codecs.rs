//! Encoder tables.
//!
//! Each stream kind has a closed enum of the encoders the compiler knows how
//! to drive. Policy pools are lists of names; [`Pool`] resolves them against
//! the tables, keeping unknown names as [`CodecChoice::Unsupported`] so they
//! can still match a source codec for copying.

use ep_core::Strictness;
use std::fmt;

/// Common lookup interface of the encoder tables.
pub trait CodecTable: Copy + Sized + 'static {
    /// Every table entry, in lookup order.
    const ALL: &'static [Self];

    /// Policy-facing name.
    fn name(self) -> &'static str;

    /// Codec identifier produced by the encoder (matches probe output).
    fn codec(self) -> &'static str;

    /// Encoder name passed to `-c:<kind>:<n>`.
    fn encoder(self) -> &'static str;

    /// Extra accepted policy names.
    fn aliases(self) -> &'static [&'static str] {
        &[]
    }

    /// Look up an entry by policy name or alias.
    fn from_name(name: &str) -> Option<Self> {
        let name = name.trim().to_ascii_lowercase();
        Self::ALL
            .iter()
            .copied()
            .find(|e| e.name() == name || e.aliases().contains(&name.as_str()))
    }

    /// The default encoder producing `codec`.
    fn for_codec(codec: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|e| e.codec() == codec)
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum VideoEncoder {
    H264,
    H264Qsv,
    H264Vaapi,
    H264Nvenc,
    H264VideoToolbox,
    H265,
    H265Qsv,
    H265Vaapi,
    H265Nvenc,
    Av1,
    Vp9,
    Mpeg2,
}

impl VideoEncoder {
    /// Highest bit depth the encoder accepts.
    pub fn max_depth(self) -> u32 {
        match self {
            Self::H264
            | Self::H264Qsv
            | Self::H264Vaapi
            | Self::H264Nvenc
            | Self::H264VideoToolbox
            | Self::Mpeg2 => 8,
            Self::H265 | Self::H265Qsv | Self::H265Vaapi | Self::H265Nvenc | Self::Av1 => 10,
            Self::Vp9 => 12,
        }
    }

    /// Whether the encoder is libx265 and takes `-x265-params`.
    pub fn is_x265(self) -> bool {
        self == Self::H265
    }
}

impl CodecTable for VideoEncoder {
    const ALL: &'static [Self] = &[
        Self::H264,
        Self::H264Qsv,
        Self::H264Vaapi,
        Self::H264Nvenc,
        Self::H264VideoToolbox,
        Self::H265,
        Self::H265Qsv,
        Self::H265Vaapi,
        Self::H265Nvenc,
        Self::Av1,
        Self::Vp9,
        Self::Mpeg2,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::H264 => "h264",
            Self::H264Qsv => "h264qsv",
            Self::H264Vaapi => "h264vaapi",
            Self::H264Nvenc => "h264nvenc",
            Self::H264VideoToolbox => "h264videotoolbox",
            Self::H265 => "h265",
            Self::H265Qsv => "h265qsv",
            Self::H265Vaapi => "h265vaapi",
            Self::H265Nvenc => "h265nvenc",
            Self::Av1 => "av1",
            Self::Vp9 => "vp9",
            Self::Mpeg2 => "mpeg2",
        }
    }

    fn codec(self) -> &'static str {
        match self {
            Self::H264
            | Self::H264Qsv
            | Self::H264Vaapi
            | Self::H264Nvenc
            | Self::H264VideoToolbox => "h264",
            Self::H265 | Self::H265Qsv | Self::H265Vaapi | Self::H265Nvenc => "hevc",
            Self::Av1 => "av1",
            Self::Vp9 => "vp9",
            Self::Mpeg2 => "mpeg2video",
        }
    }

    fn encoder(self) -> &'static str {
        match self {
            Self::H264 => "libx264",
            Self::H264Qsv => "h264_qsv",
            Self::H264Vaapi => "h264_vaapi",
            Self::H264Nvenc => "h264_nvenc",
            Self::H264VideoToolbox => "h264_videotoolbox",
            Self::H265 => "libx265",
            Self::H265Qsv => "hevc_qsv",
            Self::H265Vaapi => "hevc_vaapi",
            Self::H265Nvenc => "hevc_nvenc",
            Self::Av1 => "libsvtav1",
            Self::Vp9 => "libvpx-vp9",
            Self::Mpeg2 => "mpeg2video",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::H264 => &["x264", "avc"],
            Self::H265 => &["hevc", "x265"],
            Self::H265Qsv => &["hevcqsv"],
            Self::H265Vaapi => &["hevcvaapi"],
            Self::H265Nvenc => &["hevcnvenc"],
            Self::Mpeg2 => &["mpeg2video"],
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AudioEncoder {
    Aac,
    FdkAac,
    Ac3,
    Eac3,
    Opus,
    Flac,
    Mp3,
    Vorbis,
    Alac,
    TrueHd,
    Dts,
}

impl AudioEncoder {
    /// Channel limit of the encoder.
    pub fn max_channels(self) -> u32 {
        match self {
            Self::Mp3 => 2,
            Self::Ac3 | Self::Dts => 6,
            _ => 8,
        }
    }

    /// Strictness level the encoder requires.
    pub fn strict(self) -> Strictness {
        match self {
            Self::TrueHd | Self::Dts => Strictness::Experimental,
            _ => Strictness::Normal,
        }
    }
}

impl CodecTable for AudioEncoder {
    const ALL: &'static [Self] = &[
        Self::Aac,
        Self::FdkAac,
        Self::Ac3,
        Self::Eac3,
        Self::Opus,
        Self::Flac,
        Self::Mp3,
        Self::Vorbis,
        Self::Alac,
        Self::TrueHd,
        Self::Dts,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::FdkAac => "fdkaac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Vorbis => "vorbis",
            Self::Alac => "alac",
            Self::TrueHd => "truehd",
            Self::Dts => "dts",
        }
    }

    fn codec(self) -> &'static str {
        match self {
            Self::Aac | Self::FdkAac => "aac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Opus => "opus",
            Self::Flac => "flac",
            Self::Mp3 => "mp3",
            Self::Vorbis => "vorbis",
            Self::Alac => "alac",
            Self::TrueHd => "truehd",
            Self::Dts => "dts",
        }
    }

    fn encoder(self) -> &'static str {
        match self {
            Self::Aac => "aac",
            Self::FdkAac => "libfdk_aac",
            Self::Ac3 => "ac3",
            Self::Eac3 => "eac3",
            Self::Opus => "libopus",
            Self::Flac => "flac",
            Self::Mp3 => "libmp3lame",
            Self::Vorbis => "libvorbis",
            Self::Alac => "alac",
            Self::TrueHd => "truehd",
            Self::Dts => "dca",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::FdkAac => &["libfdk_aac"],
            Self::Opus => &["libopus"],
            Self::Dts => &["dca"],
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Subtitles
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SubtitleEncoder {
    MovText,
    Srt,
    Ass,
    Ssa,
    WebVtt,
    DvdSub,
    PgsSub,
}

impl SubtitleEncoder {
    /// File extension for extracted subtitles.
    pub fn extension(self) -> &'static str {
        match self {
            Self::MovText => "mp4",
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::Ssa => "ssa",
            Self::WebVtt => "vtt",
            Self::DvdSub => "sub",
            Self::PgsSub => "sup",
        }
    }

    pub fn is_image(self) -> bool {
        matches!(self, Self::DvdSub | Self::PgsSub)
    }
}

impl CodecTable for SubtitleEncoder {
    const ALL: &'static [Self] = &[
        Self::MovText,
        Self::Srt,
        Self::Ass,
        Self::Ssa,
        Self::WebVtt,
        Self::DvdSub,
        Self::PgsSub,
    ];

    fn name(self) -> &'static str {
        match self {
            Self::MovText => "mov_text",
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::Ssa => "ssa",
            Self::WebVtt => "webvtt",
            Self::DvdSub => "dvdsub",
            Self::PgsSub => "pgssub",
        }
    }

    fn codec(self) -> &'static str {
        match self {
            Self::MovText => "mov_text",
            Self::Srt => "subrip",
            Self::Ass => "ass",
            Self::Ssa => "ssa",
            Self::WebVtt => "webvtt",
            Self::DvdSub => "dvd_subtitle",
            Self::PgsSub => "hdmv_pgs_subtitle",
        }
    }

    fn encoder(self) -> &'static str {
        match self {
            Self::MovText => "mov_text",
            Self::Srt => "srt",
            Self::Ass => "ass",
            Self::Ssa => "ssa",
            Self::WebVtt => "webvtt",
            Self::DvdSub => "dvdsub",
            Self::PgsSub => "pgssub",
        }
    }

    fn aliases(self) -> &'static [&'static str] {
        match self {
            Self::Srt => &["subrip"],
            Self::WebVtt => &["vtt"],
            Self::DvdSub => &["dvd_subtitle"],
            Self::PgsSub => &["hdmv_pgs_subtitle", "pgs"],
            _ => &[],
        }
    }
}

// ---------------------------------------------------------------------------
// Encoder / pools
// ---------------------------------------------------------------------------

/// An encoder of any stream kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Encoder {
    Video(VideoEncoder),
    Audio(AudioEncoder),
    Subtitle(SubtitleEncoder),
}

impl Encoder {
    pub fn name(self) -> &'static str {
        match self {
            Self::Video(e) => e.name(),
            Self::Audio(e) => e.name(),
            Self::Subtitle(e) => e.name(),
        }
    }

    pub fn codec(self) -> &'static str {
        match self {
            Self::Video(e) => e.codec(),
            Self::Audio(e) => e.codec(),
            Self::Subtitle(e) => e.codec(),
        }
    }

    pub fn encoder(self) -> &'static str {
        match self {
            Self::Video(e) => e.encoder(),
            Self::Audio(e) => e.encoder(),
            Self::Subtitle(e) => e.encoder(),
        }
    }

    pub fn strict(self) -> Strictness {
        match self {
            Self::Audio(e) => e.strict(),
            _ => Strictness::Normal,
        }
    }
}

impl fmt::Display for Encoder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One resolved pool entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CodecChoice<E> {
    Known(E),
    Unsupported(String),
}

impl<E: CodecTable> CodecChoice<E> {
    /// Codec identifier this entry stands for.
    pub fn codec(&self) -> &str {
        match self {
            Self::Known(e) => e.codec(),
            Self::Unsupported(name) => name,
        }
    }
}

/// An ordered codec pool resolved against an encoder table.
#[derive(Debug, Clone)]
pub struct Pool<E> {
    choices: Vec<CodecChoice<E>>,
}

impl<E: CodecTable> Pool<E> {
    pub fn parse(names: &[String]) -> Self {
        let choices = names
            .iter()
            .map(|n| match E::from_name(n) {
                Some(e) => CodecChoice::Known(e),
                None => CodecChoice::Unsupported(n.trim().to_ascii_lowercase()),
            })
            .collect();
        Self { choices }
    }

    pub fn is_empty(&self) -> bool {
        self.choices.is_empty()
    }

    /// Whether a stream in `codec` may be copied. An empty pool accepts
    /// anything.
    pub fn accepts(&self, codec: &str) -> bool {
        self.is_empty() || self.rank(codec).is_some()
    }

    /// Position of the first entry producing `codec`.
    pub fn rank(&self, codec: &str) -> Option<usize> {
        self.choices.iter().position(|c| c.codec() == codec)
    }

    /// Codec identifiers in pool order.
    pub fn codec_ids(&self) -> Vec<String> {
        self.choices.iter().map(|c| c.codec().to_string()).collect()
    }

    /// The encoder that would produce `codec`: the matching pool entry,
    /// else the table default.
    pub fn matched(&self, codec: &str) -> Option<E> {
        self.choices
            .iter()
            .find_map(|c| match c {
                CodecChoice::Known(e) if e.codec() == codec => Some(*e),
                _ => None,
            })
            .or_else(|| E::for_codec(codec))
    }

    /// Encode target for a stream currently in `source_codec`: the first
    /// pool entry, or the encoder for the source codec when the pool is
    /// empty. `Err` carries the unsupported name.
    pub fn target(&self, source_codec: &str) -> std::result::Result<E, String> {
        match self.choices.first() {
            Some(CodecChoice::Known(e)) => Ok(*e),
            Some(CodecChoice::Unsupported(name)) => Err(name.clone()),
            None => E::for_codec(source_codec).ok_or_else(|| source_codec.to_string()),
        }
    }

    /// Names that did not resolve against the table.
    pub fn unsupported(&self) -> impl Iterator<Item = &str> {
        self.choices.iter().filter_map(|c| match c {
            CodecChoice::Unsupported(n) => Some(n.as_str()),
            CodecChoice::Known(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn lookup_by_name_and_alias() {
        assert_eq!(VideoEncoder::from_name("hevc"), Some(VideoEncoder::H265));
        assert_eq!(VideoEncoder::from_name("H264"), Some(VideoEncoder::H264));
        assert_eq!(AudioEncoder::from_name("libfdk_aac"), Some(AudioEncoder::FdkAac));
        assert_eq!(SubtitleEncoder::from_name("subrip"), Some(SubtitleEncoder::Srt));
        assert_eq!(VideoEncoder::from_name("prores"), None);
    }

    #[test]
    fn for_codec_prefers_software_encoder() {
        assert_eq!(VideoEncoder::for_codec("hevc"), Some(VideoEncoder::H265));
        assert_eq!(AudioEncoder::for_codec("aac"), Some(AudioEncoder::Aac));
        assert_eq!(AudioEncoder::for_codec("dts"), Some(AudioEncoder::Dts));
        assert_eq!(SubtitleEncoder::for_codec("subrip"), Some(SubtitleEncoder::Srt));
    }

    #[test]
    fn pool_accepts_and_ranks() {
        let pool = Pool::<AudioEncoder>::parse(&names(&["ac3", "fdkaac", "wma"]));
        assert!(pool.accepts("ac3"));
        assert!(pool.accepts("aac"));
        assert!(pool.accepts("wma"));
        assert!(!pool.accepts("dts"));
        assert_eq!(pool.rank("aac"), Some(1));
        assert_eq!(pool.codec_ids(), vec!["ac3", "aac", "wma"]);
        assert_eq!(pool.unsupported().collect::<Vec<_>>(), vec!["wma"]);
    }

    #[test]
    fn pool_target() {
        let pool = Pool::<VideoEncoder>::parse(&names(&["h265nvenc", "h264"]));
        assert_eq!(pool.target("mpeg2video"), Ok(VideoEncoder::H265Nvenc));

        let empty = Pool::<VideoEncoder>::parse(&[]);
        assert!(empty.accepts("vc1"));
        assert_eq!(empty.target("hevc"), Ok(VideoEncoder::H265));
        assert_eq!(empty.target("vc1"), Err("vc1".to_string()));

        let unknown = Pool::<VideoEncoder>::parse(&names(&["prores"]));
        assert_eq!(unknown.target("h264"), Err("prores".to_string()));
        assert!(unknown.accepts("prores"));
    }

    #[test]
    fn matched_encoder() {
        let pool = Pool::<VideoEncoder>::parse(&names(&["h265qsv"]));
        assert_eq!(pool.matched("hevc"), Some(VideoEncoder::H265Qsv));
        assert_eq!(pool.matched("h264"), Some(VideoEncoder::H264));
        assert_eq!(VideoEncoder::H264.max_depth(), 8);
    }

    #[test]
    fn encoder_strictness() {
        assert_eq!(Encoder::Audio(AudioEncoder::TrueHd).strict(), Strictness::Experimental);
        assert_eq!(Encoder::Video(VideoEncoder::Av1).strict(), Strictness::Normal);
        assert_eq!(Encoder::Audio(AudioEncoder::Dts).encoder(), "dca");
    }
}
