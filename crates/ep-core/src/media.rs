//! Media-domain enums: stream kinds, dispositions, strictness levels and
//! output container formats.
//!
//! Enums serialize in lowercase and implement `Display` manually so the
//! string form used in configuration, logs and encoder arguments is the same.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// StreamKind
// ---------------------------------------------------------------------------

/// Kind of stream within a media file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamKind {
    Video,
    Audio,
    Subtitle,
    Attachment,
}

impl StreamKind {
    /// Single-letter stream specifier used by the encoder CLI (`v`, `a`, `s`, `t`).
    pub fn specifier(self) -> &'static str {
        match self {
            Self::Video => "v",
            Self::Audio => "a",
            Self::Subtitle => "s",
            Self::Attachment => "t",
        }
    }
}

impl fmt::Display for StreamKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
            Self::Subtitle => write!(f, "subtitle"),
            Self::Attachment => write!(f, "attachment"),
        }
    }
}

// ---------------------------------------------------------------------------
// Disposition
// ---------------------------------------------------------------------------

/// A boolean role flag carried by a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    Default,
    Forced,
    Comment,
    HearingImpaired,
    VisualImpaired,
    Captions,
    Dub,
    Original,
    Lyrics,
    Karaoke,
}

impl Disposition {
    /// Every disposition in canonical emission order.
    pub const ALL: [Disposition; 10] = [
        Disposition::Default,
        Disposition::Forced,
        Disposition::Comment,
        Disposition::HearingImpaired,
        Disposition::VisualImpaired,
        Disposition::Captions,
        Disposition::Dub,
        Disposition::Original,
        Disposition::Lyrics,
        Disposition::Karaoke,
    ];

    /// Name as used by ffprobe/ffmpeg.
    pub fn name(self) -> &'static str {
        match self {
            Self::Default => "default",
            Self::Forced => "forced",
            Self::Comment => "comment",
            Self::HearingImpaired => "hearing_impaired",
            Self::VisualImpaired => "visual_impaired",
            Self::Captions => "captions",
            Self::Dub => "dub",
            Self::Original => "original",
            Self::Lyrics => "lyrics",
            Self::Karaoke => "karaoke",
        }
    }

    fn bit(self) -> u16 {
        1 << (self as u16)
    }
}

impl fmt::Display for Disposition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Disposition {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        Disposition::ALL
            .iter()
            .copied()
            .find(|d| d.name() == lower)
            .ok_or_else(|| format!("unknown disposition '{s}'"))
    }
}

// ---------------------------------------------------------------------------
// DispositionSet
// ---------------------------------------------------------------------------

/// A set of [`Disposition`] flags.
///
/// Serializes as a list of disposition names in canonical order.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct DispositionSet(u16);

impl DispositionSet {
    /// The empty set.
    pub const fn empty() -> Self {
        Self(0)
    }

    pub fn contains(&self, d: Disposition) -> bool {
        self.0 & d.bit() != 0
    }

    pub fn insert(&mut self, d: Disposition) {
        self.0 |= d.bit();
    }

    pub fn remove(&mut self, d: Disposition) {
        self.0 &= !d.bit();
    }

    pub fn set(&mut self, d: Disposition, on: bool) {
        if on {
            self.insert(d);
        } else {
            self.remove(d);
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0 == 0
    }

    /// Whether the two sets share at least one flag.
    pub fn intersects(&self, other: &DispositionSet) -> bool {
        self.0 & other.0 != 0
    }

    /// Whether every flag of `other` is present in `self`.
    pub fn is_superset(&self, other: &DispositionSet) -> bool {
        self.0 & other.0 == other.0
    }

    /// Iterate the contained flags in canonical order.
    pub fn iter(&self) -> impl Iterator<Item = Disposition> + '_ {
        Disposition::ALL.iter().copied().filter(|d| self.contains(*d))
    }

    /// Canonical signature, e.g. `"default.forced"`; empty set yields `""`.
    pub fn signature(&self) -> String {
        self.iter().map(Disposition::name).collect::<Vec<_>>().join(".")
    }

    /// Encoder disposition argument: every disposition listed once, prefixed
    /// with `+` when set and `-` when clear.
    pub fn to_flags(&self) -> String {
        let mut out = String::new();
        for d in Disposition::ALL {
            out.push(if self.contains(d) { '+' } else { '-' });
            out.push_str(d.name());
        }
        out
    }
}

impl FromIterator<Disposition> for DispositionSet {
    fn from_iter<I: IntoIterator<Item = Disposition>>(iter: I) -> Self {
        let mut set = DispositionSet::empty();
        for d in iter {
            set.insert(d);
        }
        set
    }
}

impl fmt::Debug for DispositionSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

impl Serialize for DispositionSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.iter().map(Disposition::name))
    }
}

impl<'de> Deserialize<'de> for DispositionSet {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let names = Vec::<String>::deserialize(deserializer)?;
        names
            .iter()
            .map(|n| n.parse::<Disposition>())
            .collect::<Result<DispositionSet, _>>()
            .map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Strictness
// ---------------------------------------------------------------------------

/// Encoder standards-compliance level (`-strict`).
///
/// Ordered by numeric level, so the minimum of a set is the least strict.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    Experimental = -2,
    Unofficial = -1,
    Normal = 0,
    Strict = 1,
    Very = 2,
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Experimental => write!(f, "experimental"),
            Self::Unofficial => write!(f, "unofficial"),
            Self::Normal => write!(f, "normal"),
            Self::Strict => write!(f, "strict"),
            Self::Very => write!(f, "very"),
        }
    }
}

// ---------------------------------------------------------------------------
// OutputFormat
// ---------------------------------------------------------------------------

/// Output container format requested from the encoder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum OutputFormat {
    #[default]
    Mp4,
    Mov,
    Matroska,
    WebM,
    /// Any other muxer name, passed through verbatim.
    Other(String),
}

impl OutputFormat {
    /// Muxer name for the encoder's `-f` flag.
    pub fn muxer(&self) -> &str {
        match self {
            Self::Mp4 => "mp4",
            Self::Mov => "mov",
            Self::Matroska => "matroska",
            Self::WebM => "webm",
            Self::Other(name) => name,
        }
    }

    /// mp4 and mov share the ISO-BMFF muxer quirks.
    pub fn is_mp4_family(&self) -> bool {
        matches!(self, Self::Mp4 | Self::Mov)
    }

    /// Containers whose index lands at the end of the file and must be moved
    /// to the front for progressive playback.
    pub fn needs_index_relocation(&self) -> bool {
        self.is_mp4_family()
    }

    pub fn supports_attachments(&self) -> bool {
        matches!(self, Self::Matroska)
    }
}

impl FromStr for OutputFormat {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.trim().to_ascii_lowercase().as_str() {
            "mp4" | "m4v" => Self::Mp4,
            "mov" => Self::Mov,
            "mkv" | "matroska" => Self::Matroska,
            "webm" => Self::WebM,
            other => Self::Other(other.to_string()),
        })
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.muxer())
    }
}

impl Serialize for OutputFormat {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.muxer())
    }
}

impl<'de> Deserialize<'de> for OutputFormat {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        let Ok(format) = s.parse();
        Ok(format)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_kind_display_and_specifier() {
        assert_eq!(StreamKind::Video.to_string(), "video");
        assert_eq!(StreamKind::Attachment.specifier(), "t");
        let json = serde_json::to_string(&StreamKind::Subtitle).unwrap();
        assert_eq!(json, r#""subtitle""#);
    }

    #[test]
    fn disposition_parse() {
        assert_eq!(
            "hearing_impaired".parse::<Disposition>().unwrap(),
            Disposition::HearingImpaired
        );
        assert_eq!("Forced".parse::<Disposition>().unwrap(), Disposition::Forced);
        assert!("attached_pic".parse::<Disposition>().is_err());
    }

    #[test]
    fn disposition_set_flags_list_every_name_once() {
        let set: DispositionSet = [Disposition::Default, Disposition::Comment]
            .into_iter()
            .collect();
        assert_eq!(
            set.to_flags(),
            "+default-forced+comment-hearing_impaired-visual_impaired-captions-dub-original-lyrics-karaoke"
        );
    }

    #[test]
    fn disposition_set_signature() {
        let mut set = DispositionSet::empty();
        assert_eq!(set.signature(), "");
        set.insert(Disposition::Forced);
        set.insert(Disposition::Default);
        assert_eq!(set.signature(), "default.forced");
        set.remove(Disposition::Default);
        assert_eq!(set.signature(), "forced");
    }

    #[test]
    fn disposition_set_superset_and_intersects() {
        let a: DispositionSet = [Disposition::Forced, Disposition::Default]
            .into_iter()
            .collect();
        let b: DispositionSet = [Disposition::Forced].into_iter().collect();
        assert!(a.is_superset(&b));
        assert!(!b.is_superset(&a));
        assert!(a.intersects(&b));
        assert!(!DispositionSet::empty().intersects(&a));
    }

    #[test]
    fn disposition_set_serde() {
        let set: DispositionSet = [Disposition::Forced, Disposition::Dub].into_iter().collect();
        let json = serde_json::to_string(&set).unwrap();
        assert_eq!(json, r#"["forced","dub"]"#);
        let back: DispositionSet = serde_json::from_str(&json).unwrap();
        assert_eq!(back, set);
        assert!(serde_json::from_str::<DispositionSet>(r#"["bogus"]"#).is_err());
    }

    #[test]
    fn strictness_min_is_least_strict() {
        let levels = [Strictness::Normal, Strictness::Experimental, Strictness::Strict];
        assert_eq!(levels.iter().min(), Some(&Strictness::Experimental));
        assert_eq!(Strictness::Experimental.to_string(), "experimental");
    }

    #[test]
    fn output_format_parse() {
        assert_eq!("mkv".parse::<OutputFormat>().unwrap(), OutputFormat::Matroska);
        assert_eq!("M4V".parse::<OutputFormat>().unwrap(), OutputFormat::Mp4);
        assert_eq!(
            "avi".parse::<OutputFormat>().unwrap(),
            OutputFormat::Other("avi".into())
        );
        assert!(OutputFormat::Mov.needs_index_relocation());
        assert!(!OutputFormat::Matroska.needs_index_relocation());
        assert!(OutputFormat::Matroska.supports_attachments());
    }
}
