//! Policy configuration types.
//!
//! The top-level [`Policy`] struct is deserialized from TOML or JSON and
//! carries one section per stream kind. Every section defaults sensibly so a
//! completely empty document is valid. Numeric ceilings are parsed leniently:
//! numbers and numeric strings are accepted, anything else resolves to the
//! documented default with a logged warning.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::Path;
use std::str::FromStr;

use crate::error::Result;
use crate::media::{Disposition, DispositionSet, OutputFormat};
use crate::{lang, Error};

// ---------------------------------------------------------------------------
// Top-level Policy
// ---------------------------------------------------------------------------

/// Root transcode policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Policy {
    /// Output container format.
    pub output_format: OutputFormat,
    /// Whether mp4-family outputs should have their index moved to the front.
    pub relocate_index: bool,
    /// Arguments placed before the first `-i`.
    pub preopts: Vec<String>,
    /// Arguments placed after the stream arguments, before `-f`.
    pub postopts: Vec<String>,
    /// Codec names that are never copied, whatever the pools say.
    pub copy_blocklist: Vec<String>,
    pub video: VideoPolicy,
    pub audio: AudioPolicy,
    pub subtitle: SubtitlePolicy,
    pub attachment: AttachmentPolicy,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            output_format: OutputFormat::Mp4,
            relocate_index: true,
            preopts: Vec::new(),
            postopts: Vec::new(),
            copy_blocklist: Vec::new(),
            video: VideoPolicy::default(),
            audio: AudioPolicy::default(),
            subtitle: SubtitlePolicy::default(),
            attachment: AttachmentPolicy::default(),
        }
    }
}

impl Policy {
    /// Deserialize a `Policy` from a TOML string.
    pub fn from_toml(toml_str: &str) -> Result<Self> {
        toml::from_str(toml_str).map_err(|e| Error::Validation(format!("policy parse error: {e}")))
    }

    /// Deserialize a `Policy` from a JSON string.
    pub fn from_json(json_str: &str) -> Result<Self> {
        serde_json::from_str(json_str)
            .map_err(|e| Error::Validation(format!("policy parse error: {e}")))
    }

    /// Load a policy file, choosing the format by extension (`.json` is
    /// JSON, anything else is TOML).
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let is_json = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("json"));
        let policy = if is_json {
            Self::from_json(&contents)?
        } else {
            Self::from_toml(&contents)?
        };
        tracing::debug!("Loaded policy from {}", path.display());
        Ok(policy)
    }

    /// Serialize the policy as pretty TOML.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Internal(format!("policy encode: {e}")))
    }

    /// Return a list of validation warnings (non-fatal issues).
    pub fn validate(&self) -> Vec<String> {
        let mut warnings = Vec::new();
        for validator in VALIDATORS {
            validator(self, &mut warnings);
        }
        warnings
    }
}

type Validator = fn(&Policy, &mut Vec<String>);

const VALIDATORS: &[Validator] = &[
    validate_pools,
    validate_rate_control,
    validate_languages,
    validate_aspect,
    validate_channel_filters,
    validate_subtitles,
];

fn validate_pools(policy: &Policy, warnings: &mut Vec<String>) {
    if policy.video.codecs.is_empty() {
        warnings.push("video.codecs is empty; video streams keep their source codec".into());
    }
    if policy.audio.codecs.is_empty() {
        warnings.push("audio.codecs is empty; audio streams keep their source codec".into());
    }
    if let Some(ref universal) = policy.audio.universal {
        if universal.codecs.is_empty() {
            warnings.push("audio.universal.codecs is empty; no companion streams are added".into());
        }
    }
}

fn validate_rate_control(policy: &Policy, warnings: &mut Vec<String>) {
    let video = &policy.video;
    if video.crf.is_some() && video.max_bitrate > 0 {
        warnings.push(
            "video.crf and video.max_bitrate are both set; crf takes precedence for rate control"
                .into(),
        );
    }
    for (codec, ratio) in &video.bitrate_ratio {
        if !ratio.is_finite() || *ratio <= 0.0 {
            warnings.push(format!("video.bitrate_ratio['{codec}'] = {ratio} is not positive"));
        }
    }
    for (i, profile) in video.crf_profiles.iter().enumerate() {
        if profile.crf == 0 {
            warnings.push(format!("video.crf_profiles[{i}].crf is 0 (lossless)"));
        }
    }
}

fn validate_languages(policy: &Policy, warnings: &mut Vec<String>) {
    for (section, selection) in [
        ("audio", &policy.audio.selection),
        ("subtitle", &policy.subtitle.selection),
    ] {
        for code in selection
            .languages
            .iter()
            .chain(selection.default_language.iter())
        {
            if lang::normalize(code).is_none() {
                warnings.push(format!("{section}: '{code}' is not an ISO 639 language code"));
            }
        }
    }
}

fn validate_aspect(policy: &Policy, warnings: &mut Vec<String>) {
    if let Some(ref aspect) = policy.video.aspect {
        if aspect.width.is_none() && aspect.height.is_none() {
            warnings.push("video.aspect has neither width nor height; it is ignored".into());
        }
    }
}

fn validate_channel_filters(policy: &Policy, warnings: &mut Vec<String>) {
    for key in policy.audio.channel_filters.keys() {
        if key.parse::<u32>().is_err() {
            warnings.push(format!(
                "audio.channel_filters key '{key}' is not a channel count"
            ));
        }
    }
}

fn validate_subtitles(policy: &Policy, warnings: &mut Vec<String>) {
    let sub = &policy.subtitle;
    if sub.embed_image && sub.image_codecs.is_empty() {
        warnings.push("subtitle.embed_image is set but subtitle.image_codecs is empty".into());
    }
    if sub.burn.enabled && sub.burn.dispositions.is_empty() {
        warnings.push("subtitle.burn has no dispositions; any text subtitle may be burned".into());
    }
}

// ---------------------------------------------------------------------------
// Video
// ---------------------------------------------------------------------------

/// Video stream policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct VideoPolicy {
    /// Approved codecs, in preference order. The first is the encode target.
    pub codecs: Vec<String>,
    /// Bitrate ceiling in kbps (0 disables).
    #[serde(deserialize_with = "lenient::ceiling")]
    pub max_bitrate: u32,
    /// Multiplier applied to the estimated bitrate, keyed by source codec
    /// (`*` is the fallback).
    pub bitrate_ratio: BTreeMap<String, f64>,
    #[serde(deserialize_with = "lenient::opt_u32")]
    pub crf: Option<u32>,
    pub crf_profiles: Vec<CrfProfile>,
    pub preset: Option<String>,
    /// Width ceiling in pixels (0 disables).
    #[serde(deserialize_with = "lenient::ceiling")]
    pub max_width: u32,
    #[serde(deserialize_with = "lenient::opt_f64")]
    pub max_level: Option<f64>,
    pub profiles: Vec<String>,
    pub pix_fmts: Vec<String>,
    pub filter: Option<String>,
    pub force_filter: bool,
    /// Filter applied to interlaced sources.
    pub deinterlace: Option<String>,
    pub aspect: Option<AspectPolicy>,
    pub hdr: HdrPolicy,
}

impl Default for VideoPolicy {
    fn default() -> Self {
        Self {
            codecs: vec!["h264".into()],
            max_bitrate: 0,
            bitrate_ratio: BTreeMap::new(),
            crf: None,
            crf_profiles: Vec::new(),
            preset: None,
            max_width: 0,
            max_level: None,
            profiles: Vec::new(),
            pix_fmts: Vec::new(),
            filter: None,
            force_filter: false,
            deinterlace: None,
            aspect: None,
            hdr: HdrPolicy::default(),
        }
    }
}

impl VideoPolicy {
    /// Bitrate ratio for a source codec, falling back to `*` and then 1.0.
    pub fn ratio_for(&self, codec: &str) -> f64 {
        self.bitrate_ratio
            .get(codec)
            .or_else(|| self.bitrate_ratio.get("*"))
            .copied()
            .unwrap_or(1.0)
    }
}

/// One CRF bracket: sources whose estimated bitrate is above
/// `source_bitrate` (kbps) are encoded with these settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CrfProfile {
    #[serde(deserialize_with = "lenient::ceiling")]
    pub source_bitrate: u32,
    #[serde(deserialize_with = "lenient::ceiling")]
    pub crf: u32,
    pub maxrate: Option<String>,
    pub bufsize: Option<String>,
}

/// Desired output geometry. A missing dimension is derived from the source
/// aspect ratio.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AspectPolicy {
    #[serde(deserialize_with = "lenient::opt_u32")]
    pub width: Option<u32>,
    #[serde(deserialize_with = "lenient::opt_u32")]
    pub height: Option<u32>,
    pub mode: AspectMode,
}

/// How to reach a desired geometry whose aspect differs from the source.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AspectMode {
    #[default]
    Stretch,
    Crop,
    Pad,
}

impl fmt::Display for AspectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stretch => write!(f, "stretch"),
            Self::Crop => write!(f, "crop"),
            Self::Pad => write!(f, "pad"),
        }
    }
}

/// HDR classification predicate and the encode settings used for HDR
/// sources. Empty encode settings fall back to the SDR ones.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HdrPolicy {
    pub codecs: Vec<String>,
    pub profiles: Vec<String>,
    pub pix_fmts: Vec<String>,
    pub filter: Option<String>,
    pub force_filter: bool,
    pub space: Vec<String>,
    pub transfer: Vec<String>,
    pub primaries: Vec<String>,
}

impl Default for HdrPolicy {
    fn default() -> Self {
        Self {
            codecs: Vec::new(),
            profiles: Vec::new(),
            pix_fmts: Vec::new(),
            filter: None,
            force_filter: false,
            space: vec!["bt2020nc".into()],
            transfer: vec!["smpte2084".into()],
            primaries: vec!["bt2020".into()],
        }
    }
}

impl HdrPolicy {
    /// Whether a stream with these color properties counts as HDR. Each
    /// property must be in its configured set; an empty set matches anything.
    pub fn matches(
        &self,
        space: Option<&str>,
        transfer: Option<&str>,
        primaries: Option<&str>,
    ) -> bool {
        fn member(set: &[String], value: Option<&str>) -> bool {
            set.is_empty() || value.is_some_and(|v| set.iter().any(|s| s.eq_ignore_ascii_case(v)))
        }
        member(&self.space, space)
            && member(&self.transfer, transfer)
            && member(&self.primaries, primaries)
    }
}

// ---------------------------------------------------------------------------
// Stream selection (shared by audio and subtitles)
// ---------------------------------------------------------------------------

/// Language and disposition rules deciding which source streams are kept.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct StreamSelection {
    /// Allowed languages, in priority order. Empty allows every language.
    pub languages: Vec<String>,
    pub default_language: Option<String>,
    pub first_stream_of_language: bool,
    pub ignored_dispositions: DispositionSet,
    pub unique_dispositions: bool,
    /// Keep any stream flagged default regardless of the other rules.
    pub force_default: bool,
    pub include_original_language: bool,
    /// Treat `und` streams as the default language.
    pub undefined_as_default: bool,
    pub sort_keys: Vec<SortKey>,
    pub default_sort_keys: Vec<SortKey>,
}

// ---------------------------------------------------------------------------
// Audio
// ---------------------------------------------------------------------------

/// Audio stream policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AudioPolicy {
    pub codecs: Vec<String>,
    #[serde(flatten)]
    pub selection: StreamSelection,
    /// Target kbps per channel (0 uses the source rate).
    #[serde(deserialize_with = "lenient::channel_rate")]
    pub channel_bitrate: u32,
    #[serde(deserialize_with = "lenient::ceiling")]
    pub max_bitrate: u32,
    #[serde(deserialize_with = "lenient::ceiling")]
    pub max_channels: u32,
    pub filter: Option<String>,
    pub force_filter: bool,
    pub profile: Option<String>,
    /// Downmix filter keyed by target channel count.
    pub channel_filters: BTreeMap<String, String>,
    pub copy_original: bool,
    pub keep_titles: bool,
    /// Codec lists whose consecutive same-language streams are duplicates
    /// of each other.
    pub combinations: Vec<Vec<String>>,
    pub universal: Option<UniversalAudioPolicy>,
}

impl Default for AudioPolicy {
    fn default() -> Self {
        Self {
            codecs: vec!["aac".into()],
            selection: StreamSelection::default(),
            channel_bitrate: lenient::DEFAULT_CHANNEL_BITRATE,
            max_bitrate: 0,
            max_channels: 0,
            filter: None,
            force_filter: false,
            profile: None,
            channel_filters: BTreeMap::new(),
            copy_original: false,
            keep_titles: false,
            combinations: Vec::new(),
            universal: None,
        }
    }
}

impl AudioPolicy {
    /// Downmix filter configured for a target channel count.
    pub fn channel_filter(&self, channels: u32) -> Option<&str> {
        self.channel_filters
            .iter()
            .find(|(k, _)| k.trim().parse::<u32>().ok() == Some(channels))
            .map(|(_, v)| v.as_str())
    }
}

/// Two-channel companion stream added next to multichannel audio.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct UniversalAudioPolicy {
    pub codecs: Vec<String>,
    #[serde(deserialize_with = "lenient::channel_rate")]
    pub channel_bitrate: u32,
    pub filter: Option<String>,
    pub force_filter: bool,
    pub profile: Option<String>,
    pub first_stream_only: bool,
}

impl Default for UniversalAudioPolicy {
    fn default() -> Self {
        Self {
            codecs: vec!["aac".into()],
            channel_bitrate: lenient::DEFAULT_CHANNEL_BITRATE,
            filter: None,
            force_filter: false,
            profile: None,
            first_stream_only: false,
        }
    }
}

// ---------------------------------------------------------------------------
// Subtitles
// ---------------------------------------------------------------------------

/// Subtitle stream policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubtitlePolicy {
    /// Text subtitle codecs allowed in the output container.
    pub codecs: Vec<String>,
    /// Image subtitle codecs allowed in the output container.
    pub image_codecs: Vec<String>,
    #[serde(flatten)]
    pub selection: StreamSelection,
    pub embed: bool,
    pub embed_image: bool,
    pub include_external: bool,
    pub keep_titles: bool,
    pub rip: RipPolicy,
    pub burn: BurnPolicy,
}

impl Default for SubtitlePolicy {
    fn default() -> Self {
        Self {
            codecs: vec!["mov_text".into()],
            image_codecs: Vec::new(),
            selection: StreamSelection::default(),
            embed: true,
            embed_image: false,
            include_external: true,
            keep_titles: false,
            rip: RipPolicy::default(),
            burn: BurnPolicy::default(),
        }
    }
}

/// Extraction of subtitles that are not embedded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RipPolicy {
    pub codecs: Vec<String>,
    pub image_codecs: Vec<String>,
    /// Dispositions that become tokens in the extracted filename.
    pub filename_dispositions: DispositionSet,
}

impl Default for RipPolicy {
    fn default() -> Self {
        Self {
            codecs: Vec::new(),
            image_codecs: Vec::new(),
            filename_dispositions: [Disposition::Forced, Disposition::HearingImpaired]
                .into_iter()
                .collect(),
        }
    }
}

/// Burn-in of one text subtitle into the video.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BurnPolicy {
    pub enabled: bool,
    /// A candidate must carry every one of these.
    pub dispositions: DispositionSet,
    pub sort_keys: Vec<SortKey>,
}

impl Default for BurnPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            dispositions: [Disposition::Forced].into_iter().collect(),
            sort_keys: Vec::new(),
        }
    }
}

// ---------------------------------------------------------------------------
// Attachments
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AttachmentPolicy {
    pub codecs: Vec<String>,
    pub mimetypes: Vec<String>,
}

impl Default for AttachmentPolicy {
    fn default() -> Self {
        Self {
            codecs: vec!["ttf".into(), "otf".into()],
            mimetypes: vec![
                "application/x-truetype-font".into(),
                "application/vnd.ms-opentype".into(),
                "font/ttf".into(),
                "font/otf".into(),
            ],
        }
    }
}

// ---------------------------------------------------------------------------
// Sort keys
// ---------------------------------------------------------------------------

/// The field a [`SortKey`] orders by.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SortField {
    /// Rank in the kind's codec pool.
    Codec,
    Channels,
    Bitrate,
    /// Rank in the language allow-list.
    Language,
    /// Whether the stream is in the source's original language.
    OriginalLanguage,
    /// Source index.
    Map,
    /// Whether the stream carries the disposition.
    Disposition(Disposition),
}

/// One sort criterion, written as `field[.a|.d]` or `d.<disposition>[.a|.d]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SortKey {
    pub field: SortField,
    pub descending: bool,
}

impl SortKey {
    pub fn asc(field: SortField) -> Self {
        Self {
            field,
            descending: false,
        }
    }

    pub fn desc(field: SortField) -> Self {
        Self {
            field,
            descending: true,
        }
    }
}

impl FromStr for SortKey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let lower = s.trim().to_ascii_lowercase();
        let mut tokens: Vec<&str> = lower.split('.').collect();

        let mut descending = false;
        if tokens.len() > 1 {
            match tokens[tokens.len() - 1] {
                "d" | "desc" => {
                    descending = true;
                    tokens.pop();
                }
                "a" | "asc" => {
                    tokens.pop();
                }
                _ => {}
            }
        }

        let field = match tokens.as_slice() {
            ["codec"] => SortField::Codec,
            ["channels"] => SortField::Channels,
            ["bitrate"] => SortField::Bitrate,
            ["language"] => SortField::Language,
            ["original-language"] | ["original_language"] => SortField::OriginalLanguage,
            ["map"] => SortField::Map,
            ["d", name] => SortField::Disposition(
                name.parse()
                    .map_err(|e: String| Error::Validation(format!("sort key '{s}': {e}")))?,
            ),
            _ => return Err(Error::Validation(format!("unknown sort key '{s}'"))),
        };

        Ok(Self { field, descending })
    }
}

impl TryFrom<String> for SortKey {
    type Error = Error;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

impl From<SortKey> for String {
    fn from(key: SortKey) -> Self {
        key.to_string()
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.field {
            SortField::Codec => write!(f, "codec")?,
            SortField::Channels => write!(f, "channels")?,
            SortField::Bitrate => write!(f, "bitrate")?,
            SortField::Language => write!(f, "language")?,
            SortField::OriginalLanguage => write!(f, "original-language")?,
            SortField::Map => write!(f, "map")?,
            SortField::Disposition(d) => write!(f, "d.{d}")?,
        }
        if self.descending {
            write!(f, ".d")?;
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Lenient numeric parsing
// ---------------------------------------------------------------------------

mod lenient {
    use serde::de::IgnoredAny;
    use serde::{Deserialize, Deserializer};

    pub const DEFAULT_CHANNEL_BITRATE: u32 = 128;

    #[derive(Debug, Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(i64),
        Float(f64),
        Text(String),
        Other(IgnoredAny),
    }

    fn number<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        let raw = Raw::deserialize(d)?;
        let value = match &raw {
            Raw::Int(i) => Some(*i as f64),
            Raw::Float(f) if f.is_finite() => Some(*f),
            Raw::Text(s) => s.trim().parse::<f64>().ok().filter(|f| f.is_finite()),
            _ => None,
        };
        let value = value.filter(|v| *v >= 0.0);
        if value.is_none() {
            tracing::warn!("Ignoring malformed numeric policy value {raw:?}; using default");
        }
        Ok(value)
    }

    fn to_u32(v: f64) -> u32 {
        v.round().min(u32::MAX as f64) as u32
    }

    /// Ceiling values; malformed becomes 0 (disabled).
    pub fn ceiling<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(number(d)?.map(to_u32).unwrap_or(0))
    }

    /// Per-channel bitrate; malformed becomes 128.
    pub fn channel_rate<'de, D: Deserializer<'de>>(d: D) -> Result<u32, D::Error> {
        Ok(number(d)?.map(to_u32).unwrap_or(DEFAULT_CHANNEL_BITRATE))
    }

    pub fn opt_u32<'de, D: Deserializer<'de>>(d: D) -> Result<Option<u32>, D::Error> {
        Ok(number(d)?.map(to_u32))
    }

    pub fn opt_f64<'de, D: Deserializer<'de>>(d: D) -> Result<Option<f64>, D::Error> {
        number(d)
    }
}
