//! Core types for the probed source model.

use std::path::{Path, PathBuf};
use std::time::Duration;

use ep_core::lang;
use ep_core::{Disposition, DispositionSet, StreamKind};
use serde::{Deserialize, Serialize};

/// Complete description of a source media file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceFile {
    /// Path to the probed file.
    pub path: PathBuf,
    /// Container format name as reported by the prober (e.g. `matroska,webm`).
    pub format: String,
    /// Total container bitrate in bits per second.
    pub bitrate: Option<u64>,
    /// Total duration (if determinable).
    pub duration: Option<Duration>,
    /// Streams in source order.
    pub streams: Vec<Stream>,
    /// Original language of the title, when known from metadata.
    #[serde(default)]
    pub original_language: Option<String>,
    /// Subtitle files found next to the source.
    #[serde(default)]
    pub external_subtitles: Vec<ExternalSubtitle>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>, format: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            format: format.into(),
            bitrate: None,
            duration: None,
            streams: Vec::new(),
            original_language: None,
            external_subtitles: Vec::new(),
        }
    }

    /// Streams of one kind, in source order.
    pub fn streams_of(&self, kind: StreamKind) -> impl Iterator<Item = &Stream> {
        self.streams.iter().filter(move |s| s.kind() == kind)
    }

    pub fn has(&self, kind: StreamKind) -> bool {
        self.streams_of(kind).next().is_some()
    }

    /// The first video stream.
    pub fn primary_video(&self) -> Option<&Stream> {
        self.streams_of(StreamKind::Video).next()
    }

    /// File name without its final extension.
    pub fn stem(&self) -> Option<&str> {
        self.path.file_stem().and_then(|s| s.to_str())
    }

    /// Whether the container is an MPEG transport stream.
    pub fn is_mpegts(&self) -> bool {
        self.format.split(',').any(|f| f.trim() == "mpegts")
    }
}

/// A single stream within a source file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Stream {
    /// Source stream index; unique within the file.
    pub index: u32,
    /// Codec identifier (e.g. `h264`, `ac3`, `subrip`).
    pub codec: String,
    /// ISO 639-2/T language, `und` when untagged.
    pub language: String,
    pub disposition: DispositionSet,
    pub title: Option<String>,
    /// Stream bitrate in bits per second.
    pub bitrate: Option<u64>,
    pub details: StreamDetails,
}

impl Stream {
    fn new(index: u32, codec: &str, details: StreamDetails) -> Self {
        Self {
            index,
            codec: codec.to_string(),
            language: lang::UNDEFINED.to_string(),
            disposition: DispositionSet::empty(),
            title: None,
            bitrate: None,
            details,
        }
    }

    pub fn video(index: u32, codec: &str, width: u32, height: u32) -> Self {
        Self::new(
            index,
            codec,
            StreamDetails::Video(VideoInfo {
                width,
                height,
                ..VideoInfo::default()
            }),
        )
    }

    pub fn audio(index: u32, codec: &str, channels: u32) -> Self {
        Self::new(
            index,
            codec,
            StreamDetails::Audio(AudioInfo {
                channels,
                sample_rate: None,
            }),
        )
    }

    pub fn subtitle(index: u32, codec: &str) -> Self {
        Self::new(
            index,
            codec,
            StreamDetails::Subtitle(SubtitleInfo { image_based: None }),
        )
    }

    pub fn attachment(index: u32, codec: &str, filename: &str, mimetype: &str) -> Self {
        Self::new(
            index,
            codec,
            StreamDetails::Attachment(AttachmentInfo {
                filename: Some(filename.to_string()),
                mimetype: Some(mimetype.to_string()),
            }),
        )
    }

    /// Set the language, normalising it to ISO 639-2/T.
    pub fn with_language(mut self, code: &str) -> Self {
        self.language = lang::normalize_or_und(Some(code));
        self
    }

    pub fn with_disposition(mut self, d: Disposition) -> Self {
        self.disposition.insert(d);
        self
    }

    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Set the bitrate in bits per second.
    pub fn with_bitrate(mut self, bps: u64) -> Self {
        self.bitrate = Some(bps);
        self
    }

    pub fn kind(&self) -> StreamKind {
        match self.details {
            StreamDetails::Video(_) => StreamKind::Video,
            StreamDetails::Audio(_) => StreamKind::Audio,
            StreamDetails::Subtitle(_) => StreamKind::Subtitle,
            StreamDetails::Attachment(_) => StreamKind::Attachment,
        }
    }

    pub fn is_default(&self) -> bool {
        self.disposition.contains(Disposition::Default)
    }

    pub fn video_info(&self) -> Option<&VideoInfo> {
        match &self.details {
            StreamDetails::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn video_info_mut(&mut self) -> Option<&mut VideoInfo> {
        match &mut self.details {
            StreamDetails::Video(v) => Some(v),
            _ => None,
        }
    }

    pub fn audio_info(&self) -> Option<&AudioInfo> {
        match &self.details {
            StreamDetails::Audio(a) => Some(a),
            _ => None,
        }
    }

    pub fn subtitle_info(&self) -> Option<&SubtitleInfo> {
        match &self.details {
            StreamDetails::Subtitle(s) => Some(s),
            _ => None,
        }
    }

    pub fn attachment_info(&self) -> Option<&AttachmentInfo> {
        match &self.details {
            StreamDetails::Attachment(a) => Some(a),
            _ => None,
        }
    }

    /// Channel count for audio streams.
    pub fn channels(&self) -> Option<u32> {
        self.audio_info().map(|a| a.channels)
    }
}

/// Kind-specific stream fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum StreamDetails {
    Video(VideoInfo),
    Audio(AudioInfo),
    Subtitle(SubtitleInfo),
    Attachment(AttachmentInfo),
}

/// Video stream properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct VideoInfo {
    pub width: u32,
    pub height: u32,
    pub fps: Option<f64>,
    pub pix_fmt: Option<String>,
    pub profile: Option<String>,
    /// Normalised codec level (e.g. 4.1).
    pub level: Option<f64>,
    pub field_order: Option<String>,
    #[serde(default)]
    pub color: ColorInfo,
    #[serde(default)]
    pub mastering_display: Option<MasteringDisplay>,
    #[serde(default)]
    pub content_light: Option<ContentLight>,
    /// Dolby Vision profile, when a configuration record is present.
    #[serde(default)]
    pub dv_profile: Option<u8>,
}

impl VideoInfo {
    /// Whether the field order indicates interlaced content.
    pub fn is_interlaced(&self) -> bool {
        matches!(
            self.field_order.as_deref(),
            Some("tt" | "bb" | "tb" | "bt")
        )
    }
}

/// Colorimetry tags.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorInfo {
    pub primaries: Option<String>,
    pub transfer: Option<String>,
    pub space: Option<String>,
}

/// SMPTE ST 2086 mastering display color volume.
///
/// Chromaticities are CIE 1931 xy coordinates; luminance is in cd/m².
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MasteringDisplay {
    pub red: (f64, f64),
    pub green: (f64, f64),
    pub blue: (f64, f64),
    pub white_point: (f64, f64),
    pub min_luminance: f64,
    pub max_luminance: f64,
}

impl MasteringDisplay {
    /// x265 `master-display` value: chromaticities in 0.00002 units,
    /// luminance in 0.0001 cd/m² units.
    pub fn to_x265(&self) -> String {
        let c = |v: f64| (v * 50_000.0).round() as u64;
        let l = |v: f64| (v * 10_000.0).round() as u64;
        format!(
            "G({},{})B({},{})R({},{})WP({},{})L({},{})",
            c(self.green.0),
            c(self.green.1),
            c(self.blue.0),
            c(self.blue.1),
            c(self.red.0),
            c(self.red.1),
            c(self.white_point.0),
            c(self.white_point.1),
            l(self.max_luminance),
            l(self.min_luminance),
        )
    }
}

/// CTA-861.3 content light level.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContentLight {
    pub max_content: u32,
    pub max_average: u32,
}

/// Audio stream properties.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AudioInfo {
    pub channels: u32,
    pub sample_rate: Option<u32>,
}

/// Subtitle stream properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubtitleInfo {
    /// Image/text classification; `None` until classified.
    pub image_based: Option<bool>,
}

/// Attachment stream properties.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AttachmentInfo {
    pub filename: Option<String>,
    pub mimetype: Option<String>,
}

/// A subtitle file found next to the source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSubtitle {
    pub path: PathBuf,
    pub codec: String,
    pub language: String,
    pub disposition: DispositionSet,
    /// Image/text classification; `None` until classified.
    #[serde(default)]
    pub image_based: Option<bool>,
}

impl ExternalSubtitle {
    pub fn file_name(&self) -> Option<&str> {
        self.path.file_name().and_then(|n| n.to_str())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> SourceFile {
        let mut source = SourceFile::new("/media/Movie (2020).mkv", "matroska,webm");
        source.streams = vec![
            Stream::video(0, "h264", 1920, 1080),
            Stream::audio(1, "ac3", 6).with_language("en"),
            Stream::audio(2, "aac", 2).with_language("fre"),
            Stream::subtitle(3, "subrip").with_disposition(Disposition::Forced),
        ];
        source
    }

    #[test]
    fn streams_of_kind() {
        let source = sample();
        assert_eq!(source.streams_of(StreamKind::Audio).count(), 2);
        assert!(source.has(StreamKind::Subtitle));
        assert!(!source.has(StreamKind::Attachment));
        assert_eq!(source.primary_video().unwrap().index, 0);
        assert_eq!(source.stem(), Some("Movie (2020)"));
    }

    #[test]
    fn builder_normalises_language() {
        let source = sample();
        assert_eq!(source.streams[1].language, "eng");
        assert_eq!(source.streams[2].language, "fra");
        assert_eq!(source.streams[0].language, "und");
        assert_eq!(source.streams[1].channels(), Some(6));
        assert_eq!(source.streams[3].kind(), StreamKind::Subtitle);
    }

    #[test]
    fn interlaced_field_orders() {
        let mut info = VideoInfo::default();
        assert!(!info.is_interlaced());
        info.field_order = Some("progressive".into());
        assert!(!info.is_interlaced());
        info.field_order = Some("tt".into());
        assert!(info.is_interlaced());
    }

    #[test]
    fn mastering_display_x265() {
        let md = MasteringDisplay {
            red: (0.68, 0.32),
            green: (0.265, 0.69),
            blue: (0.15, 0.06),
            white_point: (0.3127, 0.329),
            min_luminance: 0.005,
            max_luminance: 1000.0,
        };
        assert_eq!(
            md.to_x265(),
            "G(13250,34500)B(7500,3000)R(34000,16000)WP(15635,16450)L(10000000,50)"
        );
    }

    #[test]
    fn mpegts_detection() {
        let mut source = SourceFile::new("/a.ts", "mpegts");
        assert!(source.is_mpegts());
        source.format = "matroska,webm".into();
        assert!(!source.is_mpegts());
    }
}
