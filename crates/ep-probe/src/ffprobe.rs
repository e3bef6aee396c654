//! FFprobe-based [`Prober`] implementation.
//!
//! Shells out to `ffprobe -v quiet -print_format json -show_format -show_streams`
//! and maps the JSON output into [`SourceFile`]. The mapping itself is
//! exposed as [`parse_output`] so saved probe dumps can be compiled without
//! ffprobe installed.

use std::path::{Path, PathBuf};
use std::process::Command;
use std::time::Duration;

use ep_core::{lang, Disposition, DispositionSet, Error, StreamKind};
use serde::Deserialize;

use crate::prober::Prober;
use crate::types::{
    AttachmentInfo, AudioInfo, ColorInfo, ContentLight, MasteringDisplay, SourceFile, Stream,
    StreamDetails, SubtitleInfo, VideoInfo,
};

/// A prober backed by the `ffprobe` CLI.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    /// Path to the ffprobe binary.
    ffprobe_path: PathBuf,
}

impl FfprobeProber {
    /// Create a new prober using the given ffprobe path.
    pub fn new(ffprobe_path: PathBuf) -> Self {
        Self { ffprobe_path }
    }

    /// Create a prober that finds ffprobe on `PATH`.
    pub fn from_path() -> Option<Self> {
        which::which("ffprobe")
            .ok()
            .map(|p| Self { ffprobe_path: p })
    }
}

impl Prober for FfprobeProber {
    fn name(&self) -> &'static str {
        "ffprobe"
    }

    fn probe(&self, path: &Path) -> ep_core::Result<SourceFile> {
        tracing::debug!("Probing {} with {}", path.display(), self.ffprobe_path.display());
        let output = Command::new(&self.ffprobe_path)
            .args([
                "-v",
                "quiet",
                "-print_format",
                "json",
                "-show_format",
                "-show_streams",
            ])
            .arg(path)
            .output()
            .map_err(|e| Error::tool("ffprobe", format!("failed to spawn: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::tool(
                "ffprobe",
                format!("exited with {}: {}", output.status, stderr.trim()),
            ));
        }

        parse_output(path, &String::from_utf8_lossy(&output.stdout))
    }

    fn supports(&self, path: &Path) -> bool {
        path.extension().is_some()
    }
}

/// Map ffprobe JSON output for `path` into a [`SourceFile`].
pub fn parse_output(path: &Path, json: &str) -> ep_core::Result<SourceFile> {
    let ff: FfprobeOutput = serde_json::from_str(json)
        .map_err(|e| Error::Probe(format!("ffprobe JSON parse error: {e}")))?;
    map_output(path, ff)
}

// ---------------------------------------------------------------------------
// JSON structures
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    #[serde(default)]
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeStream {
    index: u32,
    codec_type: Option<String>,
    codec_name: Option<String>,
    profile: Option<String>,
    level: Option<i64>,
    width: Option<u32>,
    height: Option<u32>,
    pix_fmt: Option<String>,
    r_frame_rate: Option<String>,
    field_order: Option<String>,
    color_primaries: Option<String>,
    color_transfer: Option<String>,
    color_space: Option<String>,
    channels: Option<u32>,
    sample_rate: Option<String>,
    bit_rate: Option<String>,
    #[serde(default)]
    disposition: FfprobeDisposition,
    #[serde(default)]
    tags: FfprobeTags,
    #[serde(default)]
    side_data_list: Vec<FfprobeSideData>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FfprobeDisposition {
    default: u8,
    forced: u8,
    comment: u8,
    hearing_impaired: u8,
    visual_impaired: u8,
    captions: u8,
    dub: u8,
    original: u8,
    lyrics: u8,
    karaoke: u8,
    attached_pic: u8,
}

impl FfprobeDisposition {
    fn to_set(&self) -> DispositionSet {
        let flags = [
            (Disposition::Default, self.default),
            (Disposition::Forced, self.forced),
            (Disposition::Comment, self.comment),
            (Disposition::HearingImpaired, self.hearing_impaired),
            (Disposition::VisualImpaired, self.visual_impaired),
            (Disposition::Captions, self.captions),
            (Disposition::Dub, self.dub),
            (Disposition::Original, self.original),
            (Disposition::Lyrics, self.lyrics),
            (Disposition::Karaoke, self.karaoke),
        ];
        flags
            .into_iter()
            .filter(|(_, v)| *v != 0)
            .map(|(d, _)| d)
            .collect()
    }
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeTags {
    language: Option<String>,
    title: Option<String>,
    filename: Option<String>,
    mimetype: Option<String>,
    #[serde(rename = "BPS")]
    bps: Option<String>,
    #[serde(rename = "BPS-eng")]
    bps_eng: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct FfprobeSideData {
    side_data_type: Option<String>,
    red_x: Option<String>,
    red_y: Option<String>,
    green_x: Option<String>,
    green_y: Option<String>,
    blue_x: Option<String>,
    blue_y: Option<String>,
    white_point_x: Option<String>,
    white_point_y: Option<String>,
    min_luminance: Option<String>,
    max_luminance: Option<String>,
    max_content: Option<u32>,
    max_average: Option<u32>,
    dv_profile: Option<u8>,
}

// ---------------------------------------------------------------------------
// Parsing helpers
// ---------------------------------------------------------------------------

fn map_output(path: &Path, output: FfprobeOutput) -> ep_core::Result<SourceFile> {
    let mut source = SourceFile::new(path, output.format.format_name.unwrap_or_default());
    source.duration = output
        .format
        .duration
        .and_then(|s| s.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d >= 0.0)
        .map(Duration::from_secs_f64);
    source.bitrate = output.format.bit_rate.and_then(|s| s.parse().ok());

    for stream in output.streams {
        let codec_type = stream.codec_type.as_deref().unwrap_or("");
        let details = match codec_type {
            "video" if stream.disposition.attached_pic != 0 => {
                tracing::debug!("Skipping cover art stream {}", stream.index);
                continue;
            }
            "video" => StreamDetails::Video(video_info(&stream)),
            "audio" => StreamDetails::Audio(AudioInfo {
                channels: stream.channels.unwrap_or(2),
                sample_rate: stream.sample_rate.as_deref().and_then(|s| s.parse().ok()),
            }),
            "subtitle" => StreamDetails::Subtitle(SubtitleInfo::default()),
            "attachment" => StreamDetails::Attachment(AttachmentInfo {
                filename: stream.tags.filename.clone(),
                mimetype: stream.tags.mimetype.clone(),
            }),
            other => {
                tracing::debug!("Skipping stream {} of type '{other}'", stream.index);
                continue;
            }
        };

        let bitrate = stream
            .bit_rate
            .as_deref()
            .or(stream.tags.bps.as_deref())
            .or(stream.tags.bps_eng.as_deref())
            .and_then(|s| s.trim().parse::<u64>().ok());

        source.streams.push(Stream {
            index: stream.index,
            codec: stream.codec_name.clone().unwrap_or_default(),
            language: lang::normalize_or_und(stream.tags.language.as_deref()),
            disposition: stream.disposition.to_set(),
            title: stream.tags.title.clone(),
            bitrate,
            details,
        });
    }

    if !source.has(StreamKind::Video) && !source.has(StreamKind::Audio) {
        return Err(Error::InvalidSource(format!(
            "{} has no audio or video streams",
            path.display()
        )));
    }

    Ok(source)
}

fn video_info(stream: &FfprobeStream) -> VideoInfo {
    let codec = stream.codec_name.as_deref().unwrap_or("");
    let mut info = VideoInfo {
        width: stream.width.unwrap_or(0),
        height: stream.height.unwrap_or(0),
        fps: stream.r_frame_rate.as_deref().and_then(parse_frame_rate),
        pix_fmt: stream.pix_fmt.clone(),
        profile: stream.profile.as_ref().map(|p| p.to_ascii_lowercase()),
        level: stream.level.and_then(|l| normalize_level(codec, l)),
        field_order: stream.field_order.clone(),
        color: ColorInfo {
            primaries: stream.color_primaries.clone(),
            transfer: stream.color_transfer.clone(),
            space: stream.color_space.clone(),
        },
        ..VideoInfo::default()
    };

    for sd in &stream.side_data_list {
        match sd.side_data_type.as_deref() {
            Some("Mastering display metadata") => info.mastering_display = mastering_display(sd),
            Some("Content light level metadata") => {
                info.content_light = Some(ContentLight {
                    max_content: sd.max_content.unwrap_or(0),
                    max_average: sd.max_average.unwrap_or(0),
                });
            }
            Some("DOVI configuration record") => info.dv_profile = sd.dv_profile,
            _ => {}
        }
    }

    info
}

/// ffprobe reports H.264 levels ×10 and HEVC levels ×30.
fn normalize_level(codec: &str, level: i64) -> Option<f64> {
    if level <= 0 {
        return None;
    }
    let level = level as f64;
    Some(match codec {
        "h264" => level / 10.0,
        "hevc" => level / 30.0,
        _ => level,
    })
}

fn mastering_display(sd: &FfprobeSideData) -> Option<MasteringDisplay> {
    let r = |v: &Option<String>| v.as_deref().and_then(parse_rational);
    Some(MasteringDisplay {
        red: (r(&sd.red_x)?, r(&sd.red_y)?),
        green: (r(&sd.green_x)?, r(&sd.green_y)?),
        blue: (r(&sd.blue_x)?, r(&sd.blue_y)?),
        white_point: (r(&sd.white_point_x)?, r(&sd.white_point_y)?),
        min_luminance: r(&sd.min_luminance)?,
        max_luminance: r(&sd.max_luminance)?,
    })
}

fn parse_rational(s: &str) -> Option<f64> {
    let (num, den) = match s.split_once('/') {
        Some((n, d)) => (n.trim().parse::<f64>().ok()?, d.trim().parse::<f64>().ok()?),
        None => (s.trim().parse::<f64>().ok()?, 1.0),
    };
    (den != 0.0).then(|| num / den)
}

fn parse_frame_rate(rate_str: &str) -> Option<f64> {
    parse_rational(rate_str).filter(|r| *r > 0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "streams": [
            {
                "index": 0, "codec_type": "video", "codec_name": "hevc",
                "profile": "Main 10", "level": 150, "width": 3840, "height": 2160,
                "pix_fmt": "yuv420p10le", "r_frame_rate": "24000/1001",
                "field_order": "progressive", "color_space": "bt2020nc",
                "color_transfer": "smpte2084", "color_primaries": "bt2020",
                "disposition": {"default": 1, "attached_pic": 0},
                "side_data_list": [
                    {"side_data_type": "Mastering display metadata",
                     "red_x": "34000/50000", "red_y": "16000/50000",
                     "green_x": "13250/50000", "green_y": "34500/50000",
                     "blue_x": "7500/50000", "blue_y": "3000/50000",
                     "white_point_x": "15635/50000", "white_point_y": "16450/50000",
                     "min_luminance": "50/10000", "max_luminance": "10000000/10000"},
                    {"side_data_type": "Content light level metadata",
                     "max_content": 1000, "max_average": 400}
                ]
            },
            {
                "index": 1, "codec_type": "audio", "codec_name": "truehd",
                "channels": 8, "sample_rate": "48000",
                "disposition": {"default": 1},
                "tags": {"language": "eng", "title": "Atmos", "BPS-eng": "4000000"}
            },
            {
                "index": 2, "codec_type": "audio", "codec_name": "ac3",
                "channels": 6, "bit_rate": "640000",
                "disposition": {"comment": 1},
                "tags": {"language": "fre"}
            },
            {
                "index": 3, "codec_type": "subtitle", "codec_name": "subrip",
                "disposition": {"forced": 1, "hearing_impaired": 1},
                "tags": {"language": "en"}
            },
            {
                "index": 4, "codec_type": "attachment", "codec_name": "ttf",
                "tags": {"filename": "Arial.ttf", "mimetype": "font/ttf"}
            },
            {
                "index": 5, "codec_type": "video", "codec_name": "mjpeg",
                "disposition": {"attached_pic": 1}
            },
            {"index": 6, "codec_type": "data", "codec_name": "bin_data"}
        ],
        "format": {
            "format_name": "matroska,webm",
            "duration": "7200.5",
            "bit_rate": "25000000"
        }
    }"#;

    #[test]
    fn maps_sample_output() {
        let source = parse_output(Path::new("/m/movie.mkv"), SAMPLE).unwrap();
        assert_eq!(source.format, "matroska,webm");
        assert_eq!(source.bitrate, Some(25_000_000));
        assert_eq!(source.duration, Some(Duration::from_secs_f64(7200.5)));
        assert_eq!(source.streams.len(), 5);

        let video = source.streams[0].video_info().unwrap();
        assert_eq!(video.level, Some(5.0));
        assert_eq!(video.profile.as_deref(), Some("main 10"));
        assert!((video.fps.unwrap() - 23.976).abs() < 0.01);
        assert_eq!(video.color.space.as_deref(), Some("bt2020nc"));
        assert_eq!(
            video.mastering_display.unwrap().to_x265(),
            "G(13250,34500)B(7500,3000)R(34000,16000)WP(15635,16450)L(10000000,50)"
        );
        assert_eq!(
            video.content_light,
            Some(ContentLight {
                max_content: 1000,
                max_average: 400
            })
        );
        assert!(source.streams[0].is_default());
    }

    #[test]
    fn maps_audio_subtitle_attachment() {
        let source = parse_output(Path::new("/m/movie.mkv"), SAMPLE).unwrap();

        let truehd = &source.streams[1];
        assert_eq!(truehd.language, "eng");
        assert_eq!(truehd.title.as_deref(), Some("Atmos"));
        assert_eq!(truehd.bitrate, Some(4_000_000));
        assert_eq!(truehd.channels(), Some(8));

        let ac3 = &source.streams[2];
        assert_eq!(ac3.language, "fra");
        assert_eq!(ac3.bitrate, Some(640_000));
        assert!(ac3.disposition.contains(Disposition::Comment));

        let sub = &source.streams[3];
        assert_eq!(sub.language, "eng");
        assert_eq!(sub.disposition.signature(), "forced.hearing_impaired");
        assert_eq!(sub.subtitle_info().unwrap().image_based, None);

        let att = source.streams[4].attachment_info().unwrap();
        assert_eq!(att.filename.as_deref(), Some("Arial.ttf"));
    }

    #[test]
    fn h264_level() {
        assert_eq!(normalize_level("h264", 41), Some(4.1));
        assert_eq!(normalize_level("hevc", 120), Some(4.0));
        assert_eq!(normalize_level("vp9", -99), None);
    }

    #[test]
    fn no_audio_or_video_is_invalid() {
        let json = r#"{"streams": [{"index": 0, "codec_type": "subtitle", "codec_name": "subrip"}],
                       "format": {"format_name": "srt"}}"#;
        let err = parse_output(Path::new("/m/subs.srt"), json).unwrap_err();
        assert!(matches!(err, Error::InvalidSource(_)));
    }

    #[test]
    fn malformed_json_is_probe_error() {
        let err = parse_output(Path::new("/m/x.mkv"), "not json").unwrap_err();
        assert!(matches!(err, Error::Probe(_)));
    }

    #[test]
    fn frame_rate_fraction() {
        assert!((parse_frame_rate("24000/1001").unwrap() - 23.976).abs() < 0.01);
        assert_eq!(parse_frame_rate("30/1"), Some(30.0));
        assert_eq!(parse_frame_rate("25"), Some(25.0));
        assert_eq!(parse_frame_rate("0/0"), None);
        assert_eq!(parse_frame_rate("invalid"), None);
    }
}
