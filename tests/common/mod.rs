//! Shared fixtures for integration tests.
//!
//! [`SourceBuilder`] assembles a probed source in a few chained calls, and
//! [`PROBE_JSON`] is a saved ffprobe dump for CLI tests.

#![allow(dead_code)]

use ep_core::Disposition;
use ep_probe::{SourceFile, Stream, StreamDetails, SubtitleInfo};

/// A Matroska source with one 1080p h264 stream, English AAC stereo and an
/// English SubRip subtitle.
pub const PROBE_JSON: &str = r#"{
    "format": {"format_name": "matroska,webm", "duration": "5400.0", "bit_rate": "8000000"},
    "streams": [
        {"index": 0, "codec_type": "video", "codec_name": "h264", "profile": "High",
         "level": 41, "width": 1920, "height": 1080, "pix_fmt": "yuv420p",
         "r_frame_rate": "24000/1001", "field_order": "progressive",
         "disposition": {"default": 1}},
        {"index": 1, "codec_type": "audio", "codec_name": "aac", "channels": 2,
         "sample_rate": "48000", "bit_rate": "192000",
         "disposition": {"default": 1}, "tags": {"language": "eng"}},
        {"index": 2, "codec_type": "subtitle", "codec_name": "subrip",
         "tags": {"language": "eng", "title": "English"}}
    ]
}"#;

/// Chained construction of a [`SourceFile`].
pub struct SourceBuilder {
    source: SourceFile,
}

impl SourceBuilder {
    pub fn new(path: &str, format: &str) -> Self {
        Self {
            source: SourceFile::new(path, format),
        }
    }

    /// `/media/Movie.mkv` in Matroska.
    pub fn mkv() -> Self {
        Self::new("/media/Movie.mkv", "matroska,webm")
    }

    fn next_index(&self) -> u32 {
        self.source.streams.len() as u32
    }

    /// Container bitrate in bits per second.
    pub fn bitrate(mut self, bps: u64) -> Self {
        self.source.bitrate = Some(bps);
        self
    }

    pub fn original_language(mut self, code: &str) -> Self {
        self.source.original_language = Some(code.to_string());
        self
    }

    pub fn video(mut self, codec: &str, width: u32, height: u32) -> Self {
        let stream = Stream::video(self.next_index(), codec, width, height)
            .with_disposition(Disposition::Default);
        self.source.streams.push(stream);
        self
    }

    pub fn audio(mut self, codec: &str, channels: u32, language: &str) -> Self {
        let stream = Stream::audio(self.next_index(), codec, channels).with_language(language);
        self.source.streams.push(stream);
        self
    }

    /// Audio with an explicit bitrate (bits per second) and dispositions.
    pub fn audio_with(
        mut self,
        codec: &str,
        channels: u32,
        language: &str,
        bps: u64,
        dispositions: &[Disposition],
    ) -> Self {
        let mut stream = Stream::audio(self.next_index(), codec, channels)
            .with_language(language)
            .with_bitrate(bps);
        for d in dispositions {
            stream = stream.with_disposition(*d);
        }
        self.source.streams.push(stream);
        self
    }

    /// A subtitle already classified as text or image.
    pub fn subtitle(mut self, codec: &str, language: &str, image: bool) -> Self {
        let mut stream = Stream::subtitle(self.next_index(), codec).with_language(language);
        stream.details = StreamDetails::Subtitle(SubtitleInfo {
            image_based: Some(image),
        });
        self.source.streams.push(stream);
        self
    }

    pub fn build(self) -> SourceFile {
        self.source
    }
}
