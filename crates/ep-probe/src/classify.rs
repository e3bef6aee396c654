//! Subtitle image/text classification.
//!
//! Classification runs before compilation. Each subtitle is classified
//! independently, so [`classify_subtitles`] fans the work out over rayon's
//! thread pool. Failures leave the stream unclassified; the compiler reports
//! those as warnings and skips the stream.

use rayon::prelude::*;

use crate::types::{SourceFile, StreamDetails};

/// Whether a subtitle is rendered from bitmaps or from text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubtitleClass {
    Image,
    Text,
}

impl SubtitleClass {
    pub fn is_image(self) -> bool {
        self == SubtitleClass::Image
    }
}

/// Decides whether a subtitle codec is image- or text-based.
pub trait SubtitleClassifier: Send + Sync {
    /// Human-readable name identifying this classifier.
    fn name(&self) -> &'static str;

    /// Classify a subtitle by codec identifier.
    fn classify(&self, codec: &str) -> ep_core::Result<SubtitleClass>;
}

const IMAGE_CODECS: &[&str] = &[
    "hdmv_pgs_subtitle",
    "pgssub",
    "dvd_subtitle",
    "dvdsub",
    "dvb_subtitle",
    "dvbsub",
    "xsub",
    "vobsub",
];

const TEXT_CODECS: &[&str] = &[
    "subrip",
    "srt",
    "ass",
    "ssa",
    "mov_text",
    "webvtt",
    "text",
    "microdvd",
    "subviewer",
    "subviewer1",
    "sami",
    "realtext",
    "jacosub",
    "mpl2",
    "pjs",
    "stl",
    "ttml",
    "eia_608",
];

/// Classifies subtitles from a fixed codec table.
#[derive(Debug, Clone, Copy, Default)]
pub struct CodecClassifier;

impl SubtitleClassifier for CodecClassifier {
    fn name(&self) -> &'static str {
        "codec-table"
    }

    fn classify(&self, codec: &str) -> ep_core::Result<SubtitleClass> {
        let codec = codec.to_ascii_lowercase();
        if IMAGE_CODECS.contains(&codec.as_str()) {
            Ok(SubtitleClass::Image)
        } else if TEXT_CODECS.contains(&codec.as_str()) {
            Ok(SubtitleClass::Text)
        } else {
            Err(ep_core::Error::Probe(format!(
                "cannot classify subtitle codec '{codec}'"
            )))
        }
    }
}

/// Classify every unclassified subtitle stream and external subtitle of
/// `source` in parallel.
pub fn classify_subtitles(source: &mut SourceFile, classifier: &dyn SubtitleClassifier) {
    source.streams.par_iter_mut().for_each(|stream| {
        let codec = stream.codec.clone();
        let index = stream.index;
        if let StreamDetails::Subtitle(ref mut info) = stream.details {
            if info.image_based.is_some() {
                return;
            }
            match classifier.classify(&codec) {
                Ok(class) => info.image_based = Some(class.is_image()),
                Err(e) => {
                    tracing::debug!("Subtitle stream {index} not classified by {}: {e}", classifier.name())
                }
            }
        }
    });

    source.external_subtitles.par_iter_mut().for_each(|sub| {
        if sub.image_based.is_some() {
            return;
        }
        match classifier.classify(&sub.codec) {
            Ok(class) => sub.image_based = Some(class.is_image()),
            Err(e) => tracing::debug!(
                "External subtitle {} not classified by {}: {e}",
                sub.path.display(),
                classifier.name()
            ),
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{ExternalSubtitle, Stream};
    use ep_core::DispositionSet;

    #[test]
    fn codec_table() {
        let c = CodecClassifier;
        assert_eq!(c.classify("hdmv_pgs_subtitle").unwrap(), SubtitleClass::Image);
        assert_eq!(c.classify("SUBRIP").unwrap(), SubtitleClass::Text);
        assert!(c.classify("mystery").is_err());
    }

    #[test]
    fn classifies_streams_and_externals() {
        let mut source = SourceFile::new("/m/movie.mkv", "matroska,webm");
        source.streams = vec![
            Stream::video(0, "h264", 1920, 1080),
            Stream::subtitle(1, "subrip"),
            Stream::subtitle(2, "dvd_subtitle"),
            Stream::subtitle(3, "bogus"),
        ];
        source.external_subtitles.push(ExternalSubtitle {
            path: "/m/movie.eng.srt".into(),
            codec: "subrip".into(),
            language: "eng".into(),
            disposition: DispositionSet::empty(),
            image_based: None,
        });

        classify_subtitles(&mut source, &CodecClassifier);

        let image = |i: usize| source.streams[i].subtitle_info().unwrap().image_based;
        assert_eq!(image(1), Some(false));
        assert_eq!(image(2), Some(true));
        assert_eq!(image(3), None);
        assert_eq!(source.external_subtitles[0].image_based, Some(false));
    }

    #[test]
    fn keeps_existing_classification() {
        let mut source = SourceFile::new("/m/movie.mkv", "matroska,webm");
        let mut sub = Stream::subtitle(0, "subrip");
        sub.details = StreamDetails::Subtitle(crate::types::SubtitleInfo {
            image_based: Some(true),
        });
        source.streams.push(sub);
        classify_subtitles(&mut source, &CodecClassifier);
        assert_eq!(source.streams[0].subtitle_info().unwrap().image_based, Some(true));
    }
}
