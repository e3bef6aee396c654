//! External subtitle files: name parsing and conversion into plan inputs.
//!
//! A subtitle belongs to a source when its file name starts with the
//! source's stem followed by a dot, e.g. `Movie (2020).en.forced.srt` for
//! `Movie (2020).mkv`. The dot-separated tokens between the stem and the
//! extension carry a language (first known code wins) and any number of
//! disposition flags.

use std::path::Path;

use ep_core::{lang, Disposition, DispositionSet};
use ep_probe::{ExternalSubtitle, Stream, StreamDetails, SubtitleInfo};

/// What a subtitle file name says about its contents.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubtitleName {
    pub codec: String,
    pub language: String,
    pub disposition: DispositionSet,
}

/// Codec for a subtitle file extension.
pub fn codec_for_extension(ext: &str) -> Option<&'static str> {
    match ext.to_ascii_lowercase().as_str() {
        "srt" => Some("subrip"),
        "ass" => Some("ass"),
        "ssa" => Some("ssa"),
        "vtt" => Some("webvtt"),
        "sup" => Some("hdmv_pgs_subtitle"),
        "sub" | "idx" => Some("dvd_subtitle"),
        _ => None,
    }
}

fn disposition_token(token: &str) -> Option<Disposition> {
    match token {
        "sdh" | "hi" | "cc" => Some(Disposition::HearingImpaired),
        "commentary" => Some(Disposition::Comment),
        _ => token.parse().ok(),
    }
}

/// Parse `file_name` as a subtitle of the source named `stem`.
pub fn parse_subtitle_name(stem: &str, file_name: &str) -> Option<SubtitleName> {
    let rest = file_name.strip_prefix(stem)?.strip_prefix('.')?;
    let mut tokens: Vec<&str> = rest.split('.').collect();
    let ext = tokens.pop()?;
    let codec = codec_for_extension(ext)?;

    let mut language = None;
    let mut disposition = DispositionSet::empty();
    for token in tokens {
        let token = token.trim().to_ascii_lowercase();
        if token.is_empty() {
            continue;
        }
        // Disposition words shadow language codes ("hi" is hearing impaired).
        if let Some(d) = disposition_token(&token) {
            disposition.insert(d);
        } else if language.is_none() && matches!(token.len(), 2 | 3) && lang::is_known(&token) {
            language = lang::normalize(&token);
        } else {
            tracing::trace!("Ignoring subtitle name token '{token}'");
        }
    }

    Some(SubtitleName {
        codec: codec.to_string(),
        language: language.unwrap_or_else(|| lang::UNDEFINED.to_string()),
        disposition,
    })
}

/// Build an [`ExternalSubtitle`] for `path` when it belongs to `stem`.
pub fn external_subtitle(stem: &str, path: &Path) -> Option<ExternalSubtitle> {
    let file_name = path.file_name()?.to_str()?;
    let parsed = parse_subtitle_name(stem, file_name)?;
    Some(ExternalSubtitle {
        path: path.to_path_buf(),
        codec: parsed.codec,
        language: parsed.language,
        disposition: parsed.disposition,
        image_based: None,
    })
}

/// The single stream an external subtitle input exposes (`<n>:0`).
pub fn as_stream(external: &ExternalSubtitle) -> Stream {
    let mut stream = Stream::subtitle(0, &external.codec);
    stream.language = external.language.clone();
    stream.disposition = external.disposition;
    stream.details = StreamDetails::Subtitle(SubtitleInfo {
        image_based: external.image_based,
    });
    stream
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn language_and_dispositions() {
        let parsed = parse_subtitle_name("Movie (2020)", "Movie (2020).en.forced.srt").unwrap();
        assert_eq!(parsed.codec, "subrip");
        assert_eq!(parsed.language, "eng");
        assert!(parsed.disposition.contains(Disposition::Forced));
    }

    #[test]
    fn first_language_wins() {
        let parsed = parse_subtitle_name("Movie", "Movie.fre.de.hi.ass").unwrap();
        assert_eq!(parsed.language, "fra");
        assert!(parsed.disposition.contains(Disposition::HearingImpaired));
        assert_eq!(parsed.disposition.iter().count(), 1);
    }

    #[test]
    fn no_language_is_undefined() {
        let parsed = parse_subtitle_name("Movie", "Movie.sup").unwrap();
        assert_eq!(parsed.codec, "hdmv_pgs_subtitle");
        assert_eq!(parsed.language, "und");
        assert!(parsed.disposition.is_empty());
    }

    #[test]
    fn disposition_aliases() {
        let parsed = parse_subtitle_name("Movie", "Movie.eng.commentary.default.cc.vtt").unwrap();
        let names: Vec<&str> = parsed.disposition.iter().map(|d| d.name()).collect();
        assert_eq!(names, vec!["default", "comment", "hearing_impaired"]);
    }

    #[test]
    fn rejects_foreign_files() {
        assert!(parse_subtitle_name("Movie", "Other.en.srt").is_none());
        assert!(parse_subtitle_name("Movie", "Movie 2.en.srt").is_none());
        assert!(parse_subtitle_name("Movie", "Movie.en.txt").is_none());
        assert!(parse_subtitle_name("Movie", "Movie.mkv").is_none());
    }

    #[test]
    fn stream_view() {
        let ext = external_subtitle("Movie", Path::new("/media/Movie.ja.idx")).unwrap();
        let stream = as_stream(&ext);
        assert_eq!(stream.index, 0);
        assert_eq!(stream.codec, "dvd_subtitle");
        assert_eq!(stream.language, "jpn");
        assert_eq!(ext.path, Path::new("/media/Movie.ja.idx"));
    }
}
