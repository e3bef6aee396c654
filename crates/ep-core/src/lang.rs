//! ISO 639 language code normalisation.
//!
//! Streams and policies may carry ISO 639-1 (`en`), ISO 639-2/B (`fre`) or
//! ISO 639-2/T (`fra`) codes. Everything is normalised to 639-2/T so that
//! comparisons between source tags, policy allow-lists and external
//! subtitle filenames are exact.

/// The undetermined-language code.
pub const UNDEFINED: &str = "und";

/// `(639-1, 639-2/T, 639-2/B)` for the languages commonly found in media tags.
/// The B code equals the T code for most entries.
const LANGUAGES: &[(&str, &str, &str)] = &[
    ("ar", "ara", "ara"),
    ("bg", "bul", "bul"),
    ("bn", "ben", "ben"),
    ("ca", "cat", "cat"),
    ("cs", "ces", "cze"),
    ("cy", "cym", "wel"),
    ("da", "dan", "dan"),
    ("de", "deu", "ger"),
    ("el", "ell", "gre"),
    ("en", "eng", "eng"),
    ("es", "spa", "spa"),
    ("et", "est", "est"),
    ("eu", "eus", "baq"),
    ("fa", "fas", "per"),
    ("fi", "fin", "fin"),
    ("fr", "fra", "fre"),
    ("ga", "gle", "gle"),
    ("gl", "glg", "glg"),
    ("he", "heb", "heb"),
    ("hi", "hin", "hin"),
    ("hr", "hrv", "hrv"),
    ("hu", "hun", "hun"),
    ("hy", "hye", "arm"),
    ("id", "ind", "ind"),
    ("is", "isl", "ice"),
    ("it", "ita", "ita"),
    ("ja", "jpn", "jpn"),
    ("ka", "kat", "geo"),
    ("ko", "kor", "kor"),
    ("lt", "lit", "lit"),
    ("lv", "lav", "lav"),
    ("mk", "mkd", "mac"),
    ("ms", "msa", "may"),
    ("nl", "nld", "dut"),
    ("no", "nor", "nor"),
    ("nb", "nob", "nob"),
    ("pl", "pol", "pol"),
    ("pt", "por", "por"),
    ("ro", "ron", "rum"),
    ("ru", "rus", "rus"),
    ("sk", "slk", "slo"),
    ("sl", "slv", "slv"),
    ("sq", "sqi", "alb"),
    ("sr", "srp", "srp"),
    ("sv", "swe", "swe"),
    ("ta", "tam", "tam"),
    ("th", "tha", "tha"),
    ("tr", "tur", "tur"),
    ("uk", "ukr", "ukr"),
    ("vi", "vie", "vie"),
    ("zh", "zho", "chi"),
];

/// Normalise a language code to ISO 639-2/T.
///
/// Known 639-1 and 639-2/B codes map to their 639-2/T form. Unknown
/// three-letter alphabetic codes pass through lowercased. Anything else
/// returns `None`.
pub fn normalize(code: &str) -> Option<String> {
    let code = code.trim().to_ascii_lowercase();
    if code == UNDEFINED {
        return Some(code);
    }
    if let Some((_, t, _)) = lookup(&code) {
        return Some((*t).to_string());
    }
    if code.len() == 3 && code.chars().all(|c| c.is_ascii_alphabetic()) {
        return Some(code);
    }
    None
}

/// Normalise a language code, falling back to `"und"`.
pub fn normalize_or_und(code: Option<&str>) -> String {
    code.and_then(normalize)
        .unwrap_or_else(|| UNDEFINED.to_string())
}

/// Whether the code is present in the language table (any of its forms).
///
/// Used when parsing filename tokens, where pass-through of arbitrary
/// three-letter words would misread tokens such as `sdh`.
pub fn is_known(code: &str) -> bool {
    lookup(&code.trim().to_ascii_lowercase()).is_some()
}

fn lookup(code: &str) -> Option<&'static (&'static str, &'static str, &'static str)> {
    LANGUAGES
        .iter()
        .find(|(a2, t, b)| *a2 == code || *t == code || *b == code)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bibliographic_codes_map_to_terminology() {
        assert_eq!(normalize("fre").as_deref(), Some("fra"));
        assert_eq!(normalize("ger").as_deref(), Some("deu"));
        assert_eq!(normalize("chi").as_deref(), Some("zho"));
    }

    #[test]
    fn two_letter_codes_expand() {
        assert_eq!(normalize("en").as_deref(), Some("eng"));
        assert_eq!(normalize("PT").as_deref(), Some("por"));
    }

    #[test]
    fn unknown_three_letter_passes_through() {
        assert_eq!(normalize("tlh").as_deref(), Some("tlh"));
        assert_eq!(normalize("und").as_deref(), Some("und"));
    }

    #[test]
    fn garbage_is_rejected() {
        assert_eq!(normalize("english"), None);
        assert_eq!(normalize("e1"), None);
        assert_eq!(normalize_or_und(Some("")), "und");
        assert_eq!(normalize_or_und(None), "und");
    }

    #[test]
    fn known_codes() {
        assert!(is_known("fr"));
        assert!(is_known("fre"));
        assert!(is_known("fra"));
        assert!(!is_known("sdh"));
        assert!(!is_known("und"));
    }
}
