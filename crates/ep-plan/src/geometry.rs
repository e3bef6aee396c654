//! Video geometry and bitrate estimation.

use ep_core::config::{AspectMode, AspectPolicy, CrfProfile};
use ep_core::StreamKind;
use ep_probe::{SourceFile, Stream};

/// Output geometry for a resize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Geometry {
    pub width: u32,
    pub height: u32,
    /// Scale fragment, present when the picture is resized.
    pub scale: Option<String>,
    /// Crop or pad fragment, applied after `scale`.
    pub filter: Option<String>,
}

impl Geometry {
    /// Filter fragments in application order.
    pub fn filters(&self) -> Vec<String> {
        self.scale.iter().chain(self.filter.iter()).cloned().collect()
    }

    pub fn changes_picture(&self) -> bool {
        self.scale.is_some() || self.filter.is_some()
    }
}

/// Compute the filters that bring a `src_w`x`src_h` picture to the desired
/// geometry. Returns `None` when no desired dimension is configured or the
/// source has no dimensions.
pub fn aspect_correction(src_w: u32, src_h: u32, desired: &AspectPolicy) -> Option<Geometry> {
    if src_w == 0 || src_h == 0 {
        return None;
    }
    let aspect = src_w as f64 / src_h as f64;

    let (width, height, derived) = match (desired.width, desired.height) {
        (Some(w), Some(h)) => (w, h, false),
        (Some(w), None) => (w, (w as f64 / aspect).round() as u32, true),
        (None, Some(h)) => ((aspect * h as f64).round() as u32, h, true),
        (None, None) => return None,
    };
    if width == 0 || height == 0 {
        return None;
    }

    let resized = width != src_w || height != src_h;
    let simple_scale = |w: u32, h: u32| resized.then(|| format!("scale={w}:{h}"));

    let matched = derived || (src_w as u64) * (height as u64) == (width as u64) * (src_h as u64);
    if matched || desired.mode == AspectMode::Stretch {
        return Some(Geometry {
            width,
            height,
            scale: simple_scale(width, height),
            filter: None,
        });
    }

    let wider = width as f64 / height as f64 > aspect;
    let crop = desired.mode == AspectMode::Crop;
    let (scale_w, scale_h, filter) = match (crop, wider) {
        (true, true) => {
            let h0 = (width as f64 / aspect).round() as u32;
            let off = (h0 - height) / 2;
            (width, h0, format!("crop={width}:{height}:0:{off}"))
        }
        (true, false) => {
            let w0 = (height as f64 * aspect).round() as u32;
            let off = (w0 - width) / 2;
            (w0, height, format!("crop={width}:{height}:{off}:0"))
        }
        (false, true) => {
            let w0 = (height as f64 * aspect).round() as u32;
            let off = (width - w0) / 2;
            (w0, height, format!("pad={width}:{height}:{off}:0"))
        }
        (false, false) => {
            let h0 = (width as f64 / aspect).round() as u32;
            let off = (height - h0) / 2;
            (width, h0, format!("pad={width}:{height}:0:{off}"))
        }
    };

    let scale = (scale_w != src_w || scale_h != src_h).then(|| format!("scale={scale_w}:{scale_h}"));
    Some(Geometry {
        width,
        height,
        scale,
        filter: Some(filter),
    })
}

/// Scale fragment bounding the width, keeping the aspect and an even height.
pub fn max_width_scale(max_width: u32) -> String {
    format!("scale={max_width}:trunc(ow/a/2)*2")
}

/// Estimated video bitrate in kbps: container bitrate minus the audio
/// bitrates, clamped to the stream's own bitrate when that is known and
/// lower, multiplied by `ratio`.
pub fn estimate_bitrate(source: &SourceFile, video: &Stream, ratio: f64) -> Option<u32> {
    let own = video.bitrate.map(|b| b as f64 / 1000.0);
    let from_container = source.bitrate.map(|total| {
        let audio: u64 = source
            .streams_of(StreamKind::Audio)
            .filter_map(|s| s.bitrate)
            .sum();
        total.saturating_sub(audio) as f64 / 1000.0
    });

    let estimate = match (from_container, own) {
        (Some(c), Some(o)) => c.min(o),
        (Some(c), None) => c,
        (None, Some(o)) => o,
        (None, None) => return None,
    };
    let adjusted = (estimate * ratio).round();
    (adjusted > 0.0).then_some(adjusted as u32)
}

/// Pick the CRF bracket for an estimated bitrate: profiles are tried from
/// the highest floor down and the first floor below the estimate wins.
pub fn select_crf_profile(profiles: &[CrfProfile], estimate: u32) -> Option<&CrfProfile> {
    let mut sorted: Vec<&CrfProfile> = profiles.iter().collect();
    sorted.sort_by(|a, b| b.source_bitrate.cmp(&a.source_bitrate));
    sorted.into_iter().find(|p| p.source_bitrate < estimate)
}

/// Bit depth encoded in a pixel format name (`yuv420p10le` is 10).
pub fn pix_fmt_depth(pix_fmt: &str) -> u32 {
    let name = pix_fmt
        .strip_suffix("le")
        .or_else(|| pix_fmt.strip_suffix("be"))
        .unwrap_or(pix_fmt);
    match name.rfind('p') {
        Some(pos) => name[pos + 1..].parse::<u32>().unwrap_or(8),
        None => 8,
    }
}

/// Chroma subsampling token of a pixel format (`420`, `422`, `444`).
pub fn chroma_token(pix_fmt: &str) -> Option<&'static str> {
    if pix_fmt.starts_with("p0") || pix_fmt.starts_with("nv12") || pix_fmt.starts_with("p2") {
        return Some("420");
    }
    ["420", "422", "444"]
        .into_iter()
        .find(|token| pix_fmt.contains(token))
}

const KNOWN_PIX_FMTS: &[&str] = &[
    "yuv420p",
    "yuv420p10le",
    "yuv420p12le",
    "yuv422p",
    "yuv422p10le",
    "yuv422p12le",
    "yuv444p",
    "yuv444p10le",
    "yuv444p12le",
];

/// Highest-depth pixel format not deeper than `max_depth` sharing the chroma
/// token of `source`. Candidates come from `approved` when non-empty.
pub fn fallback_pix_fmt(source: &str, max_depth: u32, approved: &[String]) -> Option<String> {
    let token = chroma_token(source)?;
    let candidates: Vec<&str> = if approved.is_empty() {
        KNOWN_PIX_FMTS.to_vec()
    } else {
        approved.iter().map(String::as_str).collect()
    };
    candidates
        .into_iter()
        .filter(|p| chroma_token(p) == Some(token) && pix_fmt_depth(p) <= max_depth)
        .max_by_key(|p| pix_fmt_depth(p))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desired(width: Option<u32>, height: Option<u32>, mode: AspectMode) -> AspectPolicy {
        AspectPolicy {
            width,
            height,
            mode,
        }
    }

    #[test]
    fn crop_to_wider_aspect() {
        let g = aspect_correction(640, 480, &desired(Some(320), Some(200), AspectMode::Crop)).unwrap();
        assert_eq!((g.width, g.height), (320, 200));
        assert_eq!(g.scale.as_deref(), Some("scale=320:240"));
        assert_eq!(g.filter.as_deref(), Some("crop=320:200:0:20"));
        assert_eq!(g.filters(), vec!["scale=320:240", "crop=320:200:0:20"]);
    }

    #[test]
    fn pad_to_taller_aspect() {
        let g = aspect_correction(640, 400, &desired(Some(320), Some(240), AspectMode::Pad)).unwrap();
        assert_eq!((g.width, g.height), (320, 240));
        assert_eq!(g.filter.as_deref(), Some("pad=320:240:0:20"));
        assert_eq!(g.scale.as_deref(), Some("scale=320:200"));
    }

    #[test]
    fn crop_to_narrower_aspect() {
        let g = aspect_correction(1920, 800, &desired(Some(960), Some(540), AspectMode::Crop)).unwrap();
        assert_eq!(g.scale.as_deref(), Some("scale=1296:540"));
        assert_eq!(g.filter.as_deref(), Some("crop=960:540:168:0"));
    }

    #[test]
    fn pad_to_wider_aspect() {
        let g = aspect_correction(1440, 1080, &desired(Some(1920), Some(1080), AspectMode::Pad)).unwrap();
        assert_eq!(g.scale, None);
        assert_eq!(g.filter.as_deref(), Some("pad=1920:1080:240:0"));
    }

    #[test]
    fn stretch_and_matched_have_no_filter() {
        let g = aspect_correction(640, 480, &desired(Some(320), Some(200), AspectMode::Stretch)).unwrap();
        assert_eq!(g.filter, None);
        assert_eq!(g.scale.as_deref(), Some("scale=320:200"));

        let g = aspect_correction(1920, 1080, &desired(Some(1280), Some(720), AspectMode::Crop)).unwrap();
        assert_eq!(g.filter, None);

        let g = aspect_correction(1920, 1080, &desired(Some(1920), Some(1080), AspectMode::Pad)).unwrap();
        assert!(!g.changes_picture());
    }

    #[test]
    fn derives_missing_dimension() {
        let g = aspect_correction(1920, 1080, &desired(Some(1280), None, AspectMode::Crop)).unwrap();
        assert_eq!((g.width, g.height), (1280, 720));
        let g = aspect_correction(1920, 800, &desired(None, Some(400), AspectMode::Pad)).unwrap();
        assert_eq!((g.width, g.height), (960, 400));
        assert!(aspect_correction(1920, 800, &desired(None, None, AspectMode::Pad)).is_none());
    }

    #[test]
    fn bitrate_estimate() {
        let mut source = SourceFile::new("/m/a.mkv", "matroska,webm");
        source.bitrate = Some(10_000_000);
        source.streams = vec![
            Stream::video(0, "h264", 1920, 1080),
            Stream::audio(1, "ac3", 6).with_bitrate(640_000),
            Stream::audio(2, "aac", 2).with_bitrate(360_000),
        ];
        let video = source.streams[0].clone();
        assert_eq!(estimate_bitrate(&source, &video, 1.0), Some(9000));
        assert_eq!(estimate_bitrate(&source, &video, 0.5), Some(4500));

        let lower = video.clone().with_bitrate(6_000_000);
        assert_eq!(estimate_bitrate(&source, &lower, 1.0), Some(6000));

        source.bitrate = None;
        assert_eq!(estimate_bitrate(&source, &video, 1.0), None);
        assert_eq!(estimate_bitrate(&source, &lower, 1.0), Some(6000));
    }

    #[test]
    fn crf_profile_brackets() {
        let profiles = vec![
            CrfProfile {
                source_bitrate: 0,
                crf: 22,
                maxrate: None,
                bufsize: None,
            },
            CrfProfile {
                source_bitrate: 8000,
                crf: 20,
                maxrate: Some("8M".into()),
                bufsize: Some("16M".into()),
            },
            CrfProfile {
                source_bitrate: 4000,
                crf: 21,
                maxrate: None,
                bufsize: None,
            },
        ];
        assert_eq!(select_crf_profile(&profiles, 9000).unwrap().crf, 20);
        assert_eq!(select_crf_profile(&profiles, 8000).unwrap().crf, 21);
        assert_eq!(select_crf_profile(&profiles, 100).unwrap().crf, 22);
        assert!(select_crf_profile(&profiles, 0).is_none());
    }

    #[test]
    fn pixel_format_helpers() {
        assert_eq!(pix_fmt_depth("yuv420p"), 8);
        assert_eq!(pix_fmt_depth("yuv420p10le"), 10);
        assert_eq!(pix_fmt_depth("p010le"), 10);
        assert_eq!(pix_fmt_depth("yuv444p12"), 12);
        assert_eq!(chroma_token("yuv422p10le"), Some("422"));
        assert_eq!(chroma_token("p010le"), Some("420"));
        assert_eq!(chroma_token("gray"), None);
    }

    #[test]
    fn pixel_format_fallback() {
        assert_eq!(fallback_pix_fmt("yuv420p10le", 8, &[]).as_deref(), Some("yuv420p"));
        assert_eq!(
            fallback_pix_fmt("yuv422p12le", 10, &[]).as_deref(),
            Some("yuv422p10le")
        );
        assert_eq!(
            fallback_pix_fmt("yuv444p10le", 8, &["yuv420p".to_string()]),
            None
        );
        assert_eq!(fallback_pix_fmt("gray10le", 8, &[]), None);
    }
}
