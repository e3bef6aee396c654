//! Flat encoder arguments for a resolved plan.
//!
//! The argument order is fixed so that identical plans always produce
//! byte-identical lists:
//!
//! 1. pre-options, `-i <source>`, one `-i` per external subtitle
//! 2. video, audio, subtitle and attachment steps, each as `-map` followed
//!    by its per-stream options
//! 3. a single `-strict` when any step needs a relaxed level
//! 4. post-options and `-f <muxer>`
//!
//! The output path is appended by the caller.

use ep_core::{OutputFormat, Strictness, StreamKind};

use crate::codecs::CodecTable;
use crate::plan::{Action, EncodePlan, Extraction, PlanStep};

/// Argument list builder.
#[derive(Debug, Clone, Default)]
pub struct ArgList {
    args: Vec<String>,
}

impl ArgList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a single argument.
    pub fn arg(&mut self, s: impl Into<String>) -> &mut Self {
        self.args.push(s.into());
        self
    }

    /// Append multiple arguments.
    pub fn args(&mut self, iter: impl IntoIterator<Item = impl Into<String>>) -> &mut Self {
        self.args.extend(iter.into_iter().map(Into::into));
        self
    }

    /// Append a flag and its value.
    pub fn opt(&mut self, flag: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.arg(flag).arg(value)
    }

    pub fn into_vec(self) -> Vec<String> {
        self.args
    }
}

/// Per-plan facts that steps need for container fixups.
struct Fixups<'a> {
    format: &'a OutputFormat,
    mpegts_source: bool,
}

/// The full argument list for `plan`.
pub fn arguments(plan: &EncodePlan) -> Vec<String> {
    let mut args = ArgList::new();
    args.args(plan.preopts.iter().map(String::as_str));
    args.opt("-i", plan.source.to_string_lossy());
    for input in &plan.external_inputs {
        args.opt("-i", input.to_string_lossy());
    }

    let fixups = Fixups {
        format: &plan.format,
        mpegts_source: plan
            .source_format
            .split(',')
            .any(|f| f.trim() == "mpegts"),
    };
    for steps in [&plan.video, &plan.audio, &plan.subtitle, &plan.attachment] {
        for (n, step) in steps.iter().enumerate() {
            emit_step(&mut args, step, n, &fixups);
        }
    }

    if plan.strict != Strictness::Normal {
        args.opt("-strict", plan.strict.to_string());
    }
    args.args(plan.postopts.iter().map(String::as_str));
    args.opt("-f", plan.format.muxer());
    args.into_vec()
}

fn emit_step(args: &mut ArgList, step: &PlanStep, n: usize, fixups: &Fixups<'_>) {
    let spec = format!("{}:{n}", step.kind.specifier());
    args.opt("-map", step.map_spec());

    match step.action {
        Action::Copy => {
            args.opt(format!("-c:{spec}"), "copy");
        }
        Action::Encode(encoder) => {
            args.opt(format!("-c:{spec}"), encoder.encoder());
            emit_encoder_options(args, step, &spec);
        }
    }

    if !step.filters.is_empty() {
        args.opt(format!("-filter:{spec}"), step.filters.join(","));
    }

    if step.kind == StreamKind::Attachment {
        if let Some(filename) = &step.filename {
            args.opt(format!("-metadata:s:{spec}"), format!("filename={filename}"));
        }
        if let Some(mimetype) = &step.mimetype {
            args.opt(format!("-metadata:s:{spec}"), format!("mimetype={mimetype}"));
        }
        return;
    }

    args.opt(
        format!("-metadata:s:{spec}"),
        format!("title={}", step.title.as_deref().unwrap_or("")),
    );
    args.opt(format!("-metadata:s:{spec}"), format!("language={}", step.language));
    args.opt(format!("-disposition:{spec}"), step.disposition.to_flags());

    if step.kind == StreamKind::Video && step.codec == "hevc" && fixups.format.is_mp4_family() {
        args.opt(format!("-tag:{spec}"), "hvc1");
    }
    if step.kind == StreamKind::Audio
        && step.action.is_copy()
        && step.codec == "aac"
        && fixups.mpegts_source
        && fixups.format.is_mp4_family()
    {
        args.opt(format!("-bsf:{spec}"), "aac_adtstoasc");
    }
}

fn emit_encoder_options(args: &mut ArgList, step: &PlanStep, spec: &str) {
    match (&step.crf, step.bitrate) {
        (Some(crf), _) => {
            args.opt(format!("-crf:{spec}"), crf.crf.to_string());
            if let Some(maxrate) = &crf.maxrate {
                args.opt(format!("-maxrate:{spec}"), maxrate.as_str());
            }
            if let Some(bufsize) = &crf.bufsize {
                args.opt(format!("-bufsize:{spec}"), bufsize.as_str());
            }
        }
        (None, Some(kbps)) if step.kind != StreamKind::Subtitle => {
            args.opt(format!("-b:{spec}"), format!("{kbps}k"));
        }
        _ => {}
    }
    if let Some(preset) = &step.preset {
        args.opt(format!("-preset:{spec}"), preset.as_str());
    }
    if let Some(profile) = &step.profile {
        args.opt(format!("-profile:{spec}"), profile.as_str());
    }
    if let Some(level) = step.level {
        args.opt(format!("-level:{spec}"), level.to_string());
    }
    if let Some(pix_fmt) = &step.pix_fmt {
        args.opt(format!("-pix_fmt:{spec}"), pix_fmt.as_str());
    }
    if step.kind == StreamKind::Audio {
        if let Some(channels) = step.channels {
            args.opt(format!("-ac:{spec}"), channels.to_string());
        }
    }
    if let Some(hdr) = &step.hdr {
        if let Some(primaries) = &hdr.primaries {
            args.opt(format!("-color_primaries:{spec}"), primaries.as_str());
        }
        if let Some(transfer) = &hdr.transfer {
            args.opt(format!("-color_trc:{spec}"), transfer.as_str());
        }
        if let Some(space) = &hdr.space {
            args.opt(format!("-colorspace:{spec}"), space.as_str());
        }
        if let Some(params) = &hdr.x265_params {
            args.opt(format!("-x265-params:{spec}"), params.as_str());
        }
    }
}

/// Arguments for a subtitle extraction job, ending with the output path.
pub fn extraction_args(job: &Extraction) -> Vec<String> {
    let mut args = ArgList::new();
    args.opt("-i", job.input.to_string_lossy());
    args.opt("-map", format!("0:{}", job.source_index));
    match job.encoder {
        Some(encoder) => {
            args.opt("-c:s:0", encoder.encoder());
        }
        None => {
            args.opt("-c:s:0", "copy");
        }
    }
    args.opt("-metadata:s:s:0", format!("language={}", job.language));
    args.arg(job.output.to_string_lossy());
    args.into_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codecs::{AudioEncoder, Encoder, SubtitleEncoder, VideoEncoder};
    use crate::plan::{CrfSettings, HdrParams};
    use ep_core::{Disposition, DispositionSet};
    use ep_probe::Stream;
    use std::path::PathBuf;

    fn plan(format: OutputFormat) -> EncodePlan {
        EncodePlan {
            source: PathBuf::from("/in/movie.mkv"),
            source_format: "matroska,webm".into(),
            format,
            video: Vec::new(),
            audio: Vec::new(),
            subtitle: Vec::new(),
            attachment: Vec::new(),
            external_inputs: Vec::new(),
            extractions: Vec::new(),
            burn: None,
            preopts: Vec::new(),
            postopts: Vec::new(),
            strict: Strictness::Normal,
            relocate_index: true,
        }
    }

    fn window(args: &[String], flag: &str) -> Option<String> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1).cloned())
    }

    #[test]
    fn copy_plan() {
        let mut p = plan(OutputFormat::Mp4);
        let video = Stream::video(0, "h264", 1920, 1080);
        let audio = Stream::audio(1, "aac", 2)
            .with_language("eng")
            .with_disposition(Disposition::Default);
        p.video.push(PlanStep::new(0, &video, Action::Copy));
        let mut a = PlanStep::new(0, &audio, Action::Copy);
        a.title = Some("Stereo".into());
        p.audio.push(a);

        let args = p.args();
        let expected: Vec<&str> = vec![
            "-i",
            "/in/movie.mkv",
            "-map",
            "0:0",
            "-c:v:0",
            "copy",
            "-metadata:s:v:0",
            "title=",
            "-metadata:s:v:0",
            "language=und",
            "-disposition:v:0",
            "-default-forced-comment-hearing_impaired-visual_impaired-captions-dub-original-lyrics-karaoke",
            "-map",
            "0:1",
            "-c:a:0",
            "copy",
            "-metadata:s:a:0",
            "title=Stereo",
            "-metadata:s:a:0",
            "language=eng",
            "-disposition:a:0",
            "+default-forced-comment-hearing_impaired-visual_impaired-captions-dub-original-lyrics-karaoke",
            "-f",
            "mp4",
        ];
        assert_eq!(args, expected);
    }

    #[test]
    fn encode_options_and_filters() {
        let mut p = plan(OutputFormat::Mp4);
        let video = Stream::video(0, "h264", 3840, 2160);
        let mut v = PlanStep::new(0, &video, Action::Encode(Encoder::Video(VideoEncoder::H265)));
        v.filters = vec!["yadif".into(), "scale=1920:trunc(ow/a/2)*2".into()];
        v.crf = Some(CrfSettings {
            crf: 22,
            maxrate: Some("8M".into()),
            bufsize: None,
        });
        v.preset = Some("slow".into());
        v.level = Some(5.1);
        v.pix_fmt = Some("yuv420p10le".into());
        v.hdr = Some(HdrParams {
            primaries: Some("bt2020".into()),
            transfer: Some("smpte2084".into()),
            space: Some("bt2020nc".into()),
            x265_params: Some("hdr-opt=1".into()),
        });
        p.video.push(v);

        let audio = Stream::audio(1, "truehd", 8);
        let mut a = PlanStep::new(0, &audio, Action::Encode(Encoder::Audio(AudioEncoder::Aac)));
        a.bitrate = Some(256);
        a.channels = Some(2);
        p.audio.push(a);

        let args = p.args();
        assert_eq!(window(&args, "-c:v:0").as_deref(), Some("libx265"));
        assert_eq!(
            window(&args, "-filter:v:0").as_deref(),
            Some("yadif,scale=1920:trunc(ow/a/2)*2")
        );
        assert_eq!(window(&args, "-crf:v:0").as_deref(), Some("22"));
        assert_eq!(window(&args, "-maxrate:v:0").as_deref(), Some("8M"));
        assert!(window(&args, "-b:v:0").is_none());
        assert_eq!(window(&args, "-level:v:0").as_deref(), Some("5.1"));
        assert_eq!(window(&args, "-colorspace:v:0").as_deref(), Some("bt2020nc"));
        assert_eq!(window(&args, "-x265-params:v:0").as_deref(), Some("hdr-opt=1"));
        assert_eq!(window(&args, "-tag:v:0").as_deref(), Some("hvc1"));
        assert_eq!(window(&args, "-b:a:0").as_deref(), Some("256k"));
        assert_eq!(window(&args, "-ac:a:0").as_deref(), Some("2"));
        assert_eq!(args.iter().filter(|a| a.starts_with("-filter:")).count(), 1);
    }

    #[test]
    fn globals() {
        let mut p = plan(OutputFormat::Matroska);
        p.preopts = vec!["-hide_banner".into()];
        p.postopts = vec!["-max_muxing_queue_size".into(), "1024".into()];
        p.strict = Strictness::Experimental;
        p.external_inputs = vec![PathBuf::from("/in/movie.en.srt")];
        let sub = Stream::subtitle(0, "subrip");
        p.subtitle.push(PlanStep::new(1, &sub, Action::Copy));

        let args = p.args();
        assert_eq!(args[0], "-hide_banner");
        assert_eq!(&args[1..5], &["-i", "/in/movie.mkv", "-i", "/in/movie.en.srt"]);
        assert_eq!(window(&args, "-map").as_deref(), Some("1:0"));
        assert_eq!(args.iter().filter(|a| *a == "-strict").count(), 1);
        assert_eq!(window(&args, "-strict").as_deref(), Some("experimental"));
        let tail: Vec<&str> = args[args.len() - 4..].iter().map(String::as_str).collect();
        assert_eq!(tail, vec!["-max_muxing_queue_size", "1024", "-f", "matroska"]);
    }

    #[test]
    fn adts_fixup_for_transport_streams() {
        let mut p = plan(OutputFormat::Mp4);
        p.source_format = "mpegts".into();
        let audio = Stream::audio(1, "aac", 2);
        p.audio.push(PlanStep::new(0, &audio, Action::Copy));
        let args = p.args();
        assert_eq!(window(&args, "-bsf:a:0").as_deref(), Some("aac_adtstoasc"));
    }

    #[test]
    fn attachment_metadata() {
        let mut p = plan(OutputFormat::Matroska);
        let font = Stream::attachment(5, "ttf", "Font.ttf", "font/ttf");
        let mut step = PlanStep::new(0, &font, Action::Copy);
        step.filename = Some("Font.ttf".into());
        step.mimetype = Some("font/ttf".into());
        p.attachment.push(step);
        let args = p.args();
        assert_eq!(window(&args, "-c:t:0").as_deref(), Some("copy"));
        assert!(args.contains(&"filename=Font.ttf".to_string()));
        assert!(args.contains(&"mimetype=font/ttf".to_string()));
        assert!(window(&args, "-disposition:t:0").is_none());
    }

    #[test]
    fn extraction() {
        let job = Extraction {
            input: PathBuf::from("/in/movie.mkv"),
            source_index: 4,
            encoder: Some(SubtitleEncoder::Srt),
            output: PathBuf::from("/in/movie.eng.forced.srt"),
            language: "eng".into(),
            disposition: DispositionSet::empty(),
        };
        assert_eq!(
            job.args(),
            vec![
                "-i",
                "/in/movie.mkv",
                "-map",
                "0:4",
                "-c:s:0",
                "srt",
                "-metadata:s:s:0",
                "language=eng",
                "/in/movie.eng.forced.srt",
            ]
        );
    }
}
