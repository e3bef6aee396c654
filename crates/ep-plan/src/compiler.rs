//! The plan compiler: source + policy in, encode plan + warnings out.
//!
//! Compilation is a pure function of its inputs. Policy relaxation happens on
//! call-local copies, and nothing is cached between calls.

use ep_core::config::{AttachmentPolicy, Policy};
use ep_core::{lang, Error, Result, Strictness, StreamKind};
use ep_probe::{SourceFile, Stream};

use crate::audio::{self, AudioContext};
use crate::codecs::{AudioEncoder, CodecTable, Pool, SubtitleEncoder, VideoEncoder};
use crate::decision::{self, CopyVeto, VideoContext, VideoOutcome};
use crate::filter::{self, Languages, Origin};
use crate::plan::{Action, Compiled, EncodePlan, PlanStep};
use crate::sort::{self, SortContext};
use crate::subtitle::{self, SubtitleContext};
use crate::warning::{Warning, Warnings};
use crate::{dedup, defaults, geometry};

/// Audio codecs that need experimental strictness when copied into mp4/mov.
const EXPERIMENTAL_IN_MP4: &[&str] = &["flac", "opus", "truehd", "dts"];

/// Compiles encode plans against one policy.
///
/// ```
/// use ep_core::Policy;
/// use ep_plan::Compiler;
/// use ep_probe::{SourceFile, Stream};
///
/// let policy = Policy::default();
/// let mut source = SourceFile::new("/media/movie.mkv", "matroska,webm");
/// source.streams = vec![Stream::video(0, "h264", 1920, 1080), Stream::audio(1, "aac", 2)];
///
/// let compiled = Compiler::new(&policy)
///     .with_copy_veto(|s| s.codec == "vc1")
///     .compile(&source)
///     .unwrap();
/// assert!(compiled.plan.video[0].action.is_copy());
/// ```
pub struct Compiler<'p> {
    policy: &'p Policy,
    veto: Option<Box<CopyVeto<'p>>>,
}

impl<'p> Compiler<'p> {
    pub fn new(policy: &'p Policy) -> Self {
        Self { policy, veto: None }
    }

    /// Add a predicate that refuses copies, on top of `copy_blocklist`.
    pub fn with_copy_veto(mut self, veto: impl Fn(&Stream) -> bool + Send + Sync + 'p) -> Self {
        self.veto = Some(Box::new(veto));
        self
    }

    fn vetoed(&self, stream: &Stream) -> bool {
        self.policy
            .copy_blocklist
            .iter()
            .any(|c| c.eq_ignore_ascii_case(&stream.codec))
            || self.veto.as_ref().is_some_and(|v| v(stream))
    }

    /// Compile `source` into an encode plan.
    pub fn compile(&self, source: &SourceFile) -> Result<Compiled> {
        let span = tracing::debug_span!("compile", source = %source.path.display());
        let _guard = span.enter();

        if !source.has(StreamKind::Video) && !source.has(StreamKind::Audio) {
            return Err(Error::InvalidSource(format!(
                "{}: no audio or video streams",
                source.path.display()
            )));
        }

        let policy = self.policy;
        let veto = |s: &Stream| self.vetoed(s);
        let veto: &CopyVeto<'_> = &veto;
        let original = source.original_language.as_deref().and_then(lang::normalize);
        let original = original.as_deref();
        let mut warnings = Warnings::default();

        // Subtitles first: a burned-in subtitle feeds the video filter chain.
        let subs = subtitle::plan_subtitles(
            source,
            &SubtitleContext {
                policy: &policy.subtitle,
                veto,
            },
        );
        for w in subs.warnings {
            warnings.push(w);
        }

        let burn_filter = subs.burn.as_ref().map(|b| b.filter.clone());
        let video = self.plan_video(source, veto, burn_filter, &mut warnings)?;

        // Audio
        let audio_streams: Vec<&Stream> = source.streams_of(StreamKind::Audio).collect();
        let items: Vec<(Origin, &Stream)> = audio_streams.iter().map(|s| (Origin::Source, *s)).collect();
        let (candidates, relaxed) =
            filter::select_relaxed(StreamKind::Audio, &items, &policy.audio.selection, original);
        if let Some(w) = relaxed {
            warnings.push(w);
        }

        let groups = dedup::detect_combinations(&audio_streams, &policy.audio.combinations);
        let (steps, audio_warnings) = audio::plan_audio(
            &candidates,
            &AudioContext {
                policy: &policy.audio,
                veto,
                groups: &groups,
            },
        );
        for w in audio_warnings {
            warnings.push(w);
        }

        let audio_pool = Pool::<AudioEncoder>::parse(&policy.audio.codecs);
        let steps = dedup::purge(steps, &|codec: &str| audio_pool.rank(codec));
        let audio_languages = Languages::new(&policy.audio.selection, original);
        let audio_sort = SortContext {
            codecs: audio_pool.codec_ids(),
            languages: audio_languages.allowed.clone(),
            original_language: original.map(str::to_string),
        };
        let mut audio = sort::sort_steps(steps, &policy.audio.selection.sort_keys, &audio_sort);
        defaults::select_audio_default(
            &mut audio,
            audio_languages.preferred(),
            &policy.audio.selection.default_sort_keys,
            &audio_sort,
        );
        if audio.is_empty() && video.is_empty() {
            return Err(Error::no_eligible(StreamKind::Audio));
        }

        // Subtitles
        let subtitle_languages = Languages::new(&policy.subtitle.selection, original);
        let subtitle_sort = SortContext {
            codecs: Pool::<SubtitleEncoder>::parse(&policy.subtitle.codecs).codec_ids(),
            languages: subtitle_languages.allowed.clone(),
            original_language: original.map(str::to_string),
        };
        let mut subtitle =
            sort::sort_steps(subs.steps, &policy.subtitle.selection.sort_keys, &subtitle_sort);
        defaults::select_subtitle_default(
            &mut subtitle,
            subtitle_languages.default.as_deref(),
            &policy.subtitle.selection.default_sort_keys,
            &subtitle_sort,
        );

        let format = policy.output_format.clone();
        let attachment = if format.supports_attachments() {
            plan_attachments(source, &policy.attachment)
        } else {
            Vec::new()
        };

        let mut plan = EncodePlan {
            source: source.path.clone(),
            source_format: source.format.clone(),
            relocate_index: policy.relocate_index && format.needs_index_relocation(),
            format,
            video,
            audio,
            subtitle,
            attachment,
            external_inputs: subs.external_inputs,
            extractions: subs.extractions,
            burn: subs.burn,
            preopts: policy.preopts.clone(),
            postopts: policy.postopts.clone(),
            strict: Strictness::Normal,
        };
        plan.strict = required_strictness(&plan);

        tracing::info!(
            "Plan for {}: {} video, {} audio, {} subtitle, {} attachment, {} extraction(s)",
            source.path.display(),
            plan.video.len(),
            plan.audio.len(),
            plan.subtitle.len(),
            plan.attachment.len(),
            plan.extractions.len()
        );

        Ok(Compiled {
            plan,
            warnings: warnings.into_vec(),
        })
    }

    fn plan_video(
        &self,
        source: &SourceFile,
        veto: &CopyVeto<'_>,
        burn_filter: Option<String>,
        warnings: &mut Warnings,
    ) -> Result<Vec<PlanStep>> {
        let Some(stream) = source.primary_video() else {
            return Ok(Vec::new());
        };
        let info = stream
            .video_info()
            .ok_or_else(|| Error::Internal(format!("video stream {} has no video details", stream.index)))?;

        let policy = &self.policy.video;
        let estimate = geometry::estimate_bitrate(source, stream, policy.ratio_for(&stream.codec));
        let ctx = VideoContext {
            policy,
            veto,
            estimate,
            burn_filter,
        };
        match decision::plan_video(stream, info, &ctx) {
            VideoOutcome::Step(step) => Ok(vec![*step]),
            VideoOutcome::Unsupported(codec) => {
                warnings.push(Warning::UnsupportedCodec {
                    kind: StreamKind::Video,
                    index: stream.index,
                    codec,
                });
                Err(Error::no_eligible(StreamKind::Video))
            }
        }
    }
}

/// Compile with the default copy veto (`copy_blocklist` only).
pub fn compile(source: &SourceFile, policy: &Policy) -> Result<Compiled> {
    Compiler::new(policy).compile(source)
}

/// Policy warnings: the core checks plus codec names no encoder table knows.
pub fn validate(policy: &Policy) -> Vec<String> {
    let mut warnings = policy.validate();

    let mut unknown = |section: &str, names: Vec<String>| {
        for name in names {
            warnings.push(format!("{section}: unknown codec '{name}'"));
        }
    };
    fn names<E: CodecTable>(list: &[String]) -> Vec<String> {
        Pool::<E>::parse(list).unsupported().map(str::to_string).collect()
    }

    unknown("video.codecs", names::<VideoEncoder>(&policy.video.codecs));
    unknown("video.hdr.codecs", names::<VideoEncoder>(&policy.video.hdr.codecs));
    unknown("audio.codecs", names::<AudioEncoder>(&policy.audio.codecs));
    if let Some(ref universal) = policy.audio.universal {
        unknown("audio.universal.codecs", names::<AudioEncoder>(&universal.codecs));
    }
    let sub = &policy.subtitle;
    unknown("subtitle.codecs", names::<SubtitleEncoder>(&sub.codecs));
    unknown("subtitle.image_codecs", names::<SubtitleEncoder>(&sub.image_codecs));
    unknown("subtitle.rip.codecs", names::<SubtitleEncoder>(&sub.rip.codecs));
    unknown("subtitle.rip.image_codecs", names::<SubtitleEncoder>(&sub.rip.image_codecs));

    warnings
}

fn plan_attachments(source: &SourceFile, policy: &AttachmentPolicy) -> Vec<PlanStep> {
    let listed = |list: &[String], value: Option<&str>| {
        value.is_some_and(|v| list.iter().any(|l| l.eq_ignore_ascii_case(v)))
    };

    source
        .streams_of(StreamKind::Attachment)
        .filter_map(|stream| {
            let info = stream.attachment_info()?;
            let keep = listed(&policy.codecs, Some(stream.codec.as_str()))
                || listed(&policy.mimetypes, info.mimetype.as_deref());
            if !keep {
                tracing::debug!("Skipping attachment {} ({})", stream.index, stream.codec);
                return None;
            }
            let mut step = PlanStep::new(0, stream, Action::Copy);
            step.filename = info.filename.clone();
            step.mimetype = info.mimetype.clone();
            Some(step)
        })
        .collect()
}

/// The least strict level any step requires.
fn required_strictness(plan: &EncodePlan) -> Strictness {
    let mp4 = plan.format.is_mp4_family();
    plan.steps()
        .map(|step| match step.action {
            Action::Encode(encoder) => encoder.strict(),
            Action::Copy
                if mp4
                    && step.kind == StreamKind::Audio
                    && EXPERIMENTAL_IN_MP4.contains(&step.codec.as_str()) =>
            {
                Strictness::Experimental
            }
            Action::Copy => Strictness::Normal,
        })
        .fold(Strictness::Normal, Ord::min)
}
