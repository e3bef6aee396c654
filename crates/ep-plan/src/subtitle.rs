//! Subtitle plan: burn, embed, rip or drop.
//!
//! Candidates are the source's subtitle streams followed by the external
//! subtitle files, filtered by the subtitle selection rules. Each candidate
//! must have been classified as image or text beforehand. The burn-in pick
//! (if enabled) is taken out first; every other candidate is embedded when
//! the class is enabled and has a pool, otherwise extracted to its own file
//! when a rip pool for the class exists, otherwise dropped.

use std::path::{Path, PathBuf};

use ep_core::config::SubtitlePolicy;
use ep_core::{lang, StreamKind};
use ep_probe::{SourceFile, Stream};

use crate::codecs::{CodecTable, Encoder, Pool, SubtitleEncoder};
use crate::decision::CopyVeto;
use crate::external;
use crate::filter::{self, Candidate, Languages, Origin};
use crate::plan::{Action, BurnIn, EncodeReason, Extraction, PlanStep};
use crate::sort::{self, SortContext};
use crate::warning::Warning;

/// Inputs to subtitle planning besides the source.
pub struct SubtitleContext<'a> {
    pub policy: &'a SubtitlePolicy,
    pub veto: &'a CopyVeto<'a>,
}

/// Everything the subtitle plan contributes to the encode plan.
#[derive(Debug, Default)]
pub struct SubtitleOutcome {
    pub steps: Vec<PlanStep>,
    /// Extra encoder inputs, in input order starting at 1.
    pub external_inputs: Vec<PathBuf>,
    pub extractions: Vec<Extraction>,
    pub burn: Option<BurnIn>,
    pub warnings: Vec<Warning>,
}

impl SubtitleOutcome {
    /// Encoder input number for an external subtitle, registering it on
    /// first use.
    fn input_for(&mut self, path: &Path) -> usize {
        match self.external_inputs.iter().position(|p| p == path) {
            Some(pos) => pos + 1,
            None => {
                self.external_inputs.push(path.to_path_buf());
                self.external_inputs.len()
            }
        }
    }
}

/// Escape a path for use inside a single-quoted filter argument.
pub fn escape_filter_path(path: &Path) -> String {
    path.to_string_lossy()
        .replace('\\', "\\\\")
        .replace('\'', "'\\''")
        .replace(':', "\\:")
}

/// The `subtitles=` filter burning stream `si` of `path`.
pub fn burn_filter(path: &Path, si: u32) -> String {
    format!("subtitles='{}':si={si}", escape_filter_path(path))
}

/// Output path of a ripped subtitle: `<dir>/<stem>.<lang>[.<disp>...].<ext>`.
pub fn rip_path(source: &SourceFile, language: &str, tokens: &[&str], ext: &str) -> PathBuf {
    let stem = source.stem().unwrap_or("subtitle");
    let mut name = format!("{stem}.{language}");
    for token in tokens {
        name.push('.');
        name.push_str(token);
    }
    name.push('.');
    name.push_str(ext);
    match source.path.parent() {
        Some(dir) => dir.join(name),
        None => PathBuf::from(name),
    }
}

fn is_image(stream: &Stream) -> Option<bool> {
    stream.subtitle_info().and_then(|s| s.image_based)
}

fn describe(candidate: &Candidate<'_>, source: &SourceFile) -> String {
    match candidate.origin {
        Origin::Source => format!("subtitle stream {}", candidate.stream.index),
        Origin::External(i) => source
            .external_subtitles
            .get(i)
            .map(|e| format!("subtitle file {}", e.path.display()))
            .unwrap_or_else(|| format!("external subtitle {i}")),
    }
}

/// Plan every subtitle of `source`.
pub fn plan_subtitles(source: &SourceFile, ctx: &SubtitleContext<'_>) -> SubtitleOutcome {
    let policy = ctx.policy;
    let original = source.original_language.as_deref();
    let mut out = SubtitleOutcome::default();

    let externals: Vec<Stream> = if policy.include_external {
        source.external_subtitles.iter().map(external::as_stream).collect()
    } else {
        Vec::new()
    };
    let items: Vec<(Origin, &Stream)> = source
        .streams_of(StreamKind::Subtitle)
        .map(|s| (Origin::Source, s))
        .chain(externals.iter().enumerate().map(|(i, s)| (Origin::External(i), s)))
        .collect();

    let selected = filter::select(&items, &policy.selection, original);

    // Drop unclassified candidates.
    let mut classified: Vec<(Candidate<'_>, bool)> = Vec::with_capacity(selected.len());
    for candidate in selected {
        match is_image(candidate.stream) {
            Some(image) => classified.push((candidate, image)),
            None => out.warnings.push(Warning::ClassificationFailure {
                subject: describe(&candidate, source),
                reason: "not classified as image or text".to_string(),
            }),
        }
    }

    let burned = if policy.burn.enabled {
        pick_burn(source, &classified, ctx, original)
    } else {
        None
    };
    if let Some((origin, index, burn)) = burned {
        tracing::info!("Burning {} subtitle into video", burn.language);
        out.burn = Some(burn);
        classified.retain(|(c, _)| !(c.origin == origin && c.stream.index == index));
    }

    for (candidate, image) in &classified {
        plan_candidate(source, candidate, *image, ctx, &mut out);
    }

    out
}

fn pick_burn(
    source: &SourceFile,
    classified: &[(Candidate<'_>, bool)],
    ctx: &SubtitleContext<'_>,
    original: Option<&str>,
) -> Option<(Origin, u32, BurnIn)> {
    let policy = ctx.policy;
    let mut eligible: Vec<Candidate<'_>> = classified
        .iter()
        .filter(|(c, image)| !image && c.stream.disposition.is_superset(&policy.burn.dispositions))
        .map(|(c, _)| c.clone())
        .collect();

    let sort_ctx = SortContext {
        codecs: Pool::<SubtitleEncoder>::parse(&policy.codecs).codec_ids(),
        languages: Languages::new(&policy.selection, original).allowed,
        original_language: original.and_then(lang::normalize),
    };
    sort::sort_by_keys(&mut eligible, &policy.burn.sort_keys, &sort_ctx);

    let chosen = eligible.into_iter().next()?;
    let (path, si) = match chosen.origin {
        Origin::Source => {
            let si = source
                .streams_of(StreamKind::Subtitle)
                .position(|s| s.index == chosen.stream.index)?;
            (source.path.clone(), si as u32)
        }
        Origin::External(i) => (source.external_subtitles.get(i)?.path.clone(), 0),
    };
    let filter = burn_filter(&path, si);
    Some((
        chosen.origin,
        chosen.stream.index,
        BurnIn {
            path,
            subtitle_index: si,
            language: chosen.language.clone(),
            filter,
        },
    ))
}

fn plan_candidate(
    source: &SourceFile,
    candidate: &Candidate<'_>,
    image: bool,
    ctx: &SubtitleContext<'_>,
    out: &mut SubtitleOutcome,
) {
    let policy = ctx.policy;
    let stream = candidate.stream;
    let (codecs, embed) = if image {
        (&policy.image_codecs, policy.embed_image)
    } else {
        (&policy.codecs, policy.embed)
    };

    if embed && !codecs.is_empty() {
        let pool = Pool::<SubtitleEncoder>::parse(codecs);
        let vetoed = (ctx.veto)(stream);
        let action = if pool.accepts(&stream.codec) && !vetoed {
            Action::Copy
        } else {
            match pool.target(&stream.codec) {
                Ok(encoder) => Action::Encode(Encoder::Subtitle(encoder)),
                Err(codec) => {
                    out.warnings.push(Warning::UnsupportedCodec {
                        kind: StreamKind::Subtitle,
                        index: stream.index,
                        codec,
                    });
                    return;
                }
            }
        };

        let input = match candidate.origin {
            Origin::Source => 0,
            Origin::External(i) => match source.external_subtitles.get(i) {
                Some(ext) => out.input_for(&ext.path),
                None => return,
            },
        };
        let mut step = PlanStep::new(input, stream, action);
        if !pool.accepts(&stream.codec) {
            step.debug.push(EncodeReason::Codec);
        }
        if vetoed {
            step.debug.push(EncodeReason::Veto);
        }
        step.language = candidate.language.clone();
        if policy.keep_titles {
            step.title = stream.title.clone();
        }
        out.steps.push(step);
        return;
    }

    let rip = &policy.rip;
    let rip_codecs = if image { &rip.image_codecs } else { &rip.codecs };
    if rip_codecs.is_empty() {
        tracing::debug!("Dropping {}: no embed or rip pool", describe(candidate, source));
        return;
    }
    if candidate.origin != Origin::Source {
        tracing::debug!("{} is already a separate file", describe(candidate, source));
        return;
    }

    let pool = Pool::<SubtitleEncoder>::parse(rip_codecs);
    let encoder = if pool.accepts(&stream.codec) {
        None
    } else {
        match pool.target(&stream.codec) {
            Ok(e) => Some(e),
            Err(codec) => {
                out.warnings.push(Warning::UnsupportedCodec {
                    kind: StreamKind::Subtitle,
                    index: stream.index,
                    codec,
                });
                return;
            }
        }
    };
    let ext = encoder
        .or_else(|| SubtitleEncoder::for_codec(&stream.codec))
        .map(|e| e.extension())
        .unwrap_or(stream.codec.as_str());

    let tokens: Vec<&str> = stream
        .disposition
        .iter()
        .filter(|d| rip.filename_dispositions.contains(*d))
        .map(|d| d.name())
        .collect();
    let output = rip_path(source, &candidate.language, &tokens, ext);
    tracing::debug!("Extracting subtitle stream {} to {}", stream.index, output.display());

    out.extractions.push(Extraction {
        input: source.path.clone(),
        source_index: stream.index,
        encoder,
        output,
        language: candidate.language.clone(),
        disposition: stream.disposition,
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use ep_core::config::BurnPolicy;
    use ep_core::Disposition;
    use ep_probe::{ExternalSubtitle, StreamDetails, SubtitleInfo};

    fn never(_: &Stream) -> bool {
        false
    }

    fn sub(index: u32, codec: &str, lang: &str, image: Option<bool>) -> Stream {
        let mut s = Stream::subtitle(index, codec).with_language(lang);
        s.details = StreamDetails::Subtitle(SubtitleInfo { image_based: image });
        s
    }

    fn source(streams: Vec<Stream>) -> SourceFile {
        let mut source = SourceFile::new("/media/Movie.mkv", "matroska,webm");
        source.streams = streams;
        source
    }

    fn run(policy: &SubtitlePolicy, source: &SourceFile) -> SubtitleOutcome {
        let ctx = SubtitleContext {
            policy,
            veto: &never,
        };
        plan_subtitles(source, &ctx)
    }

    #[test]
    fn text_embedded_image_ripped() {
        let mut policy = SubtitlePolicy::default();
        policy.rip.image_codecs = vec!["pgssub".into()];
        let src = source(vec![
            Stream::video(0, "h264", 1920, 1080),
            sub(2, "subrip", "eng", Some(false)),
            sub(3, "hdmv_pgs_subtitle", "eng", Some(true))
                .with_disposition(Disposition::Forced),
        ]);
        let out = run(&policy, &src);

        assert_eq!(out.steps.len(), 1);
        assert_eq!(out.steps[0].source_index, 2);
        assert_eq!(out.steps[0].codec, "mov_text");
        assert!(out.steps[0].debug.contains(EncodeReason::Codec));

        assert_eq!(out.extractions.len(), 1);
        let rip = &out.extractions[0];
        assert_eq!(rip.source_index, 3);
        assert!(rip.encoder.is_none());
        assert_eq!(rip.output, PathBuf::from("/media/Movie.eng.forced.sup"));
    }

    #[test]
    fn unclassified_is_skipped_with_warning() {
        let src = source(vec![sub(2, "subrip", "eng", None)]);
        let out = run(&SubtitlePolicy::default(), &src);
        assert!(out.steps.is_empty());
        assert_eq!(
            out.warnings,
            vec![Warning::ClassificationFailure {
                subject: "subtitle stream 2".into(),
                reason: "not classified as image or text".into(),
            }]
        );
    }

    #[test]
    fn no_pool_drops() {
        let policy = SubtitlePolicy::default();
        let src = source(vec![sub(2, "hdmv_pgs_subtitle", "eng", Some(true))]);
        let out = run(&policy, &src);
        assert!(out.steps.is_empty());
        assert!(out.extractions.is_empty());
    }

    #[test]
    fn external_inputs_registered_in_order() {
        let mut src = source(vec![sub(2, "mov_text", "eng", Some(false))]);
        for name in ["Movie.fr.srt", "Movie.de.srt"] {
            src.external_subtitles.push(ExternalSubtitle {
                path: PathBuf::from("/media").join(name),
                codec: "subrip".into(),
                language: if name.contains(".fr.") { "fra".into() } else { "deu".into() },
                disposition: Default::default(),
                image_based: Some(false),
            });
        }
        let out = run(&SubtitlePolicy::default(), &src);
        let maps: Vec<String> = out.steps.iter().map(|s| s.map_spec()).collect();
        assert_eq!(maps, vec!["0:2", "1:0", "2:0"]);
        assert!(out.steps[0].action.is_copy());
        assert_eq!(out.external_inputs.len(), 2);
        assert_eq!(out.steps[1].language, "fra");
    }

    #[test]
    fn externals_can_be_disabled() {
        let mut src = source(vec![]);
        src.external_subtitles.push(ExternalSubtitle {
            path: PathBuf::from("/media/Movie.en.srt"),
            codec: "subrip".into(),
            language: "eng".into(),
            disposition: Default::default(),
            image_based: Some(false),
        });
        let policy = SubtitlePolicy {
            include_external: false,
            ..Default::default()
        };
        let out = run(&policy, &src);
        assert!(out.steps.is_empty());
        assert!(out.external_inputs.is_empty());
    }

    #[test]
    fn burn_in_takes_forced_text_stream() {
        let policy = SubtitlePolicy {
            burn: BurnPolicy {
                enabled: true,
                ..Default::default()
            },
            ..Default::default()
        };
        let src = source(vec![
            Stream::video(0, "h264", 1920, 1080),
            sub(1, "subrip", "eng", Some(false)),
            sub(2, "subrip", "eng", Some(false)).with_disposition(Disposition::Forced),
        ]);
        let out = run(&policy, &src);
        let burn = out.burn.expect("burn selected");
        assert_eq!(burn.subtitle_index, 1);
        assert_eq!(burn.filter, "subtitles='/media/Movie.mkv':si=1");
        let embedded: Vec<u32> = out.steps.iter().map(|s| s.source_index).collect();
        assert_eq!(embedded, vec![1]);
    }

    #[test]
    fn filter_path_escaping() {
        assert_eq!(
            burn_filter(Path::new("/media/It's: here.mkv"), 0),
            "subtitles='/media/It'\\''s\\: here.mkv':si=0"
        );
    }
}
