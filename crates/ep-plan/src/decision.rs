//! Copy-versus-encode decisions for the video stream.
//!
//! A stream starts as `copy` when its codec is in the pool. Every rule that
//! objects is recorded in the step's debug tag in evaluation order; any
//! objection downgrades the step to an encode with the pool's first codec.
//! Nothing ever upgrades an encode back to a copy.

use ep_core::config::VideoPolicy;
use ep_probe::{Stream, VideoInfo};

use crate::codecs::{CodecTable, Encoder, Pool, VideoEncoder};
use crate::geometry::{self, Geometry};
use crate::plan::{Action, CrfSettings, DebugTag, EncodeReason, HdrParams, PlanStep};

/// Predicate refusing a copy of a stream.
pub type CopyVeto<'a> = dyn Fn(&Stream) -> bool + Send + Sync + 'a;

/// Inputs to the video decision besides the stream itself.
pub struct VideoContext<'a> {
    pub policy: &'a VideoPolicy,
    pub veto: &'a CopyVeto<'a>,
    /// Ratio-adjusted bitrate estimate in kbps.
    pub estimate: Option<u32>,
    /// `subtitles=` filter for a burned-in subtitle.
    pub burn_filter: Option<String>,
}

/// Result of planning the video stream.
#[derive(Debug)]
pub enum VideoOutcome {
    Step(Box<PlanStep>),
    /// The encode target is not a known encoder.
    Unsupported(String),
}

/// The video settings in effect for one stream: the HDR section overrides
/// the SDR one field by field when the stream classifies as HDR.
struct Effective<'a> {
    hdr: bool,
    codecs: &'a [String],
    profiles: &'a [String],
    pix_fmts: &'a [String],
    filter: Option<&'a str>,
    force_filter: bool,
}

impl<'a> Effective<'a> {
    fn new(policy: &'a VideoPolicy, info: &VideoInfo) -> Self {
        let hdr = policy.hdr.matches(
            info.color.space.as_deref(),
            info.color.transfer.as_deref(),
            info.color.primaries.as_deref(),
        );
        let pick = |hdr_list: &'a [String], sdr_list: &'a [String]| {
            if hdr && !hdr_list.is_empty() {
                hdr_list
            } else {
                sdr_list
            }
        };
        let (filter, force_filter) = match (&policy.hdr.filter, hdr) {
            (Some(f), true) => (Some(f.as_str()), policy.hdr.force_filter),
            _ => (policy.filter.as_deref(), policy.force_filter),
        };
        Self {
            hdr,
            codecs: pick(policy.hdr.codecs.as_slice(), policy.codecs.as_slice()),
            profiles: pick(policy.hdr.profiles.as_slice(), policy.profiles.as_slice()),
            pix_fmts: pick(policy.hdr.pix_fmts.as_slice(), policy.pix_fmts.as_slice()),
            filter,
            force_filter,
        }
    }
}

fn contains_ci(list: &[String], value: &str) -> bool {
    list.iter().any(|v| v.eq_ignore_ascii_case(value))
}

/// Plan the video stream.
pub fn plan_video(stream: &Stream, info: &VideoInfo, ctx: &VideoContext<'_>) -> VideoOutcome {
    let policy = ctx.policy;
    let eff = Effective::new(policy, info);
    let pool = Pool::<VideoEncoder>::parse(eff.codecs);
    let mut reasons = DebugTag::new(stream.kind());

    if !pool.accepts(&stream.codec) {
        reasons.push(EncodeReason::Codec);
    }
    if (ctx.veto)(stream) {
        reasons.push(EncodeReason::Veto);
    }
    if policy.max_bitrate > 0 && ctx.estimate.is_some_and(|e| e > policy.max_bitrate) {
        reasons.push(EncodeReason::MaxBitrate);
    }
    if policy.max_width > 0 && info.width > policy.max_width {
        reasons.push(EncodeReason::MaxWidth);
    }
    if let (Some(max), Some(level)) = (policy.max_level, info.level) {
        if level > max {
            reasons.push(EncodeReason::MaxLevel);
        }
    }
    if let Some(ref profile) = info.profile {
        if !eff.profiles.is_empty() && !contains_ci(eff.profiles, profile) {
            reasons.push(EncodeReason::Profile);
        }
    }
    if let Some(ref pix_fmt) = info.pix_fmt {
        if !eff.pix_fmts.is_empty() && !contains_ci(eff.pix_fmts, pix_fmt) {
            reasons.push(EncodeReason::PixFmt);
        }
    }
    if eff.filter.is_some() && eff.force_filter {
        reasons.push(EncodeReason::ForceFilter);
    }
    let source_depth = info.pix_fmt.as_deref().map(geometry::pix_fmt_depth);
    if let (Some(depth), Some(matched)) = (source_depth, pool.matched(&stream.codec)) {
        if depth > matched.max_depth() {
            reasons.push(EncodeReason::BitDepth);
        }
    }
    let deinterlace = policy
        .deinterlace
        .as_deref()
        .filter(|_| info.is_interlaced());
    if deinterlace.is_some() {
        reasons.push(EncodeReason::Deinterlace);
    }
    let resize = policy
        .aspect
        .as_ref()
        .and_then(|a| geometry::aspect_correction(info.width, info.height, a))
        .filter(Geometry::changes_picture);
    if resize.is_some() {
        reasons.push(EncodeReason::Dimensions);
    }
    if ctx.burn_filter.is_some() {
        reasons.push(EncodeReason::BurnIn);
    }

    if reasons.is_empty() {
        let mut step = PlanStep::new(0, stream, Action::Copy);
        step.bitrate = stream.bitrate.map(|b| (b / 1000) as u32);
        return VideoOutcome::Step(Box::new(step));
    }

    let encoder = match pool.target(&stream.codec) {
        Ok(e) => e,
        Err(name) => return VideoOutcome::Unsupported(name),
    };
    tracing::debug!(
        "Video stream {} re-encoded ({}) with {}",
        stream.index,
        reasons,
        encoder.encoder()
    );

    let mut step = PlanStep::new(0, stream, Action::Encode(Encoder::Video(encoder)));
    step.debug = reasons;

    // Filter chain: deinterlace, resize, configured filter, burn-in.
    if let Some(f) = deinterlace {
        step.filters.push(f.to_string());
    }
    match resize {
        Some(ref g) => step.filters.extend(g.filters()),
        None if policy.max_width > 0 && info.width > policy.max_width => {
            step.filters.push(geometry::max_width_scale(policy.max_width));
        }
        None => {}
    }
    if let Some(f) = eff.filter {
        step.filters.push(f.to_string());
    }
    if let Some(ref f) = ctx.burn_filter {
        step.filters.push(f.clone());
    }

    step.pix_fmt = choose_pix_fmt(info, &eff, encoder);
    step.profile = match info.profile {
        Some(ref p) if contains_ci(eff.profiles, p) => None,
        _ => eff.profiles.first().cloned(),
    };
    step.level = policy.max_level;
    step.preset = policy.preset.clone();
    apply_rate_control(&mut step, policy, ctx.estimate);

    if eff.hdr {
        step.hdr = Some(hdr_params(info, encoder));
    }

    VideoOutcome::Step(Box::new(step))
}

/// Pixel format for an encode: the first approved format when the source's
/// is not approved, then a depth fallback when the result is deeper than
/// the encoder supports.
fn choose_pix_fmt(info: &VideoInfo, eff: &Effective<'_>, encoder: VideoEncoder) -> Option<String> {
    let source = info.pix_fmt.as_deref()?;
    let mut chosen = match eff.pix_fmts.first() {
        Some(first) if !contains_ci(eff.pix_fmts, source) => Some(first.clone()),
        _ => None,
    };
    let depth = geometry::pix_fmt_depth(chosen.as_deref().unwrap_or(source));
    if depth > encoder.max_depth() {
        chosen = geometry::fallback_pix_fmt(source, encoder.max_depth(), eff.pix_fmts);
    }
    chosen
}

fn apply_rate_control(step: &mut PlanStep, policy: &VideoPolicy, estimate: Option<u32>) {
    if let Some(profile) = estimate.and_then(|e| geometry::select_crf_profile(&policy.crf_profiles, e)) {
        step.crf = Some(CrfSettings {
            crf: profile.crf,
            maxrate: profile.maxrate.clone(),
            bufsize: profile.bufsize.clone(),
        });
        return;
    }
    if let Some(crf) = policy.crf {
        step.crf = Some(CrfSettings {
            crf,
            maxrate: None,
            bufsize: None,
        });
        return;
    }
    step.bitrate = match (estimate, policy.max_bitrate) {
        (Some(e), 0) => Some(e),
        (Some(e), max) => Some(e.min(max)),
        (None, 0) => None,
        (None, max) => Some(max),
    };
}

fn hdr_params(info: &VideoInfo, encoder: VideoEncoder) -> HdrParams {
    let color = &info.color;
    let mut params = HdrParams {
        primaries: color.primaries.clone(),
        transfer: color.transfer.clone(),
        space: color.space.clone(),
        x265_params: None,
    };
    if encoder.is_x265() {
        let mut parts = vec!["hdr-opt=1".to_string(), "repeat-headers=1".to_string()];
        if let Some(ref p) = color.primaries {
            parts.push(format!("colorprim={p}"));
        }
        if let Some(ref t) = color.transfer {
            parts.push(format!("transfer={t}"));
        }
        if let Some(ref s) = color.space {
            parts.push(format!("colormatrix={s}"));
        }
        if let Some(ref md) = info.mastering_display {
            parts.push(format!("master-display={}", md.to_x265()));
        }
        if let Some(ref cll) = info.content_light {
            parts.push(format!("max-cll={},{}", cll.max_content, cll.max_average));
        }
        params.x265_params = Some(parts.join(":"));
    }
    params
}
