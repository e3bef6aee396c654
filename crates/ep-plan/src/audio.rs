//! Audio steps: primary copy/encode, universal companions and original copies.

use std::collections::HashMap;

use ep_core::config::{AudioPolicy, UniversalAudioPolicy};
use ep_core::{Disposition, StreamKind};
use ep_probe::Stream;

use crate::codecs::{AudioEncoder, CodecTable, Encoder, Pool};
use crate::decision::CopyVeto;
use crate::filter::Candidate;
use crate::plan::{Action, EncodeReason, PlanStep};
use crate::warning::Warning;

const FALLBACK_CHANNEL_BITRATE: u32 = 128;

/// Inputs to audio planning besides the candidates.
pub struct AudioContext<'a> {
    pub policy: &'a AudioPolicy,
    pub veto: &'a CopyVeto<'a>,
    /// Combination group per source index (see [`crate::dedup`]).
    pub groups: &'a HashMap<u32, u32>,
}

/// Title generated from a channel count.
pub fn channel_title(channels: u32) -> String {
    match channels {
        1 => "Mono".to_string(),
        2 => "Stereo".to_string(),
        6 => "5.1 Channel".to_string(),
        8 => "7.1 Channel".to_string(),
        n => format!("{n} Channel"),
    }
}

fn source_kbps(stream: &Stream) -> Option<u32> {
    stream.bitrate.map(|b| (b / 1000) as u32)
}

/// Per-channel rate in kbps. A configured rate of 0 means "the source's own
/// per-channel rate".
fn per_channel_rate(configured: u32, stream: &Stream, channels: u32) -> u32 {
    if configured > 0 {
        return configured;
    }
    source_kbps(stream)
        .map(|kbps| kbps / channels.max(1))
        .filter(|rate| *rate > 0)
        .unwrap_or(FALLBACK_CHANNEL_BITRATE)
}

fn title_for(stream: &Stream, keep: bool, channels: u32) -> String {
    match (&stream.title, keep) {
        (Some(title), true) => title.clone(),
        _ => channel_title(channels),
    }
}

/// Plan every candidate. Unsupported encode targets drop the stream and
/// come back as warnings.
pub fn plan_audio(candidates: &[Candidate<'_>], ctx: &AudioContext<'_>) -> (Vec<PlanStep>, Vec<Warning>) {
    let policy = ctx.policy;
    let pool = Pool::<AudioEncoder>::parse(&policy.codecs);
    let universal = policy.universal.as_ref().filter(|u| !u.codecs.is_empty());

    let mut steps = Vec::new();
    let mut warnings = Vec::new();
    let mut companions = 0usize;

    for candidate in candidates {
        let stream = candidate.stream;
        let group = ctx.groups.get(&stream.index).copied();

        let primary = match primary_step(stream, &pool, ctx) {
            Ok(step) => step,
            Err(codec) => {
                warnings.push(Warning::UnsupportedCodec {
                    kind: StreamKind::Audio,
                    index: stream.index,
                    codec,
                });
                continue;
            }
        };
        let encoded = !primary.action.is_copy();
        let mut unit = vec![primary];

        let channels = stream.channels().unwrap_or(2);
        if let Some(u) = universal {
            if channels > 2 && !(u.first_stream_only && companions > 0) {
                match universal_step(stream, u, policy) {
                    Ok(step) => {
                        companions += 1;
                        unit.push(step);
                    }
                    Err(codec) => warnings.push(Warning::UnsupportedCodec {
                        kind: StreamKind::Audio,
                        index: stream.index,
                        codec,
                    }),
                }
            }
        }

        if policy.copy_original && encoded && !(ctx.veto)(stream) {
            let mut step = PlanStep::new(0, stream, Action::Copy);
            step.disposition.remove(Disposition::Default);
            step.channels = Some(channels);
            step.bitrate = source_kbps(stream);
            step.title = Some(title_for(stream, policy.keep_titles, channels));
            step.parent = Some(stream.index);
            unit.push(step);
        }

        for mut step in unit {
            step.language = candidate.language.clone();
            step.group = group;
            steps.push(step);
        }
    }

    (steps, warnings)
}

fn primary_step(stream: &Stream, pool: &Pool<AudioEncoder>, ctx: &AudioContext<'_>) -> Result<PlanStep, String> {
    let policy = ctx.policy;
    let channels = stream.channels().unwrap_or(2);
    let kbps = source_kbps(stream);

    let mut step = PlanStep::new(0, stream, Action::Copy);
    let debug = &mut step.debug;
    if !pool.accepts(&stream.codec) {
        debug.push(EncodeReason::Codec);
    }
    if (ctx.veto)(stream) {
        debug.push(EncodeReason::Veto);
    }
    if policy.max_channels > 0 && channels > policy.max_channels {
        debug.push(EncodeReason::MaxChannels);
    }
    if policy.max_bitrate > 0 && kbps.is_some_and(|b| b > policy.max_bitrate) {
        debug.push(EncodeReason::MaxBitrate);
    }
    if policy.force_filter && policy.filter.is_some() {
        debug.push(EncodeReason::ForceFilter);
    }

    if step.debug.is_empty() {
        step.channels = Some(channels);
        step.bitrate = kbps;
        step.title = Some(title_for(stream, policy.keep_titles, channels));
        return Ok(step);
    }

    let encoder = pool.target(&stream.codec)?;
    let mut out_channels = channels.min(encoder.max_channels());
    if policy.max_channels > 0 {
        out_channels = out_channels.min(policy.max_channels);
    }

    let reasons = std::mem::take(&mut step.debug);
    let mut step = PlanStep::new(0, stream, Action::Encode(Encoder::Audio(encoder)));
    step.debug = reasons;
    if out_channels < channels {
        if let Some(filter) = policy.channel_filter(out_channels) {
            step.filters.push(filter.to_string());
        }
    }
    if let Some(filter) = &policy.filter {
        step.filters.push(filter.clone());
    }

    let mut bitrate = per_channel_rate(policy.channel_bitrate, stream, channels) * out_channels;
    if policy.max_bitrate > 0 {
        bitrate = bitrate.min(policy.max_bitrate);
    }
    step.bitrate = Some(bitrate);
    step.channels = Some(out_channels);
    step.profile = policy.profile.clone();
    step.title = Some(title_for(stream, policy.keep_titles, out_channels));

    tracing::debug!(
        "Audio stream {} -> {} ({}ch, {}k): {}",
        stream.index,
        encoder.name(),
        out_channels,
        bitrate,
        step.debug
    );
    Ok(step)
}

fn universal_step(
    stream: &Stream,
    universal: &UniversalAudioPolicy,
    policy: &AudioPolicy,
) -> Result<PlanStep, String> {
    let pool = Pool::<AudioEncoder>::parse(&universal.codecs);
    let encoder = pool.target(&stream.codec)?;
    let channels = 2.min(encoder.max_channels());

    let mut step = PlanStep::new(0, stream, Action::Encode(Encoder::Audio(encoder)));
    step.debug.push(EncodeReason::Universal);
    if let Some(filter) = policy.channel_filter(channels) {
        step.filters.push(filter.to_string());
    }
    if let Some(filter) = &universal.filter {
        step.filters.push(filter.clone());
    }
    step.bitrate = Some(per_channel_rate(universal.channel_bitrate, stream, stream.channels().unwrap_or(2)) * channels);
    step.channels = Some(channels);
    step.profile = universal.profile.clone();
    step.title = Some(channel_title(channels));
    step.parent = Some(stream.index);
    Ok(step)
}
