//! Duplicate audio detection and purge.
//!
//! A *combination* is a run of consecutive audio streams in one language
//! whose codecs equal a configured ordered list (for example a DTS track
//! followed by its AC3 fallback). Inside a combination only one step per
//! output channel count survives.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashMap};

use ep_probe::Stream;

use crate::codecs::{AudioEncoder, CodecTable};
use crate::plan::PlanStep;

fn codec_matches(name: &str, codec: &str) -> bool {
    name.eq_ignore_ascii_case(codec)
        || AudioEncoder::from_name(name).is_some_and(|e| e.codec() == codec)
}

/// Map every audio stream index that belongs to a combination to the
/// group's minimum index. `streams` are the source's audio streams in
/// source order. Windows never overlap; the first configured combination
/// matching at a position wins.
pub fn detect_combinations(streams: &[&Stream], combinations: &[Vec<String>]) -> HashMap<u32, u32> {
    let mut groups = HashMap::new();
    let mut i = 0;

    'outer: while i < streams.len() {
        for combo in combinations.iter().filter(|c| c.len() > 1) {
            let Some(window) = streams.get(i..i + combo.len()) else {
                continue;
            };
            let language = &window[0].language;
            let matched = window
                .iter()
                .zip(combo)
                .all(|(s, name)| &s.language == language && codec_matches(name, &s.codec));
            if matched {
                let group = window.iter().map(|s| s.index).min().unwrap_or(window[0].index);
                for s in window {
                    groups.insert(s.index, group);
                }
                tracing::debug!(
                    "Audio combination [{}] at stream {group}",
                    combo.join(", ")
                );
                i += combo.len();
                continue 'outer;
            }
        }
        i += 1;
    }

    groups
}

/// Tie-break between two steps competing for the same slot. `Less` means
/// `a` is kept. Order: copy of an approved codec, approved codec, higher
/// bitrate, source default, codec rank.
fn preference(a: &PlanStep, b: &PlanStep, rank: &dyn Fn(&str) -> Option<usize>) -> Ordering {
    let (rank_a, rank_b) = (rank(&a.codec), rank(&b.codec));
    let approved_copy = |step: &PlanStep, rank: Option<usize>| step.action.is_copy() && rank.is_some();

    approved_copy(b, rank_b)
        .cmp(&approved_copy(a, rank_a))
        .then_with(|| rank_b.is_some().cmp(&rank_a.is_some()))
        .then_with(|| b.bitrate.unwrap_or(0).cmp(&a.bitrate.unwrap_or(0)))
        .then_with(|| b.source_default.cmp(&a.source_default))
        .then_with(|| match (rank_a, rank_b) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => Ordering::Equal,
        })
}

/// Drop duplicate steps inside combinations, keeping plan order for the
/// survivors. Steps outside any combination are untouched.
pub fn purge(steps: Vec<PlanStep>, rank: &dyn Fn(&str) -> Option<usize>) -> Vec<PlanStep> {
    let mut winners: BTreeMap<(usize, u32, u32), usize> = BTreeMap::new();
    for (pos, step) in steps.iter().enumerate() {
        let Some(group) = step.group else { continue };
        let slot = (step.input, group, step.channels.unwrap_or(0));
        match winners.get(&slot) {
            // Equal preference keeps the earlier step.
            Some(&best) if preference(&steps[best], step, rank) != Ordering::Greater => {}
            _ => {
                winners.insert(slot, pos);
            }
        }
    }

    steps
        .into_iter()
        .enumerate()
        .filter(|(pos, step)| {
            let Some(group) = step.group else { return true };
            let keep = winners.get(&(step.input, group, step.channels.unwrap_or(0))) == Some(pos);
            if !keep {
                tracing::debug!(
                    "Dropping duplicate audio stream {} ({}, {} channels)",
                    step.source_index,
                    step.codec,
                    step.channels.unwrap_or(0)
                );
            }
            keep
        })
        .map(|(_, step)| step)
        .collect()
}
