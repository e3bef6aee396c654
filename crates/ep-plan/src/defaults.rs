//! Choosing the single "default" stream of a kind.

use ep_core::config::SortKey;
use ep_core::Disposition;

use crate::plan::PlanStep;
use crate::sort::{self, SortContext};

/// Step positions ordered by the default-selection keys (stable).
fn ordered(steps: &[PlanStep], keys: &[SortKey], ctx: &SortContext) -> Vec<usize> {
    let mut order: Vec<usize> = (0..steps.len()).collect();
    if !keys.is_empty() {
        order.sort_by(|&a, &b| sort::compare(&steps[a], &steps[b], keys, ctx));
    }
    order
}

fn make_sole_default(steps: &mut [PlanStep], chosen: usize) {
    for (pos, step) in steps.iter_mut().enumerate() {
        step.disposition.set(Disposition::Default, pos == chosen);
    }
}

/// Leave exactly one audio step carrying "default".
///
/// The default language is `preferred` (configured default, else the first
/// allow-list entry), else the language of the first step. A step in that
/// language that is already default is kept; otherwise the first step in
/// that language is promoted, else the first step overall.
pub fn select_audio_default(
    steps: &mut [PlanStep],
    preferred: Option<&str>,
    keys: &[SortKey],
    ctx: &SortContext,
) {
    let Some(first) = steps.first() else { return };
    let language = preferred.map(str::to_string).unwrap_or_else(|| first.language.clone());
    let order = ordered(steps, keys, ctx);

    let in_language = |pos: &&usize| steps[**pos].language == language;
    let chosen = order
        .iter()
        .filter(in_language)
        .find(|&&pos| steps[pos].is_default())
        .or_else(|| order.iter().find(in_language))
        .or(order.first())
        .copied();

    if let Some(chosen) = chosen {
        tracing::debug!(
            "Default audio: stream {} ({})",
            steps[chosen].source_index,
            steps[chosen].language
        );
        make_sole_default(steps, chosen);
    }
}

/// Leave exactly one subtitle step carrying "default" when a default
/// language is configured; otherwise the steps are left as they are.
///
/// Existing defaults collapse to the first one in selection order. When
/// none exists the first step in the language (else the first step) is
/// promoted.
pub fn select_subtitle_default(
    steps: &mut [PlanStep],
    default_language: Option<&str>,
    keys: &[SortKey],
    ctx: &SortContext,
) {
    let Some(language) = default_language else { return };
    let order = ordered(steps, keys, ctx);

    let chosen = order
        .iter()
        .find(|&&pos| steps[pos].is_default())
        .or_else(|| order.iter().find(|&&pos| steps[pos].language == language))
        .or(order.first())
        .copied();

    if let Some(chosen) = chosen {
        tracing::debug!("Default subtitle: stream {}", steps[chosen].source_index);
        make_sole_default(steps, chosen);
    }
}
