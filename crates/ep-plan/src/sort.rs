//! Multi-key stream ordering.
//!
//! Sort keys are applied left to right through one composite comparator;
//! ties fall through to the next key and finally to the existing order
//! (the sort is stable). Ranked keys (`codec`, `language`) put unranked
//! entries last in either direction.

use std::cmp::Ordering;

use ep_core::config::{SortField, SortKey};
use ep_core::DispositionSet;

use crate::filter::{Candidate, Origin};
use crate::plan::PlanStep;

/// The properties sort keys look at.
pub trait SortSubject {
    fn codec(&self) -> &str;
    fn channels(&self) -> u32;
    /// Bitrate in kbps, 0 when unknown.
    fn bitrate(&self) -> u32;
    fn language(&self) -> &str;
    fn map_key(&self) -> (usize, u32);
    fn disposition(&self) -> DispositionSet;
}

impl SortSubject for PlanStep {
    fn codec(&self) -> &str {
        &self.codec
    }

    fn channels(&self) -> u32 {
        self.channels.unwrap_or(0)
    }

    fn bitrate(&self) -> u32 {
        self.bitrate.unwrap_or(0)
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn map_key(&self) -> (usize, u32) {
        PlanStep::map_key(self)
    }

    fn disposition(&self) -> DispositionSet {
        self.disposition
    }
}

impl SortSubject for Candidate<'_> {
    fn codec(&self) -> &str {
        &self.stream.codec
    }

    fn channels(&self) -> u32 {
        self.stream.channels().unwrap_or(0)
    }

    fn bitrate(&self) -> u32 {
        self.stream.bitrate.map(|b| (b / 1000) as u32).unwrap_or(0)
    }

    fn language(&self) -> &str {
        &self.language
    }

    fn map_key(&self) -> (usize, u32) {
        match self.origin {
            Origin::Source => (0, self.stream.index),
            Origin::External(i) => (i + 1, 0),
        }
    }

    fn disposition(&self) -> DispositionSet {
        self.stream.disposition
    }
}

/// Rankings used by the `codec`, `language` and `original-language` keys.
#[derive(Debug, Clone, Default)]
pub struct SortContext {
    /// Codec identifiers in pool order.
    pub codecs: Vec<String>,
    /// Allowed languages in priority order.
    pub languages: Vec<String>,
    pub original_language: Option<String>,
}

impl SortContext {
    pub fn codec_rank(&self, codec: &str) -> Option<usize> {
        self.codecs.iter().position(|c| c == codec)
    }

    pub fn language_rank(&self, language: &str) -> Option<usize> {
        self.languages.iter().position(|l| l == language)
    }

    fn is_original(&self, language: &str) -> bool {
        self.original_language.as_deref() == Some(language)
    }
}

fn directed(ord: Ordering, descending: bool) -> Ordering {
    if descending {
        ord.reverse()
    } else {
        ord
    }
}

fn ranked(a: Option<usize>, b: Option<usize>, descending: bool) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => directed(x.cmp(&y), descending),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// Composite comparator over `keys`.
pub fn compare<T: SortSubject>(a: &T, b: &T, keys: &[SortKey], ctx: &SortContext) -> Ordering {
    for key in keys {
        let desc = key.descending;
        let ord = match key.field {
            SortField::Codec => ranked(ctx.codec_rank(a.codec()), ctx.codec_rank(b.codec()), desc),
            SortField::Channels => directed(a.channels().cmp(&b.channels()), desc),
            SortField::Bitrate => directed(a.bitrate().cmp(&b.bitrate()), desc),
            SortField::Language => ranked(
                ctx.language_rank(a.language()),
                ctx.language_rank(b.language()),
                desc,
            ),
            SortField::OriginalLanguage => directed(
                ctx.is_original(a.language()).cmp(&ctx.is_original(b.language())),
                desc,
            ),
            SortField::Map => directed(a.map_key().cmp(&b.map_key()), desc),
            SortField::Disposition(d) => directed(
                a.disposition().contains(d).cmp(&b.disposition().contains(d)),
                desc,
            ),
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Stable sort of arbitrary subjects.
pub fn sort_by_keys<T: SortSubject>(items: &mut [T], keys: &[SortKey], ctx: &SortContext) {
    if keys.is_empty() {
        return;
    }
    items.sort_by(|a, b| compare(a, b, keys, ctx));
}

/// Sort plan steps, keeping every companion step directly after its primary.
pub fn sort_steps(steps: Vec<PlanStep>, keys: &[SortKey], ctx: &SortContext) -> Vec<PlanStep> {
    if keys.is_empty() {
        return steps;
    }

    let mut units: Vec<Vec<PlanStep>> = Vec::new();
    for step in steps {
        if let Some(parent) = step.parent {
            let head = units.iter_mut().rev().find(|u| {
                u[0].parent.is_none() && u[0].input == step.input && u[0].source_index == parent
            });
            if let Some(unit) = head {
                unit.push(step);
                continue;
            }
        }
        units.push(vec![step]);
    }

    units.sort_by(|a, b| compare(&a[0], &b[0], keys, ctx));
    units.into_iter().flatten().collect()
}
