//! Language and disposition based stream selection.

use std::borrow::Cow;
use std::collections::HashSet;

use ep_core::config::StreamSelection;
use ep_core::{lang, Disposition, DispositionSet, StreamKind};
use ep_probe::Stream;

use crate::warning::Warning;

/// Where a candidate stream comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Origin {
    Source,
    /// Position in the source's external subtitle list.
    External(usize),
}

/// A stream that passed selection.
#[derive(Debug, Clone)]
pub struct Candidate<'s> {
    pub stream: &'s Stream,
    pub origin: Origin,
    /// Effective language (after `undefined_as_default`).
    pub language: String,
}

/// Normalised language settings derived from a [`StreamSelection`].
#[derive(Debug, Clone, Default)]
pub struct Languages {
    /// Allow-list in priority order; empty allows everything.
    pub allowed: Vec<String>,
    pub default: Option<String>,
}

impl Languages {
    pub fn new(selection: &StreamSelection, original_language: Option<&str>) -> Self {
        let mut allowed: Vec<String> = Vec::new();
        for code in &selection.languages {
            match lang::normalize(code) {
                Some(c) if !allowed.contains(&c) => allowed.push(c),
                Some(_) => {}
                None => tracing::debug!("Ignoring invalid language code '{code}'"),
            }
        }
        if selection.include_original_language && !allowed.is_empty() {
            if let Some(orig) = original_language.and_then(lang::normalize) {
                if !allowed.contains(&orig) {
                    allowed.push(orig);
                }
            }
        }
        Self {
            allowed,
            default: selection
                .default_language
                .as_deref()
                .and_then(lang::normalize),
        }
    }

    /// Default language: configured, else the first allowed language.
    pub fn preferred(&self) -> Option<&str> {
        self.default
            .as_deref()
            .or_else(|| self.allowed.first().map(String::as_str))
    }

    /// Rank of `language` in the allow-list.
    pub fn rank(&self, language: &str) -> Option<usize> {
        self.allowed.iter().position(|l| l == language)
    }
}

/// Apply the selection rules to `items` (in order) and return the survivors.
pub fn select<'s>(
    items: &[(Origin, &'s Stream)],
    selection: &StreamSelection,
    original_language: Option<&str>,
) -> Vec<Candidate<'s>> {
    let languages = Languages::new(selection, original_language);
    let mut blocked: HashSet<String> = HashSet::new();
    let mut seen: HashSet<(String, String)> = HashSet::new();
    let mut out = Vec::new();

    for &(origin, stream) in items {
        let language = effective_language(stream, selection, &languages);
        let signature = stream.disposition.signature();

        let forced = selection.force_default && stream.disposition.contains(Disposition::Default);
        if !forced {
            if !languages.allowed.is_empty() && !languages.allowed.contains(&language) {
                tracing::trace!("Stream {} rejected: language {language}", stream.index);
                continue;
            }
            if blocked.contains(&language) {
                tracing::trace!("Stream {} rejected: language {language} already taken", stream.index);
                continue;
            }
            if ignored(&stream.disposition, &selection.ignored_dispositions) {
                tracing::trace!("Stream {} rejected: disposition {signature}", stream.index);
                continue;
            }
            if selection.unique_dispositions && seen.contains(&(language.clone(), signature.clone())) {
                tracing::trace!("Stream {} rejected: duplicate {language}/{signature}", stream.index);
                continue;
            }
        }

        seen.insert((language.clone(), signature));
        if selection.first_stream_of_language {
            blocked.insert(language.clone());
        }
        out.push(Candidate {
            stream,
            origin,
            language,
        });
    }

    out
}

/// [`select`], retried once without the language allow-list when nothing
/// survives. The relaxed selection is local to this call.
pub fn select_relaxed<'s>(
    kind: StreamKind,
    items: &[(Origin, &'s Stream)],
    selection: &StreamSelection,
    original_language: Option<&str>,
) -> (Vec<Candidate<'s>>, Option<Warning>) {
    let mut effective = Cow::Borrowed(selection);
    let candidates = select(items, &effective, original_language);
    if !candidates.is_empty() || items.is_empty() || selection.languages.is_empty() {
        return (candidates, None);
    }

    let relaxed = effective.to_mut();
    relaxed.languages.clear();
    relaxed.include_original_language = false;
    let candidates = select(items, &effective, original_language);
    let warning = Warning::RelaxedSelection {
        kind,
        languages: selection.languages.clone(),
    };
    (candidates, Some(warning))
}

fn effective_language(stream: &Stream, selection: &StreamSelection, languages: &Languages) -> String {
    if selection.undefined_as_default && stream.language == lang::UNDEFINED {
        if let Some(default) = languages.default.as_ref() {
            return default.clone();
        }
    }
    stream.language.clone()
}

fn ignored(disposition: &DispositionSet, ignored: &DispositionSet) -> bool {
    disposition.intersects(ignored)
}
