//! Non-fatal conditions raised while compiling a plan.

use ep_core::StreamKind;
use serde::Serialize;
use std::fmt;

/// A recoverable condition. The plan is still produced; the warning explains
/// what the compiler did instead of what the policy asked for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Warning {
    /// No stream satisfied the language allow-list, so it was dropped for
    /// this compile.
    RelaxedSelection {
        kind: StreamKind,
        languages: Vec<String>,
    },
    /// The encode target is not a known encoder; the stream was dropped.
    UnsupportedCodec {
        kind: StreamKind,
        index: u32,
        codec: String,
    },
    /// A subtitle could not be classified as image or text and was skipped.
    ClassificationFailure { subject: String, reason: String },
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::RelaxedSelection { kind, languages } => write!(
                f,
                "no {kind} stream matched languages [{}]; language filter relaxed",
                languages.join(", ")
            ),
            Self::UnsupportedCodec { kind, index, codec } => write!(
                f,
                "{kind} stream {index} dropped: unsupported encode target '{codec}'"
            ),
            Self::ClassificationFailure { subject, reason } => {
                write!(f, "{subject} skipped: {reason}")
            }
        }
    }
}

/// Warning accumulator; every pushed warning is also logged.
#[derive(Debug, Default)]
pub(crate) struct Warnings(Vec<Warning>);

impl Warnings {
    pub fn push(&mut self, warning: Warning) {
        tracing::warn!("{warning}");
        self.0.push(warning);
    }

    pub fn into_vec(self) -> Vec<Warning> {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display() {
        let w = Warning::RelaxedSelection {
            kind: StreamKind::Audio,
            languages: vec!["fra".into(), "deu".into()],
        };
        assert_eq!(
            w.to_string(),
            "no audio stream matched languages [fra, deu]; language filter relaxed"
        );

        let w = Warning::UnsupportedCodec {
            kind: StreamKind::Video,
            index: 0,
            codec: "prores".into(),
        };
        assert_eq!(
            w.to_string(),
            "video stream 0 dropped: unsupported encode target 'prores'"
        );
    }

    #[test]
    fn serializes_tagged() {
        let w = Warning::ClassificationFailure {
            subject: "subtitle stream 3".into(),
            reason: "unclassified".into(),
        };
        let json = serde_json::to_value(&w).unwrap();
        assert_eq!(json["type"], "classification_failure");
        assert_eq!(json["subject"], "subtitle stream 3");
    }

    #[test]
    fn accumulator_keeps_order() {
        let mut warnings = Warnings::default();
        warnings.push(Warning::ClassificationFailure {
            subject: "a".into(),
            reason: "x".into(),
        });
        warnings.push(Warning::ClassificationFailure {
            subject: "b".into(),
            reason: "y".into(),
        });
        let v = warnings.into_vec();
        assert_eq!(v.len(), 2);
        assert_matches::assert_matches!(&v[1], Warning::ClassificationFailure { subject, .. } if subject == "b");
    }
}
