//! Unified error type for encodeplan.
//!
//! Fatal conditions funnel into [`Error`]. Recoverable conditions raised while
//! compiling a plan are not errors; they travel alongside the plan as
//! warnings (see `ep_plan::Warning`).

use crate::media::StreamKind;

/// Unified error type covering all fatal failure modes.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The source cannot be planned at all (unreadable, or it has neither an
    /// audio nor a video stream).
    #[error("Invalid source: {0}")]
    InvalidSource(String),

    /// After filtering, no stream of a mandatory kind survived.
    #[error("No eligible {kind} streams")]
    NoEligibleStreams {
        /// The mandatory stream kind that ended up empty.
        kind: StreamKind,
    },

    /// Media probing failed.
    #[error("Probe error: {0}")]
    Probe(String),

    /// Policy or input data failed validation.
    #[error("Validation error: {0}")]
    Validation(String),

    /// An external tool (ffprobe, etc.) returned an error.
    #[error("Tool error [{tool}]: {message}")]
    Tool {
        /// Name of the tool that failed.
        tool: String,
        /// Human-readable error description.
        message: String,
    },

    /// An I/O operation failed.
    #[error("IO error: {source}")]
    Io {
        /// The underlying I/O error.
        #[from]
        source: std::io::Error,
    },

    /// Catch-all for unexpected internal errors.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Convenience constructor for [`Error::Tool`].
    pub fn tool(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Error::Tool {
            tool: tool.into(),
            message: message.into(),
        }
    }

    /// Convenience constructor for [`Error::NoEligibleStreams`].
    pub fn no_eligible(kind: StreamKind) -> Self {
        Error::NoEligibleStreams { kind }
    }

    /// Whether the caller should treat the source as unusable rather than
    /// the policy as wrong.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidSource(_) | Error::Probe(_) | Error::NoEligibleStreams { .. }
        )
    }
}

/// Result alias using the crate-level [`Error`].
pub type Result<T> = std::result::Result<T, Error>;
