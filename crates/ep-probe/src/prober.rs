//! The [`Prober`] trait defining the interface for media file probing.

use std::path::Path;

use crate::types::SourceFile;

/// A media file prober capable of producing the source model.
///
/// Implementations must be safe to share across threads (`Send + Sync`).
pub trait Prober: Send + Sync {
    /// Human-readable name identifying this prober implementation.
    fn name(&self) -> &'static str;

    /// Probe a media file at the given path.
    ///
    /// Returns [`ep_core::Error::InvalidSource`] when the file has neither an
    /// audio nor a video stream.
    fn probe(&self, path: &Path) -> ep_core::Result<SourceFile>;

    /// Check whether this prober supports the given file path.
    ///
    /// A return value of `true` does not guarantee that [`Prober::probe`]
    /// will succeed.
    fn supports(&self, path: &Path) -> bool;
}
