//! Subtitle files sitting next to a source.

use std::path::{Path, PathBuf};

use ep_plan::external;
use ep_probe::ExternalSubtitle;
use tracing::debug;
use walkdir::WalkDir;

/// Find subtitle files beside `source` whose names start with its stem.
///
/// Only the source's own directory is searched. A `.sub` file with an `.idx`
/// sibling is skipped since the pair is read through the index. Results are
/// ordered by path.
pub fn external_subtitles(source: &Path) -> Vec<ExternalSubtitle> {
    let Some(stem) = source.file_stem().and_then(|s| s.to_str()) else {
        return Vec::new();
    };
    let dir = match source.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let mut found = Vec::new();
    for entry in WalkDir::new(&dir)
        .min_depth(1)
        .max_depth(1)
        .follow_links(true)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        let path = entry.path();
        if !entry.file_type().is_file() || path == source {
            continue;
        }
        if is_paired_sub(path) {
            debug!("Skipping {:?}: read through its .idx", path);
            continue;
        }
        if let Some(sub) = external::external_subtitle(stem, path) {
            debug!("Found external subtitle {:?} ({})", path, sub.language);
            found.push(sub);
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    found
}

fn is_paired_sub(path: &Path) -> bool {
    let is_sub = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("sub"));
    is_sub && path.with_extension("idx").is_file()
}
