use std::path::Path;

/// Returns `true` if a bundle directory is present at `path`.
///
/// Presence alone is the hit signal: contents are not hashed or checked for
/// completeness.
pub(crate) fn exists(path: &Path) -> bool {
    path.is_dir()
}
