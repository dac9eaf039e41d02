//! Platform-specific directory matching.
//!
//! Windows filesystems are case-insensitive already. Elsewhere, build tools
//! disagree on the casing of `bin`, `Debug`/`Release` and runtime folders, so
//! each component is matched exactly first and case-insensitively second.

use std::path::{Path, PathBuf};

/// Join `components` onto `base`, returning the directory if every step exists.
pub(super) fn find_directory<'a>(
    base: &Path,
    components: impl IntoIterator<Item = &'a str>,
) -> Option<PathBuf> {
    let mut current = base.to_path_buf();
    for component in components {
        current = child_directory(&current, component)?;
    }
    Some(current)
}

#[cfg(windows)]
fn child_directory(parent: &Path, name: &str) -> Option<PathBuf> {
    let candidate = parent.join(name);
    candidate.is_dir().then_some(candidate)
}

#[cfg(not(windows))]
fn child_directory(parent: &Path, name: &str) -> Option<PathBuf> {
    let exact = parent.join(name);
    if exact.is_dir() {
        return Some(exact);
    }

    // `..` and `.` never need case folding and are not listed by read_dir
    if name == "." || name == ".." {
        return None;
    }

    let wanted = name.to_lowercase();
    std::fs::read_dir(parent)
        .ok()?
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_ok_and(|t| t.is_dir() || t.is_symlink()))
        .map(|entry| entry.path())
        .find(|path| {
            path.is_dir()
                && path
                    .file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.to_lowercase() == wanted)
        })
}
