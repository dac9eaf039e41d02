//! Project build-output directory resolution.
//!
//! Test assemblies run from somewhere below a common source root, and the
//! functions project being hosted sits elsewhere below that same root. We
//! walk up from the search root until `<fragment>/bin/<config>/<runtime>`
//! exists beneath an ancestor.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::debug;

use super::platform::find_directory;
use crate::errors::{FunctionsError, FunctionsResult};

/// Build configuration encoded in the build-output path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildConfiguration {
    Debug,
    Release,
}

impl BuildConfiguration {
    /// `Debug` if the path mentions "debug" in any casing, else `Release`.
    pub fn infer_from(path: &Path) -> Self {
        if path.to_string_lossy().to_lowercase().contains("debug") {
            Self::Debug
        } else {
            Self::Release
        }
    }

    /// Folder name as written by the build tools on case-insensitive systems.
    pub const fn folder_name(self) -> &'static str {
        match self {
            Self::Debug => "debug",
            Self::Release => "release",
        }
    }
}

impl fmt::Display for BuildConfiguration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.folder_name())
    }
}

/// Resolve a project's build-output directory starting from the current directory.
pub fn resolve_project_path(fragment: &str, runtime: &str) -> FunctionsResult<PathBuf> {
    let current = std::env::current_dir()?;
    resolve_project_path_from(&current, fragment, runtime)
}

/// Resolve a project's build-output directory starting from `search_root`.
///
/// The build configuration is inferred from `search_root`. The search root
/// itself is never a match (it is the directory the tests run in); the walk
/// starts at its parent and ends at the filesystem root.
pub fn resolve_project_path_from(
    search_root: &Path,
    fragment: &str,
    runtime: &str,
) -> FunctionsResult<PathBuf> {
    let search_root = if search_root.is_absolute() {
        search_root.to_path_buf()
    } else {
        std::env::current_dir()?.join(search_root)
    };

    let configuration = BuildConfiguration::infer_from(&search_root);
    let mut components: Vec<&str> = fragment
        .split(['/', '\\'])
        .filter(|c| !c.is_empty())
        .collect();
    components.extend(["bin", configuration.folder_name(), runtime]);

    debug!(
        search_root = %search_root.display(),
        %configuration,
        "Resolving function project build output"
    );

    let mut candidate = search_root.parent();
    while let Some(dir) = candidate {
        if let Some(found) = find_directory(dir, components.iter().copied()) {
            debug!(root = %dir.display(), path = %found.display(), "Resolved project path");
            return Ok(found);
        }
        candidate = dir.parent();
    }

    Err(FunctionsError::ProjectPathNotFound {
        fragment: fragment.to_string(),
        extension: Path::new("bin").join(configuration.folder_name()).join(runtime),
        searched_from: search_root,
    })
}
