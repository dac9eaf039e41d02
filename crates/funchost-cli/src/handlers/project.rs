//! Project path resolution handler.

use std::path::Path;

use anyhow::Result;
use funchost_core::{resolve_project_path, resolve_project_path_from};

pub fn execute(project: &str, runtime: &str, from: Option<&Path>) -> Result<()> {
    let path = match from {
        Some(root) => resolve_project_path_from(root, project, runtime)?,
        None => resolve_project_path(project, runtime)?,
    };
    println!("{}", path.display());
    Ok(())
}
