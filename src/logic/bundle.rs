//! Project bundles laid out as a directory tree on disk.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use log::debug;

use crate::model::{FileContent, ProjectBundle};

/// Read every file below `dir`; the bundle is named after the directory.
pub async fn read_bundle_dir(dir: &Path) -> Result<ProjectBundle> {
    let name = dir
        .file_name()
        .and_then(|name| name.to_str())
        .with_context(|| format!("Cannot derive a project name from {}", dir.display()))?;
    let mut bundle = ProjectBundle::new(name);

    let mut pending: Vec<PathBuf> = vec![dir.to_path_buf()];
    while let Some(current) = pending.pop() {
        let mut entries = tokio::fs::read_dir(&current)
            .await
            .with_context(|| format!("Failed to read directory {}", current.display()))?;
        while let Some(entry) = entries.next_entry().await? {
            let path = entry.path();
            if entry.file_type().await?.is_dir() {
                pending.push(path);
                continue;
            }
            let relative = path
                .strip_prefix(dir)?
                .components()
                .map(|component| component.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");
            let bytes = tokio::fs::read(&path)
                .await
                .with_context(|| format!("Failed to read {}", path.display()))?;
            debug!("Read bundle file {}", relative);
            bundle.files.push(FileContent::from_path(relative, bytes));
        }
    }

    bundle.files.sort_by(|a, b| a.filename.cmp(&b.filename));
    Ok(bundle)
}

/// Write the bundle files below `dir/<bundle name>`; returns that directory.
pub async fn write_bundle_dir(bundle: &ProjectBundle, dir: &Path) -> Result<PathBuf> {
    let root = dir.join(&bundle.name);
    for file in &bundle.files {
        let relative = Path::new(&file.filename);
        if relative.is_absolute() || relative.components().any(|c| matches!(c, std::path::Component::ParentDir)) {
            bail!("Refusing to write {} outside of {}", file.filename, root.display());
        }
        let path = root.join(relative);
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
        tokio::fs::write(&path, &file.bytes)
            .await
            .with_context(|| format!("Failed to write {}", path.display()))?;
    }
    Ok(root)
}
