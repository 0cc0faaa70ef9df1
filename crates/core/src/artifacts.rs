//! Build artifact discovery.
//!
//! After a successful compile the output tree (`bin/` under the checkout) is
//! scanned recursively for firmware images, identified by file extension.

use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::format::format_file_size;
use crate::types::Timestamp;

/// Directory (relative to the checkout) that holds build output.
pub const OUTPUT_DIR: &str = "bin";

/// Lowercase file-name suffixes recognised as artifacts.
pub const ARTIFACT_EXTENSIONS: &[&str] = &[".bin", ".img", ".img.gz", ".tar.gz", ".zip"];

/// One produced artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Artifact {
    pub name: String,
    /// Path relative to the checkout root, `/`-separated.
    pub path: String,
    pub size: u64,
    pub size_display: String,
    pub modified: Option<Timestamp>,
}

/// `true` when `file_name` ends with a known artifact extension.
pub fn is_artifact(file_name: &str) -> bool {
    let lower = file_name.to_lowercase();
    ARTIFACT_EXTENSIONS.iter().any(|ext| lower.ends_with(ext))
}

/// Scan `<checkout>/bin` recursively and return every artifact sorted by
/// relative path. A missing output directory yields an empty list.
pub fn scan_artifacts(checkout: &Path) -> io::Result<Vec<Artifact>> {
    let root = checkout.join(OUTPUT_DIR);
    if !root.is_dir() {
        return Ok(Vec::new());
    }

    let mut found = Vec::new();
    let mut pending: Vec<PathBuf> = vec![root];

    while let Some(dir) = pending.pop() {
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let path = entry.path();

            if file_type.is_dir() {
                pending.push(path);
                continue;
            }
            if !file_type.is_file() {
                continue;
            }

            let name = entry.file_name().to_string_lossy().into_owned();
            if !is_artifact(&name) {
                continue;
            }

            let metadata = entry.metadata()?;
            let relative = path
                .strip_prefix(checkout)
                .unwrap_or(&path)
                .components()
                .map(|c| c.as_os_str().to_string_lossy())
                .collect::<Vec<_>>()
                .join("/");

            found.push(Artifact {
                name,
                path: relative,
                size: metadata.len(),
                size_display: format_file_size(metadata.len()),
                modified: metadata.modified().ok().map(Timestamp::from),
            });
        }
    }

    found.sort_by(|a, b| a.path.cmp(&b.path));
    Ok(found)
}
