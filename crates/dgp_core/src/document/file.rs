//! Project document file I/O.

use crate::controller::ProjectTree;
use crate::document::{load, save, SerializationError, SerializationResult};
use log::{debug, info};
use serde_json::Value;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// Default project document file name.
pub const PROJECT_DOCUMENT_NAME: &str = "dgp.json";

/// Writes the document atomically into `dir` (temporary file + rename).
///
/// Returns the final document path.
pub fn save_to_dir(
    tree: &ProjectTree,
    dir: &Path,
    file_name: &str,
) -> SerializationResult<PathBuf> {
    let started_at = Instant::now();
    let bytes = save(tree)?;
    fs::create_dir_all(dir)?;
    let target = dir.join(file_name);
    let staging = dir.join(format!(".{file_name}.tmp"));

    let written = write_synced(&staging, &bytes).and_then(|()| fs::rename(&staging, &target));
    if let Err(err) = written {
        let _ = fs::remove_file(&staging);
        return Err(err.into());
    }

    info!(
        "event=document_save module=document status=ok path={} bytes={} duration_ms={}",
        target.display(),
        bytes.len(),
        started_at.elapsed().as_millis()
    );
    Ok(target)
}

fn write_synced(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let mut file = fs::File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()
}

/// Finds the project document for `path`.
///
/// `path` may be the project directory or any file inside it. The preferred
/// file name wins; otherwise the first `*.json` file (by name) whose root
/// node is a Project is returned.
pub fn locate_project_document(path: &Path, preferred_name: &str) -> Option<PathBuf> {
    let dir = if path.is_dir() { path } else { path.parent()? };
    let preferred = dir.join(preferred_name);
    if preferred.is_file() {
        return Some(preferred);
    }

    let mut candidates: Vec<PathBuf> = fs::read_dir(dir)
        .ok()?
        .filter_map(Result::ok)
        .map(|entry| entry.path())
        .filter(|candidate| {
            candidate.is_file()
                && candidate
                    .extension()
                    .is_some_and(|extension| extension == "json")
        })
        .collect();
    candidates.sort();
    candidates.into_iter().find(|candidate| {
        let is_project = looks_like_project_document(candidate);
        debug!(
            "event=document_locate module=document path={} project={}",
            candidate.display(),
            is_project
        );
        is_project
    })
}

fn looks_like_project_document(path: &Path) -> bool {
    let Ok(bytes) = fs::read(path) else {
        return false;
    };
    let Ok(document) = serde_json::from_slice::<Value>(&bytes) else {
        return false;
    };
    document.get("schema_version").is_some() && document["root"]["_type"] == "Project"
}

/// Locates and loads the project document under `path`.
///
/// The project path is rebased onto the directory the document was found in,
/// so a moved project directory keeps working.
pub fn load_from_dir(
    path: &Path,
    preferred_name: &str,
) -> SerializationResult<(PathBuf, ProjectTree)> {
    let document = locate_project_document(path, preferred_name)
        .ok_or_else(|| SerializationError::DocumentNotFound(path.to_path_buf()))?;
    let bytes = fs::read(&document)?;
    let mut tree = load(&bytes)?;

    if let Some(dir) = document.parent() {
        if tree.project().path() != dir {
            tree.project_mut().set_path(dir)?;
        }
    }
    Ok((document, tree))
}
