//! Checkpoint selection and promotion
//!
//! The engine drops checkpoint files into the working directory. Between
//! stages the newest one is moved to a top-level path so later tooling can
//! pick it up under a stable name.

use glob::{MatchOptions, Pattern};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use crate::error::{PipelineError, Result};

/// Pick the candidate with the latest timestamp.
///
/// Ties go to the lexicographically greatest path so the choice does not
/// depend on directory enumeration order.
pub fn newest_of<I>(candidates: I) -> Option<PathBuf>
where
    I: IntoIterator<Item = (PathBuf, SystemTime)>,
{
    candidates
        .into_iter()
        .max_by(|(a_path, a_time), (b_path, b_time)| {
            a_time.cmp(b_time).then_with(|| a_path.cmp(b_path))
        })
        .map(|(path, _)| path)
}

/// List regular files in `dir` whose file name matches `pattern`, with their
/// modification times.
pub fn list_checkpoints(dir: &Path, pattern: &str) -> Result<Vec<(PathBuf, SystemTime)>> {
    let escaped_dir = Pattern::escape(&dir.to_string_lossy());
    let full_pattern = Path::new(&escaped_dir).join(pattern);
    let full_pattern = full_pattern.to_string_lossy();

    let options = MatchOptions {
        case_sensitive: true,
        require_literal_separator: true,
        require_literal_leading_dot: false,
    };

    let paths = glob::glob_with(&full_pattern, options).map_err(|e| {
        PipelineError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: e.to_string(),
        }
    })?;

    let mut found = Vec::new();
    for entry in paths {
        let path = match entry {
            Ok(path) => path,
            Err(e) => {
                tracing::debug!(error = %e, "skipping unreadable glob entry");
                continue;
            }
        };

        // Dangling symlinks and files removed since the glob ran are not candidates
        let metadata = match fs::metadata(&path) {
            Ok(metadata) => metadata,
            Err(e) => {
                tracing::debug!(path = %path.display(), error = %e, "skipping vanished entry");
                continue;
            }
        };
        if !metadata.is_file() {
            continue;
        }

        let modified = metadata
            .modified()
            .map_err(|e| PipelineError::fs("read timestamp of", &path, e))?;
        found.push((path, modified));
    }

    Ok(found)
}

/// Select the newest checkpoint in `dir`, failing when nothing matches.
pub fn select_newest(dir: &Path, pattern: &str) -> Result<PathBuf> {
    let candidates = list_checkpoints(dir, pattern)?;
    tracing::debug!(
        dir = %dir.display(),
        pattern,
        count = candidates.len(),
        "checkpoint candidates"
    );

    newest_of(candidates).ok_or_else(|| PipelineError::NoCheckpointFound {
        dir: dir.to_path_buf(),
        pattern: pattern.to_string(),
    })
}

/// Move `source` to `target`, replacing any existing file at `target`.
///
/// Falls back to copy-and-remove when a plain rename is refused, e.g. when
/// the two paths live on different filesystems.
pub fn promote(source: &Path, target: &Path) -> Result<()> {
    match fs::rename(source, target) {
        Ok(()) => Ok(()),
        Err(rename_err) => {
            if !source.is_file() {
                return Err(PipelineError::fs("move", source, rename_err));
            }
            tracing::debug!(
                error = %rename_err,
                "rename failed, copying {} instead",
                source.display()
            );
            copy_then_remove(source, target)
        }
    }
}

fn copy_then_remove(source: &Path, target: &Path) -> Result<()> {
    fs::copy(source, target).map_err(|e| PipelineError::fs("copy", target, e))?;
    fs::remove_file(source).map_err(|e| PipelineError::fs("remove", source, e))
}

/// Select the newest checkpoint and move it to `target`. Returns the
/// original location of the promoted file.
pub fn promote_newest(dir: &Path, pattern: &str, target: &Path) -> Result<PathBuf> {
    let newest = select_newest(dir, pattern)?;
    promote(&newest, target)?;
    Ok(newest)
}
