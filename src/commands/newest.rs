//! Newest command - prints the checkpoint the next promotion would pick

use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::checkpoint::select_newest;
use crate::config::Overrides;

use super::common::load_config;

/// Execute the newest command
///
/// `dir` and `pattern` fall back to the configured working directory and
/// checkpoint pattern.
pub fn execute(
    config_path: Option<&Path>,
    overrides: &Overrides,
    dir: Option<PathBuf>,
    pattern: Option<String>,
) -> Result<()> {
    let config = load_config(config_path, overrides)?;
    let dir = dir.unwrap_or_else(|| config.work_dir_path());
    let pattern = pattern.unwrap_or(config.checkpoint_pattern);

    let newest = select_newest(&dir, &pattern)?;
    println!("{}", newest.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_newest_with_explicit_dir() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("dump1.pruebas"), "").unwrap();
        let config_path = temp.path().join("packrun.toml");
        fs::write(&config_path, "").unwrap();

        let result = execute(
            Some(&config_path),
            &Overrides::default(),
            Some(temp.path().to_path_buf()),
            None,
        );
        assert!(result.is_ok());
    }

    #[test]
    fn test_newest_fails_without_match() {
        let temp = TempDir::new().unwrap();
        let config_path = temp.path().join("packrun.toml");
        fs::write(&config_path, "").unwrap();

        let err = execute(
            Some(&config_path),
            &Overrides::default(),
            Some(temp.path().to_path_buf()),
            Some("restart*.bin".to_string()),
        )
        .unwrap_err();
        assert!(err.to_string().contains("restart*.bin"));
    }
}
