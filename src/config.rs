//! Run configuration
//!
//! Defaults reproduce the classic four-stage LIGGGHTS packing run:
//! `mpirun -np <workers> liggghts < in.plantillaN`, checkpoints in `post/`,
//! promotions to `dump1` and `dump2`. The worker count is never defaulted.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fs;
use std::num::NonZeroU32;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::PipelineError;

/// Config file looked up in the current directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "packrun.toml";

/// Placeholder substituted with the worker count in launcher/engine args
pub const WORKERS_PLACEHOLDER: &str = "{workers}";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub run_dir: PathBuf,
    pub work_dir: PathBuf,
    pub work_dir_mode: u32,
    pub checkpoint_pattern: String,
    pub launcher: LauncherSpec,
    pub engine: EngineSpec,
    pub workers: Option<NonZeroU32>,
    pub fail_fast: bool,
    pub stage_timeout_secs: Option<u64>,
    pub stages: Vec<StageSpec>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LauncherSpec {
    pub enabled: bool,
    pub program: String,
    pub args: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineSpec {
    pub program: String,
    pub args: Vec<String>,
}

/// One simulator invocation in the pipeline
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StageSpec {
    pub name: String,
    /// Input deck fed to the engine on stdin
    pub deck: PathBuf,
    /// Top-level path the newest checkpoint is moved to once this stage exits
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub promote_to: Option<PathBuf>,
}

impl StageSpec {
    pub fn new(name: &str, deck: &str, promote_to: Option<&str>) -> Self {
        Self {
            name: name.to_string(),
            deck: PathBuf::from(deck),
            promote_to: promote_to.map(PathBuf::from),
        }
    }
}

impl Default for LauncherSpec {
    fn default() -> Self {
        Self {
            enabled: true,
            program: "mpirun".to_string(),
            args: vec!["-np".to_string(), WORKERS_PLACEHOLDER.to_string()],
        }
    }
}

impl Default for EngineSpec {
    fn default() -> Self {
        Self {
            program: "liggghts".to_string(),
            args: Vec::new(),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            run_dir: PathBuf::from("."),
            work_dir: PathBuf::from("post"),
            work_dir_mode: 0o777,
            checkpoint_pattern: "dump*.pruebas".to_string(),
            launcher: LauncherSpec::default(),
            engine: EngineSpec::default(),
            workers: None,
            fail_fast: false,
            stage_timeout_secs: None,
            stages: vec![
                StageSpec::new("approach", "in.plantilla1", None),
                StageSpec::new("compress", "in.plantilla2", None),
                StageSpec::new("relax", "in.plantilla3", Some("dump1")),
                StageSpec::new("release", "in.plantilla4", Some("dump2")),
            ],
        }
    }
}

/// Command-line values that take precedence over the config file
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub workers: Option<NonZeroU32>,
    pub fail_fast: bool,
    pub run_dir: Option<PathBuf>,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_toml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        Ok(config)
    }

    /// Load `explicit` if given, else `<search_dir>/packrun.toml` if present,
    /// else the built-in defaults.
    pub fn load_or_default(explicit: Option<&Path>, search_dir: &Path) -> Result<Self> {
        if let Some(path) = explicit {
            return Self::load(path);
        }

        let candidate = search_dir.join(DEFAULT_CONFIG_FILE);
        if candidate.is_file() {
            tracing::debug!(path = %candidate.display(), "using discovered config file");
            return Self::load(&candidate);
        }

        tracing::debug!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn apply(mut self, overrides: &Overrides) -> Self {
        if let Some(workers) = overrides.workers {
            self.workers = Some(workers);
        }
        if overrides.fail_fast {
            self.fail_fast = true;
        }
        if let Some(run_dir) = &overrides.run_dir {
            self.run_dir = run_dir.clone();
        }
        self
    }

    pub fn validate(&self) -> crate::error::Result<()> {
        if self.stages.is_empty() {
            return Err(PipelineError::Config("no stages configured".to_string()));
        }

        let mut names = HashSet::new();
        let mut targets = HashSet::new();
        for stage in &self.stages {
            if stage.name.trim().is_empty() {
                return Err(PipelineError::Config("stage name must not be empty".to_string()));
            }
            if !names.insert(stage.name.as_str()) {
                return Err(PipelineError::Config(format!(
                    "duplicate stage name '{}'",
                    stage.name
                )));
            }
            if stage.deck.as_os_str().is_empty() {
                return Err(PipelineError::Config(format!(
                    "stage '{}' has no input deck",
                    stage.name
                )));
            }
            if let Some(target) = &stage.promote_to {
                if !targets.insert(target) {
                    return Err(PipelineError::Config(format!(
                        "promotion target '{}' is used by more than one stage",
                        target.display()
                    )));
                }
            }
        }

        if self.engine.program.trim().is_empty() {
            return Err(PipelineError::Config("engine program must be set".to_string()));
        }
        if self.launcher.enabled && self.launcher.program.trim().is_empty() {
            return Err(PipelineError::Config(
                "launcher is enabled but has no program".to_string(),
            ));
        }

        if self.needs_workers() && self.workers.is_none() {
            return Err(PipelineError::Config(
                "worker count is required (set `workers` in packrun.toml or pass --workers)"
                    .to_string(),
            ));
        }

        if self.checkpoint_pattern.contains('/') || self.checkpoint_pattern.contains('\\') {
            return Err(PipelineError::InvalidPattern {
                pattern: self.checkpoint_pattern.clone(),
                reason: "must match file names only, not paths".to_string(),
            });
        }
        glob::Pattern::new(&self.checkpoint_pattern).map_err(|e| {
            PipelineError::InvalidPattern {
                pattern: self.checkpoint_pattern.clone(),
                reason: e.to_string(),
            }
        })?;

        Ok(())
    }

    /// True when any active argument refers to `{workers}`
    pub fn needs_workers(&self) -> bool {
        let launcher_args: &[String] = if self.launcher.enabled {
            &self.launcher.args
        } else {
            &[]
        };
        launcher_args
            .iter()
            .chain(self.engine.args.iter())
            .any(|arg| arg.contains(WORKERS_PLACEHOLDER))
    }

    pub fn resolve(&self, path: &Path) -> PathBuf {
        self.run_dir.join(path)
    }

    pub fn work_dir_path(&self) -> PathBuf {
        self.resolve(&self.work_dir)
    }

    pub fn stage_timeout(&self) -> Option<Duration> {
        self.stage_timeout_secs.map(Duration::from_secs)
    }

    /// Commented config file written by `packrun init`
    pub fn template() -> &'static str {
        TEMPLATE
    }
}

const TEMPLATE: &str = r#"# packrun configuration
#
# Every relative path is resolved against run_dir, which is also the
# working directory of each simulator process.

run_dir = "."
work_dir = "post"
work_dir_mode = 0o777
checkpoint_pattern = "dump*.pruebas"

# Number of simulation workers handed to the launcher. Required while any
# argument below contains {workers}.
# workers = 8

# Abort the remaining stages when the engine exits non-zero.
fail_fast = false

# Kill a stage that runs longer than this many seconds.
# stage_timeout_secs = 86400

[launcher]
enabled = true
program = "mpirun"
args = ["-np", "{workers}"]

[engine]
program = "liggghts"
args = []

[[stages]]
name = "approach"
deck = "in.plantilla1"

[[stages]]
name = "compress"
deck = "in.plantilla2"

[[stages]]
name = "relax"
deck = "in.plantilla3"
promote_to = "dump1"

[[stages]]
name = "release"
deck = "in.plantilla4"
promote_to = "dump2"
"#;
