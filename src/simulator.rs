//! Blocking invocation of the simulation engine for a single stage
//!
//! Each stage runs `<launcher> <launcher args> <engine> <engine args>` with
//! the input deck on stdin. Output is inherited so the engine's own log
//! reaches the terminal unchanged.

use std::fmt;
use std::fs::File;
use std::io;
use std::path::PathBuf;
use std::process::{Child, Command, ExitStatus, Stdio};
use std::time::{Duration, Instant};
use wait_timeout::ChildExt;

use crate::config::{Config, StageSpec, WORKERS_PLACEHOLDER};
use crate::error::{PipelineError, Result};

/// Fully resolved command line for one stage
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageCommand {
    pub stage: String,
    pub program: String,
    pub args: Vec<String>,
    pub deck: PathBuf,
    pub current_dir: PathBuf,
    pub timeout: Option<Duration>,
}

/// What happened when a stage ran to completion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StageOutcome {
    pub stage: String,
    pub exit_code: Option<i32>,
    pub success: bool,
    pub duration: Duration,
}

impl StageOutcome {
    /// Outcome for a stage whose process never started
    pub fn not_started(stage: &str) -> Self {
        Self {
            stage: stage.to_string(),
            exit_code: None,
            success: false,
            duration: Duration::ZERO,
        }
    }
}

impl StageCommand {
    pub fn build(config: &Config, stage: &StageSpec) -> Result<Self> {
        let workers = config.workers.map(|w| w.to_string());
        let substitute = |arg: &String| -> Result<String> {
            if !arg.contains(WORKERS_PLACEHOLDER) {
                return Ok(arg.clone());
            }
            match &workers {
                Some(w) => Ok(arg.replace(WORKERS_PLACEHOLDER, w)),
                None => Err(PipelineError::Config(format!(
                    "argument '{arg}' needs a worker count"
                ))),
            }
        };

        let mut argv = Vec::new();
        if config.launcher.enabled {
            argv.push(config.launcher.program.clone());
            for arg in &config.launcher.args {
                argv.push(substitute(arg)?);
            }
        }
        argv.push(config.engine.program.clone());
        for arg in &config.engine.args {
            argv.push(substitute(arg)?);
        }

        let program = argv.remove(0);
        Ok(Self {
            stage: stage.name.clone(),
            program,
            args: argv,
            deck: config.resolve(&stage.deck),
            current_dir: config.run_dir.clone(),
            timeout: config.stage_timeout(),
        })
    }

    /// Run the stage and block until the process exits.
    ///
    /// A non-zero exit is reported in the outcome, not as an error; the
    /// pipeline decides whether that is fatal.
    pub fn run(&self) -> Result<StageOutcome> {
        let deck = File::open(&self.deck).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => PipelineError::DeckMissing {
                stage: self.stage.clone(),
                deck: self.deck.clone(),
            },
            _ => PipelineError::fs("open", &self.deck, e),
        })?;

        tracing::debug!(stage = %self.stage, command = %self, "spawning stage");
        let start = Instant::now();

        let mut child = Command::new(&self.program)
            .args(&self.args)
            .current_dir(&self.current_dir)
            .stdin(Stdio::from(deck))
            .stdout(Stdio::inherit())
            .stderr(Stdio::inherit())
            .spawn()
            .map_err(|source| PipelineError::Spawn {
                stage: self.stage.clone(),
                program: self.program.clone(),
                source,
            })?;

        let status = self.wait(&mut child)?;
        let duration = start.elapsed();

        Ok(StageOutcome {
            stage: self.stage.clone(),
            exit_code: status.code(),
            success: status.success(),
            duration,
        })
    }

    fn wait(&self, child: &mut Child) -> Result<ExitStatus> {
        let wait_err = |source| PipelineError::Wait {
            stage: self.stage.clone(),
            source,
        };

        let Some(timeout) = self.timeout else {
            return child.wait().map_err(wait_err);
        };

        match child.wait_timeout(timeout).map_err(wait_err)? {
            Some(status) => Ok(status),
            None => {
                tracing::warn!(stage = %self.stage, "stage exceeded timeout, killing");
                // The child may have exited between the timeout and the kill
                let _ = child.kill();
                let _ = child.wait();
                Err(PipelineError::StageTimedOut {
                    stage: self.stage.clone(),
                    timeout,
                })
            }
        }
    }
}

impl fmt::Display for StageCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.program)?;
        for arg in &self.args {
            write!(f, " {arg}")?;
        }
        write!(f, " < {}", self.deck.display())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::num::NonZeroU32;
    use tempfile::TempDir;

    fn shell_config(run_dir: &std::path::Path, script: &str) -> Config {
        let mut config = Config::default();
        config.run_dir = run_dir.to_path_buf();
        config.launcher.enabled = false;
        config.engine.program = "sh".to_string();
        config.engine.args = vec!["-c".to_string(), script.to_string()];
        config
    }

    #[test]
    fn test_build_default_command_line() {
        let mut config = Config::default();
        config.workers = NonZeroU32::new(8);

        let cmd = StageCommand::build(&config, &config.stages[0]).unwrap();
        assert_eq!(cmd.program, "mpirun");
        assert_eq!(cmd.args, ["-np", "8", "liggghts"]);
        assert_eq!(cmd.deck, PathBuf::from("./in.plantilla1"));
        assert_eq!(cmd.to_string(), "mpirun -np 8 liggghts < ./in.plantilla1");
    }

    #[test]
    fn test_build_without_workers_fails() {
        let config = Config::default();
        let err = StageCommand::build(&config, &config.stages[0]).unwrap_err();
        assert!(matches!(err, PipelineError::Config(_)));
    }

    #[test]
    fn test_build_without_launcher() {
        let mut config = Config::default();
        config.launcher.enabled = false;
        config.engine.args = vec!["-echo".to_string(), "screen".to_string()];

        let cmd = StageCommand::build(&config, &config.stages[3]).unwrap();
        assert_eq!(cmd.program, "liggghts");
        assert_eq!(cmd.args, ["-echo", "screen"]);
    }

    #[test]
    fn test_run_feeds_deck_on_stdin() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("in.plantilla1"), "approach\n").unwrap();
        let config = shell_config(temp.path(), "cat > seen.txt");

        let cmd = StageCommand::build(&config, &config.stages[0]).unwrap();
        let outcome = cmd.run().unwrap();

        assert!(outcome.success);
        assert_eq!(outcome.exit_code, Some(0));
        assert_eq!(
            fs::read_to_string(temp.path().join("seen.txt")).unwrap(),
            "approach\n"
        );
    }

    #[test]
    fn test_run_reports_nonzero_exit() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("in.plantilla1"), "").unwrap();
        let config = shell_config(temp.path(), "exit 3");

        let cmd = StageCommand::build(&config, &config.stages[0]).unwrap();
        let outcome = cmd.run().unwrap();

        assert!(!outcome.success);
        assert_eq!(outcome.exit_code, Some(3));
    }

    #[test]
    fn test_run_missing_deck() {
        let temp = TempDir::new().unwrap();
        let config = shell_config(temp.path(), "true");

        let cmd = StageCommand::build(&config, &config.stages[0]).unwrap();
        let err = cmd.run().unwrap_err();
        assert!(matches!(err, PipelineError::DeckMissing { .. }));
    }

    #[test]
    fn test_run_missing_program() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("in.plantilla1"), "").unwrap();
        let mut config = shell_config(temp.path(), "true");
        config.engine.program = "packrun-no-such-engine".to_string();

        let cmd = StageCommand::build(&config, &config.stages[0]).unwrap();
        let err = cmd.run().unwrap_err();
        assert!(matches!(err, PipelineError::Spawn { .. }));
    }

    #[test]
    fn test_run_kills_on_timeout() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("in.plantilla1"), "").unwrap();
        let mut config = shell_config(temp.path(), "sleep 5");
        config.stage_timeout_secs = Some(1);

        let cmd = StageCommand::build(&config, &config.stages[0]).unwrap();
        let start = Instant::now();
        let err = cmd.run().unwrap_err();

        assert!(matches!(err, PipelineError::StageTimedOut { .. }));
        assert!(start.elapsed() < Duration::from_secs(4));
    }
}
