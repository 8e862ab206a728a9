use anyhow::Result;
use clap::{Args, Parser, Subcommand};
use packrun::commands::{check, init, newest, plan, run};
use packrun::config::Overrides;
use packrun::logging::{self, Verbosity};
use std::num::NonZeroU32;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "packrun")]
#[command(about = "Multi-stage particle-packing orchestration for LIGGGHTS", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    /// Show debug logging on stderr
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run every stage in order (default when no command is given)
    Run(RunArgs),

    /// Print the steps a run would take without executing them
    Plan(RunArgs),

    /// Check that the engine, launcher and decks are in place
    Check(RunArgs),

    /// Print the newest checkpoint in the working directory
    Newest {
        #[command(flatten)]
        run: RunArgs,

        /// Directory to search (default: configured working directory)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Checkpoint file pattern (default: configured pattern)
        #[arg(long)]
        pattern: Option<String>,
    },

    /// Write a commented packrun.toml in the current directory
    Init {
        /// Overwrite an existing packrun.toml
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(Args, Default)]
struct RunArgs {
    /// Config file (default: ./packrun.toml if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Number of simulation workers passed to the launcher
    #[arg(short = 'n', long)]
    workers: Option<NonZeroU32>,

    /// Abort when a stage exits non-zero instead of continuing
    #[arg(long)]
    fail_fast: bool,

    /// Directory the stages run in (default: current directory)
    #[arg(long)]
    run_dir: Option<PathBuf>,
}

impl RunArgs {
    fn overrides(&self) -> Overrides {
        Overrides {
            workers: self.workers,
            fail_fast: self.fail_fast,
            run_dir: self.run_dir.clone(),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(Verbosity::from_flags(cli.verbose, cli.quiet));

    match cli.command.unwrap_or(Commands::Run(RunArgs::default())) {
        Commands::Run(args) => run::execute(args.config.as_deref(), &args.overrides()),
        Commands::Plan(args) => plan::execute(args.config.as_deref(), &args.overrides()),
        Commands::Check(args) => check::execute(args.config.as_deref(), &args.overrides()),
        Commands::Newest { run, dir, pattern } => {
            newest::execute(run.config.as_deref(), &run.overrides(), dir, pattern)
        }
        Commands::Init { force } => init::execute(force),
    }
}
