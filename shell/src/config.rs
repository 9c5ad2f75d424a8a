use anyhow::{Context, Result, bail};
use argh::FromArgs;
use log::LevelFilter;
use simplelog::{ColorChoice, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::PathBuf;

/// Prompt shown before every top-level read.
pub const PROMPT: &str = "FCIT> ";

/// Prompt shown while an `if` block is being collected.
pub const CONTINUATION_PROMPT: &str = "> ";

/// Printed when input reaches end-of-file.
pub const FAREWELL: &str = "Shell exited.";

pub const DEFAULT_MAX_STAGES: usize = 16;
pub const DEFAULT_MAX_ARGS: usize = 63;
pub const DEFAULT_MAX_JOBS: usize = 128;

/// Upper bounds enforced by the parser and the job table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Limits {
    /// Maximum number of commands in one pipeline.
    pub max_stages: usize,
    /// Maximum number of argument vector entries in one command, program name included.
    pub max_args: usize,
    /// Maximum number of tracked background jobs.
    pub max_jobs: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_stages: DEFAULT_MAX_STAGES,
            max_args: DEFAULT_MAX_ARGS,
            max_jobs: DEFAULT_MAX_JOBS,
        }
    }
}

#[derive(FromArgs, Debug)]
/// A small interactive shell with pipelines, redirection, background jobs and if-blocks.
pub struct Args {
    #[argh(option, default = "LevelFilter::Warn")]
    /// diagnostics log level: off, error, warn, info, debug or trace.
    pub log_level: LevelFilter,

    #[argh(option)]
    /// write the diagnostics log to this file instead of stderr.
    pub log_file: Option<PathBuf>,

    #[argh(option, default = "DEFAULT_MAX_STAGES")]
    /// maximum number of commands in a pipeline.
    pub max_stages: usize,

    #[argh(option, default = "DEFAULT_MAX_ARGS")]
    /// maximum number of words in a single command.
    pub max_args: usize,

    #[argh(option, default = "DEFAULT_MAX_JOBS")]
    /// maximum number of tracked background jobs.
    pub max_jobs: usize,
}

/// Session configuration assembled from command-line flags.
#[derive(Debug, Clone)]
pub struct ShellConfig {
    pub limits: Limits,
    pub log_level: LevelFilter,
    pub log_file: Option<PathBuf>,
}

impl Default for ShellConfig {
    fn default() -> Self {
        Self {
            limits: Limits::default(),
            log_level: LevelFilter::Warn,
            log_file: None,
        }
    }
}

impl ShellConfig {
    /// Validate flags and build the configuration.
    pub fn from_args(args: Args) -> Result<Self> {
        let limits = Limits {
            max_stages: args.max_stages,
            max_args: args.max_args,
            max_jobs: args.max_jobs,
        };
        if limits.max_stages == 0 {
            bail!("--max-stages must be at least 1");
        }
        if limits.max_args == 0 {
            bail!("--max-args must be at least 1");
        }
        if limits.max_jobs == 0 {
            bail!("--max-jobs must be at least 1");
        }
        Ok(Self {
            limits,
            log_level: args.log_level,
            log_file: args.log_file,
        })
    }

    /// Install the global logger. Must be called at most once per process.
    pub fn init_logging(&self) -> Result<()> {
        let log_config = simplelog::Config::default();
        match &self.log_file {
            Some(path) => {
                let file = File::create(path)
                    .with_context(|| format!("can't create log file {}", path.display()))?;
                WriteLogger::init(self.log_level, log_config, file)
                    .context("logger already initialised")?;
            }
            None => {
                TermLogger::init(
                    self.log_level,
                    log_config,
                    TerminalMode::Stderr,
                    ColorChoice::Auto,
                )
                .context("logger already initialised")?;
            }
        }
        Ok(())
    }
}
