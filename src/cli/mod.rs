//! Command-line interface for tplcache.
//!
//! # Commands
//!
//! - `precompile <release.yml>` - store job sources, register templates and packages
//! - `compile <job.yml> <instance.yml>` - render, upload and record an instance's templates
//! - `find-packages <template>` - runtime packages resolved for a template's job
//! - `find-rendered <job.yml> <instance.yml>` - recorded archive for a job and instance
//!
//! # Global Options
//!
//! - `--verbose` - debug logging
//! - `--quiet` - errors only
//! - `--config <PATH>` - configuration file (see [`crate::config`])
//!
//! `RUST_LOG` takes precedence over both verbosity flags. Logs go to stderr so
//! command output on stdout stays machine-readable.
//!
//! ```bash
//! tplcache precompile release.yml
//! tplcache compile router-job.yml router-0.yml --format json
//! tplcache --verbose find-packages router_conf
//! ```

mod common;
mod compile;
mod find;
mod precompile;

pub use common::OutputFormat;
pub use compile::CompileCommand;
pub use find::{FindPackagesCommand, FindRenderedCommand};
pub use precompile::PrecompileCommand;

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use crate::config::CompilerConfig;

#[derive(Parser, Debug)]
#[command(
    name = "tplcache",
    about = "Content-addressable template compilation cache",
    version,
    long_about = "tplcache stores release job sources once, memoizes each job's runtime \
                  packages and records rendered, instance-specific template archives."
)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable debug logging
    #[arg(short, long, global = true, conflicts_with = "quiet")]
    verbose: bool,

    /// Only log errors
    #[arg(short, long, global = true)]
    quiet: bool,

    /// Path to the configuration file
    ///
    /// Falls back to `TPLCACHE_CONFIG`, then `./tplcache.toml`.
    #[arg(short, long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Store job sources and register a release's templates and packages
    Precompile(PrecompileCommand),

    /// Render a deployment job for an instance and record the archive
    Compile(CompileCommand),

    /// Show runtime packages resolved for a template
    FindPackages(FindPackagesCommand),

    /// Show the recorded rendered archive for a deployment job and instance
    FindRendered(FindRenderedCommand),
}

impl Cli {
    pub async fn execute(self) -> Result<()> {
        self.init_logging();

        let config = CompilerConfig::load(self.config.clone()).await?;
        tracing::debug!("State directory: {}", config.state_dir.display());
        let compiler = config.build_compiler();

        match self.command {
            Commands::Precompile(cmd) => cmd.execute(&compiler).await,
            Commands::Compile(cmd) => cmd.execute(&compiler).await,
            Commands::FindPackages(cmd) => cmd.execute(&compiler).await,
            Commands::FindRendered(cmd) => cmd.execute(&compiler).await,
        }
    }

    /// Filter directive implied by the verbosity flags.
    fn log_level(&self) -> &'static str {
        if self.verbose {
            "debug"
        } else if self.quiet {
            "error"
        } else {
            "info"
        }
    }

    fn init_logging(&self) {
        let filter = if std::env::var("RUST_LOG").is_ok() {
            EnvFilter::from_default_env()
        } else {
            EnvFilter::new(format!("tplcache={}", self.log_level()))
        };

        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .with_target(false)
            .try_init();
    }
}

#[cfg(test)]
mod tests;
