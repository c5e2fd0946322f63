//! Command line interface definition

use clap::{Args, Parser, Subcommand};
use kiln_types::ColorChoice;
use std::ffi::OsString;
use std::path::PathBuf;

/// kiln - build and install software from formula descriptors
#[derive(Parser)]
#[command(name = "kiln")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Build and install software from formula descriptors")]
#[command(long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    #[command(flatten)]
    pub global: GlobalArgs,
}

/// Global arguments available for all commands
#[derive(Parser)]
pub struct GlobalArgs {
    /// Output in JSON format
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable debug logging to the logs directory
    #[arg(long, global = true)]
    pub debug: bool,

    /// Color output control
    #[arg(long, global = true, value_enum)]
    pub color: Option<ColorChoice>,

    /// Use alternate config file
    #[arg(long, global = true, value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Formula argument plus option switches
#[derive(Args, Debug, Clone)]
pub struct BuildArgs {
    /// Formula name or path to a formula file
    pub formula: String,

    /// Option switches, filled in by `Cli::parse_with_switches`
    #[arg(skip)]
    pub switches: Vec<String>,
}

/// Available commands
#[derive(Subcommand)]
pub enum Commands {
    /// Build and install a formula
    #[command(alias = "i")]
    Install {
        /// Use a pre-staged source tree instead of downloading
        #[arg(long, value_name = "DIR")]
        source_dir: Option<PathBuf>,

        /// Keep the work directory after the run
        #[arg(long)]
        keep_work_dir: bool,

        /// Parallel jobs for build steps (0 = auto)
        #[arg(short, long)]
        jobs: Option<usize>,

        #[command(flatten)]
        build: BuildArgs,
    },

    /// Print the invocation plan without running anything
    Plan {
        #[command(flatten)]
        build: BuildArgs,
    },

    /// List declared and implied options
    Options {
        /// Formula name or path to a formula file
        formula: String,
    },

    /// Show formula metadata and dependencies
    Info {
        /// Formula name or path to a formula file
        formula: String,
    },
}

impl Cli {
    /// Parse the command line, taking `--with-X`, `--without-X` and
    /// `--HEAD` out before clap sees it
    ///
    /// Formula options are not known to clap, so they can appear anywhere
    /// after the command alongside the regular flags.
    pub fn parse_with_switches<I, T>(args: I) -> Self
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString>,
    {
        let args: Vec<OsString> = args.into_iter().map(Into::into).collect();
        let (switches, rest): (Vec<_>, Vec<_>) = args
            .iter()
            .cloned()
            .enumerate()
            .partition(|(i, arg)| *i > 0 && is_switch(arg));

        let mut cli = Self::parse_from(rest.into_iter().map(|(_, arg)| arg));
        if switches.is_empty() {
            return cli;
        }
        let Some(build) = cli.command.build_args_mut() else {
            // let clap report the stray switches
            return Self::parse_from(args);
        };
        build.switches = switches
            .into_iter()
            .map(|(_, arg)| arg.to_string_lossy().into_owned())
            .collect();
        cli
    }
}

fn is_switch(arg: &OsString) -> bool {
    arg.to_str().is_some_and(|arg| {
        arg == "--HEAD" || arg.starts_with("--with-") || arg.starts_with("--without-")
    })
}

impl Commands {
    fn build_args_mut(&mut self) -> Option<&mut BuildArgs> {
        match self {
            Self::Install { build, .. } | Self::Plan { build } => Some(build),
            Self::Options { .. } | Self::Info { .. } => None,
        }
    }

    pub fn formula(&self) -> &str {
        match self {
            Self::Install { build, .. } | Self::Plan { build } => &build.formula,
            Self::Options { formula } | Self::Info { formula } => formula,
        }
    }
}
