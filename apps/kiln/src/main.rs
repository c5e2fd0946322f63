//! kiln - build and install software from formula descriptors
//!
//! The CLI loads configuration and the formula, detects the host, and
//! drives the evaluator while rendering its events.

mod cli;
mod display;
mod error;
mod events;
mod logging;

use crate::cli::{BuildArgs, Cli, Commands};
use crate::display::{CommandResult, OutputRenderer};
use crate::error::CliError;
use crate::events::EventHandler;
use kiln_builder::{
    find_formula, load_formula, EvaluationContext, Evaluator, InstallRequest, StageFailure,
};
use kiln_config::{constants, Config};
use kiln_events::{EventReceiver, EventSender};
use kiln_platform::{detect_host, Platform, PlatformContext};
use kiln_types::{BuildRequest, ColorChoice, Formula, OutputFormat, Stage};
use std::future::Future;
use std::path::PathBuf;
use std::process;
use tokio::select;
use tracing::{error, info};

#[tokio::main]
async fn main() {
    let cli = Cli::parse_with_switches(std::env::args_os());

    let config = Config::load_or_default(cli.global.config.as_deref()).await;
    let logs_dir = config
        .as_ref()
        .map_or_else(|_| Config::default().logs_dir(), Config::logs_dir);
    let json_mode = cli.global.json
        || config
            .as_ref()
            .is_ok_and(|c| c.general.default_output == OutputFormat::Json);
    logging::init_tracing(json_mode, cli.global.debug, &logs_dir);

    let result = match config {
        Ok(config) => run(cli, config).await,
        Err(e) => Err(CliError::Init(e)),
    };

    if let Err(e) = result {
        error!(exit_code = e.exit_code(), "kiln failed: {e}");
        if !json_mode {
            eprintln!("Error: {e}");
        }
        process::exit(e.exit_code());
    }
}

/// Main application logic
async fn run(cli: Cli, mut config: Config) -> Result<(), CliError> {
    info!("Starting kiln v{}", env!("CARGO_PKG_VERSION"));

    // file config, then environment, then CLI flags
    config.merge_env()?;
    apply_cli_config(&mut config, &cli.global, &cli.command);

    let color = config.general.color;
    let format = if cli.global.json {
        OutputFormat::Json
    } else {
        config.general.default_output
    };
    let json_mode = format == OutputFormat::Json;
    let renderer = OutputRenderer::new(format, color);
    let colors_enabled = match color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => console::Term::stderr().features().colors_supported(),
    };
    let handler = EventHandler::new(colors_enabled, json_mode, cli.global.debug);

    let formula = load(&config, cli.command.formula()).await?;

    let result = match cli.command {
        Commands::Options { .. } => CommandResult::Options {
            formula: formula.name.clone(),
            options: formula.option_declarations(),
        },
        Commands::Info { .. } => CommandResult::Info(Box::new(formula)),
        Commands::Plan { build } => {
            let request = parse_switches(&build)?;
            let (tx, rx) = kiln_events::channel();
            let evaluator = evaluator(&config, formula, tx)?;
            let plan = with_events(evaluator.plan(&request), rx, &handler).await?;
            CommandResult::Plan(plan)
        }
        Commands::Install {
            source_dir, build, ..
        } => {
            let request = InstallRequest {
                build: parse_switches(&build)?,
                source_dir,
            };
            let (tx, rx) = kiln_events::channel();
            let evaluator = evaluator(&config, formula, tx)?;
            let report = with_events(evaluator.install(&request), rx, &handler).await?;
            CommandResult::Installed(report)
        }
    };

    renderer.render_result(&result)?;
    info!("Command completed successfully");
    Ok(())
}

/// Resolve and load the formula argument
async fn load(config: &Config, name: &str) -> Result<Formula, CliError> {
    let mut dirs = config.formula_dirs();
    dirs.push(PathBuf::from(constants::LOCAL_FORMULA_DIR));
    let path = find_formula(name, &dirs)?;
    Ok(load_formula(&path).await?)
}

/// Switch errors are reported as option resolution failures
fn parse_switches(build: &BuildArgs) -> Result<BuildRequest, CliError> {
    BuildRequest::from_switches(&build.switches).map_err(|e| {
        CliError::Stage(StageFailure {
            stage: Stage::OptionsResolved,
            error: e.into(),
        })
    })
}

/// Evaluator for the detected host, reporting events on `tx`
fn evaluator(config: &Config, formula: Formula, tx: EventSender) -> Result<Evaluator, CliError> {
    let platform = Platform::current();
    let host = detect_host(&PlatformContext::new(Some(tx.clone())))?;
    info!(host = %host, "detected host");
    let ctx = EvaluationContext::from_config(config, host).with_event_sender(tx);
    Ok(Evaluator::new(formula, ctx).with_platform(platform))
}

/// Drive `command` while rendering its events as they arrive
async fn with_events<T>(
    command: impl Future<Output = Result<T, StageFailure>>,
    mut events: EventReceiver,
    handler: &EventHandler,
) -> Result<T, CliError> {
    let mut command = Box::pin(command);
    loop {
        select! {
            result = &mut command => {
                while let Ok(event) = events.try_recv() {
                    handler.handle_event(&event);
                }
                return result.map_err(CliError::from);
            }
            Some(event) = events.recv() => handler.handle_event(&event),
        }
    }
}

/// Apply CLI configuration overrides (highest precedence)
fn apply_cli_config(config: &mut Config, global: &cli::GlobalArgs, command: &Commands) {
    if let Some(color) = global.color {
        config.general.color = color;
    }
    if let Commands::Install {
        jobs,
        keep_work_dir,
        ..
    } = command
    {
        if let Some(jobs) = jobs {
            config.build.jobs = *jobs;
        }
        if *keep_work_dir {
            config.build.keep_work_dir = true;
        }
    }
}
