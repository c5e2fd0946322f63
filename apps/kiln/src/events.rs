//! Rendering of evaluator events for the terminal

use console::{Style, Term};
use kiln_events::{AppEvent, BuildEvent, GeneralEvent};
use kiln_types::Stage;

use crate::logging::log_event;

/// Prints progress lines to stderr and forwards every event to tracing
pub struct EventHandler {
    term: Term,
    quiet: bool,
    debug: bool,
    dim: Style,
    bold: Style,
    green: Style,
    yellow: Style,
    red: Style,
}

impl EventHandler {
    /// Create new event handler; `quiet` suppresses all console output
    pub fn new(colors_enabled: bool, quiet: bool, debug: bool) -> Self {
        let style = |s: Style| s.force_styling(colors_enabled);
        Self {
            term: Term::stderr(),
            quiet,
            debug,
            dim: style(Style::new().dim()),
            bold: style(Style::new().bold()),
            green: style(Style::new().green()),
            yellow: style(Style::new().yellow()),
            red: style(Style::new().red().bold()),
        }
    }

    /// Handle incoming event
    pub fn handle_event(&self, event: &AppEvent) {
        log_event(event);
        if self.quiet {
            return;
        }
        if let Some(line) = self.render(event) {
            let _ = self.term.write_line(&line);
        }
    }

    fn render(&self, event: &AppEvent) -> Option<String> {
        match event {
            AppEvent::Build(build) => self.render_build(build),
            AppEvent::General(GeneralEvent::Warning { message, context }) => Some(match context {
                Some(ctx) => format!("{} {message} ({ctx})", self.yellow.apply_to("warning:")),
                None => format!("{} {message}", self.yellow.apply_to("warning:")),
            }),
            AppEvent::General(GeneralEvent::Error { message, .. }) => {
                Some(format!("{} {message}", self.red.apply_to("error:")))
            }
            AppEvent::General(GeneralEvent::DebugLog { message, .. }) if self.debug => {
                Some(self.dim.apply_to(message).to_string())
            }
            AppEvent::General(_) | AppEvent::Platform(_) => None,
        }
    }

    fn render_build(&self, event: &BuildEvent) -> Option<String> {
        let line = match event {
            BuildEvent::SessionStarted {
                formula,
                version,
                mode,
            } => format!(
                "{} {formula} {version} ({mode})",
                self.bold.apply_to("==>")
            ),
            BuildEvent::StageStarted { stage, .. } if *stage >= Stage::SourceAcquired => {
                format!("{} {}", self.bold.apply_to("==>"), stage_title(*stage))
            }
            BuildEvent::StageStarted { .. } | BuildEvent::StageCompleted { .. } => {
                return None;
            }
            BuildEvent::StageFailed {
                stage, failure, ..
            } => format!(
                "{} {stage} failed: {}",
                self.red.apply_to("error:"),
                failure.message
            ),
            BuildEvent::OptionsResolved { enabled, .. } => {
                if enabled.is_empty() {
                    return None;
                }
                self.dim
                    .apply_to(format!("options: {}", enabled.join(", ")))
                    .to_string()
            }
            BuildEvent::DependencyLocated { name, prefix, .. } => {
                if !self.debug {
                    return None;
                }
                self.dim
                    .apply_to(format!("{name} -> {}", prefix.display()))
                    .to_string()
            }
            BuildEvent::DownloadCompleted { url, bytes } => {
                format!("    downloaded {url} ({bytes} bytes)")
            }
            BuildEvent::SourceReady { source_dir, .. } => self
                .dim
                .apply_to(format!("    source in {}", source_dir.display()))
                .to_string(),
            BuildEvent::PatchApplied { patch, .. } => format!("    patched {patch}"),
            BuildEvent::CommandStarted { command, .. } => format!("    {command}"),
            BuildEvent::CommandCompleted { .. } => return None,
            BuildEvent::TestsFailed {
                command, exit_code, ..
            } => format!(
                "{} `{command}` exited with {}",
                self.yellow.apply_to("warning: tests failed:"),
                exit_code.map_or_else(|| "a signal".to_string(), |c| c.to_string())
            ),
            BuildEvent::SessionCompleted {
                formula,
                version,
                prefix,
                duration_ms,
            } => format!(
                "{} {formula} {version} installed to {} in {:.1}s",
                self.green.apply_to("==>"),
                prefix.display(),
                Duration(*duration_ms)
            ),
        };
        Some(line)
    }
}

fn stage_title(stage: Stage) -> &'static str {
    match stage {
        Stage::SourceAcquired => "Fetching source",
        Stage::PatchesApplied => "Patching",
        Stage::Configured => "Configuring",
        Stage::Built => "Building",
        Stage::Installed => "Installing",
        Stage::TestsRun => "Testing",
        _ => "Preparing",
    }
}

/// Milliseconds rendered as fractional seconds
struct Duration(u64);

impl std::fmt::Display for Duration {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        #[allow(clippy::cast_precision_loss)]
        let secs = self.0 as f64 / 1000.0;
        std::fmt::Display::fmt(&secs, f)
    }
}
