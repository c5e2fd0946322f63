//! Output rendering and formatting

use comfy_table::{presets::UTF8_FULL, Attribute, Cell, ContentArrangement, Table};
use kiln_types::{
    ColorChoice, Formula, InstallReport, InvocationPlan, OptionDecl, OptionOrigin, OutputFormat,
    TestOutcome,
};
use serde::Serialize;
use std::io;

/// Result of one CLI command
pub enum CommandResult {
    Installed(InstallReport),
    Plan(InvocationPlan),
    Options {
        formula: String,
        options: Vec<OptionDecl>,
    },
    Info(Box<Formula>),
}

/// Output renderer for CLI results
#[derive(Clone)]
pub struct OutputRenderer {
    format: OutputFormat,
    color_choice: ColorChoice,
}

impl OutputRenderer {
    pub fn new(format: OutputFormat, color_choice: ColorChoice) -> Self {
        Self {
            format,
            color_choice,
        }
    }

    /// Render operation result to stdout
    pub fn render_result(&self, result: &CommandResult) -> io::Result<()> {
        if self.format == OutputFormat::Json {
            return match result {
                CommandResult::Installed(report) => print_json(report),
                CommandResult::Plan(plan) => print_json(plan),
                CommandResult::Options { options, .. } => print_json(options),
                CommandResult::Info(formula) => print_json(formula),
            };
        }
        match result {
            CommandResult::Installed(report) => self.render_install_report(report),
            CommandResult::Plan(plan) => self.render_plan(plan),
            CommandResult::Options { formula, options } => self.render_options(formula, options),
            CommandResult::Info(formula) => self.render_info(formula),
        }
        Ok(())
    }

    /// Print a table, or tab-separated rows in plain mode
    fn print_rows(&self, header: &[&str], rows: Vec<Vec<String>>) {
        if self.format == OutputFormat::Plain {
            for row in plain_rows(&rows) {
                println!("{row}");
            }
            return;
        }
        let mut table = self.table();
        table.set_header(self.header(header));
        for row in rows {
            table.add_row(row.into_iter().map(Cell::new).collect::<Vec<_>>());
        }
        println!("{table}");
    }

    fn table(&self) -> Table {
        let mut table = Table::new();
        table
            .load_preset(UTF8_FULL)
            .set_content_arrangement(ContentArrangement::Dynamic);
        if self.color_choice == ColorChoice::Never {
            table.force_no_tty();
        }
        table
    }

    fn header(&self, names: &[&str]) -> Vec<Cell> {
        names
            .iter()
            .map(|name| {
                let cell = Cell::new(name);
                if self.color_choice == ColorChoice::Never {
                    cell
                } else {
                    cell.add_attribute(Attribute::Bold)
                }
            })
            .collect()
    }

    fn render_install_report(&self, report: &InstallReport) {
        println!(
            "Installed {} {} ({}) to {}",
            report.formula,
            report.version,
            report.mode,
            report.prefix.display()
        );
        if !report.patches_applied.is_empty() {
            println!("Patches: {}", report.patches_applied.join(", "));
        }
        println!("Commands run: {}", report.commands_run);
        match &report.tests {
            TestOutcome::NotRun => {}
            TestOutcome::Passed { commands } => println!("Tests: passed ({commands} commands)"),
            TestOutcome::Failed { command, exit_code } => println!(
                "Tests: FAILED `{command}` (exit {})",
                exit_code.map_or_else(|| "signal".to_string(), |c| c.to_string())
            ),
        }
        if let Some(dir) = &report.work_dir {
            println!("Work directory kept at {}", dir.display());
        }
    }

    fn render_plan(&self, plan: &InvocationPlan) {
        println!(
            "{} {} ({}) -> {}",
            plan.formula,
            plan.version,
            plan.mode,
            plan.prefix.display()
        );
        self.print_rows(
            &["Phase", "Command"],
            plan.invocations
                .iter()
                .map(|invocation| vec![invocation.phase.to_string(), invocation.command_line()])
                .collect(),
        );
        println!("Working directory: {}", plan.build_dir.display());
        self.print_rows(
            &["Variable", "Value"],
            plan.env
                .iter()
                .map(|(key, value)| vec![key.clone(), value.clone()])
                .collect(),
        );
    }

    fn render_options(&self, formula: &str, options: &[OptionDecl]) {
        if options.is_empty() {
            println!("{formula} has no options");
            return;
        }
        let rows = options
            .iter()
            .map(|decl| {
                vec![
                    decl.switch(),
                    if decl.default { "on" } else { "off" }.to_string(),
                    origin_label(&decl.origin),
                    decl.description.clone(),
                ]
            })
            .collect();
        self.print_rows(&["Switch", "Default", "Source", "Description"], rows);
    }

    fn render_info(&self, formula: &Formula) {
        println!("{} {}", formula.name, formula.version);
        if let Some(description) = &formula.description {
            println!("{description}");
        }
        if let Some(homepage) = &formula.homepage {
            println!("{homepage}");
        }
        println!("Source: {}", formula.url);
        if let Some(head) = &formula.head {
            println!("HEAD: {}", head.git);
        }
        if formula.dependencies.is_empty() {
            return;
        }
        let rows = formula
            .dependencies
            .iter()
            .map(|dep| {
                vec![
                    dep.name.clone(),
                    dep.phase.to_string(),
                    format!("{:?}", dep.kind).to_lowercase(),
                    dep.sub_options.join(", "),
                ]
            })
            .collect();
        self.print_rows(&["Dependency", "Phase", "Kind", "With"], rows);
    }
}

fn origin_label(origin: &OptionOrigin) -> String {
    match origin {
        OptionOrigin::Declared => "declared".to_string(),
        OptionOrigin::Recommended(dep) => format!("recommended {dep}"),
        OptionOrigin::Optional(dep) => format!("optional {dep}"),
    }
}

fn plain_rows(rows: &[Vec<String>]) -> Vec<String> {
    rows.iter()
        .map(|row| row.join("\t").trim_end().to_string())
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> io::Result<()> {
    let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
    println!("{json}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origins_name_their_dependency() {
        assert_eq!(origin_label(&OptionOrigin::Declared), "declared");
        assert_eq!(
            origin_label(&OptionOrigin::Recommended("qt".to_string())),
            "recommended qt"
        );
        assert_eq!(
            origin_label(&OptionOrigin::Optional("homebrew/science/openni".to_string())),
            "optional homebrew/science/openni"
        );
    }

    #[test]
    fn plain_rows_are_tab_separated() {
        let rows = vec![
            vec!["configure".to_string(), "cmake ..".to_string()],
            vec!["build".to_string(), String::new()],
        ];
        assert_eq!(plain_rows(&rows), ["configure\tcmake ..", "build"]);
    }
}
