use std::path::Path;

use {anyhow::Result, clap::Subcommand};

use lexlinker_config::{
    LexlinkerConfig,
    validate::{self, Severity, ValidationResult},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration (file plus environment), secrets
    /// redacted.
    Show,
}

pub fn handle_config(
    action: ConfigAction,
    path: Option<&Path>,
    config: &LexlinkerConfig,
) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(path, config, verbose),
        ConfigAction::Show => {
            println!("{config:#?}");
            Ok(())
        },
    }
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(path: Option<&Path>, effective: &LexlinkerConfig, verbose: bool) -> Result<()> {
    let file_result = validate::validate(path);

    // Print which file we're checking
    if let Some(ref path) = file_result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    // File diagnostics cover syntax and unknown fields; the semantic checks
    // are rerun on the effective config so env overrides count.
    let mut result = ValidationResult {
        diagnostics: file_result
            .diagnostics
            .into_iter()
            .filter(|d| {
                matches!(
                    d.category,
                    "syntax" | "unknown-field" | "type-error" | "file-ref"
                )
            })
            .collect(),
        config_path: file_result.config_path,
    };
    result
        .diagnostics
        .extend(validate::validate_config(effective).diagnostics);

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let (color, label) = match d.severity {
            Severity::Error => (RED, "error"),
            Severity::Warning => (YELLOW, "warning"),
            Severity::Info => (CYAN, "info"),
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{label}{RESET} {}", d.message);
        } else {
            eprintln!("  {BOLD}{color}{label}{RESET} {}: {}", d.path, d.message);
        }
        shown += 1;
    }

    let errors = result.count(Severity::Error);
    let warnings = result.count(Severity::Warning);

    if shown > 0 {
        eprintln!();
    }

    if errors == 0 && warnings == 0 {
        eprintln!("No issues found.");
    } else {
        eprintln!("{errors} error(s), {warnings} warning(s)");
    }

    if errors > 0 {
        std::process::exit(1);
    }

    Ok(())
}
