use std::path::{Path, PathBuf};

use {anyhow::Result, clap::Subcommand, secrecy::Secret, serde_json::Value};

use sapfire_config::{
    ConfigDocument, SapfireConfig,
    validate::{self, Severity},
};

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Validate the configuration file and report errors/warnings.
    Check {
        /// Show informational diagnostics in addition to errors and warnings.
        #[arg(long)]
        verbose: bool,
    },
    /// Print the effective configuration as TOML (API key redacted).
    Show,
    /// Print the config file path in use.
    Path,
    /// Set a value by dotted key, e.g. `settings.locale.language en`.
    Set { key: String, value: String },
    /// Write a config file with every default filled in.
    Init {
        /// Overwrite an existing file.
        #[arg(long)]
        force: bool,
    },
}

pub fn handle_config(action: &ConfigAction, explicit: Option<&Path>) -> Result<()> {
    match action {
        ConfigAction::Check { verbose } => check(explicit, *verbose),
        ConfigAction::Show => show(explicit),
        ConfigAction::Path => {
            println!("{}", config_path(explicit).display());
            Ok(())
        },
        ConfigAction::Set { key, value } => {
            let path = config_path(explicit);
            let mut document = ConfigDocument::open(&path)?;
            set_value(&mut document, key, value)?;
            document.save()?;
            eprintln!("Updated {key} in {}", path.display());
            Ok(())
        },
        ConfigAction::Init { force } => {
            let path = config_path(explicit);
            if path.exists() && !force {
                anyhow::bail!("{} already exists (use --force to overwrite)", path.display());
            }
            sapfire_config::save_config_to(&SapfireConfig::default(), &path)?;
            eprintln!("Wrote {}", path.display());
            Ok(())
        },
    }
}

fn config_path(explicit: Option<&Path>) -> PathBuf {
    explicit.map_or_else(sapfire_config::find_or_default_config_path, Path::to_path_buf)
}

/// ANSI color codes.
const RED: &str = "\x1b[31m";
const YELLOW: &str = "\x1b[33m";
const CYAN: &str = "\x1b[36m";
const BOLD: &str = "\x1b[1m";
const RESET: &str = "\x1b[0m";

fn check(explicit: Option<&Path>, verbose: bool) -> Result<()> {
    let result = validate::validate(explicit);

    if let Some(ref path) = result.config_path {
        eprintln!("Checking {}\n", path.display());
    } else {
        eprintln!("No config file found; checking defaults.\n");
    }

    let mut shown = 0;
    for d in &result.diagnostics {
        if d.severity == Severity::Info && !verbose {
            continue;
        }

        let color = match d.severity {
            Severity::Error => RED,
            Severity::Warning => YELLOW,
            Severity::Info => CYAN,
        };

        if d.path.is_empty() {
            eprintln!("  {BOLD}{color}{}{RESET} {}", d.severity, d.message);
        } else {
            eprintln!(
                "  {BOLD}{color}{}{RESET} {}: {}",
                d.severity, d.path, d.message
            );
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

fn show(explicit: Option<&Path>) -> Result<()> {
    let mut config = match explicit {
        Some(path) => sapfire_config::load_config(path)?,
        None => sapfire_config::discover_and_load(),
    };
    if config.providers.gemini.has_api_key() {
        config.providers.gemini.api_key = Some(Secret::new("[REDACTED]".into()));
    }
    print!("{}", toml::to_string_pretty(&config)?);
    Ok(())
}

/// Parse `raw` as a JSON literal, falling back to a plain string.
fn parse_literal(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

/// Set dotted `key` from command-line text. A literal that does not fit the
/// field (`123` for a name) is retried as a string.
fn set_value(document: &mut ConfigDocument, key: &str, raw: &str) -> Result<()> {
    let literal = parse_literal(raw);
    let retry_as_string = !literal.is_string();
    document.set(key, literal).or_else(|e| {
        if retry_as_string {
            document.set(key, Value::String(raw.to_string()))
        } else {
            Err(e)
        }
    })
}
