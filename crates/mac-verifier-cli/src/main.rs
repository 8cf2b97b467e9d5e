use std::{
    fs,
    io::{self, Read},
    path::{Path, PathBuf},
    process::ExitCode,
};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use mac_verifier_core::{
    render_summary, CsvTable, DefaultClassifier, OutputFormat, SystemOpener, VerifierSettings,
    CHECKED_SUFFIX, NETWORK_MARKER,
};
use tracing::debug;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(
    name = "mac-verifier",
    author,
    version,
    about = "Wireless Network Scan MAC Verifier"
)]
struct Cli {
    /// Settings file (TOML, YAML or JSON) controlling whether checked files are opened
    #[arg(long, value_name = "FILE", global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Check scan exports against a list of known MACs
    Check {
        /// Scan exports (CSV) to check
        #[arg(value_name = "INPUT", required = true)]
        inputs: Vec<PathBuf>,

        /// File with known MACs, one per line; `-` or omitted reads stdin
        #[arg(long = "known-macs", value_name = "FILE")]
        known_macs: Option<PathBuf>,

        /// Emit the summary as JSON instead of human-readable text
        #[arg(long)]
        json: bool,

        /// Never open checked files, even when bad MACs are found
        #[arg(long)]
        no_open: bool,
    },
    /// Print the effective settings
    Settings {
        /// Emit settings as JSON instead of human-readable text
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<ExitCode> {
    init_tracing();
    let cli = Cli::parse();
    let settings = load_settings(cli.config.as_deref())?;
    match cli.command {
        Commands::Check {
            inputs,
            known_macs,
            json,
            no_open,
        } => check(settings, &inputs, known_macs.as_deref(), json, no_open),
        Commands::Settings { json } => {
            show_settings(&settings, json)?;
            Ok(ExitCode::SUCCESS)
        }
    }
}

fn load_settings(path: Option<&Path>) -> Result<VerifierSettings> {
    let settings = match path {
        Some(path) => config::Config::builder()
            .add_source(config::File::from(path))
            .build()
            .and_then(|cfg| cfg.try_deserialize::<VerifierSettings>())
            .with_context(|| format!("failed to load settings from {}", path.display()))?,
        None => VerifierSettings::default(),
    };
    Ok(settings)
}

fn check(
    mut settings: VerifierSettings,
    inputs: &[PathBuf],
    known_macs: Option<&Path>,
    json: bool,
    no_open: bool,
) -> Result<ExitCode> {
    if no_open {
        settings.open_on_mismatch = false;
    }
    let known_text = read_known_macs(known_macs)?;
    debug!(
        sources = inputs.len(),
        known_lines = known_text.split('\n').count(),
        "starting check"
    );

    let classifier = DefaultClassifier::with_settings(CsvTable::new(), settings);
    let report = classifier.classify_batch(inputs, &known_text, &SystemOpener);

    let format = if json {
        OutputFormat::Json
    } else {
        OutputFormat::Human
    };
    print!("{}", render_summary(&report, format)?);
    if json {
        println!();
    }

    Ok(if report.has_failures() {
        ExitCode::from(2)
    } else {
        ExitCode::SUCCESS
    })
}

/// Read the known MAC text the way a multi-line text box would hand it over.
fn read_known_macs(path: Option<&Path>) -> Result<String> {
    let raw = match path {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("failed to read known MACs from {}", path.display()))?,
        _ => {
            let mut buffer = String::new();
            io::stdin()
                .read_to_string(&mut buffer)
                .context("failed to read known MACs from stdin")?;
            buffer
        }
    };
    Ok(normalize_known_text(&raw))
}

fn normalize_known_text(raw: &str) -> String {
    let unified = raw.replace("\r\n", "\n");
    match unified.strip_suffix('\n') {
        Some(stripped) => stripped.to_string(),
        None => unified,
    }
}

fn show_settings(settings: &VerifierSettings, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(settings)?);
        return Ok(());
    }
    println!("marker           : {NETWORK_MARKER}");
    println!("output suffix    : {CHECKED_SUFFIX}");
    println!("open on mismatch : {}", settings.open_on_mismatch);
    Ok(())
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(io::stderr)
        .try_init();
}
