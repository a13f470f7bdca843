//! Command-line entry point.
//!
//! Loads a rule catalog (flag-supplied, inline patterns, or the embedded
//! defaults), compiles the selected engine, scans the target path in
//! parallel, and renders a report. Exit code 0 means no findings survived
//! filtering; 1 means findings (or a fatal error).

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use std::time::Instant;

use clap::Parser;
use log::info;

use wraith::{
    load_default_rules, load_rules, render, select_matcher, EngineChoice, ReportFormat,
    ReportOptions, Rule, Scanner,
};

/// Scan a directory or file for leaked secrets.
#[derive(Parser, Debug)]
#[command(
    name = "wraith",
    version,
    about = "High-throughput source-code secret scanner",
    arg_required_else_help = true
)]
struct Cli {
    /// Directory or file to scan.
    path: PathBuf,

    /// Inline regex patterns; each becomes a rule `cli.pattern.N`.
    patterns: Vec<String>,

    /// Pattern engine to use.
    #[arg(long, default_value_t = EngineChoice::Auto)]
    engine: EngineChoice,

    /// YAML file or directory of pattern rules (defaults to built-in rules).
    #[arg(long, value_name = "PATH")]
    rules: Option<PathBuf>,

    /// Do not redact: show full matches instead of redacted versions.
    #[arg(long)]
    dnr: bool,

    /// Show matches that do not meet minimum entropy requirements.
    #[arg(long = "low-entropy")]
    low_entropy: bool,

    /// Output format.
    #[arg(long, default_value_t = ReportFormat::Text)]
    format: ReportFormat,

    /// Write output to a file (format auto-detected from .json/.md).
    #[arg(long, value_name = "FILE")]
    output: Option<PathBuf>,

    /// Disable colored output (text format only).
    #[arg(long = "no-color")]
    no_color: bool,
}

fn main() -> ExitCode {
    env_logger::init();
    let cli = Cli::parse();

    match run(cli) {
        Ok(code) => ExitCode::from(code),
        Err(err) => {
            eprintln!("wraith: {err}");
            ExitCode::from(1)
        }
    }
}

fn run(cli: Cli) -> Result<u8, Box<dyn std::error::Error>> {
    let mut rules: Vec<Rule> = Vec::new();

    if let Some(path) = &cli.rules {
        rules.extend(load_rules(path)?);
    }

    for (i, pattern) in cli.patterns.iter().enumerate() {
        rules.push(Rule {
            name: format!("CLI Pattern {}", i + 1),
            id: format!("cli.pattern.{}", i + 1),
            pattern: pattern.clone(),
            tags: vec!["cli".to_string()],
            ..Rule::default()
        });
    }

    if rules.is_empty() {
        rules = load_default_rules()?;
        info!("using built-in rules ({} patterns loaded)", rules.len());
    }

    let matcher = select_matcher(&rules, cli.engine)?;
    info!(
        "scanning {} with {} workers using {} engine, {} rules",
        cli.path.display(),
        num_cpus::get() * 2,
        matcher.name(),
        rules.len()
    );

    let scanner = Scanner::new(Arc::from(matcher));

    let start = Instant::now();
    let results = scanner.scan_directory(&cli.path)?;
    let duration = start.elapsed();

    // Entropy filtering happens at the sink: the scanner reports everything,
    // the report hides low-entropy matches unless asked not to.
    let mut low_entropy_filtered = 0usize;
    let filtered: Vec<_> = results
        .into_iter()
        .filter(|result| {
            if result.finding.entropy_met || cli.low_entropy {
                true
            } else {
                low_entropy_filtered += 1;
                false
            }
        })
        .collect();

    let format = match &cli.output {
        Some(path) if cli.format == ReportFormat::Text => {
            ReportFormat::from_extension(path).unwrap_or(cli.format)
        }
        _ => cli.format,
    };

    let writing_to_file = cli.output.is_some();
    if cli.no_color || writing_to_file || format != ReportFormat::Text {
        colored::control::set_override(false);
    }

    let opts = ReportOptions {
        format,
        scan_path: cli.path.clone(),
        duration,
        show_raw_matches: cli.dnr,
        low_entropy_filtered,
    };
    let (output, exit_code) = render(&filtered, scanner.metrics().snapshot(), &opts);

    match &cli.output {
        Some(path) => {
            std::fs::write(path, &output)?;
            eprintln!("report written to {}", path.display());
        }
        None => print!("{output}"),
    }

    Ok(exit_code as u8)
}
