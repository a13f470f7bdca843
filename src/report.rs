//! Report rendering.
//!
//! Findings and metrics are rendered into a complete output string first and
//! written once by the caller, so formatting never interleaves with other
//! output. Three formats are supported: human-oriented colored text, JSON
//! for machine consumption, and Markdown for pasting into review threads.

use std::collections::HashMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use colored::Colorize;
use serde::Serialize;

use crate::metrics::MetricsSnapshot;
use crate::scanner::ScanResult;

/// Redacted matches longer than this are truncated in text reports.
const MAX_DISPLAY_CHARS: usize = 80;

/// Output format for a scan report.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ReportFormat {
    #[default]
    Text,
    Json,
    Markdown,
}

impl FromStr for ReportFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            "md" | "markdown" => Ok(Self::Markdown),
            other => Err(format!("unknown format '{other}' (use text, json, or md)")),
        }
    }
}

impl std::fmt::Display for ReportFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Text => f.write_str("text"),
            Self::Json => f.write_str("json"),
            Self::Markdown => f.write_str("md"),
        }
    }
}

impl ReportFormat {
    /// Picks a format from an output file extension, if it implies one.
    pub fn from_extension(path: &Path) -> Option<Self> {
        match path.extension().and_then(|e| e.to_str()) {
            Some("json") => Some(Self::Json),
            Some("md") => Some(Self::Markdown),
            _ => None,
        }
    }
}

/// Rendering options.
#[derive(Clone, Debug, Default)]
pub struct ReportOptions {
    pub format: ReportFormat,
    /// The scanned root, echoed in Markdown reports.
    pub scan_path: PathBuf,
    pub duration: Duration,
    /// Show raw matches instead of redacted ones in text output.
    pub show_raw_matches: bool,
    /// Count of findings suppressed by the entropy filter.
    pub low_entropy_filtered: usize,
}

/// Renders a report, returning the output and the process exit code
/// (0 when no findings survived filtering, 1 otherwise).
pub fn render(
    results: &[ScanResult],
    metrics: MetricsSnapshot,
    opts: &ReportOptions,
) -> (String, i32) {
    match opts.format {
        ReportFormat::Text => render_text(results, metrics, opts),
        ReportFormat::Json => render_json(results, metrics, opts),
        ReportFormat::Markdown => render_markdown(results, metrics, opts),
    }
}

/// Converts a byte count to a human-readable form.
pub fn format_bytes(bytes: u64) -> String {
    const UNIT: u64 = 1024;
    if bytes < UNIT {
        return format!("{bytes} B");
    }
    let mut div = UNIT;
    let mut exp = 0usize;
    let mut n = bytes / UNIT;
    while n >= UNIT {
        div *= UNIT;
        exp += 1;
        n /= UNIT;
    }
    format!("{:.1} {}B", bytes as f64 / div as f64, ["K", "M", "G", "T", "P", "E"][exp])
}

/// Groups results by file, preserving first-seen file order.
fn group_by_file(results: &[ScanResult]) -> Vec<(&Path, Vec<&ScanResult>)> {
    let mut order: Vec<&Path> = Vec::new();
    let mut groups: HashMap<&Path, Vec<&ScanResult>> = HashMap::new();
    for result in results {
        let path = result.path.as_path();
        groups
            .entry(path)
            .or_insert_with(|| {
                order.push(path);
                Vec::new()
            })
            .push(result);
    }
    order
        .into_iter()
        .map(|path| {
            let group = groups.remove(path).unwrap_or_default();
            (path, group)
        })
        .collect()
}

fn display_match(result: &ScanResult, show_raw: bool) -> String {
    let text = if show_raw {
        &result.finding.matched
    } else {
        &result.finding.redacted
    };
    if text.chars().count() > MAX_DISPLAY_CHARS {
        let truncated: String = text.chars().take(MAX_DISPLAY_CHARS - 3).collect();
        format!("{truncated}...")
    } else {
        text.clone()
    }
}

fn divider(n: usize) -> String {
    "─".repeat(n)
}

fn render_text(
    results: &[ScanResult],
    metrics: MetricsSnapshot,
    opts: &ReportOptions,
) -> (String, i32) {
    let mut out = String::new();

    let _ = writeln!(out, "\n{}", divider(50));
    let _ = writeln!(out, " {}", "SCAN SUMMARY".bold());
    let _ = writeln!(out, "{}\n", divider(50));

    let _ = writeln!(
        out,
        "Files scanned:  {}",
        metrics.files_scanned.to_string().bold()
    );
    let _ = writeln!(out, "Total content:  {}", format_bytes(metrics.bytes_scanned));

    if results.is_empty() {
        let _ = writeln!(out, "Secrets found:  {}\n", "0".green());
        if opts.low_entropy_filtered > 0 {
            let _ = writeln!(
                out,
                "{} No high-entropy secrets found. {} low-entropy matches were filtered out.",
                "✓".green(),
                opts.low_entropy_filtered
            );
            let _ = writeln!(out, "  Use --low-entropy to see all matches.\n");
        } else {
            let _ = writeln!(out, "{} No secrets found!\n", "✓".green());
        }
        return (out, 0);
    }

    let _ = write!(
        out,
        "Secrets found:  {}",
        results.len().to_string().red()
    );
    if opts.low_entropy_filtered > 0 {
        let _ = write!(out, " ({} low-entropy filtered)", opts.low_entropy_filtered);
    }
    out.push_str("\n\n");

    for (path, file_matches) in group_by_file(results) {
        let _ = writeln!(
            out,
            "{} {} ({} matches)",
            "●".red(),
            path.display().to_string().bold(),
            file_matches.len()
        );

        for result in file_matches {
            let _ = writeln!(
                out,
                "  {} Line {}: {}",
                "└─".yellow(),
                result.line_number.to_string().cyan(),
                result.finding.rule_name
            );
            let _ = writeln!(out, "     {}", display_match(result, opts.show_raw_matches));
            if !result.finding.rule_id.is_empty() {
                let _ = writeln!(out, "     ID: {}", result.finding.rule_id);
            }
            let _ = writeln!(
                out,
                "     Entropy: {:.2} | Threshold: {:.2} | Met: {}",
                result.finding.entropy,
                result.finding.entropy_threshold,
                if result.finding.entropy_met { "Yes" } else { "No" }
            );
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{}", divider(50));
    let _ = writeln!(
        out,
        "Files skipped: {} (binary/large files)",
        metrics.files_skipped
    );
    let _ = writeln!(out, "Scan completed in {:?}\n", opts.duration);
    let _ = writeln!(
        out,
        "{} Review and address the secrets above.\n",
        "!".yellow()
    );

    (out, 1)
}

#[derive(Serialize)]
struct JsonSummary {
    files_scanned: u64,
    files_skipped: u64,
    total_bytes: u64,
    matches_found: u64,
    high_entropy_matches: usize,
    low_entropy_matches: usize,
}

#[derive(Serialize)]
struct JsonReport<'a> {
    summary: JsonSummary,
    results: &'a [ScanResult],
}

fn render_json(
    results: &[ScanResult],
    metrics: MetricsSnapshot,
    opts: &ReportOptions,
) -> (String, i32) {
    let report = JsonReport {
        summary: JsonSummary {
            files_scanned: metrics.files_scanned,
            files_skipped: metrics.files_skipped,
            total_bytes: metrics.bytes_scanned,
            matches_found: metrics.matches_found,
            high_entropy_matches: results.len(),
            low_entropy_matches: opts.low_entropy_filtered,
        },
        results,
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => {
            let code = if results.is_empty() { 0 } else { 1 };
            (json + "\n", code)
        }
        Err(err) => (format!("error encoding JSON: {err}\n"), 1),
    }
}

fn render_markdown(
    results: &[ScanResult],
    metrics: MetricsSnapshot,
    opts: &ReportOptions,
) -> (String, i32) {
    let mut out = String::new();

    out.push_str("# Secret Scan Report\n\n");
    let _ = writeln!(out, "**Scanned:** `{}`  ", opts.scan_path.display());
    let _ = writeln!(
        out,
        "**Date:** {}  \n",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    out.push_str("## Summary\n\n");
    out.push_str("| Metric | Count |\n");
    out.push_str("|--------|-------|\n");
    let _ = writeln!(out, "| Files scanned | {} |", metrics.files_scanned);
    let _ = writeln!(out, "| Files skipped | {} |", metrics.files_skipped);
    let _ = writeln!(out, "| Total content | {} |", format_bytes(metrics.bytes_scanned));
    let _ = writeln!(out, "| Secrets found | {} |", results.len());
    if opts.low_entropy_filtered > 0 {
        let _ = writeln!(out, "| Low-entropy filtered | {} |", opts.low_entropy_filtered);
    }
    let _ = writeln!(out, "| Scan duration | {:?} |\n", opts.duration);

    if results.is_empty() {
        out.push_str("✅ **No secrets found!**\n");
        if opts.low_entropy_filtered > 0 {
            let _ = writeln!(
                out,
                "\n*Note: {} low-entropy matches were filtered out.*",
                opts.low_entropy_filtered
            );
        }
        return (out, 0);
    }

    out.push_str("## Findings\n\n");

    for (path, file_matches) in group_by_file(results) {
        let _ = writeln!(out, "### `{}`\n", path.display());
        let _ = writeln!(out, "**Matches:** {}\n", file_matches.len());

        for (i, result) in file_matches.iter().enumerate() {
            let _ = writeln!(out, "#### Finding {}\n", i + 1);
            let _ = writeln!(out, "- **Line:** {}", result.line_number);
            let _ = writeln!(out, "- **Rule:** {}", result.finding.rule_name);
            if !result.finding.rule_id.is_empty() {
                let _ = writeln!(out, "- **Rule ID:** {}", result.finding.rule_id);
            }
            let _ = writeln!(out, "- **Match:** `{}`", result.finding.redacted);
            let _ = writeln!(out, "- **Entropy:** {:.2}", result.finding.entropy);
            let _ = writeln!(out, "- **Threshold:** {:.2}", result.finding.entropy_threshold);
            let _ = writeln!(
                out,
                "- **Threshold Met:** {}",
                if result.finding.entropy_met { "Yes" } else { "No" }
            );
            out.push('\n');
        }
    }

    (out, 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::MatchResult;

    fn result(path: &str, line: u64, rule_id: &str) -> ScanResult {
        ScanResult {
            path: PathBuf::from(path),
            line_number: line,
            finding: MatchResult {
                start: 0,
                end: 12,
                matched: "tok_deadbeef".to_string(),
                redacted: "tok_*****eef".to_string(),
                rule_id: rule_id.to_string(),
                rule_name: "Test Token".to_string(),
                entropy: 3.0,
                entropy_threshold: 2.5,
                entropy_met: true,
            },
        }
    }

    fn snapshot() -> MetricsSnapshot {
        MetricsSnapshot {
            files_scanned: 3,
            files_skipped: 1,
            bytes_scanned: 2048,
            matches_found: 2,
        }
    }

    #[test]
    fn format_bytes_scales_units() {
        assert_eq!(format_bytes(512), "512 B");
        assert_eq!(format_bytes(2048), "2.0 KB");
        assert_eq!(format_bytes(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_bytes(3 * 1024 * 1024 * 1024), "3.0 GB");
    }

    #[test]
    fn report_format_parses_and_detects_extensions() {
        assert_eq!("text".parse::<ReportFormat>().unwrap(), ReportFormat::Text);
        assert_eq!("json".parse::<ReportFormat>().unwrap(), ReportFormat::Json);
        assert_eq!("md".parse::<ReportFormat>().unwrap(), ReportFormat::Markdown);
        assert!("xml".parse::<ReportFormat>().is_err());

        assert_eq!(
            ReportFormat::from_extension(Path::new("out.json")),
            Some(ReportFormat::Json)
        );
        assert_eq!(
            ReportFormat::from_extension(Path::new("out.md")),
            Some(ReportFormat::Markdown)
        );
        assert_eq!(ReportFormat::from_extension(Path::new("out.txt")), None);
    }

    #[test]
    fn empty_results_exit_zero_across_formats() {
        for format in [ReportFormat::Text, ReportFormat::Json, ReportFormat::Markdown] {
            let opts = ReportOptions {
                format,
                ..Default::default()
            };
            let (_, code) = render(&[], snapshot(), &opts);
            assert_eq!(code, 0);
        }
    }

    #[test]
    fn findings_exit_one_and_show_redacted_text() {
        colored::control::set_override(false);
        let results = vec![result("src/a.env", 3, "test.token")];
        let opts = ReportOptions::default();
        let (out, code) = render(&results, snapshot(), &opts);

        assert_eq!(code, 1);
        assert!(out.contains("src/a.env"));
        assert!(out.contains("Line 3"));
        assert!(out.contains("tok_*****eef"));
        assert!(!out.contains("     tok_deadbeef"));
    }

    #[test]
    fn raw_matches_shown_when_redaction_disabled() {
        colored::control::set_override(false);
        let results = vec![result("src/a.env", 3, "test.token")];
        let opts = ReportOptions {
            show_raw_matches: true,
            ..Default::default()
        };
        let (out, _) = render(&results, snapshot(), &opts);
        assert!(out.contains("tok_deadbeef"));
    }

    #[test]
    fn json_report_nests_summary_and_results() {
        let results = vec![
            result("a.txt", 1, "test.token"),
            result("b.txt", 9, "test.token"),
        ];
        let opts = ReportOptions {
            format: ReportFormat::Json,
            low_entropy_filtered: 4,
            ..Default::default()
        };
        let (out, code) = render(&results, snapshot(), &opts);
        assert_eq!(code, 1);

        let value: serde_json::Value = serde_json::from_str(&out).unwrap();
        assert_eq!(value["summary"]["files_scanned"], 3);
        assert_eq!(value["summary"]["low_entropy_matches"], 4);
        assert_eq!(value["results"].as_array().unwrap().len(), 2);
        assert_eq!(value["results"][0]["line_number"], 1);
        assert_eq!(value["results"][0]["rule_id"], "test.token");
    }

    #[test]
    fn markdown_report_groups_by_file() {
        let results = vec![
            result("a.txt", 1, "test.token"),
            result("a.txt", 5, "test.token"),
            result("b.txt", 2, "test.token"),
        ];
        let opts = ReportOptions {
            format: ReportFormat::Markdown,
            scan_path: PathBuf::from("/repo"),
            ..Default::default()
        };
        let (out, code) = render(&results, snapshot(), &opts);
        assert_eq!(code, 1);
        assert!(out.contains("### `a.txt`"));
        assert!(out.contains("### `b.txt`"));
        assert!(out.contains("**Matches:** 2"));
        assert!(out.contains("`tok_*****eef`"));
        assert!(!out.contains("tok_deadbeef"));
    }
}
