//! High-throughput source-code secret scanner.
//!
//! The scanner walks a filesystem tree, reads each eligible text file line
//! by line, matches every line against a catalog of regex rules, and emits
//! one redacted finding per match together with an entropy qualification.
//!
//! Two engines sit behind a common [`matcher::Matcher`] contract:
//! - a Vectorscan block database scanning all rules in one pass, with spans
//!   refined through per-rule portable regexes;
//! - a portable per-pattern backtracking engine used as the fallback and as
//!   the refinement oracle.
//!
//! High-level flow:
//! Catalog -> rules -> matcher.compile -> (walker -> job queue ->
//! worker [read lines -> matcher.find -> post-process] -> collector).
//!
//! Basic usage:
//!
//! ```no_run
//! use std::sync::Arc;
//! use wraith::{load_default_rules, select_matcher, EngineChoice, Scanner};
//!
//! let rules = load_default_rules()?;
//! let matcher = select_matcher(&rules, EngineChoice::Auto)?;
//! let scanner = Scanner::new(Arc::from(matcher));
//!
//! let results = scanner.scan_directory("/path/to/scan")?;
//! for result in &results {
//!     println!(
//!         "{}:{} {} {}",
//!         result.path.display(),
//!         result.line_number,
//!         result.finding.rule_id,
//!         result.finding.redacted
//!     );
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

pub mod binary;
pub mod entropy;
pub mod error;
pub mod matcher;
pub mod metrics;
pub mod normalize;
pub mod report;
pub mod rule;
pub mod scanner;

pub use entropy::shannon_entropy;
pub use error::Error;
pub use matcher::{
    automaton_available, filter_overlapping_generic, redact, select_matcher, AutomatonMatcher,
    EngineChoice, MatchResult, Matcher, PortableMatcher, DEFAULT_GENERIC_RULE_PREFIX,
};
pub use metrics::{MetricsSnapshot, ScanMetrics};
pub use normalize::normalize_extended_regex;
pub use report::{format_bytes, render, ReportFormat, ReportOptions};
pub use rule::{
    load_default_rules, load_rules, load_rules_from_directory, load_rules_from_file, Rule,
    RuleTests, RuntimeRule,
};
pub use scanner::{CancellationToken, ScanResult, Scanner, ScannerConfig};
