//! Rule model and catalog loading.
//!
//! Rules are value objects: loaded once from a YAML catalog (or constructed
//! programmatically), validated, converted to compact [`RuntimeRule`]s by the
//! matchers, and never mutated afterwards.
//!
//! A catalog document has a top-level `rules` list; catalogs may be loaded
//! from a single file, aggregated from every `*.yaml`/`*.yml` file in a
//! directory, or taken from the default catalog embedded in the binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::Error;

/// Default rule catalog compiled into the binary.
const DEFAULT_CATALOG: &str = include_str!("../rules/default.yaml");

/// Top-level structure of a YAML catalog document.
#[derive(Debug, Deserialize)]
struct RuleFile {
    rules: Vec<Rule>,
}

/// A single pattern-matching rule as authored in the catalog.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct Rule {
    /// Human-readable rule name.
    pub name: String,

    /// Machine-readable identifier: lowercase alphanumerics and periods,
    /// globally unique within a loaded catalog.
    pub id: String,

    /// Description shown to users alongside findings.
    #[serde(default)]
    pub description: String,

    /// Categorization tags.
    #[serde(default)]
    pub tags: Vec<String>,

    /// Regex pattern. May use `(?x)` extended syntax; no other inline flags
    /// are permitted at the pattern prefix.
    pub pattern: String,

    /// `(prefix_keep, suffix_keep)` character counts preserved by redaction.
    #[serde(default)]
    pub redact: Option<(usize, usize)>,

    /// Minimum Shannon entropy a match must meet to qualify.
    #[serde(default)]
    pub entropy: f64,

    /// Positive and negative assertion vectors exercised by catalog tests.
    #[serde(default)]
    pub tests: RuleTests,

    /// Change history; catalog rules carry at least one entry.
    #[serde(default)]
    pub history: Vec<String>,

    /// External references supporting the detection approach.
    #[serde(default)]
    pub refs: Vec<String>,

    /// Internal notes about the rule.
    #[serde(default)]
    pub notes: Vec<String>,
}

/// Assertion vectors for rule validation.
#[derive(Clone, Debug, Default, Deserialize)]
pub struct RuleTests {
    /// Inputs the pattern must match.
    #[serde(default)]
    pub assert: Vec<String>,
    /// Inputs the pattern must not match (or must fail entropy on).
    #[serde(default)]
    pub assert_not: Vec<String>,
}

/// Projection of a [`Rule`] holding only the fields needed at match time.
///
/// Matchers convert rules to this form at compile so per-match bookkeeping
/// does not drag test vectors and history through the hot path.
#[derive(Clone, Debug)]
pub struct RuntimeRule {
    pub id: String,
    pub name: String,
    pub pattern: String,
    pub redact: (usize, usize),
    pub entropy: f64,
}

impl Rule {
    /// Projects this rule into its runtime form.
    pub fn to_runtime(&self) -> RuntimeRule {
        RuntimeRule {
            id: self.id.clone(),
            name: self.name.clone(),
            pattern: self.pattern.clone(),
            redact: self.redact.unwrap_or((0, 0)),
            entropy: self.entropy,
        }
    }

    /// Checks the structural requirements for catalog rules.
    ///
    /// CLI-supplied inline patterns are exempt from these checks; they are
    /// enforced for every rule shipped in a catalog (see `tests/catalog.rs`).
    pub fn validate(&self) -> Result<(), String> {
        if self.name.is_empty() {
            return Err(format!("rule '{}' has an empty name", self.id));
        }
        if self.id.is_empty() {
            return Err("rule has an empty id".to_string());
        }
        if !self
            .id
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '.')
        {
            return Err(format!(
                "rule id '{}' must be lowercase alphanumerics and periods",
                self.id
            ));
        }
        if self.description.is_empty() {
            return Err(format!("rule '{}' has an empty description", self.id));
        }
        if self.tags.is_empty() {
            return Err(format!("rule '{}' has no tags", self.id));
        }
        if self.pattern.is_empty() {
            return Err(format!("rule '{}' has an empty pattern", self.id));
        }
        if let Some(rest) = self.pattern.strip_prefix("(?") {
            let end = rest
                .find(')')
                .ok_or_else(|| format!("rule '{}' has malformed pattern flags", self.id))?;
            let flags = &rest[..end];
            if flags != "x" {
                return Err(format!(
                    "rule '{}' pattern has invalid flags '{flags}': only (?x) is allowed",
                    self.id
                ));
            }
        }
        if self.redact.is_none() {
            return Err(format!("rule '{}' has no redaction offsets", self.id));
        }
        if self.entropy <= 0.0 {
            return Err(format!(
                "rule '{}' must specify a positive entropy threshold",
                self.id
            ));
        }
        if self.tests.assert.is_empty() {
            return Err(format!("rule '{}' has no assert test cases", self.id));
        }
        if self.tests.assert_not.is_empty() {
            return Err(format!("rule '{}' has no assert_not test cases", self.id));
        }
        if self.history.is_empty() {
            return Err(format!("rule '{}' has no history entries", self.id));
        }
        Ok(())
    }
}

fn catalog_error(path: &Path, message: impl ToString) -> Error {
    Error::Catalog {
        path: path.to_path_buf(),
        message: message.to_string(),
    }
}

fn parse_catalog(path: &Path, data: &str) -> Result<Vec<Rule>, Error> {
    let file: RuleFile =
        serde_yaml::from_str(data).map_err(|err| catalog_error(path, err))?;
    reject_duplicate_ids(path, &file.rules)?;
    Ok(file.rules)
}

fn is_catalog_file(name: &str) -> bool {
    name.ends_with(".yaml") || name.ends_with(".yml")
}

/// Loads rules from a single YAML catalog file.
///
/// Duplicate rule ids within the file are rejected.
pub fn load_rules_from_file(path: impl AsRef<Path>) -> Result<Vec<Rule>, Error> {
    let path = path.as_ref();
    let data = fs::read_to_string(path).map_err(|err| catalog_error(path, err))?;
    parse_catalog(path, &data)
}

/// Loads and aggregates rules from every catalog file in a directory.
///
/// Only files whose name ends in `.yaml` or `.yml` are considered;
/// subdirectories are not descended. Duplicate rule ids across the aggregate
/// are rejected.
pub fn load_rules_from_directory(path: impl AsRef<Path>) -> Result<Vec<Rule>, Error> {
    let path = path.as_ref();
    let entries = fs::read_dir(path).map_err(|err| catalog_error(path, err))?;

    let mut files: Vec<PathBuf> = Vec::new();
    for entry in entries {
        let entry = entry.map_err(|err| catalog_error(path, err))?;
        if entry.file_type().map(|t| t.is_dir()).unwrap_or(false) {
            continue;
        }
        let name = entry.file_name();
        if name.to_str().map(is_catalog_file).unwrap_or(false) {
            files.push(entry.path());
        }
    }
    // Directory order is platform-dependent; sort for a stable rule order.
    files.sort();

    let mut all_rules = Vec::new();
    for file in &files {
        all_rules.extend(load_rules_from_file(file)?);
    }
    reject_duplicate_ids(path, &all_rules)?;
    Ok(all_rules)
}

/// Loads rules from a path, dispatching on whether it is a file or directory.
pub fn load_rules(path: impl AsRef<Path>) -> Result<Vec<Rule>, Error> {
    let path = path.as_ref();
    let meta = fs::metadata(path).map_err(|err| catalog_error(path, err))?;
    if meta.is_dir() {
        load_rules_from_directory(path)
    } else {
        load_rules_from_file(path)
    }
}

/// Loads the default rule catalog embedded in the binary.
pub fn load_default_rules() -> Result<Vec<Rule>, Error> {
    parse_catalog(Path::new("<embedded>/default.yaml"), DEFAULT_CATALOG)
}

fn reject_duplicate_ids(path: &Path, rules: &[Rule]) -> Result<(), Error> {
    let mut seen = std::collections::HashSet::new();
    for rule in rules {
        if !seen.insert(rule.id.as_str()) {
            return Err(catalog_error(
                path,
                format!("duplicate rule id '{}'", rule.id),
            ));
        }
    }
    Ok(())
}
