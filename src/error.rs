//! Error types for catalog loading, rule compilation, and engine selection.
//!
//! Per-file scan failures and directory-walk failures are deliberately *not*
//! represented here: the scanner absorbs them, logs them, and accounts for
//! them in [`crate::metrics::ScanMetrics`] so a bad file can never poison the
//! results of the rest of the tree.

use std::path::PathBuf;

use thiserror::Error;

/// Errors surfaced to callers of the library API.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum Error {
    /// A rule catalog could not be read or parsed.
    #[error("failed to load rule catalog from '{path}': {message}")]
    Catalog { path: PathBuf, message: String },

    /// A specific rule's pattern was rejected by the engine being compiled.
    ///
    /// Patterns are probed one at a time so the first offending rule can be
    /// named; the caller may drop that rule and retry.
    #[error("failed to compile rule '{rule_id}' (pattern: {pattern}): {cause}")]
    Compile {
        rule_id: String,
        pattern: String,
        cause: String,
    },

    /// The automaton backend was explicitly requested but is not usable.
    ///
    /// `EngineChoice::Auto` never produces this; it falls back to the
    /// portable engine instead.
    #[error("automaton engine unavailable: {0}")]
    MatcherUnavailable(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}
