//! Pattern-matching engines and match post-processing.
//!
//! Two engines implement the common [`Matcher`] contract:
//!
//! - [`AutomatonMatcher`]: all rules compiled into a single Vectorscan block
//!   database. Fast, but coarse: block mode reports neither the leftmost
//!   start of match nor capture groups, so spans are refined through the
//!   portable engine's captures after the fact.
//! - [`PortableMatcher`]: one backtracking regex per rule. Slower on large
//!   rule sets, but precise and available everywhere.
//!
//! Post-processing (redaction, entropy qualification, and the generic-rule
//! overlap filter) is shared between the two paths so the engines agree on
//! everything except raw span precision.

mod automaton;
mod portable;

pub use automaton::{automaton_available, AutomatonMatcher};
pub use portable::PortableMatcher;

use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::entropy::shannon_entropy;
use crate::error::Error;
use crate::rule::{Rule, RuntimeRule};

/// Reserved id prefix marking low-specificity rules for overlap filtering.
pub const DEFAULT_GENERIC_RULE_PREFIX: &str = "generic.";

/// Redaction mask length cap.
const MASK_MAX: usize = 5;

/// A single pattern match within a line or buffer.
///
/// `start`/`end` are byte offsets into the scanned unit, half-open, with
/// `unit[start..end]` equal to `matched`.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct MatchResult {
    pub start: usize,
    pub end: usize,
    /// The matched text.
    #[serde(rename = "match")]
    pub matched: String,
    /// Redacted rendering; never equal to `matched` for non-empty matches.
    pub redacted: String,
    pub rule_id: String,
    pub rule_name: String,
    /// Shannon entropy of the matched text, over code points.
    pub entropy: f64,
    /// The rule's minimum entropy threshold.
    pub entropy_threshold: f64,
    /// Whether `entropy >= entropy_threshold`.
    pub entropy_met: bool,
}

/// Common contract implemented by both pattern engines.
///
/// A matcher is compiled once from an ordered rule list; the rule order is
/// the stable identifier used at match time. After `compile` the rule set is
/// frozen until `close`. Matchers are shared across scanner workers, so all
/// find operations take `&self`.
pub trait Matcher: Send + Sync + fmt::Debug {
    /// Builds matcher state from an ordered rule list.
    ///
    /// Patterns are probed one by one so a failure names the first offending
    /// rule via [`Error::Compile`].
    fn compile(&mut self, rules: &[Rule]) -> Result<(), Error>;

    /// Finds all matches within a single line. Matching never crosses line
    /// boundaries.
    fn find_in_line(&self, line: &str) -> Vec<MatchResult>;

    /// Finds all matches within a buffer, with absolute offsets.
    fn find_in_content(&self, content: &[u8]) -> Vec<MatchResult>;

    /// Releases compiled state. Idempotent; `find_*` after close returns an
    /// empty result.
    fn close(&self);

    /// Human-readable engine name.
    fn name(&self) -> &'static str;
}

/// Masks a matched secret, preserving at most `(prefix, suffix)` characters.
///
/// Lengths count characters (code points) so redaction never splits a UTF-8
/// sequence. When the rule's pair cannot apply, matches longer than eight
/// characters keep their first and last four; anything shorter is fully
/// masked. The result is deterministic and never equals the raw match.
pub fn redact(matched: &str, redact: (usize, usize)) -> String {
    let len = matched.chars().count();
    let (prefix, suffix) = redact;

    if prefix > 0 && suffix > 0 && len > prefix + suffix {
        let head: String = matched.chars().take(prefix).collect();
        let tail: String = matched.chars().skip(len - suffix).collect();
        format!("{head}{}{tail}", "*".repeat(MASK_MAX.min(len)))
    } else if len > 8 {
        let head: String = matched.chars().take(4).collect();
        let tail: String = matched.chars().skip(len - 4).collect();
        format!("{head}{}{tail}", "*".repeat(MASK_MAX.min(len - 8)))
    } else {
        "*".repeat(len)
    }
}

/// Builds a fully post-processed [`MatchResult`] for a span claimed by `rule`.
///
/// Both engines route every match through here so redaction and entropy
/// qualification are identical across paths.
pub(crate) fn build_match(
    matched: String,
    start: usize,
    end: usize,
    rule: &RuntimeRule,
) -> MatchResult {
    let redacted = redact(&matched, rule.redact);
    let entropy = shannon_entropy(&matched);
    MatchResult {
        start,
        end,
        matched,
        redacted,
        rule_id: rule.id.clone(),
        rule_name: rule.name.clone(),
        entropy,
        entropy_threshold: rule.entropy,
        entropy_met: entropy >= rule.entropy,
    }
}

/// Refines an automaton match to an exact span via the portable engine.
///
/// Takes the first match of the pre-compiled refiner regex and the last
/// capture group's text, locating it by its last occurrence in the line.
/// Rules conventionally put the secret itself in their last capture, so this
/// converts an approximate end-of-match hit into the exact secret span.
///
/// Returns `None`, keeping the automaton's bounds, when the regex does not
/// match, has no capture groups, or the last group did not participate.
pub(crate) fn refine_span(line: &[u8], re: &regex::bytes::Regex) -> Option<(usize, usize)> {
    let caps = re.captures(line)?;
    if caps.len() <= 1 {
        return None;
    }
    let group = caps.get(caps.len() - 1)?;
    let text = group.as_bytes();
    let offset = memchr::memmem::rfind(line, text)?;
    Some((offset, offset + text.len()))
}

/// Drops generic-rule matches that overlap a more specific rule's match.
///
/// A match is generic iff its rule id starts with `generic_prefix`. Two
/// matches overlap iff `a.start < b.end && b.start < a.end`. Non-generic
/// matches are never filtered.
pub fn filter_overlapping_generic(
    matches: Vec<MatchResult>,
    generic_prefix: &str,
) -> Vec<MatchResult> {
    if matches.len() < 2 {
        return matches;
    }

    let keep: Vec<bool> = matches
        .iter()
        .map(|m| {
            if !m.rule_id.starts_with(generic_prefix) {
                return true;
            }
            !matches.iter().any(|other| {
                !other.rule_id.starts_with(generic_prefix)
                    && m.start < other.end
                    && other.start < m.end
            })
        })
        .collect();

    matches
        .into_iter()
        .zip(keep)
        .filter_map(|(m, keep)| keep.then_some(m))
        .collect()
}

/// Engine selection preference.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EngineChoice {
    /// Automaton when multiple rules and the backend is usable; else portable.
    #[default]
    Auto,
    Portable,
    Automaton,
}

impl FromStr for EngineChoice {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "auto" => Ok(Self::Auto),
            "portable" => Ok(Self::Portable),
            "automaton" => Ok(Self::Automaton),
            other => Err(format!(
                "unknown engine '{other}' (use auto, portable, or automaton)"
            )),
        }
    }
}

impl fmt::Display for EngineChoice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Auto => f.write_str("auto"),
            Self::Portable => f.write_str("portable"),
            Self::Automaton => f.write_str("automaton"),
        }
    }
}

/// Creates and compiles the matcher selected by `choice`.
///
/// An explicit `Automaton` request surfaces [`Error::MatcherUnavailable`]
/// when the backend probe fails; `Auto` silently falls back to the portable
/// engine. The automaton only pays off with multiple patterns, so `Auto`
/// picks it for rule counts above one.
pub fn select_matcher(rules: &[Rule], choice: EngineChoice) -> Result<Box<dyn Matcher>, Error> {
    let use_automaton = match choice {
        EngineChoice::Portable => false,
        EngineChoice::Automaton => {
            if !automaton_available() {
                return Err(Error::MatcherUnavailable(
                    "backend probe failed to compile".to_string(),
                ));
            }
            true
        }
        EngineChoice::Auto => rules.len() > 1 && automaton_available(),
    };

    if use_automaton {
        let mut matcher = AutomatonMatcher::new();
        matcher.compile(rules)?;
        Ok(Box::new(matcher))
    } else {
        let mut matcher = PortableMatcher::new();
        matcher.compile(rules)?;
        Ok(Box::new(matcher))
    }
}
