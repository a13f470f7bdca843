//! Portable backtracking matcher.
//!
//! Each rule's pattern is normalized ([`crate::normalize`]) and compiled
//! into an independent `regex::bytes::Regex`. Matching enumerates every
//! non-overlapping match per pattern in rule order, reporting the engine's
//! exact byte spans. This engine is the fallback when the automaton backend
//! is unavailable and the span/capture oracle the automaton refines through.

use std::sync::RwLock;

use regex::bytes::Regex;

use crate::error::Error;
use crate::normalize::normalize_extended_regex;
use crate::rule::{Rule, RuntimeRule};

use super::{build_match, MatchResult, Matcher};

/// Matcher backed by one compiled regex per rule.
#[derive(Default)]
pub struct PortableMatcher {
    // Read-locked by finds, write-locked by compile/close. Compiled state is
    // immutable, so worker reads never contend with each other.
    state: RwLock<Option<State>>,
}

struct State {
    rules: Vec<RuntimeRule>,
    patterns: Vec<Regex>,
}

impl PortableMatcher {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Compiles one rule's normalized pattern, naming the rule on failure.
pub(super) fn compile_rule_regex(rule: &Rule) -> Result<Regex, Error> {
    let normalized = normalize_extended_regex(&rule.pattern);
    Regex::new(&normalized).map_err(|err| Error::Compile {
        rule_id: rule.id.clone(),
        pattern: rule.pattern.clone(),
        cause: err.to_string(),
    })
}

impl Matcher for PortableMatcher {
    fn compile(&mut self, rules: &[Rule]) -> Result<(), Error> {
        let mut patterns = Vec::with_capacity(rules.len());
        for rule in rules {
            patterns.push(compile_rule_regex(rule)?);
        }

        let state = State {
            rules: rules.iter().map(Rule::to_runtime).collect(),
            patterns,
        };
        *self.state.write().expect("matcher lock poisoned") = Some(state);
        Ok(())
    }

    fn find_in_line(&self, line: &str) -> Vec<MatchResult> {
        self.find_in_content(line.as_bytes())
    }

    fn find_in_content(&self, content: &[u8]) -> Vec<MatchResult> {
        let guard = self.state.read().expect("matcher lock poisoned");
        let Some(state) = guard.as_ref() else {
            return Vec::new();
        };

        let mut results = Vec::new();
        for (pattern, rule) in state.patterns.iter().zip(&state.rules) {
            for found in pattern.find_iter(content) {
                let matched = String::from_utf8_lossy(found.as_bytes()).into_owned();
                results.push(build_match(matched, found.start(), found.end(), rule));
            }
        }
        results
    }

    fn close(&self) {
        self.state.write().expect("matcher lock poisoned").take();
    }

    fn name(&self) -> &'static str {
        "portable"
    }
}
