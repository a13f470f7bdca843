//! Embedded-catalog validation.
//!
//! Every rule shipped in the default catalog must be structurally complete,
//! compile on both engines, and prove itself against its own assertion
//! vectors: each `assert` case must match with qualifying entropy, and each
//! `assert_not` case must produce no qualifying match.

use std::collections::HashSet;

use wraith::{
    automaton_available, load_default_rules, normalize_extended_regex, select_matcher,
    shannon_entropy, EngineChoice, Matcher, Rule,
};

fn compile_single(rule: &Rule, choice: EngineChoice) -> Box<dyn Matcher> {
    select_matcher(std::slice::from_ref(rule), choice)
        .unwrap_or_else(|err| panic!("rule '{}' failed to compile: {err}", rule.id))
}

#[test]
fn catalog_rules_are_well_formed() {
    let rules = load_default_rules().expect("default catalog loads");
    assert!(!rules.is_empty(), "default catalog must not be empty");

    let mut seen = HashSet::new();
    for rule in &rules {
        rule.validate()
            .unwrap_or_else(|err| panic!("catalog rule invalid: {err}"));
        assert!(seen.insert(rule.id.clone()), "duplicate rule id '{}'", rule.id);
    }
}

#[test]
fn catalog_patterns_compile_on_both_engines() {
    for rule in load_default_rules().unwrap() {
        let normalized = normalize_extended_regex(&rule.pattern);
        regex::bytes::Regex::new(&normalized)
            .unwrap_or_else(|err| panic!("rule '{}' rejected by portable engine: {err}", rule.id));

        compile_single(&rule, EngineChoice::Portable);
        if automaton_available() {
            compile_single(&rule, EngineChoice::Automaton);
        }
    }
}

#[test]
fn assert_vectors_match_with_qualifying_entropy() {
    let mut engines = vec![EngineChoice::Portable];
    if automaton_available() {
        engines.push(EngineChoice::Automaton);
    }

    for rule in load_default_rules().unwrap() {
        for choice in &engines {
            let matcher = compile_single(&rule, *choice);
            for (i, case) in rule.tests.assert.iter().enumerate() {
                let results = matcher.find_in_line(case);
                assert!(
                    !results.is_empty(),
                    "rule '{}' should match assert case {} ({})",
                    rule.id,
                    i + 1,
                    matcher.name()
                );

                let (prefix, suffix) = rule.redact.expect("catalog rules carry redact offsets");
                assert!(
                    prefix + suffix < case.len(),
                    "rule '{}' redact offsets {:?} exceed assert case {} length",
                    rule.id,
                    rule.redact,
                    i + 1
                );

                let entropy = shannon_entropy(&results[0].matched);
                assert!(
                    entropy >= rule.entropy,
                    "rule '{}' assert case {} entropy {entropy} below threshold {} ({})",
                    rule.id,
                    i + 1,
                    rule.entropy,
                    matcher.name()
                );
                assert!(results[0].entropy_met);

                // Redaction must hold for every emitted finding.
                for result in &results {
                    assert_ne!(result.redacted, result.matched);
                    assert!(result.redacted.contains('*'));
                }
            }
        }
    }
}

#[test]
fn assert_not_vectors_do_not_qualify() {
    let mut engines = vec![EngineChoice::Portable];
    if automaton_available() {
        engines.push(EngineChoice::Automaton);
    }

    for rule in load_default_rules().unwrap() {
        for choice in &engines {
            let matcher = compile_single(&rule, *choice);
            for (i, case) in rule.tests.assert_not.iter().enumerate() {
                let results = matcher.find_in_line(case);
                // A stray match is tolerable only below the entropy threshold.
                for result in results {
                    assert!(
                        !result.entropy_met,
                        "rule '{}' matched assert_not case {} with qualifying entropy {} ({})",
                        rule.id,
                        i + 1,
                        result.entropy,
                        matcher.name()
                    );
                }
            }
        }
    }
}

#[test]
fn spans_are_exact_on_every_assert_case() {
    for rule in load_default_rules().unwrap() {
        let matcher = compile_single(&rule, EngineChoice::Portable);
        for case in &rule.tests.assert {
            for result in matcher.find_in_line(case) {
                assert_eq!(
                    &case[result.start..result.end],
                    result.matched,
                    "rule '{}' span does not align with its match",
                    rule.id
                );
            }
        }
    }
}
