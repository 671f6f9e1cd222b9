//! User-declared regex rules from the `[[rules.custom]]` config section.

use super::{Category, Matcher, Rule, Severity};
use crate::errors::ConfigError;
use crate::tokenizer::FragmentKinds;
use crate::utils::config::CustomRuleConfig;
use regex::RegexBuilder;

/// Compiled patterns larger than this are rejected.
const PATTERN_SIZE_LIMIT: usize = 1 << 20;

pub fn compile(cfg: &CustomRuleConfig) -> Result<Rule, ConfigError> {
    let id = cfg.id.trim();
    if id.is_empty() {
        return Err(ConfigError::BadPattern {
            id: cfg.id.clone(),
            reason: "rule id must not be empty".into(),
        });
    }
    let category: Category = cfg.category.parse()?;
    let severity: Severity = cfg.severity.parse()?;

    let regex = RegexBuilder::new(&cfg.pattern)
        .case_insensitive(cfg.case_insensitive)
        .size_limit(PATTERN_SIZE_LIMIT)
        .build()
        .map_err(|e| ConfigError::BadPattern {
            id: id.to_owned(),
            reason: e.to_string(),
        })?;

    let description = if cfg.description.is_empty() {
        format!("Custom rule `{id}`")
    } else {
        cfg.description.clone()
    };

    Ok(Rule {
        id: id.to_owned(),
        category,
        severity,
        description,
        remediation: cfg.remediation.clone(),
        kinds: FragmentKinds::all(),
        matcher: Matcher::Pattern(regex),
    })
}

#[cfg(test)]
fn cfg(id: &str, category: &str, severity: &str, pattern: &str) -> CustomRuleConfig {
    CustomRuleConfig {
        id: id.into(),
        category: category.into(),
        severity: severity.into(),
        pattern: pattern.into(),
        description: String::new(),
        remediation: "don't".into(),
        case_insensitive: false,
    }
}

#[test]
fn compiles_valid_rule() {
    let rule = compile(&cfg("no_eval_shell", "command-injection", "high", r"eval\s*\(")).unwrap();
    assert_eq!(rule.category, Category::CommandInjection);
    assert_eq!(rule.severity, Severity::High);
    assert!(rule.description.contains("no_eval_shell"));
    assert!(matches!(rule.matcher, Matcher::Pattern(_)));
}

#[test]
fn rejects_bad_input() {
    assert!(matches!(
        compile(&cfg("x", "xss", "high", "a")),
        Err(ConfigError::UnknownCategory(_))
    ));
    assert!(matches!(
        compile(&cfg("x", "ssrf", "urgent", "a")),
        Err(ConfigError::UnknownSeverity(_))
    ));
    assert!(matches!(
        compile(&cfg("x", "ssrf", "low", "(unclosed")),
        Err(ConfigError::BadPattern { .. })
    ));
}

#[test]
fn registry_rejects_duplicate_ids() {
    let dup = cfg("cmd_shell_concat", "command-injection", "low", "x");
    assert_eq!(
        super::RuleRegistry::with_custom(&[dup]).unwrap_err(),
        ConfigError::DuplicateRuleId("cmd_shell_concat".into())
    );

    let ok = super::RuleRegistry::with_custom(&[cfg("mine", "ssrf", "low", "x")]).unwrap();
    assert_eq!(ok.len(), super::RuleRegistry::builtin().len() + 1);
    assert_eq!(ok.all_rules().last().unwrap().id, "mine");
}

#[test]
fn pattern_hit_maps_to_source_span() {
    let rule = compile(&cfg("dbg", "ssrf", "low", r"internal\.corp")).unwrap();
    let found = super::testing::hits_with(&rule, "a.js", "let a = 1;\nfetch(\"http://internal.corp/x\");\n", 1);
    assert_eq!(found, vec!["internal.corp"]);
}
