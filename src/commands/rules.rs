use super::Status;
use crate::errors::SiftResult;
use crate::rules::{Category, Rule, RuleRegistry};
use crate::utils::config::Config;
use console::style;
use std::io::Write;

pub fn handle(category: Option<&str>, verbose: bool, config: &Config) -> SiftResult<Status> {
    let only: Option<Category> = category.map(str::parse::<Category>).transpose()?;
    let registry = RuleRegistry::with_custom(&config.rules.custom)?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    list(&registry, only, verbose, &mut out)?;
    out.flush()?;
    Ok(Status::Clean)
}

fn list<W: Write>(
    registry: &RuleRegistry,
    only: Option<Category>,
    verbose: bool,
    out: &mut W,
) -> SiftResult<()> {
    for category in Category::ALL {
        if only.is_some_and(|c| c != category) {
            continue;
        }
        let rules: Vec<&Rule> = registry.rules_for(category);
        writeln!(
            out,
            "{} ({})",
            style(category).blue().bold().underlined(),
            rules.len()
        )?;
        if rules.is_empty() {
            writeln!(out, "  {}", style("∅ No rules").dim())?;
        }
        for rule in rules {
            writeln!(
                out,
                "  {:32} [{}]",
                style(&rule.id).white().bold(),
                rule.severity
            )?;
            if verbose {
                writeln!(out, "    {:12} {}", style("Detects"), rule.description)?;
                if !rule.remediation.is_empty() {
                    writeln!(out, "    {:12} {}", style("Fix"), rule.remediation)?;
                }
            }
        }
    }
    Ok(())
}

#[cfg(test)]
fn listing(only: Option<Category>, verbose: bool) -> String {
    console::set_colors_enabled(false);
    let mut buf = Vec::new();
    list(RuleRegistry::builtin(), only, verbose, &mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[test]
fn lists_every_category() {
    let text = listing(None, false);
    for c in Category::ALL {
        assert!(text.contains(c.as_str()), "{c} missing");
    }
    assert!(text.contains("sql_exec_dynamic"));
    assert!(!text.contains("Detects"));
}

#[test]
fn filters_by_category_and_shows_details() {
    let text = listing(Some(Category::WeakCrypto), true);
    assert!(text.contains("crypto_weak_hash"));
    assert!(!text.contains("cmd_shell_concat"));
    assert!(text.contains("Detects"));
}

#[test]
fn unknown_category_is_a_config_error() {
    assert!(matches!(
        handle(Some("xss"), false, &Config::default()),
        Err(crate::errors::SiftError::Config(_))
    ));
}
