use std::path::{Path, PathBuf};
use vulnsift::{CancelToken, Category, Engine, Report, RuleRegistry, ScanOptions, Severity, SourceUnit};

fn fixture(rel: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures").join(rel)
}

fn scan(rel: &str, window_width: usize) -> Report {
    let engine = Engine::new(
        RuleRegistry::builtin(),
        ScanOptions {
            window_width,
            ..ScanOptions::default()
        },
    )
    .unwrap();
    let unit = SourceUnit::load(&fixture(rel)).unwrap();
    engine.scan_units(&[unit])
}

fn summary(report: &Report) -> Vec<(usize, Category, Severity)> {
    let mut v: Vec<_> = report
        .findings
        .iter()
        .map(|f| (f.line, f.category, f.severity))
        .collect();
    v.sort();
    v
}

#[test]
fn go_sample_hits_every_category_once() {
    let report = scan("red-team/go/vulnerable-skill.go", 1);
    assert_eq!(
        summary(&report),
        vec![
            (13, Category::CommandInjection, Severity::High),
            (17, Category::SqlInjection, Severity::High),
            (22, Category::PathTraversal, Severity::High),
            (26, Category::Ssrf, Severity::High),
            (29, Category::HardcodedSecret, Severity::Critical),
            (34, Category::WeakCrypto, Severity::Medium),
        ]
    );
    assert!(report.diagnostics.is_empty());
    for c in Category::ALL {
        assert_eq!(report.summary.by_category[&c], 1, "{c}");
    }
}

#[test]
fn go_sample_wider_window_links_query_to_execution() {
    let report = scan("red-team/go/vulnerable-skill.go", 2);
    let sql: Vec<_> = report
        .findings
        .iter()
        .filter(|f| f.category == Category::SqlInjection)
        .collect();
    assert_eq!(sql.len(), 1);
    assert_eq!(sql[0].rule_id, "sql_built_then_executed");
    assert_eq!(sql[0].severity, Severity::Critical);
    assert_eq!(sql[0].line, 17);
}

#[test]
fn python_sample_ignores_out_of_scope_calls() {
    let report = scan("red-team/python/vulnerable-skill.py", 1);
    assert_eq!(
        summary(&report),
        vec![
            (11, Category::CommandInjection, Severity::High),
            (15, Category::CommandInjection, Severity::High),
            (33, Category::SqlInjection, Severity::High),
            (37, Category::HardcodedSecret, Severity::Critical),
        ]
    );
    let ids: Vec<_> = report.findings.iter().map(|f| f.rule_id.as_str()).collect();
    assert!(ids.contains(&"cmd_shell_flag"));
    assert!(ids.contains(&"secret_token_prefix"));
}

#[test]
fn rust_sample_needs_a_window_for_the_built_path() {
    let narrow = scan("red-team/rust/vulnerable-skill.rs", 1);
    assert!(
        !narrow
            .findings
            .iter()
            .any(|f| f.category == Category::PathTraversal)
    );

    let wide = scan("red-team/rust/vulnerable-skill.rs", 2);
    let cats: Vec<_> = wide.findings.iter().map(|f| f.category).collect();
    assert!(cats.contains(&Category::CommandInjection));
    assert!(cats.contains(&Category::PathTraversal));
    assert!(cats.contains(&Category::HardcodedSecret));
    assert_eq!(wide.findings[0].severity, Severity::Critical);
    assert_eq!(wide.findings[0].line, 26);
}

#[test]
fn parameterized_queries_are_clean() {
    let report = scan("clean/safe.go", 3);
    assert!(report.findings.is_empty(), "{:?}", report.findings);
    assert_eq!(report.summary.files_scanned, 1);
}

#[test]
fn whole_fixture_tree_through_the_walker() {
    let cfg = vulnsift::utils::Config::default();
    let report = vulnsift::commands::scan::scan_filesystem(
        &fixture(""),
        RuleRegistry::builtin(),
        ScanOptions::default(),
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.summary.files_scanned, 4);
    assert_eq!(report.summary.files_with_findings, 3);
    assert!(report.reaches(Severity::Critical));
    // critical first
    assert!(report.findings[..3].iter().all(|f| f.severity == Severity::Critical));
}
