use crate::errors::{MalformedInputError, RuleEvaluationError};
use crate::rules::{Category, Severity};
use crate::tokenizer::Span;
use serde::Serialize;
use std::cmp::Reverse;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Finding {
    pub rule_id: String,
    pub category: Category,
    pub severity: Severity,
    pub path: PathBuf,
    pub line: usize,
    pub column: usize,
    #[serde(skip)]
    pub span: Span,
    pub matched_text: String,
    pub message: String,
    pub remediation: String,
    pub fingerprint: String,
}

impl Finding {
    /// Severity descending, then location, then rule id.
    fn sort_key(&self) -> (Reverse<Severity>, &Path, usize, usize, &str, &str) {
        (
            Reverse(self.severity),
            self.path.as_path(),
            self.line,
            self.column,
            &self.rule_id,
            &self.matched_text,
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum DiagnosticKind {
    MalformedInput,
    RuleEvaluation,
    Io,
}

/// A non-fatal problem met during a scan.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Diagnostic {
    pub path: PathBuf,
    pub line: Option<usize>,
    pub kind: DiagnosticKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rule_id: Option<String>,
    pub message: String,
}

impl Diagnostic {
    pub fn io(path: &Path, message: impl Into<String>) -> Diagnostic {
        Diagnostic {
            path: path.to_path_buf(),
            line: None,
            kind: DiagnosticKind::Io,
            rule_id: None,
            message: message.into(),
        }
    }
}

impl From<MalformedInputError> for Diagnostic {
    fn from(err: MalformedInputError) -> Self {
        Diagnostic {
            message: err.to_string(),
            path: err.path,
            line: None,
            kind: DiagnosticKind::MalformedInput,
            rule_id: None,
        }
    }
}

impl From<RuleEvaluationError> for Diagnostic {
    fn from(err: RuleEvaluationError) -> Self {
        Diagnostic {
            path: err.path,
            line: Some(err.line),
            kind: DiagnosticKind::RuleEvaluation,
            rule_id: Some(err.rule_id),
            message: err.message,
        }
    }
}

/// Everything one file contributed to a scan.
#[derive(Debug, Clone, PartialEq)]
pub struct FileOutcome {
    pub path: PathBuf,
    pub bytes: u64,
    /// The file was read and tokenized.
    pub scanned: bool,
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
}

impl FileOutcome {
    pub fn unreadable(path: &Path, diagnostic: Diagnostic) -> FileOutcome {
        FileOutcome {
            path: path.to_path_buf(),
            bytes: 0,
            scanned: false,
            findings: Vec::new(),
            diagnostics: vec![diagnostic],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Summary {
    pub total: usize,
    pub by_category: BTreeMap<Category, usize>,
    pub by_severity: BTreeMap<Severity, usize>,
    pub files_scanned: usize,
    pub files_with_findings: usize,
    pub bytes_scanned: u64,
}

impl Summary {
    pub fn count(&self, severity: Severity) -> usize {
        self.by_severity.get(&severity).copied().unwrap_or(0)
    }
}

/// Deterministic scan result. Identical inputs give identical reports
/// regardless of the order files were processed in.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Report {
    pub findings: Vec<Finding>,
    pub diagnostics: Vec<Diagnostic>,
    pub summary: Summary,
    pub cancelled: bool,
}

impl Report {
    pub fn build(outcomes: impl IntoIterator<Item = FileOutcome>, cancelled: bool) -> Report {
        let mut findings = Vec::new();
        let mut diagnostics = Vec::new();
        let mut files_scanned = 0;
        let mut files_with_findings = 0;
        let mut bytes_scanned = 0;

        for outcome in outcomes {
            if outcome.scanned {
                files_scanned += 1;
                bytes_scanned += outcome.bytes;
            }
            if !outcome.findings.is_empty() {
                files_with_findings += 1;
            }
            findings.extend(outcome.findings);
            diagnostics.extend(outcome.diagnostics);
        }

        findings.sort_by(|a, b| a.sort_key().cmp(&b.sort_key()));
        diagnostics.sort();

        let mut by_category: BTreeMap<Category, usize> =
            Category::ALL.into_iter().map(|c| (c, 0)).collect();
        let mut by_severity: BTreeMap<Severity, usize> =
            Severity::ALL.into_iter().map(|s| (s, 0)).collect();
        for f in &findings {
            *by_category.entry(f.category).or_default() += 1;
            *by_severity.entry(f.severity).or_default() += 1;
        }

        Report {
            summary: Summary {
                total: findings.len(),
                by_category,
                by_severity,
                files_scanned,
                files_with_findings,
                bytes_scanned,
            },
            findings,
            diagnostics,
            cancelled,
        }
    }

    /// Findings at or above `threshold`.
    pub fn reaches(&self, threshold: Severity) -> bool {
        self.findings.iter().any(|f| f.severity >= threshold)
    }
}

#[cfg(test)]
fn finding(rule: &str, sev: Severity, path: &str, line: usize) -> Finding {
    Finding {
        rule_id: rule.into(),
        category: Category::Ssrf,
        severity: sev,
        path: path.into(),
        line,
        column: 1,
        span: Span::new(line * 10, line * 10 + 5),
        matched_text: "x".into(),
        message: "m".into(),
        remediation: "r".into(),
        fingerprint: "f".into(),
    }
}

#[cfg(test)]
fn outcome(path: &str, findings: Vec<Finding>) -> FileOutcome {
    FileOutcome {
        path: path.into(),
        bytes: 10,
        scanned: true,
        findings,
        diagnostics: vec![],
    }
}

#[test]
fn ordering_is_total_and_independent_of_input_order() {
    let a = outcome(
        "b.go",
        vec![
            finding("r1", Severity::Low, "b.go", 3),
            finding("r2", Severity::Critical, "b.go", 9),
        ],
    );
    let b = outcome(
        "a.go",
        vec![
            finding("r1", Severity::High, "a.go", 7),
            finding("r0", Severity::High, "a.go", 7),
        ],
    );

    let one = Report::build(vec![a.clone(), b.clone()], false);
    let two = Report::build(vec![b, a], false);
    assert_eq!(one, two);

    let order: Vec<_> = one
        .findings
        .iter()
        .map(|f| (f.severity, f.path.to_str().unwrap(), f.rule_id.as_str()))
        .collect();
    assert_eq!(
        order,
        vec![
            (Severity::Critical, "b.go", "r2"),
            (Severity::High, "a.go", "r0"),
            (Severity::High, "a.go", "r1"),
            (Severity::Low, "b.go", "r1"),
        ]
    );
}

#[test]
fn summary_counts_every_category_and_severity() {
    let report = Report::build(
        vec![
            outcome("a.go", vec![finding("r", Severity::High, "a.go", 1)]),
            outcome("b.go", vec![]),
            FileOutcome::unreadable(Path::new("c.go"), Diagnostic::io(Path::new("c.go"), "nope")),
        ],
        false,
    );
    let s = &report.summary;
    assert_eq!(s.total, 1);
    assert_eq!(s.by_category.len(), Category::ALL.len());
    assert_eq!(s.by_category[&Category::Ssrf], 1);
    assert_eq!(s.by_category[&Category::WeakCrypto], 0);
    assert_eq!(s.count(Severity::High), 1);
    assert_eq!(s.count(Severity::Critical), 0);
    assert_eq!(s.files_scanned, 2);
    assert_eq!(s.files_with_findings, 1);
    assert_eq!(s.bytes_scanned, 20);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.reaches(Severity::High));
    assert!(!report.reaches(Severity::Critical));
}

#[test]
fn empty_scan_has_no_findings() {
    let report = Report::build(Vec::new(), false);
    assert!(report.findings.is_empty());
    assert_eq!(report.summary.total, 0);
    let json = serde_json::to_value(&report).unwrap();
    assert_eq!(json["summary"]["byCategory"]["sql-injection"], 0);
    assert_eq!(json["cancelled"], false);
}
