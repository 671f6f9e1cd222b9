//! 0-100 risk score with a letter grade.

use crate::report::Finding;
use crate::rules::{Category, Severity};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
pub enum Grade {
    A,
    B,
    C,
    D,
    F,
}

impl fmt::Display for Grade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Grade::A => "A",
            Grade::B => "B",
            Grade::C => "C",
            Grade::D => "D",
            Grade::F => "F",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    Safe,
    Low,
    Medium,
    High,
    Critical,
}

impl RiskLevel {
    pub fn as_str(self) -> &'static str {
        match self {
            RiskLevel::Safe => "safe",
            RiskLevel::Low => "low",
            RiskLevel::Medium => "medium",
            RiskLevel::High => "high",
            RiskLevel::Critical => "critical",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CategoryRisk {
    pub category: Category,
    pub weight: f64,
    pub count: usize,
    pub contribution: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskAssessment {
    pub score: u8,
    pub grade: Grade,
    pub level: RiskLevel,
    pub breakdown: Vec<CategoryRisk>,
    pub recommendation: &'static str,
}

pub fn severity_weight(severity: Severity) -> f64 {
    match severity {
        Severity::Critical => 25.0,
        Severity::High => 15.0,
        Severity::Medium => 5.0,
        Severity::Low => 2.0,
    }
}

pub fn category_weight(category: Category) -> f64 {
    match category {
        Category::CommandInjection => 1.5,
        Category::HardcodedSecret => 1.2,
        Category::SqlInjection
        | Category::PathTraversal
        | Category::Ssrf
        | Category::WeakCrypto => 1.0,
    }
}

pub fn assess(findings: &[Finding]) -> RiskAssessment {
    let mut per_category: BTreeMap<Category, (usize, f64)> = BTreeMap::new();
    let mut penalty = 0.0;
    for f in findings {
        let p = severity_weight(f.severity) * category_weight(f.category);
        penalty += p;
        let entry = per_category.entry(f.category).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += p;
    }

    let score = (100.0 - penalty).clamp(0.0, 100.0).round() as u8;
    let (grade, level, recommendation) = match score {
        90.. => (
            Grade::A,
            RiskLevel::Safe,
            "No significant issues found. Keep scanning as the code evolves.",
        ),
        75..=89 => (
            Grade::B,
            RiskLevel::Low,
            "Minor issues detected. Review the findings and apply the fixes before release.",
        ),
        50..=74 => (
            Grade::C,
            RiskLevel::Medium,
            "Significant vulnerabilities found. Resolve all high and critical findings before deploying.",
        ),
        25..=49 => (
            Grade::D,
            RiskLevel::High,
            "Severe security risks detected. The code needs an immediate security review.",
        ),
        _ => (
            Grade::F,
            RiskLevel::Critical,
            "Critical: the code is extremely vulnerable. Do not deploy it.",
        ),
    };

    let mut breakdown: Vec<CategoryRisk> = per_category
        .into_iter()
        .map(|(category, (count, p))| CategoryRisk {
            category,
            weight: category_weight(category),
            count,
            contribution: p.round() as u32,
        })
        .collect();
    breakdown.sort_by(|a, b| {
        b.contribution
            .cmp(&a.contribution)
            .then(a.category.cmp(&b.category))
    });

    RiskAssessment {
        score,
        grade,
        level,
        breakdown,
        recommendation,
    }
}

#[cfg(test)]
fn f(category: Category, severity: Severity) -> Finding {
    Finding {
        rule_id: "r".into(),
        category,
        severity,
        path: "a".into(),
        line: 1,
        column: 1,
        span: Default::default(),
        matched_text: String::new(),
        message: String::new(),
        remediation: String::new(),
        fingerprint: String::new(),
    }
}

#[test]
fn clean_code_scores_a() {
    let r = assess(&[]);
    assert_eq!(r.score, 100);
    assert_eq!(r.grade, Grade::A);
    assert_eq!(r.level, RiskLevel::Safe);
    assert!(r.breakdown.is_empty());
}

#[test]
fn weights_combine_per_finding() {
    // 25 * 1.5 + 15 * 1.0 + 2 * 1.0 = 54.5
    let r = assess(&[
        f(Category::CommandInjection, Severity::Critical),
        f(Category::Ssrf, Severity::High),
        f(Category::WeakCrypto, Severity::Low),
    ]);
    assert_eq!(r.score, 46);
    assert_eq!(r.grade, Grade::D);
    assert_eq!(r.level, RiskLevel::High);
    assert_eq!(r.breakdown[0].category, Category::CommandInjection);
    assert_eq!(r.breakdown[0].contribution, 38);
    assert_eq!(r.breakdown.last().unwrap().category, Category::WeakCrypto);
}

#[test]
fn score_never_goes_negative() {
    let many: Vec<_> = (0..10)
        .map(|_| f(Category::CommandInjection, Severity::Critical))
        .collect();
    let r = assess(&many);
    assert_eq!(r.score, 0);
    assert_eq!(r.grade, Grade::F);
}

#[test]
fn grade_boundaries() {
    // one medium secret: 100 - 6 = 94
    assert_eq!(assess(&[f(Category::HardcodedSecret, Severity::Medium)]).grade, Grade::A);
    // one high command injection: 100 - 22.5 = 77.5 -> 78
    let b = assess(&[f(Category::CommandInjection, Severity::High)]);
    assert_eq!((b.score, b.grade), (78, Grade::B));
}

#[test]
fn sql_injection_is_not_weighted() {
    let r = assess(&[f(Category::SqlInjection, Severity::Critical)]);
    assert_eq!(r.breakdown[0].weight, 1.0);
    assert_eq!((r.score, r.grade), (75, Grade::B));
}
