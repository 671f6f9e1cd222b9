use super::RenderOptions;
use crate::errors::SiftResult;
use crate::report::Report;
use crate::risk::{self, Grade};
use crate::rules::Severity;
use bytesize::ByteSize;
use chrono::{DateTime, Local};
use console::style;
use std::io::Write;

pub fn write<W: Write>(report: &Report, opts: &RenderOptions, out: &mut W) -> SiftResult<()> {
    let limit = opts
        .max_results
        .map_or(report.findings.len(), |n| n as usize);

    for f in report.findings.iter().take(limit) {
        writeln!(
            out,
            "{}:{}:{}  [{}]  {}",
            style(f.path.display()).blue().underlined(),
            f.line,
            f.column,
            f.severity,
            style(&f.rule_id).bold(),
        )?;
        writeln!(out, "    {}", style(&f.matched_text).dim())?;
        writeln!(out, "    {}", f.message)?;
        if !f.remediation.is_empty() {
            writeln!(out, "    {} {}", style("fix:").green(), f.remediation)?;
        }
    }
    if limit < report.findings.len() {
        writeln!(
            out,
            "  {}",
            style(format!(
                "… {} more not shown (max_results = {limit})",
                report.findings.len() - limit
            ))
            .dim()
        )?;
    }

    if opts.quiet {
        return Ok(());
    }

    for d in &report.diagnostics {
        let at = d.line.map(|l| format!(":{l}")).unwrap_or_default();
        writeln!(
            out,
            "{}: {}{at}: {}",
            style("warning").yellow().bold(),
            d.path.display(),
            d.message
        )?;
    }

    let s = &report.summary;
    writeln!(out)?;
    if s.total == 0 {
        writeln!(out, "{}", style("∅ No issues found").green())?;
    } else {
        writeln!(
            out,
            "{} {} in {} of {} files",
            style(s.total).bold(),
            if s.total == 1 { "issue" } else { "issues" },
            s.files_with_findings,
            s.files_scanned,
        )?;
        let counts: Vec<String> = Severity::ALL
            .into_iter()
            .filter(|sev| s.count(*sev) > 0)
            .map(|sev| format!("{} {}", sev, s.count(sev)))
            .collect();
        writeln!(out, "  {}", counts.join("  "))?;
    }
    writeln!(
        out,
        "  {:10} {}",
        style("Scanned"),
        ByteSize::b(s.bytes_scanned)
    )?;

    let assessment = risk::assess(&report.findings);
    let grade = match assessment.grade {
        Grade::A | Grade::B => style(assessment.grade.to_string()).green().bold(),
        Grade::C => style(assessment.grade.to_string()).yellow().bold(),
        Grade::D | Grade::F => style(assessment.grade.to_string()).red().bold(),
    };
    writeln!(
        out,
        "  {:10} {}/100  grade {}  ({} risk)",
        style("Risk"),
        assessment.score,
        grade,
        assessment.level.as_str()
    )?;
    for c in &assessment.breakdown {
        writeln!(
            out,
            "    {:18} {:>3} finding(s)  -{}",
            c.category.as_str(),
            c.count,
            c.contribution
        )?;
    }
    writeln!(out, "  {}", style(assessment.recommendation).italic())?;

    if report.cancelled {
        writeln!(
            out,
            "{}",
            style("Scan cancelled; results are partial.").yellow()
        )?;
    }

    let now: DateTime<Local> = Local::now();
    writeln!(
        out,
        "  {:10} {}",
        style("Completed"),
        now.format("%Y-%m-%d %H:%M:%S")
    )?;
    Ok(())
}

#[cfg(test)]
fn render(report: &Report, opts: &RenderOptions) -> String {
    console::set_colors_enabled(false);
    let mut buf = Vec::new();
    write(report, opts, &mut buf).unwrap();
    String::from_utf8(buf).unwrap()
}

#[cfg(test)]
fn sample() -> Report {
    use crate::engine::{Engine, ScanOptions};
    use crate::rules::RuleRegistry;
    use crate::source::SourceUnit;

    let engine = Engine::new(RuleRegistry::builtin(), ScanOptions::default()).unwrap();
    engine.scan_units(&[SourceUnit::from_text(
        "app.py",
        "import hashlib\nh = hashlib.md5(data)\nos.system(\"rm -rf \" + target)\n",
    )])
}

#[test]
fn prints_findings_and_summary() {
    let text = render(&sample(), &RenderOptions::default());
    assert!(text.contains("app.py:3:1  [HIGH]  cmd_shell_concat"), "{text}");
    assert!(text.contains("app.py:2:"), "{text}");
    assert!(text.contains("2 issues in 1 of 1 files"), "{text}");
    assert!(text.contains("Risk"));
    assert!(text.contains("Completed"));
}

#[test]
fn quiet_and_max_results_trim_output() {
    let text = render(
        &sample(),
        &RenderOptions {
            quiet: true,
            max_results: Some(1),
        },
    );
    assert!(text.contains("cmd_shell_concat"));
    assert!(!text.contains("crypto_weak_hash"));
    assert!(text.contains("1 more not shown"));
    assert!(!text.contains("Risk"));
}

#[test]
fn clean_report_says_so() {
    let text = render(&Report::build(Vec::new(), false), &RenderOptions::default());
    assert!(text.contains("No issues found"));
    assert!(text.contains("100/100"));
}
