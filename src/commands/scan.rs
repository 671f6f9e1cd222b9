use super::Status;
use crate::engine::{CancelToken, Engine, ScanOptions};
use crate::errors::SiftResult;
use crate::output::{self, OutputFormat, RenderOptions};
use crate::report::Report;
use crate::rules::{RuleRegistry, Severity};
use crate::utils::config::Config;
use crate::walk::spawn_senders;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Entry point called by the CLI.
pub fn handle(path: &str, config: &Config) -> SiftResult<Status> {
    // Everything configurable is validated before the walk starts.
    let format: OutputFormat = config.output.default_format.parse()?;
    let fail_on: Severity = config.output.fail_on.parse()?;
    let options = ScanOptions::from_config(&config.scanner)?;
    let registry = RuleRegistry::with_custom(&config.rules.custom)?;

    let report = scan_filesystem(Path::new(path), &registry, options, config, &CancelToken::new())?;

    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    output::render(
        format,
        &report,
        &registry,
        &RenderOptions {
            quiet: config.output.quiet,
            max_results: config.output.max_results,
        },
        &mut out,
    )?;
    out.flush()?;

    Ok(if report.reaches(fail_on) {
        Status::Failed
    } else {
        Status::Clean
    })
}

// --------------------------------------------------------------------------------------------
// Scanning helpers
// --------------------------------------------------------------------------------------------

pub fn scan_filesystem(
    root: &Path,
    registry: &RuleRegistry,
    options: ScanOptions,
    cfg: &Config,
    cancel: &CancelToken,
) -> SiftResult<Report> {
    // An unreadable root is fatal; unreadable files below it are diagnostics.
    fs::metadata(root)?;

    let engine = Engine::new(registry, options)?;
    tracing::debug!(
        "scanning {} with {} rules",
        root.display(),
        engine.enabled_rules().count()
    );

    let rx = spawn_senders(root, cfg)?;
    let report = engine.scan_paths(rx.into_iter().flatten().map(display_path), cancel);

    tracing::info!(
        files = report.summary.files_scanned,
        findings = report.summary.total,
        diagnostics = report.diagnostics.len(),
        "scan complete"
    );
    for d in &report.diagnostics {
        tracing::warn!("{}: {}", d.path.display(), d.message);
    }
    Ok(report)
}

/// `./src/a.go` → `src/a.go`
fn display_path(p: PathBuf) -> PathBuf {
    match p.strip_prefix(".") {
        Ok(rel) if !rel.as_os_str().is_empty() => rel.to_path_buf(),
        _ => p,
    }
}

#[cfg(test)]
fn fixture() -> tempfile::TempDir {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    fs::create_dir_all(root.join("svc")).unwrap();
    fs::write(
        root.join("svc/run.go"),
        "package svc\n\nfunc Run(userInput string) {\n\texec.Command(\"sh\", \"-c\", \"ls -la \"+userInput).Run()\n}\n",
    )
    .unwrap();
    fs::write(
        root.join("svc/db.go"),
        "func Find(db *sql.DB, id string) {\n\tdb.Query(\"SELECT * FROM users WHERE id = ?\", id)\n}\n",
    )
    .unwrap();
    fs::write(root.join("svc/blob.rs"), [0x66u8, 0x6e, 0x00, 0xff, 0xfe]).unwrap();
    dir
}

#[test]
fn scans_a_tree_end_to_end() {
    let dir = fixture();
    let cfg = Config::default();
    let report = scan_filesystem(
        dir.path(),
        RuleRegistry::builtin(),
        ScanOptions::default(),
        &cfg,
        &CancelToken::new(),
    )
    .unwrap();

    assert_eq!(report.findings.len(), 1);
    assert_eq!(report.findings[0].rule_id, "cmd_shell_concat");
    assert!(report.findings[0].path.ends_with("svc/run.go"));
    assert_eq!(report.summary.files_scanned, 2);
    assert_eq!(report.diagnostics.len(), 1);
    assert!(report.reaches(Severity::High));
    assert!(!report.cancelled);
}

#[test]
fn missing_root_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let err = scan_filesystem(
        &dir.path().join("nope"),
        RuleRegistry::builtin(),
        ScanOptions::default(),
        &Config::default(),
        &CancelToken::new(),
    );
    assert!(matches!(err, Err(crate::errors::SiftError::Io(_))));
}

#[test]
fn cancelled_scan_reports_partial_results() {
    let dir = fixture();
    let cancel = CancelToken::new();
    cancel.cancel();
    let report = scan_filesystem(
        dir.path(),
        RuleRegistry::builtin(),
        ScanOptions::default(),
        &Config::default(),
        &cancel,
    )
    .unwrap();
    assert!(report.cancelled);
    assert!(report.findings.is_empty());
}

#[test]
fn bad_configuration_fails_before_scanning() {
    let mut cfg = Config::default();
    cfg.scanner.window_width = 0;
    assert!(handle(".", &cfg).is_err());

    let mut cfg = Config::default();
    cfg.output.default_format = "xml".into();
    assert!(handle(".", &cfg).is_err());
}

#[test]
fn dot_prefix_is_dropped() {
    assert_eq!(display_path(PathBuf::from("./src/a.go")), PathBuf::from("src/a.go"));
    assert_eq!(display_path(PathBuf::from("/abs/a.go")), PathBuf::from("/abs/a.go"));
}
