//! SARIF 2.1.0 log for code-scanning integrations.

use crate::errors::SiftResult;
use crate::report::{Finding, Report};
use crate::rules::{RuleRegistry, Severity};
use serde::Serialize;
use std::collections::BTreeSet;
use std::io::Write;

const SCHEMA: &str = "https://json.schemastore.org/sarif-2.1.0.json";

#[derive(Debug, Serialize)]
struct SarifLog {
    #[serde(rename = "$schema")]
    schema: &'static str,
    version: &'static str,
    runs: Vec<Run>,
}

#[derive(Debug, Serialize)]
struct Run {
    tool: Tool,
    results: Vec<SarifResult>,
}

#[derive(Debug, Serialize)]
struct Tool {
    driver: Driver,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Driver {
    name: &'static str,
    semantic_version: &'static str,
    rules: Vec<Descriptor>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Descriptor {
    id: String,
    short_description: Message,
    help: Message,
    default_configuration: Configuration,
    properties: Properties,
}

#[derive(Debug, Serialize)]
struct Configuration {
    level: Level,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Properties {
    tags: Vec<String>,
    security_severity: &'static str,
}

#[derive(Debug, Serialize)]
struct Message {
    text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
enum Level {
    Error,
    Warning,
    Note,
}

impl From<Severity> for Level {
    fn from(s: Severity) -> Self {
        match s {
            Severity::Critical | Severity::High => Level::Error,
            Severity::Medium => Level::Warning,
            Severity::Low => Level::Note,
        }
    }
}

/// GitHub's numeric severity bands.
fn security_severity(s: Severity) -> &'static str {
    match s {
        Severity::Critical => "9.5",
        Severity::High => "8.0",
        Severity::Medium => "5.0",
        Severity::Low => "2.0",
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SarifResult {
    rule_id: String,
    rule_index: usize,
    level: Level,
    message: Message,
    locations: Vec<Location>,
    partial_fingerprints: PartialFingerprints,
}

#[derive(Debug, Serialize)]
struct PartialFingerprints {
    #[serde(rename = "vulnsift/v1")]
    primary: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Location {
    physical_location: PhysicalLocation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PhysicalLocation {
    artifact_location: ArtifactLocation,
    region: Region,
}

#[derive(Debug, Serialize)]
struct ArtifactLocation {
    uri: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct Region {
    start_line: usize,
    start_column: usize,
    snippet: Message,
}

fn uri(f: &Finding) -> String {
    f.path.to_string_lossy().replace('\\', "/")
}

fn build(report: &Report, registry: &RuleRegistry) -> SarifLog {
    let fired: BTreeSet<&str> = report.findings.iter().map(|f| f.rule_id.as_str()).collect();
    let ids: Vec<&str> = fired.into_iter().collect();

    let rules = ids
        .iter()
        .filter_map(|id| report.findings.iter().find(|f| f.rule_id == *id))
        .map(|f| {
            let (description, remediation) = match registry.get(&f.rule_id) {
                Some(r) => (r.description.clone(), r.remediation.clone()),
                None => (f.message.clone(), f.remediation.clone()),
            };
            Descriptor {
                id: f.rule_id.clone(),
                short_description: Message { text: description },
                help: Message { text: remediation },
                default_configuration: Configuration {
                    level: f.severity.into(),
                },
                properties: Properties {
                    tags: ["security", f.category.as_str()]
                        .into_iter()
                        .map(String::from)
                        .chain(f.category.owasp_llm().iter().map(|id| format!("OWASP-{id}")))
                        .collect(),
                    security_severity: security_severity(f.severity),
                },
            }
        })
        .collect();

    let results = report
        .findings
        .iter()
        .map(|f| SarifResult {
            rule_id: f.rule_id.clone(),
            rule_index: ids.binary_search(&f.rule_id.as_str()).unwrap_or_default(),
            level: f.severity.into(),
            message: Message {
                text: f.message.clone(),
            },
            locations: vec![Location {
                physical_location: PhysicalLocation {
                    artifact_location: ArtifactLocation { uri: uri(f) },
                    region: Region {
                        start_line: f.line,
                        start_column: f.column,
                        snippet: Message {
                            text: f.matched_text.clone(),
                        },
                    },
                },
            }],
            partial_fingerprints: PartialFingerprints {
                primary: f.fingerprint.clone(),
            },
        })
        .collect();

    SarifLog {
        schema: SCHEMA,
        version: "2.1.0",
        runs: vec![Run {
            tool: Tool {
                driver: Driver {
                    name: env!("CARGO_PKG_NAME"),
                    semantic_version: env!("CARGO_PKG_VERSION"),
                    rules,
                },
            },
            results,
        }],
    }
}

pub fn write<W: Write>(report: &Report, registry: &RuleRegistry, out: &mut W) -> SiftResult<()> {
    let log = build(report, registry);
    tracing::debug!(
        "sarif: {} rule descriptors, {} results",
        log.runs[0].tool.driver.rules.len(),
        log.runs[0].results.len()
    );
    serde_json::to_writer_pretty(&mut *out, &log)?;
    writeln!(out)?;
    Ok(())
}

#[test]
fn sarif_describes_fired_rules_and_results() {
    use crate::engine::{Engine, ScanOptions};
    use crate::source::SourceUnit;

    let registry = RuleRegistry::builtin();
    let engine = Engine::new(registry, ScanOptions::default()).unwrap();
    let report = engine.scan_units(&[
        SourceUnit::from_text(
            "cmd/run.go",
            "func run(userInput string) {\n\texec.Command(\"sh\", \"-c\", \"ls -la \"+userInput).Run()\n}\n",
        ),
        SourceUnit::from_text("hash.go", "sum := md5.Sum(data)\n"),
    ]);
    assert_eq!(report.findings.len(), 2);

    let mut buf = Vec::new();
    write(&report, registry, &mut buf).unwrap();
    let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();

    assert_eq!(v["version"], "2.1.0");
    let run = &v["runs"][0];
    assert_eq!(run["tool"]["driver"]["name"], "vulnsift");

    let rules = run["tool"]["driver"]["rules"].as_array().unwrap();
    let ids: Vec<&str> = rules.iter().map(|r| r["id"].as_str().unwrap()).collect();
    assert_eq!(ids, vec!["cmd_shell_concat", "crypto_weak_hash"]);
    assert_eq!(
        rules[0]["properties"]["tags"],
        serde_json::json!(["security", "command-injection", "OWASP-LLM05", "OWASP-LLM06"])
    );
    assert_eq!(
        rules[1]["properties"]["tags"],
        serde_json::json!(["security", "weak-crypto", "OWASP-LLM06"])
    );

    let results = run["results"].as_array().unwrap();
    assert_eq!(results[0]["ruleId"], "cmd_shell_concat");
    assert_eq!(results[0]["ruleIndex"], 0);
    assert_eq!(results[0]["level"], "error");
    let region = &results[0]["locations"][0]["physicalLocation"]["region"];
    assert_eq!(region["startLine"], 2);
    assert_eq!(region["startColumn"], 2);
    assert_eq!(
        results[0]["locations"][0]["physicalLocation"]["artifactLocation"]["uri"],
        "cmd/run.go"
    );
    assert_eq!(
        results[0]["partialFingerprints"]["vulnsift/v1"],
        report.findings[0].fingerprint.as_str()
    );
    assert_eq!(results[1]["level"], "note");
    assert_eq!(results[1]["ruleIndex"], 1);
}
