use crate::errors::SiftResult;
use crate::report::Report;
use crate::risk::{self, RiskAssessment};
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct JsonReport<'a> {
    tool: &'static str,
    version: &'static str,
    #[serde(flatten)]
    report: &'a Report,
    risk: RiskAssessment,
}

pub fn write<W: Write>(report: &Report, out: &mut W) -> SiftResult<()> {
    let doc = JsonReport {
        tool: env!("CARGO_PKG_NAME"),
        version: env!("CARGO_PKG_VERSION"),
        report,
        risk: risk::assess(&report.findings),
    };
    serde_json::to_writer_pretty(&mut *out, &doc)?;
    writeln!(out)?;
    Ok(())
}

#[test]
fn json_carries_report_and_risk() {
    let report = Report::build(Vec::new(), false);
    let mut buf = Vec::new();
    write(&report, &mut buf).unwrap();

    let v: serde_json::Value = serde_json::from_slice(&buf).unwrap();
    assert_eq!(v["tool"], "vulnsift");
    assert_eq!(v["findings"], serde_json::json!([]));
    assert_eq!(v["summary"]["total"], 0);
    assert_eq!(v["risk"]["score"], 100);
    assert_eq!(v["risk"]["grade"], "A");
    assert_eq!(v["risk"]["level"], "safe");
}
