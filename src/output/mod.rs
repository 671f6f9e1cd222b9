pub mod console;
pub mod json;
pub mod sarif;

use crate::errors::{ConfigError, SiftResult};
use crate::report::Report;
use crate::rules::RuleRegistry;
use std::fmt;
use std::io::Write;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Console,
    Json,
    Sarif,
}

impl OutputFormat {
    pub fn as_str(self) -> &'static str {
        match self {
            OutputFormat::Console => "console",
            OutputFormat::Json => "json",
            OutputFormat::Sarif => "sarif",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputFormat {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "console" | "text" => Ok(OutputFormat::Console),
            "json" => Ok(OutputFormat::Json),
            "sarif" => Ok(OutputFormat::Sarif),
            _ => Err(ConfigError::UnknownFormat(s.to_owned())),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct RenderOptions {
    /// Findings only, no summary footer. Console only.
    pub quiet: bool,
    /// Cap on printed findings. Console only; machine formats stay complete.
    pub max_results: Option<u32>,
}

/// Write `report` to `out` in `format`.
pub fn render<W: Write>(
    format: OutputFormat,
    report: &Report,
    registry: &RuleRegistry,
    opts: &RenderOptions,
    out: &mut W,
) -> SiftResult<()> {
    match format {
        OutputFormat::Console => console::write(report, opts, out),
        OutputFormat::Json => json::write(report, out),
        OutputFormat::Sarif => sarif::write(report, registry, out),
    }
}

#[test]
fn format_names_parse() {
    assert_eq!("JSON".parse::<OutputFormat>().unwrap(), OutputFormat::Json);
    assert_eq!("sarif".parse::<OutputFormat>().unwrap(), OutputFormat::Sarif);
    assert_eq!(
        "xml".parse::<OutputFormat>(),
        Err(ConfigError::UnknownFormat("xml".into()))
    );
    assert_eq!(OutputFormat::default().to_string(), "console");
}
