use std::path::PathBuf;
use thiserror::Error;

pub type SiftResult<T, E = SiftError> = core::result::Result<T, E>;

#[derive(Debug, Error)]
pub enum SiftError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("config parse error: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Malformed(#[from] MalformedInputError),

    #[error("other: {0}")]
    Other(String),
}

impl From<&str> for SiftError {
    fn from(msg: &str) -> Self {
        SiftError::Other(msg.to_owned())
    }
}

/// Invalid option values. Always raised before the first file is read.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("unknown rule category `{0}`")]
    UnknownCategory(String),

    #[error("unknown severity `{0}` (expected low, medium, high or critical)")]
    UnknownSeverity(String),

    #[error("unknown output format `{0}` (expected console, json or sarif)")]
    UnknownFormat(String),

    #[error("window width must be a positive number of statements")]
    ZeroWindowWidth,

    #[error("no rule categories enabled")]
    NoCategories,

    #[error("custom rule `{id}` has an invalid pattern: {reason}")]
    BadPattern { id: String, reason: String },

    #[error("duplicate rule id `{0}`")]
    DuplicateRuleId(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MalformedReason {
    /// Bytes after `valid_up_to` are not UTF-8.
    InvalidUtf8 { valid_up_to: usize },
    Binary,
}

/// Unreadable source content. Fatal for that one file only.
#[derive(Debug, Clone, Error, PartialEq)]
pub struct MalformedInputError {
    pub path: PathBuf,
    pub reason: MalformedReason,
}

impl std::fmt::Display for MalformedInputError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.reason {
            MalformedReason::InvalidUtf8 { valid_up_to } => write!(
                f,
                "{}: invalid UTF-8 after byte {valid_up_to}",
                self.path.display()
            ),
            MalformedReason::Binary => write!(f, "{}: binary content", self.path.display()),
        }
    }
}

/// A matcher failed on one window. Recorded, never propagated.
#[derive(Debug, Clone, Error, PartialEq)]
#[error("rule `{rule_id}` failed at {}:{line}: {message}", .path.display())]
pub struct RuleEvaluationError {
    pub rule_id: String,
    pub path: PathBuf,
    pub line: usize,
    pub message: String,
}

#[test]
fn malformed_input_display_names_path_and_offset() {
    let err = MalformedInputError {
        path: PathBuf::from("a/b.go"),
        reason: MalformedReason::InvalidUtf8 { valid_up_to: 12 },
    };
    assert_eq!(err.to_string(), "a/b.go: invalid UTF-8 after byte 12");

    let bin = MalformedInputError {
        path: PathBuf::from("x.rs"),
        reason: MalformedReason::Binary,
    };
    assert!(bin.to_string().contains("binary"));
}

#[test]
fn config_error_converts_into_sift_error() {
    let err: SiftError = ConfigError::UnknownCategory("xss".into()).into();
    assert!(matches!(err, SiftError::Config(ConfigError::UnknownCategory(ref c)) if c == "xss"));
    assert_eq!(
        err.to_string(),
        "configuration error: unknown rule category `xss`"
    );
}
