use crate::errors::{MalformedInputError, MalformedReason, SiftResult};
use crate::tokenizer::Fragments;
use std::path::{Path, PathBuf};

/// Coarse language family, enough to pick comment and literal syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lang {
    Rust,
    Go,
    Python,
    JavaScript,
    TypeScript,
    Java,
    C,
    Cpp,
    Php,
    Ruby,
    Shell,
}

impl Lang {
    pub fn from_path(path: &Path) -> Option<Lang> {
        lowercase_ext(path).map(|ext| match ext {
            "rs" => Lang::Rust,
            "go" => Lang::Go,
            "py" => Lang::Python,
            "js" => Lang::JavaScript,
            "ts" => Lang::TypeScript,
            "java" => Lang::Java,
            "c" => Lang::C,
            "cpp" => Lang::Cpp,
            "php" => Lang::Php,
            "rb" => Lang::Ruby,
            _ => Lang::Shell,
        })
    }

    /// `#` starts a line comment.
    pub fn hash_comments(self) -> bool {
        matches!(self, Lang::Python | Lang::Ruby | Lang::Shell | Lang::Php)
    }

    /// `'a` may be a lifetime or label rather than a char literal.
    pub fn has_lifetimes(self) -> bool {
        matches!(self, Lang::Rust)
    }
}

pub fn lowercase_ext(path: &Path) -> Option<&'static str> {
    path.extension().and_then(|s| match s.to_str()?.to_ascii_lowercase().as_str() {
        "rs" => Some("rs"),
        "go" => Some("go"),
        "py" | "pyw" => Some("py"),
        "js" | "jsx" | "mjs" | "cjs" => Some("js"),
        "ts" | "tsx" | "mts" | "cts" => Some("ts"),
        "java" | "kt" => Some("java"),
        "c" | "h" => Some("c"),
        "cpp" | "c++" | "cc" | "hpp" => Some("cpp"),
        "php" => Some("php"),
        "rb" => Some("rb"),
        "sh" | "bash" => Some("sh"),
        _ => None,
    })
}

/// One file's text plus its identity. Immutable once loaded.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceUnit {
    path: PathBuf,
    text: String,
    lang: Lang,
}

impl SourceUnit {
    /// Read `path` fully and decode it. The file handle is released before
    /// returning.
    pub fn load(path: &Path) -> SiftResult<SourceUnit> {
        let bytes = std::fs::read(path)?;
        Ok(SourceUnit::from_bytes(path, bytes)?)
    }

    pub fn from_bytes(path: &Path, bytes: Vec<u8>) -> Result<SourceUnit, MalformedInputError> {
        // Fast binary-file guard (reject if >1% NULs)
        let nuls = bytes.iter().filter(|b| **b == 0).count();
        if nuls * 100 > bytes.len() {
            return Err(MalformedInputError {
                path: path.to_path_buf(),
                reason: MalformedReason::Binary,
            });
        }

        let text = String::from_utf8(bytes).map_err(|e| MalformedInputError {
            path: path.to_path_buf(),
            reason: MalformedReason::InvalidUtf8 {
                valid_up_to: e.utf8_error().valid_up_to(),
            },
        })?;

        Ok(SourceUnit::from_text(path, text))
    }

    /// In-memory unit. Unknown extensions fall back to C-like lexing.
    pub fn from_text(path: impl Into<PathBuf>, text: impl Into<String>) -> SourceUnit {
        let path = path.into();
        let lang = Lang::from_path(&path).unwrap_or(Lang::C);
        SourceUnit {
            path,
            text: text.into(),
            lang,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn lang(&self) -> Lang {
        self.lang
    }

    pub fn len(&self) -> usize {
        self.text.len()
    }

    pub fn is_empty(&self) -> bool {
        self.text.is_empty()
    }

    /// A fresh pass over the unit's fragments. Each call restarts from the
    /// top of the file.
    pub fn fragments(&self) -> Fragments<'_> {
        Fragments::new(self)
    }

    /// Source text for a byte span, clamped to char boundaries.
    pub fn slice(&self, start: usize, end: usize) -> &str {
        let mut start = start.min(self.text.len());
        let mut end = end.min(self.text.len()).max(start);
        while !self.text.is_char_boundary(start) {
            start -= 1;
        }
        while !self.text.is_char_boundary(end) {
            end += 1;
        }
        &self.text[start..end]
    }
}

#[test]
fn lowercase_ext_recognises_known_extensions() {
    let cases = [
        ("file.rs", Some("rs")),
        ("FILE.RS", Some("rs")),
        ("main.cpp", Some("cpp")),
        ("script.PY", Some("py")),
        ("index.tsx", Some("ts")),
        ("handler.go", Some("go")),
        ("style.css", None),
    ];

    for (file, expected) in cases {
        assert_eq!(lowercase_ext(Path::new(file)), expected, "case: {file}");
    }
}

#[test]
fn binary_content_is_malformed() {
    let mut data = vec![b'a'; 100];
    for b in data.iter_mut().step_by(3) {
        *b = 0;
    }
    let err = SourceUnit::from_bytes(Path::new("junk.go"), data).unwrap_err();
    assert_eq!(err.reason, MalformedReason::Binary);
}

#[test]
fn binary_cutoff_is_one_percent() {
    let mut one = vec![b'a'; 100];
    one[50] = 0;
    assert!(SourceUnit::from_bytes(Path::new("one.go"), one).is_ok());

    let mut over = vec![b'a'; 150];
    over[10] = 0;
    over[20] = 0;
    let err = SourceUnit::from_bytes(Path::new("over.go"), over).unwrap_err();
    assert_eq!(err.reason, MalformedReason::Binary);
}

#[test]
fn invalid_utf8_reports_offset() {
    let mut data = b"package main\n".to_vec();
    data.extend_from_slice(&[0xff, 0xfe, b'x']);
    let err = SourceUnit::from_bytes(Path::new("bad.go"), data).unwrap_err();
    assert_eq!(err.reason, MalformedReason::InvalidUtf8 { valid_up_to: 13 });
}

#[test]
fn load_reads_file_from_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("main.py");
    std::fs::write(&path, "print('hi')\n").unwrap();

    let unit = SourceUnit::load(&path).unwrap();
    assert_eq!(unit.lang(), Lang::Python);
    assert_eq!(unit.text(), "print('hi')\n");
    assert_eq!(unit.slice(0, 5), "print");
}
