use crate::source::Lang;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct Span {
    pub start: usize,
    pub end: usize,
}

impl Span {
    pub fn new(start: usize, end: usize) -> Span {
        Span { start, end }
    }

    pub fn overlaps(&self, other: &Span) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn cover(&self, other: &Span) -> Span {
        Span::new(self.start.min(other.start), self.end.max(other.end))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenKind {
    Ident,
    /// Literal body without quotes. `interpolated` is set for f-strings and
    /// template literals that embed expressions.
    Str { interpolated: bool },
    Number,
    Punct,
    Newline,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    pub kind: TokenKind,
    pub text: String,
    pub span: Span,
    pub line: usize,
    pub column: usize,
}

impl Token {
    pub fn is_punct(&self, p: &str) -> bool {
        self.kind == TokenKind::Punct && self.text == p
    }
}

const MULTI_PUNCT: &[&str] = &[
    "...", "<<=", ">>=", "::", "->", "=>", ":=", "==", "!=", "<=", ">=", "+=", "-=", "*=", "/=",
    "%=", "&&", "||", "?.", "..", "<<", ">>", "**",
];

/// Python string prefixes (`f"..."`, `rb'...'`).
const STR_PREFIXES: &[&str] = &["f", "r", "b", "u", "rb", "br", "fr", "rf"];

/// Lazy lexer over one unit's text. Never fails: unknown bytes become
/// single-char punctuation and unterminated literals run to end of input.
pub struct Lexer<'a> {
    src: &'a str,
    bytes: &'a [u8],
    pos: usize,
    line: usize,
    line_start: usize,
    lang: Lang,
    last_newline: bool,
}

impl<'a> Lexer<'a> {
    pub fn new(src: &'a str, lang: Lang) -> Self {
        Self {
            src,
            bytes: src.as_bytes(),
            pos: 0,
            line: 1,
            line_start: 0,
            lang,
            last_newline: true,
        }
    }

    fn peek(&self, off: usize) -> Option<u8> {
        self.bytes.get(self.pos + off).copied()
    }

    fn column_of(&self, at: usize) -> usize {
        self.src[self.line_start..at].chars().count() + 1
    }

    /// Advance over `n` bytes, keeping line bookkeeping.
    fn bump(&mut self, n: usize) {
        let end = (self.pos + n).min(self.bytes.len());
        while self.pos < end {
            if self.bytes[self.pos] == b'\n' {
                self.line += 1;
                self.line_start = self.pos + 1;
            }
            self.pos += 1;
        }
        while self.pos < self.bytes.len() && !self.src.is_char_boundary(self.pos) {
            self.pos += 1;
        }
    }

    fn skip_line_comment(&mut self) {
        while let Some(b) = self.peek(0) {
            if b == b'\n' {
                break;
            }
            self.bump(1);
        }
    }

    fn skip_block_comment(&mut self) {
        self.bump(2);
        while self.pos < self.bytes.len() {
            if self.peek(0) == Some(b'*') && self.peek(1) == Some(b'/') {
                self.bump(2);
                return;
            }
            self.bump(1);
        }
    }

    fn is_ident_start(b: u8) -> bool {
        b.is_ascii_alphabetic() || b == b'_' || b == b'$' || b >= 0x80
    }

    fn is_ident_char(b: u8) -> bool {
        b.is_ascii_alphanumeric() || b == b'_' || b == b'$' || b >= 0x80
    }

    fn lex_string(&mut self, start: usize, prefix: &str) -> Token {
        let line = self.line;
        let column = self.column_of(start);
        let quote = self.bytes[self.pos];
        let triple = quote != b'`' && self.peek(1) == Some(quote) && self.peek(2) == Some(quote);
        let qlen = if triple { 3 } else { 1 };
        let raw = prefix.contains('r') || prefix.contains('R') || quote == b'`';
        self.bump(qlen);

        let body_start = self.pos;
        let mut body_end = self.bytes.len();
        while self.pos < self.bytes.len() {
            let b = self.bytes[self.pos];
            if b == b'\\' && !raw {
                self.bump(2);
                continue;
            }
            if b == b'\n' && !triple && quote != b'`' {
                // unterminated single-line literal
                body_end = self.pos;
                break;
            }
            if b == quote && (!triple || (self.peek(1) == Some(quote) && self.peek(2) == Some(quote)))
            {
                body_end = self.pos;
                self.bump(qlen);
                break;
            }
            self.bump(1);
        }

        let body = &self.src[body_start..body_end.max(body_start)];
        let interpolated = match quote {
            b'`' => body.contains("${"),
            _ if prefix.contains('f') || prefix.contains('F') => has_brace_capture(body),
            _ => false,
        };

        Token {
            kind: TokenKind::Str { interpolated },
            text: body.to_owned(),
            span: Span::new(start, self.pos),
            line,
            column,
        }
    }

    /// Rust raw strings: `r"..."`, `r#"..."#`, `br##"..."##`.
    fn lex_raw_rust(&mut self, start: usize) -> Option<Token> {
        let mut off = 0;
        if self.peek(off) == Some(b'b') {
            off += 1;
        }
        if self.peek(off) != Some(b'r') {
            return None;
        }
        off += 1;
        let mut hashes = 0;
        while self.peek(off + hashes) == Some(b'#') {
            hashes += 1;
        }
        if self.peek(off + hashes) != Some(b'"') {
            return None;
        }
        let line = self.line;
        let column = self.column_of(start);
        self.bump(off + hashes + 1);
        let body_start = self.pos;
        let closing: String = std::iter::once('"').chain("#".repeat(hashes).chars()).collect();
        let body_end = match self.src[self.pos..].find(&closing) {
            Some(i) => self.pos + i,
            None => self.bytes.len(),
        };
        let body = self.src[body_start..body_end].to_owned();
        self.bump(body_end - self.pos + closing.len().min(self.bytes.len() - body_end));
        Some(Token {
            kind: TokenKind::Str {
                interpolated: false,
            },
            text: body,
            span: Span::new(start, self.pos),
            line,
            column,
        })
    }

    fn simple(&mut self, kind: TokenKind, start: usize, len: usize) -> Token {
        let line = self.line;
        let column = self.column_of(start);
        self.bump(len);
        Token {
            kind,
            text: self.src[start..self.pos].to_owned(),
            span: Span::new(start, self.pos),
            line,
            column,
        }
    }
}

impl Iterator for Lexer<'_> {
    type Item = Token;

    fn next(&mut self) -> Option<Token> {
        loop {
            let b = self.peek(0)?;
            let start = self.pos;

            match b {
                b'\n' => {
                    let tok = self.simple(TokenKind::Newline, start, 1);
                    if self.last_newline {
                        continue;
                    }
                    self.last_newline = true;
                    return Some(tok);
                }
                b' ' | b'\t' | b'\r' | 0x0c => {
                    self.bump(1);
                    continue;
                }
                b'/' if self.peek(1) == Some(b'/') => {
                    self.skip_line_comment();
                    continue;
                }
                b'/' if self.peek(1) == Some(b'*') => {
                    self.skip_block_comment();
                    continue;
                }
                b'#' if self.lang.hash_comments() => {
                    self.skip_line_comment();
                    continue;
                }
                _ => {}
            }

            self.last_newline = false;

            if self.lang == Lang::Rust && (b == b'r' || b == b'b') {
                if let Some(tok) = self.lex_raw_rust(start) {
                    return Some(tok);
                }
            }

            if b == b'"' || b == b'`' {
                return Some(self.lex_string(start, ""));
            }

            if b == b'\'' {
                if self.lang.has_lifetimes() && is_lifetime(&self.bytes[self.pos..]) {
                    return Some(self.simple(TokenKind::Punct, start, 1));
                }
                return Some(self.lex_string(start, ""));
            }

            if Self::is_ident_start(b) {
                let mut end = self.pos;
                while end < self.bytes.len() && Self::is_ident_char(self.bytes[end]) {
                    end += 1;
                }
                let word = &self.src[start..end];
                let next = self.bytes.get(end).copied();
                let prefixed = match self.lang {
                    Lang::Python => STR_PREFIXES.contains(&word.to_ascii_lowercase().as_str()),
                    Lang::Rust => word == "b",
                    _ => false,
                };
                if prefixed && matches!(next, Some(b'"') | Some(b'\'')) {
                    let prefix = word.to_owned();
                    self.bump(end - start);
                    return Some(self.lex_string(start, &prefix));
                }
                return Some(self.simple(TokenKind::Ident, start, end - start));
            }

            if b.is_ascii_digit() {
                let mut end = self.pos;
                while end < self.bytes.len()
                    && (self.bytes[end].is_ascii_alphanumeric() || self.bytes[end] == b'_')
                {
                    end += 1;
                }
                // fractional part, but not a `..` range
                if self.bytes.get(end) == Some(&b'.')
                    && self.bytes.get(end + 1).is_some_and(|c| c.is_ascii_digit())
                {
                    end += 1;
                    while end < self.bytes.len() && self.bytes[end].is_ascii_alphanumeric() {
                        end += 1;
                    }
                }
                return Some(self.simple(TokenKind::Number, start, end - start));
            }

            let rest = &self.src[self.pos..];
            let len = MULTI_PUNCT
                .iter()
                .find(|p| rest.starts_with(*p))
                .map(|p| p.len())
                .unwrap_or_else(|| rest.chars().next().map(char::len_utf8).unwrap_or(1));
            return Some(self.simple(TokenKind::Punct, start, len));
        }
    }
}

/// `'a` not closed by a quote right after the identifier run.
fn is_lifetime(rest: &[u8]) -> bool {
    let mut i = 1;
    if !rest.get(i).is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_') {
        return false;
    }
    while rest.get(i).is_some_and(|b| b.is_ascii_alphanumeric() || *b == b'_') {
        i += 1;
    }
    rest.get(i) != Some(&b'\'')
}

/// `{name}` or `{name:fmt}` inside a literal, as in f-strings and Rust's
/// inline format captures.
pub fn has_brace_capture(body: &str) -> bool {
    let bytes = body.as_bytes();
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'{' {
            if bytes.get(i + 1) == Some(&b'{') {
                i += 2;
                continue;
            }
            if bytes
                .get(i + 1)
                .is_some_and(|b| b.is_ascii_alphabetic() || *b == b'_')
            {
                return true;
            }
        }
        i += 1;
    }
    false
}

#[cfg(test)]
fn lex(src: &str, lang: Lang) -> Vec<Token> {
    Lexer::new(src, lang).collect()
}

#[test]
fn lexes_go_call_with_concat() {
    let toks = lex(r#"exec.Command("sh", "-c", "ls -la "+userInput)"#, Lang::Go);
    let kinds: Vec<_> = toks.iter().map(|t| (t.kind, t.text.as_str())).collect();
    assert_eq!(kinds[0], (TokenKind::Ident, "exec"));
    assert_eq!(kinds[1], (TokenKind::Punct, "."));
    assert_eq!(kinds[2], (TokenKind::Ident, "Command"));
    assert_eq!(
        kinds[3..5],
        [(TokenKind::Punct, "("), (TokenKind::Str { interpolated: false }, "sh")]
    );
    assert!(kinds.contains(&(TokenKind::Str { interpolated: false }, "ls -la ")));
    assert!(kinds.contains(&(TokenKind::Punct, "+")));
}

#[test]
fn comments_are_skipped_per_language() {
    let go = lex("x := 1 // md5.Sum(password)\n/* exec */ y", Lang::Go);
    assert!(go.iter().all(|t| t.text != "md5" && t.text != "exec"));

    let py = lex("# os.system(x)\nz = 2", Lang::Python);
    assert_eq!(py[0].text, "z");

    // `#` is not a comment in Rust
    let rs = lex("#[test]", Lang::Rust);
    assert_eq!(rs[0].text, "#");
}

#[test]
fn python_prefixes_and_fstrings() {
    let toks = lex(r#"q = f"SELECT * FROM t WHERE id = {uid}""#, Lang::Python);
    assert_eq!(toks[2].kind, TokenKind::Str { interpolated: true });
    assert!(toks[2].text.starts_with("SELECT"));

    let raw = lex(r#"p = r"\d+""#, Lang::Python);
    assert_eq!(raw[2].text, r"\d+");
}

#[test]
fn template_literals_are_interpolated() {
    let toks = lex("fetch(`https://x/${path}`)", Lang::JavaScript);
    assert_eq!(toks[2].kind, TokenKind::Str { interpolated: true });
}

#[test]
fn rust_lifetimes_and_raw_strings() {
    let toks = lex(r##"fn f<'a>(x: &'a str) -> &'static str { r#"raw "q""# }"##, Lang::Rust);
    assert!(toks.iter().any(|t| t.kind == TokenKind::Str { interpolated: false } && t.text == r#"raw "q""#));
    assert!(toks.iter().all(|t| t.text != "a>(x: &"));
}

#[test]
fn positions_are_one_based() {
    let toks = lex("a\n  bb", Lang::Go);
    assert_eq!((toks[0].line, toks[0].column), (1, 1));
    assert_eq!(toks[1].kind, TokenKind::Newline);
    assert_eq!((toks[2].line, toks[2].column), (2, 3));
}

#[test]
fn unterminated_literal_degrades_gracefully() {
    let toks = lex("x = \"oops\ny = 1", Lang::Go);
    assert!(toks.iter().any(|t| t.text == "y"));
}

#[test]
fn brace_capture_detection() {
    assert!(has_brace_capture("ls -la {user}"));
    assert!(has_brace_capture("{x:?}"));
    assert!(!has_brace_capture("ls -la {}"));
    assert!(!has_brace_capture("{{literal}}"));
}
