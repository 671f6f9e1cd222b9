//! Shallow expression summaries.
//!
//! An [`Expr`] records *what an argument is made of* (literals, variables,
//! nested calls) and whether those pieces are spliced together, which is all
//! the detection rules need. It is not an AST: precedence, types and control
//! flow are ignored.

use super::lexer::{Span, Token, TokenKind, has_brace_capture};
use phf::{Set, phf_set};

/// Words that never name a value.
pub static KEYWORDS: Set<&'static str> = phf_set! {
    "var", "let", "const", "mut", "static", "val", "fn", "func", "def", "function",
    "return", "if", "else", "elif", "for", "while", "loop", "in", "of", "not", "and", "or",
    "is", "as", "new", "await", "async", "yield", "import", "from", "use", "package", "pub",
    "crate", "mod", "impl", "struct", "enum", "type", "interface", "class", "extends",
    "implements", "public", "private", "protected", "final", "try", "catch", "except",
    "finally", "throw", "throws", "raise", "with", "match", "case", "switch", "default",
    "break", "continue", "go", "defer", "select", "chan", "unsafe", "extern", "where",
    "typeof", "instanceof", "void", "delete", "do", "then", "end", "begin", "echo", "print",
    "lambda", "pass", "global", "nonlocal", "del", "assert", "ref", "move", "dyn", "trait",
    "self", "this", "super", "Self", "export", "require_once", "include_once",
};

/// Keywords that open a function body and therefore a new scope.
pub static FUNCTION_KEYWORDS: Set<&'static str> = phf_set! {
    "fn", "func", "def", "function",
};

/// Declaration keywords whose first identifier is the assignment target.
pub static DECL_KEYWORDS: Set<&'static str> = phf_set! {
    "var", "let", "const", "static", "val",
};

/// Keywords that may still head a path (`self.client.get`).
static PATH_KEYWORDS: Set<&'static str> = phf_set! {
    "self", "this", "Self", "super", "crate",
};

static CONSTANTS: Set<&'static str> = phf_set! {
    "true", "false", "True", "False", "nil", "None", "null", "undefined", "NULL",
};

/// String builders: formatting and path/sequence joining.
static BUILDERS: Set<&'static str> = phf_set! {
    "format", "Sprintf", "sprintf", "Sprint", "Sprintln", "format_args", "concat",
    "Concat", "join", "Join", "strcat", "vsprintf", "printf_string",
};

/// Calls that only change the representation of their input.
static CONVERSIONS: Set<&'static str> = phf_set! {
    "byte", "string", "str", "String", "bytes", "to_string", "to_owned", "into", "from",
    "as_bytes", "as_str", "encode", "toString", "strip", "trim", "lower", "upper",
    "toLowerCase", "toUpperCase", "unwrap", "clone", "valueOf", "getBytes", "Buffer",
    "to_vec", "as_ref", "borrow",
};

/// Tokens after which a line break does not end the statement.
const CONTINUE_AFTER: &[&str] = &[
    "+", "=", ":=", "+=", "-=", "==", "!=", "&&", "||", ",", ".", "::", "->", "=>", "|", "&",
    "?", "\\", "%",
];

/// Deepest bracket or method-chain nesting summarized into an [`Expr`].
/// Anything deeper is skipped as an opaque balanced group.
pub const MAX_NESTING: usize = 256;

/// Tokens that continue the previous line when they start a new one.
const CONTINUE_BEFORE: &[&str] = &[".", "?.", "+", "||", "&&", "?", "=>", "->"];

#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    Literal { value: String, interpolated: bool },
    Ident { name: String },
    Call(Box<CallExpr>),
    /// Numbers, booleans, nil.
    Constant,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CallExpr {
    pub callee: String,
    pub receiver: Option<Operand>,
    pub args: Vec<Expr>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct Expr {
    pub operands: Vec<Operand>,
    /// Operands are spliced by `+`, `%`, `.` or `+=`.
    pub joined: bool,
    /// Keyword-argument name (`shell=True`).
    pub keyword: Option<String>,
    pub span: Span,
}

impl Operand {
    /// The operand's value is not fixed in the source text.
    pub fn is_dynamic(&self) -> bool {
        match self {
            Operand::Literal { interpolated, .. } => *interpolated,
            Operand::Ident { .. } => true,
            Operand::Call(call) => call.is_dynamic(),
            Operand::Constant => false,
        }
    }

    fn collect_template(&self, out: &mut Vec<String>) {
        match self {
            Operand::Literal { value, .. } => out.push(value.clone()),
            Operand::Call(call) if call.is_builder() || call.is_conversion() => {
                if let Some(recv) = &call.receiver {
                    recv.collect_template(out);
                }
                for arg in &call.args {
                    for op in &arg.operands {
                        op.collect_template(out);
                    }
                }
            }
            _ => {}
        }
    }

    fn collect_idents<'a>(&'a self, out: &mut Vec<&'a str>) {
        match self {
            Operand::Ident { name } => out.push(name),
            Operand::Call(call) => {
                if let Some(recv) = &call.receiver {
                    recv.collect_idents(out);
                }
                for arg in &call.args {
                    arg.collect_idents(out);
                }
            }
            _ => {}
        }
    }
}

impl CallExpr {
    /// Last path segment without a macro bang: `fmt.Sprintf` → `Sprintf`.
    pub fn name(&self) -> &str {
        last_segment(&self.callee)
    }

    pub fn is_builder(&self) -> bool {
        BUILDERS.contains(self.name())
    }

    pub fn is_conversion(&self) -> bool {
        CONVERSIONS.contains(self.name())
    }

    /// Template literal of a formatting call, if it has one.
    fn template_literal(&self) -> Option<&str> {
        if let Some(Operand::Literal { value, .. }) = &self.receiver {
            return Some(value);
        }
        self.args.first().and_then(Expr::sole_literal)
    }

    pub fn is_dynamic(&self) -> bool {
        if self.is_builder() || self.is_conversion() {
            self.receiver.as_ref().is_some_and(Operand::is_dynamic)
                || self.args.iter().any(Expr::is_dynamic)
                || self.template_literal().is_some_and(has_brace_capture)
        } else {
            // unknown call results are treated as attacker-reachable
            true
        }
    }

    /// Builds a string with a non-literal piece spliced in.
    pub fn splices(&self) -> bool {
        if self.is_builder() {
            self.is_dynamic()
        } else if self.is_conversion() {
            self.receiver.as_ref().is_some_and(|r| match r {
                Operand::Call(c) => c.splices(),
                Operand::Literal { interpolated, .. } => *interpolated,
                _ => false,
            }) || self.args.iter().any(Expr::splices_dynamic)
        } else {
            false
        }
    }
}

impl Expr {
    pub fn is_empty(&self) -> bool {
        self.operands.is_empty()
    }

    pub fn is_dynamic(&self) -> bool {
        self.operands.iter().any(Operand::is_dynamic)
    }

    /// A concatenation, format call or interpolated literal that splices a
    /// non-literal operand into a string.
    pub fn splices_dynamic(&self) -> bool {
        (self.joined && self.is_dynamic())
            || self.operands.iter().any(|op| match op {
                Operand::Literal { interpolated, .. } => *interpolated,
                Operand::Call(call) => call.splices(),
                _ => false,
            })
    }

    /// All literal text the expression is built from, space separated.
    pub fn template(&self) -> String {
        let mut parts = Vec::new();
        for op in &self.operands {
            op.collect_template(&mut parts);
        }
        parts.join(" ")
    }

    /// The expression is exactly one plain literal (possibly wrapped in a
    /// conversion such as `String::from` or `.to_string()`).
    pub fn sole_literal(&self) -> Option<&str> {
        if self.joined || self.operands.len() != 1 {
            return None;
        }
        sole_literal_of(&self.operands[0])
    }

    /// The expression is a bare variable reference.
    pub fn as_ident(&self) -> Option<&str> {
        match self.operands.as_slice() {
            [Operand::Ident { name }] if !self.joined => Some(name),
            _ => None,
        }
    }

    /// Every variable name referenced anywhere in the expression.
    pub fn idents(&self) -> Vec<&str> {
        let mut out = Vec::new();
        self.collect_idents(&mut out);
        out
    }

    fn collect_idents<'a>(&'a self, out: &mut Vec<&'a str>) {
        for op in &self.operands {
            op.collect_idents(out);
        }
    }

    fn absorb(&mut self, other: Expr) {
        self.joined |= other.joined;
        self.operands.extend(other.operands);
    }
}

fn sole_literal_of(op: &Operand) -> Option<&str> {
    match op {
        Operand::Literal {
            value,
            interpolated: false,
        } => Some(value),
        Operand::Call(call) if call.is_conversion() => match (&call.receiver, call.args.as_slice()) {
            (Some(recv), []) => sole_literal_of(recv),
            (None, [arg]) => arg.sole_literal(),
            _ => None,
        },
        _ => None,
    }
}

pub fn last_segment(path: &str) -> &str {
    let path = path.trim_end_matches('!');
    path.rsplit('.').next().unwrap_or(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stop {
    /// Inside brackets: line breaks are insignificant.
    Args,
    /// Statement-level: a line break may end the expression.
    Statement,
}

fn prev_significant(tokens: &[Token], i: usize) -> Option<&Token> {
    tokens[..i].iter().rev().find(|t| t.kind != TokenKind::Newline)
}

fn next_significant(tokens: &[Token], i: usize) -> Option<&Token> {
    tokens.get(i + 1..)?.iter().find(|t| t.kind != TokenKind::Newline)
}

/// Whether the line break at `i` ends the current statement.
pub fn newline_ends_statement(tokens: &[Token], i: usize) -> bool {
    let (Some(prev), Some(next)) = (prev_significant(tokens, i), next_significant(tokens, i)) else {
        return true;
    };
    let continues_after = prev.kind == TokenKind::Punct && CONTINUE_AFTER.contains(&prev.text.as_str());
    let continues_before =
        next.kind == TokenKind::Punct && CONTINUE_BEFORE.contains(&next.text.as_str());
    !(continues_after || continues_before)
}

pub fn is_open(tok: &Token) -> bool {
    tok.kind == TokenKind::Punct && matches!(tok.text.as_str(), "(" | "[" | "{")
}

pub fn closer_of(open: &str) -> &'static str {
    match open {
        "(" => ")",
        "[" => "]",
        _ => "}",
    }
}

/// The identifier at `i` names a value rather than being a keyword.
pub fn starts_path(tokens: &[Token], i: usize) -> bool {
    let word = tokens[i].text.as_str();
    if !KEYWORDS.contains(word) {
        return true;
    }
    PATH_KEYWORDS.contains(word)
        && tokens
            .get(i + 1)
            .is_some_and(|t| t.is_punct(".") || t.is_punct("::") || t.is_punct("->"))
}

/// `a.b::c->d` starting at `i`. Returns the dotted path and the index of the
/// first token after it.
pub fn collect_path(tokens: &[Token], i: usize) -> (String, usize) {
    let mut path = tokens[i].text.clone();
    let mut j = i + 1;
    while j + 1 < tokens.len() {
        let sep = &tokens[j];
        let seg = &tokens[j + 1];
        let is_sep = sep.kind == TokenKind::Punct
            && matches!(sep.text.as_str(), "." | "::" | "?." | "->");
        if !is_sep || seg.kind != TokenKind::Ident {
            break;
        }
        path.push('.');
        path.push_str(&seg.text);
        j += 2;
    }
    (path, j)
}

/// If a call's argument list starts at `j` (`(` or a macro `!(`), return the
/// index of the opening bracket and whether it is a macro.
pub fn call_open(tokens: &[Token], j: usize) -> Option<(usize, bool)> {
    let tok = tokens.get(j)?;
    if tok.is_punct("(") {
        return Some((j, false));
    }
    if tok.is_punct("!") && tokens.get(j + 1).is_some_and(is_open) {
        // `!` must be glued to the macro name
        if tokens[j - 1].span.end == tok.span.start {
            return Some((j + 1, true));
        }
    }
    None
}

/// Parse the comma-separated items of the bracket opened at `open`.
/// Returns them with the index of the matching closer (`tokens.len()` when
/// unbalanced).
pub fn parse_args(tokens: &[Token], open: usize) -> (Vec<Expr>, usize) {
    parse_args_at(tokens, open, 0)
}

/// [`parse_args`] for a bracket already `depth` levels deep.
pub fn parse_args_at(tokens: &[Token], open: usize, depth: usize) -> (Vec<Expr>, usize) {
    if depth >= MAX_NESTING {
        return (Vec::new(), skip_group(tokens, open));
    }
    let closer = closer_of(&tokens[open].text);
    let mut args = Vec::new();
    let mut i = open + 1;
    while i < tokens.len() {
        let tok = &tokens[i];
        if tok.is_punct(closer) {
            return (args, i);
        }
        if tok.is_punct(",") || tok.is_punct(";") || tok.kind == TokenKind::Newline {
            i += 1;
            continue;
        }
        let (expr, end) = parse_expr_at(tokens, i, Stop::Args, depth + 1);
        if !expr.is_empty() || expr.keyword.is_some() {
            args.push(expr);
        }
        // stray closer of another kind: skip it
        i = if end == i { i + 1 } else { end };
    }
    (args, tokens.len())
}

/// Index of the closer balancing the bracket at `open`, found with a flat
/// counter over every bracket kind.
fn skip_group(tokens: &[Token], open: usize) -> usize {
    let mut depth = 0usize;
    for (i, tok) in tokens.iter().enumerate().skip(open) {
        if tok.kind != TokenKind::Punct {
            continue;
        }
        match tok.text.as_str() {
            "(" | "[" | "{" => depth += 1,
            ")" | "]" | "}" => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i;
                }
            }
            _ => {}
        }
    }
    tokens.len()
}

/// Parse one expression starting at `start`, up to a top-level separator.
pub fn parse_expr(tokens: &[Token], start: usize, stop: Stop) -> (Expr, usize) {
    parse_expr_at(tokens, start, stop, 0)
}

/// [`parse_expr`] for an expression already `depth` levels deep.
pub fn parse_expr_at(tokens: &[Token], start: usize, stop: Stop, depth: usize) -> (Expr, usize) {
    let mut expr = Expr::default();
    let mut i = start;
    let mut last_literal = false;

    while i < tokens.len() {
        let tok = &tokens[i];
        match tok.kind {
            TokenKind::Newline => {
                if stop == Stop::Statement && newline_ends_statement(tokens, i) {
                    break;
                }
                i += 1;
            }
            TokenKind::Punct => match tok.text.as_str() {
                "," | ";" | ")" | "]" | "}" => break,
                "(" | "[" | "{" => {
                    let (inner, close) = parse_args_at(tokens, i, depth);
                    for e in inner {
                        expr.absorb(e);
                    }
                    i = close + 1;
                    last_literal = false;
                }
                "+" | "+=" => {
                    expr.joined = true;
                    i += 1;
                }
                "." => {
                    // PHP-style concatenation; method calls were taken by postfix
                    let next_str = tokens
                        .get(i + 1)
                        .is_some_and(|t| matches!(t.kind, TokenKind::Str { .. }));
                    if last_literal || next_str {
                        expr.joined = true;
                    }
                    i += 1;
                }
                "%" => {
                    if last_literal {
                        expr.joined = true;
                    }
                    i += 1;
                }
                "=" if stop == Stop::Args && expr.keyword.is_none() => {
                    // `name=value` keyword argument
                    if let [Operand::Ident { name }] = expr.operands.as_slice() {
                        expr.keyword = Some(name.clone());
                        expr.operands.clear();
                    }
                    i += 1;
                }
                _ => i += 1,
            },
            TokenKind::Str { interpolated } => {
                let lit = Operand::Literal {
                    value: tok.text.clone(),
                    interpolated,
                };
                let (op, next) = postfix(tokens, i + 1, lit, depth);
                last_literal = matches!(op, Operand::Literal { .. });
                expr.operands.push(op);
                i = next;
            }
            TokenKind::Number => {
                expr.operands.push(Operand::Constant);
                last_literal = false;
                i += 1;
            }
            TokenKind::Ident => {
                last_literal = false;
                if CONSTANTS.contains(tok.text.as_str()) {
                    expr.operands.push(Operand::Constant);
                    i += 1;
                    continue;
                }
                if !starts_path(tokens, i) {
                    i += 1;
                    continue;
                }
                let (path, j) = collect_path(tokens, i);
                let (op, next) = match call_open(tokens, j) {
                    Some((open, is_macro)) => {
                        let (args, close) = parse_args_at(tokens, open, depth);
                        let callee = if is_macro { format!("{path}!") } else { path };
                        let call = Operand::Call(Box::new(CallExpr {
                            callee,
                            receiver: None,
                            args,
                        }));
                        postfix(tokens, close + 1, call, depth + 1)
                    }
                    None => postfix(tokens, j, Operand::Ident { name: path }, depth),
                };
                expr.operands.push(op);
                i = next;
            }
        }
    }

    let end = tokens[start..i.min(tokens.len())]
        .iter()
        .rev()
        .find(|t| t.kind != TokenKind::Newline)
        .map(|t| t.span.end);
    if let (Some(first), Some(end)) = (tokens.get(start), end) {
        expr.span = Span::new(first.span.start, end);
    }
    (expr, i)
}

/// Method calls, indexing and `?` applied to an operand. Each wrapped call
/// nests the receiver one level deeper; past [`MAX_NESTING`] the remaining
/// links are skipped and the operand is kept as is.
fn postfix(tokens: &[Token], mut i: usize, mut op: Operand, mut depth: usize) -> (Operand, usize) {
    loop {
        let Some(tok) = tokens.get(i) else { break };
        if (tok.is_punct(".") || tok.is_punct("?.") || tok.is_punct("::"))
            && tokens.get(i + 1).is_some_and(|t| t.kind == TokenKind::Ident)
        {
            if let Some((open, _)) = call_open(tokens, i + 2) {
                if depth >= MAX_NESTING {
                    i = skip_group(tokens, open) + 1;
                    continue;
                }
                let (args, close) = parse_args_at(tokens, open, depth);
                op = Operand::Call(Box::new(CallExpr {
                    callee: tokens[i + 1].text.clone(),
                    receiver: Some(op),
                    args,
                }));
                depth += 1;
                i = close + 1;
                continue;
            }
            if matches!(op, Operand::Call(_)) {
                // field access on a call result
                i += 2;
                continue;
            }
            break;
        }
        if tok.is_punct("?") && matches!(op, Operand::Call(_)) {
            i += 1;
            continue;
        }
        if tok.is_punct("[") && !matches!(op, Operand::Literal { .. }) {
            i = skip_group(tokens, i) + 1;
            continue;
        }
        break;
    }
    (op, i)
}

#[cfg(test)]
fn depth_of(op: &Operand) -> usize {
    match op {
        Operand::Call(call) => {
            let recv = call.receiver.as_ref().map_or(0, depth_of);
            let args = call
                .args
                .iter()
                .flat_map(|a| a.operands.iter())
                .map(depth_of)
                .max()
                .unwrap_or(0);
            1 + recv.max(args)
        }
        _ => 0,
    }
}

#[cfg(test)]
fn expr_of(src: &str, lang: crate::source::Lang) -> Expr {
    let toks: Vec<Token> = super::lexer::Lexer::new(src, lang).collect();
    parse_expr(&toks, 0, Stop::Statement).0
}

#[test]
fn concatenation_with_variable_splices() {
    let e = expr_of(r#""ls -la " + userInput"#, crate::source::Lang::Go);
    assert!(e.joined);
    assert!(e.splices_dynamic());
    assert_eq!(e.template(), "ls -la ");
}

#[test]
fn literal_only_concat_does_not_splice() {
    let e = expr_of(r#""a" + "b""#, crate::source::Lang::Go);
    assert!(e.joined);
    assert!(!e.splices_dynamic());
}

#[test]
fn sprintf_with_variable_splices() {
    let e = expr_of(
        r#"fmt.Sprintf("SELECT * FROM users WHERE id = %s", userId)"#,
        crate::source::Lang::Go,
    );
    assert!(!e.joined);
    assert!(e.splices_dynamic());
    assert!(e.template().starts_with("SELECT"));
}

#[test]
fn python_format_method_and_percent() {
    let e = expr_of(r#""SELECT {}".format(uid)"#, crate::source::Lang::Python);
    assert!(e.splices_dynamic());
    assert_eq!(e.template(), "SELECT {}");

    let p = expr_of(r#""rm -rf %s" % path"#, crate::source::Lang::Python);
    assert!(p.joined && p.splices_dynamic());
}

#[test]
fn rust_format_macro_and_inline_capture() {
    let e = expr_of(r#"format!("ls -la {}", user_input)"#, crate::source::Lang::Rust);
    assert!(e.splices_dynamic());

    let inline = expr_of(r#"format!("ls -la {user_input}")"#, crate::source::Lang::Rust);
    assert!(inline.splices_dynamic());

    let fixed = expr_of(r#"format!("ls -la {}", 3)"#, crate::source::Lang::Rust);
    assert!(!fixed.splices_dynamic());
}

#[test]
fn conversions_keep_literals_literal() {
    let e = expr_of(r#""sk-live-abc".to_string()"#, crate::source::Lang::Rust);
    assert_eq!(e.sole_literal(), Some("sk-live-abc"));

    let from = expr_of(r#"String::from("token")"#, crate::source::Lang::Rust);
    assert_eq!(from.sole_literal(), Some("token"));

    let bytes = expr_of("[]byte(password)", crate::source::Lang::Go);
    assert_eq!(bytes.idents(), vec!["password"]);
    assert!(!bytes.splices_dynamic());
}

#[test]
fn keyword_arguments_are_named() {
    let toks: Vec<Token> =
        super::lexer::Lexer::new("run(cmd, shell=True)", crate::source::Lang::Python).collect();
    let (args, close) = parse_args(&toks, 1);
    assert_eq!(close, toks.len() - 1);
    assert_eq!(args.len(), 2);
    assert_eq!(args[0].as_ident(), Some("cmd"));
    assert_eq!(args[1].keyword.as_deref(), Some("shell"));
    assert_eq!(args[1].operands, vec![Operand::Constant]);
}

#[test]
fn statement_expression_stops_at_line_break() {
    let toks: Vec<Token> =
        super::lexer::Lexer::new("a + b\nc()", crate::source::Lang::Go).collect();
    let (e, end) = parse_expr(&toks, 0, Stop::Statement);
    assert_eq!(e.idents(), vec!["a", "b"]);
    assert_eq!(toks[end].kind, TokenKind::Newline);
}

#[test]
fn trailing_operator_continues_line() {
    let toks: Vec<Token> =
        super::lexer::Lexer::new("\"SELECT \" +\n  id", crate::source::Lang::Go).collect();
    let (e, _) = parse_expr(&toks, 0, Stop::Statement);
    assert!(e.splices_dynamic());
}

#[test]
fn deep_nesting_is_capped_not_recursed() {
    let src = format!("{}x{}", "f(".repeat(100_000), ")".repeat(100_000));
    let toks: Vec<Token> = super::lexer::Lexer::new(&src, crate::source::Lang::Go).collect();
    let (e, end) = parse_expr(&toks, 0, Stop::Statement);
    assert_eq!(end, toks.len());
    assert!(e.operands.iter().map(depth_of).max().unwrap_or(0) <= MAX_NESTING + 1);

    let open = "(".repeat(100_000);
    let toks: Vec<Token> = super::lexer::Lexer::new(&open, crate::source::Lang::Go).collect();
    let (args, close) = parse_args(&toks, 0);
    assert!(args.is_empty());
    assert_eq!(close, toks.len());
}

#[test]
fn long_method_chains_stop_nesting() {
    let src = format!("b{}", ".m()".repeat(100_000));
    let toks: Vec<Token> = super::lexer::Lexer::new(&src, crate::source::Lang::Go).collect();
    let (e, end) = parse_expr(&toks, 0, Stop::Statement);
    assert_eq!(end, toks.len());
    assert!(depth_of(&e.operands[0]) <= MAX_NESTING + 1);
}
