use super::{Category, Hit, Rule, Severity, built_then_used, callee_matches, is_sink, positional};
use crate::engine::Window;
use crate::tokenizer::{Expr, Fragment, FragmentKind, FragmentKinds};

const FILE_SINKS: &[&str] = &[
    // Go
    "os.Open",
    "os.OpenFile",
    "os.ReadFile",
    "os.WriteFile",
    "os.Create",
    "os.Remove",
    "os.RemoveAll",
    "ioutil.ReadFile",
    "ioutil.WriteFile",
    "http.ServeFile",
    // Python
    "open",
    "io.open",
    "os.remove",
    "os.unlink",
    "shutil.rmtree",
    "send_file",
    // Rust
    "File.open",
    "File.create",
    "fs.read",
    "fs.read_to_string",
    "fs.write",
    "fs.remove_file",
    "fs.remove_dir_all",
    "OpenOptions.open",
    // Node
    "fs.readFile",
    "fs.readFileSync",
    "fs.writeFile",
    "fs.writeFileSync",
    "fs.appendFile",
    "fs.appendFileSync",
    "fs.createReadStream",
    "fs.createWriteStream",
    "fs.unlink",
    "fs.unlinkSync",
    "readFile",
    "readFileSync",
    ".sendFile",
    // Java / PHP / Ruby / C
    "FileInputStream",
    "FileReader",
    "FileOutputStream",
    "Files.readAllBytes",
    "Files.readString",
    "Files.newInputStream",
    "fopen",
    "file_get_contents",
    "file_put_contents",
    "readfile",
    "unlink",
    "File.read",
    "IO.read",
];

/// Calls that normalize or constrain a path.
const SANITIZERS: &[&str] = &[
    "filepath.Clean",
    "filepath.Base",
    "filepath.Rel",
    "filepath.IsLocal",
    "path.Clean",
    "path.Base",
    "os.path.basename",
    "os.path.normpath",
    "os.path.realpath",
    "os.path.abspath",
    "path.basename",
    "path.normalize",
    "path.resolve",
    "secure_filename",
    "basename",
    "realpath",
    ".canonicalize",
    ".file_name",
    ".starts_with",
    ".startsWith",
    ".HasPrefix",
    ".is_relative_to",
    ".getCanonicalPath",
    ".normalize",
];

const REMEDIATION: &str = "Resolve the path against a fixed base directory, reject `..` segments, \
     and verify the result stays inside the base before opening it.";

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule::builtin(
            "path_open_concat",
            Category::PathTraversal,
            Severity::High,
            FragmentKinds::CALL,
            "File opened at a path joined with untrusted input",
            REMEDIATION,
            open_concat,
        ),
        Rule::builtin(
            "path_built_then_opened",
            Category::PathTraversal,
            Severity::High,
            FragmentKinds::ASSIGNMENT,
            "Path built from untrusted input is opened",
            REMEDIATION,
            built_then_opened,
        ),
    ]
}

/// Calls that test a string for a substring or prefix.
const CONTAINMENT: &[&str] = &[
    "Contains",
    "ContainsAny",
    "HasPrefix",
    "HasSuffix",
    "Index",
    "contains",
    "includes",
    "include",
    "indexOf",
    "IndexOf",
    "index",
    "find",
    "startswith",
    "endswith",
    "starts_with",
    "ends_with",
    "startsWith",
    "endsWith",
    "strpos",
    "strstr",
    "str_contains",
    "match",
    "search",
    "test",
];

/// Operators that put the literal next to them inside a condition.
const COMPARE_AFTER: &[&str] = &["==", "!=", "in ", "in\t", "not in "];
const COMPARE_BEFORE: &[&str] = &["==", "!="];

/// `strings.Contains(p, "..")`, `p.includes("..")`.
fn is_dotdot_test(f: &Fragment) -> bool {
    CONTAINMENT.contains(&f.name()) && f.args.iter().any(|a| a.template().contains(".."))
}

/// `".." in name`, `p == ".."`: the literal is an operand of a comparison.
fn is_dotdot_comparison(w: &Window<'_>, f: &Fragment) -> bool {
    if !f.text.contains("..") {
        return false;
    }
    let before = w.unit.slice(0, f.span.start).trim_end();
    let after = w.unit.slice(f.span.end, w.unit.len()).trim_start();
    COMPARE_BEFORE.iter().any(|op| before.ends_with(op))
        || COMPARE_AFTER.iter().any(|op| after.starts_with(op))
}

/// A `..` check or a sanitizer call.
fn is_guard(w: &Window<'_>, f: &Fragment) -> bool {
    match f.kind {
        FragmentKind::StringLiteral => is_dotdot_comparison(w, f),
        FragmentKind::Call => callee_matches(&f.text, SANITIZERS) || is_dotdot_test(f),
        _ => false,
    }
}

/// Only guards that come before the open or sit in the same statement.
fn guarded(w: &Window<'_>) -> bool {
    w.context().any(|f| is_guard(w, f))
}

fn open_concat(w: &Window<'_>) -> Result<Option<Hit>, String> {
    if guarded(w) {
        return Ok(None);
    }
    Ok(w
        .head
        .iter()
        .find(|f| is_sink(f, FILE_SINKS) && positional(f).next().is_some_and(Expr::splices_dynamic))
        .map(Hit::at))
}

fn looks_like_path(expr: &Expr) -> bool {
    let template = expr.template();
    template.contains('/') || template.contains('\\') || template.contains('.')
}

fn built_then_opened(w: &Window<'_>) -> Result<Option<Hit>, String> {
    if guarded(w) {
        return Ok(None);
    }
    Ok(built_then_used(
        w,
        |rhs| rhs.splices_dynamic() && looks_like_path(rhs),
        |f| is_sink(f, FILE_SINKS),
    ))
}

#[cfg(test)]
use super::testing::hits;

#[test]
fn go_open_with_concatenated_path() {
    let src = "f, err := os.Open(\"/var/data/\" + filename)\n";
    let found = hits("path_open_concat", "files.go", src, 1);
    assert_eq!(found, vec!["os.Open(\"/var/data/\" + filename)"]);
}

#[test]
fn python_open_with_fstring() {
    let src = "with open(f\"/srv/uploads/{name}\") as fh:\n    data = fh.read()\n";
    assert_eq!(hits("path_open_concat", "u.py", src, 1).len(), 1);
}

#[test]
fn preceding_dotdot_check_suppresses() {
    let src = r#"
def read(name):
    if ".." in name:
        raise ValueError("bad path")
    return open("/srv/" + name).read()
"#;
    assert!(hits("path_open_concat", "r.py", src, 1).is_empty());
}

#[test]
fn sanitizer_in_same_call_suppresses() {
    let src = "data, _ := os.ReadFile(filepath.Clean(\"/data/\" + p))\n";
    assert!(hits("path_open_concat", "s.go", src, 1).is_empty());
}

#[test]
fn guard_in_other_function_does_not_count() {
    let src = r#"
func check(p string) bool {
    return strings.Contains(p, "..")
}
func load(p string) {
    os.ReadFile("/data/" + p)
}
"#;
    assert_eq!(hits("path_open_concat", "g.go", src, 1).len(), 1);
}

#[test]
fn path_built_then_opened() {
    let src = "let full = format!(\"/var/app/{}\", user_path);\nlet text = fs::read_to_string(&full)?;\n";
    assert_eq!(hits("path_built_then_opened", "p.rs", src, 2).len(), 1);
}

#[test]
fn ellipsis_in_a_log_message_is_not_a_guard() {
    let src = r#"
func load(path string) {
    log.Println("reading...")
    os.Open("/data/" + path)
}
"#;
    assert_eq!(hits("path_open_concat", "l.go", src, 1).len(), 1);
}

#[test]
fn containment_and_comparison_checks_suppress() {
    let contains = r#"
func load(p string) {
    if strings.Contains(p, "..") {
        return
    }
    os.ReadFile("/data/" + p)
}
"#;
    assert!(hits("path_open_concat", "c.go", contains, 1).is_empty());

    let includes = r#"
function load(p) {
  if (p.includes("..")) throw new Error("bad");
  return fs.readFileSync("/srv/" + p);
}
"#;
    assert!(hits("path_open_concat", "i.js", includes, 1).is_empty());
}

#[test]
fn check_after_the_open_does_not_count() {
    let src = r#"
def read(name):
    data = open("/srv/" + name).read()
    if ".." in name:
        raise ValueError("bad path")
    return data
"#;
    assert_eq!(hits("path_open_concat", "late.py", src, 3).len(), 1);
}
