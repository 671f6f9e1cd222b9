use super::{Category, Hit, Rule, Severity, built_then_used, is_sink};
use crate::engine::Window;
use crate::tokenizer::{CallExpr, Expr, FragmentKind, FragmentKinds, Operand};
use once_cell::sync::Lazy;
use regex::Regex;

const QUERY_SINKS: &[&str] = &[
    ".query",
    ".Query",
    ".QueryRow",
    ".QueryContext",
    ".QueryRowContext",
    ".Exec",
    ".ExecContext",
    ".execute",
    ".executemany",
    ".executescript",
    ".exec",
    ".raw",
    ".query_row",
    ".query_map",
    ".query_as",
    ".prepare",
    ".Prepare",
    ".executeQuery",
    ".executeUpdate",
    ".prepareStatement",
    ".createQuery",
    ".createNativeQuery",
    ".find_by_sql",
    "mysqli_query",
    "mysql_query",
    "pg_query",
    "sqlite3_exec",
];

static SQL_SHAPE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?is)\b(select\b.*\bfrom|insert\s+into|update\b.*\bset|delete\s+from)\b")
        .expect("valid regex")
});

const REMEDIATION: &str =
    "Use parameterized queries or prepared statements; never splice values into SQL text.";

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule::builtin(
            "sql_exec_dynamic",
            Category::SqlInjection,
            Severity::Critical,
            FragmentKinds::CALL,
            "Query executed from a string spliced with untrusted input",
            REMEDIATION,
            exec_dynamic,
        ),
        Rule::builtin(
            "sql_string_format",
            Category::SqlInjection,
            Severity::High,
            FragmentKinds::ASSIGNMENT | FragmentKinds::CALL,
            "SQL statement built by string formatting or concatenation",
            REMEDIATION,
            string_format,
        ),
        Rule::builtin(
            "sql_built_then_executed",
            Category::SqlInjection,
            Severity::Critical,
            FragmentKinds::ASSIGNMENT,
            "Dynamically built SQL statement is executed",
            REMEDIATION,
            built_then_executed,
        ),
    ]
}

fn is_dynamic_sql(expr: &Expr) -> bool {
    expr.splices_dynamic() && SQL_SHAPE.is_match(&expr.template())
}

fn exec_dynamic(w: &Window<'_>) -> Result<Option<Hit>, String> {
    Ok(w
        .head
        .iter()
        .find(|f| is_sink(f, QUERY_SINKS) && f.args.iter().any(is_dynamic_sql))
        .map(Hit::at))
}

fn string_format(w: &Window<'_>) -> Result<Option<Hit>, String> {
    Ok(w
        .head
        .iter()
        .find(|f| match f.kind {
            FragmentKind::Assignment => f.value().is_some_and(is_dynamic_sql),
            FragmentKind::Call => {
                // a standalone formatting call such as fmt.Sprintf(...)
                let call = CallExpr {
                    callee: f.text.clone(),
                    receiver: None,
                    args: f.args.clone(),
                };
                call.is_builder() && call.splices() && {
                    let expr = Expr {
                        operands: vec![Operand::Call(Box::new(call))],
                        ..Expr::default()
                    };
                    SQL_SHAPE.is_match(&expr.template())
                }
            }
            _ => false,
        })
        .map(Hit::at))
}

fn built_then_executed(w: &Window<'_>) -> Result<Option<Hit>, String> {
    Ok(built_then_used(w, is_dynamic_sql, |f| is_sink(f, QUERY_SINKS)))
}

#[cfg(test)]
use super::testing::hits;

#[test]
fn sprintf_query_is_flagged_once() {
    let src = "query := fmt.Sprintf(\"SELECT * FROM users WHERE id = %s\", userId)\nrows, err := db.Query(query)\n";
    let found = hits("sql_string_format", "db.go", src, 1);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("query := fmt.Sprintf"));
    assert!(hits("sql_exec_dynamic", "db.go", src, 1).is_empty());
}

#[test]
fn inline_concatenation_in_execute() {
    let src = "cursor.execute(\"SELECT * FROM users WHERE name = '\" + name + \"'\")\n";
    assert_eq!(hits("sql_exec_dynamic", "app.py", src, 1).len(), 1);

    let fstr = "cursor.execute(f\"DELETE FROM users WHERE id = {uid}\")\n";
    assert_eq!(hits("sql_exec_dynamic", "app.py", fstr, 1).len(), 1);
}

#[test]
fn parameterized_queries_are_clean() {
    let src = r#"
rows, err := db.Query("SELECT * FROM users WHERE id = ?", userId)
cursor.execute("SELECT * FROM users WHERE id = %s", (uid,))
conn.execute("DELETE FROM t WHERE id = ?1", params![id])?;
"#;
    for id in ["sql_exec_dynamic", "sql_string_format", "sql_built_then_executed"] {
        assert!(hits(id, "q.go", src, 3).is_empty(), "{id}");
    }
}

#[test]
fn non_sql_strings_are_ignored() {
    let src = "msg := fmt.Sprintf(\"hello %s\", name)\n";
    assert!(hits("sql_string_format", "m.go", src, 1).is_empty());
}

#[test]
fn built_then_executed_across_statements() {
    let src = "let q = format!(\"SELECT * FROM t WHERE name = '{}'\", name);\nconn.query(&q, &[])?;\n";
    assert_eq!(hits("sql_built_then_executed", "d.rs", src, 2).len(), 1);
    assert!(hits("sql_built_then_executed", "d.rs", src, 1).is_empty());
}
