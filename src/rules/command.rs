use super::{Category, Hit, Rule, Severity, built_then_used, is_sink, positional};
use crate::engine::Window;
use crate::tokenizer::{Expr, FragmentKinds};
use once_cell::sync::Lazy;
use regex::Regex;

/// Process-spawning primitives, by ecosystem.
const SHELL_SINKS: &[&str] = &[
    // Go
    "exec.Command",
    "exec.CommandContext",
    "syscall.Exec",
    // Python
    "os.system",
    "os.popen",
    "os.spawnl",
    "os.execl",
    "subprocess.call",
    "subprocess.run",
    "subprocess.Popen",
    "subprocess.check_call",
    "subprocess.check_output",
    "subprocess.getoutput",
    "subprocess.getstatusoutput",
    "commands.getoutput",
    // Rust
    "Command.new",
    // Node
    "child_process.exec",
    "child_process.execSync",
    "child_process.spawn",
    "child_process.execFile",
    "exec",
    "execSync",
    "execFile",
    "spawn",
    "spawnSync",
    // Java
    "Runtime.getRuntime",
    "ProcessBuilder",
    // PHP / Ruby / C
    "shell_exec",
    "system",
    "passthru",
    "proc_open",
    "popen",
    "IO.popen",
    "Open3.capture2",
    "Open3.capture3",
    "Open3.popen3",
    "Kernel.system",
    "execl",
    "execlp",
    "execvp",
];

const SHELL_FLAG_SINKS: &[&str] = &[
    "subprocess.call",
    "subprocess.run",
    "subprocess.Popen",
    "subprocess.check_call",
    "subprocess.check_output",
    "child_process.spawn",
    "child_process.execFile",
    "spawn",
    "spawnSync",
    "execFile",
];

static SHELL_TRUE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bshell\s*[:=]\s*true\b").expect("valid regex"));

const REMEDIATION: &str = "Pass the program and its arguments as separate values without a shell, \
     and validate untrusted input against an allow-list.";

pub(super) fn rules() -> Vec<Rule> {
    vec![
        Rule::builtin(
            "cmd_shell_concat",
            Category::CommandInjection,
            Severity::High,
            FragmentKinds::CALL,
            "Shell command built from untrusted input",
            REMEDIATION,
            shell_concat,
        ),
        Rule::builtin(
            "cmd_shell_flag",
            Category::CommandInjection,
            Severity::High,
            FragmentKinds::CALL,
            "Subprocess started through a shell with a non-literal command",
            REMEDIATION,
            shell_flag,
        ),
        Rule::builtin(
            "cmd_built_then_executed",
            Category::CommandInjection,
            Severity::High,
            FragmentKinds::ASSIGNMENT,
            "Command string built from untrusted input is executed",
            REMEDIATION,
            built_then_executed,
        ),
    ]
}

fn shell_concat(w: &Window<'_>) -> Result<Option<Hit>, String> {
    Ok(w
        .head
        .iter()
        .find(|f| is_sink(f, SHELL_SINKS) && f.args.iter().any(Expr::splices_dynamic))
        .map(Hit::at))
}

fn shell_flag(w: &Window<'_>) -> Result<Option<Hit>, String> {
    Ok(w
        .head
        .iter()
        .find(|f| {
            is_sink(f, SHELL_FLAG_SINKS)
                && f.args
                    .iter()
                    .any(|a| SHELL_TRUE.is_match(w.text_of(a.span)))
                && positional(f).next().is_some_and(Expr::is_dynamic)
        })
        .map(|f| Hit::at(f).with_message("Subprocess spawned with shell=True on a non-literal command")))
}

fn built_then_executed(w: &Window<'_>) -> Result<Option<Hit>, String> {
    Ok(built_then_used(w, Expr::splices_dynamic, |f| {
        is_sink(f, SHELL_SINKS)
    }))
}

#[cfg(test)]
use super::testing::hits;

#[test]
fn go_exec_with_concatenation() {
    let found = hits(
        "cmd_shell_concat",
        "main.go",
        r#"exec.Command("sh", "-c", "ls -la "+userInput).Run()"#,
        1,
    );
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("exec.Command("));
}

#[test]
fn rust_builder_chain_with_format() {
    let src = r#"
fn list(user_input: &str) {
    let out = Command::new("sh")
        .arg("-c")
        .arg(format!("ls -la {}", user_input))
        .output();
}
"#;
    let found = hits("cmd_shell_concat", "lib.rs", src, 1);
    assert_eq!(found.len(), 1);
    assert!(found[0].starts_with("arg(format!"));
}

#[test]
fn python_shell_true() {
    let src = "subprocess.run(cmd, shell=True)\nsubprocess.run(['ls', '-la'], shell=False)\n";
    let found = hits("cmd_shell_flag", "tool.py", src, 1);
    assert_eq!(found, vec!["subprocess.run(cmd, shell=True)"]);
}

#[test]
fn literal_commands_are_clean() {
    let src = r#"exec.Command("ls", "-la").Run()
os.system("uptime")
"#;
    assert!(hits("cmd_shell_concat", "a.go", src, 1).is_empty());
    assert!(hits("cmd_shell_concat", "a.py", "os.system(\"uptime\")\n", 1).is_empty());
}

#[test]
fn built_then_executed_needs_wider_window() {
    let src = "cmd = \"ping -c 1 \" + host\nos.system(cmd)\n";
    assert!(hits("cmd_built_then_executed", "n.py", src, 1).is_empty());
    assert_eq!(
        hits("cmd_built_then_executed", "n.py", src, 2),
        vec!["cmd = \"ping -c 1 \" + host"]
    );
}
