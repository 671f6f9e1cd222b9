use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(name = "vulnsift")]
#[command(about = "A fast pattern-based scanner for injection, secret and weak-crypto anti-patterns")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Scan a file or directory for vulnerable patterns
    Scan {
        /// Path to scan (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,

        /// Output format: console, json or sarif
        #[arg(short, long, default_value = "")]
        format: String,

        /// Minimum severity to report
        #[arg(short, long)]
        severity: Option<String>,

        /// Comma-separated categories to run (default: all)
        #[arg(short, long, value_delimiter = ',')]
        categories: Vec<String>,

        /// Statements per matching window
        #[arg(short, long)]
        window: Option<usize>,

        /// Keep overlapping findings of the same category
        #[arg(long)]
        no_dedupe: bool,

        /// Exit with status 1 when a finding reaches this severity
        #[arg(long)]
        fail_on: Option<String>,

        /// Print findings only
        #[arg(short, long)]
        quiet: bool,
    },

    /// List the detection rules
    Rules {
        /// Only rules of this category
        #[arg(short, long)]
        category: Option<String>,

        /// Show descriptions and remediation hints
        #[arg(short, long)]
        verbose: bool,
    },
}

#[test]
fn scan_flags_parse() {
    let cli = Cli::parse_from([
        "vulnsift",
        "scan",
        "src",
        "--format",
        "json",
        "--categories",
        "ssrf,weak-crypto",
        "--window",
        "3",
        "--no-dedupe",
        "--fail-on",
        "critical",
    ]);
    match cli.command {
        Commands::Scan {
            path,
            format,
            categories,
            window,
            no_dedupe,
            fail_on,
            severity,
            quiet,
        } => {
            assert_eq!(path, "src");
            assert_eq!(format, "json");
            assert_eq!(categories, vec!["ssrf", "weak-crypto"]);
            assert_eq!(window, Some(3));
            assert!(no_dedupe);
            assert_eq!(fail_on.as_deref(), Some("critical"));
            assert_eq!(severity, None);
            assert!(!quiet);
        }
        Commands::Rules { .. } => panic!("expected scan"),
    }
}

#[test]
fn command_definition_is_consistent() {
    use clap::CommandFactory;
    Cli::command().debug_assert();
}
