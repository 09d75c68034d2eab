use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use refactor_guard::config::load_or_default;
use refactor_guard::edit::atomic_write;
use refactor_guard::lang::Language;
use refactor_guard::{
    Mode, Orchestrator, RefactorType, TransformationRequest, TransformationResult,
};
use similar::{ChangeTag, TextDiff};
use std::fs;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "refactor-guard")]
#[command(about = "LLM-backed refactoring that never hands back broken code", long_about = None)]
#[command(version)]
struct Cli {
    /// Config file (defaults to ~/.config/refactor-guard/config.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log at debug level
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform one or more source files
    Transform {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Override the configured mode (hybrid, local, remote)
        #[arg(short, long)]
        mode: Option<Mode>,

        /// Language identifier (detected from the extension otherwise)
        #[arg(short, long)]
        language: Option<String>,

        /// Model override for the selected backend
        #[arg(long)]
        model: Option<String>,

        /// Session id used to group failures
        #[arg(long)]
        session: Option<String>,

        /// Refactoring focus (comprehensive, performance, readability, security)
        #[arg(long)]
        refactor_type: Option<RefactorType>,

        /// Show unified diff of changes
        #[arg(short, long)]
        diff: bool,

        /// Write successful results back to the files
        #[arg(short, long)]
        write: bool,

        /// Print results as JSON lines
        #[arg(long)]
        json: bool,
    },

    /// Show configured backends and their circuit state
    Probe {
        #[arg(long)]
        json: bool,
    },

    /// List supported language identifiers
    Languages,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match cli.command {
        Commands::Transform {
            files,
            mode,
            language,
            model,
            session,
            refactor_type,
            diff,
            write,
            json,
        } => cmd_transform(
            cli.config.as_deref(),
            TransformArgs {
                files,
                mode,
                language,
                model,
                session,
                refactor_type,
                diff,
                write,
                json,
            },
        ),
        Commands::Probe { json } => cmd_probe(cli.config.as_deref(), json),
        Commands::Languages => cmd_languages(),
    }
}

fn init_tracing(verbose: bool) {
    let default = if verbose {
        "refactor_guard=debug"
    } else {
        "refactor_guard=info"
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

struct TransformArgs {
    files: Vec<PathBuf>,
    mode: Option<Mode>,
    language: Option<String>,
    model: Option<String>,
    session: Option<String>,
    refactor_type: Option<RefactorType>,
    diff: bool,
    write: bool,
    json: bool,
}

fn cmd_transform(config_path: Option<&Path>, args: TransformArgs) -> Result<()> {
    let mut config = load_or_default(config_path)?;
    if let Some(mode) = args.mode {
        config.mode = mode;
    }
    if let Some(refactor_type) = args.refactor_type {
        config.processing.refactor_type = refactor_type;
    }
    let orchestrator = Orchestrator::from_config(&config);

    let mut succeeded = 0usize;
    let mut changed = 0usize;
    let mut failed = 0usize;

    for file in &args.files {
        let language = match &args.language {
            Some(language) => language.clone(),
            None => match Language::from_path(file) {
                Some(language) => language.identifier().to_string(),
                None => {
                    eprintln!(
                        "{} {}: cannot detect language, pass --language",
                        "✗".red(),
                        file.display()
                    );
                    failed += 1;
                    continue;
                }
            },
        };
        let code = fs::read_to_string(file)
            .with_context(|| format!("failed to read {}", file.display()))?;

        let mut request = TransformationRequest::for_file(file, code.as_str(), language);
        if let Some(session) = &args.session {
            request = request.with_session(session.as_str());
        }
        if let Some(model) = &args.model {
            request = request.with_model(model.as_str());
        }

        let result = orchestrator.transform(&request);
        if result.success {
            succeeded += 1;
        } else {
            failed += 1;
        }

        if args.json {
            println!("{}", serde_json::to_string(&FileReport::new(file, &result))?);
        } else {
            report(file, &result);
        }
        if args.diff && result.changed(&code) {
            display_diff(file, &code, &result.final_code);
        }
        if result.changed(&code) {
            changed += 1;
            if args.write {
                atomic_write(file, result.final_code.as_bytes())
                    .with_context(|| format!("failed to write {}", file.display()))?;
            }
        }
    }

    if !args.json {
        println!();
        println!("{}", "Summary:".bold());
        println!("  {} succeeded", format!("{}", succeeded).green());
        println!("  {} changed", format!("{}", changed).cyan());
        println!("  {} failed", format!("{}", failed).red());
    }

    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[derive(serde::Serialize)]
struct FileReport<'a> {
    file: String,
    #[serde(flatten)]
    result: &'a TransformationResult,
}

impl<'a> FileReport<'a> {
    fn new(file: &Path, result: &'a TransformationResult) -> Self {
        Self {
            file: file.display().to_string(),
            result,
        }
    }
}

fn report(file: &Path, result: &TransformationResult) {
    if result.success {
        println!("{} {}", "✓".green(), file.display());
        for change in &result.changes {
            println!("    {}", change.dimmed());
        }
    } else if let Some(error) = &result.error {
        eprintln!("{} {}: {}", "✗".red(), file.display(), error);
    }
    for warning in &result.warnings {
        eprintln!("    {} {}", "warning:".yellow(), warning);
    }
}

/// Show unified diff between original and transformed content
fn display_diff(file: &Path, original: &str, modified: &str) {
    println!(
        "\n{}",
        format!("--- {} (original)", file.display()).dimmed()
    );
    println!("{}", format!("+++ {} (transformed)", file.display()).dimmed());

    let diff = TextDiff::from_lines(original, modified);

    for change in diff.iter_all_changes() {
        let sign = match change.tag() {
            ChangeTag::Delete => format!("-{}", change).red(),
            ChangeTag::Insert => format!("+{}", change).green(),
            ChangeTag::Equal => format!(" {}", change).normal(),
        };
        print!("{}", sign);
    }
}

fn cmd_probe(config_path: Option<&Path>, json: bool) -> Result<()> {
    let config = load_or_default(config_path)?;
    let orchestrator = Orchestrator::from_config(&config);
    let probes = orchestrator.probe();

    if json {
        println!("{}", serde_json::to_string_pretty(&probes)?);
        return Ok(());
    }

    println!("{} {}", "Mode:".bold(), orchestrator.mode());
    for probe in probes {
        let status = if !probe.configured {
            "not configured".dimmed()
        } else if probe.circuit_open {
            "circuit open".red()
        } else if probe.available {
            "available".green()
        } else {
            "unreachable".yellow()
        };
        println!("  {:<7} {:<40} {}", probe.kind.as_str(), probe.name, status);
    }
    Ok(())
}

fn cmd_languages() -> Result<()> {
    for language in Language::ALL {
        let aliases = language.aliases().join(", ");
        if aliases.is_empty() {
            println!("{:<12} {}", language.identifier(), language.display_name());
        } else {
            println!(
                "{:<12} {} ({})",
                language.identifier(),
                language.display_name(),
                aliases.dimmed()
            );
        }
    }
    Ok(())
}
