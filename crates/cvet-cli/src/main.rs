use anyhow::Result;
use clap::{Parser, Subcommand};
use cvet_core::context::AnalyzerOptions;
use cvet_core::contract::ParamMode;
use cvet_core::diagnostics::DiagKind;
use cvet_parser::Driver;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "cvet")]
#[command(about = "cvet - flow-sensitive checker for annotated C-like sources")]
#[command(version = "0.1.0")]
#[command(author = "Gianluca Brigandi <gbrigand@gmail.com>")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Check source files and report diagnostics.
    Check {
        #[arg(required = true)]
        files: Vec<PathBuf>,

        /// Suppress a diagnostic kind (repeatable).
        #[arg(long, value_name = "KIND")]
        suppress: Vec<DiagKind>,

        /// Report only the given kinds (repeatable).
        #[arg(long, value_name = "KIND")]
        only: Vec<DiagKind>,

        #[arg(long)]
        json: bool,

        /// Write per-function summaries as JSON to this path.
        #[arg(long, value_name = "PATH")]
        summaries: Option<PathBuf>,

        #[arg(short, long)]
        verbose: bool,
    },

    /// Parse one file and report whether it is syntactically valid.
    Parse {
        file: PathBuf,

        #[arg(short, long)]
        verbose: bool,
    },

    /// List the function contracts declared in one file.
    Contracts {
        file: PathBuf,

        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Check {
            files,
            suppress,
            only,
            json,
            summaries,
            verbose,
        } => cmd_check(files, suppress, only, json, summaries, verbose),
        Commands::Parse { file, verbose } => cmd_parse(file, verbose),
        Commands::Contracts { file, json } => cmd_contracts(file, json),
    }
}

fn cmd_check(
    files: Vec<PathBuf>,
    suppress: Vec<DiagKind>,
    only: Vec<DiagKind>,
    json: bool,
    summaries: Option<PathBuf>,
    verbose: bool,
) -> Result<()> {
    use colored::*;
    use cvet_report::config::{OutputFormat, ReportConfig};
    use cvet_report::Renderer;
    use std::fs;

    let mut driver = Driver::new(AnalyzerOptions::default());
    for kind in suppress {
        driver.analyzer_mut().reporter.disable(kind);
    }
    if !only.is_empty() {
        driver.analyzer_mut().reporter.restrict_to(only);
    }

    if verbose {
        println!("{}", " cvet".bright_blue().bold());
        println!("{}", "=".repeat(50).bright_blue());
        for file in &files {
            println!(" Input: {}", file.display());
        }
        println!();
    }

    for file in &files {
        if verbose {
            println!(" Checking {}...", file.display());
        }
        driver.check_file(file)?;
    }

    let source_files = driver.analyzer().files.clone();
    let outcome = driver.finish();

    if let Some(path) = summaries {
        let mut out = fs::File::create(&path)?;
        cvet_report::output::write_summaries(&mut out, &outcome.summaries)?;
        if verbose {
            println!(" Summaries written to: {}", path.display());
        }
    }

    let mut stdout = std::io::stdout().lock();
    if json {
        cvet_report::output::write_report(
            &mut stdout,
            &outcome.diagnostics,
            &outcome.summaries,
            outcome.suppressed,
        )?;
    } else {
        let renderer = Renderer::new(ReportConfig {
            color: true,
            format: OutputFormat::Text,
            show_suppressed: verbose,
        });
        if verbose {
            for summary in &outcome.summaries {
                println!(" {}", renderer.render_summary(summary));
            }
            println!();
        }
        renderer.write_report(
            &mut stdout,
            &source_files,
            &outcome.diagnostics,
            outcome.suppressed,
        )?;
    }
    drop(stdout);

    if !outcome.diagnostics.is_empty() {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_parse(file: PathBuf, verbose: bool) -> Result<()> {
    use colored::*;
    use std::fs;

    if verbose {
        println!("{}", " Parsing".bright_cyan().bold());
        println!(" Input: {}", file.display());
        println!();
    }

    let source = fs::read_to_string(&file)?;

    match cvet_parser::parse(&source) {
        Ok(pairs) => {
            let count = pairs.count();
            println!("{}", " VALID".bright_green().bold());
            if verbose {
                println!("   Parsed {} top-level items", count);
            }
            Ok(())
        }
        Err(e) => {
            println!("{}", " INVALID".bright_red().bold());
            println!("\n{}", "Parse Error:".bright_red());
            println!("{}", e);
            Err(anyhow::anyhow!("parse failed"))
        }
    }
}

fn cmd_contracts(file: PathBuf, json: bool) -> Result<()> {
    use colored::*;
    use std::collections::HashSet;

    // builtin contracts are preloaded; only contracts from the file are listed
    let builtin: HashSet<String> = Driver::new(AnalyzerOptions::default())
        .analyzer()
        .contracts
        .iter()
        .map(|c| c.name.clone())
        .collect();

    let mut driver = Driver::new(AnalyzerOptions::default());
    driver.analyzer_mut().reporter.restrict_to(std::iter::empty());
    driver.check_file(&file)?;

    let az = driver.analyzer();
    let declared: Vec<_> = az
        .contracts
        .iter()
        .filter(|c| !builtin.contains(&c.name))
        .collect();

    if json {
        use std::io::Write;
        let mut stdout = std::io::stdout().lock();
        serde_json::to_writer_pretty(&mut stdout, &declared)?;
        writeln!(stdout)?;
        return Ok(());
    }

    for contract in &declared {
        let params = contract
            .params
            .iter()
            .map(|p| {
                let mut s = String::new();
                if let Some(label) = mode_label(p.mode) {
                    s.push_str(label);
                    s.push(' ');
                }
                if p.not_null {
                    s.push_str("notnull ");
                }
                s.push_str(&format!("{} {}", p.ty, p.name));
                s
            })
            .collect::<Vec<_>>()
            .join(", ");
        let params = if contract.variadic {
            format!("{}, ...", params)
        } else {
            params
        };

        println!(
            "{}",
            format!("{} {}({})", contract.returns, contract.name, params)
                .bright_green()
                .bold()
        );
        if !contract.globals.is_empty() {
            println!("  globals: {}", contract.globals.join(", "));
        }
        match &contract.modifies {
            None => println!("  modifies: unconstrained"),
            Some(m) if m.is_empty() => println!("  modifies: nothing"),
            Some(m) => println!("  modifies: {}", m.join(", ")),
        }
        if contract.result_null {
            println!("  result may be null");
        }
        if contract.exits.must_escape() {
            println!("  never returns");
        }
    }

    if declared.is_empty() {
        println!("no contracts found");
    }
    Ok(())
}

fn mode_label(mode: ParamMode) -> Option<&'static str> {
    match mode {
        ParamMode::None => None,
        ParamMode::Sef => Some("sef"),
        ParamMode::Out => Some("out"),
        ParamMode::Returned => Some("returned"),
        ParamMode::Only => Some("only"),
        ParamMode::Unique => Some("unique"),
        ParamMode::Keep => Some("keep"),
        ParamMode::Observer => Some("observer"),
    }
}
