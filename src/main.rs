use anyhow::{anyhow, Context, Result};
use apatch::{plan_patch, process_patch, ActionType, DirAccess};
use clap::Parser;
use colored::Colorize;
use env_logger::Builder;
use log::{info, warn, Level, LevelFilter};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};

// --- Main Application Entry Point ---

fn main() {
    let args = Args::parse();

    if let Err(e) = run(args) {
        // Using {:?} prints the full error chain from `anyhow`.
        eprintln!("{} {:?}", "error:".red().bold(), e);
        std::process::exit(1);
    }
}

/// Contains the primary logic of the application.
fn run(args: Args) -> Result<()> {
    setup_logging(args.verbose);

    // --- Argument Validation ---
    if !args.directory.is_dir() {
        return Err(anyhow!(
            "Target directory '{}' not found or is not a directory.",
            args.directory.display()
        ));
    }

    // --- Patch Input ---
    let patch_text = read_patch_text(args.patch_file.as_deref())?;
    if patch_text.trim().is_empty() {
        return Err(anyhow!(
            "Please pass patch text through stdin or as a file argument."
        ));
    }

    let mut access = DirAccess::new(&args.directory);

    if args.dry_run {
        let plan = plan_patch(&patch_text, &access).context("Failed to parse patch")?;
        for (path, change) in plan.commit.iter() {
            match (change.kind, &change.move_path) {
                (ActionType::Update, Some(dest)) => info!(
                    "Would update '{}' and move it to '{}'",
                    path.display(),
                    dest.display()
                ),
                (kind, _) => info!("Would {} '{}'", kind.to_string().to_lowercase(), path.display()),
            }
        }
        print!("{}", plan.commit.unified_diff());
        if plan.fuzz > 0 {
            warn!("Patch located with total fuzz {}.", plan.fuzz);
        }
        info!("DRY RUN completed. No files were modified.");
        return Ok(());
    }

    let status = process_patch(&patch_text, &mut access).with_context(|| {
        format!(
            "Failed to apply patch in '{}'",
            args.directory.display()
        )
    })?;
    println!("{}", status);
    Ok(())
}

/// Reads the patch from a file, or from stdin when no file (or `-`) is given.
fn read_patch_text(patch_file: Option<&Path>) -> Result<String> {
    match patch_file {
        Some(path) if path != Path::new("-") => fs::read_to_string(path)
            .with_context(|| format!("Failed to read patch file '{}'", path.display())),
        _ => {
            let mut text = String::new();
            io::stdin()
                .read_to_string(&mut text)
                .context("Failed to read patch from stdin")?;
            Ok(text)
        }
    }
}

/// Defines the command-line arguments for the application.
#[derive(clap::Parser, Debug)]
#[command(
    author,
    version,
    about = "Apply '*** Begin Patch' directives to files, locating hunks by their context.",
    long_about = "Reads a patch in the '*** Begin Patch' / '*** End Patch' format from a file or stdin and applies its add, update, delete and move directives relative to a target directory."
)]
struct Args {
    /// Path to the patch file. Reads stdin when omitted or '-'.
    patch_file: Option<PathBuf>,
    /// Directory the paths in the patch are relative to.
    #[arg(short = 'C', long, default_value = ".")]
    directory: PathBuf,
    /// If set, show what would be done, but don't modify any files.
    #[arg(
        short = 'n',
        long,
        help = "Show what would be done, but don't modify files."
    )]
    dry_run: bool,
    /// Increase logging verbosity. Can be used multiple times.
    /// -v for info, -vv for debug, -vvv for trace.
    #[arg(short, long, action = clap::ArgAction::Count, long_help = "Increase logging verbosity.\n-v for info, -vv for debug, -vvv for trace.")]
    verbose: u8,
}

/// Sets up the global logger with a level derived from `-v` flags.
fn setup_logging(verbose: u8) {
    let log_level = match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Info,
        2 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };

    Builder::new()
        .filter_level(log_level)
        .format(|buf, record| match record.level() {
            Level::Error => writeln!(buf, "{} {}", "error:".red().bold(), record.args()),
            Level::Warn => writeln!(buf, "{} {}", "warning:".yellow().bold(), record.args()),
            Level::Info => writeln!(buf, "{}", record.args()),
            Level::Debug => writeln!(buf, "{} {}", "debug:".blue().bold(), record.args()),
            Level::Trace => writeln!(buf, "{} {}", "trace:".cyan().bold(), record.args()),
        })
        .init();
}
