use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use swipe::Swipe;

/// Generate transports, documents, and config loaders for the services
/// declared in the given packages.
#[derive(Parser)]
#[command(name = "swipe", version, about)]
struct Cli {
    /// Package patterns (directories or globs of .rs files).
    #[arg(required = true)]
    patterns: Vec<String>,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| "warn".into()))
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let wd = match std::env::current_dir() {
        Ok(wd) => wd,
        Err(err) => {
            eprintln!("swipe: cannot determine working directory: {err}");
            return ExitCode::FAILURE;
        }
    };

    let (results, diagnostics) = Swipe::new(wd, cli.patterns).run();

    let mut failed = !diagnostics.is_empty();
    for diagnostic in &diagnostics {
        eprintln!("{diagnostic}");
    }
    for result in &results {
        for err in &result.errs {
            failed = true;
            eprintln!("{}: {err}", result.output_path.display());
        }
    }

    if failed {
        ExitCode::FAILURE
    } else {
        ExitCode::SUCCESS
    }
}
