//! Label manifest builder for class-per-subdirectory image trees.
//!
//! Walks a dataset root whose immediate subdirectories name the classes,
//! and writes a `dataset.json` manifest pairing every image's relative
//! path with its class index:
//!
//! ```text
//! input/
//!   cat/  -> class 0
//!   dog/  -> class 1
//! ```
//!
//! Run with `create-labels --input ./input/`.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;
use tracing_subscriber::EnvFilter;

use ml_manifest::{write_manifest, ManifestBuild, MANIFEST_FILE};

/// Build a dataset.json label manifest from a class-per-subdirectory tree.
#[derive(Parser)]
#[command(name = "create-labels")]
#[command(version)]
struct Cli {
    /// Dataset root whose immediate subdirectories name the classes
    #[arg(short, long, default_value = "./input/")]
    input: PathBuf,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let cli = Cli::parse();

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err:#}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> anyhow::Result<()> {
    let build = write_manifest(&cli.input)
        .with_context(|| format!("failed to build manifest for {}", cli.input.display()))?;

    report(&build);
    Ok(())
}

fn report(build: &ManifestBuild) {
    println!("classes:");
    for (name, index) in build.vocabulary.iter() {
        println!("  {name} -> {index}");
    }

    let summary = build.summary;
    println!(
        "labeled {} of {} files ({} hidden, {} without a class directory)",
        summary.files_labeled,
        summary.files_visited(),
        summary.dotted_skipped,
        summary.stray_skipped,
    );
    println!("wrote {MANIFEST_FILE}");
}
