use clap::{Parser, Subcommand};
use std::path::PathBuf;
use anyhow::{bail, Context, Result};
use jetgen::{samples, Config, Error, FailurePolicy, OutputMode};
use log::info;

#[derive(Parser)]
#[command(name = "jetgen")]
#[command(about = "JVM backend for the Jet language")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List the bundled resolved programs
    Samples,

    /// Generate classes for a bundled program
    Emit {
        /// Sample name, see `jetgen samples`
        #[arg(value_name = "SAMPLE")]
        sample: String,

        /// Output directory for generated classes
        #[arg(short, long, value_name = "DIR")]
        out: Option<PathBuf>,

        /// Write textual listings instead of .class files
        #[arg(long)]
        text: bool,

        /// Record failing files and keep generating the rest
        #[arg(long)]
        keep_going: bool,

        /// Move top-level function bodies to per-file part classes
        #[arg(long)]
        parts: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { log::LevelFilter::Debug } else { log::LevelFilter::Warn };
    env_logger::Builder::from_default_env().filter_level(level).init();

    match &cli.command {
        Commands::Samples => list_samples(),
        Commands::Emit { sample, out, text, keep_going, parts } => {
            emit(sample, out.as_ref(), *text, *keep_going, *parts)?;
        }
    }

    Ok(())
}

fn list_samples() {
    for sample in samples::all() {
        println!("{:<10} {}", sample.name, sample.description);
    }
}

fn emit(name: &str, out: Option<&PathBuf>, text: bool, keep_going: bool, parts: bool) -> Result<()> {
    let Some(sample) = samples::find(name) else {
        bail!("unknown sample '{}', run `jetgen samples` for the list", name);
    };

    let mut config = Config::from_env()?.with_namespace_parts(parts);
    if text {
        config = config.with_output_mode(OutputMode::Text);
    }
    if keep_going {
        config = config.with_failure_policy(FailurePolicy::RecordAndContinue);
    }

    let program = sample.program();
    let mut factory = jetgen::generate_files(&program.files, program.bindings, config)
        .with_context(|| format!("generating sample '{}'", name))?;

    for failure in factory.failures() {
        eprintln!("error: {}", failure);
        let mut cause = std::error::Error::source(&failure.error);
        while let Some(inner) = cause {
            eprintln!("  caused by: {}", inner);
            cause = inner.source();
        }
    }

    let default_output = PathBuf::from(".");
    let output_dir = out.unwrap_or(&default_output);
    let written = factory.write_to(output_dir)?;
    info!("sample '{}' produced {} class(es)", name, written);
    println!("Wrote {} file(s) to {}", written, output_dir.display());

    if let Err(Error::Compilation { failures }) = factory.check_failures() {
        bail!("{} file(s) failed to generate", failures.len());
    }
    Ok(())
}
