//! Command-line interface for validating signal mapping documents.

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use sigmap_core::{MachineDescription, MappingError, SchemaCatalog, SignalMap};
use tracing_subscriber::EnvFilter;

/// Exit codes: 0 the mapping is valid; 1 an internal error occurred; 2 the
/// document is not valid restricted YAML or has a malformed shape; 3 the
/// mapping data is invalid.
const EXIT_SYNTAX: u8 = 2;
const EXIT_INVALID: u8 = 3;

/// Validate signal mapping documents against a schema catalog and a machine
/// description.
#[derive(Parser, Debug)]
#[command(name = "sigmap")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Action to perform.
    #[command(subcommand)]
    command: Command,

    /// Schema catalog JSON file.
    #[arg(long, global = true)]
    schema: Option<PathBuf>,

    /// Machine description JSON file.
    #[arg(long, global = true)]
    machine_description: Option<PathBuf>,
}

/// Available commands.
#[derive(Subcommand, Debug)]
enum Command {
    /// Validate a mapping document.
    Validate {
        /// Mapping file to validate.
        mapping_file: PathBuf,
        /// Silence success output.
        #[arg(short, long)]
        quiet: bool,
    },
    /// Display statistics about a mapping document.
    Describe {
        /// Mapping file to describe.
        mapping_file: PathBuf,
    },
}

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let schema_path = args
        .schema
        .context("--schema <catalog.json> is required")?;
    let md_path = args
        .machine_description
        .context("--machine-description <md.json> is required")?;

    let schema = SchemaCatalog::from_file(&schema_path)
        .with_context(|| format!("loading schema catalog {}", schema_path.display()))?;
    let md = MachineDescription::from_file(&md_path)
        .with_context(|| format!("loading machine description {}", md_path.display()))?;
    tracing::debug!(
        schema = %schema_path.display(),
        machine_description = %md_path.display(),
        "catalogs loaded"
    );

    match args.command {
        Command::Validate {
            mapping_file,
            quiet,
        } => {
            if !quiet {
                println!("Validating \"{}\" ...", mapping_file.display());
            }
            match SignalMap::from_yaml_file(&mapping_file, &schema, &md) {
                Ok(_) => {
                    if !quiet {
                        println!(
                            "Success: {} is a valid signal mapping file",
                            mapping_file.display()
                        );
                    }
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => Ok(report(&mapping_file, err)),
            }
        }
        Command::Describe { mapping_file } => {
            match SignalMap::from_yaml_file(&mapping_file, &schema, &md) {
                Ok(map) => {
                    describe(&mapping_file, &map);
                    Ok(ExitCode::SUCCESS)
                }
                Err(err) => Ok(report(&mapping_file, err)),
            }
        }
    }
}

/// Print the failure and pick the exit code for its error class.
fn report(mapping_file: &std::path::Path, err: MappingError) -> ExitCode {
    eprintln!("Error in \"{}\":", mapping_file.display());
    eprintln!("{err}");
    let code = match err {
        MappingError::Syntax(_) | MappingError::Structure(_) => EXIT_SYNTAX,
        _ => EXIT_INVALID,
    };
    ExitCode::from(code)
}

fn describe(mapping_file: &std::path::Path, map: &SignalMap) {
    let header = map.header();
    println!(
        "\"{}\" maps {} signals to the {} structure (schema version {}).",
        mapping_file.display(),
        map.num_signals(),
        header.target_structure,
        header.schema_version,
    );
    println!();
    for (slot, channels) in map.iter() {
        let num_signals: usize = channels.iter().map(|c| c.signals.len()).sum();
        println!(
            "- '{slot}' has {} mapped channel(s) with {num_signals} signal(s).",
            channels.len()
        );
        let converted = channels
            .iter()
            .flat_map(|c| &c.signals)
            .filter(|s| !s.conversion.is_identity())
            .count();
        if num_signals > 0 {
            println!(
                "  {converted} signal(s) ({:.0}%) have a unit that differs from the schema \
                 (but can be transformed).",
                100.0 * converted as f64 / num_signals as f64
            );
        }
    }
}
