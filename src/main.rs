//! hashmatch command line
//!
//! ```bash
//! # Hash a contact export, keeping unparseable phones for review
//! hashmatch hash --input-file contacts.csv --output-file hashed.csv \
//!     --bad-records-file bad_phones.csv
//!
//! # Map a non-standard column onto a logical field
//! hashmatch hash -i export.csv -o hashed.csv --column pseudonym=member_id
//!
//! # Match two hashed files
//! hashmatch match --hashed-file-1 a.csv --hashed-file-2 b.csv --output-file matches.csv
//! ```
//!
//! Logging goes to stderr and honours `RUST_LOG`; summaries go to stdout.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hashmatch::algorithms::Region;
use hashmatch::config::{HashConfig, MatchConfig, PhoneMatchPolicy};
use hashmatch::schema::FieldSchemaBuilder;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "hashmatch")]
#[command(version)]
#[command(about = "Hash contact records and match hashed datasets")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Log at debug level (overridden by RUST_LOG)
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Normalize and fingerprint a raw contact CSV
    Hash {
        /// Raw input CSV
        #[arg(short, long)]
        input_file: PathBuf,

        /// Hashed output CSV
        #[arg(short, long)]
        output_file: PathBuf,

        /// Side file for phone values that could not be canonicalized
        #[arg(short, long)]
        bad_records_file: Option<PathBuf>,

        /// Region national phone numbers are read in: us or ca
        #[arg(long, default_value_t = Region::US)]
        region: Region,

        /// Prefer COLUMN for FIELD, e.g. `email=contact_mail` (repeatable)
        #[arg(long = "column", value_name = "FIELD=COLUMN")]
        columns: Vec<String>,

        /// Hash on the current thread only
        #[arg(long)]
        sequential: bool,
    },

    /// Find pseudonym pairs sharing a fingerprint across two hashed CSVs
    Match {
        /// First hashed CSV
        #[arg(long)]
        hashed_file_1: PathBuf,

        /// Second hashed CSV
        #[arg(long)]
        hashed_file_2: PathBuf,

        /// Match report CSV
        #[arg(short, long)]
        output_file: PathBuf,

        /// How phone slots pair up: any-slot or positional
        #[arg(long, default_value_t = PhoneMatchPolicy::AnySlot)]
        phone_policy: PhoneMatchPolicy,

        /// Separator inside the matched-hash list columns
        #[arg(long, default_value = "|")]
        list_delimiter: String,
    },
}

fn init_logging(debug: bool) {
    let default = if debug { "debug" } else { "info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.debug);

    let result = match cli.command {
        Commands::Hash {
            input_file,
            output_file,
            bad_records_file,
            region,
            columns,
            sequential,
        } => cmd_hash(
            &input_file,
            &output_file,
            bad_records_file.as_deref(),
            HashConfig {
                region,
                parallel: !sequential,
                ..HashConfig::default()
            },
            &columns,
        ),
        Commands::Match {
            hashed_file_1,
            hashed_file_2,
            output_file,
            phone_policy,
            list_delimiter,
        } => cmd_match(
            &hashed_file_1,
            &hashed_file_2,
            &output_file,
            MatchConfig {
                phone_policy,
                list_delimiter,
            },
        ),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    }
}

fn cmd_hash(
    input: &Path,
    output: &Path,
    bad_records: Option<&Path>,
    config: HashConfig,
    columns: &[String],
) -> Result<()> {
    let mut schema = FieldSchemaBuilder::standard();
    for column in columns {
        schema = schema.apply_override(column)?;
    }
    let schema = schema.build().context("invalid column mapping")?;

    let stats = hashmatch::hash_csv(input, output, bad_records, schema, config)
        .with_context(|| format!("hashing {} failed", input.display()))?;

    print!("{stats}");
    println!("Hashed output: {}", output.display());
    if let Some(path) = bad_records {
        println!("Bad phone records: {}", path.display());
    }
    Ok(())
}

fn cmd_match(first: &Path, second: &Path, output: &Path, config: MatchConfig) -> Result<()> {
    let summary = hashmatch::match_csv(first, second, output, &config).context("matching failed")?;

    print!("{summary}");
    println!("Match report: {}", output.display());
    Ok(())
}
