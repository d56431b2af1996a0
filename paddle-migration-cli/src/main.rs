//! Paddle Migrate - command line driver for the Stripe to Paddle migration
//!
//! Two steps, run in order:
//!
//! 1. `paddle-migrate extract` reads every live Stripe subscription and writes
//!    the Paddle import CSV.
//! 2. `paddle-migrate remap` swaps Stripe price and discount IDs in that CSV
//!    for Paddle IDs from a reference file, asking before each step.
//!
//! The Stripe secret key is read from `STRIPE_API_KEY`, also honoured from a
//! `.env` file in the working directory.

#![allow(
    clippy::multiple_crate_versions,
    reason = "transitive dependencies from reqwest and clap"
)]

mod observability;
mod prompt;

use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    process::ExitCode,
};

use chrono::Utc;
use clap::{Parser, Subcommand, ValueEnum};
use paddle_migration::{
    Result,
    config::{FilesConfig, MigrationConfig, api_key_from_env},
    extract::{Extractor, write_csv},
    remap::{CsvTable, IdMapping, MappingKind},
    stripe::StripeClient,
};
use tracing::{error, info};

use crate::observability::{LogFormat, init_observability};

const PRICES_QUESTION: &str = "Do you want to map prices? (y/n): ";
const DISCOUNTS_QUESTION: &str = "Do you want to map discounts? (y/n): ";

#[derive(Parser, Debug)]
#[command(name = "paddle-migrate", version, about = "Migrate Stripe subscriptions to Paddle Billing")]
struct Cli {
    /// TOML configuration file (defaults apply when omitted)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Command {
    /// Export Stripe subscriptions to the Paddle import CSV
    Extract {
        /// Output CSV, overrides `files.extract_output`
        #[arg(long)]
        output: Option<PathBuf>,
        /// Subscriptions per page (1-100), overrides `source.page_size`
        #[arg(long)]
        page_size: Option<u8>,
    },
    /// Replace Stripe price and discount IDs with Paddle IDs
    Remap {
        /// Extracted CSV, overrides `files.extract_output`
        #[arg(long)]
        input: Option<PathBuf>,
        /// Mapping reference CSV, overrides `files.mapping_reference`
        #[arg(long)]
        reference: Option<PathBuf>,
        /// Mapped CSV, overrides `files.remap_output`
        #[arg(long)]
        output: Option<PathBuf>,
        /// Answer the price prompt without asking
        #[arg(long, value_enum)]
        map_prices: Option<Answer>,
        /// Answer the discount prompt without asking
        #[arg(long, value_enum)]
        map_discounts: Option<Answer>,
    },
}

/// Pre-supplied answer to a yes/no prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Answer {
    Yes,
    No,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    dotenvy::dotenv().ok();
    init_observability(LogFormat::from_env());

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Migration failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => MigrationConfig::from_file(path)?,
        None => MigrationConfig::default(),
    };

    match cli.command {
        Command::Extract { output, page_size } => {
            if let Some(output) = output {
                config.files.extract_output = output;
            }
            if let Some(page_size) = page_size {
                config.source.page_size = page_size;
            }
            config.validate()?;
            extract(&config).await
        }
        Command::Remap { input, reference, output, map_prices, map_discounts } => {
            if let Some(input) = input {
                config.files.extract_output = input;
            }
            if let Some(reference) = reference {
                config.files.mapping_reference = reference;
            }
            if let Some(output) = output {
                config.files.remap_output = output;
            }
            let stdin = io::stdin();
            remap(&config.files, map_prices, map_discounts, &mut stdin.lock(), &mut io::stdout())
        }
    }
}

async fn extract(config: &MigrationConfig) -> Result<()> {
    let client = StripeClient::new(&config.source, api_key_from_env()?)?;
    let policy = config.retry.policy();

    let extraction =
        Extractor::new(&client, &policy, config.source.page_size).run(Utc::now()).await;

    let path = &config.files.extract_output;
    let slots = write_csv(path, &extraction.records)?;
    let count = extraction.records.len();
    info!(path = %path.display(), records = count, item_slots = slots, "Wrote import file");

    match extraction.error {
        None => {
            println!(
                "{count} subscriptions processed successfully. Data exported to {}",
                path.display()
            );
            Ok(())
        }
        Some(e) => {
            println!(
                "Extraction stopped early: {count} subscriptions written to {}",
                path.display()
            );
            Err(e)
        }
    }
}

fn remap<R: BufRead, W: Write>(
    files: &FilesConfig,
    map_prices: Option<Answer>,
    map_discounts: Option<Answer>,
    input: &mut R,
    output: &mut W,
) -> Result<()> {
    let mut table = CsvTable::read(&files.extract_output)?;

    if decide(map_prices, input, output, PRICES_QUESTION)? {
        let mapping = IdMapping::load(&files.mapping_reference, MappingKind::Prices)?;
        let mapped = table.map_prices(&mapping);
        info!(mapped, "Mapped price cells");
        writeln!(output, "Prices mapped successfully.")?;
    }

    if decide(map_discounts, input, output, DISCOUNTS_QUESTION)? {
        let mapping = IdMapping::load(&files.mapping_reference, MappingKind::Discounts)?;
        let mapped = table.map_discounts(&mapping)?;
        info!(mapped, "Mapped discount cells");
        writeln!(output, "Discounts mapped successfully.")?;
    }

    table.save(&files.remap_output)?;
    writeln!(output, "Output saved to {}", files.remap_output.display())?;
    Ok(())
}

fn decide<R: BufRead, W: Write>(
    answer: Option<Answer>,
    input: &mut R,
    output: &mut W,
    question: &str,
) -> io::Result<bool> {
    match answer {
        Some(answer) => Ok(answer == Answer::Yes),
        None => prompt::confirm(input, output, question),
    }
}
