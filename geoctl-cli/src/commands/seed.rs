//! Seed command: load `<dir>/{countries,states,cities}.json`

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use geoctl_core::seed::{self, SeedOptions, SeedReport, DEFAULT_SEED_DIR};

use super::{data_layer, db_config};

#[derive(Parser, Debug)]
pub struct SeedArgs {
    /// Directory holding the seed files
    #[arg(long, short = 'd', default_value = DEFAULT_SEED_DIR)]
    pub dir: PathBuf,

    /// Only seed one collection (countries, states or cities)
    #[arg(long)]
    pub only: Option<String>,

    /// Count documents without touching the database
    #[arg(long)]
    pub dry_run: bool,

    /// Seed into a throwaway in-memory store (validates the files)
    #[arg(long)]
    pub in_memory: bool,

    /// Print the report as JSON
    #[arg(long)]
    pub json: bool,
}

pub async fn run_seed(args: SeedArgs) -> Result<()> {
    let options = SeedOptions {
        dir: args.dir.clone(),
        only: args.only.clone(),
        dry_run: args.dry_run,
    };

    let report = if args.dry_run {
        seed::count_documents(&options)
            .await
            .with_context(|| format!("Failed to read seed files from {}", args.dir.display()))?
    } else {
        let db = db_config()?;
        let data = data_layer(&db, args.in_memory);
        data.start().await.context("Failed to connect to the database")?;
        let report = seed::seed(&data, &options).await;
        data.shutdown().await;
        report.context("Seeding failed")?
    };

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        print_report(&report);
    }
    Ok(())
}

fn print_report(report: &SeedReport) {
    for stem in &report.stems {
        if stem.missing {
            println!("{}: no file, skipped", stem.stem);
        } else if report.dry_run {
            println!("{}: {} documents", stem.stem, stem.inserted);
        } else {
            println!(
                "{}: {} inserted, {} already present",
                stem.stem, stem.inserted, stem.skipped
            );
        }
    }
    if report.dry_run {
        println!("Dry run: {} documents found", report.inserted());
    } else {
        println!(
            "Total: {} inserted, {} already present",
            report.inserted(),
            report.skipped()
        );
    }
}
