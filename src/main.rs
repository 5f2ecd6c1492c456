mod config;
mod error;
mod exif_reader;
#[cfg(test)]
mod fixtures;
mod metadata;
mod metrics;
mod processor;
mod summary;
mod walker;
mod writer;

use crate::config::AppConfig;
use crate::metrics::MetricsSummary;
use crate::summary::Summary;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use log::info;
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Analysis {
    /// File, image and EXIF metadata with a duplicate/quality summary
    Metadata,
    /// Grayscale brightness and contrast per image
    Metrics,
}

#[derive(Debug, Parser)]
#[command(name = "image-census", version, about = "Scan a directory of images and write per-image statistics to CSV")]
struct Cli {
    /// Directory to scan recursively
    base_path: PathBuf,

    /// CSV file to create or overwrite
    output_file: PathBuf,

    #[arg(long, value_enum, default_value_t = Analysis::Metadata)]
    analysis: Analysis,

    /// Overrides the configured log level (error, warn, info, debug, trace)
    #[arg(long)]
    log_level: Option<String>,

    #[arg(long)]
    no_progress: bool,

    #[arg(long)]
    no_summary: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let mut config = AppConfig::new()?;
    if let Some(level) = &cli.log_level {
        config.log_level = level.clone();
    }
    if cli.no_progress {
        config.show_progress = false;
    }
    if cli.no_summary {
        config.show_summary = false;
    }

    env_logger::Builder::new()
        .filter_level(config.log_level.parse().unwrap_or(log::LevelFilter::Info))
        .init();

    info!("Starting image-census");

    let result = match cli.analysis {
        Analysis::Metadata => run_metadata(&config, &cli),
        Analysis::Metrics => run_metrics(&config, &cli),
    };
    if let Err(e) = &result {
        log::error!("Run failed: {}", e);
    }
    result?;

    info!("Image-census finished");
    Ok(())
}

fn run_metadata(config: &AppConfig, cli: &Cli) -> Result<()> {
    let files = walker::discover_images(&cli.base_path, &config.allowed_extensions)?;
    println!("Found {} image files.", files.len());

    let progress = create_progress_bar(files.len() as u64, config.show_progress);
    let outcome = processor::start_processing(config, &files, &progress);
    progress.finish_and_clear();

    if outcome.records.is_empty() {
        println!("No results to save!");
        return Ok(());
    }

    writer::write_records(&outcome.records, &cli.output_file)?;

    if config.show_summary {
        let summary = Summary::from_records(&outcome.records);
        println!("\n{}", summary);
        if !outcome.skipped.is_empty() {
            println!("Skipped files: {}", outcome.skipped.len());
        }
    }
    println!("\nResults saved to {}", cli.output_file.display());
    Ok(())
}

fn run_metrics(config: &AppConfig, cli: &Cli) -> Result<()> {
    let files = walker::discover_images(&cli.base_path, &config.allowed_extensions)?;
    println!("Found {} image files.", files.len());

    let progress = create_progress_bar(files.len() as u64, config.show_progress);
    let records = metrics::start_analysis(&files, &progress);
    progress.finish_and_clear();

    if records.is_empty() {
        println!("No results to save!");
        return Ok(());
    }

    writer::write_rows(&records, &cli.output_file)?;

    if config.show_summary {
        println!("\n{}", MetricsSummary::from_records(&records));
    }
    println!("Results saved to {}", cli.output_file.display());
    Ok(())
}

fn create_progress_bar(total: u64, enabled: bool) -> ProgressBar {
    if !enabled {
        return ProgressBar::hidden();
    }

    let pb = ProgressBar::new(total);
    match ProgressStyle::default_bar()
        .template("{msg} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({percent}%)")
    {
        Ok(style) => pb.set_style(style.progress_chars("#>-")),
        Err(e) => log::debug!("Falling back to default progress style: {}", e),
    }
    pb.set_message("Processing images");
    pb
}
