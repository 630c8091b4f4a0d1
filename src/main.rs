// Copyright (c) 2025, Jason Jenkins
// SPDX-License-Identifier: BSD-3-Clause

//! Command line access to fish annotation files.

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use fish_annotator::config::Config;
use fish_annotator::io::serialization::image_frame;
use fish_annotator::models::stats;
use fish_annotator::AnnotationList;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "fish-annotator")]
#[command(version)]
#[command(about = "Inspect and convert fish annotation files")]
struct Cli {
    /// Settings file (YAML or JSON)
    #[arg(short, long, default_value = "fish-annotator.yaml")]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print totals for a video annotation file
    Summary {
        /// Annotation file (.json, .yaml)
        file: PathBuf,
    },
    /// Print per-species counts for a video annotation file
    Species {
        file: PathBuf,
    },
    /// Print per-individual statistics for a video annotation file
    Individuals {
        file: PathBuf,
    },
    /// Re-encode a video annotation file (format follows the extension)
    Convert {
        input: PathBuf,
        output: PathBuf,
    },
    /// Print totals for the sidecar annotations of an image set
    Images {
        /// Image files
        #[arg(required = true)]
        images: Vec<PathBuf>,
    },
}

fn read_video(file: &Path) -> Result<(AnnotationList, String)> {
    AnnotationList::read_video(file)
        .with_context(|| format!("Failed to read annotations from {}", file.display()))
}

fn run(cli: Cli) -> Result<()> {
    let config = Config::load(&cli.config)?;

    match cli.command {
        Commands::Summary { file } => {
            let (list, media) = read_video(&file)?;
            println!("media: {}", media);
            println!("{}", serde_json::to_string_pretty(&stats::summarize(&list))?);
        }
        Commands::Species { file } => {
            let (list, _) = read_video(&file)?;
            let fish = stats::individuals_per_species(&list);
            for (species, count) in stats::species_counts(&list) {
                println!(
                    "{:<24} {:>6} regions {:>4} fish",
                    species,
                    count,
                    fish.get(&species).copied().unwrap_or(0)
                );
            }
        }
        Commands::Individuals { file } => {
            let (list, _) = read_video(&file)?;
            for id in list.individual_ids() {
                if let Some(s) = stats::individual_stats(&list, id) {
                    println!(
                        "{:>5} {:<20} {:<20} frames {}..{} ({})",
                        s.id, s.species, s.subspecies, s.first_frame, s.last_frame, s.frame_count
                    );
                }
            }
        }
        Commands::Convert { input, output } => {
            let (list, media) = read_video(&input)?;
            list.write_video(&output, &media)
                .with_context(|| format!("Failed to write {}", output.display()))?;
        }
        Commands::Images { images } => {
            let list = AnnotationList::read_images(&images, config.format)
                .context("Failed to read image annotations")?;
            for image in &images {
                let frame = image_frame(image)?;
                let marker = if list.is_degraded(&frame) { " (degraded)" } else { "" };
                println!("{:<32} {:>4}{}", frame, list.count_for_frame(&frame), marker);
            }
            log::debug!("Read {} sidecars", config.format.extension());
            println!("{}", serde_json::to_string_pretty(&stats::summarize(&list))?);
        }
    }
    Ok(())
}

fn main() {
    // Initialize logging
    env_logger::init();

    if let Err(e) = run(Cli::parse()) {
        log::error!("{:#}", e);
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}
