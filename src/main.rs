use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};
use rand::rngs::StdRng;
use rand::SeedableRng;

use wikicat::classify;
use wikicat::corpus;
use wikicat::db;
use wikicat::importer::{self, ImportOptions};
use wikicat::model::{artifact, LinearModel};
use wikicat::settings::Settings;
use wikicat::train::{self, TrainOptions};
use wikicat::Error;

#[derive(Parser)]
#[command(name = "wikicat", about = "Category-aware MediaWiki dump importer and page classifier")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Import a MediaWiki XML dump into a SQLite database
    Import {
        xmlfile: PathBuf,
        dbfile: PathBuf,
    },
    /// Write the normalized text of every page in a category to a directory
    Transform {
        category: String,
        dbfile: PathBuf,
        outdir: PathBuf,
    },
    /// Train a classifier for a category and save model + tokenizer
    Train {
        category: String,
        dbfile: PathBuf,
        /// Read positives from an exported corpus instead of the database
        #[arg(long)]
        indir: Option<PathBuf>,
        /// Directory for the saved artifacts
        #[arg(short, long, default_value = ".")]
        out: PathBuf,
        /// Random negatives to sample (default from settings)
        #[arg(short = 'n', long)]
        negatives: Option<usize>,
        /// Seed for sampling and shuffling
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Rank the pages of a category with a trained classifier
    Classify {
        category: String,
        threshold: f32,
        modelfile: PathBuf,
        tokenizerfile: PathBuf,
        dbfile: PathBuf,
        /// Only print pages at or above the threshold
        #[arg(long)]
        only_above: bool,
    },
    /// Search page content (case-insensitive, `%` and `_` wildcards allowed)
    Search {
        dbfile: PathBuf,
        pattern: String,
        #[arg(short, long)]
        category: Option<String>,
    },
    /// Show row counts
    Stats { dbfile: PathBuf },
}

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let settings = Settings::load().context("loading settings")?;

    let result = match cli.command {
        Commands::Import { xmlfile, dbfile } => {
            require_file(&xmlfile, "xmlfile")?;
            let conn = db::connect(&dbfile)?;
            let source = BufReader::new(File::open(&xmlfile)?);
            let options = ImportOptions {
                namespace: settings.namespace.clone(),
                show_progress: true,
            };
            let report = importer::import(source, &conn, &options)
                .with_context(|| format!("importing {}", xmlfile.display()))?;
            let s = report.stats;
            println!("Pages read: {} (saved {})", s.pages_read, s.pages_saved);
            println!("Category tags read: {}", s.categories_read);
            println!("Categories: {} ({} listings)", s.categories, s.listings);
            Ok(())
        }
        Commands::Transform {
            category,
            dbfile,
            outdir,
        } => {
            require_file(&dbfile, "dbfile")?;
            let conn = db::connect(&dbfile)?;
            let written = corpus::export(&conn, &category, &outdir)
                .with_context(|| format!("exporting category {:?}", category))?;
            println!("Wrote {} pages to {}", written, outdir.display());
            Ok(())
        }
        Commands::Train {
            category,
            dbfile,
            indir,
            out,
            negatives,
            seed,
        } => {
            require_file(&dbfile, "dbfile")?;
            let conn = db::connect(&dbfile)?;
            let positives = match &indir {
                Some(dir) => Some(corpus::load(dir)?),
                None => None,
            };
            let mut options = TrainOptions::from(&settings);
            if let Some(n) = negatives {
                options.negatives = n;
            }
            let mut rng = match seed.or(settings.seed) {
                Some(s) => StdRng::seed_from_u64(s),
                None => StdRng::from_entropy(),
            };

            println!("Training classifier for {:?}...", category);
            let report = train::train::<LinearModel, _>(
                &conn, &category, positives, &options, &out, &mut rng,
            )
            .with_context(|| format!("training category {:?}", category))?;
            println!(
                "Examples: {} train, {} test. Maximum sequence length: {}",
                report.train_len, report.test_len, report.max_length
            );
            println!("Model:     {}", report.model_file.display());
            println!("Tokenizer: {}", report.tokenizer_file.display());
            println!(
                "Loss: {:.4}. Accuracy: {:.4}",
                report.evaluation.loss, report.evaluation.accuracy
            );
            Ok(())
        }
        Commands::Classify {
            category,
            threshold,
            modelfile,
            tokenizerfile,
            dbfile,
            only_above,
        } => {
            require_file(&modelfile, "modelfile")?;
            require_file(&tokenizerfile, "tokenizerfile")?;
            require_file(&dbfile, "dbfile")?;
            let conn = db::connect(&dbfile)?;
            let artifacts = artifact::load::<LinearModel>(&category, &modelfile, &tokenizerfile)?;
            let ranking = classify::classify(
                &conn,
                &category,
                threshold,
                &artifacts.model,
                &artifacts.tokenizer,
                artifacts.max_length,
            )
            .with_context(|| format!("classifying category {:?}", category))?;

            println!("Results:");
            for r in &ranking.results {
                let hit = r.certainty >= threshold;
                if only_above && !hit {
                    continue;
                }
                let mark = if hit { "*" } else { " " };
                println!("{} {} - {:.4}", mark, r.title, r.certainty);
            }
            println!(
                "\n{} pages, {} at or above {}",
                ranking.len(),
                ranking.above_threshold().count(),
                threshold
            );
            Ok(())
        }
        Commands::Search {
            dbfile,
            pattern,
            category,
        } => {
            require_file(&dbfile, "dbfile")?;
            let conn = db::connect(&dbfile)?;
            let titles = match &category {
                Some(c) => db::search_category(&conn, c, &pattern)?,
                None => db::search_all(&conn, &pattern)?,
            };
            for title in &titles {
                println!("{}", title);
            }
            Ok(())
        }
        Commands::Stats { dbfile } => {
            require_file(&dbfile, "dbfile")?;
            let conn = db::connect(&dbfile)?;
            let s = db::stats(&conn)?;
            println!("Pages:      {}", s.pages);
            println!("Categories: {}", s.categories);
            println!("Listings:   {}", s.listings);
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn require_file(path: &Path, what: &str) -> Result<(), Error> {
    if path.is_file() {
        Ok(())
    } else {
        Err(Error::Configuration(format!(
            "{} {} does not exist",
            what,
            path.display()
        )))
    }
}

fn format_duration(d: std::time::Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
