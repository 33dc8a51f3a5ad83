use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use sealevel_curation::annotate;
use sealevel_curation::config::Settings;
use sealevel_curation::logging::{self, Component, LogLevel};
use sealevel_curation::mask;
use sealevel_curation::reanalysis;
use sealevel_curation::series::RawRecordSource;
use sealevel_curation::stations;
use sealevel_curation::store::{self, TransformationStore};
use sealevel_curation::transformation::Transformation;

/// Curate tide-gauge records: edit per-station annotations and apply them.
#[derive(Parser, Debug)]
#[command(name = "sealevel-curation", version, about)]
struct Cli {
    /// Data directory (overrides SEALEVEL_DATA_DIR and the config file)
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Optional TOML settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Minimum level logged when RUST_LOG is not set
    #[arg(long, global = true, default_value = "info")]
    log_level: LogLevel,

    /// Append a copy of every log event to this file
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List stations that have a raw record
    Stations,
    /// Print the transformation for a station (synthesized if none is saved)
    Show { key: String },
    /// Save the transformation for a station to its canonical path
    Init { key: String },
    /// Record single bad readings
    AddTimestamps {
        key: String,
        #[arg(required = true)]
        instants: Vec<String>,
    },
    /// Record a bad-data interval
    AddRange { key: String, start: String, end: String },
    /// Record a tsunami interval
    AddTsunami { key: String, start: String, end: String },
    /// Record an annotation from sample positions of the raw record
    AddSelection {
        key: String,
        #[arg(long, value_enum)]
        kind: SelectionKind,
        #[arg(required = true)]
        positions: Vec<usize>,
    },
    /// Change the review status or notes
    SetStatus {
        key: String,
        #[arg(long)]
        skip: Option<bool>,
        #[arg(long)]
        wip: Option<bool>,
        #[arg(long)]
        notes: Option<String>,
    },
    /// Apply the transformation to the raw record and report what it removes
    Mask { key: String },
    /// Summarize the reanalysis series for a station
    Era5 { key: String },
}

#[derive(ValueEnum, Clone, Copy, Debug)]
enum SelectionKind {
    Timestamps,
    Range,
    Tsunami,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    logging::init_logger(cli.log_level, cli.log_file.as_deref(), false)
        .context("Failed to initialize logging")?;

    let settings = match &cli.data_dir {
        Some(dir) => Settings::with_data_dir(dir),
        None => Settings::load(cli.config.as_deref()).context("Failed to load settings")?,
    };
    settings.log_config();

    let store = TransformationStore::new(settings);
    run(&store, cli.command)
}

fn run(store: &TransformationStore, command: Command) -> Result<()> {
    match command {
        Command::Stations => {
            for key in stations::discover(&store.settings().raw_dir())? {
                println!("{}", key);
            }
        }
        Command::Show { key } => {
            let trans = load(store, &key)?;
            print!("{}", store::to_document(&trans)?);
        }
        Command::Init { key } => {
            store.settings().ensure_dirs()?;
            let trans = load(store, &key)?;
            let path = store.dump(&trans, None)?;
            println!("{}", path.display());
        }
        Command::AddTimestamps { key, instants } => {
            let mut trans = load(store, &key)?;
            let added = trans.add_timestamps(&instants)?;
            store.dump(&trans, None)?;
            println!("{} new timestamp(s), {} total", added, trans.timestamps().len());
        }
        Command::AddRange { key, start, end } => {
            let mut trans = load(store, &key)?;
            let added = trans.add_date_range(start, end)?;
            store.dump(&trans, None)?;
            report_range(added, trans.date_ranges().len());
        }
        Command::AddTsunami { key, start, end } => {
            let mut trans = load(store, &key)?;
            let added = trans.add_tsunami(start, end)?;
            store.dump(&trans, None)?;
            report_range(added, trans.tsunamis().len());
        }
        Command::AddSelection { key, kind, positions } => {
            let mut trans = load(store, &key)?;
            let raw = store.raw_source().load_raw(&key)?;
            match kind {
                SelectionKind::Timestamps => {
                    let added = annotate::add_selected_timestamps(&mut trans, &raw, &positions)?;
                    println!("{} new timestamp(s)", added);
                }
                SelectionKind::Range => {
                    let added = annotate::add_selected_date_range(&mut trans, &raw, &positions)?;
                    report_range(added.unwrap_or(false), trans.date_ranges().len());
                }
                SelectionKind::Tsunami => {
                    let added = annotate::add_selected_tsunami(&mut trans, &raw, &positions)?;
                    report_range(added.unwrap_or(false), trans.tsunamis().len());
                }
            }
            store.dump(&trans, None)?;
        }
        Command::SetStatus { key, skip, wip, notes } => {
            let mut trans = load(store, &key)?;
            if let Some(skip) = skip {
                trans.set_skip(skip);
            }
            if let Some(wip) = wip {
                trans.set_wip(wip);
            }
            if let Some(notes) = notes {
                trans.set_notes(notes);
            }
            store.dump(&trans, None)?;
            println!("skip={} wip={}", trans.skip(), trans.wip());
        }
        Command::Mask { key } => {
            let raw = store
                .raw_source()
                .load_raw(&key)
                .with_context(|| format!("Failed to load raw record for {}", key))?;
            let decomposed = mask::apply_from_store(store, &raw)?;
            let s = decomposed.summary();
            println!("samples    {}", s.total);
            println!("timestamps {}", s.timestamps);
            println!("date_ranges {}", s.date_ranges);
            println!("tsunamis   {}", s.tsunamis);
            println!("excluded   {}", s.excluded);
        }
        Command::Era5 { key } => {
            let era5 = reanalysis::load_era5(store.settings(), &key)?;
            let speeds: Vec<f64> = era5.wind_mag.iter().copied().filter(|v| !v.is_nan()).collect();
            let max = speeds.iter().copied().fold(f64::NAN, f64::max);
            println!("samples       {}", era5.index.len());
            println!("max wind m/s  {:.2}", max);
        }
    }
    Ok(())
}

fn load(store: &TransformationStore, key: &str) -> Result<Transformation> {
    store.load(key).map_err(|e| {
        logging::log_failure(Component::Store, Some(key), "Loading transformation", &e);
        anyhow::Error::new(e).context(format!("Failed to load transformation for {}", key))
    })
}

fn report_range(added: bool, total: usize) {
    if added {
        println!("added, {} total", total);
    } else {
        println!("already present, {} total", total);
    }
}
