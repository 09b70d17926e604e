use std::path::PathBuf;

use anyhow::bail;
use clap::{Parser, Subcommand};
use ingredient_scraping::{
    collector,
    config::Config,
    dataset,
    reconciler::check_invariants,
    spreadsheet,
    tables::Tables,
    wiki::WikiClient,
};
use log::{error, info};

#[derive(Parser)]
#[command(about = "Builds and maintains the ingredient dataset")]
struct Opts {
    /// TOML configuration; built-in defaults are used when omitted.
    #[arg(long, global = true)]
    config: Option<PathBuf>,
    /// TOML file replacing sections of the built-in lookup tables.
    #[arg(long, global = true)]
    tables: Option<PathBuf>,
    /// Dataset JSON, overriding `paths.data_file`.
    #[arg(long, global = true)]
    data: Option<PathBuf>,
    /// Icon directory, overriding `paths.image_dir`.
    #[arg(long, global = true)]
    images: Option<PathBuf>,
    /// Run the pass without writing the dataset.
    #[arg(long, global = true)]
    dry_run: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Walk the wiki categories and add every ingredient not yet present.
    Scrape,
    /// Add the curated catalog of new ingredients.
    Expand {
        #[arg(long)]
        no_icons: bool,
    },
    /// Correct sell prices, fill missing effects and fetch icons.
    Refresh,
    /// Set fuse values from a spreadsheet and assign monster-part subcategories.
    UpdateFuse { spreadsheet: PathBuf },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();
    let opts = Opts::parse();

    let mut config = match &opts.config {
        Some(path) => Config::load(path)?,
        None => Config::default(),
    };
    if let Some(data) = &opts.data {
        config.paths.data_file = data.clone();
    }
    if let Some(images) = &opts.images {
        config.paths.image_dir = images.clone();
    }
    let tables = match &opts.tables {
        Some(path) => Tables::load(path)?,
        None => Tables::builtin()?,
    };

    let records = dataset::load_or_create(&config.paths.data_file)?;
    let records = match opts.command {
        Command::Scrape => {
            let client = WikiClient::new(&config.wiki)?;
            collector::scrape(&client, &tables, &config, records).await?.0
        }
        Command::Expand { no_icons } => {
            let client = WikiClient::new(&config.wiki)?;
            collector::expand(&client, &config, records, !no_icons).await?.0
        }
        Command::Refresh => {
            let client = WikiClient::new(&config.wiki)?;
            let mut records = records;
            let report = collector::refresh(&client, &tables, &config, &mut records).await?;
            println!("{report}");
            records
        }
        Command::UpdateFuse { spreadsheet } => {
            let primary = spreadsheet::load_fuse_table(&spreadsheet)?;
            let mut records = records;
            let report = collector::update_fuse(&tables, &primary, &mut records);
            println!("{report}");
            records
        }
    };

    let violations = check_invariants(&records);
    if !violations.is_empty() {
        for violation in &violations {
            error!("{violation}");
        }
        bail!("{} invariant violations; the dataset was not saved", violations.len());
    }

    if opts.dry_run {
        info!("Dry run: {} records were not saved.", records.len());
    } else {
        dataset::save(&config.paths.data_file, &records)?;
    }
    Ok(())
}
