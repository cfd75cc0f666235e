//! Catalogue CLI entry point.
//!
//! # Responsibility
//! - Open a catalogue database and print listings or the export as JSON.
//! - Give a quick local check of `parcel_core` wiring without a server.

use clap::{Args, Parser, Subcommand};
use parcel_core::config::{install_listing_config, CoreConfig};
use parcel_core::db::open_db;
use parcel_core::logging::init_logging_from_config;
use parcel_core::{
    load_config, CategoryFilter, LocalFileStore, PageRequest, ParcelCategoryRepository,
    SqliteParcelCategoryRepository, StatusValue, TrashRepository, TripStage,
};
use std::error::Error;
use std::path::PathBuf;
use std::process::ExitCode;

#[derive(Debug, Parser)]
#[command(name = "parcel", version, about = "Parcel category catalogue inspector")]
struct Cli {
    /// SQLite database file (created and migrated if missing).
    #[arg(long, default_value = "parcel.db")]
    db: PathBuf,

    /// Optional TOML config file.
    #[arg(long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print core version information.
    Ping,
    /// List visible categories.
    List(ListArgs),
    /// List trashed categories.
    Trashed {
        #[arg(long)]
        search: Option<String>,
        #[arg(long, default_value_t = 1)]
        page: u32,
    },
    /// Categories with parcels that reached a trip stage.
    Categorized {
        #[arg(long, default_value = "completed")]
        stage: String,
        #[command(flatten)]
        list: ListArgs,
    },
    /// All categories with delivered-parcel counts.
    Export {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        status: Option<String>,
    },
}

#[derive(Debug, Args)]
struct ListArgs {
    #[arg(long)]
    search: Option<String>,
    /// `active`, `inactive` or `all`.
    #[arg(long, default_value = "all")]
    status: String,
    /// Page number, or row offset with `--direct-offset`.
    #[arg(long, default_value_t = 1)]
    page: u64,
    #[arg(long, default_value_t = 0)]
    per_page: u32,
    #[arg(long)]
    direct_offset: bool,
    /// Eager-load each category's parcels.
    #[arg(long)]
    with_parcels: bool,
}

impl ListArgs {
    fn filter(&self) -> CategoryFilter {
        let mut filter = CategoryFilter::new().with_status_value(StatusValue::parse(&self.status));
        if let Some(search) = self.search.as_ref() {
            filter = filter.with_search(search.clone());
        }
        if self.with_parcels {
            filter = filter.with_relations(["parcels"]);
        }
        filter
    }

    fn page_request(&self) -> PageRequest {
        PageRequest::new(self.per_page, self.page, self.direct_offset)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(output) => {
            println!("{output}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<String, Box<dyn Error>> {
    if let Command::Ping = cli.command {
        return Ok(ping_line());
    }

    let config = match cli.config.as_ref() {
        Some(path) => load_config(path)?,
        None => CoreConfig::default(),
    };
    init_logging_from_config(&config.logging)?;
    install_listing_config(config.pagination)?;

    let conn = open_db(&cli.db)?;
    let files = LocalFileStore::new(config.storage.upload_root.clone());
    let repo = SqliteParcelCategoryRepository::try_new(&conn, files)?;

    let output = match cli.command {
        Command::Ping => ping_line(),
        Command::List(args) => {
            serde_json::to_string_pretty(&repo.list(&args.filter(), args.page_request())?)?
        }
        Command::Trashed { search, page } => {
            let filter = CategoryFilter {
                search,
                ..CategoryFilter::default()
            };
            serde_json::to_string_pretty(&repo.trashed_list(&filter, page)?)?
        }
        Command::Categorized { stage, list } => {
            let stage = TripStage::parse(&stage)
                .ok_or_else(|| format!("unknown trip stage `{stage}`"))?;
            // Categorized views have no default status column.
            let mut filter = list.filter();
            if !filter.status_value.is_all() {
                filter.status_column = Some("is_active".to_string());
            }
            serde_json::to_string_pretty(&repo.categorized_list(
                &filter,
                stage,
                list.page_request(),
            )?)?
        }
        Command::Export { search, status } => {
            let filter = CategoryFilter {
                search,
                status_column: status.as_ref().map(|_| "is_active".to_string()),
                status_value: status
                    .as_deref()
                    .map(StatusValue::parse)
                    .unwrap_or_default(),
                ..CategoryFilter::default()
            };
            serde_json::to_string_pretty(&repo.export(&filter)?)?
        }
    };
    Ok(output)
}

fn ping_line() -> String {
    format!(
        "parcel_core ping={} version={}",
        parcel_core::ping(),
        parcel_core::core_version()
    )
}
