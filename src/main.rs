mod api;
mod config;
mod db;
mod error;
mod extract;
mod ingest;
mod report;
mod review;
mod roster;
mod settle;
mod stats_http;
mod types;

use std::path::PathBuf;

use chrono::Datelike;
use clap::{Args, Parser, Subcommand};
use sqlx::SqlitePool;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use crate::api::{router, ApiState};
use crate::config::Config;
use crate::db::integrity;
use crate::error::Result;
use crate::extract::CommandTranscriber;
use crate::ingest::Ingestor;
use crate::report::CsvSheetSink;
use crate::review::ReviewWorkspace;
use crate::roster::{FileRosterFeed, PlayerResolver, RosterFeed, StatsRosterFeed};
use crate::settle::stats_client::season_for;
use crate::settle::{NbaStatsClient, SettlementEngine};

/// Betting-slip OCR to settled results.
#[derive(Parser, Debug)]
#[command(name = "slip-settler")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ingest slips, settle ready bets, upload totals
    Run(RunArgs),
    /// Transcribe and store every slip image in a folder
    Ingest {
        /// Folder of slip images (defaults to IMAGES_DIR)
        #[arg(long)]
        images: Option<PathBuf>,
        /// Year printed dates belong to (defaults to the current year)
        #[arg(long)]
        year: Option<i32>,
    },
    /// Settle every bet ready for settlement
    Settle,
    /// Push un-uploaded results to the sheet mirror
    Upload {
        #[arg(long)]
        dry_run: bool,
    },
    /// Human review round trip
    Review {
        #[command(subcommand)]
        action: ReviewAction,
    },
    /// Run the data-integrity checks
    Validate,
    /// Serve the read-only HTTP API
    Serve,
}

#[derive(Subcommand, Debug)]
enum ReviewAction {
    /// Write pending review rows and image copies to the review workspace
    Export,
    /// Merge an edited review file back into the store
    Import {
        /// Path, or a file name inside the review CSV folder
        file: PathBuf,
    },
}

#[derive(Args, Debug)]
struct RunArgs {
    /// Folder of slip images; ingestion is skipped when absent
    #[arg(long)]
    images: Option<PathBuf>,
    #[arg(long)]
    year: Option<i32>,
    /// Log sheet changes without applying them
    #[arg(long)]
    dry_run: bool,
    #[arg(long)]
    skip_ocr: bool,
    /// Skip settlement
    #[arg(long)]
    skip_update: bool,
    #[arg(long)]
    skip_upload: bool,
    /// Re-classify pending review images instead of ingesting new ones
    #[arg(long)]
    reprocess: bool,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();
    let cli = Cli::parse();

    let cfg = match Config::from_env() {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e}");
            std::process::exit(1);
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(&cfg.log_level))
        .init();

    if let Err(e) = run(cfg, cli.command).await {
        error!("Fatal error: {e}");
        std::process::exit(1);
    }
}

async fn run(cfg: Config, command: Command) -> Result<()> {
    let pool = db::connect(&cfg.db_path, 4).await?;
    info!("Database ready at {}", cfg.db_path);

    match command {
        Command::Run(args) => workflow(&cfg, &pool, args).await,
        Command::Ingest { images, year } => {
            let resolver = refresh_roster(&cfg, &pool).await?;
            let dir = images.unwrap_or_else(|| cfg.images_dir.clone());
            ingest(&cfg, &pool, &resolver, &dir, year.unwrap_or_else(current_year)).await
        }
        Command::Settle => settle(&cfg, &pool).await,
        Command::Upload { dry_run } => upload(&cfg, &pool, dry_run).await,
        Command::Review { action: ReviewAction::Export } => {
            match review::export_for_review(&pool, &workspace(&cfg)).await? {
                Some(path) => info!("Review file ready at {}", path.display()),
                None => info!("Nothing to review"),
            }
            Ok(())
        }
        Command::Review { action: ReviewAction::Import { file } } => {
            let resolver = load_roster(&pool).await?;
            review::import_reviewed(&pool, &resolver, &cfg.ranges, &workspace(&cfg), &file).await?;
            Ok(())
        }
        Command::Validate => {
            let mut conn = pool.acquire().await?;
            integrity::validate(&mut conn, &cfg.ranges).await?;
            Ok(())
        }
        Command::Serve => serve(&cfg, pool).await,
    }
}

async fn workflow(cfg: &Config, pool: &SqlitePool, args: RunArgs) -> Result<()> {
    if (args.images.is_some() || args.reprocess) && !args.skip_ocr {
        let resolver = refresh_roster(cfg, pool).await?;
        if args.reprocess {
            review::reprocess_flagged(pool, &resolver, &cfg.ranges).await?;
        } else if let Some(dir) = &args.images {
            ingest(cfg, pool, &resolver, dir, args.year.unwrap_or_else(current_year)).await?;
        }
    }
    if !args.skip_update {
        settle(cfg, pool).await?;
    }
    if !args.skip_upload {
        upload(cfg, pool, args.dry_run).await?;
    }
    info!("Workflow completed successfully");
    Ok(())
}

async fn ingest(
    cfg: &Config,
    pool: &SqlitePool,
    resolver: &PlayerResolver,
    dir: &std::path::Path,
    year: i32,
) -> Result<()> {
    let ocr = CommandTranscriber::new(&cfg.ocr_command)?;
    let ingestor = Ingestor::new(pool, &ocr, resolver, cfg.ranges, year);
    ingestor.process_folder(dir).await?;
    Ok(())
}

async fn settle(cfg: &Config, pool: &SqlitePool) -> Result<()> {
    {
        let mut conn = pool.acquire().await?;
        integrity::validate(&mut conn, &cfg.ranges).await?;
    }

    let stats = NbaStatsClient::new(&cfg.stats_api_url)?;
    let mut engine = SettlementEngine::new(&stats, cfg.season.clone(), cfg.stats_delay_ms);
    engine.run(pool).await?;

    let mut conn = pool.acquire().await?;
    integrity::validate(&mut conn, &cfg.ranges).await?;
    Ok(())
}

async fn upload(cfg: &Config, pool: &SqlitePool, dry_run: bool) -> Result<()> {
    let sink = CsvSheetSink::new(cfg.sheet_path.clone());
    report::upload(pool, &sink, &cfg.updates_dir, dry_run).await?;
    Ok(())
}

async fn serve(cfg: &Config, pool: SqlitePool) -> Result<()> {
    let app = router(ApiState { pool });
    let bind_addr = format!("0.0.0.0:{}", cfg.api_port);
    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!("HTTP API listening on {bind_addr}");

    axum::serve(listener, app).await?;
    Ok(())
}

/// Pull the current roster into the store. A feed outage falls back to the
/// stored snapshot so ingestion can still run.
async fn refresh_roster(cfg: &Config, pool: &SqlitePool) -> Result<PlayerResolver> {
    let feed: Box<dyn RosterFeed> = match &cfg.roster_file {
        Some(path) => Box::new(FileRosterFeed::new(path.clone())),
        None => {
            let season = cfg
                .season
                .clone()
                .unwrap_or_else(|| season_for(chrono::Local::now().date_naive()));
            Box::new(StatsRosterFeed::new(&cfg.roster_url, &season)?)
        }
    };

    match roster::resolver::refresh(pool, feed.as_ref()).await {
        Ok((resolver, _)) => Ok(resolver),
        Err(e) => {
            warn!("Roster refresh failed, using stored roster: {e}");
            load_roster(pool).await
        }
    }
}

async fn load_roster(pool: &SqlitePool) -> Result<PlayerResolver> {
    let mut conn = pool.acquire().await?;
    let resolver = roster::resolver::load(&mut conn).await?;
    if resolver.is_empty() {
        warn!("Roster is empty; every candidate will need review");
    } else {
        info!(players = resolver.len(), "Loaded stored roster");
    }
    Ok(resolver)
}

fn workspace(cfg: &Config) -> ReviewWorkspace {
    ReviewWorkspace {
        csv_dir: cfg.review_csv_dir(),
        images_dir: cfg.review_images_dir(),
        source_images: cfg.images_dir.clone(),
    }
}

fn current_year() -> i32 {
    chrono::Local::now().year()
}
