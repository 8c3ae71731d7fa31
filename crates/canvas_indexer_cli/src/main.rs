//! Command-line entry point for the canvas backlink indexer.
//!
//! # Responsibility
//! - Load configuration, initialize logging and open the index database.
//! - Run one crawl (`crawl`), crawl on a fixed interval (`watch`), or print
//!   the backlink document for a canvas (`query`).
//!
//! # Invariants
//! - Feed failures are reported in the exit status, never by panicking.
//! - `watch` crawls once at startup before its first sleep.

use canvas_indexer_core::{
    build_backlink_document, init_logging, open_db, BacklinkDocumentOptions, CrawlSummary,
    Crawler, HttpFetcher, IndexerConfig, Region, SpatialQuery, SqliteCurationStore,
};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

const SECONDS_PER_HOUR: u64 = 60 * 60;

#[derive(Debug, Parser)]
#[command(name = "canvas_indexer", version, about = "Curation backlink indexer for IIIF canvases")]
struct Cli {
    /// TOML configuration file; defaults apply when it does not exist.
    #[arg(long, short, default_value = "canvas_indexer.toml")]
    config: PathBuf,

    /// Overrides `db_path` from the configuration.
    #[arg(long)]
    db: Option<PathBuf>,

    /// Overrides `log_level` from the configuration.
    #[arg(long)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Crawl every configured feed once.
    Crawl,
    /// Crawl at startup, then once per configured interval.
    Watch,
    /// Print the backlink curation document for a canvas.
    Query {
        /// Canvas URI to look up.
        #[arg(long)]
        canvas: String,
        /// Only report regions inside this `x,y,w,h` rectangle.
        #[arg(long)]
        area: Option<Region>,
        /// Prefix prepended to the url-encoded curation URI of every link.
        #[arg(long)]
        link_prefix: Option<String>,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(code) => code,
        Err(message) => {
            error!("event=cli_exit module=cli status=error error={message}");
            eprintln!("canvas_indexer: {message}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<ExitCode, String> {
    // Logging is not up yet; the fallback is reported once it is.
    let missing_config = missing_config_notice(&cli.config);
    let mut config = IndexerConfig::load(&cli.config).map_err(|err| err.to_string())?;
    if let Some(db) = cli.db {
        config.db_path = db;
    }
    if let Some(level) = cli.log_level {
        config.log_level = level;
    }

    let log_dir = absolute(&config.log_dir)?;
    init_logging(&config.log_level, &log_dir)?;
    if let Some(notice) = &missing_config {
        warn!(
            "event=config_load module=cli status=warn path={} error_code=config_missing using=defaults",
            cli.config.display()
        );
        eprintln!("canvas_indexer: {notice}");
    }

    let conn = open_db(&config.db_path).map_err(|err| {
        format!(
            "failed to open index database `{}`: {err}",
            config.db_path.display()
        )
    })?;

    match cli.command {
        Command::Crawl => {
            let crawler = build_crawler(&config)?;
            let summary = crawler.crawl_all(&conn, &config.feed_urls());
            Ok(report_summary(&summary))
        }
        Command::Watch => watch(&conn, &config),
        Command::Query {
            canvas,
            area,
            link_prefix,
        } => query(&conn, &canvas, area.as_ref(), link_prefix),
    }
}

/// Describes the defaults fallback when `path` does not exist.
fn missing_config_notice(path: &Path) -> Option<String> {
    if path.exists() {
        return None;
    }
    Some(format!(
        "config file `{}` not found, using defaults",
        path.display()
    ))
}

fn build_crawler(config: &IndexerConfig) -> Result<Crawler<HttpFetcher>, String> {
    let fetcher = HttpFetcher::new(&config.fetch).map_err(|err| err.to_string())?;
    Ok(Crawler::from_config(fetcher, config))
}

fn watch(conn: &Connection, config: &IndexerConfig) -> Result<ExitCode, String> {
    let crawler = build_crawler(config)?;
    let interval = Duration::from_secs(config.crawl_interval_hours.saturating_mul(SECONDS_PER_HOUR));
    let feed_urls = config.feed_urls();
    info!(
        "event=crawl_schedule module=cli status=start feeds={} interval_hours={}",
        feed_urls.len(),
        config.crawl_interval_hours
    );

    loop {
        let summary = crawler.crawl_all(conn, &feed_urls);
        report_summary(&summary);
        info!(
            "event=crawl_schedule module=cli status=sleep next_run_in_secs={}",
            interval.as_secs()
        );
        std::thread::sleep(interval);
    }
}

fn query(
    conn: &Connection,
    canvas_uri: &str,
    area: Option<&Region>,
    link_prefix: Option<String>,
) -> Result<ExitCode, String> {
    let query = SpatialQuery::new(SqliteCurationStore::new(conn));
    let Some(backlinks) = query
        .backlinks(canvas_uri, area)
        .map_err(|err| err.to_string())?
    else {
        eprintln!("canvas_indexer: canvas not indexed: {canvas_uri}");
        return Ok(ExitCode::from(2));
    };

    let document = build_backlink_document(&backlinks, &BacklinkDocumentOptions { link_prefix });
    let rendered = serde_json::to_string_pretty(&document).map_err(|err| err.to_string())?;
    println!("{rendered}");
    Ok(ExitCode::SUCCESS)
}

fn report_summary(summary: &CrawlSummary) -> ExitCode {
    for report in &summary.reports {
        println!(
            "ok     {} applied={} skipped={} pages={}",
            report.feed_url,
            report.applied(),
            report.skipped,
            report.pages
        );
    }
    for (feed_url, err) in &summary.failures {
        println!("failed {feed_url} {err}");
    }

    if summary.failures.is_empty() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    }
}

fn absolute(path: &Path) -> Result<PathBuf, String> {
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    std::env::current_dir()
        .map(|cwd| cwd.join(path))
        .map_err(|err| format!("failed to resolve `{}`: {err}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::{missing_config_notice, Cli, Command};
    use canvas_indexer_core::Region;
    use clap::Parser;
    use std::path::Path;

    #[test]
    fn query_parses_area_and_prefix() {
        let cli = Cli::try_parse_from([
            "canvas_indexer",
            "query",
            "--canvas",
            "http://example.org/canvas/1",
            "--area",
            "0,0,100,200",
            "--link-prefix",
            "http://viewer/?curation=",
        ])
        .unwrap();

        match cli.command {
            Command::Query {
                canvas,
                area,
                link_prefix,
            } => {
                assert_eq!(canvas, "http://example.org/canvas/1");
                assert_eq!(area, Some(Region::new(0, 0, 100, 200).unwrap()));
                assert_eq!(link_prefix.as_deref(), Some("http://viewer/?curation="));
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn malformed_area_is_rejected() {
        let result = Cli::try_parse_from([
            "canvas_indexer",
            "query",
            "--canvas",
            "c",
            "--area",
            "1,2,3",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn missing_config_file_produces_defaults_notice() {
        let missing = Path::new(env!("CARGO_MANIFEST_DIR")).join("no-such-canvas_indexer.toml");
        let existing = Path::new(env!("CARGO_MANIFEST_DIR")).join("Cargo.toml");

        let notice = missing_config_notice(&missing).unwrap();

        assert!(notice.contains("no-such-canvas_indexer.toml"));
        assert!(notice.ends_with("using defaults"));
        assert_eq!(missing_config_notice(&existing), None);
    }
}
