use std::{path::PathBuf, process::ExitCode, time::Duration};

use anyhow::{Context, Result};
use clap::{ArgAction, Parser};
use console::style;
use tokio::sync::{broadcast, mpsc};
use tracing::warn;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use kinscope_core::{
    AnalysisClient, BatchReport, BatchRunner, DayCalendar, HouseholdId, IndexCache,
    InventoryFilter, KinscopeConfig, Provider, TwelveLabsService, VideoRecord,
    config::{DEFAULT_OUTPUT, DEFAULT_VIDEO_DIR},
    format_hours, get_root_cache_dir, inventory,
    projector::now_timestamp,
    provider::{API_KEY_ENV, DEFAULT_BASE_URL, INDEX_ID_ENV},
};

mod progress;

use progress::format_duration;

fn parse_household(s: &str) -> Result<HouseholdId, String> {
    s.trim()
        .to_ascii_uppercase()
        .parse()
        .map_err(|e: kinscope_core::types::InvalidHouseholdId| e.to_string())
}

#[derive(Parser)]
#[command(name = "batch_analysis")]
#[command(about = "Chapter household videos with Twelve Labs and aggregate the results into one CSV")]
struct Cli {
    /// Households to process, e.g. "A,B,C" (default: every household found)
    #[arg(long, value_delimiter = ',', num_args = 1.., value_parser = parse_household)]
    households: Vec<HouseholdId>,

    /// Days to process, e.g. "1,2,3,4" (default: every day found)
    #[arg(long, value_delimiter = ',', num_args = 1.., value_parser = clap::value_parser!(u32).range(1..))]
    days: Vec<u32>,

    /// Directory holding household_<ID>_day<N>.mp4 files
    #[arg(long, default_value = DEFAULT_VIDEO_DIR)]
    video_dir: PathBuf,

    /// Combined CSV output path
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    output: PathBuf,

    /// Also write household_<ID>.json summaries into this directory
    #[arg(long)]
    summaries_dir: Option<PathBuf>,

    /// Day numbers recorded on a weekend
    #[arg(long, value_delimiter = ',', num_args = 1.., default_value = "3,4")]
    weekend_days: Vec<u32>,

    /// Videos processed at the same time
    #[arg(long, default_value_t = 1, value_parser = clap::value_parser!(u16).range(1..))]
    concurrency: u16,

    /// Timeout for a single API call, in seconds
    #[arg(long, default_value_t = 300)]
    timeout_secs: u64,

    /// Retries for a failed API call before the video is given up
    #[arg(long, default_value_t = 3)]
    max_retries: u32,

    /// Seconds between indexing status checks
    #[arg(long, default_value_t = 5)]
    poll_interval_secs: u64,

    /// Maximum seconds to wait for a video to be indexed
    #[arg(long, default_value_t = 3600)]
    index_timeout_secs: u64,

    /// Pause between videos, in seconds
    #[arg(long, default_value_t = 2.0)]
    pause_secs: f64,

    /// Re-upload videos even if they were indexed by an earlier run
    #[arg(short, long)]
    force: bool,

    /// Twelve Labs API key (default: $TWELVELABS_API_KEY)
    #[arg(long)]
    api_key: Option<String>,

    /// Twelve Labs index id (default: $TWELVELABS_INDEX_ID)
    #[arg(long)]
    index_id: Option<String>,

    /// Twelve Labs API base URL
    #[arg(long, env = "TWELVELABS_BASE_URL", default_value = DEFAULT_BASE_URL)]
    base_url: String,

    /// More log output on stderr (-v info, -vv debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

fn init_tracing(verbose: u8) {
    let default_level = match verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn print_error(message: impl std::fmt::Display) {
    eprintln!("{} {}", style("Error:").red().bold(), message);
}

fn build_config(cli: &Cli, api_key: String, index_id: String) -> KinscopeConfig {
    let mut config = KinscopeConfig::new(Provider::new(cli.base_url.clone()), api_key, index_id);
    config.calendar = DayCalendar::new(cli.weekend_days.iter().copied());
    config.retry.max_retries = cli.max_retries;
    config.retry.call_timeout = Duration::from_secs(cli.timeout_secs.max(1));
    config.poll.interval = Duration::from_secs(cli.poll_interval_secs.max(1));
    config.poll.max_wait = Duration::from_secs(cli.index_timeout_secs);
    config.concurrency = cli.concurrency as usize;
    config.pause_between_videos = Duration::from_secs_f64(cli.pause_secs.max(0.0));
    config.cache_dir = (!cli.force).then(get_root_cache_dir);
    config
}

fn print_summary(report: &BatchReport) {
    println!("\n{}", style("─".repeat(60)).dim());
    println!(
        "{:<12} {:>10} {:>12}",
        style("Household").bold(),
        style("Chapters").bold(),
        style("Activity").bold()
    );
    for stats in report.dataset.household_stats() {
        println!(
            "{:<12} {:>10} {:>12}",
            stats.household_id,
            stats.chapters,
            format_hours(stats.total_duration_seconds)
        );
    }

    if !report.failed.is_empty() {
        println!("\n{}", style("Failed videos:").red().bold());
        for failed in &report.failed {
            let stage = failed
                .stage
                .map(|s| format!(" at {}", s))
                .unwrap_or_default();
            println!(
                "  {} {}{}: {}",
                style("✗").red(),
                failed.video.label(),
                stage,
                style(&failed.reason).dim()
            );
        }
    }
    if report.dropped_chapters > 0 {
        println!(
            "\n{} {} malformed chapter(s) were dropped",
            style("!").yellow().bold(),
            report.dropped_chapters
        );
    }
}

#[tokio::main]
async fn main() -> Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    // Validate credentials before touching any files
    let api_key = match Provider::resolve_credential(cli.api_key.clone(), API_KEY_ENV) {
        Ok(key) => key,
        Err(e) => {
            print_error(e);
            return Ok(ExitCode::FAILURE);
        }
    };
    let index_id = match Provider::resolve_credential(cli.index_id.clone(), INDEX_ID_ENV) {
        Ok(id) => id,
        Err(e) => {
            print_error(e);
            return Ok(ExitCode::FAILURE);
        }
    };
    let config = build_config(&cli, api_key, index_id);

    println!(
        "\n{}  {}\n",
        style("kinscope").cyan().bold(),
        style("Household Chapter Analysis").dim()
    );

    let filter = InventoryFilter::new(cli.households.iter().copied(), cli.days.iter().copied());
    let inventory = match inventory::resolve(&cli.video_dir, &filter, &config.calendar) {
        Ok(inventory) => inventory,
        Err(e) => {
            print_error(e);
            return Ok(ExitCode::FAILURE);
        }
    };
    for (household_id, day) in &inventory.missing {
        println!(
            "{} Missing {}",
            style("!").yellow().bold(),
            style(VideoRecord::file_name(*household_id, *day)).dim()
        );
    }
    if inventory.videos.is_empty() {
        print_error(format!("no matching videos in {}", cli.video_dir.display()));
        return Ok(ExitCode::FAILURE);
    }
    println!(
        "{} Found {} video(s) in {}, analyzing with {}",
        style("✓").green().bold(),
        inventory.videos.len(),
        style(cli.video_dir.display()).dim(),
        config.provider.name()
    );
    if inventory.skipped_files > 0 {
        println!(
            "  {}",
            style(format!(
                "{} file(s) not named household_<ID>_day<N>.mp4 were skipped",
                inventory.skipped_files
            ))
            .dim()
        );
    }

    let service = TwelveLabsService::new(&config).context("Failed to build HTTP client")?;
    let client = AnalysisClient::new(
        std::sync::Arc::new(service),
        config.retry.clone(),
        config.poll.clone(),
    );

    let (events_tx, events_rx) = mpsc::unbounded_channel();
    let mut runner = BatchRunner::new(client, config.concurrency, config.pause_between_videos)
        .with_events(events_tx);
    if let Some(cache_dir) = &config.cache_dir {
        match IndexCache::load(cache_dir, &config.index_id).await {
            Ok(cache) => runner = runner.with_cache(cache),
            Err(e) => warn!("ignoring unreadable upload cache: {}", e),
        }
    }

    let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            let _ = shutdown_tx.send(());
        }
    });

    let started = std::time::Instant::now();
    let renderer = tokio::spawn(progress::render(events_rx));
    let report = runner.run(inventory.videos, shutdown_rx).await;
    drop(runner);
    let _ = renderer.await;

    println!(
        "\n{} {}/{} video(s) succeeded in {}",
        if report.is_success() {
            style("✓").green().bold()
        } else {
            style("✗").red().bold()
        },
        report.succeeded,
        report.attempted,
        format_duration(started.elapsed())
    );

    if report.dataset.is_empty() {
        print_error("no chapters were produced, nothing written");
        return Ok(ExitCode::FAILURE);
    }

    report
        .dataset
        .write_csv(&cli.output)
        .await
        .context("Failed to write combined CSV")?;
    println!(
        "{} {}",
        style("Saved:").dim(),
        style(cli.output.display()).cyan()
    );

    if let Some(dir) = &cli.summaries_dir {
        let written = report
            .dataset
            .write_household_summaries(dir, Uuid::new_v4(), &now_timestamp())
            .await
            .context("Failed to write household summaries")?;
        println!(
            "{} {} household summaries in {}",
            style("Saved:").dim(),
            written.len(),
            style(dir.display()).cyan()
        );
    }

    print_summary(&report);

    Ok(if report.is_success() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_comma_and_space_separated_lists() {
        let cli = Cli::parse_from([
            "batch_analysis",
            "--households",
            "a,B",
            "C",
            "--days",
            "1,2",
        ]);
        let households: Vec<_> = cli.households.iter().map(|h| h.to_string()).collect();
        assert_eq!(households, vec!["A", "B", "C"]);
        assert_eq!(cli.days, vec![1, 2]);
        assert_eq!(cli.output, PathBuf::from(DEFAULT_OUTPUT));
        assert_eq!(cli.weekend_days, vec![3, 4]);
    }

    #[test]
    fn rejects_bad_household_and_day_zero() {
        assert!(Cli::try_parse_from(["batch_analysis", "--households", "AB"]).is_err());
        assert!(Cli::try_parse_from(["batch_analysis", "--days", "0"]).is_err());
    }

    #[test]
    fn config_follows_flags() {
        let cli = Cli::parse_from([
            "batch_analysis",
            "--concurrency",
            "3",
            "--weekend-days",
            "6,7",
            "--force",
            "--pause-secs",
            "0",
        ]);
        let config = build_config(&cli, "key".into(), "idx".into());
        assert_eq!(config.concurrency, 3);
        assert_eq!(config.calendar.day_type(6).as_str(), "weekend");
        assert_eq!(config.calendar.day_type(3).as_str(), "weekday");
        assert!(config.cache_dir.is_none());
        assert_eq!(config.pause_between_videos, Duration::ZERO);
    }
}
