mod config;
mod crawl;
mod discover;
mod error;
mod fetch;
mod formula;
mod node;
mod output;
mod parser;
mod sites;

use std::path::PathBuf;
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use tracing::{error, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{CrawlTarget, Settings};
use crate::crawl::{CrawlOptions, Crawler};
use crate::fetch::HttpFetcher;

#[derive(Parser)]
#[command(name = "legal_scraper", about = "California statutory and regulatory code scraper")]
struct Cli {
    /// Config file (default: legal_scraper.toml if present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
    /// Output directory
    #[arg(short, long, global = true)]
    output: Option<PathBuf>,
    /// Pause after every request, in milliseconds
    #[arg(long, global = true)]
    delay_ms: Option<u64>,
    /// Per-request timeout, in seconds
    #[arg(long, global = true)]
    timeout_secs: Option<u64>,
    /// Hide the progress bar
    #[arg(short, long, global = true)]
    quiet: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Discover each target's tree and write every leaf
    Crawl {
        /// Target name (repeatable; default: all configured targets)
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },
    /// Discover each target's tree and dump it to structure.json
    Discover {
        /// Target name (repeatable; default: all configured targets)
        #[arg(short, long = "target")]
        targets: Vec<String>,
    },
    /// List configured targets
    Targets,
}

fn main() {
    init_tracing();

    if let Err(err) = run() {
        error!(error = %err, "command failed");
        for cause in err.chain().skip(1) {
            error!(cause = %cause, "caused by");
        }
        std::process::exit(1);
    }
}

fn init_tracing() {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

fn run() -> Result<()> {
    let t0 = Instant::now();
    let cli = Cli::parse();

    let mut settings = Settings::load(cli.config.as_deref()).context("failed to load settings")?;
    if let Some(dir) = cli.output {
        settings.output_dir = dir;
    }
    if let Some(ms) = cli.delay_ms {
        settings.delay_ms = ms;
    }
    if let Some(secs) = cli.timeout_secs {
        settings.timeout_secs = secs;
    }

    let result = match &cli.command {
        Commands::Targets => {
            print_targets(&settings.targets);
            Ok(())
        }
        Commands::Discover { targets } => {
            let selected = settings.select_targets(targets)?;
            let fetcher = http_fetcher(&settings)?;
            let options = crawl_options(&settings, cli.quiet);
            let crawler = Crawler::new(&fetcher, &options);

            let mut failed = 0;
            for target in &selected {
                let outcome = crawler
                    .discover_target(target)
                    .and_then(|tree| Ok((crawler.write_structure(target, &tree)?, tree)));
                match outcome {
                    Ok((path, tree)) => println!(
                        "{}: {} top-level entries, {} leaves -> {}",
                        target.name,
                        tree.children.len(),
                        tree.leaf_count(),
                        path.display()
                    ),
                    Err(err) => {
                        error!(target = %target.name, error = %err, "discovery failed");
                        failed += 1;
                    }
                }
            }
            check_failures(failed, selected.len())
        }
        Commands::Crawl { targets } => {
            let selected = settings.select_targets(targets)?;
            let fetcher = http_fetcher(&settings)?;
            let options = crawl_options(&settings, cli.quiet);
            let crawler = Crawler::new(&fetcher, &options);

            println!(
                "Crawling {} target(s) into {}",
                selected.len(),
                settings.output_dir.display()
            );
            let mut failed = 0;
            for target in &selected {
                let t_target = Instant::now();
                match crawler.run_target(target) {
                    Ok(report) => {
                        println!(
                            "{}: {}/{} leaves written, {} images in {} ({})",
                            report.name,
                            report.leaves_written,
                            report.total_leaves,
                            report.total_images,
                            report.dir.display(),
                            format_duration(t_target.elapsed())
                        );
                        if report.leaves_written < report.total_leaves {
                            warn!(
                                target = %report.name,
                                skipped = report.total_leaves - report.leaves_written,
                                "some leaves were skipped"
                            );
                        }
                    }
                    Err(err) => {
                        error!(target = %target.name, error = %err, "target failed");
                        failed += 1;
                    }
                }
            }
            check_failures(failed, selected.len())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn http_fetcher(settings: &Settings) -> Result<HttpFetcher> {
    HttpFetcher::new(&settings.user_agent, settings.timeout()).context("failed to build HTTP client")
}

fn crawl_options(settings: &Settings, quiet: bool) -> CrawlOptions {
    CrawlOptions {
        output_dir: settings.output_dir.clone(),
        delay: settings.delay(),
        progress: !quiet,
    }
}

fn check_failures(failed: usize, total: usize) -> Result<()> {
    if failed > 0 {
        bail!("{} of {} target(s) failed", failed, total);
    }
    Ok(())
}

fn print_targets(targets: &[CrawlTarget]) {
    println!(
        "{:<28} | {:<8} | {:<5} | {:<8} | {:<8} | {}",
        "Name", "Site", "Code", "Division", "Chapter", "Parts"
    );
    println!("{}", "-".repeat(80));
    for t in targets {
        let parts = t.parts.as_ref().map(|p| p.join(",")).unwrap_or_else(|| "all".into());
        println!(
            "{:<28} | {:<8} | {:<5} | {:<8} | {:<8} | {}",
            truncate(&t.name, 28),
            format!("{:?}", t.site).to_lowercase(),
            t.code,
            t.division,
            t.chapter.as_deref().unwrap_or("-"),
            parts
        );
    }
    println!("\n{} target(s)", targets.len());
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max.saturating_sub(3)).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(format_duration(Duration::from_millis(1500)), "1.5s");
        assert_eq!(format_duration(Duration::from_secs(125)), "2m 5s");
        assert_eq!(format_duration(Duration::from_secs(3725)), "1h 2m 5s");
    }

    #[test]
    fn truncate_keeps_short_names() {
        assert_eq!(truncate("WAT_division_6", 28), "WAT_division_6");
        assert_eq!(truncate("abcdefghij", 8), "abcde...");
    }

    #[test]
    fn cli_parses_repeated_targets() {
        let cli = Cli::try_parse_from([
            "legal_scraper",
            "crawl",
            "--target",
            "WAT_division_6",
            "-t",
            "HSC_division_104",
            "--delay-ms",
            "0",
        ])
        .unwrap();
        assert_eq!(cli.delay_ms, Some(0));
        match cli.command {
            Commands::Crawl { targets } => assert_eq!(targets, vec!["WAT_division_6", "HSC_division_104"]),
            _ => panic!("expected crawl"),
        }
    }
}
