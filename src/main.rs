mod config;
mod enrich;
mod error;
mod extract;
mod fetch;
mod metrics;
mod pipeline;
mod posts;
mod reconcile;
mod report;
mod sheet;

use std::path::PathBuf;
use std::time::Instant;

use anyhow::Context;
use clap::{Parser, Subcommand};

use crate::config::{FetcherKind, Settings, Workspace};
use crate::extract::SelectorExtractor;
use crate::posts::fmt_count;
use crate::sheet::{SheetKind, Workbook};

#[derive(Parser)]
#[command(name = "linklytics", about = "LinkedIn analytics export reporter")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Reconcile the export, fetch the top posts and write the report
    Run {
        /// Number of top posts to fetch and analyze
        #[arg(short = 'n', long)]
        top_n: Option<usize>,
        /// Directory holding the exported .xlsx
        #[arg(long)]
        data: Option<PathBuf>,
        /// Directory the report is written to
        #[arg(long)]
        output: Option<PathBuf>,
        /// Page fetcher backend
        #[arg(long, value_enum)]
        fetcher: Option<FetcherKind>,
        /// Also write a JSON report next to the markdown one
        #[arg(long)]
        json: bool,
    },
    /// Print the reconciled post ranking without fetching anything
    Posts {
        /// Max rows to display
        #[arg(short = 'n', long, default_value = "50")]
        limit: usize,
        /// Show a single post by its URL
        #[arg(long)]
        url: Option<String>,
        #[arg(long)]
        data: Option<PathBuf>,
    },
    /// List the workbook's sheets and check their names
    Sheets {
        #[arg(long)]
        data: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let mut settings = Settings::load().context("Failed to load settings")?;

    let result = match cli.command {
        Commands::Run {
            top_n,
            data,
            output,
            fetcher,
            json,
        } => {
            if let Some(n) = top_n {
                settings.top_n = n;
            }
            if let Some(dir) = data {
                settings.analytics_path = dir;
            }
            if let Some(dir) = output {
                settings.output_dir = dir;
            }
            if let Some(kind) = fetcher {
                settings.fetcher = kind;
            }

            let path = config::locate_workbook(&settings.analytics_path)?;
            let workspace = Workspace::prepare(&settings.output_dir)?;
            let analytics = pipeline::load_analytics(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            println!(
                "Loaded {} posts from {}",
                analytics.store.len(),
                analytics.file_name
            );

            let fetcher = fetch::from_settings(&settings)?;
            let extractor = SelectorExtractor::new(&settings.content_selector)?;
            let report =
                pipeline::analyze(analytics, settings.top_n, fetcher.as_ref(), &extractor).await?;

            let written = report.write(&workspace, json)?;
            println!(
                "Analyzed {} of top {} posts.",
                report.summary.posts, report.summary.top_n
            );
            for path in written {
                println!("Wrote {}", path.display());
            }
            Ok(())
        }
        Commands::Posts { limit, url, data } => {
            let dir = data.unwrap_or(settings.analytics_path);
            let path = config::locate_workbook(&dir)?;
            let analytics = pipeline::load_analytics(&path)
                .with_context(|| format!("Failed to read {}", path.display()))?;
            if let Some(url) = url {
                match analytics.store.get_post_by_url(&url) {
                    Some(post) => println!("{}", post),
                    None => println!("No post with URL {}.", url),
                }
                return Ok(());
            }
            if analytics.store.is_empty() {
                println!("No posts found in {}.", analytics.file_name);
                return Ok(());
            }

            println!(
                "{:>3} | {:<10} | {:>11} | {:>11} | {:<60}",
                "#", "Published", "Engagements", "Impressions", "Post URL"
            );
            println!("{}", "-".repeat(106));
            for (i, p) in analytics.store.posts().iter().take(limit).enumerate() {
                println!(
                    "{:>3} | {:<10} | {:>11} | {:>11} | {:<60}",
                    i + 1,
                    p.publish_date.format("%m/%d/%Y"),
                    fmt_count(p.engagements),
                    fmt_count(p.impressions),
                    truncate(&p.post_url, 60)
                );
            }

            if let Some(a) = analytics.account {
                println!(
                    "\n{} to {}: {} impressions, {} engagements over {} days",
                    a.first_day, a.last_day, a.impressions, a.engagements, a.days
                );
            }
            println!("\n{} posts", analytics.store.len());
            Ok(())
        }
        Commands::Sheets { data } => {
            let dir = data.unwrap_or(settings.analytics_path);
            let path = config::locate_workbook(&dir)?;
            let workbook = Workbook::open(&path)?;
            for name in workbook.sheet_names() {
                let status = match SheetKind::from_name(&name) {
                    Some(kind) if SheetKind::REQUIRED.contains(&kind) => "required",
                    Some(_) => "known",
                    None => "UNKNOWN",
                };
                println!("  {:<14} {}", name, status);
            }
            workbook.validate()?;
            println!("Sheets OK.");
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        println!("\nDone in {}", format_duration(elapsed));
    }

    result
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max).collect();
        format!("{}...", truncated)
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
