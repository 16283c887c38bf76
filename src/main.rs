//! `funnel`: command-line front-end for the relevance funnel.
//!
//! ```bash
//! funnel run --topic ecommerce --source links
//! funnel run --topic rust --subreddit rust --timeframe 2
//! funnel history list
//! funnel history show ecommerce
//! ```

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use relevance_funnel::analyze::build_oracle;
use relevance_funnel::history::HistoryStore;
use relevance_funnel::ingest::providers::link_page::LinkPageSource;
use relevance_funnel::ingest::providers::reddit::RedditSource;
use relevance_funnel::progress::{LogProgress, WatchProgress};
use relevance_funnel::{
    ErrorKind, FunnelConfig, FunnelError, Pipeline, Query, RunOutcome, SourceAdapter,
    TimeframeBucket,
};

/// Narrow news links or discussion posts down to what matters for a topic.
#[derive(Parser)]
#[command(name = "funnel", version, about)]
struct Cli {
    /// Path to the TOML config (defaults to $FUNNEL_CONFIG_PATH, then config/funnel.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch, filter, score, narrow and analyze items for a topic.
    Run {
        #[arg(long)]
        topic: String,
        #[arg(long, value_enum, default_value_t = SourceKind::Reddit)]
        source: SourceKind,
        /// Subreddit to read (defaults to the topic).
        #[arg(long)]
        subreddit: Option<String>,
        /// 1 = past 3 days, 2 = 3 days–1 week, 3 = 1–2 weeks, 4 = 2–3 weeks.
        #[arg(long)]
        timeframe: Option<u8>,
        #[arg(long)]
        min_engagement: Option<i64>,
        #[arg(long)]
        threshold: Option<f32>,
    },
    /// Inspect previous runs.
    History {
        #[command(subcommand)]
        action: HistoryAction,
    },
}

#[derive(Subcommand)]
enum HistoryAction {
    /// List recorded topics.
    List,
    /// Show the first recorded entry for a topic (exact match).
    Show { topic: String },
}

#[derive(Clone, Copy, ValueEnum)]
enum SourceKind {
    Reddit,
    Links,
}

fn json_logs() -> bool {
    std::env::var("FUNNEL_LOG_JSON")
        .ok()
        .is_some_and(|v| v == "1")
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("funnel=info,relevance_funnel=info,warn"));
    let json = json_logs();

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init();
    } else {
        registry
            .with(fmt::layer().compact().with_writer(std::io::stderr))
            .init();
    }
}

fn load_config(path: Option<PathBuf>) -> Result<FunnelConfig> {
    match path {
        Some(p) => FunnelConfig::load_from_with_env(&p),
        None => FunnelConfig::load_default(),
    }
}

fn exit_code(kind: ErrorKind) -> ExitCode {
    match kind {
        ErrorKind::Validation => ExitCode::from(2),
        ErrorKind::Source => ExitCode::from(3),
        ErrorKind::Oracle => ExitCode::from(4),
        ErrorKind::Persistence => ExitCode::from(5),
    }
}

fn build_source(
    cfg: &FunnelConfig,
    kind: SourceKind,
    subreddit: Option<String>,
) -> Result<Arc<dyn SourceAdapter>> {
    Ok(match kind {
        SourceKind::Reddit => {
            let sub = subreddit.or_else(|| cfg.reddit.subreddit.clone());
            let mut src = match cfg.reddit.resolve_user_agent() {
                Some(ua) => RedditSource::with_user_agent(sub, cfg.reddit.comment_limit, &ua)?,
                None => RedditSource::new(sub, cfg.reddit.comment_limit)?,
            };
            match cfg.reddit.resolve_credentials() {
                Some((id, secret)) => src = src.with_credentials(id, secret),
                None => tracing::warn!(
                    target: "funnel::ingest",
                    "no reddit app credentials; using the anonymous, heavily rate-limited endpoints"
                ),
            }
            Arc::new(src)
        }
        SourceKind::Links => {
            if cfg.links.start_urls.is_empty() {
                anyhow::bail!("[links] start_urls is empty in the config");
            }
            Arc::new(LinkPageSource::new(&cfg.links.start_urls)?)
        }
    })
}

fn print_funnel_error(e: &FunnelError) {
    match e {
        FunnelError::Validation(m) => eprintln!("Invalid input: {m}"),
        FunnelError::Source(m) => eprintln!("Fetching items failed: {m}"),
        FunnelError::Oracle(m) => eprintln!("Classification/analysis failed: {m}"),
        FunnelError::Persistence { message, result } => {
            eprintln!("Saving history failed: {message}");
            if let Some(r) = result {
                if let Some(n) = &r.narrative {
                    println!("===== ANALYSIS (not saved) =====\n{n}");
                }
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
async fn cmd_run(
    cfg: FunnelConfig,
    topic: String,
    source: SourceKind,
    subreddit: Option<String>,
    timeframe: Option<u8>,
    min_engagement: Option<i64>,
    threshold: Option<f32>,
) -> Result<ExitCode> {
    let query = match Query::new(
        &topic,
        timeframe
            .map(TimeframeBucket::from_selector)
            .unwrap_or_else(|| cfg.pipeline.timeframe_bucket()),
        min_engagement.unwrap_or(cfg.pipeline.min_engagement),
        threshold.unwrap_or(cfg.pipeline.similarity_threshold),
    ) {
        Ok(q) => q,
        Err(e) => {
            print_funnel_error(&e);
            return Ok(exit_code(e.kind()));
        }
    };

    let src = build_source(&cfg, source, subreddit)?;
    let oracle = build_oracle(&cfg.oracle)?;
    let history = HistoryStore::file(&cfg.history.path);
    let pipeline = Pipeline::new(cfg.pipeline.clone(), src, oracle, history);

    println!(
        "Fetching items for \"{}\" ({})...",
        query.topic, query.timeframe
    );
    // JSON logs get progress as log events; a terminal gets plain percent lines.
    let (pipeline, printer) = if json_logs() {
        (pipeline.with_progress(Arc::new(LogProgress)), None)
    } else {
        let (sink, mut rx) = WatchProgress::channel();
        let printer = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let p = *rx.borrow_and_update();
                eprintln!("[{p:>3}%]");
            }
        });
        (pipeline.with_progress(Arc::new(sink)), Some(printer))
    };
    let pipeline = Arc::new(pipeline);

    let outcome = pipeline.spawn(query).await.context("pipeline task panicked")?;
    if let Some(printer) = printer {
        printer.abort();
    }

    match outcome {
        Ok(RunOutcome::Completed(r)) => {
            println!("===== ANALYSIS COMPLETE =====");
            for (i, s) in r.results.iter().enumerate() {
                println!("{:>2}. [{:.2}] {} - {}", i + 1, s.similarity_score, s.title, s.url);
            }
            if let Some(n) = &r.narrative {
                println!("\n{n}");
            }
            Ok(ExitCode::SUCCESS)
        }
        Ok(RunOutcome::NoCandidates { stage }) => {
            println!("No candidates found: {}.", stage.describe());
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            print_funnel_error(&e);
            Ok(exit_code(e.kind()))
        }
    }
}

fn cmd_history(cfg: &FunnelConfig, action: HistoryAction) -> ExitCode {
    let store = HistoryStore::file(&cfg.history.path);
    let res = match action {
        HistoryAction::List => store.topics().map(|topics| {
            if topics.is_empty() {
                println!("No history yet.");
            }
            for t in topics {
                println!("{t}");
            }
        }),
        HistoryAction::Show { topic } => store.find_by_topic(&topic).map(|found| match found {
            Some(e) => {
                println!("Topic: {} ({})", e.topic, e.recorded_at.to_rfc3339());
                for s in &e.results {
                    println!("- {} - {}", s.title, s.url);
                }
                if let Some(n) = &e.narrative {
                    println!("\n{n}");
                }
            }
            None => println!("No history for \"{topic}\"."),
        }),
    };
    match res {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            print_funnel_error(&e);
            exit_code(e.kind())
        }
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    init_tracing();

    let cli = Cli::parse();
    let cfg = match load_config(cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Config error: {e:#}");
            return ExitCode::from(2);
        }
    };

    match cli.command {
        Command::Run {
            topic,
            source,
            subreddit,
            timeframe,
            min_engagement,
            threshold,
        } => match cmd_run(cfg, topic, source, subreddit, timeframe, min_engagement, threshold)
            .await
        {
            Ok(code) => code,
            Err(e) => {
                eprintln!("Setup error: {e:#}");
                ExitCode::FAILURE
            }
        },
        Command::History { action } => cmd_history(&cfg, action),
    }
}
