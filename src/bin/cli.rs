//! Corpus Scraper CLI
//!
//! Local execution entry point.

use std::fs::{File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Args, Parser, Subcommand, ValueEnum};
use corpus_scraper::{
    engine::{EngineBuilder, EngineFactory, EngineKind, FetchEngine, probe},
    error::{AppError, Result},
    models::{Config, PaginationMode, ScrapeJob, UrlList},
    pipeline::{self, Scraper},
    services::{AllowAll, RequestProfile, RobotsGuard, RobotsPolicy, RotatingProfile},
    storage::{self, StorageFormat},
    utils::{http, normalize_slug},
};
use tokio_util::sync::CancellationToken;

/// Corpus Scraper - News Archive Harvester
#[derive(Parser, Debug)]
#[command(
    name = "corpus-scraper",
    version,
    about = "Harvests articles from news archive pages"
)]
struct Cli {
    /// Path to the TOML configuration file
    #[arg(short, long, default_value = "config.toml")]
    config: PathBuf,

    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Also write logs to this file (scrape defaults to {log_dir}/{slug}.log)
    #[arg(long)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Collect archive URLs and harvest articles
    Scrape(ScrapeArgs),

    /// Check the records of an output file
    Validate {
        /// Output file to check
        path: PathBuf,

        /// Storage format (inferred from the extension when omitted)
        #[arg(long, value_enum)]
        format: Option<StorageFormat>,
    },

    /// Show size and record count of an output file
    Stats {
        /// Output file to inspect
        path: PathBuf,

        /// Storage format (inferred from the extension when omitted)
        #[arg(long, value_enum)]
        format: Option<StorageFormat>,
    },

    /// Probe engines against a URL and selector
    CheckSelector {
        #[arg(long)]
        url: String,

        #[arg(long)]
        selector: String,

        /// Probe only this engine
        #[arg(long, value_enum)]
        engine: Option<EngineKind>,
    },
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
enum PaginationKind {
    None,
    QueryParam,
    LoadMore,
    Scroll,
}

#[derive(Args, Debug)]
struct ScrapeArgs {
    /// Archive (listing) page URL
    #[arg(long, required_unless_present = "skip_archive")]
    url: Option<String>,

    /// Selector for article blocks on archive pages
    #[arg(long, required_unless_present = "skip_archive")]
    archive_selector: Option<String>,

    /// Selector for the article content node (read from the URLs file when skipping the archive)
    #[arg(long, required_unless_present = "skip_archive")]
    content_selector: Option<String>,

    /// Selector for thumbnails inside article blocks
    #[arg(long)]
    thumbnail_selector: Option<String>,

    /// Pagination strategy
    #[arg(long, value_enum, default_value = "none")]
    pagination: PaginationKind,

    /// Page template (query-param, e.g. "?page={n}") or button selector (load-more)
    #[arg(long)]
    page_param: Option<String>,

    /// Maximum number of archive pages
    #[arg(long)]
    max_pages: Option<usize>,

    /// Project name used for artifact file names
    #[arg(long, default_value = "scraper_output")]
    slug: String,

    /// Output file (default: {data_dir}/{slug}.jsonl or .json)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Output representation
    #[arg(long, value_enum, default_value = "ndjson")]
    format: StorageFormat,

    /// Use this engine for both phases without probing
    #[arg(long, value_enum)]
    engine: Option<EngineKind>,

    /// Skip articles already present in the output file
    #[arg(long)]
    resume: bool,

    /// URL-list handoff file (default: {data_dir}/{slug}_urls.json)
    #[arg(long)]
    urls_file: Option<PathBuf>,

    /// Read article URLs from the URLs file instead of crawling the archive
    #[arg(long)]
    skip_archive: bool,

    /// Do not consult robots.txt
    #[arg(long)]
    ignore_robots: bool,

    /// Back up the output file before writing
    #[arg(long)]
    backup: bool,
}

/// Copies every log line to stderr and a file.
struct Tee {
    file: File,
}

impl Write for Tee {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        io::stderr().write_all(buf)?;
        self.file.write_all(buf)?;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        io::stderr().flush()?;
        self.file.flush()
    }
}

/// Initialize logging based on verbosity flag.
fn init_logging(verbose: bool, log_file: Option<&Path>) -> io::Result<()> {
    let level = if verbose { "debug" } else { "info" };
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level));
    builder.format_timestamp_secs();

    if let Some(path) = log_file {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(Tee { file })));
    }

    builder.init();
    Ok(())
}

/// Main entry point for the CLI application.
#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    // Config comes first so the log directory is known; its errors are logged below.
    let loaded = if cli.config.exists() {
        Some(Config::load(&cli.config))
    } else {
        None
    };
    let log_dir = match &loaded {
        Some(Ok(config)) => config.output.log_dir.clone(),
        _ => Config::default().output.log_dir,
    };
    let log_file = cli.log_file.clone().or_else(|| match &cli.command {
        Command::Scrape(args) => {
            Some(Path::new(&log_dir).join(format!("{}.log", normalize_slug(&args.slug))))
        }
        _ => None,
    });
    if let Err(e) = init_logging(cli.verbose, log_file.as_deref()) {
        eprintln!("Cannot open log file: {e}");
        return ExitCode::FAILURE;
    }

    let config = match loaded {
        Some(Ok(config)) => {
            log::info!("Loaded configuration from {}", cli.config.display());
            config
        }
        Some(Err(e)) => {
            log::warn!(
                "Config load failed from {}: {}. Using defaults.",
                cli.config.display(),
                e
            );
            Config::default()
        }
        None => {
            log::info!("No config at {}; using defaults", cli.config.display());
            Config::default()
        }
    };

    match run(cli.command, config).await {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

async fn run(command: Command, config: Config) -> Result<ExitCode> {
    match command {
        Command::Scrape(args) => scrape(args, config).await,

        Command::Validate { path, format } => {
            let format = resolve_format(&path, format)?;
            let report = pipeline::validate_output(&path, format).await?;
            pipeline::log_report(&report);
            Ok(if report.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }

        Command::Stats { path, format } => {
            let format = resolve_format(&path, format)?;
            if !path.exists() {
                log::warn!("{} does not exist", path.display());
                return Ok(ExitCode::FAILURE);
            }
            let sink = storage::open_sink(&path, format).await?;
            let stats = sink.stats().await?;
            corpus_scraper::utils::log::summary(
                &format!("Output file {}", stats.path.display()),
                &[
                    ("Format", format!("{:?}", stats.format)),
                    ("Size (bytes)", stats.size_bytes.to_string()),
                    ("Records", stats.record_count.to_string()),
                ],
            );
            Ok(ExitCode::SUCCESS)
        }

        Command::CheckSelector {
            url,
            selector,
            engine,
        } => {
            config.validate()?;
            let config = Arc::new(config);
            let profile: Arc<dyn RequestProfile> = Arc::new(RotatingProfile::new(&config.crawler));
            let builder = EngineBuilder::new(config, profile);
            let kinds = engine.map(|k| vec![k]).unwrap_or_else(|| builder.candidates());

            let mut any_ok = false;
            for kind in kinds {
                let mut engine = match builder.build(kind).await {
                    Ok(engine) => engine,
                    Err(e) => {
                        log::warn!("{kind}: {e}");
                        continue;
                    }
                };
                let result = probe(&mut engine, &url, &selector).await;
                engine.teardown().await;
                log::info!(
                    "{kind}: {} ({})",
                    if result.ok { "OK" } else { "FAILED" },
                    result.message
                );
                any_ok |= result.ok;
            }
            Ok(if any_ok {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            })
        }
    }
}

fn resolve_format(path: &Path, format: Option<StorageFormat>) -> Result<StorageFormat> {
    format
        .or_else(|| StorageFormat::from_path(path))
        .ok_or_else(|| {
            AppError::config(format!(
                "cannot infer the storage format of {}; pass --format",
                path.display()
            ))
        })
}

async fn scrape(args: ScrapeArgs, config: Config) -> Result<ExitCode> {
    let slug = normalize_slug(&args.slug);
    let data_dir = PathBuf::from(&config.output.data_dir);
    let output = args
        .output
        .unwrap_or_else(|| data_dir.join(format!("{slug}.{}", args.format.extension())));
    let urls_file = args
        .urls_file
        .unwrap_or_else(|| data_dir.join(format!("{slug}_urls.json")));

    let content_selector = match args.content_selector {
        Some(selector) => selector,
        None => UrlList::load(&urls_file).await?.content_selector,
    };
    let pagination = match args.pagination {
        PaginationKind::None => PaginationMode::None,
        PaginationKind::QueryParam => PaginationMode::QueryParam {
            template: args.page_param.unwrap_or_else(|| "?page={n}".to_string()),
        },
        PaginationKind::LoadMore => PaginationMode::LoadMore {
            button_selector: args.page_param.unwrap_or_default(),
        },
        PaginationKind::Scroll => PaginationMode::Scroll,
    };

    let job = ScrapeJob {
        archive_url: args.url.unwrap_or_default(),
        archive_selector: args.archive_selector.unwrap_or_default(),
        content_selector,
        thumbnail_selector: args.thumbnail_selector,
        pagination,
        max_pages: args.max_pages,
        output,
        format: args.format,
        force_engine: args.engine,
        resume: args.resume,
        urls_file: Some(urls_file),
        skip_archive: args.skip_archive,
    };

    if args.backup {
        storage::backup(&job.output).await?;
    }

    let config = Arc::new(config);
    let profile: Arc<dyn RequestProfile> = Arc::new(RotatingProfile::new(&config.crawler));
    let robots: Arc<dyn RobotsPolicy> = if args.ignore_robots || !config.crawler.respect_robots {
        log::info!("robots.txt checks disabled");
        Arc::new(AllowAll)
    } else {
        Arc::new(RobotsGuard::new(http::create_client(&config.crawler, None)?))
    };
    let scraper = Scraper::new(
        config.clone(),
        EngineBuilder::new(config, profile),
        robots,
    );

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                log::warn!("Interrupt received; stopping");
                cancel.cancel();
            }
        }
    });

    let report = scraper.run(&job, &cancel).await?;
    Ok(ExitCode::from(report.exit_code()))
}
