//! A3S Indexer CLI - query configured indexers from the command line.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use a3s_indexer::{
    indexers, BasicSearchCriteria, BookSearchCriteria, IndexerSearch, MovieSearchCriteria,
    MusicSearchCriteria, RelayConfig, SearchCriteria, TvSearchCriteria,
};

/// A3S Indexer - multi-indexer search pipeline CLI
#[derive(Parser)]
#[command(name = "a3s-indexer")]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List available indexer implementations
    Indexers,

    /// Search one configured indexer
    Search(SearchArgs),

    /// Test the connection of one configured indexer
    Test(TestArgs),
}

#[derive(Parser)]
struct SearchArgs {
    /// Search query
    query: String,

    /// Configuration file
    #[arg(short, long, default_value = "a3s-indexer.toml")]
    config: PathBuf,

    /// Indexer id from the configuration
    #[arg(short, long)]
    indexer: String,

    /// Search type
    #[arg(short = 't', long = "type", default_value = "basic")]
    search_type: SearchType,

    /// IMDb id (movie and tv searches)
    #[arg(long)]
    imdb_id: Option<String>,

    /// Season number (tv searches)
    #[arg(long)]
    season: Option<u32>,

    /// Episode number or air date (tv searches)
    #[arg(long)]
    episode: Option<String>,

    /// Number of results to skip
    #[arg(long, default_value = "0")]
    offset: u32,

    /// Maximum number of results
    #[arg(short, long, default_value = "100")]
    limit: u32,

    /// Output format
    #[arg(short, long, default_value = "text")]
    format: OutputFormat,
}

#[derive(Parser)]
struct TestArgs {
    /// Configuration file
    #[arg(short, long, default_value = "a3s-indexer.toml")]
    config: PathBuf,

    /// Indexer id from the configuration
    #[arg(short, long)]
    indexer: String,
}

#[derive(Clone, Copy, ValueEnum)]
enum SearchType {
    Movie,
    Tv,
    Music,
    Book,
    Basic,
}

#[derive(Clone, Copy, ValueEnum)]
enum OutputFormat {
    /// Human-readable text output
    Text,
    /// JSON output
    Json,
    /// Compact single-line output
    Compact,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Setup logging
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber)?;

    match cli.command {
        Commands::Indexers => list_indexers(),
        Commands::Search(args) => run_search(args).await,
        Commands::Test(args) => run_test(args).await,
    }
}

fn list_indexers() -> Result<()> {
    println!("Available indexer implementations:\n");
    for descriptor in indexers::REGISTRY {
        println!(
            "  {:<12} - {} (search: {}, rss: {})",
            descriptor.implementation,
            descriptor.name,
            yes_no(descriptor.supports_search),
            yes_no(descriptor.supports_rss),
        );
    }
    println!();
    println!("Usage: a3s-indexer search -c a3s-indexer.toml -i <indexer-id> \"query\"");
    Ok(())
}

fn yes_no(flag: bool) -> &'static str {
    if flag {
        "yes"
    } else {
        "no"
    }
}

fn build_criteria(args: &SearchArgs) -> SearchCriteria {
    let query = args.query.as_str();
    match args.search_type {
        SearchType::Movie => {
            let mut c = MovieSearchCriteria::new(query).with_paging(args.offset, args.limit);
            if let Some(id) = &args.imdb_id {
                c = c.with_imdb_id(id);
            }
            c.into()
        }
        SearchType::Tv => {
            let mut c = TvSearchCriteria::new(query).with_paging(args.offset, args.limit);
            if let Some(id) = &args.imdb_id {
                c = c.with_imdb_id(id);
            }
            if let Some(season) = args.season {
                c = c.with_season(season);
            }
            if let Some(episode) = &args.episode {
                c = c.with_episode(episode);
            }
            c.into()
        }
        SearchType::Music => MusicSearchCriteria::new(query)
            .with_paging(args.offset, args.limit)
            .into(),
        SearchType::Book => BookSearchCriteria::new(query)
            .with_paging(args.offset, args.limit)
            .into(),
        SearchType::Basic => BasicSearchCriteria::new(query)
            .with_paging(args.offset, args.limit)
            .into(),
    }
}

async fn run_search(args: SearchArgs) -> Result<()> {
    let config = RelayConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let definition = config
        .indexer(&args.indexer)
        .with_context(|| format!("No indexer '{}' in configuration", args.indexer))?
        .clone();
    let indexer = indexers::build_indexer(&definition)?;
    let search = IndexerSearch::new(Arc::new(config.build_client()?));

    let criteria = build_criteria(&args);
    let result = search.fetch(indexer.as_ref(), &definition, &criteria).await;

    for warning in &result.warnings {
        eprintln!("Warning ({}): {}", warning.kind, warning.message);
    }

    match args.format {
        OutputFormat::Text => {
            println!(
                "\nResults for \"{}\" from {} ({} releases in {}ms):\n",
                args.query,
                result.indexer,
                result.releases.len(),
                result.duration_ms
            );
            for (i, release) in result.releases.iter().enumerate() {
                println!("{}. {}", i + 1, release.title);
                println!("   Download: {}", release.download_url);
                if let Some(info) = &release.info_url {
                    println!("   Info: {}", info);
                }
                let size = release
                    .size
                    .map(|s| format!("{:.2} GiB", s as f64 / 1024f64.powi(3)))
                    .unwrap_or_else(|| "?".to_string());
                println!(
                    "   Published: {} | Size: {} | Categories: {}",
                    release.publish_date.format("%Y-%m-%d %H:%M"),
                    size,
                    release.category_names().join(", ")
                );
                println!();
            }
        }
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(&result)?);
        }
        OutputFormat::Compact => {
            for release in &result.releases {
                println!("{}\t{}", release.title, release.download_url);
            }
        }
    }

    Ok(())
}

async fn run_test(args: TestArgs) -> Result<()> {
    let config = RelayConfig::load(&args.config)
        .with_context(|| format!("Failed to load {}", args.config.display()))?;
    let definition = config
        .indexer(&args.indexer)
        .with_context(|| format!("No indexer '{}' in configuration", args.indexer))?
        .clone();
    let indexer = indexers::build_indexer(&definition)?;
    let client = config.build_client()?;

    match indexer.test_connection(&client, &definition).await {
        None => {
            println!("{}: OK", indexer.name());
            Ok(())
        }
        Some(failure) => anyhow::bail!("{}: {}", indexer.name(), failure),
    }
}
