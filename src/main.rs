use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use catalog_harvester::config::{non_negative_secs, parse_roots, ApiCredentials, HarvestConfig};
use catalog_harvester::extract::DescriptionSource;
use catalog_harvester::harvest::formats::open_sink;
use catalog_harvester::harvest::{HarvestPipeline, StopReason};
use catalog_harvester::paapi::{Locale, PaapiClient};
use catalog_harvester::taxonomy::{self, TaxonomySource, DEFAULT_SHEET};

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Parser, Debug)]
#[command(name = "catalog-harvester", version, about = "Product catalog harvester")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
#[command(rename_all = "kebab-case")]
enum Commands {
    /// Harvest products for every category (and optionally search term) into one file
    Harvest(HarvestArgs),
    /// Print the category ids (or search terms) a harvest would use, without calling the API
    Nodes {
        #[command(flatten)]
        taxonomy: TaxonomyArgs,
        /// Print search terms derived from node paths instead of ids
        #[arg(long, default_value_t = false)]
        keywords: bool,
    },
}

#[derive(Args, Debug)]
struct TaxonomyArgs {
    /// Browse-tree mapping file (.xls, .xlsx, .ods, .csv, .tsv)
    #[arg(long)]
    taxonomy: Option<PathBuf>,
    /// Sheet index inside a workbook
    #[arg(long, default_value_t = DEFAULT_SHEET)]
    sheet: usize,
    /// Comma-separated category roots to leave out (overrides HARVEST_EXCLUDED_ROOTS)
    #[arg(long)]
    exclude: Option<String>,
}

#[derive(Args, Debug)]
struct HarvestArgs {
    #[command(flatten)]
    taxonomy: TaxonomyArgs,
    /// Harvest the direct children of this browse node instead of a taxonomy file
    #[arg(long, conflicts_with_all = ["taxonomy", "exclude", "keywords", "no_categories"])]
    root_node: Option<String>,
    /// Output file; `.tsv` and `.jsonl` switch format
    #[arg(long, short, default_value = "products.csv")]
    output: PathBuf,
    /// Also harvest search terms derived from node paths, after all categories
    #[arg(long, default_value_t = false)]
    keywords: bool,
    /// Skip category harvesting (only meaningful with --keywords)
    #[arg(long, default_value_t = false, requires = "keywords")]
    no_categories: bool,
    /// Pages requested per category or term
    #[arg(long)]
    max_pages: Option<u32>,
    /// Items requested per page (provider maximum is 10)
    #[arg(long)]
    page_size: Option<u32>,
    /// Minimum seconds between two API calls
    #[arg(long)]
    throttle_secs: Option<f64>,
    /// Marketplace country code (overrides AMAZON_COUNTRY)
    #[arg(long)]
    country: Option<String>,
    /// Description column source: title or features
    #[arg(long)]
    description: Option<DescriptionSource>,
    /// Field delimiter for delimited output
    #[arg(long, default_value = ",", value_parser = parse_delimiter)]
    delimiter: u8,
    /// Restrict searches to one search index (e.g. Beauty)
    #[arg(long)]
    search_index: Option<String>,
    /// Only harvest the first N categories and N terms
    #[arg(long)]
    limit: Option<usize>,
    /// Print the run statistics as JSON
    #[arg(long, default_value_t = false)]
    json: bool,
}

fn parse_delimiter(value: &str) -> Result<u8, String> {
    match value {
        "\\t" | "tab" => Ok(b'\t'),
        v if v.len() == 1 && v.is_ascii() => Ok(v.as_bytes()[0]),
        v => Err(format!("delimiter must be a single ASCII character, got '{}'", v)),
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Harvest(args) => harvest(args).await,
        Commands::Nodes { taxonomy, keywords } => print_nodes(&taxonomy, keywords),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "Run failed");
            ExitCode::FAILURE
        }
    }
}

fn excluded_roots(args: &TaxonomyArgs, config: &HarvestConfig) -> std::collections::HashSet<String> {
    args.exclude
        .as_deref()
        .map(parse_roots)
        .unwrap_or_else(|| config.excluded_roots.clone())
}

fn taxonomy_source(args: &TaxonomyArgs) -> Result<TaxonomySource, BoxError> {
    let path = args
        .taxonomy
        .clone()
        .ok_or("a taxonomy file is required (--taxonomy)")?;
    Ok(TaxonomySource::new(path).with_sheet(args.sheet))
}

fn print_nodes(args: &TaxonomyArgs, keywords: bool) -> Result<(), BoxError> {
    let config = HarvestConfig::from_env()?;
    let source = taxonomy_source(args)?;
    let excluded = excluded_roots(args, &config);
    let units = if keywords {
        taxonomy::load_search_terms(&source, &excluded)?
    } else {
        taxonomy::load(&source, &excluded)?
    };
    for unit in units {
        println!("{}", unit);
    }
    Ok(())
}

async fn harvest(args: HarvestArgs) -> Result<(), BoxError> {
    let mut config = HarvestConfig::from_env()?;
    if let Some(pages) = args.max_pages {
        config.max_pages = pages;
    }
    if let Some(size) = args.page_size {
        config.page_size = size;
    }
    if let Some(secs) = args.throttle_secs {
        config.throttle = non_negative_secs("--throttle-secs", secs)?;
    }
    if let Some(country) = &args.country {
        config.country = country.clone();
    }
    if let Some(description) = args.description {
        config.description = description;
    }
    config.excluded_roots = excluded_roots(&args.taxonomy, &config);

    let locale = Locale::for_country(&config.country)
        .ok_or_else(|| format!("unsupported marketplace country '{}'", config.country))?;
    let client = PaapiClient::new(ApiCredentials::from_env()?, locale, config.request_timeout)?
        .with_search_index(args.search_index.clone());

    let (mut categories, mut terms) = match &args.root_node {
        Some(root) => {
            let children = client.child_node_ids(root).await?;
            info!(root = %root, children = children.len(), "Resolved child categories");
            (children, Vec::new())
        }
        None => {
            let source = taxonomy_source(&args.taxonomy)?;
            let categories = if args.no_categories {
                Vec::new()
            } else {
                taxonomy::load(&source, &config.excluded_roots)?
            };
            let terms = if args.keywords {
                taxonomy::load_search_terms(&source, &config.excluded_roots)?
            } else {
                Vec::new()
            };
            (categories, terms)
        }
    };
    if let Some(limit) = args.limit {
        categories.truncate(limit);
        terms.truncate(limit);
    }

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received; stopping harvest");
            on_signal.cancel();
        }
    });

    let sink = open_sink(&args.output, args.delimiter)?;
    let mut pipeline = HarvestPipeline::new(Arc::new(client), sink, &config, cancel);
    let result = pipeline.execute(categories, terms).await?;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&result.stats)?);
    }
    let note = match &result.stop_reason {
        StopReason::Completed => "all units processed".to_string(),
        StopReason::RateLimited => "stopped early: provider throttling".to_string(),
        StopReason::Cancelled => "stopped early: interrupted".to_string(),
        StopReason::ProviderFatal(reason) => format!("stopped early: {}", reason),
    };
    info!(
        output = %args.output.display(),
        records = result.stats.records_written,
        "Saved {} products ({})",
        result.stats.records_written,
        note
    );
    Ok(())
}
