pub mod cli;
pub mod config;
pub mod model;
pub mod search;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::collections::BTreeMap;
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use config::SearchServiceConfig;
use model::{SearchFlags, SortCriterion};
use search::memory::MemoryBackend;
use search::ranker::RankerKind;
use search::{SearchRequest, SearchService, StaticEntityRegistry};

/// Command-line interface.
#[derive(Parser, Debug)]
#[command(
    name = "catalog-search",
    version,
    about = "Cross-entity search over a metadata catalog fixture"
)]
pub struct Cli {
    /// JSON fixture: `[{"entity_type", "id", "document"}]`
    #[arg(long, env = "CATALOG_SEARCH_FIXTURE")]
    pub fixture: PathBuf,

    /// TOML config file (environment variables override it)
    #[arg(long)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Search across entity types and print the merged page as JSON
    Search {
        /// Query text; `*` matches everything
        query: String,

        /// Entity type to search (repeatable; default: all in the fixture)
        #[arg(long = "entity")]
        entities: Vec<String>,

        /// Conjunction like `platform=hive;removed!=true` (repeatable, ORed)
        #[arg(long = "filter")]
        filters: Vec<String>,

        /// Filter as JSON: `{"or": [{"and": [...]}]}`
        #[arg(long)]
        filter_json: Option<String>,

        #[arg(long, default_value_t = 0)]
        from: usize,

        #[arg(long, default_value_t = 10)]
        size: usize,

        /// Sort by this field instead of score
        #[arg(long)]
        sort: Option<String>,

        /// Sort descending
        #[arg(long, requires = "sort")]
        desc: bool,

        /// Exact-value matching instead of full-text
        #[arg(long)]
        structured: bool,

        #[arg(long)]
        skip_cache: bool,

        /// Override the configured ranker
        #[arg(long, value_enum)]
        ranker: Option<RankerKind>,
    },
    /// Print document counts per entity type as JSON
    Count {
        #[arg(long = "entity")]
        entities: Vec<String>,
    },
}

pub fn run(args: Cli) -> Result<()> {
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    run_with_output(args, &mut out)
}

pub fn run_with_output(args: Cli, out: &mut dyn Write) -> Result<()> {
    let mut config = match &args.config {
        Some(path) => SearchServiceConfig::load(path)
            .with_context(|| format!("loading config {}", path.display()))?,
        None => SearchServiceConfig::load_env().context("invalid search configuration in environment")?,
    };

    let backend = Arc::new(MemoryBackend::new());
    let docs = cli::read_fixture(&args.fixture)?;
    let fixture_types = cli::load_fixture(backend.as_ref(), &docs)?;

    match args.command {
        Commands::Search {
            query,
            entities,
            filters,
            filter_json,
            from,
            size,
            sort,
            desc,
            structured,
            skip_cache,
            ranker,
        } => {
            if let Some(ranker) = ranker {
                config.ranker = ranker;
            }
            let service = SearchService::from_config(
                &config,
                Arc::new(StaticEntityRegistry::new(fixture_types)),
                backend,
            );
            let flags = if structured {
                SearchFlags::structured()
            } else {
                SearchFlags::fulltext()
            }
            .with_skip_cache(skip_cache);

            let mut request = SearchRequest::new(query)
                .entity_types(entities)
                .page(from, size)
                .flags(flags);
            if let Some(filter) = cli::build_filter(&filters, filter_json.as_deref())? {
                request = request.filter(filter);
            }
            if let Some(field) = sort {
                request = request.sort(if desc {
                    SortCriterion::descending(field)
                } else {
                    SortCriterion::ascending(field)
                });
            }

            let result = service.search(&request)?;
            serde_json::to_writer_pretty(&mut *out, &result)?;
        }
        Commands::Count { entities } => {
            let service = SearchService::from_config(
                &config,
                Arc::new(StaticEntityRegistry::new(fixture_types.clone())),
                backend,
            );
            let targets = if entities.is_empty() { fixture_types } else { entities };
            let counts = targets
                .iter()
                .map(|t| service.doc_count(t).map(|c| (t.clone(), c)))
                .collect::<Result<BTreeMap<_, _>, _>>()?;
            serde_json::to_writer_pretty(&mut *out, &counts)?;
        }
    }
    writeln!(out)?;
    Ok(())
}
