use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use content_extractor::{
    classify, store, validate_url, CacheStore, CascadeOrchestrator, ContentCache, ContentSource, FallbackExecutor,
    FetchConfig, InlineExecutor, MemoryCacheStore, MemorySubmissionStore, MockCritiqueGenerator,
    MockDerivativeGenerator, PgCacheStore, PgSubmissionStore, PipelineExecutor, QueuedExecutor, SourceTables,
    SubmissionPipeline, SubmissionStore,
};
use sqlx::postgres::PgPoolOptions;
use sqlx::PgPool;
use std::env;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "content-extractor")]
#[command(about = "Extract article and post text through a cascade of fetch strategies")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the detected platform/publication for a URL
    Classify { url: String },

    /// Extract content from a URL
    Extract {
        url: String,
        /// Per-request timeout in seconds
        #[arg(long)]
        timeout: Option<u64>,
        /// Skip the content cache
        #[arg(long)]
        no_cache: bool,
    },

    /// Run a submission through the pipeline with the mock collaborators
    Submit {
        /// Article or post URL
        url: Option<String>,
        /// Pasted article text instead of a URL
        #[arg(long, conflicts_with = "url")]
        text: Option<String>,
        #[arg(long)]
        title: Option<String>,
    },

    /// Delete expired cache entries
    PurgeCache,

    /// Apply database migrations
    Migrate,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let config = FetchConfig::from_env().context("Invalid EXTRACTOR_* configuration")?;
    let tables = SourceTables::from_env().context("Failed to load source tables")?;

    match cli.command {
        Commands::Classify { url } => {
            let validation = validate_url(&tables, &url);
            if let Some(error) = validation.error {
                anyhow::bail!("{}", error);
            }
            let classification = classify(&tables, &url)?;
            println!("{}", serde_json::to_string_pretty(&classification)?);
        }
        Commands::Extract { url, timeout, no_cache } => {
            let timeout = timeout.map(Duration::from_secs).unwrap_or_else(|| config.timeout());
            let db = connect().await?;
            let mut orchestrator = CascadeOrchestrator::from_config(config.clone())?;
            if !no_cache {
                orchestrator = orchestrator.with_cache(content_cache(db.as_ref(), &config));
            }

            let result = orchestrator.extract_with_cache(&url, timeout).await?;
            println!("{}", serde_json::to_string_pretty(&result)?);
            if !result.success {
                std::process::exit(2);
            }
        }
        Commands::Submit { url, text, title } => {
            let db = connect().await?;
            let submissions: Arc<dyn SubmissionStore> = match &db {
                Some(pool) => Arc::new(PgSubmissionStore::new(pool.clone())),
                None => Arc::new(MemorySubmissionStore::new()),
            };
            let orchestrator =
                CascadeOrchestrator::from_config(config.clone())?.with_cache(content_cache(db.as_ref(), &config));

            let pipeline = Arc::new(
                SubmissionPipeline::new(
                    submissions.clone(),
                    Arc::new(orchestrator),
                    Arc::new(MockCritiqueGenerator::new("cli")),
                    tables.clone(),
                )
                .with_timeout(config.timeout())
                .with_generator(Arc::new(MockDerivativeGenerator::new("tweet")))
                .with_generator(Arc::new(MockDerivativeGenerator::new("thread")))
                .with_generator(Arc::new(MockDerivativeGenerator::new("letter"))),
            );

            let submission = match (url, text) {
                (Some(url), _) => pipeline.submit_url(&url).await?,
                (None, Some(text)) => pipeline.submit_text(&text, title, None).await?,
                (None, None) => anyhow::bail!("Provide a URL or --text"),
            };

            let queue = Arc::new(QueuedExecutor::spawn(pipeline.clone(), 16));
            let executor = FallbackExecutor::new(queue.clone(), Arc::new(InlineExecutor::new(pipeline.clone())));
            executor.dispatch(submission.id).await?;
            queue.shutdown().await?;

            let submission = submissions.get(submission.id).await?;
            println!("{}", serde_json::to_string_pretty(&submission)?);
            for content in submissions.list_derivatives(submission.id).await? {
                println!("--- {} ---\n{}", content.kind, content.content);
            }
        }
        Commands::PurgeCache => {
            let db = connect().await?.context("DATABASE_URL is required to purge the cache")?;
            let deleted = content_cache(Some(&db), &config).purge_expired().await?;
            println!("Deleted {} expired cache entries", deleted);
        }
        Commands::Migrate => {
            let db = connect().await?.context("DATABASE_URL is required to run migrations")?;
            store::migrate(&db).await?;
            info!("Migrations applied");
        }
    }

    Ok(())
}

/// Postgres pool when `DATABASE_URL` is set.
async fn connect() -> Result<Option<PgPool>> {
    let database_url = match env::var("DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            warn!("DATABASE_URL not set, using in-memory stores");
            return Ok(None);
        }
    };

    let pool = PgPoolOptions::new()
        .max_connections(5)
        .connect(&database_url)
        .await
        .context("Failed to connect to database")?;
    Ok(Some(pool))
}

fn content_cache(db: Option<&PgPool>, config: &FetchConfig) -> ContentCache {
    let store: Arc<dyn CacheStore> = match db {
        Some(pool) => Arc::new(PgCacheStore::new(pool.clone())),
        None => Arc::new(MemoryCacheStore::new()),
    };
    ContentCache::new(store).with_default_ttl(config.cache_ttl())
}
