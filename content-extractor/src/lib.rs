pub mod types;
pub mod tables;
pub mod classifier;
pub mod heuristics;
pub mod html;
pub mod fetcher;
pub mod cache;
pub mod strategies;
pub mod cascade;
pub mod submission;
pub mod store;
pub mod collaborators;
pub mod pipeline;

pub use types::*;
pub use tables::SourceTables;
pub use classifier::{classify, validate_url, Classification, SourceKind};
pub use heuristics::PaywallRules;
pub use fetcher::{HttpPageClient, PageClient, PageResponse};
pub use cache::{CacheStore, ContentCache, MemoryCacheStore, PgCacheStore};
pub use strategies::{FetchStrategy, StrategyStage};
pub use cascade::{CascadeOrchestrator, ContentSource};
pub use submission::{Critique, DerivativeContent, Submission, SubmissionStatus};
pub use store::{MemorySubmissionStore, PgSubmissionStore, SubmissionStore};
pub use collaborators::{CritiqueGenerator, DerivativeGenerator, MockCritiqueGenerator, MockDerivativeGenerator};
pub use pipeline::{FallbackExecutor, InlineExecutor, PipelineExecutor, PipelineReport, QueuedExecutor, SubmissionPipeline};
