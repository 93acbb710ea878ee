pub mod process;
pub mod retrieve;
pub mod status;
pub mod synthesize;

use std::{future::Future, pin::Pin, sync::Arc};

use serde_json::Value;
use uuid::Uuid;

use exam_config::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, OcrProviderConfig,
	WebSearchProviderConfig,
};
use exam_domain::{QuestionDraft, TextBlock};
use exam_providers::{
	document, embedding,
	generation::{self, Generation},
	ocr,
	websearch::{self, SearchSnippet},
};
use exam_storage::{
	db::Db,
	models::{KnowledgeMatch, QuestionRecord, TestRecord, TestStatus},
	queries::{self, RecordedAnswer},
};

pub use process::{ProcessOutcome, process_test};
pub use retrieve::{ContextPassage, RetrievedContext};
pub use status::{StatusReport, processing_status};

pub type ServiceResult<T> = Result<T, ServiceError>;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait OcrProvider
where
	Self: Send + Sync,
{
	fn extract<'a>(
		&'a self,
		cfg: &'a OcrProviderConfig,
		document: &'a [u8],
		filename: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<TextBlock>>>;
}

pub trait EmbeddingProvider
where
	Self: Send + Sync,
{
	fn embed_one<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait SearchProvider
where
	Self: Send + Sync,
{
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
		max_results: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SearchSnippet>>>;
}

pub trait GenerationProvider
where
	Self: Send + Sync,
{
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Generation>>;
}

pub trait DocumentProvider
where
	Self: Send + Sync,
{
	fn download<'a>(
		&'a self,
		file_url: &'a str,
		timeout_ms: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<u8>>>;
}

/// Persistence seam for the pipeline. The Postgres implementation lives in
/// `PgStore`; tests swap in an in-memory store.
pub trait ResultStore
where
	Self: Send + Sync,
{
	fn fetch_test<'a>(&'a self, test_id: Uuid)
	-> BoxFuture<'a, ServiceResult<Option<TestRecord>>>;

	fn create_questions<'a>(
		&'a self,
		test_id: Uuid,
		drafts: &'a [QuestionDraft],
	) -> BoxFuture<'a, ServiceResult<Vec<Uuid>>>;

	fn record_answer<'a>(
		&'a self,
		question_id: Uuid,
		answer: &'a RecordedAnswer,
	) -> BoxFuture<'a, ServiceResult<()>>;

	fn finalize_test<'a>(
		&'a self,
		test_id: Uuid,
		status: TestStatus,
		processing_time: Option<f64>,
		error_message: Option<&'a str>,
	) -> BoxFuture<'a, ServiceResult<()>>;

	fn test_questions<'a>(
		&'a self,
		test_id: Uuid,
	) -> BoxFuture<'a, ServiceResult<Vec<QuestionRecord>>>;

	fn knowledge_search<'a>(
		&'a self,
		embedding: &'a [f32],
		threshold: f32,
		top_k: u32,
	) -> BoxFuture<'a, ServiceResult<Vec<KnowledgeMatch>>>;
}

#[derive(Debug)]
pub enum ServiceError {
	InvalidRequest { message: String },
	NotFound { message: String },
	Conflict { message: String },
	Provider { message: String },
	Storage { message: String },
}

#[derive(Clone)]
pub struct Providers {
	pub ocr: Arc<dyn OcrProvider>,
	pub embedding: Arc<dyn EmbeddingProvider>,
	pub websearch: Arc<dyn SearchProvider>,
	pub generation: Arc<dyn GenerationProvider>,
	pub document: Arc<dyn DocumentProvider>,
}

pub struct ExamService {
	pub cfg: Config,
	pub store: Arc<dyn ResultStore>,
	pub providers: Providers,
}

/// `ResultStore` over the Postgres pool, delegating to `exam_storage`.
pub struct PgStore {
	pool: sqlx::PgPool,
}

struct DefaultProviders;

impl std::fmt::Display for ServiceError {
	fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
		match self {
			Self::InvalidRequest { message } => write!(f, "Invalid request: {message}"),
			Self::NotFound { message } => write!(f, "Not found: {message}"),
			Self::Conflict { message } => write!(f, "Conflict: {message}"),
			Self::Provider { message } => write!(f, "Provider error: {message}"),
			Self::Storage { message } => write!(f, "Storage error: {message}"),
		}
	}
}

impl std::error::Error for ServiceError {}

impl From<sqlx::Error> for ServiceError {
	fn from(err: sqlx::Error) -> Self {
		Self::Storage { message: err.to_string() }
	}
}

impl From<color_eyre::Report> for ServiceError {
	fn from(err: color_eyre::Report) -> Self {
		Self::Provider { message: err.to_string() }
	}
}

impl From<exam_storage::Error> for ServiceError {
	fn from(err: exam_storage::Error) -> Self {
		match err {
			exam_storage::Error::Sqlx(inner) => Self::Storage { message: inner.to_string() },
			exam_storage::Error::InvalidArgument(message) => Self::InvalidRequest { message },
			exam_storage::Error::NotFound(message) => Self::NotFound { message },
			exam_storage::Error::Conflict(message) => Self::Conflict { message },
		}
	}
}

impl OcrProvider for DefaultProviders {
	fn extract<'a>(
		&'a self,
		cfg: &'a OcrProviderConfig,
		document: &'a [u8],
		filename: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<TextBlock>>> {
		Box::pin(ocr::extract(cfg, document, filename))
	}
}

impl EmbeddingProvider for DefaultProviders {
	fn embed_one<'a>(
		&'a self,
		cfg: &'a EmbeddingProviderConfig,
		text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(embedding::embed_one(cfg, text))
	}
}

impl SearchProvider for DefaultProviders {
	fn search<'a>(
		&'a self,
		cfg: &'a WebSearchProviderConfig,
		query: &'a str,
		max_results: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SearchSnippet>>> {
		Box::pin(websearch::search(cfg, query, max_results))
	}
}

impl GenerationProvider for DefaultProviders {
	fn generate<'a>(
		&'a self,
		cfg: &'a GenerationProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Generation>> {
		Box::pin(generation::generate(cfg, messages))
	}
}

impl DocumentProvider for DefaultProviders {
	fn download<'a>(
		&'a self,
		file_url: &'a str,
		timeout_ms: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<u8>>> {
		Box::pin(document::download(file_url, timeout_ms))
	}
}

impl Providers {
	pub fn new(
		ocr: Arc<dyn OcrProvider>,
		embedding: Arc<dyn EmbeddingProvider>,
		websearch: Arc<dyn SearchProvider>,
		generation: Arc<dyn GenerationProvider>,
		document: Arc<dyn DocumentProvider>,
	) -> Self {
		Self { ocr, embedding, websearch, generation, document }
	}
}

impl Default for Providers {
	fn default() -> Self {
		let provider = Arc::new(DefaultProviders);

		Self {
			ocr: provider.clone(),
			embedding: provider.clone(),
			websearch: provider.clone(),
			generation: provider.clone(),
			document: provider,
		}
	}
}

impl PgStore {
	pub fn new(pool: sqlx::PgPool) -> Self {
		Self { pool }
	}
}

impl ResultStore for PgStore {
	fn fetch_test<'a>(
		&'a self,
		test_id: Uuid,
	) -> BoxFuture<'a, ServiceResult<Option<TestRecord>>> {
		Box::pin(async move { Ok(queries::fetch_test(&self.pool, test_id).await?) })
	}

	fn create_questions<'a>(
		&'a self,
		test_id: Uuid,
		drafts: &'a [QuestionDraft],
	) -> BoxFuture<'a, ServiceResult<Vec<Uuid>>> {
		Box::pin(async move { Ok(queries::create_questions(&self.pool, test_id, drafts).await?) })
	}

	fn record_answer<'a>(
		&'a self,
		question_id: Uuid,
		answer: &'a RecordedAnswer,
	) -> BoxFuture<'a, ServiceResult<()>> {
		Box::pin(async move { Ok(queries::record_answer(&self.pool, question_id, answer).await?) })
	}

	fn finalize_test<'a>(
		&'a self,
		test_id: Uuid,
		status: TestStatus,
		processing_time: Option<f64>,
		error_message: Option<&'a str>,
	) -> BoxFuture<'a, ServiceResult<()>> {
		Box::pin(async move {
			Ok(queries::finalize_test(&self.pool, test_id, status, processing_time, error_message)
				.await?)
		})
	}

	fn test_questions<'a>(
		&'a self,
		test_id: Uuid,
	) -> BoxFuture<'a, ServiceResult<Vec<QuestionRecord>>> {
		Box::pin(async move { Ok(queries::test_questions(&self.pool, test_id).await?) })
	}

	fn knowledge_search<'a>(
		&'a self,
		embedding: &'a [f32],
		threshold: f32,
		top_k: u32,
	) -> BoxFuture<'a, ServiceResult<Vec<KnowledgeMatch>>> {
		Box::pin(async move {
			Ok(queries::knowledge_search(&self.pool, embedding, threshold, top_k).await?)
		})
	}
}

impl ExamService {
	pub fn new(cfg: Config, db: &Db) -> Self {
		Self {
			cfg,
			store: Arc::new(PgStore::new(db.pool.clone())),
			providers: Providers::default(),
		}
	}

	pub fn with_parts(cfg: Config, store: Arc<dyn ResultStore>, providers: Providers) -> Self {
		Self { cfg, store, providers }
	}
}
