use std::time::Duration;

use color_eyre::eyre;
use serde_json::Value;
use tokio::time;
use uuid::Uuid;

use exam_config::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, OcrProviderConfig, Postgres,
	Processing, Retrieval, Service, Storage, WebSearchProviderConfig,
};
use exam_domain::TextBlock;
use exam_providers::{generation::Generation, websearch::SearchSnippet};
use exam_service::{
	BoxFuture, DocumentProvider, EmbeddingProvider, GenerationProvider, OcrProvider,
	SearchProvider,
};
use exam_storage::models::KnowledgeMatch;

/// A config with stub-friendly defaults; tests mutate the fields they need.
pub fn test_config() -> Config {
	Config {
		service: Service { log_level: "info".to_string() },
		storage: Storage {
			postgres: Postgres {
				dsn: "postgres://localhost/unused".to_string(),
				pool_max_conns: 1,
			},
		},
		providers: exam_config::Providers {
			ocr: OcrProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/ocr".to_string(),
				timeout_ms: 2_000,
				default_headers: serde_json::Map::new(),
			},
			embedding: EmbeddingProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embed".to_string(),
				dimensions: 4,
				timeout_ms: 2_000,
				default_headers: serde_json::Map::new(),
			},
			websearch: WebSearchProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/search".to_string(),
				engine_id: None,
				timeout_ms: 2_000,
				default_headers: serde_json::Map::new(),
			},
			generation: GenerationProviderConfig {
				provider_id: "stub".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test".to_string(),
				path: "/chat/completions".to_string(),
				model: "test-gen".to_string(),
				temperature: 0.2,
				timeout_ms: 2_000,
				default_headers: serde_json::Map::new(),
			},
		},
		retrieval: Retrieval {
			similarity_threshold: 0.7,
			top_k: 5,
			min_local_results: 2,
			vector_dim: 4,
		},
		processing: Processing {
			deadline_secs: 300,
			max_concurrent_questions: 10,
			poll_interval_ms: 50,
			essay_min_chars: 240,
		},
	}
}

pub fn knowledge_hit(title: &str, content: &str, similarity: f32) -> KnowledgeMatch {
	KnowledgeMatch {
		entry_id: Uuid::new_v4(),
		title: title.to_string(),
		content: content.to_string(),
		source_url: None,
		category: None,
		similarity,
	}
}

pub struct StubOcr {
	blocks: Vec<TextBlock>,
	error: Option<String>,
}
impl StubOcr {
	pub fn text(text: &str) -> Self {
		Self { blocks: vec![TextBlock::new(text)], error: None }
	}

	pub fn blocks(blocks: Vec<TextBlock>) -> Self {
		Self { blocks, error: None }
	}

	pub fn failing(message: &str) -> Self {
		Self { blocks: Vec::new(), error: Some(message.to_string()) }
	}
}
impl OcrProvider for StubOcr {
	fn extract<'a>(
		&'a self,
		_cfg: &'a OcrProviderConfig,
		_document: &'a [u8],
		_filename: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<TextBlock>>> {
		Box::pin(async move {
			match &self.error {
				Some(message) => Err(eyre::eyre!("{message}")),
				None => Ok(self.blocks.clone()),
			}
		})
	}
}

pub struct StubEmbedding {
	vector: Vec<f32>,
	error: Option<String>,
}
impl StubEmbedding {
	pub fn fixed(vector: Vec<f32>) -> Self {
		Self { vector, error: None }
	}

	pub fn failing(message: &str) -> Self {
		Self { vector: Vec::new(), error: Some(message.to_string()) }
	}
}
impl EmbeddingProvider for StubEmbedding {
	fn embed_one<'a>(
		&'a self,
		_cfg: &'a EmbeddingProviderConfig,
		_text: &'a str,
	) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(async move {
			match &self.error {
				Some(message) => Err(eyre::eyre!("{message}")),
				None => Ok(self.vector.clone()),
			}
		})
	}
}

pub struct StubSearch {
	snippets: Vec<SearchSnippet>,
	error: Option<String>,
}
impl StubSearch {
	pub fn fixed(snippets: Vec<SearchSnippet>) -> Self {
		Self { snippets, error: None }
	}

	pub fn empty() -> Self {
		Self::fixed(Vec::new())
	}

	pub fn failing(message: &str) -> Self {
		Self { snippets: Vec::new(), error: Some(message.to_string()) }
	}
}
impl SearchProvider for StubSearch {
	fn search<'a>(
		&'a self,
		_cfg: &'a WebSearchProviderConfig,
		_query: &'a str,
		_max_results: u32,
	) -> BoxFuture<'a, color_eyre::Result<Vec<SearchSnippet>>> {
		Box::pin(async move {
			match &self.error {
				Some(message) => Err(eyre::eyre!("{message}")),
				None => Ok(self.snippets.clone()),
			}
		})
	}
}

type GenerationReply = Box<dyn Fn(&str) -> color_eyre::Result<Generation> + Send + Sync>;

/// Generation stub scripted on the user-message content, with an optional
/// artificial delay for deadline tests.
pub struct StubGeneration {
	reply: GenerationReply,
	delay: Duration,
}
impl StubGeneration {
	pub fn fixed(body: &str) -> Self {
		let body = body.to_string();

		Self::with_reply(move |_| Ok(Generation { text: body.clone(), confidence: None }))
	}

	pub fn failing(message: &str) -> Self {
		let message = message.to_string();

		Self::with_reply(move |_| Err(eyre::eyre!("{message}")))
	}

	pub fn with_reply<F>(reply: F) -> Self
	where
		F: Fn(&str) -> color_eyre::Result<Generation> + Send + Sync + 'static,
	{
		Self { reply: Box::new(reply), delay: Duration::ZERO }
	}

	pub fn delayed(mut self, delay: Duration) -> Self {
		self.delay = delay;

		self
	}
}
impl GenerationProvider for StubGeneration {
	fn generate<'a>(
		&'a self,
		_cfg: &'a GenerationProviderConfig,
		messages: &'a [Value],
	) -> BoxFuture<'a, color_eyre::Result<Generation>> {
		Box::pin(async move {
			if !self.delay.is_zero() {
				time::sleep(self.delay).await;
			}

			let user = messages
				.iter()
				.rev()
				.find_map(|message| {
					(message.get("role").and_then(|v| v.as_str()) == Some("user"))
						.then(|| message.get("content").and_then(|v| v.as_str()))
						.flatten()
				})
				.unwrap_or_default();

			(self.reply)(user)
		})
	}
}

pub struct StubDocument {
	bytes: Vec<u8>,
	error: Option<String>,
}
impl StubDocument {
	pub fn fixed(bytes: Vec<u8>) -> Self {
		Self { bytes, error: None }
	}

	pub fn failing(message: &str) -> Self {
		Self { bytes: Vec::new(), error: Some(message.to_string()) }
	}
}
impl DocumentProvider for StubDocument {
	fn download<'a>(
		&'a self,
		_file_url: &'a str,
		_timeout_ms: u64,
	) -> BoxFuture<'a, color_eyre::Result<Vec<u8>>> {
		Box::pin(async move {
			match &self.error {
				Some(message) => Err(eyre::eyre!("{message}")),
				None => Ok(self.bytes.clone()),
			}
		})
	}
}
