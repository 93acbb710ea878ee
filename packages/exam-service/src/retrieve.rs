use std::time::Duration;

use tokio::time;
use tracing::warn;

use exam_domain::RetrievalStrength;
use exam_storage::models::KnowledgeMatch;

use crate::ExamService;

/// One piece of context offered to the generation model.
#[derive(Debug, Clone)]
pub enum ContextPassage {
	Knowledge { title: String, content: String, similarity: f32 },
	Web { title: String, url: String, snippet: String },
}
impl ContextPassage {
	pub fn body(&self) -> &str {
		match self {
			Self::Knowledge { content, .. } => content,
			Self::Web { snippet, .. } => snippet,
		}
	}
}

#[derive(Debug, Clone)]
pub struct RetrievedContext {
	pub passages: Vec<ContextPassage>,
	pub strength: RetrievalStrength,
}
impl RetrievedContext {
	pub fn empty() -> Self {
		Self { passages: Vec::new(), strength: RetrievalStrength::NoContext }
	}
}

/// Gathers context for one question: knowledge base first, web search only
/// when local coverage is thin. Every collaborator failure degrades to less
/// context rather than an error; the worst case is `NoContext`.
pub(crate) async fn retrieve(service: &ExamService, question_text: &str) -> RetrievedContext {
	let retrieval = &service.cfg.retrieval;
	let local_hits = local_context(service, question_text).await;
	let local_count = local_hits.len();
	let mut passages = local_hits
		.into_iter()
		.map(|hit| ContextPassage::Knowledge {
			title: hit.title,
			content: hit.content,
			similarity: hit.similarity,
		})
		.collect::<Vec<_>>();

	// Web results only top up the context; the merged list never exceeds K.
	let web_budget = retrieval.top_k.saturating_sub(local_count as u32);

	if (local_count as u32) < retrieval.min_local_results && web_budget > 0 {
		passages.extend(web_context(service, question_text, web_budget).await);
	}

	let strength = if local_count > 0 {
		RetrievalStrength::LocalCoverage
	} else if passages.is_empty() {
		RetrievalStrength::NoContext
	} else {
		RetrievalStrength::WebOnly
	};

	RetrievedContext { passages, strength }
}

async fn local_context(service: &ExamService, question_text: &str) -> Vec<KnowledgeMatch> {
	let embed_cfg = &service.cfg.providers.embedding;
	let retrieval = &service.cfg.retrieval;
	let embedded = time::timeout(
		Duration::from_millis(embed_cfg.timeout_ms),
		service.providers.embedding.embed_one(embed_cfg, question_text),
	)
	.await;
	let embedding = match embedded {
		Ok(Ok(embedding)) => embedding,
		Ok(Err(err)) => {
			warn!(error = %err, "Embedding failed; continuing without local context.");

			return Vec::new();
		},
		Err(_) => {
			warn!("Embedding timed out; continuing without local context.");

			return Vec::new();
		},
	};

	match service
		.store
		.knowledge_search(&embedding, retrieval.similarity_threshold, retrieval.top_k)
		.await
	{
		Ok(hits) => hits,
		Err(err) => {
			warn!(error = %err, "Knowledge search failed; continuing without local context.");

			Vec::new()
		},
	}
}

async fn web_context(
	service: &ExamService,
	question_text: &str,
	max_results: u32,
) -> Vec<ContextPassage> {
	let search_cfg = &service.cfg.providers.websearch;
	let searched = time::timeout(
		Duration::from_millis(search_cfg.timeout_ms),
		service.providers.websearch.search(search_cfg, question_text, max_results),
	)
	.await;

	match searched {
		Ok(Ok(snippets)) => snippets
			.into_iter()
			// The provider is asked for `max_results`, but an over-delivering
			// backend must not push the merged context past K.
			.take(max_results as usize)
			.map(|snippet| ContextPassage::Web {
				title: snippet.title,
				url: snippet.url,
				snippet: snippet.snippet,
			})
			.collect(),
		Ok(Err(err)) => {
			warn!(error = %err, "Web search failed; continuing without web context.");

			Vec::new()
		},
		Err(_) => {
			warn!("Web search timed out; continuing without web context.");

			Vec::new()
		},
	}
}
