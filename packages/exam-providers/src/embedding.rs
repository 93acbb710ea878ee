use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

pub async fn embed(
	cfg: &exam_config::EmbeddingProviderConfig,
	texts: &[String],
) -> Result<Vec<Vec<f32>>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": texts,
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::request_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vectors = parse_embedding_response(json)?;

	for vector in &vectors {
		if vector.len() != cfg.dimensions as usize {
			return Err(eyre::eyre!(
				"Embedding dimension {} does not match configured dimensions {}.",
				vector.len(),
				cfg.dimensions
			));
		}
	}

	Ok(vectors)
}

/// Embeds a single query text. Most pipeline call sites need exactly one
/// vector per question.
pub async fn embed_one(cfg: &exam_config::EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	let mut vectors = embed(cfg, std::slice::from_ref(&text.to_string())).await?;

	vectors.pop().ok_or_else(|| eyre::eyre!("Embedding provider returned no vectors."))
}

fn parse_embedding_response(json: Value) -> Result<Vec<Vec<f32>>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;
	let mut indexed = Vec::with_capacity(data.len());

	for (position, item) in data.iter().enumerate() {
		let index = item
			.get("index")
			.and_then(|v| v.as_u64())
			.map(|v| v as usize)
			.unwrap_or(position);
		let values = item
			.get("embedding")
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Embedding item is missing its vector."))?;
		let mut vector = Vec::with_capacity(values.len());

		for value in values {
			let number = value
				.as_f64()
				.ok_or_else(|| eyre::eyre!("Embedding vector values must be numeric."))?;

			vector.push(number as f32);
		}

		indexed.push((index, vector));
	}

	// The provider may return items out of order; the index field wins.
	indexed.sort_by_key(|(index, _)| *index);

	Ok(indexed.into_iter().map(|(_, vector)| vector).collect())
}
