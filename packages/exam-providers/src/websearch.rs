use std::time::Duration;

use color_eyre::Result;
use reqwest::Client;
use serde_json::Value;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchSnippet {
	pub title: String,
	pub url: String,
	pub snippet: String,
}

/// Queries the web-search collaborator. A response without items is an empty
/// result set, not an error; the caller treats provider failures as soft.
pub async fn search(
	cfg: &exam_config::WebSearchProviderConfig,
	query: &str,
	max_results: u32,
) -> Result<Vec<SearchSnippet>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let num = max_results.min(10).to_string();
	let mut params = vec![("key", cfg.api_key.as_str()), ("q", query), ("num", num.as_str())];

	if let Some(engine_id) = cfg.engine_id.as_deref() {
		params.push(("cx", engine_id));
	}

	let res = client
		.get(url)
		.query(&params)
		.headers(crate::request_headers(&cfg.api_key, &cfg.default_headers)?)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	Ok(parse_search_response(json))
}

fn parse_search_response(json: Value) -> Vec<SearchSnippet> {
	let Some(items) = json.get("items").and_then(|v| v.as_array()) else {
		return Vec::new();
	};

	items
		.iter()
		.filter_map(|item| {
			let title = item.get("title").and_then(|v| v.as_str())?;
			let snippet = item.get("snippet").and_then(|v| v.as_str())?;
			let url = item.get("link").and_then(|v| v.as_str()).unwrap_or_default();

			Some(SearchSnippet {
				title: title.to_string(),
				url: url.to_string(),
				snippet: snippet.to_string(),
			})
		})
		.collect()
}
