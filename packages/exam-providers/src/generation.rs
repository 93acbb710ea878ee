use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Raw generation output. `confidence` is the provider's own calibration
/// signal when the API exposes one; most chat APIs do not, and the content
/// body may carry a self-reported score instead.
#[derive(Debug, Clone, PartialEq)]
pub struct Generation {
	pub text: String,
	pub confidence: Option<f32>,
}

pub async fn generate(
	cfg: &exam_config::GenerationProviderConfig,
	messages: &[Value],
) -> Result<Generation> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": messages,
		"response_format": { "type": "json_object" },
	});
	let res = client
		.post(url)
		.headers(crate::request_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_generation_response(json)
}

fn parse_generation_response(json: Value) -> Result<Generation> {
	let choice = json
		.get("choices")
		.and_then(|v| v.as_array())
		.and_then(|choices| choices.first())
		.ok_or_else(|| eyre::eyre!("Generation response has no choices."))?;
	let text = choice
		.get("message")
		.and_then(|message| message.get("content"))
		.and_then(|content| content.as_str())
		.ok_or_else(|| eyre::eyre!("Generation choice is missing message content."))?;

	if text.trim().is_empty() {
		return Err(eyre::eyre!("Generation returned empty content."));
	}

	let confidence = choice
		.get("confidence")
		.and_then(|v| v.as_f64())
		.map(|v| (v as f32).clamp(0.0, 1.0));

	Ok(Generation { text: text.to_string(), confidence })
}
