use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

use exam_domain::{Bounds, TextBlock};

/// Sends the raw document to the OCR collaborator and returns its text blocks
/// in document order. The document travels as an octet stream; the provider
/// infers the format from the filename query parameter.
pub async fn extract(
	cfg: &exam_config::OcrProviderConfig,
	document: &[u8],
	filename: &str,
) -> Result<Vec<TextBlock>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let res = client
		.post(url)
		.query(&[("filename", filename)])
		.headers(crate::request_headers(&cfg.api_key, &cfg.default_headers)?)
		.header(reqwest::header::CONTENT_TYPE, "application/octet-stream")
		.body(document.to_vec())
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_extraction_response(json)
}

fn parse_extraction_response(json: Value) -> Result<Vec<TextBlock>> {
	if let Some(blocks) = json.get("blocks").and_then(|v| v.as_array()) {
		let mut out = Vec::with_capacity(blocks.len());

		for block in blocks {
			let text = block
				.get("text")
				.and_then(|v| v.as_str())
				.ok_or_else(|| eyre::eyre!("OCR block is missing text."))?;

			out.push(TextBlock { text: text.to_string(), bounds: parse_bounds(block) });
		}

		return Ok(out);
	}

	// Providers without layout support return one flat text field.
	if let Some(text) = json.get("text").and_then(|v| v.as_str()) {
		return Ok(vec![TextBlock::new(text)]);
	}

	Err(eyre::eyre!("OCR response contains neither blocks nor text."))
}

fn parse_bounds(block: &Value) -> Option<Bounds> {
	let bounds = block.get("bounds")?;
	let field = |name: &str| bounds.get(name).and_then(|v| v.as_f64()).map(|v| v as f32);

	Some(Bounds {
		x: field("x")?,
		y: field("y")?,
		width: field("width")?,
		height: field("height")?,
	})
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_blocks_with_bounds() {
		let json = serde_json::json!({
			"blocks": [
				{ "text": "1. First?", "bounds": { "x": 0.0, "y": 10.0, "width": 200.0, "height": 14.0 } },
				{ "text": "A) Yes" }
			]
		});
		let blocks = parse_extraction_response(json).expect("parse failed");

		assert_eq!(blocks.len(), 2);
		assert_eq!(blocks[0].text, "1. First?");
		assert!(blocks[0].bounds.is_some());
		assert!(blocks[1].bounds.is_none());
	}

	#[test]
	fn falls_back_to_flat_text() {
		let json = serde_json::json!({ "text": "1. Only question?" });
		let blocks = parse_extraction_response(json).expect("parse failed");

		assert_eq!(blocks.len(), 1);
		assert_eq!(blocks[0].text, "1. Only question?");
	}

	#[test]
	fn rejects_payload_without_text() {
		let json = serde_json::json!({ "pages": 3 });

		assert!(parse_extraction_response(json).is_err());
	}
}
