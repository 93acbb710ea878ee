use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;

/// Fetches the uploaded document bytes from the storage bucket URL the upload
/// surface recorded on the test row.
pub async fn download(file_url: &str, timeout_ms: u64) -> Result<Vec<u8>> {
	let client = Client::builder().timeout(Duration::from_millis(timeout_ms)).build()?;
	let res = client.get(file_url).send().await?;
	let bytes = res.error_for_status()?.bytes().await?;

	if bytes.is_empty() {
		return Err(eyre::eyre!("Downloaded document at {file_url} is empty."));
	}

	Ok(bytes.to_vec())
}
