mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Config, EmbeddingProviderConfig, GenerationProviderConfig, OcrProviderConfig, Postgres,
	Processing, Providers, Retrieval, Service, Storage, WebSearchProviderConfig,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.log_level.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.log_level must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.dsn.trim().is_empty() {
		return Err(Error::Validation {
			message: "storage.postgres.dsn must be non-empty.".to_string(),
		});
	}
	if cfg.storage.postgres.pool_max_conns == 0 {
		return Err(Error::Validation {
			message: "storage.postgres.pool_max_conns must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.retrieval.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match retrieval.vector_dim.".to_string(),
		});
	}
	if !cfg.providers.generation.temperature.is_finite() {
		return Err(Error::Validation {
			message: "providers.generation.temperature must be a finite number.".to_string(),
		});
	}
	if !(0.0..=2.0).contains(&cfg.providers.generation.temperature) {
		return Err(Error::Validation {
			message: "providers.generation.temperature must be in the range 0.0-2.0.".to_string(),
		});
	}
	if !cfg.retrieval.similarity_threshold.is_finite() {
		return Err(Error::Validation {
			message: "retrieval.similarity_threshold must be a finite number.".to_string(),
		});
	}
	if !(0.0..=1.0).contains(&cfg.retrieval.similarity_threshold) {
		return Err(Error::Validation {
			message: "retrieval.similarity_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.retrieval.top_k == 0 {
		return Err(Error::Validation {
			message: "retrieval.top_k must be greater than zero.".to_string(),
		});
	}
	if cfg.retrieval.min_local_results > cfg.retrieval.top_k {
		return Err(Error::Validation {
			message: "retrieval.min_local_results must not exceed retrieval.top_k.".to_string(),
		});
	}
	if cfg.processing.deadline_secs == 0 {
		return Err(Error::Validation {
			message: "processing.deadline_secs must be greater than zero.".to_string(),
		});
	}
	if cfg.processing.max_concurrent_questions == 0 {
		return Err(Error::Validation {
			message: "processing.max_concurrent_questions must be greater than zero.".to_string(),
		});
	}
	if cfg.processing.poll_interval_ms == 0 {
		return Err(Error::Validation {
			message: "processing.poll_interval_ms must be greater than zero.".to_string(),
		});
	}
	if cfg.processing.essay_min_chars == 0 {
		return Err(Error::Validation {
			message: "processing.essay_min_chars must be greater than zero.".to_string(),
		});
	}

	for (label, key, timeout_ms) in [
		("ocr", &cfg.providers.ocr.api_key, cfg.providers.ocr.timeout_ms),
		("embedding", &cfg.providers.embedding.api_key, cfg.providers.embedding.timeout_ms),
		("websearch", &cfg.providers.websearch.api_key, cfg.providers.websearch.timeout_ms),
		("generation", &cfg.providers.generation.api_key, cfg.providers.generation.timeout_ms),
	] {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
		if timeout_ms == 0 {
			return Err(Error::Validation {
				message: format!("Provider {label} timeout_ms must be greater than zero."),
			});
		}
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	if cfg
		.providers
		.websearch
		.engine_id
		.as_deref()
		.map(|engine| engine.trim().is_empty())
		.unwrap_or(false)
	{
		cfg.providers.websearch.engine_id = None;
	}
}
