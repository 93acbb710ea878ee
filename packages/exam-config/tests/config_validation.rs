use std::{
	env, fs,
	path::PathBuf,
	sync::atomic::{AtomicU64, Ordering},
	time::{SystemTime, UNIX_EPOCH},
};

use toml::Value;

use exam_config::Config;

const SAMPLE_CONFIG_TOML: &str = include_str!("../../../exam.example.toml");

fn base_config() -> Config {
	toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.")
}

fn sample_toml_with<F>(mutate: F) -> String
where
	F: FnOnce(&mut toml::value::Table),
{
	let mut value: Value =
		toml::from_str(SAMPLE_CONFIG_TOML).expect("Failed to parse sample config.");
	let root = value.as_table_mut().expect("Sample config must be a table.");

	mutate(root);

	toml::to_string(&value).expect("Failed to render sample config.")
}

fn write_temp_config(payload: String) -> PathBuf {
	static COUNTER: AtomicU64 = AtomicU64::new(0);

	let nanos = SystemTime::now()
		.duration_since(UNIX_EPOCH)
		.expect("System time must be valid.")
		.as_nanos();
	let ordinal = COUNTER.fetch_add(1, Ordering::SeqCst);
	let pid = std::process::id();
	let mut path = env::temp_dir();

	path.push(format!("exam_config_test_{nanos}_{pid}_{ordinal}.toml"));

	fs::write(&path, payload).expect("Failed to write test config.");

	path
}

#[test]
fn sample_toml_is_valid() {
	let payload = sample_toml_with(|_| {});
	let path = write_temp_config(payload);
	let result = exam_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	result.expect("Expected the sample config to load.");
}

#[test]
fn embedding_dimensions_must_match_vector_dim() {
	let payload = sample_toml_with(|root| {
		let retrieval = root
			.get_mut("retrieval")
			.and_then(Value::as_table_mut)
			.expect("Sample config must include [retrieval].");

		retrieval.insert("vector_dim".to_string(), Value::Integer(768));
	});
	let path = write_temp_config(payload);
	let result = exam_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let err = result.expect_err("Expected vector_dim validation error.");

	assert!(
		err.to_string().contains("providers.embedding.dimensions must match retrieval.vector_dim."),
		"Unexpected error: {err}"
	);
}

#[test]
fn similarity_threshold_must_be_in_range() {
	let mut cfg = base_config();

	cfg.retrieval.similarity_threshold = 1.5;

	let err = exam_config::validate(&cfg).expect_err("Expected threshold validation error.");

	assert!(
		err.to_string().contains("retrieval.similarity_threshold must be in the range 0.0-1.0."),
		"Unexpected error: {err}"
	);
}

#[test]
fn similarity_threshold_must_be_finite() {
	let mut cfg = base_config();

	cfg.retrieval.similarity_threshold = f32::NAN;

	let err = exam_config::validate(&cfg).expect_err("Expected threshold validation error.");

	assert!(
		err.to_string().contains("retrieval.similarity_threshold must be a finite number."),
		"Unexpected error: {err}"
	);
}

#[test]
fn min_local_results_cannot_exceed_top_k() {
	let mut cfg = base_config();

	cfg.retrieval.top_k = 3;
	cfg.retrieval.min_local_results = 4;

	let err = exam_config::validate(&cfg).expect_err("Expected coverage validation error.");

	assert!(
		err.to_string().contains("retrieval.min_local_results must not exceed retrieval.top_k."),
		"Unexpected error: {err}"
	);
}

#[test]
fn deadline_must_be_positive() {
	let mut cfg = base_config();

	cfg.processing.deadline_secs = 0;

	let err = exam_config::validate(&cfg).expect_err("Expected deadline validation error.");

	assert!(
		err.to_string().contains("processing.deadline_secs must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn concurrency_must_be_positive() {
	let mut cfg = base_config();

	cfg.processing.max_concurrent_questions = 0;

	let err = exam_config::validate(&cfg).expect_err("Expected concurrency validation error.");

	assert!(
		err.to_string().contains("processing.max_concurrent_questions must be greater than zero."),
		"Unexpected error: {err}"
	);
}

#[test]
fn provider_api_keys_must_be_non_empty() {
	let mut cfg = base_config();

	cfg.providers.generation.api_key = "   ".to_string();

	let err = exam_config::validate(&cfg).expect_err("Expected api_key validation error.");

	assert!(
		err.to_string().contains("Provider generation api_key must be non-empty."),
		"Unexpected error: {err}"
	);
}

#[test]
fn blank_websearch_engine_id_normalizes_to_none() {
	let payload = sample_toml_with(|root| {
		let websearch = root
			.get_mut("providers")
			.and_then(Value::as_table_mut)
			.and_then(|providers| providers.get_mut("websearch"))
			.and_then(Value::as_table_mut)
			.expect("Sample config must include [providers.websearch].");

		websearch.insert("engine_id".to_string(), Value::String("   ".to_string()));
	});
	let path = write_temp_config(payload);
	let result = exam_config::load(&path);

	fs::remove_file(&path).expect("Failed to remove test config.");

	let cfg = result.expect("Expected the config to load.");

	assert!(cfg.providers.websearch.engine_id.is_none());
}

#[test]
fn example_toml_is_valid() {
	let mut path = PathBuf::from(env!("CARGO_MANIFEST_DIR"));

	path.push("../../exam.example.toml");

	exam_config::load(&path).expect("Expected exam.example.toml to be a valid config.");
}
