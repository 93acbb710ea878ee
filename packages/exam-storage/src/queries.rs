use serde_json::Value;
use sqlx::PgPool;
use uuid::Uuid;

use exam_domain::QuestionDraft;

use crate::{
	Error, Result,
	models::{JobStatus, KnowledgeMatch, ProcessingJob, QuestionRecord, TestRecord, TestStatus},
};

const TEST_COLUMNS: &str = "test_id, owner_id, file_url, original_filename, status, \
	 processing_time, total_questions, error_message, metadata, created_at, updated_at";
const QUESTION_COLUMNS: &str = "question_id, test_id, question_number, question_text, \
	 question_type, options, ai_answer, confidence, explanation, processing_time, created_at, \
	 updated_at";
const JOB_COLUMNS: &str =
	"job_id, test_id, job_type, status, started_at, completed_at, error_message, metadata, \
	 created_at";

/// Fields written back onto a question once synthesis finishes.
#[derive(Debug, Clone)]
pub struct RecordedAnswer {
	pub text: String,
	pub confidence: f32,
	pub explanation: String,
	pub processing_time: f64,
}

pub async fn create_test(
	pool: &PgPool,
	owner_id: &str,
	file_url: &str,
	original_filename: &str,
	metadata: Value,
) -> Result<TestRecord> {
	let sql = format!(
		"INSERT INTO tests (test_id, owner_id, file_url, original_filename, metadata) VALUES \
		 ($1, $2, $3, $4, $5) RETURNING {TEST_COLUMNS}"
	);
	let record = sqlx::query_as::<_, TestRecord>(&sql)
		.bind(Uuid::new_v4())
		.bind(owner_id)
		.bind(file_url)
		.bind(original_filename)
		.bind(metadata)
		.fetch_one(pool)
		.await?;

	Ok(record)
}

pub async fn fetch_test(pool: &PgPool, test_id: Uuid) -> Result<Option<TestRecord>> {
	let sql = format!("SELECT {TEST_COLUMNS} FROM tests WHERE test_id = $1");
	let record =
		sqlx::query_as::<_, TestRecord>(&sql).bind(test_id).fetch_optional(pool).await?;

	Ok(record)
}

/// Persists segmented drafts in one transaction and stamps `total_questions`,
/// so a partially written question list is never observable.
pub async fn create_questions(
	pool: &PgPool,
	test_id: Uuid,
	drafts: &[QuestionDraft],
) -> Result<Vec<Uuid>> {
	let mut tx = pool.begin().await?;
	let mut question_ids = Vec::with_capacity(drafts.len());
	let sql = "INSERT INTO questions (question_id, test_id, question_number, question_text, \
	           question_type, options) VALUES ($1, $2, $3, $4, $5, $6) RETURNING question_id";

	for draft in drafts {
		let options = Value::from(draft.options.clone());
		let (question_id,) = sqlx::query_as::<_, (Uuid,)>(sql)
			.bind(Uuid::new_v4())
			.bind(test_id)
			.bind(draft.question_number)
			.bind(&draft.question_text)
			.bind(draft.question_type.as_str())
			.bind(options)
			.fetch_one(&mut *tx)
			.await?;

		question_ids.push(question_id);
	}

	let updated =
		sqlx::query("UPDATE tests SET total_questions = $2, updated_at = now() WHERE test_id = $1")
			.bind(test_id)
			.bind(drafts.len() as i32)
			.execute(&mut *tx)
			.await?;

	if updated.rows_affected() == 0 {
		return Err(Error::NotFound(format!("test {test_id}")));
	}

	tx.commit().await?;

	Ok(question_ids)
}

pub async fn record_answer(
	pool: &PgPool,
	question_id: Uuid,
	answer: &RecordedAnswer,
) -> Result<()> {
	let updated = sqlx::query(
		"UPDATE questions SET ai_answer = $2, confidence = $3, explanation = $4, processing_time \
		 = $5, updated_at = now() WHERE question_id = $1",
	)
	.bind(question_id)
	.bind(&answer.text)
	.bind(answer.confidence)
	.bind(&answer.explanation)
	.bind(answer.processing_time)
	.execute(pool)
	.await?;

	if updated.rows_affected() == 0 {
		return Err(Error::NotFound(format!("question {question_id}")));
	}

	Ok(())
}

/// Moves a test from `processing` to a terminal status.
///
/// Terminal statuses are immutable; finalizing an already finalized test is a
/// conflict rather than a silent overwrite.
pub async fn finalize_test(
	pool: &PgPool,
	test_id: Uuid,
	status: TestStatus,
	processing_time: Option<f64>,
	error_message: Option<&str>,
) -> Result<()> {
	if !status.is_terminal() {
		return Err(Error::InvalidArgument(format!(
			"finalize requires a terminal status, got {}",
			status.as_str()
		)));
	}

	let updated = sqlx::query(
		"UPDATE tests SET status = $2, processing_time = $3, error_message = $4, updated_at = \
		 now() WHERE test_id = $1 AND status = 'processing'",
	)
	.bind(test_id)
	.bind(status.as_str())
	.bind(processing_time)
	.bind(error_message)
	.execute(pool)
	.await?;

	if updated.rows_affected() == 0 {
		return match fetch_test(pool, test_id).await? {
			Some(record) =>
				Err(Error::Conflict(format!("test {test_id} already {}", record.status))),
			None => Err(Error::NotFound(format!("test {test_id}"))),
		};
	}

	Ok(())
}

pub async fn test_questions(pool: &PgPool, test_id: Uuid) -> Result<Vec<QuestionRecord>> {
	let sql = format!(
		"SELECT {QUESTION_COLUMNS} FROM questions WHERE test_id = $1 ORDER BY question_number ASC"
	);
	let records =
		sqlx::query_as::<_, QuestionRecord>(&sql).bind(test_id).fetch_all(pool).await?;

	Ok(records)
}

pub async fn create_job(pool: &PgPool, test_id: Uuid, job_type: &str) -> Result<ProcessingJob> {
	let sql = format!(
		"INSERT INTO processing_jobs (job_id, test_id, job_type) VALUES ($1, $2, $3) RETURNING \
		 {JOB_COLUMNS}"
	);
	let job = sqlx::query_as::<_, ProcessingJob>(&sql)
		.bind(Uuid::new_v4())
		.bind(test_id)
		.bind(job_type)
		.fetch_one(pool)
		.await?;

	Ok(job)
}

/// Claims the oldest pending job, marking it running.
///
/// `FOR UPDATE SKIP LOCKED` keeps concurrent workers from claiming the same
/// row; returns `None` when the queue is empty.
pub async fn claim_pending_job(pool: &PgPool) -> Result<Option<ProcessingJob>> {
	let mut tx = pool.begin().await?;
	let claimed = sqlx::query_as::<_, (Uuid,)>(
		"SELECT job_id FROM processing_jobs WHERE status = 'pending' ORDER BY created_at ASC \
		 LIMIT 1 FOR UPDATE SKIP LOCKED",
	)
	.fetch_optional(&mut *tx)
	.await?;
	let Some((job_id,)) = claimed else {
		return Ok(None);
	};
	let sql = format!(
		"UPDATE processing_jobs SET status = 'running', started_at = now() WHERE job_id = $1 \
		 RETURNING {JOB_COLUMNS}"
	);
	let job =
		sqlx::query_as::<_, ProcessingJob>(&sql).bind(job_id).fetch_one(&mut *tx).await?;

	tx.commit().await?;

	Ok(Some(job))
}

/// Claims the oldest pending job for one specific test, marking it running.
pub async fn claim_test_job(pool: &PgPool, test_id: Uuid) -> Result<Option<ProcessingJob>> {
	let mut tx = pool.begin().await?;
	let claimed = sqlx::query_as::<_, (Uuid,)>(
		"SELECT job_id FROM processing_jobs WHERE test_id = $1 AND status = 'pending' ORDER BY \
		 created_at ASC LIMIT 1 FOR UPDATE SKIP LOCKED",
	)
	.bind(test_id)
	.fetch_optional(&mut *tx)
	.await?;
	let Some((job_id,)) = claimed else {
		return Ok(None);
	};
	let sql = format!(
		"UPDATE processing_jobs SET status = 'running', started_at = now() WHERE job_id = $1 \
		 RETURNING {JOB_COLUMNS}"
	);
	let job =
		sqlx::query_as::<_, ProcessingJob>(&sql).bind(job_id).fetch_one(&mut *tx).await?;

	tx.commit().await?;

	Ok(Some(job))
}

pub async fn finish_job(
	pool: &PgPool,
	job_id: Uuid,
	status: JobStatus,
	error_message: Option<&str>,
) -> Result<()> {
	let updated = sqlx::query(
		"UPDATE processing_jobs SET status = $2, completed_at = now(), error_message = $3 WHERE \
		 job_id = $1",
	)
	.bind(job_id)
	.bind(status.as_str())
	.bind(error_message)
	.execute(pool)
	.await?;

	if updated.rows_affected() == 0 {
		return Err(Error::NotFound(format!("job {job_id}")));
	}

	Ok(())
}

/// Cosine similarity search over the knowledge base.
///
/// Only hits strictly above `threshold` are returned, nearest first; ties on
/// distance break deterministically by entry id.
pub async fn knowledge_search(
	pool: &PgPool,
	query_embedding: &[f32],
	threshold: f32,
	top_k: u32,
) -> Result<Vec<KnowledgeMatch>> {
	if query_embedding.is_empty() {
		return Err(Error::InvalidArgument("empty query embedding".into()));
	}

	let embedding = vector_literal(query_embedding);
	let matches = sqlx::query_as::<_, KnowledgeMatch>(
		"SELECT entry_id, title, content, source_url, category, (1 - (embedding <=> \
		 $1::text::vector))::real AS similarity FROM knowledge_base WHERE 1 - (embedding <=> \
		 $1::text::vector) > $2 ORDER BY embedding <=> $1::text::vector ASC, entry_id ASC LIMIT \
		 $3",
	)
	.bind(&embedding)
	.bind(threshold as f64)
	.bind(top_k as i64)
	.fetch_all(pool)
	.await?;

	Ok(matches)
}

pub async fn insert_knowledge_entry(
	pool: &PgPool,
	title: &str,
	content: &str,
	source_url: Option<&str>,
	category: Option<&str>,
	embedding: &[f32],
) -> Result<Uuid> {
	if embedding.is_empty() {
		return Err(Error::InvalidArgument("empty embedding".into()));
	}

	let literal = vector_literal(embedding);
	let (entry_id,) = sqlx::query_as::<_, (Uuid,)>(
		"INSERT INTO knowledge_base (entry_id, title, content, source_url, category, embedding) \
		 VALUES ($1, $2, $3, $4, $5, $6::text::vector) RETURNING entry_id",
	)
	.bind(Uuid::new_v4())
	.bind(title)
	.bind(content)
	.bind(source_url)
	.bind(category)
	.bind(&literal)
	.fetch_one(pool)
	.await?;

	Ok(entry_id)
}

/// Renders a float slice as a pgvector literal, e.g. `[0.1,0.2,0.3]`.
pub fn vector_literal(values: &[f32]) -> String {
	let mut literal = String::with_capacity(2 + values.len() * 8);

	literal.push('[');

	for (i, value) in values.iter().enumerate() {
		if i > 0 {
			literal.push(',');
		}

		literal.push_str(&value.to_string());
	}

	literal.push(']');

	literal
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn vector_literal_formats_pgvector_input() {
		assert_eq!(vector_literal(&[0.25, -1., 3.5]), "[0.25,-1,3.5]");
		assert_eq!(vector_literal(&[]), "[]");
	}
}
