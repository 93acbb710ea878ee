use std::{collections::HashMap, sync::Mutex};

use time::OffsetDateTime;
use uuid::Uuid;

use exam_domain::QuestionDraft;
use exam_service::{BoxFuture, ResultStore, ServiceError, ServiceResult};
use exam_storage::{
	models::{KnowledgeMatch, QuestionRecord, TestRecord, TestStatus},
	queries::RecordedAnswer,
};

/// In-memory `ResultStore` so the whole pipeline runs without Postgres.
/// Semantics mirror the SQL store: terminal statuses are immutable, questions
/// come back ordered, knowledge hits are filtered by the threshold.
#[derive(Default)]
pub struct MemoryStore {
	inner: Mutex<Inner>,
}

#[derive(Default)]
struct Inner {
	tests: HashMap<Uuid, TestRecord>,
	questions: Vec<QuestionRecord>,
	knowledge: Vec<KnowledgeMatch>,
}

impl MemoryStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn insert_test(&self, owner_id: &str, file_url: &str, original_filename: &str) -> Uuid {
		self.insert_test_created_at(
			owner_id,
			file_url,
			original_filename,
			OffsetDateTime::now_utc(),
		)
	}

	/// Backdating `created_at` lets tests start near or past the deadline.
	pub fn insert_test_created_at(
		&self,
		owner_id: &str,
		file_url: &str,
		original_filename: &str,
		created_at: OffsetDateTime,
	) -> Uuid {
		let test_id = Uuid::new_v4();
		let record = TestRecord {
			test_id,
			owner_id: owner_id.to_string(),
			file_url: file_url.to_string(),
			original_filename: original_filename.to_string(),
			status: "processing".to_string(),
			processing_time: None,
			total_questions: 0,
			error_message: None,
			metadata: serde_json::Value::Null,
			created_at,
			updated_at: created_at,
		};
		let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		inner.tests.insert(test_id, record);

		test_id
	}

	pub fn set_knowledge(&self, hits: Vec<KnowledgeMatch>) {
		let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		inner.knowledge = hits;
	}

	pub fn test(&self, test_id: Uuid) -> Option<TestRecord> {
		let inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());

		inner.tests.get(&test_id).cloned()
	}

	pub fn questions(&self, test_id: Uuid) -> Vec<QuestionRecord> {
		let inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
		let mut questions = inner
			.questions
			.iter()
			.filter(|question| question.test_id == test_id)
			.cloned()
			.collect::<Vec<_>>();

		questions.sort_by_key(|question| question.question_number);

		questions
	}
}

impl ResultStore for MemoryStore {
	fn fetch_test<'a>(
		&'a self,
		test_id: Uuid,
	) -> BoxFuture<'a, ServiceResult<Option<TestRecord>>> {
		Box::pin(async move { Ok(self.test(test_id)) })
	}

	fn create_questions<'a>(
		&'a self,
		test_id: Uuid,
		drafts: &'a [QuestionDraft],
	) -> BoxFuture<'a, ServiceResult<Vec<Uuid>>> {
		Box::pin(async move {
			let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
			let now = OffsetDateTime::now_utc();
			let Some(test) = inner.tests.get_mut(&test_id) else {
				return Err(ServiceError::NotFound { message: format!("test {test_id}") });
			};

			test.total_questions = drafts.len() as i32;
			test.updated_at = now;

			let mut question_ids = Vec::with_capacity(drafts.len());

			for draft in drafts {
				let question_id = Uuid::new_v4();

				inner.questions.push(QuestionRecord {
					question_id,
					test_id,
					question_number: draft.question_number,
					question_text: draft.question_text.clone(),
					question_type: draft.question_type.as_str().to_string(),
					options: serde_json::Value::from(draft.options.clone()),
					ai_answer: None,
					confidence: None,
					explanation: None,
					processing_time: None,
					created_at: now,
					updated_at: now,
				});
				question_ids.push(question_id);
			}

			Ok(question_ids)
		})
	}

	fn record_answer<'a>(
		&'a self,
		question_id: Uuid,
		answer: &'a RecordedAnswer,
	) -> BoxFuture<'a, ServiceResult<()>> {
		Box::pin(async move {
			let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
			let Some(question) =
				inner.questions.iter_mut().find(|question| question.question_id == question_id)
			else {
				return Err(ServiceError::NotFound { message: format!("question {question_id}") });
			};

			question.ai_answer = Some(answer.text.clone());
			question.confidence = Some(answer.confidence);
			question.explanation = Some(answer.explanation.clone());
			question.processing_time = Some(answer.processing_time);
			question.updated_at = OffsetDateTime::now_utc();

			Ok(())
		})
	}

	fn finalize_test<'a>(
		&'a self,
		test_id: Uuid,
		status: TestStatus,
		processing_time: Option<f64>,
		error_message: Option<&'a str>,
	) -> BoxFuture<'a, ServiceResult<()>> {
		Box::pin(async move {
			let mut inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
			let Some(test) = inner.tests.get_mut(&test_id) else {
				return Err(ServiceError::NotFound { message: format!("test {test_id}") });
			};

			if test.status != "processing" {
				return Err(ServiceError::Conflict {
					message: format!("test {test_id} already {}", test.status),
				});
			}

			test.status = status.as_str().to_string();
			test.processing_time = processing_time;
			test.error_message = error_message.map(str::to_string);
			test.updated_at = OffsetDateTime::now_utc();

			Ok(())
		})
	}

	fn test_questions<'a>(
		&'a self,
		test_id: Uuid,
	) -> BoxFuture<'a, ServiceResult<Vec<QuestionRecord>>> {
		Box::pin(async move { Ok(self.questions(test_id)) })
	}

	fn knowledge_search<'a>(
		&'a self,
		_embedding: &'a [f32],
		threshold: f32,
		top_k: u32,
	) -> BoxFuture<'a, ServiceResult<Vec<KnowledgeMatch>>> {
		Box::pin(async move {
			let inner = self.inner.lock().unwrap_or_else(|err| err.into_inner());
			let mut hits = inner
				.knowledge
				.iter()
				.filter(|hit| hit.similarity > threshold)
				.cloned()
				.collect::<Vec<_>>();

			hits.sort_by(|a, b| {
				b.similarity
					.partial_cmp(&a.similarity)
					.unwrap_or(std::cmp::Ordering::Equal)
					.then_with(|| a.entry_id.cmp(&b.entry_id))
			});
			hits.truncate(top_k as usize);

			Ok(hits)
		})
	}
}
