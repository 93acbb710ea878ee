use serde::Serialize;
use uuid::Uuid;

use exam_storage::models::TestStatus;

use crate::{ExamService, ServiceError, ServiceResult};

/// Progress snapshot for a test, cheap enough to poll.
#[derive(Debug, Clone, Serialize)]
pub struct StatusReport {
	pub test_id: Uuid,
	pub status: String,
	pub total_questions: u32,
	pub answered: u32,
	pub remaining: u32,
	pub progress: f32,
	pub error_message: Option<String>,
}

pub async fn processing_status(service: &ExamService, test_id: Uuid) -> ServiceResult<StatusReport> {
	let record = service
		.store
		.fetch_test(test_id)
		.await?
		.ok_or_else(|| ServiceError::NotFound { message: format!("test {test_id}") })?;
	let questions = service.store.test_questions(test_id).await?;
	let answered =
		questions.iter().filter(|question| question.ai_answer.is_some()).count() as u32;
	let total = record.total_questions.max(0) as u32;
	let progress = if TestStatus::parse(&record.status) == Some(TestStatus::Completed) {
		100.
	} else if total == 0 {
		0.
	} else {
		(answered as f32 / total as f32 * 100.).clamp(0., 100.)
	};

	Ok(StatusReport {
		test_id,
		status: record.status,
		total_questions: total,
		answered,
		remaining: total.saturating_sub(answered),
		progress,
		error_message: record.error_message,
	})
}
