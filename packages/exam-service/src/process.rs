use std::{
	sync::Arc,
	time::{Duration, Instant},
};

use time::OffsetDateTime;
use tokio::{sync::Semaphore, task::JoinSet, time as tokio_time};
use tracing::{info, warn};
use uuid::Uuid;

use exam_domain::{QuestionDraft, SegmenterConfig, segment};
use exam_storage::{
	models::{TestRecord, TestStatus},
	queries::RecordedAnswer,
};

use crate::{ExamService, ServiceError, ServiceResult, retrieve, synthesize};

#[derive(Debug, Clone)]
pub struct ProcessOutcome {
	pub test_id: Uuid,
	pub status: TestStatus,
	pub total_questions: u32,
	pub answered: u32,
	pub processing_time: f64,
	pub error_message: Option<String>,
}

/// Drives one test end to end: download, OCR, segmentation, then bounded
/// fan-out of retrieve-and-synthesize per question, all under one deadline
/// measured from test creation. Answers are persisted as they land, so a
/// deadline failure keeps everything answered so far.
pub async fn process_test(service: Arc<ExamService>, test_id: Uuid) -> ServiceResult<ProcessOutcome> {
	let record = service
		.store
		.fetch_test(test_id)
		.await?
		.ok_or_else(|| ServiceError::NotFound { message: format!("test {test_id}") })?;

	if TestStatus::parse(&record.status) != Some(TestStatus::Processing) {
		return Err(ServiceError::Conflict {
			message: format!("test {test_id} already {}", record.status),
		});
	}

	let deadline = record.created_at
		+ time::Duration::seconds(service.cfg.processing.deadline_secs as i64);
	let drafts = match extract_questions(&service, &record).await {
		Ok(drafts) => drafts,
		Err(reason) => return fail(&service, &record, 0, 0, &reason).await,
	};
	let total = drafts.len() as u32;
	let question_ids = service.store.create_questions(test_id, &drafts).await?;

	info!(test_id = %test_id, total_questions = total, "Questions persisted; starting fan-out.");

	let remaining = deadline - OffsetDateTime::now_utc();

	if remaining <= time::Duration::ZERO {
		let reason = format!("Deadline exceeded; answered 0 of {total} questions.");

		return fail(&service, &record, total, 0, &reason).await;
	}

	let semaphore = Arc::new(Semaphore::new(service.cfg.processing.max_concurrent_questions as usize));
	let mut join_set = JoinSet::new();

	for (draft, question_id) in drafts.into_iter().zip(question_ids) {
		let service = service.clone();
		let semaphore = semaphore.clone();

		join_set.spawn(async move {
			let Ok(_permit) = semaphore.acquire_owned().await else {
				return (draft.question_number, false);
			};

			answer_question(&service, question_id, &draft).await
		});
	}

	let budget = Duration::from_secs_f64(remaining.as_seconds_f64().max(0.));
	let fan_out = tokio_time::timeout(budget, drain(&mut join_set)).await;
	let elapsed = (OffsetDateTime::now_utc() - record.created_at).as_seconds_f64();

	match fan_out {
		Ok(answered) => {
			service
				.store
				.finalize_test(test_id, TestStatus::Completed, Some(elapsed), None)
				.await?;
			info!(test_id = %test_id, answered, processing_time = elapsed, "Test completed.");

			Ok(ProcessOutcome {
				test_id,
				status: TestStatus::Completed,
				total_questions: total,
				answered,
				processing_time: elapsed,
				error_message: None,
			})
		},
		Err(_) => {
			// Dropping the set aborts in-flight tasks at their next await
			// point; answers already recorded stay in the store.
			join_set.abort_all();
			drop(join_set);

			let answered = answered_count(&service, test_id).await;
			let reason = format!("Deadline exceeded; answered {answered} of {total} questions.");

			fail(&service, &record, total, answered, &reason).await
		},
	}
}

async fn extract_questions(
	service: &ExamService,
	record: &TestRecord,
) -> Result<Vec<QuestionDraft>, String> {
	let ocr_cfg = &service.cfg.providers.ocr;
	let document = service
		.providers
		.document
		.download(&record.file_url, ocr_cfg.timeout_ms)
		.await
		.map_err(|err| format!("Document download failed: {err}."))?;
	let extracted = tokio_time::timeout(
		Duration::from_millis(ocr_cfg.timeout_ms),
		service.providers.ocr.extract(ocr_cfg, &document, &record.original_filename),
	)
	.await;
	let blocks = match extracted {
		Ok(Ok(blocks)) => blocks,
		Ok(Err(err)) => return Err(format!("OCR extraction failed: {err}.")),
		Err(_) => return Err("OCR extraction timed out.".to_string()),
	};
	let segmenter_cfg = SegmenterConfig { essay_min_chars: service.cfg.processing.essay_min_chars };
	let drafts = segment(&blocks, &segmenter_cfg);

	if drafts.is_empty() {
		return Err("No questions detected in the document.".to_string());
	}

	Ok(drafts)
}

async fn answer_question(
	service: &ExamService,
	question_id: Uuid,
	draft: &QuestionDraft,
) -> (i32, bool) {
	let started = Instant::now();
	let context = retrieve::retrieve(service, &draft.question_text).await;
	let answer = synthesize::synthesize(service, draft, &context).await;
	let recorded = RecordedAnswer {
		text: answer.text,
		confidence: answer.confidence,
		explanation: answer.explanation,
		processing_time: started.elapsed().as_secs_f64(),
	};

	match service.store.record_answer(question_id, &recorded).await {
		Ok(()) => (draft.question_number, true),
		Err(err) => {
			warn!(question_id = %question_id, error = %err, "Failed to record answer.");

			(draft.question_number, false)
		},
	}
}

async fn drain(join_set: &mut JoinSet<(i32, bool)>) -> u32 {
	let mut answered = 0;

	while let Some(joined) = join_set.join_next().await {
		match joined {
			Ok((_, true)) => answered += 1,
			Ok((question_number, false)) => {
				warn!(question_number, "Question finished without a recorded answer.");
			},
			Err(err) => {
				warn!(error = %err, "Question task failed to join.");
			},
		}
	}

	answered
}

async fn answered_count(service: &ExamService, test_id: Uuid) -> u32 {
	match service.store.test_questions(test_id).await {
		Ok(questions) =>
			questions.iter().filter(|question| question.ai_answer.is_some()).count() as u32,
		Err(err) => {
			warn!(test_id = %test_id, error = %err, "Failed to count recorded answers.");

			0
		},
	}
}

async fn fail(
	service: &ExamService,
	record: &TestRecord,
	total: u32,
	answered: u32,
	reason: &str,
) -> ServiceResult<ProcessOutcome> {
	let elapsed = (OffsetDateTime::now_utc() - record.created_at).as_seconds_f64();

	service
		.store
		.finalize_test(record.test_id, TestStatus::Failed, Some(elapsed), Some(reason))
		.await?;
	warn!(test_id = %record.test_id, reason, "Test failed.");

	Ok(ProcessOutcome {
		test_id: record.test_id,
		status: TestStatus::Failed,
		total_questions: total,
		answered,
		processing_time: elapsed,
		error_message: Some(reason.to_string()),
	})
}
