use std::{sync::Arc, time::Duration};

use color_eyre::{Result, eyre::eyre};
use tokio::time as tokio_time;
use tracing::{error, info};
use uuid::Uuid;

use exam_service::{ExamService, ProcessOutcome, process_test, processing_status};
use exam_storage::{
	db::Db,
	models::{JobStatus, ProcessingJob, TestStatus},
	queries,
};

const JOB_TYPE: &str = "test_processing";

pub struct WorkerState {
	pub db: Db,
	pub service: Arc<ExamService>,
	pub poll_interval: Duration,
}

pub async fn run_worker(state: WorkerState) -> Result<()> {
	info!("Worker started; polling for pending jobs.");

	loop {
		match claim_and_process(&state).await {
			// A processed job means more may be waiting; claim again at once.
			Ok(true) => {},
			Ok(false) => tokio_time::sleep(state.poll_interval).await,
			Err(err) => {
				error!(error = %err, "Job processing iteration failed.");
				tokio_time::sleep(state.poll_interval).await;
			},
		}
	}
}

async fn claim_and_process(state: &WorkerState) -> Result<bool> {
	let Some(job) = queries::claim_pending_job(&state.db.pool).await? else {
		return Ok(false);
	};

	info!(job_id = %job.job_id, test_id = %job.test_id, "Claimed job.");
	run_job(state, job).await?;

	Ok(true)
}

/// Drives one claimed job and finalizes it. A test that finishes `failed`
/// fails its job too, carrying the same reason.
async fn run_job(state: &WorkerState, job: ProcessingJob) -> Result<()> {
	match process_test(state.service.clone(), job.test_id).await {
		Ok(outcome) => {
			let (status, error_message) = job_completion(&outcome);

			queries::finish_job(&state.db.pool, job.job_id, status, error_message).await?;
			info!(
				job_id = %job.job_id,
				test_id = %job.test_id,
				status = outcome.status.as_str(),
				answered = outcome.answered,
				total = outcome.total_questions,
				processing_time = outcome.processing_time,
				"Job finished.",
			);
		},
		Err(err) => {
			error!(job_id = %job.job_id, test_id = %job.test_id, error = %err, "Job failed.");
			queries::finish_job(
				&state.db.pool,
				job.job_id,
				JobStatus::Failed,
				Some(&err.to_string()),
			)
			.await?;
		},
	}

	Ok(())
}

fn job_completion(outcome: &ProcessOutcome) -> (JobStatus, Option<&str>) {
	match outcome.status {
		TestStatus::Failed => (JobStatus::Failed, outcome.error_message.as_deref()),
		_ => (JobStatus::Completed, None),
	}
}

pub async fn submit(
	state: &WorkerState,
	owner: &str,
	file_url: &str,
	filename: &str,
) -> Result<()> {
	let record = queries::create_test(
		&state.db.pool,
		owner,
		file_url,
		filename,
		serde_json::Value::Null,
	)
	.await?;
	let job = queries::create_job(&state.db.pool, record.test_id, JOB_TYPE).await?;

	info!(test_id = %record.test_id, job_id = %job.job_id, "Test submitted.");
	println!("{}", record.test_id);

	Ok(())
}

/// Processes one test immediately, reusing its pending job when `submit`
/// already queued one so a later poll does not claim a stale duplicate.
pub async fn process_one(state: &WorkerState, test_id: Uuid) -> Result<()> {
	let job = match queries::claim_test_job(&state.db.pool, test_id).await? {
		Some(job) => job,
		None => {
			queries::create_job(&state.db.pool, test_id, JOB_TYPE).await?;
			queries::claim_test_job(&state.db.pool, test_id)
				.await?
				.ok_or_else(|| eyre!("job for test {test_id} was claimed by another worker"))?
		},
	};

	run_job(state, job).await
}

pub async fn print_status(state: &WorkerState, test_id: Uuid) -> Result<()> {
	let report = processing_status(&state.service, test_id).await?;

	println!("{}", serde_json::to_string_pretty(&report)?);

	Ok(())
}

pub async fn seed_knowledge(
	state: &WorkerState,
	title: &str,
	content: &str,
	source_url: Option<&str>,
	category: Option<&str>,
) -> Result<()> {
	let embed_cfg = &state.service.cfg.providers.embedding;
	let embedding = state.service.providers.embedding.embed_one(embed_cfg, content).await?;
	let entry_id = queries::insert_knowledge_entry(
		&state.db.pool,
		title,
		content,
		source_url,
		category,
		&embedding,
	)
	.await?;

	info!(entry_id = %entry_id, title, "Knowledge entry stored.");
	println!("{entry_id}");

	Ok(())
}
