use uuid::Uuid;

use exam_config::Postgres;
use exam_domain::{QuestionDraft, QuestionType};
use exam_storage::{
	db::Db,
	models::TestStatus,
	queries::{self, RecordedAnswer},
};
use exam_testkit::TestDatabase;

const VECTOR_DIM: u32 = 8;

async fn bootstrap(test_db: &TestDatabase) -> Db {
	let cfg = Postgres { dsn: test_db.dsn().to_string(), pool_max_conns: 2 };
	let db = Db::connect(&cfg).await.expect("Failed to connect to Postgres.");

	db.ensure_schema(VECTOR_DIM).await.expect("Failed to ensure schema.");

	db
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set EXAM_PG_DSN to run."]
async fn db_connects_and_bootstraps() {
	let Some(base_dsn) = exam_testkit::env_dsn() else {
		eprintln!("Skipping db_connects_and_bootstraps; set EXAM_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;

	for table in ["tests", "questions", "knowledge_base", "processing_jobs"] {
		let count: i64 = sqlx::query_scalar(
			"SELECT count(*) FROM information_schema.tables WHERE table_name = $1",
		)
		.bind(table)
		.fetch_one(&db.pool)
		.await
		.expect("Failed to query schema tables.");

		assert_eq!(count, 1, "missing table {table}");
	}

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set EXAM_PG_DSN to run."]
async fn test_lifecycle_round_trips() {
	let Some(base_dsn) = exam_testkit::env_dsn() else {
		eprintln!("Skipping test_lifecycle_round_trips; set EXAM_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let record = queries::create_test(
		&db.pool,
		"owner_alpha",
		"https://files.example/exam.pdf",
		"exam.pdf",
		serde_json::json!({ "subject": "history" }),
	)
	.await
	.expect("Failed to create test.");

	assert_eq!(record.status, "processing");
	assert_eq!(record.total_questions, 0);

	let drafts = vec![
		QuestionDraft {
			question_number: 1,
			question_text: "What year did the war end?".to_string(),
			question_type: QuestionType::ShortAnswer,
			options: vec![],
		},
		QuestionDraft {
			question_number: 2,
			question_text: "The treaty was signed in Paris.".to_string(),
			question_type: QuestionType::TrueFalse,
			options: vec!["True".to_string(), "False".to_string()],
		},
	];
	let question_ids = queries::create_questions(&db.pool, record.test_id, &drafts)
		.await
		.expect("Failed to create questions.");

	assert_eq!(question_ids.len(), 2);

	let answer = RecordedAnswer {
		text: "1945".to_string(),
		confidence: 0.9,
		explanation: "Well attested.".to_string(),
		processing_time: 1.25,
	};

	queries::record_answer(&db.pool, question_ids[0], &answer)
		.await
		.expect("Failed to record answer.");
	queries::finalize_test(&db.pool, record.test_id, TestStatus::Completed, Some(12.5), None)
		.await
		.expect("Failed to finalize test.");

	let finalized = queries::fetch_test(&db.pool, record.test_id)
		.await
		.expect("Failed to fetch test.")
		.expect("Test should exist.");

	assert_eq!(finalized.status, "completed");
	assert_eq!(finalized.total_questions, 2);

	// Terminal statuses are immutable.
	let again =
		queries::finalize_test(&db.pool, record.test_id, TestStatus::Failed, None, Some("late"))
			.await;

	assert!(matches!(again, Err(exam_storage::Error::Conflict(_))));

	let questions = queries::test_questions(&db.pool, record.test_id)
		.await
		.expect("Failed to list questions.");

	assert_eq!(questions.len(), 2);
	assert_eq!(questions[0].question_number, 1);
	assert_eq!(questions[0].ai_answer.as_deref(), Some("1945"));
	assert_eq!(questions[1].question_type(), QuestionType::TrueFalse);
	assert_eq!(questions[1].options_vec(), vec!["True", "False"]);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set EXAM_PG_DSN to run."]
async fn job_claiming_skips_running_jobs() {
	let Some(base_dsn) = exam_testkit::env_dsn() else {
		eprintln!("Skipping job_claiming_skips_running_jobs; set EXAM_PG_DSN to run this test.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let record = queries::create_test(
		&db.pool,
		"owner_alpha",
		"https://files.example/exam.pdf",
		"exam.pdf",
		serde_json::Value::Null,
	)
	.await
	.expect("Failed to create test.");
	let first = queries::create_job(&db.pool, record.test_id, "test_processing")
		.await
		.expect("Failed to create job.");
	let second = queries::create_job(&db.pool, record.test_id, "test_processing")
		.await
		.expect("Failed to create job.");
	let claimed =
		queries::claim_pending_job(&db.pool).await.expect("Failed to claim job.").expect("job");

	assert_eq!(claimed.job_id, first.job_id);
	assert_eq!(claimed.status, "running");
	assert!(claimed.started_at.is_some());

	let next =
		queries::claim_pending_job(&db.pool).await.expect("Failed to claim job.").expect("job");

	assert_eq!(next.job_id, second.job_id);
	assert!(queries::claim_pending_job(&db.pool).await.expect("Failed to claim job.").is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set EXAM_PG_DSN to run."]
async fn claim_test_job_only_takes_that_tests_pending_job() {
	let Some(base_dsn) = exam_testkit::env_dsn() else {
		eprintln!("Skipping claim_test_job_only_takes_that_tests_pending_job; set EXAM_PG_DSN.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let first = queries::create_test(
		&db.pool,
		"owner_alpha",
		"https://files.example/exam.pdf",
		"exam.pdf",
		serde_json::Value::Null,
	)
	.await
	.expect("Failed to create test.");
	let second = queries::create_test(
		&db.pool,
		"owner_beta",
		"https://files.example/exam.pdf",
		"exam.pdf",
		serde_json::Value::Null,
	)
	.await
	.expect("Failed to create test.");

	queries::create_job(&db.pool, first.test_id, "test_processing")
		.await
		.expect("Failed to create job.");

	let queued = queries::create_job(&db.pool, second.test_id, "test_processing")
		.await
		.expect("Failed to create job.");
	let claimed = queries::claim_test_job(&db.pool, second.test_id)
		.await
		.expect("Failed to claim job.")
		.expect("job");

	// The older job belongs to another test and stays untouched.
	assert_eq!(claimed.job_id, queued.job_id);
	assert_eq!(claimed.status, "running");
	assert!(
		queries::claim_test_job(&db.pool, second.test_id)
			.await
			.expect("Failed to claim job.")
			.is_none()
	);

	let remaining =
		queries::claim_pending_job(&db.pool).await.expect("Failed to claim job.").expect("job");

	assert_eq!(remaining.test_id, first.test_id);

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}

#[tokio::test]
#[ignore = "Requires external Postgres. Set EXAM_PG_DSN to run."]
async fn knowledge_search_filters_and_orders() {
	let Some(base_dsn) = exam_testkit::env_dsn() else {
		eprintln!("Skipping knowledge_search_filters_and_orders; set EXAM_PG_DSN to run.");

		return;
	};
	let test_db = TestDatabase::new(&base_dsn).await.expect("Failed to create test database.");
	let db = bootstrap(&test_db).await;
	let unit = |axis: usize| {
		let mut v = vec![0.; VECTOR_DIM as usize];

		v[axis] = 1.;

		v
	};

	queries::insert_knowledge_entry(&db.pool, "aligned", "exact match", None, None, &unit(0))
		.await
		.expect("Failed to insert entry.");
	queries::insert_knowledge_entry(&db.pool, "orthogonal", "no overlap", None, None, &unit(1))
		.await
		.expect("Failed to insert entry.");

	let matches = queries::knowledge_search(&db.pool, &unit(0), 0.7, 5)
		.await
		.expect("Failed to search knowledge base.");

	assert_eq!(matches.len(), 1);
	assert_eq!(matches[0].title, "aligned");
	assert!(matches[0].similarity > 0.99);

	let missing_id = Uuid::new_v4();
	let missing = queries::fetch_test(&db.pool, missing_id).await.expect("Failed to fetch.");

	assert!(missing.is_none());

	test_db.cleanup().await.expect("Failed to cleanup test database.");
}
