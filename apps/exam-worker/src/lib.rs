pub mod worker;

use std::{sync::Arc, time::Duration};

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use exam_service::ExamService;
use exam_storage::db::Db;

#[derive(Debug, Parser)]
#[command(
	version = exam_cli::VERSION,
	rename_all = "kebab",
	styles = exam_cli::styles(),
)]
pub struct Args {
	#[arg(long, short = 'c', value_name = "FILE")]
	pub config: std::path::PathBuf,
	#[command(subcommand)]
	pub command: Option<Command>,
}

/// Without a subcommand the worker polls `processing_jobs` until stopped.
#[derive(Debug, Subcommand)]
pub enum Command {
	/// Register a document and enqueue a processing job for it.
	Submit {
		#[arg(long)]
		owner: String,
		#[arg(long)]
		file_url: String,
		#[arg(long)]
		filename: String,
	},
	/// Process a single test immediately and exit.
	Process {
		#[arg(long)]
		test_id: Uuid,
	},
	/// Print the progress of a test as JSON.
	Status {
		#[arg(long)]
		test_id: Uuid,
	},
	/// Embed a passage and store it in the knowledge base.
	Seed {
		#[arg(long)]
		title: String,
		#[arg(long)]
		content: String,
		#[arg(long)]
		source_url: Option<String>,
		#[arg(long)]
		category: Option<String>,
	},
}

pub async fn run(args: Args) -> color_eyre::Result<()> {
	let config = exam_config::load(&args.config)?;
	let filter = EnvFilter::new(config.service.log_level.clone());

	tracing_subscriber::fmt().with_env_filter(filter).init();

	let db = Db::connect(&config.storage.postgres).await?;

	db.ensure_schema(config.retrieval.vector_dim).await?;

	let poll_interval = Duration::from_millis(config.processing.poll_interval_ms);
	let service = Arc::new(ExamService::new(config, &db));
	let state = worker::WorkerState { db, service, poll_interval };

	match args.command {
		None => worker::run_worker(state).await,
		Some(Command::Submit { owner, file_url, filename }) =>
			worker::submit(&state, &owner, &file_url, &filename).await,
		Some(Command::Process { test_id }) => worker::process_one(&state, test_id).await,
		Some(Command::Status { test_id }) => worker::print_status(&state, test_id).await,
		Some(Command::Seed { title, content, source_url, category }) =>
			worker::seed_knowledge(&state, &title, &content, source_url.as_deref(), category.as_deref())
				.await,
	}
}
