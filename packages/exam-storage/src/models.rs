use serde_json::Value;
use time::OffsetDateTime;
use uuid::Uuid;

use exam_domain::QuestionType;

/// Terminal and in-flight states for a test. The schema keeps these as text;
/// the enum is the only place the labels are spelled out.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestStatus {
	Processing,
	Completed,
	Failed,
}
impl TestStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Processing => "processing",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}

	pub fn parse(label: &str) -> Option<Self> {
		match label {
			"processing" => Some(Self::Processing),
			"completed" => Some(Self::Completed),
			"failed" => Some(Self::Failed),
			_ => None,
		}
	}

	pub fn is_terminal(&self) -> bool {
		matches!(self, Self::Completed | Self::Failed)
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobStatus {
	Pending,
	Running,
	Completed,
	Failed,
}
impl JobStatus {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::Pending => "pending",
			Self::Running => "running",
			Self::Completed => "completed",
			Self::Failed => "failed",
		}
	}
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct TestRecord {
	pub test_id: Uuid,
	pub owner_id: String,
	pub file_url: String,
	pub original_filename: String,
	pub status: String,
	pub processing_time: Option<f64>,
	pub total_questions: i32,
	pub error_message: Option<String>,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct QuestionRecord {
	pub question_id: Uuid,
	pub test_id: Uuid,
	pub question_number: i32,
	pub question_text: String,
	pub question_type: String,
	pub options: Value,
	pub ai_answer: Option<String>,
	pub confidence: Option<f32>,
	pub explanation: Option<String>,
	pub processing_time: Option<f64>,
	pub created_at: OffsetDateTime,
	pub updated_at: OffsetDateTime,
}
impl QuestionRecord {
	pub fn question_type(&self) -> QuestionType {
		QuestionType::normalize_label(&self.question_type)
	}

	/// Decodes the JSONB options column into the ordered option list.
	pub fn options_vec(&self) -> Vec<String> {
		self.options
			.as_array()
			.map(|values| {
				values
					.iter()
					.filter_map(|value| value.as_str().map(str::to_string))
					.collect()
			})
			.unwrap_or_default()
	}
}

/// One similarity-search hit over the knowledge base.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct KnowledgeMatch {
	pub entry_id: Uuid,
	pub title: String,
	pub content: String,
	pub source_url: Option<String>,
	pub category: Option<String>,
	pub similarity: f32,
}

#[derive(Debug, Clone, sqlx::FromRow)]
pub struct ProcessingJob {
	pub job_id: Uuid,
	pub test_id: Uuid,
	pub job_type: String,
	pub status: String,
	pub started_at: Option<OffsetDateTime>,
	pub completed_at: Option<OffsetDateTime>,
	pub error_message: Option<String>,
	pub metadata: Value,
	pub created_at: OffsetDateTime,
}
