use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QuestionType {
	MultipleChoice,
	ShortAnswer,
	Essay,
	TrueFalse,
	FillBlank,
	Other,
}
impl QuestionType {
	pub fn as_str(&self) -> &'static str {
		match self {
			Self::MultipleChoice => "multiple_choice",
			Self::ShortAnswer => "short_answer",
			Self::Essay => "essay",
			Self::TrueFalse => "true_false",
			Self::FillBlank => "fill_blank",
			Self::Other => "other",
		}
	}

	/// Maps loose labels seen in OCR output and upstream tooling onto the
	/// closed variant set. Unknown labels land on `Other`, never on a guess.
	pub fn normalize_label(label: &str) -> Self {
		let normalized = label.trim().to_ascii_lowercase().replace([' ', '-'], "_");

		match normalized.as_str() {
			"multiple_choice" | "multichoice" | "mc" => Self::MultipleChoice,
			"short_answer" | "short" => Self::ShortAnswer,
			"essay" | "long_answer" => Self::Essay,
			"true_false" | "boolean" | "tf" => Self::TrueFalse,
			"fill_blank" | "fill_in" | "fill_in_the_blank" | "blank" => Self::FillBlank,
			_ => Self::Other,
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QuestionDraft {
	pub question_number: i32,
	pub question_text: String,
	pub question_type: QuestionType,
	pub options: Vec<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn normalizes_known_labels() {
		assert_eq!(QuestionType::normalize_label("MC"), QuestionType::MultipleChoice);
		assert_eq!(QuestionType::normalize_label("fill-in-the-blank"), QuestionType::FillBlank);
		assert_eq!(QuestionType::normalize_label("Boolean"), QuestionType::TrueFalse);
	}

	#[test]
	fn unknown_labels_fall_back_to_other() {
		assert_eq!(QuestionType::normalize_label("matching"), QuestionType::Other);
		assert_eq!(QuestionType::normalize_label(""), QuestionType::Other);
	}

	#[test]
	fn serializes_as_snake_case() {
		let json = serde_json::to_string(&QuestionType::MultipleChoice).expect("serialize failed");
		assert_eq!(json, "\"multiple_choice\"");
	}
}
