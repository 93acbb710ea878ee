use regex::Regex;

use crate::question::{QuestionDraft, QuestionType};

/// One block of OCR output in document order. Bounds are a layout hint only;
/// segmentation trusts the block ordering the extractor produced.
#[derive(Debug, Clone)]
pub struct TextBlock {
	pub text: String,
	pub bounds: Option<Bounds>,
}
impl TextBlock {
	pub fn new(text: impl Into<String>) -> Self {
		Self { text: text.into(), bounds: None }
	}
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
	pub x: f32,
	pub y: f32,
	pub width: f32,
	pub height: f32,
}

#[derive(Debug, Clone)]
pub struct SegmenterConfig {
	pub essay_min_chars: u32,
}
impl Default for SegmenterConfig {
	fn default() -> Self {
		Self { essay_min_chars: 240 }
	}
}

struct RawQuestion {
	stem: String,
	options: Vec<String>,
}

/// Splits OCR text blocks into ordered question drafts.
///
/// Question numbers are assigned sequentially in document order regardless of
/// the numbers printed on the paper; a skipped or repeated printed number must
/// not break the `(test_id, question_number)` uniqueness downstream.
pub fn segment(blocks: &[TextBlock], cfg: &SegmenterConfig) -> Vec<QuestionDraft> {
	let Some(patterns) = Patterns::new() else {
		return Vec::new();
	};
	let joined = blocks.iter().map(|block| block.text.as_str()).collect::<Vec<_>>().join("\n");
	let text = preprocess(&patterns, &joined);
	let raw = split_questions(&patterns, &text);

	raw.into_iter()
		.enumerate()
		.map(|(index, question)| {
			let (question_type, options) = classify(&question.stem, question.options, cfg);

			QuestionDraft {
				question_number: index as i32 + 1,
				question_text: question.stem,
				question_type,
				options,
			}
		})
		.collect()
}

struct Patterns {
	horizontal_ws: Regex,
	number_marker: Regex,
	option_marker: Regex,
	boundary: Regex,
	option: Regex,
}
impl Patterns {
	fn new() -> Option<Self> {
		Some(Self {
			horizontal_ws: Regex::new(r"[ \t]+").ok()?,
			number_marker: Regex::new(r"(\d+)\.([A-Za-z])").ok()?,
			option_marker: Regex::new(r"([A-Ea-e])\)([A-Za-z])").ok()?,
			boundary: Regex::new(r"(?i)^(?:question\s+|q\s*)?(\d+)\s*[.):]\s*(.+)$").ok()?,
			option: Regex::new(r"^\(?([A-Ea-e])[.)]\s+(.+)$").ok()?,
		})
	}
}

/// Repairs common OCR artifacts before boundary detection. Only horizontal
/// whitespace is collapsed; line structure carries the boundary signal.
fn preprocess(patterns: &Patterns, text: &str) -> String {
	let mut lines = Vec::new();

	for line in text.lines() {
		let line = patterns.horizontal_ws.replace_all(line, " ");
		let line = patterns.number_marker.replace_all(&line, "$1. $2");
		let line = patterns.option_marker.replace_all(&line, "$1) $2");

		lines.push(line.trim().to_string());
	}

	lines.join("\n")
}

fn split_questions(patterns: &Patterns, text: &str) -> Vec<RawQuestion> {
	let boundary = &patterns.boundary;
	let option = &patterns.option;
	let mut questions: Vec<RawQuestion> = Vec::new();
	let mut current: Option<RawQuestion> = None;

	for line in text.lines() {
		if line.is_empty() {
			continue;
		}

		if let Some(caps) = boundary.captures(line) {
			if let Some(finished) = current.take() {
				questions.push(finished);
			}

			let stem = caps.get(2).map(|m| m.as_str().trim().to_string()).unwrap_or_default();

			current = Some(RawQuestion { stem, options: Vec::new() });

			continue;
		}

		let Some(question) = current.as_mut() else {
			// Preamble before the first numbered line: instructions, titles.
			continue;
		};

		if let Some(caps) = option.captures(line) {
			question.options.push(caps[2].trim().to_string());
		} else if question.options.is_empty() {
			// Continuation of a multi-line stem.
			if !question.stem.is_empty() {
				question.stem.push(' ');
			}

			question.stem.push_str(line);
		} else if let Some(last) = question.options.last_mut() {
			// Continuation of a wrapped option line.
			last.push(' ');
			last.push_str(line);
		}
	}

	if let Some(finished) = current.take() {
		questions.push(finished);
	}

	questions.retain(|question| !question.stem.trim().is_empty());

	questions
}

/// The classification decision table. Ambiguous evidence resolves to `Other`;
/// a wrong specific type changes answer-formatting expectations downstream.
fn classify(
	stem: &str,
	options: Vec<String>,
	cfg: &SegmenterConfig,
) -> (QuestionType, Vec<String>) {
	if options.len() >= 2 {
		if options.len() == 2 && is_true_false_pair(&options) {
			return (QuestionType::TrueFalse, options);
		}

		return (QuestionType::MultipleChoice, options);
	}
	if options.len() == 1 {
		// A single option line is too weak a signal for multiple choice.
		return (QuestionType::Other, Vec::new());
	}
	if has_blank_marker(stem) {
		return (QuestionType::FillBlank, Vec::new());
	}
	if has_true_false_cue(stem) {
		return (QuestionType::TrueFalse, vec!["True".to_string(), "False".to_string()]);
	}
	if stem.chars().count() as u32 >= cfg.essay_min_chars || has_essay_cue(stem) {
		return (QuestionType::Essay, Vec::new());
	}

	(QuestionType::ShortAnswer, Vec::new())
}

fn is_true_false_pair(options: &[String]) -> bool {
	let mut lowered: Vec<String> =
		options.iter().map(|option| option.trim().to_ascii_lowercase()).collect();

	lowered.sort();

	lowered == ["false", "true"] || lowered == ["f", "t"]
}

fn has_blank_marker(stem: &str) -> bool {
	Regex::new(r"_{3,}").map(|re| re.is_match(stem)).unwrap_or(false)
}

fn has_true_false_cue(stem: &str) -> bool {
	Regex::new(r"(?i)\btrue\s+or\s+false\b").map(|re| re.is_match(stem)).unwrap_or(false)
}

fn has_essay_cue(stem: &str) -> bool {
	Regex::new(r"(?i)\b(discuss|essay|(?:describe|explain)\s+in\s+detail)\b")
		.map(|re| re.is_match(stem))
		.unwrap_or(false)
}
