use std::time::Duration;

use serde_json::{Value, json};
use tokio::time;
use tracing::warn;

use exam_domain::{Answer, QuestionDraft, QuestionType, blend_confidence, match_option};

use crate::{
	ExamService,
	retrieve::{ContextPassage, RetrievedContext},
};

struct ParsedGeneration {
	text: String,
	confidence: Option<f32>,
	explanation: String,
}

/// Produces the final answer for one question.
///
/// Generation failures and timeouts never escape: they become the
/// zero-confidence sentinel so the rest of the test keeps going.
pub(crate) async fn synthesize(
	service: &ExamService,
	draft: &QuestionDraft,
	context: &RetrievedContext,
) -> Answer {
	let gen_cfg = &service.cfg.providers.generation;
	let messages = build_messages(draft, context);
	let generated = time::timeout(
		Duration::from_millis(gen_cfg.timeout_ms),
		service.providers.generation.generate(gen_cfg, &messages),
	)
	.await;
	let generation = match generated {
		Ok(Ok(generation)) => generation,
		Ok(Err(err)) => {
			warn!(question_number = draft.question_number, error = %err, "Generation failed.");

			return Answer::failure(format!("Generation failed: {err}."));
		},
		Err(_) => {
			warn!(question_number = draft.question_number, "Generation timed out.");

			return Answer::failure("Generation timed out.");
		},
	};
	let parsed = parse_generation(&generation.text);
	let mut confidence =
		blend_confidence(parsed.confidence.or(generation.confidence), context.strength);
	let mut text = parsed.text;

	// Option-constrained types must answer with one of the offered options;
	// a fuzzy match lowers confidence in proportion to the mismatch.
	if matches!(draft.question_type, QuestionType::MultipleChoice | QuestionType::TrueFalse)
		&& let Some(matched) = match_option(&text, &draft.options)
	{
		confidence = (confidence * matched.similarity()).clamp(0.0, 1.0);
		text = draft.options[matched.index()].clone();
	}

	Answer { text, confidence, explanation: parsed.explanation }
}

fn build_messages(draft: &QuestionDraft, context: &RetrievedContext) -> Vec<Value> {
	let mut user = String::new();

	if !context.passages.is_empty() {
		user.push_str("Context:\n");

		for passage in &context.passages {
			match passage {
				ContextPassage::Knowledge { title, content, .. } => {
					user.push_str(&format!("- [{title}] {content}\n"));
				},
				ContextPassage::Web { title, url, snippet } => {
					user.push_str(&format!("- [{title}]({url}) {snippet}\n"));
				},
			}
		}

		user.push('\n');
	}

	user.push_str(&format!("Question: {}\n", draft.question_text));

	if !draft.options.is_empty() {
		user.push_str("Options:\n");

		for (index, option) in draft.options.iter().enumerate() {
			let letter = (b'A' + (index % 26) as u8) as char;

			user.push_str(&format!("{letter}) {option}\n"));
		}
	}

	user.push_str(type_instruction(draft.question_type));

	vec![
		json!({
			"role": "system",
			"content": "You are an expert exam solver. Use the provided context when it is \
			 relevant. Respond with a single JSON object: {\"answer\": string, \"confidence\": \
			 number between 0 and 1, \"explanation\": string}.",
		}),
		json!({ "role": "user", "content": user }),
	]
}

fn type_instruction(question_type: QuestionType) -> &'static str {
	match question_type {
		QuestionType::MultipleChoice =>
			"Choose exactly one of the offered options and return its full text as the answer.",
		QuestionType::TrueFalse => "Answer with \"True\" or \"False\".",
		QuestionType::FillBlank => "Provide the word or phrase that completes the blank.",
		QuestionType::ShortAnswer => "Answer in one or two sentences.",
		QuestionType::Essay => "Write a structured answer of several short paragraphs.",
		QuestionType::Other => "Answer as precisely as the question allows.",
	}
}

/// Accepts the model's JSON object, with or without a markdown code fence.
/// Anything unparseable is treated as a bare answer with no calibration.
fn parse_generation(text: &str) -> ParsedGeneration {
	let stripped = strip_code_fence(text.trim());

	if let Ok(Value::Object(object)) = serde_json::from_str::<Value>(stripped)
		&& let Some(answer) = object.get("answer").and_then(|v| v.as_str())
	{
		let confidence = object.get("confidence").and_then(|v| v.as_f64()).map(|v| v as f32);
		let explanation = object
			.get("explanation")
			.and_then(|v| v.as_str())
			.unwrap_or_default()
			.to_string();

		return ParsedGeneration { text: answer.trim().to_string(), confidence, explanation };
	}

	ParsedGeneration { text: stripped.trim().to_string(), confidence: None, explanation: String::new() }
}

fn strip_code_fence(text: &str) -> &str {
	let Some(rest) = text.strip_prefix("```") else {
		return text;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);
	let rest = rest.strip_suffix("```").unwrap_or(rest);

	rest.trim()
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn parses_plain_json_object() {
		let parsed =
			parse_generation(r#"{"answer": "Paris", "confidence": 0.9, "explanation": "Capital."}"#);

		assert_eq!(parsed.text, "Paris");
		assert_eq!(parsed.confidence, Some(0.9));
		assert_eq!(parsed.explanation, "Capital.");
	}

	#[test]
	fn parses_fenced_json_object() {
		let parsed = parse_generation("```json\n{\"answer\": \"True\"}\n```");

		assert_eq!(parsed.text, "True");
		assert_eq!(parsed.confidence, None);
		assert!(parsed.explanation.is_empty());
	}

	#[test]
	fn unparseable_output_becomes_bare_answer() {
		let parsed = parse_generation("The answer is probably Paris.");

		assert_eq!(parsed.text, "The answer is probably Paris.");
		assert_eq!(parsed.confidence, None);
	}

	#[test]
	fn prompt_lists_options_with_letters() {
		let draft = QuestionDraft {
			question_number: 1,
			question_text: "Capital of France?".to_string(),
			question_type: QuestionType::MultipleChoice,
			options: vec!["Paris".to_string(), "London".to_string()],
		};
		let messages = build_messages(&draft, &RetrievedContext::empty());
		let user = messages[1]["content"].as_str().unwrap();

		assert!(user.contains("A) Paris"));
		assert!(user.contains("B) London"));
		assert!(user.contains("exactly one of the offered options"));
	}
}
