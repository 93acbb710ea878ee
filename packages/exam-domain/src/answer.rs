use serde::{Deserialize, Serialize};

/// A synthesized answer for one question.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Answer {
	pub text: String,
	pub confidence: f32,
	pub explanation: String,
}
impl Answer {
	/// The sentinel recorded when generation fails or times out. Zero
	/// confidence, empty text, and an explanation that names the failure.
	pub fn failure(explanation: impl Into<String>) -> Self {
		Self { text: String::new(), confidence: 0.0, explanation: explanation.into() }
	}
}

/// How well retrieval covered a question, used to scale the model's own
/// calibration signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetrievalStrength {
	/// At least one knowledge entry passed the similarity threshold.
	LocalCoverage,
	/// Only web-search snippets were available.
	WebOnly,
	/// No usable context at all.
	NoContext,
}
impl RetrievalStrength {
	pub fn factor(&self) -> f32 {
		match self {
			Self::LocalCoverage => 1.0,
			Self::WebOnly => 0.75,
			Self::NoContext => 0.6,
		}
	}
}

/// Combines the model's calibration signal with retrieval strength into the
/// final `[0, 1]` confidence. A missing calibration signal counts as 0.5.
pub fn blend_confidence(model_confidence: Option<f32>, strength: RetrievalStrength) -> f32 {
	let calibrated = model_confidence.filter(|value| value.is_finite()).unwrap_or(0.5);

	(calibrated.clamp(0.0, 1.0) * strength.factor()).clamp(0.0, 1.0)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum OptionMatch {
	/// The answer text equals an option, ignoring case and surrounding space.
	Verbatim { index: usize },
	/// The answer named an option by its letter marker ("B", "b)", "(C)").
	Letter { index: usize },
	/// Closest option by edit-distance similarity; confidence should be
	/// scaled by `similarity` to reflect the mismatch.
	Closest { index: usize, similarity: f32 },
}
impl OptionMatch {
	pub fn index(&self) -> usize {
		match self {
			Self::Verbatim { index } | Self::Letter { index } | Self::Closest { index, .. } =>
				*index,
		}
	}

	pub fn similarity(&self) -> f32 {
		match self {
			Self::Verbatim { .. } | Self::Letter { .. } => 1.0,
			Self::Closest { similarity, .. } => *similarity,
		}
	}
}

/// Maps free-form model output onto one of the offered options.
///
/// Returns `None` only when `options` is empty. Ties break toward the lower
/// option index so repeated runs stay reproducible.
pub fn match_option(raw: &str, options: &[String]) -> Option<OptionMatch> {
	if options.is_empty() {
		return None;
	}

	let trimmed = raw.trim();

	for (index, option) in options.iter().enumerate() {
		if trimmed.eq_ignore_ascii_case(option.trim()) {
			return Some(OptionMatch::Verbatim { index });
		}
	}

	if let Some(index) = letter_index(trimmed, options) {
		return Some(OptionMatch::Letter { index });
	}

	let lowered = trimmed.to_ascii_lowercase();
	let mut best = (0_usize, f32::MIN);

	for (index, option) in options.iter().enumerate() {
		let similarity = normalized_similarity(&lowered, &option.trim().to_ascii_lowercase());

		if similarity > best.1 {
			best = (index, similarity);
		}
	}

	Some(OptionMatch::Closest { index: best.0, similarity: best.1.max(0.0) })
}

fn letter_index(raw: &str, options: &[String]) -> Option<usize> {
	let stripped = raw.strip_prefix('(').unwrap_or(raw);
	let mut chars = stripped.chars();
	let letter = chars.next()?;

	if !letter.is_ascii_alphabetic() {
		return None;
	}

	let rest: String = chars.collect();
	let rest = rest.trim_start_matches([')', '.', ':']).trim();
	let index = (letter.to_ascii_lowercase() as u8).wrapping_sub(b'a') as usize;

	if index >= options.len() {
		return None;
	}

	// "B" alone, or "B) London" where the remainder restates the option.
	if rest.is_empty() || rest.eq_ignore_ascii_case(options[index].trim()) {
		return Some(index);
	}

	None
}

/// `1 - distance / max_len`, in `[0, 1]`. Two empty strings are identical.
pub fn normalized_similarity(a: &str, b: &str) -> f32 {
	let max_len = a.chars().count().max(b.chars().count());

	if max_len == 0 {
		return 1.0;
	}

	1.0 - levenshtein(a, b) as f32 / max_len as f32
}

fn levenshtein(a: &str, b: &str) -> usize {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();

	if a.is_empty() {
		return b.len();
	}
	if b.is_empty() {
		return a.len();
	}

	let mut prev: Vec<usize> = (0..=b.len()).collect();
	let mut next = vec![0_usize; b.len() + 1];

	for (i, ca) in a.iter().enumerate() {
		next[0] = i + 1;

		for (j, cb) in b.iter().enumerate() {
			let substitution = prev[j] + usize::from(ca != cb);

			next[j + 1] = substitution.min(prev[j + 1] + 1).min(next[j] + 1);
		}

		std::mem::swap(&mut prev, &mut next);
	}

	prev[b.len()]
}

#[cfg(test)]
mod tests {
	use super::*;

	fn options() -> Vec<String> {
		vec!["Paris".to_string(), "London".to_string(), "Berlin".to_string()]
	}

	#[test]
	fn verbatim_match_ignores_case_and_space() {
		let matched = match_option("  paris ", &options()).expect("expected a match");

		assert_eq!(matched, OptionMatch::Verbatim { index: 0 });
		assert_eq!(matched.similarity(), 1.0);
	}

	#[test]
	fn letter_marker_selects_by_index() {
		assert_eq!(match_option("B", &options()), Some(OptionMatch::Letter { index: 1 }));
		assert_eq!(match_option("(c)", &options()), Some(OptionMatch::Letter { index: 2 }));
		assert_eq!(match_option("B) London", &options()), Some(OptionMatch::Letter { index: 1 }));
	}

	#[test]
	fn out_of_range_letter_falls_through_to_closest() {
		let matched = match_option("Z", &options()).expect("expected a match");

		assert!(matches!(matched, OptionMatch::Closest { .. }));
	}

	#[test]
	fn fuzzy_match_picks_nearest_option_with_reduced_similarity() {
		let matched = match_option("Pariss", &options()).expect("expected a match");

		assert_eq!(matched.index(), 0);
		assert!(matched.similarity() < 1.0);
		assert!(matched.similarity() > 0.7);
	}

	#[test]
	fn no_options_means_no_match() {
		assert_eq!(match_option("anything", &[]), None);
	}

	#[test]
	fn confidence_scales_with_retrieval_strength() {
		let local = blend_confidence(Some(0.8), RetrievalStrength::LocalCoverage);
		let web = blend_confidence(Some(0.8), RetrievalStrength::WebOnly);
		let none = blend_confidence(Some(0.8), RetrievalStrength::NoContext);

		assert!(local > web);
		assert!(web > none);
		assert!((local - 0.8).abs() < f32::EPSILON);
	}

	#[test]
	fn confidence_stays_in_unit_range() {
		assert_eq!(blend_confidence(Some(7.0), RetrievalStrength::LocalCoverage), 1.0);
		assert_eq!(blend_confidence(Some(-3.0), RetrievalStrength::WebOnly), 0.0);
		assert_eq!(blend_confidence(Some(f32::NAN), RetrievalStrength::LocalCoverage), 0.5);
	}

	#[test]
	fn missing_calibration_defaults_to_midpoint() {
		assert_eq!(blend_confidence(None, RetrievalStrength::LocalCoverage), 0.5);
	}

	#[test]
	fn failure_sentinel_has_zero_confidence_and_empty_text() {
		let sentinel = Answer::failure("generation timed out");

		assert_eq!(sentinel.confidence, 0.0);
		assert!(sentinel.text.is_empty());
		assert!(!sentinel.explanation.is_empty());
	}
}
