/// A small mixed-type exam covering every question classification.
pub const MIXED_EXAM: &str = "\
MIDTERM EXAM - GENERAL KNOWLEDGE
Answer all questions.

1. What is the capital of France?
A) Paris
B) London
C) Berlin
D) Madrid

2. True or false: the Pacific is the largest ocean.

3. The chemical symbol for gold is ____.

4. Name the process by which plants convert sunlight into energy.

5. Discuss the causes and consequences of the industrial revolution, with
reference to at least three technological developments.
";

/// A two-question exam for concurrency and deadline scenarios.
pub const TWO_QUESTIONS: &str = "\
1. What is the capital of France?
A) Paris
B) London

2. What year did the second world war end?
";

/// JSON body a well-behaved generation model returns.
pub fn answer_json(answer: &str, confidence: f32, explanation: &str) -> String {
	serde_json::json!({
		"answer": answer,
		"confidence": confidence,
		"explanation": explanation,
	})
	.to_string()
}
