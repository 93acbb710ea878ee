use exam_domain::{QuestionType, SegmenterConfig, TextBlock, segment};

const MIXED_EXAM: &str = "\
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

#[test]
fn mixed_exam_segments_into_ordered_typed_questions() {
	let blocks = vec![TextBlock::new(MIXED_EXAM)];
	let drafts = segment(&blocks, &SegmenterConfig::default());

	assert_eq!(drafts.len(), 5);

	for (index, draft) in drafts.iter().enumerate() {
		assert_eq!(draft.question_number, index as i32 + 1);
	}

	assert_eq!(drafts[0].question_type, QuestionType::MultipleChoice);
	assert_eq!(drafts[0].options, vec!["Paris", "London", "Berlin", "Madrid"]);
	assert_eq!(drafts[1].question_type, QuestionType::TrueFalse);
	assert_eq!(drafts[1].options, vec!["True", "False"]);
	assert_eq!(drafts[2].question_type, QuestionType::FillBlank);
	assert_eq!(drafts[3].question_type, QuestionType::ShortAnswer);
	assert_eq!(drafts[4].question_type, QuestionType::Essay);
}

#[test]
fn multi_block_input_preserves_block_order() {
	let blocks = vec![
		TextBlock::new("1. First question?\nA) Yes\nB) No"),
		TextBlock::new("2. Second question?\nA) Up\nB) Down"),
	];
	let drafts = segment(&blocks, &SegmenterConfig::default());

	assert_eq!(drafts.len(), 2);
	assert_eq!(drafts[0].question_text, "First question?");
	assert_eq!(drafts[1].question_text, "Second question?");
}

#[test]
fn type_mapping_is_stable_across_runs() {
	let blocks = vec![TextBlock::new(MIXED_EXAM)];
	let first: Vec<QuestionType> = segment(&blocks, &SegmenterConfig::default())
		.into_iter()
		.map(|draft| draft.question_type)
		.collect();
	let second: Vec<QuestionType> = segment(&blocks, &SegmenterConfig::default())
		.into_iter()
		.map(|draft| draft.question_type)
		.collect();

	assert_eq!(first, second);
}
