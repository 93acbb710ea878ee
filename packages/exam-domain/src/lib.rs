pub mod answer;
pub mod question;
pub mod segment;

pub use answer::{Answer, OptionMatch, RetrievalStrength, blend_confidence, match_option};
pub use question::{QuestionDraft, QuestionType};
pub use segment::{Bounds, SegmenterConfig, TextBlock, segment};
