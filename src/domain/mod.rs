pub mod card;
pub mod review;

pub use card::{CardId, CardState, ContextSentence, GradeCounts, MarkKind, NewCard, VocabularyCard, VocabularyMark};
pub use review::{ReviewGrade, ReviewLog};
