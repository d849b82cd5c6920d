//! Cloze prompts: blank out a card's word inside its context sentence.
//!
//! Matching works on tokens, so multi-word (grouped) cards blank the whole
//! contiguous span and punctuation between tokens is preserved.

use regex::Regex;
use std::sync::LazyLock;

use crate::domain::VocabularyCard;

/// Runs of letters/digits/apostrophes/hyphens, or a single punctuation mark
static TOKEN: LazyLock<Regex> =
  LazyLock::new(|| Regex::new(r"[\p{L}\p{N}'-]+|[.,!?؟«»]").expect("token pattern is valid"));

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClozeText {
  pub before: String,
  /// The blanked span; `None` if the word was not found
  pub answer: Option<String>,
  pub after: String,
}

impl ClozeText {
  fn unmatched(text: &str) -> Self {
    Self {
      before: text.to_string(),
      answer: None,
      after: String::new(),
    }
  }

  pub fn has_blank(&self) -> bool {
    self.answer.is_some()
  }

  /// Render with the answer hidden behind `blank`
  pub fn render(&self, blank: &str) -> String {
    match &self.answer {
      Some(_) => format!("{}{}{}", self.before, blank, self.after),
      None => self.before.clone(),
    }
  }
}

/// Blank the first contiguous token-span of `text` equal to the tokens of `word`
pub fn build_cloze(text: &str, word: &str, case_sensitive: bool) -> ClozeText {
  if word.trim().is_empty() {
    return ClozeText::unmatched(text);
  }

  let normalize = |s: &str| if case_sensitive { s.to_string() } else { s.to_lowercase() };

  let text_tokens: Vec<_> = TOKEN.find_iter(text).collect();
  let target: Vec<String> = TOKEN.find_iter(word).map(|m| normalize(m.as_str())).collect();
  if text_tokens.is_empty() || target.is_empty() || target.len() > text_tokens.len() {
    return ClozeText::unmatched(text);
  }

  let normalized: Vec<String> = text_tokens.iter().map(|m| normalize(m.as_str())).collect();
  let Some(start) = normalized.windows(target.len()).position(|window| window == target.as_slice()) else {
    return ClozeText::unmatched(text);
  };

  let begin = text_tokens[start].start();
  let end = text_tokens[start + target.len() - 1].end();

  ClozeText {
    before: text[..begin].to_string(),
    answer: Some(text[begin..end].to_string()),
    after: text[end..].to_string(),
  }
}

/// Prompts shown for a card during review
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CardPrompt {
  /// Target-script sentence with the target word blanked (exact match)
  pub target: ClozeText,
  /// Transliterated sentence with the transliteration blanked (case-insensitive)
  pub transliteration: ClozeText,
}

pub fn card_prompt(card: &VocabularyCard) -> CardPrompt {
  let context = &card.context;
  CardPrompt {
    target: build_cloze(&context.target, &card.target_text, true),
    transliteration: build_cloze(
      &context.transliteration,
      card.transliteration.as_deref().unwrap_or(""),
      false,
    ),
  }
}
