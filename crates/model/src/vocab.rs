//! Closed vocabulary with reserved padding and start-of-caption tokens.

use std::collections::HashMap;

use candle_core::{Error, Result};

/// Reserved padding token; its index doubles as the embedding-ignore index.
pub const NULL_TOKEN: &str = "<NULL>";
/// Reserved start-of-caption token required for sampling.
pub const START_TOKEN: &str = "<START>";

/// Bidirectional word <-> index mapping, immutable after construction.
///
/// Every word maps to a unique index in `[0, V)`. `<NULL>` must be present;
/// `<START>` is optional at construction but [`crate::TransformerDecoder::sample`]
/// fails without it.
#[derive(Debug, Clone)]
pub struct Vocabulary {
    word_to_idx: HashMap<String, u32>,
    idx_to_word: Vec<String>,
    null: u32,
    start: Option<u32>,
}

impl Vocabulary {
    /// Validates the mapping and captures the reserved indices.
    pub fn new(word_to_idx: HashMap<String, u32>) -> Result<Self> {
        let size = word_to_idx.len();
        if size == 0 {
            return Err(Error::Msg("vocabulary must not be empty".into()));
        }

        let mut idx_to_word = vec![None::<String>; size];
        for (word, &idx) in &word_to_idx {
            let slot = idx_to_word.get_mut(idx as usize).ok_or_else(|| {
                Error::Msg(format!(
                    "vocabulary index {idx} for {word:?} is outside [0, {size})"
                ))
            })?;
            if let Some(existing) = slot {
                return Err(Error::Msg(format!(
                    "vocabulary index {idx} assigned to both {existing:?} and {word:?}"
                )));
            }
            *slot = Some(word.clone());
        }
        // size entries, all unique and in [0, size): the table is dense.
        let idx_to_word: Vec<String> = idx_to_word.into_iter().flatten().collect();

        let null = *word_to_idx
            .get(NULL_TOKEN)
            .ok_or_else(|| Error::Msg(format!("vocabulary must define {NULL_TOKEN}")))?;
        let start = word_to_idx.get(START_TOKEN).copied();

        Ok(Self {
            word_to_idx,
            idx_to_word,
            null,
            start,
        })
    }

    /// Number of distinct words.
    pub fn len(&self) -> usize {
        self.idx_to_word.len()
    }

    /// True when the vocabulary holds no words (never, post-construction).
    pub fn is_empty(&self) -> bool {
        self.idx_to_word.is_empty()
    }

    /// Index of the padding token.
    pub fn null(&self) -> u32 {
        self.null
    }

    /// Index of the start-of-caption token, when defined.
    pub fn start(&self) -> Option<u32> {
        self.start
    }

    /// Looks up the index of a word.
    pub fn index(&self, word: &str) -> Option<u32> {
        self.word_to_idx.get(word).copied()
    }

    /// Looks up the word at an index.
    pub fn word(&self, idx: u32) -> Option<&str> {
        self.idx_to_word.get(idx as usize).map(String::as_str)
    }

    /// Renders a sampled id sequence back into words.
    pub fn decode(&self, ids: &[u32]) -> Result<Vec<String>> {
        ids.iter()
            .map(|&idx| {
                self.word(idx)
                    .map(str::to_owned)
                    .ok_or_else(|| Error::Msg(format!("id {idx} is outside the vocabulary")))
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapping(entries: &[(&str, u32)]) -> HashMap<String, u32> {
        entries
            .iter()
            .map(|(word, idx)| (word.to_string(), *idx))
            .collect()
    }

    #[test]
    fn round_trips_words_and_indices() -> Result<()> {
        let vocab = Vocabulary::new(mapping(&[
            (NULL_TOKEN, 0),
            (START_TOKEN, 1),
            ("a", 2),
            ("dog", 3),
        ]))?;
        assert_eq!(vocab.len(), 4);
        assert_eq!(vocab.null(), 0);
        assert_eq!(vocab.start(), Some(1));
        assert_eq!(vocab.index("dog"), Some(3));
        assert_eq!(vocab.word(2), Some("a"));
        assert_eq!(vocab.decode(&[2, 3])?, vec!["a", "dog"]);
        Ok(())
    }

    #[test]
    fn missing_null_is_rejected() {
        assert!(Vocabulary::new(mapping(&[("a", 0)])).is_err());
    }

    #[test]
    fn duplicate_or_out_of_range_indices_are_rejected() {
        assert!(Vocabulary::new(mapping(&[(NULL_TOKEN, 0), ("a", 0)])).is_err());
        assert!(Vocabulary::new(mapping(&[(NULL_TOKEN, 0), ("a", 5)])).is_err());
    }
}
