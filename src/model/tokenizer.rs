use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

pub const PAD: u32 = 0;
pub const OOV: u32 = 1;

/// Word-to-index vocabulary fitted on the training texts.
///
/// Words are lowercased and ranked by frequency (ties by first appearance).
/// Only ranks below `vocab_size` get an index; everything else maps to [`OOV`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tokenizer {
    vocab_size: usize,
    word_index: BTreeMap<String, u32>,
    /// Padded length of the dataset this vocabulary was fitted with.
    max_length: usize,
}

impl Tokenizer {
    pub fn fit<S: AsRef<str>>(texts: &[S], vocab_size: usize) -> Self {
        let mut counts: HashMap<String, (usize, usize)> = HashMap::new();
        let mut order = 0usize;
        for text in texts {
            for word in text.as_ref().split_whitespace() {
                let entry = counts.entry(word.to_lowercase()).or_insert_with(|| {
                    order += 1;
                    (0, order)
                });
                entry.0 += 1;
            }
        }

        let mut ranked: Vec<(String, (usize, usize))> = counts.into_iter().collect();
        ranked.sort_by(|a, b| b.1 .0.cmp(&a.1 .0).then(a.1 .1.cmp(&b.1 .1)));

        let capacity = vocab_size.saturating_sub(OOV as usize + 1);
        let word_index = ranked
            .into_iter()
            .take(capacity)
            .enumerate()
            .map(|(rank, (word, _))| (word, rank as u32 + OOV + 1))
            .collect();

        Tokenizer {
            vocab_size,
            word_index,
            max_length: 0,
        }
    }

    pub fn with_max_length(mut self, max_length: usize) -> Self {
        self.max_length = max_length;
        self
    }

    pub fn max_length(&self) -> usize {
        self.max_length
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn index_of(&self, word: &str) -> u32 {
        self.word_index
            .get(&word.to_lowercase())
            .copied()
            .unwrap_or(OOV)
    }

    pub fn texts_to_sequences<S: AsRef<str>>(&self, texts: &[S]) -> Vec<Vec<u32>> {
        texts
            .iter()
            .map(|t| t.as_ref().split_whitespace().map(|w| self.index_of(w)).collect())
            .collect()
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frequent_words_get_low_indices() {
        let tok = Tokenizer::fit(&["bird bird song", "Bird wing song", "wing"], 100);
        assert_eq!(tok.index_of("bird"), 2);
        // song and wing both appear twice; song was seen first
        assert_eq!(tok.index_of("song"), 3);
        assert_eq!(tok.index_of("wing"), 4);
        assert_eq!(tok.index_of("fish"), OOV);
    }

    #[test]
    fn vocab_cap_sends_rare_words_to_oov() {
        let tok = Tokenizer::fit(&["a a a b b c"], 4);
        assert_eq!(
            tok.texts_to_sequences(&["a b c d"]),
            vec![vec![2, 3, OOV, OOV]]
        );
    }

    #[test]
    fn survives_a_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("birds.3.tokenizer");
        let tok = Tokenizer::fit(&["robin sparrow eagle"], 50).with_max_length(3);
        tok.save(&path).unwrap();
        assert_eq!(Tokenizer::load(&path).unwrap(), tok);
    }
}
