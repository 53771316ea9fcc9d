use rand::seq::SliceRandom;
use rand::Rng;
use rayon::prelude::*;
use rusqlite::Connection;
use tracing::info;

use crate::db;
use crate::error::{Error, Result};
use crate::normalize::{token_count, NormalizedDocument};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub title: String,
    pub text: String,
    /// 1 for a member of the target category, 0 for a sampled negative.
    pub label: u8,
}

#[derive(Debug, Clone)]
pub struct DatasetOptions {
    /// Share of the shuffled examples that goes to `train`.
    pub train_ratio: f64,
}

impl Default for DatasetOptions {
    fn default() -> Self {
        DatasetOptions { train_ratio: 0.8 }
    }
}

#[derive(Debug, Clone)]
pub struct Dataset {
    pub train: Vec<TrainingExample>,
    pub test: Vec<TrainingExample>,
    /// Longest token count over train and test together.
    pub max_length: usize,
}

impl Dataset {
    pub fn len(&self) -> usize {
        self.train.len() + self.test.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn texts(examples: &[TrainingExample]) -> Vec<&str> {
        examples.iter().map(|e| e.text.as_str()).collect()
    }

    pub fn labels(examples: &[TrainingExample]) -> Vec<u8> {
        examples.iter().map(|e| e.label).collect()
    }
}

/// Members of `category` as positives plus `negatives` random pages, shuffled and split.
///
/// Sampled pages are labeled 0 even when they are members of `category`.
pub fn assemble<R: Rng + ?Sized>(
    conn: &Connection,
    category: &str,
    negatives: usize,
    options: &DatasetOptions,
    rng: &mut R,
) -> Result<Dataset> {
    if !db::category_exists(conn, category)? {
        return Err(Error::not_found("category", category));
    }
    let members = db::category_members(conn, category)?;
    info!(category, members = members.len(), "collected positives");
    let positives = normalize_pages(conn, &members)?;
    assemble_with_positives(conn, positives, negatives, options, rng)
}

/// Same as [`assemble`] with the positive documents supplied by the caller.
pub fn assemble_with_positives<R: Rng + ?Sized>(
    conn: &Connection,
    positives: Vec<NormalizedDocument>,
    negatives: usize,
    options: &DatasetOptions,
    rng: &mut R,
) -> Result<Dataset> {
    let sampled = db::sample_random_pages(conn, negatives, rng)?;
    info!(requested = negatives, sampled = sampled.len(), "sampled negatives");
    let negatives = normalize_pages(conn, &sampled)?;

    let mut examples: Vec<TrainingExample> = positives
        .into_iter()
        .map(|d| (d, 1))
        .chain(negatives.into_iter().map(|d| (d, 0)))
        .map(|(doc, label)| TrainingExample {
            title: doc.source_title,
            text: doc.text,
            label,
        })
        .collect();

    examples.shuffle(rng);
    let max_length = examples
        .iter()
        .map(|e| token_count(&e.text))
        .max()
        .unwrap_or(0);

    let train_len = (examples.len() as f64 * options.train_ratio).floor() as usize;
    let test = examples.split_off(train_len.min(examples.len()));
    info!(
        train = examples.len(),
        test = test.len(),
        max_length,
        "dataset assembled"
    );

    Ok(Dataset {
        train: examples,
        test,
        max_length,
    })
}

/// Fetch and normalize pages by title, keeping the input order.
pub fn normalize_pages(conn: &Connection, titles: &[String]) -> Result<Vec<NormalizedDocument>> {
    let raw = titles
        .iter()
        .map(|t| -> Result<(String, String)> { Ok((t.clone(), db::page_content(conn, t)?)) })
        .collect::<Result<Vec<_>>>()?;
    Ok(raw
        .into_par_iter()
        .map(|(title, content)| NormalizedDocument::new(title, &content))
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::seeded_store;
    use crate::model::{pad_sequences, Tokenizer};
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn build(seed: u64, negatives: usize) -> Dataset {
        let conn = seeded_store();
        let mut rng = StdRng::seed_from_u64(seed);
        assemble(&conn, "Birds", negatives, &DatasetOptions::default(), &mut rng).unwrap()
    }

    #[test]
    fn holds_positives_plus_negatives() {
        for negatives in [0, 1, 3, 6] {
            let ds = build(1, negatives);
            assert_eq!(ds.len(), 3 + negatives);
            assert_eq!(ds.train.len() + ds.test.len(), 3 + negatives);
            assert_eq!(ds.train.len(), ((3 + negatives) as f64 * 0.8).floor() as usize);
        }
    }

    #[test]
    fn positives_are_labeled_one() {
        let ds = build(3, 0);
        assert!(ds.train.iter().chain(&ds.test).all(|e| e.label == 1));
        let titles: Vec<&str> = ds.train.iter().chain(&ds.test).map(|e| e.title.as_str()).collect();
        for bird in ["Robin", "Sparrow", "Eagle"] {
            assert!(titles.contains(&bird));
        }
    }

    #[test]
    fn sampled_members_stay_negative() {
        // Every page is sampled, so all three birds appear twice: once per label.
        let ds = build(5, 6);
        let all: Vec<&TrainingExample> = ds.train.iter().chain(&ds.test).collect();
        let robins: Vec<u8> = all.iter().filter(|e| e.title == "Robin").map(|e| e.label).collect();
        assert_eq!(robins.len(), 2);
        assert!(robins.contains(&0) && robins.contains(&1));
    }

    #[test]
    fn same_seed_same_dataset() {
        let a = build(42, 4);
        let b = build(42, 4);
        assert_eq!(a.train, b.train);
        assert_eq!(a.test, b.test);
        assert_eq!(a.max_length, b.max_length);
    }

    #[test]
    fn max_length_bounds_every_example() {
        let ds = build(9, 6);
        let all: Vec<&TrainingExample> = ds.train.iter().chain(&ds.test).collect();
        let longest = all.iter().map(|e| token_count(&e.text)).max().unwrap();
        assert_eq!(ds.max_length, longest);

        let texts: Vec<&str> = all.iter().map(|e| e.text.as_str()).collect();
        let tokenizer = Tokenizer::fit(&texts, 100);
        let sequences = tokenizer.texts_to_sequences(&texts);
        assert!(sequences.iter().all(|s| s.len() <= ds.max_length));
        let padded = pad_sequences(sequences, ds.max_length);
        assert!(padded.iter().all(|s| s.len() == ds.max_length));
    }

    #[test]
    fn unknown_category_is_not_found() {
        let conn = seeded_store();
        let mut rng = StdRng::seed_from_u64(0);
        let err = assemble(&conn, "Mammals", 2, &DatasetOptions::default(), &mut rng).unwrap_err();
        assert!(matches!(err, Error::NotFound { what: "category", .. }));
    }
}
