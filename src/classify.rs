use std::cmp::Ordering;

use rusqlite::Connection;
use tracing::info;

use crate::dataset::normalize_pages;
use crate::db;
use crate::error::{Error, Result};
use crate::model::{artifact, pad_sequences, Model, Tokenizer};
use crate::normalize::NormalizedDocument;

#[derive(Debug, Clone, PartialEq)]
pub struct ClassificationResult {
    pub title: String,
    pub certainty: f32,
}

/// Scored pages, ascending by certainty.
#[derive(Debug, Clone, PartialEq)]
pub struct Ranking {
    pub results: Vec<ClassificationResult>,
    /// Cut-off the caller asked for. It does not filter `results`.
    pub threshold: f32,
}

impl Ranking {
    /// Results with certainty at or above the threshold, still ascending.
    pub fn above_threshold(&self) -> impl Iterator<Item = &ClassificationResult> {
        let threshold = self.threshold;
        self.results.iter().filter(move |r| r.certainty >= threshold)
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }
}

/// Score every current member of `category`.
pub fn classify<M: Model>(
    conn: &Connection,
    category: &str,
    threshold: f32,
    model: &M,
    tokenizer: &Tokenizer,
    max_length: usize,
) -> Result<Ranking> {
    if !db::category_exists(conn, category)? {
        return Err(Error::not_found("category", category));
    }
    let members = db::category_members(conn, category)?;
    info!(category, members = members.len(), "normalizing members");
    let documents = normalize_pages(conn, &members)?;
    let results = classify_documents(&documents, model, tokenizer, max_length)?;
    Ok(Ranking { results, threshold })
}

/// Score an arbitrary set of normalized documents.
///
/// Fails with `ArtifactMismatch` before scoring if `model`, `tokenizer` and
/// `max_length` do not belong together.
pub fn classify_documents<M: Model>(
    documents: &[NormalizedDocument],
    model: &M,
    tokenizer: &Tokenizer,
    max_length: usize,
) -> Result<Vec<ClassificationResult>> {
    artifact::check(model, tokenizer, max_length)?;
    let texts: Vec<&str> = documents.iter().map(|d| d.text.as_str()).collect();
    let sequences = pad_sequences(tokenizer.texts_to_sequences(&texts), max_length);
    let scores = model.predict(&sequences)?;
    if scores.len() != documents.len() {
        return Err(Error::ArtifactMismatch(format!(
            "model returned {} scores for {} pages",
            scores.len(),
            documents.len()
        )));
    }

    let mut results: Vec<ClassificationResult> = documents
        .iter()
        .zip(scores)
        .map(|(doc, certainty)| ClassificationResult {
            title: doc.source_title.clone(),
            certainty,
        })
        .collect();
    results.sort_by(|a, b| {
        a.certainty
            .partial_cmp(&b.certainty)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.title.cmp(&b.title))
    });
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::seeded_store;
    use crate::model::{FitParams, LinearModel};
    use std::path::Path;

    /// Scores each sequence by the share of its slots holding token 2.
    struct CountingModel {
        input_length: usize,
    }

    impl Model for CountingModel {
        fn fit(_: &[Vec<u32>], _: &[u8], params: &FitParams) -> Result<Self> {
            Ok(CountingModel {
                input_length: params.input_length,
            })
        }

        fn predict(&self, sequences: &[Vec<u32>]) -> Result<Vec<f32>> {
            Ok(sequences
                .iter()
                .map(|s| s.iter().filter(|&&t| t == 2).count() as f32 / s.len().max(1) as f32)
                .collect())
        }

        fn input_length(&self) -> usize {
            self.input_length
        }

        fn vocab_size(&self) -> usize {
            10
        }

        fn save(&self, _: &Path) -> Result<()> {
            Ok(())
        }

        fn load(_: &Path) -> Result<Self> {
            Ok(CountingModel { input_length: 0 })
        }
    }

    /// Returns one score whatever it is given.
    struct ShortModel;

    impl Model for ShortModel {
        fn fit(_: &[Vec<u32>], _: &[u8], _: &FitParams) -> Result<Self> {
            Ok(ShortModel)
        }
        fn predict(&self, _: &[Vec<u32>]) -> Result<Vec<f32>> {
            Ok(vec![0.5])
        }
        fn input_length(&self) -> usize {
            2
        }
        fn vocab_size(&self) -> usize {
            10
        }
        fn save(&self, _: &Path) -> Result<()> {
            Ok(())
        }
        fn load(_: &Path) -> Result<Self> {
            Ok(ShortModel)
        }
    }

    fn docs(items: &[(&str, &str)]) -> Vec<NormalizedDocument> {
        items
            .iter()
            .map(|(title, text)| NormalizedDocument {
                source_title: title.to_string(),
                text: text.to_string(),
            })
            .collect()
    }

    #[test]
    fn results_ascend_by_certainty_then_title() {
        let tokenizer = Tokenizer::fit(&["bird bird bird other"], 10);
        assert_eq!(tokenizer.index_of("bird"), 2);
        let model = CountingModel { input_length: 4 };
        let documents = docs(&[
            ("Eagle", "bird bird bird bird"),
            ("Salmon", "fish fish"),
            ("Robin", "bird other"),
            ("Granite", "rock"),
        ]);
        let results = classify_documents(&documents, &model, &tokenizer, 4).unwrap();
        let order: Vec<&str> = results.iter().map(|r| r.title.as_str()).collect();
        assert_eq!(order, vec!["Granite", "Salmon", "Robin", "Eagle"]);
        assert!(results.windows(2).all(|w| w[0].certainty <= w[1].certainty));
    }

    #[test]
    fn store_members_are_ranked_deterministically() {
        let conn = seeded_store();
        let texts = ["robin small bird sings dawn", "salmon swim upstream"];
        let tokenizer = Tokenizer::fit(&texts, 32).with_max_length(6);
        let params = FitParams {
            vocab_size: 32,
            input_length: 6,
            epochs: 50,
            learning_rate: 0.5,
        };
        let seqs = pad_sequences(tokenizer.texts_to_sequences(&texts), 6);
        let model = LinearModel::fit(&seqs, &[1, 0], &params).unwrap();

        let a = classify(&conn, "Birds", 0.9, &model, &tokenizer, 6).unwrap();
        let b = classify(&conn, "Birds", 0.9, &model, &tokenizer, 6).unwrap();
        assert_eq!(a, b);
        assert_eq!(a.len(), 3);
        assert!(a.results.windows(2).all(|w| w[0].certainty <= w[1].certainty));
    }

    #[test]
    fn threshold_does_not_drop_results() {
        let ranking = Ranking {
            results: [("Salmon", 0.1), ("Robin", 0.7), ("Eagle", 0.9)]
                .into_iter()
                .map(|(title, certainty)| ClassificationResult {
                    title: title.into(),
                    certainty,
                })
                .collect(),
            threshold: 0.7,
        };
        assert_eq!(ranking.len(), 3);
        let kept: Vec<&str> = ranking.above_threshold().map(|r| r.title.as_str()).collect();
        assert_eq!(kept, vec!["Robin", "Eagle"]);
    }

    #[test]
    fn short_score_vector_is_a_mismatch() {
        let tokenizer = Tokenizer::fit(&["a b"], 10);
        let documents = docs(&[("A", "a"), ("B", "b")]);
        let err = classify_documents(&documents, &ShortModel, &tokenizer, 2).unwrap_err();
        assert!(matches!(err, Error::ArtifactMismatch(_)));
    }

    #[test]
    fn mismatched_artifacts_are_rejected_before_scoring() {
        let conn = seeded_store();
        let tokenizer = Tokenizer::fit(&["robin small bird"], 60_000).with_max_length(3);
        let model = LinearModel::new(16, 9);
        let err = classify(&conn, "Birds", 0.5, &model, &tokenizer, 9).unwrap_err();
        assert!(matches!(err, Error::ArtifactMismatch(_)));

        // Lengths agree, vocabularies do not.
        let tokenizer = Tokenizer::fit(&["robin small bird"], 60_000).with_max_length(9);
        let err = classify(&conn, "Birds", 0.5, &model, &tokenizer, 9).unwrap_err();
        assert!(matches!(err, Error::ArtifactMismatch(_)));
    }

    #[test]
    fn unknown_category_is_not_found() {
        let conn = seeded_store();
        let tokenizer = Tokenizer::fit(&["a"], 10);
        let model = CountingModel { input_length: 1 };
        assert!(matches!(
            classify(&conn, "Mammals", 0.5, &model, &tokenizer, 1),
            Err(Error::NotFound { .. })
        ));
    }
}
