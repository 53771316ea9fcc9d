use std::fs;
use std::path::{Path, PathBuf};

use rand::Rng;
use rusqlite::Connection;
use tracing::info;

use crate::dataset::{self, Dataset, DatasetOptions};
use crate::error::{Error, Result};
use crate::model::{artifact, evaluate, pad_sequences, Evaluation, FitParams, Model, Tokenizer};
use crate::normalize::NormalizedDocument;
use crate::settings::Settings;

#[derive(Debug, Clone)]
pub struct TrainOptions {
    pub negatives: usize,
    pub dataset: DatasetOptions,
    pub vocab_size: usize,
    pub epochs: usize,
    pub learning_rate: f32,
}

impl From<&Settings> for TrainOptions {
    fn from(s: &Settings) -> Self {
        TrainOptions {
            negatives: s.negative_samples,
            dataset: DatasetOptions {
                train_ratio: s.train_ratio,
            },
            vocab_size: s.vocab_size,
            epochs: s.epochs,
            learning_rate: s.learning_rate,
        }
    }
}

pub struct TrainReport {
    pub model_file: PathBuf,
    pub tokenizer_file: PathBuf,
    pub max_length: usize,
    pub train_len: usize,
    pub test_len: usize,
    /// Held-out score, measured on the artifacts as reloaded from disk.
    pub evaluation: Evaluation,
}

/// Assemble a dataset for `category`, fit `M`, write both artifacts to
/// `outdir` and evaluate the reloaded pair on the test split.
///
/// With `positives` set, those documents replace the store's members.
pub fn train<M: Model, R: Rng + ?Sized>(
    conn: &Connection,
    category: &str,
    positives: Option<Vec<NormalizedDocument>>,
    options: &TrainOptions,
    outdir: &Path,
    rng: &mut R,
) -> Result<TrainReport> {
    let data = match positives {
        Some(docs) => {
            dataset::assemble_with_positives(conn, docs, options.negatives, &options.dataset, rng)?
        }
        None => dataset::assemble(conn, category, options.negatives, &options.dataset, rng)?,
    };
    if data.train.is_empty() {
        return Err(Error::Configuration(format!(
            "no training examples for category {:?}",
            category
        )));
    }

    let texts = Dataset::texts(&data.train);
    let tokenizer = Tokenizer::fit(&texts, options.vocab_size).with_max_length(data.max_length);
    let sequences = pad_sequences(tokenizer.texts_to_sequences(&texts), data.max_length);
    let params = FitParams {
        vocab_size: options.vocab_size,
        input_length: data.max_length,
        epochs: options.epochs,
        learning_rate: options.learning_rate,
    };
    info!(category, examples = sequences.len(), max_length = data.max_length, "fitting model");
    let model = M::fit(&sequences, &Dataset::labels(&data.train), &params)?;

    fs::create_dir_all(outdir)?;
    let model_file = artifact::model_path(outdir, category);
    let tokenizer_file = artifact::tokenizer_path(outdir, category, data.max_length);
    model.save(&model_file)?;
    tokenizer.save(&tokenizer_file)?;
    info!(model = %model_file.display(), tokenizer = %tokenizer_file.display(), "artifacts saved");

    let reloaded = artifact::load::<M>(category, &model_file, &tokenizer_file)?;
    let test_texts = Dataset::texts(&data.test);
    let test_sequences = pad_sequences(
        reloaded.tokenizer.texts_to_sequences(&test_texts),
        reloaded.max_length,
    );
    let evaluation = evaluate(&reloaded.model, &test_sequences, &Dataset::labels(&data.test))?;

    Ok(TrainReport {
        model_file,
        tokenizer_file,
        max_length: data.max_length,
        train_len: data.train.len(),
        test_len: data.test.len(),
        evaluation,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::seeded_store;
    use crate::model::LinearModel;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn options() -> TrainOptions {
        TrainOptions {
            negatives: 3,
            dataset: DatasetOptions::default(),
            vocab_size: 64,
            epochs: 20,
            learning_rate: 0.5,
        }
    }

    #[test]
    fn writes_named_artifacts() {
        let conn = seeded_store();
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(11);
        let report = train::<LinearModel, _>(&conn, "Birds", None, &options(), dir.path(), &mut rng)
            .unwrap();

        assert_eq!(report.train_len + report.test_len, 6);
        assert_eq!(report.model_file, dir.path().join("Birds.model"));
        assert_eq!(
            report.tokenizer_file,
            dir.path().join(format!("Birds.{}.tokenizer", report.max_length))
        );
        assert!(report.model_file.exists() && report.tokenizer_file.exists());
        assert!((0.0..=1.0).contains(&report.evaluation.accuracy));
    }

    #[test]
    fn empty_training_split_is_rejected() {
        let conn = seeded_store();
        let dir = tempfile::tempdir().unwrap();
        let mut rng = StdRng::seed_from_u64(0);
        let opts = TrainOptions {
            negatives: 0,
            ..options()
        };
        let result = train::<LinearModel, _>(&conn, "Fish", None, &opts, dir.path(), &mut rng);
        assert!(matches!(result, Err(Error::Configuration(_))));
    }
}
