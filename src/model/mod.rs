//! Boundary to the statistical model.
//!
//! The pipeline only needs four capabilities: fit on padded sequences, score
//! padded sequences, and round-trip through a file. [`Model`] is that
//! contract; [`linear::LinearModel`] is the implementation shipped with the CLI.

pub mod artifact;
pub mod linear;
pub mod tokenizer;

use std::path::Path;

use crate::error::{Error, Result};

pub use linear::LinearModel;
pub use tokenizer::{Tokenizer, OOV, PAD};

#[derive(Debug, Clone)]
pub struct FitParams {
    pub vocab_size: usize,
    /// Padded length every input sequence has.
    pub input_length: usize,
    pub epochs: usize,
    pub learning_rate: f32,
}

pub trait Model: Sized {
    fn fit(sequences: &[Vec<u32>], labels: &[u8], params: &FitParams) -> Result<Self>;

    /// One certainty in `[0, 1]` per input sequence, in input order.
    fn predict(&self, sequences: &[Vec<u32>]) -> Result<Vec<f32>>;

    fn input_length(&self) -> usize;

    fn vocab_size(&self) -> usize;

    fn save(&self, path: &Path) -> Result<()>;

    fn load(path: &Path) -> Result<Self>;
}

/// Pad with [`PAD`] or cut at the end so every sequence is `max_length` long.
pub fn pad_sequences(sequences: Vec<Vec<u32>>, max_length: usize) -> Vec<Vec<u32>> {
    sequences
        .into_iter()
        .map(|mut seq| {
            seq.resize(max_length, PAD);
            seq
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Evaluation {
    /// Mean binary cross-entropy.
    pub loss: f32,
    pub accuracy: f32,
}

pub fn evaluate<M: Model>(model: &M, sequences: &[Vec<u32>], labels: &[u8]) -> Result<Evaluation> {
    if sequences.len() != labels.len() {
        return Err(Error::ArtifactMismatch(format!(
            "{} sequences but {} labels",
            sequences.len(),
            labels.len()
        )));
    }
    if sequences.is_empty() {
        return Ok(Evaluation {
            loss: 0.0,
            accuracy: 0.0,
        });
    }
    let scores = model.predict(sequences)?;
    let mut loss = 0.0f32;
    let mut correct = 0usize;
    for (&p, &y) in scores.iter().zip(labels) {
        let p = p.clamp(1e-7, 1.0 - 1e-7);
        loss -= if y == 1 { p.ln() } else { (1.0 - p).ln() };
        if (p >= 0.5) == (y == 1) {
            correct += 1;
        }
    }
    let n = scores.len() as f32;
    Ok(Evaluation {
        loss: loss / n,
        accuracy: correct as f32 / n,
    })
}
