use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{FitParams, Model, OOV, PAD};
use crate::error::{Error, Result};

/// Averaged per-token weights plus a bias, squashed through a sigmoid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinearModel {
    input_length: usize,
    weights: Vec<f32>,
    bias: f32,
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}

impl LinearModel {
    pub fn new(vocab_size: usize, input_length: usize) -> Self {
        LinearModel {
            input_length,
            weights: vec![0.0; vocab_size],
            bias: 0.0,
        }
    }

    fn tokens<'a>(&'a self, seq: &'a [u32]) -> impl Iterator<Item = usize> + 'a {
        seq.iter().filter(|&&t| t != PAD).map(move |&t| {
            if (t as usize) < self.weights.len() {
                t as usize
            } else {
                OOV as usize
            }
        })
    }

    fn score(&self, seq: &[u32]) -> f32 {
        let (sum, n) = self
            .tokens(seq)
            .fold((0.0f32, 0usize), |(s, n), t| (s + self.weights[t], n + 1));
        let mean = if n == 0 { 0.0 } else { sum / n as f32 };
        sigmoid(self.bias + mean)
    }

    fn check_shape(&self, sequences: &[Vec<u32>]) -> Result<()> {
        match sequences.iter().find(|s| s.len() != self.input_length) {
            Some(s) => Err(Error::ArtifactMismatch(format!(
                "model expects sequences of length {}, got {}",
                self.input_length,
                s.len()
            ))),
            None => Ok(()),
        }
    }
}

impl Model for LinearModel {
    /// Full-batch gradient descent on binary cross-entropy.
    fn fit(sequences: &[Vec<u32>], labels: &[u8], params: &FitParams) -> Result<Self> {
        if sequences.len() != labels.len() {
            return Err(Error::ArtifactMismatch(format!(
                "{} sequences but {} labels",
                sequences.len(),
                labels.len()
            )));
        }
        let vocab_size = params.vocab_size.max(OOV as usize + 1);
        let mut model = LinearModel::new(vocab_size, params.input_length);
        model.check_shape(sequences)?;
        if sequences.is_empty() {
            return Ok(model);
        }

        let n = sequences.len() as f32;
        for epoch in 0..params.epochs {
            let mut grad_w = vec![0.0f32; model.weights.len()];
            let mut grad_b = 0.0f32;
            for (seq, &label) in sequences.iter().zip(labels) {
                let err = model.score(seq) - label as f32;
                grad_b += err;
                let count = model.tokens(seq).count();
                if count == 0 {
                    continue;
                }
                let share = err / count as f32;
                for t in model.tokens(seq) {
                    grad_w[t] += share;
                }
            }
            for (w, g) in model.weights.iter_mut().zip(&grad_w) {
                *w -= params.learning_rate * g / n;
            }
            model.bias -= params.learning_rate * grad_b / n;
            debug!(epoch, bias = model.bias, "epoch done");
        }
        Ok(model)
    }

    fn predict(&self, sequences: &[Vec<u32>]) -> Result<Vec<f32>> {
        self.check_shape(sequences)?;
        Ok(sequences.iter().map(|s| self.score(s)).collect())
    }

    fn input_length(&self) -> usize {
        self.input_length
    }

    fn vocab_size(&self) -> usize {
        self.weights.len()
    }

    fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, serde_json::to_vec(self)?)?;
        Ok(())
    }

    fn load(path: &Path) -> Result<Self> {
        let bytes = fs::read(path)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}
