//! File naming for trained artifacts.
//!
//! A model is stored as `<category>.model`. Its tokenizer is stored as
//! `<category>.<maxLength>.tokenizer`; the padded length used at training
//! time is read back from that name at classification time.

use std::path::{Path, PathBuf};

use super::{Model, Tokenizer};
use crate::error::{Error, Result};

pub const MODEL_EXTENSION: &str = "model";
pub const TOKENIZER_EXTENSION: &str = "tokenizer";

/// Category name as it appears in a file name.
pub fn file_stem(category: &str) -> String {
    category.replace('/', "_")
}

pub fn model_path(dir: &Path, category: &str) -> PathBuf {
    dir.join(format!("{}.{}", file_stem(category), MODEL_EXTENSION))
}

pub fn tokenizer_path(dir: &Path, category: &str, max_length: usize) -> PathBuf {
    dir.join(format!(
        "{}.{}.{}",
        file_stem(category),
        max_length,
        TOKENIZER_EXTENSION
    ))
}

/// Split `<category>.<maxLength>.<ext>` into its category stem and length.
///
/// The length is the second-to-last dot segment, so dotted category names
/// (`U.S. states`) are kept whole.
pub fn parse_tokenizer_file_name(path: &Path) -> Result<(String, usize)> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or_else(|| Error::ArtifactMismatch(format!("bad tokenizer path {:?}", path)))?;
    let mut parts = name.rsplitn(3, '.');
    let (_ext, length, category) = match (parts.next(), parts.next(), parts.next()) {
        (Some(ext), Some(length), Some(category)) if !category.is_empty() => {
            (ext, length, category)
        }
        _ => {
            return Err(Error::ArtifactMismatch(format!(
                "tokenizer file {:?} is not named <category>.<maxLength>.<ext>",
                name
            )))
        }
    };
    let max_length = length.parse().map_err(|_| {
        Error::ArtifactMismatch(format!(
            "tokenizer file {:?} does not encode a max length ({:?})",
            name, length
        ))
    })?;
    Ok((category.to_string(), max_length))
}

/// A model, its tokenizer and the padded length they were trained with.
pub struct Artifacts<M> {
    pub model: M,
    pub tokenizer: Tokenizer,
    pub max_length: usize,
}

/// Load a model/tokenizer pair for `category` and check they belong together.
pub fn load<M: Model>(
    category: &str,
    model_file: &Path,
    tokenizer_file: &Path,
) -> Result<Artifacts<M>> {
    let (stem, max_length) = parse_tokenizer_file_name(tokenizer_file)?;
    if stem != file_stem(category) {
        return Err(Error::ArtifactMismatch(format!(
            "tokenizer {:?} was trained for {:?}, not {:?}",
            tokenizer_file, stem, category
        )));
    }
    let tokenizer = Tokenizer::load(tokenizer_file)?;
    let model = M::load(model_file)?;
    check(&model, &tokenizer, max_length)?;
    Ok(Artifacts {
        model,
        tokenizer,
        max_length,
    })
}

/// A tokenizer that never had its max length recorded (0) skips the
/// tokenizer-length comparison.
pub fn check<M: Model>(model: &M, tokenizer: &Tokenizer, max_length: usize) -> Result<()> {
    if tokenizer.max_length() != 0 && tokenizer.max_length() != max_length {
        return Err(Error::ArtifactMismatch(format!(
            "expected max length {}, tokenizer was saved with {}",
            max_length,
            tokenizer.max_length()
        )));
    }
    if model.input_length() != max_length {
        return Err(Error::ArtifactMismatch(format!(
            "model input length {} does not match max length {}",
            model.input_length(),
            max_length
        )));
    }
    if model.vocab_size() != tokenizer.vocab_size() {
        return Err(Error::ArtifactMismatch(format!(
            "model vocabulary {} does not match tokenizer vocabulary {}",
            model.vocab_size(),
            tokenizer.vocab_size()
        )));
    }
    Ok(())
}
