//! Normalized per-category corpora on disk, one file per page.

use std::fs;
use std::path::Path;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::info;

use crate::dataset::normalize_pages;
use crate::db;
use crate::error::{Error, Result};
use crate::normalize::NormalizedDocument;

/// Titles may contain `/`, file names may not.
pub fn file_name_for(title: &str) -> String {
    title.replace('/', "_")
}

pub fn title_for(file_name: &str) -> String {
    file_name.replace('_', "/")
}

/// Write the normalized content of every member of `category` into `outdir`.
pub fn export(conn: &Connection, category: &str, outdir: &Path) -> Result<usize> {
    if !db::category_exists(conn, category)? {
        return Err(Error::not_found("category", category));
    }
    fs::create_dir_all(outdir)?;
    let members = db::category_members(conn, category)?;
    let documents = normalize_pages(conn, &members)?;

    let pb = ProgressBar::new(documents.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] {bar:40} {pos}/{len}")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=> "),
    );
    for doc in &documents {
        fs::write(outdir.join(file_name_for(&doc.source_title)), &doc.text)?;
        pb.inc(1);
    }
    pb.finish_and_clear();

    info!(category, written = documents.len(), dir = %outdir.display(), "corpus exported");
    Ok(documents.len())
}

/// Read an exported corpus back, sorted by file name.
///
/// Underscores in file names come back as `/`, so titles that had a real
/// underscore do not survive the trip.
pub fn load(indir: &Path) -> Result<Vec<NormalizedDocument>> {
    if !indir.is_dir() {
        return Err(Error::Configuration(format!(
            "corpus directory {} does not exist",
            indir.display()
        )));
    }
    let mut entries = fs::read_dir(indir)?
        .map(|e| e.map(|e| e.path()))
        .collect::<std::io::Result<Vec<_>>>()?;
    entries.retain(|p| p.is_file());
    entries.sort();

    entries
        .into_iter()
        .map(|path| -> Result<NormalizedDocument> {
            let name = path
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(NormalizedDocument {
                source_title: title_for(&name),
                text: fs::read_to_string(&path)?,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::tests::seeded_store;
    use crate::normalize::normalize;

    #[test]
    fn export_then_load() {
        let conn = seeded_store();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("birds");
        assert_eq!(export(&conn, "Birds", &out).unwrap(), 3);

        let docs = load(&out).unwrap();
        let titles: Vec<&str> = docs.iter().map(|d| d.source_title.as_str()).collect();
        assert_eq!(titles, vec!["Eagle", "Robin", "Sparrow"]);
        let robin = &docs[1];
        assert_eq!(
            robin.text,
            normalize(&db::page_content(&conn, "Robin").unwrap())
        );
    }

    #[test]
    fn slashes_are_escaped() {
        assert_eq!(file_name_for("AC/DC"), "AC_DC");
        assert_eq!(title_for("AC_DC"), "AC/DC");
    }

    #[test]
    fn missing_dir_is_a_configuration_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load(&dir.path().join("nope")).unwrap_err();
        assert!(matches!(err, Error::Configuration(_)));
    }
}
