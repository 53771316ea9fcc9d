pub mod categories;
pub mod dump;

use std::io::BufRead;

use indicatif::{ProgressBar, ProgressStyle};
use rusqlite::Connection;
use tracing::{info, warn};

use crate::db::{self, Page};
use crate::error::Result;
use categories::CategoryIndex;
use dump::{DumpReader, RawPage};

/// Main article namespace; everything else is skipped.
pub const MAIN_NAMESPACE: i64 = 0;

pub struct ImportOptions {
    /// Export namespace the dump root is expected to declare.
    pub namespace: String,
    pub show_progress: bool,
}

#[derive(Debug, Default, Clone, PartialEq)]
pub struct ImportStats {
    pub pages_read: usize,
    pub pages_saved: usize,
    /// Raw `[[Category:..]]` occurrences, counting repeats and discarded tags.
    pub categories_read: usize,
    pub categories: usize,
    pub listings: usize,
}

pub struct ImportReport {
    pub stats: ImportStats,
    pub index: CategoryIndex,
}

/// Stream a dump into `conn`.
///
/// Pages are written as they are read. Categories and listings are written
/// once the stream is exhausted, since ids are only final at that point. If
/// the dump fails to parse, the pages read so far stay committed and the
/// category tables are left untouched.
pub fn import<R: BufRead>(
    source: R,
    conn: &Connection,
    options: &ImportOptions,
) -> Result<ImportReport> {
    db::create_schema(conn)?;

    let pb = if options.show_progress {
        let pb = ProgressBar::new_spinner();
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.green} [{elapsed_precise}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb
    } else {
        ProgressBar::hidden()
    };

    let mut stats = ImportStats::default();
    let mut index = CategoryIndex::new();
    let mut reader = DumpReader::new(source, &options.namespace);

    let tx = conn.unchecked_transaction()?;
    let scanned = scan_pages(&mut reader, &tx, &mut index, &mut stats, &pb);
    tx.commit()?;
    pb.finish_and_clear();

    if let Err(e) = scanned {
        warn!(
            pages_saved = stats.pages_saved,
            "import aborted, category tables not written: {}", e
        );
        return Err(e);
    }

    info!(
        "Writing {} categories ({} listings)...",
        index.len(),
        index.listing_count()
    );
    stats.listings = db::insert_categories(conn, &index)?;
    stats.categories = index.len();
    info!(
        pages_read = stats.pages_read,
        pages_saved = stats.pages_saved,
        categories = stats.categories,
        listings = stats.listings,
        "import finished"
    );

    Ok(ImportReport { stats, index })
}

fn scan_pages<R: BufRead>(
    reader: &mut DumpReader<R>,
    conn: &Connection,
    index: &mut CategoryIndex,
    stats: &mut ImportStats,
    pb: &ProgressBar,
) -> Result<()> {
    for raw in reader {
        let raw = raw?;
        stats.pages_read += 1;
        if raw.ns != MAIN_NAMESPACE {
            continue;
        }
        stats.categories_read += register_categories(&raw, index)?;
        db::insert_page(
            conn,
            &Page {
                id: raw.id,
                title: raw.title,
                content: raw.text,
            },
        )?;
        stats.pages_saved += 1;
        pb.set_message(format!(
            "Pages read: {} (saved {})",
            stats.pages_read, stats.pages_saved
        ));
        pb.tick();
    }
    Ok(())
}

/// List the page under each of its tagged categories. Returns the raw tag count.
fn register_categories(page: &RawPage, index: &mut CategoryIndex) -> Result<usize> {
    let mut seen = 0;
    for tag in categories::extract_tags(&page.text) {
        seen += 1;
        if let Some(name) = categories::sanitize(tag) {
            index.add_listing(&name, page.id)?;
        }
    }
    Ok(seen)
}
