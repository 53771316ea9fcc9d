use std::path::Path;

use rand::seq::SliceRandom;
use rand::Rng;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Error, Result};
use crate::importer::categories::CategoryIndex;

pub struct Page {
    pub id: i64,
    pub title: String,
    pub content: String,
}

pub struct Category {
    pub id: i64,
    pub name: String,
}

pub fn connect(path: &Path) -> Result<Connection> {
    let conn = Connection::open(path)?;
    conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=OFF;")?;
    Ok(conn)
}

pub fn open_in_memory() -> Result<Connection> {
    let conn = Connection::open_in_memory()?;
    conn.execute_batch("PRAGMA foreign_keys=OFF;")?;
    Ok(conn)
}

/// Uniqueness is kept by the importer, not by constraints. The foreign keys
/// are declarative only: the referenced ids are not unique, so enforcement
/// stays off on every connection.
pub fn create_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS categories (
            id   INTEGER,
            name TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_categories_name ON categories(name);

        CREATE TABLE IF NOT EXISTS category_listing (
            category_id INTEGER,
            page_id     INTEGER,
            FOREIGN KEY(category_id) REFERENCES categories(id),
            FOREIGN KEY(page_id) REFERENCES pages(id)
        );
        CREATE INDEX IF NOT EXISTS idx_listing_category ON category_listing(category_id);
        CREATE INDEX IF NOT EXISTS idx_listing_page ON category_listing(page_id);

        CREATE TABLE IF NOT EXISTS pages (
            id      INTEGER,
            title   TEXT,
            content TEXT
        );
        CREATE INDEX IF NOT EXISTS idx_pages_title ON pages(title);
        ",
    )?;
    Ok(())
}

// ── Writes ──

pub fn insert_page(conn: &Connection, page: &Page) -> Result<()> {
    let mut stmt =
        conn.prepare_cached("INSERT INTO pages (id, title, content) VALUES (?1, ?2, ?3)")?;
    stmt.execute(params![page.id, page.title, page.content])?;
    Ok(())
}

pub fn insert_category(conn: &Connection, category: &Category) -> Result<()> {
    let mut stmt = conn.prepare_cached("INSERT INTO categories (id, name) VALUES (?1, ?2)")?;
    stmt.execute(params![category.id, category.name])?;
    Ok(())
}

pub fn insert_listing(conn: &Connection, category_id: i64, page_id: i64) -> Result<()> {
    let mut stmt = conn.prepare_cached(
        "INSERT INTO category_listing (category_id, page_id) VALUES (?1, ?2)",
    )?;
    stmt.execute(params![category_id, page_id])?;
    Ok(())
}

/// Write every category and its listings in one transaction. Returns the edge count.
pub fn insert_categories(conn: &Connection, index: &CategoryIndex) -> Result<usize> {
    let tx = conn.unchecked_transaction()?;
    let mut edges = 0;
    for entry in index.entries() {
        insert_category(&tx, &entry.category)?;
        for page_id in &entry.page_ids {
            insert_listing(&tx, entry.category.id, *page_id)?;
            edges += 1;
        }
    }
    tx.commit()?;
    Ok(edges)
}

// ── Lookups ──

pub fn category_members(conn: &Connection, category: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT pages.title
         FROM pages
         JOIN category_listing ON category_listing.page_id = pages.id
         WHERE category_listing.category_id = (SELECT id FROM categories WHERE name = ?1)
         ORDER BY pages.id",
    )?;
    let rows = stmt
        .query_map([category], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

pub fn page_content(conn: &Connection, title: &str) -> Result<String> {
    conn.query_row(
        "SELECT content FROM pages WHERE title = ?1",
        [title],
        |row| row.get::<_, Option<String>>(0),
    )
    .optional()?
    .map(Option::unwrap_or_default)
    .ok_or_else(|| Error::not_found("page", title))
}

pub fn categories_for_page(conn: &Connection, title: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT categories.name
         FROM categories
         JOIN category_listing ON category_listing.category_id = categories.id
         WHERE category_listing.page_id = (SELECT id FROM pages WHERE title = ?1)
         ORDER BY categories.id",
    )?;
    let rows = stmt
        .query_map([title], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

pub fn category_exists(conn: &Connection, category: &str) -> Result<bool> {
    let found = conn
        .query_row(
            "SELECT 1 FROM categories WHERE name = ?1 LIMIT 1",
            [category],
            |_| Ok(()),
        )
        .optional()?;
    Ok(found.is_some())
}

/// Uniform sample of `n` titles without replacement (all titles if `n` exceeds the table).
pub fn sample_random_pages<R: Rng + ?Sized>(
    conn: &Connection,
    n: usize,
    rng: &mut R,
) -> Result<Vec<String>> {
    let mut stmt = conn.prepare("SELECT title FROM pages ORDER BY id")?;
    let mut titles = stmt
        .query_map([], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    let take = n.min(titles.len());
    let (picked, _) = titles.partial_shuffle(rng, take);
    Ok(picked.to_vec())
}

// ── Search ──

/// `LIKE` pattern for a user query: text without `%` becomes a substring match.
fn like_pattern(pattern: &str) -> String {
    if pattern.contains('%') {
        pattern.to_string()
    } else {
        format!("%{}%", pattern)
    }
}

pub fn search_all(conn: &Connection, pattern: &str) -> Result<Vec<String>> {
    let mut stmt =
        conn.prepare("SELECT title FROM pages WHERE content LIKE ?1 ORDER BY id")?;
    let rows = stmt
        .query_map([like_pattern(pattern)], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

pub fn search_category(conn: &Connection, category: &str, pattern: &str) -> Result<Vec<String>> {
    let mut stmt = conn.prepare(
        "SELECT pages.title
         FROM pages
         JOIN category_listing ON category_listing.page_id = pages.id
         WHERE category_listing.category_id = (SELECT id FROM categories WHERE name = ?1)
           AND pages.content LIKE ?2
         ORDER BY pages.id",
    )?;
    let rows = stmt
        .query_map(params![category, like_pattern(pattern)], |row| row.get(0))?
        .collect::<std::result::Result<Vec<String>, _>>()?;
    Ok(rows)
}

// ── Stats ──

pub struct StoreStats {
    pub pages: usize,
    pub categories: usize,
    pub listings: usize,
}

pub fn stats(conn: &Connection) -> Result<StoreStats> {
    let pages: usize = conn.query_row("SELECT COUNT(*) FROM pages", [], |r| r.get(0))?;
    let categories: usize =
        conn.query_row("SELECT COUNT(*) FROM categories", [], |r| r.get(0))?;
    let listings: usize =
        conn.query_row("SELECT COUNT(*) FROM category_listing", [], |r| r.get(0))?;
    Ok(StoreStats {
        pages,
        categories,
        listings,
    })
}
