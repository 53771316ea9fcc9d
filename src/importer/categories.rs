use std::collections::{HashMap, HashSet};
use std::sync::OnceLock;

use regex::Regex;

use crate::db::Category;
use crate::error::{Error, Result};

const CATEGORY_TAG_PATTERN: &str = r"\[\[Category:([^\]]+)\]\]";

/// Raw tag bodies (`Name|sortkey`) in the order they appear.
pub fn extract_tags(content: &str) -> impl Iterator<Item = &str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(CATEGORY_TAG_PATTERN).unwrap());
    re.captures_iter(content)
        .filter_map(|c| c.get(1))
        .map(|m| m.as_str())
}

/// Clean a raw tag body into a category name. `None` when nothing is left.
pub fn sanitize(raw: &str) -> Option<String> {
    let name = raw.split('|').next().unwrap_or_default();
    let name: String = name.chars().filter(|c| !is_control(*c)).collect();
    let name = name.trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

fn is_control(c: char) -> bool {
    matches!(c, '\u{00}'..='\u{1F}' | '\u{7F}'..='\u{9F}')
}

pub struct CategoryEntry {
    pub category: Category,
    /// Listed pages in first-seen order, no duplicates.
    pub page_ids: Vec<i64>,
    seen: HashSet<i64>,
}

/// Categories discovered during one import run, with their member pages.
///
/// Ids are handed out sequentially from 0 in first-seen order.
#[derive(Default)]
pub struct CategoryIndex {
    entries: Vec<CategoryEntry>,
    by_name: HashMap<String, usize>,
}

impl CategoryIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `name` if unseen and return its id.
    pub fn register(&mut self, name: &str) -> Result<i64> {
        if name.is_empty() {
            return Err(Error::parse("category name", "empty name"));
        }
        if name.contains('|') {
            return Err(Error::parse(
                format!("category {:?}", name),
                "name contains the listing delimiter '|'",
            ));
        }
        if let Some(&idx) = self.by_name.get(name) {
            return Ok(self.entries[idx].category.id);
        }
        let id = self.entries.len() as i64;
        self.by_name.insert(name.to_string(), self.entries.len());
        self.entries.push(CategoryEntry {
            category: Category {
                id,
                name: name.to_string(),
            },
            page_ids: Vec::new(),
            seen: HashSet::new(),
        });
        Ok(id)
    }

    /// Register `name` and list `page_id` under it. Repeated pairs are ignored.
    pub fn add_listing(&mut self, name: &str, page_id: i64) -> Result<i64> {
        let id = self.register(name)?;
        let entry = &mut self.entries[id as usize];
        if entry.seen.insert(page_id) {
            entry.page_ids.push(page_id);
        }
        Ok(id)
    }

    pub fn get(&self, name: &str) -> Option<&CategoryEntry> {
        self.by_name.get(name).map(|&idx| &self.entries[idx])
    }

    pub fn entries(&self) -> &[CategoryEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn listing_count(&self) -> usize {
        self.entries.iter().map(|e| e.page_ids.len()).sum()
    }
}
