use std::collections::HashSet;
use std::sync::OnceLock;

use regex::Regex;

use crate::db::Page;

/// English stopwords, matched exactly (case-sensitive).
const STOPWORDS: &[&str] = &[
    "i", "me", "my", "myself", "we", "our", "ours", "ourselves", "you", "you're", "you've",
    "you'll", "you'd", "your", "yours", "yourself", "yourselves", "he", "him", "his",
    "himself", "she", "she's", "her", "hers", "herself", "it", "it's", "its", "itself",
    "they", "them", "their", "theirs", "themselves", "what", "which", "who", "whom", "this",
    "that", "that'll", "these", "those", "am", "is", "are", "was", "were", "be", "been",
    "being", "have", "has", "had", "having", "do", "does", "did", "doing", "a", "an", "the",
    "and", "but", "if", "or", "because", "as", "until", "while", "of", "at", "by", "for",
    "with", "about", "against", "between", "into", "through", "during", "before", "after",
    "above", "below", "to", "from", "up", "down", "in", "out", "on", "off", "over", "under",
    "again", "further", "then", "once", "here", "there", "when", "where", "why", "how", "all",
    "any", "both", "each", "few", "more", "most", "other", "some", "such", "no", "nor", "not",
    "only", "own", "same", "so", "than", "too", "very", "s", "t", "can", "will", "just", "don",
    "don't", "should", "should've", "now", "d", "ll", "m", "o", "re", "ve", "y", "ain",
    "aren", "aren't", "couldn", "couldn't", "didn", "didn't", "doesn", "doesn't", "hadn",
    "hadn't", "hasn", "hasn't", "haven", "haven't", "isn", "isn't", "ma", "mightn",
    "mightn't", "mustn", "mustn't", "needn", "needn't", "shan", "shan't", "shouldn",
    "shouldn't", "wasn", "wasn't", "weren", "weren't", "won", "won't", "wouldn", "wouldn't",
];

fn stopwords() -> &'static HashSet<&'static str> {
    static SET: OnceLock<HashSet<&'static str>> = OnceLock::new();
    SET.get_or_init(|| STOPWORDS.iter().copied().collect())
}

/// Words are runs of word characters; each run of other non-space characters
/// is a token of its own.
pub fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    static RE: OnceLock<Regex> = OnceLock::new();
    let re = RE.get_or_init(|| Regex::new(r"\w+|[^\w\s]+").unwrap());
    re.find_iter(text).map(|m| m.as_str())
}

pub fn strip_stopwords(text: &str) -> String {
    let stop = stopwords();
    tokenize(text)
        .filter(|t| !stop.contains(t))
        .collect::<Vec<_>>()
        .join(" ")
}

pub fn strip_punctuation(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_punctuation()).collect()
}

pub fn strip_digits(text: &str) -> String {
    text.chars().filter(|c| !c.is_ascii_digit()).collect()
}

/// Stopwords out, then punctuation, then digits. The order is part of the
/// contract: `"3rd"` survives stopword removal and comes out as `"rd"`.
pub fn normalize(text: &str) -> String {
    let text = strip_stopwords(text);
    let text = strip_punctuation(&text);
    strip_digits(&text)
}

/// Token count of already-normalized text, as seen by the sequence tokenizer.
pub fn token_count(text: &str) -> usize {
    text.split_whitespace().count()
}

#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedDocument {
    pub source_title: String,
    pub text: String,
}

impl NormalizedDocument {
    pub fn new(title: impl Into<String>, content: &str) -> Self {
        NormalizedDocument {
            source_title: title.into(),
            text: normalize(content),
        }
    }

    pub fn from_page(page: &Page) -> Self {
        Self::new(page.title.clone(), &page.content)
    }
}
