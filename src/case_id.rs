//! Case reference extraction from test titles.
//!
//! A reference is a capital `C` followed by digits, standing as its own word: the title
//! `"Login succeeds C123"` references case 123.

use regex::Regex;
use std::sync::OnceLock;

static CASE_REF: OnceLock<Regex> = OnceLock::new();

fn case_ref() -> &'static Regex {
    CASE_REF.get_or_init(|| Regex::new(r"\bC([0-9]+)\b").expect("case reference pattern is valid"))
}

/// Every case id referenced in `title`, left to right, duplicates included.
pub fn extract_case_ids(title: &str) -> Vec<u64> {
    case_ref()
        .captures_iter(title)
        .filter_map(|c| c[1].parse::<u64>().ok())
        .filter(|&id| id > 0)
        .collect()
}
