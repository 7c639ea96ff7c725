//! Scraper for wiki pages listing codes in an "Active" table.
//!
//! The page layout is expected to be a heading (or table caption) containing
//! the word "Active" followed by a table whose rows read
//! `status | code | date | occasion | rewards`. When no row can be parsed the
//! scraper falls back to the bold alphanumeric tokens of the section.

use std::{collections::HashSet, sync::LazyLock};

use chrono::{NaiveDate, TimeZone, Utc};
use log::{debug, warn};
use regex::Regex;

use crate::codes::structs::{GameCode, cap_reward_text};

const CODE_CELL: usize = 1;
const DATE_CELL: usize = 2;
const REWARD_CELL: usize = 4;
/// Section length used when no closing heading follows the active one.
const SECTION_FALLBACK_LEN: usize = 10_000;
const MIN_CODE_LEN: usize = 4;
const STOPWORDS: [&str; 5] = ["ACTIVE", "LEGACY", "SERVER", "GLOBAL", "REWARDS"];

static HEADING: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?is)<(?:h[1-6]|caption)\b[^>]*>(.*?)</(?:h[1-6]|caption)>").unwrap()
});
static ACTIVE_WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?i)\bactive\b").unwrap());
static CLOSING_WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:legacy|expired|inactive)\b").unwrap());
static ROW: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<tr\b[^>]*>(.*?)</tr>").unwrap());
static CELL: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<td\b[^>]*>(.*?)</td>").unwrap());
static BOLD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?is)<b\b[^>]*>(.*?)</b>").unwrap());
static BOLD_TOKEN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)<b>\s*([A-Za-z0-9]{6,25})\s*</b>").unwrap());
static TAG: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"(?s)<[^>]*>").unwrap());
static SPACES: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());
static ALPHANUMERIC: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z0-9]+$").unwrap());

/// Extracts the active codes of a wiki page.
///
/// Returns an empty list when the page has no "Active" section.
///
/// # Arguments
///
/// * `html` - The page source
/// * `source_label` - Name stamped on every returned code
pub fn scrape_codes(html: &str, source_label: &str) -> Vec<GameCode> {
    let Some(section) = active_section(html) else {
        warn!("{}: no active codes section found", source_label);
        return vec![];
    };

    let mut codes = parse_table(section);
    if codes.is_empty() {
        debug!("{}: table parsing found nothing, using bold text", source_label);
        codes = parse_bold_tokens(section);
    }

    codes
        .into_iter()
        .map(|code| code.with_source(source_label))
        .collect()
}

/// Slice of `html` between the "Active" heading and the next closing heading.
fn active_section(html: &str) -> Option<&str> {
    let start = HEADING
        .captures_iter(html)
        .find(|captures| ACTIVE_WORD.is_match(&strip_tags(&captures[1])))?
        .get(0)?;

    let end = HEADING
        .captures_iter(&html[start.end()..])
        .find(|captures| CLOSING_WORD.is_match(&strip_tags(&captures[1])))
        .and_then(|captures| captures.get(0))
        .map(|closing| start.end() + closing.start())
        .unwrap_or_else(|| floor_char_boundary(html, start.start() + SECTION_FALLBACK_LEN));

    Some(&html[start.start()..end])
}

fn parse_table(section: &str) -> Vec<GameCode> {
    let mut seen = HashSet::new();
    let mut codes = vec![];

    for row in ROW.captures_iter(section) {
        let cells: Vec<&str> = CELL
            .captures_iter(&row[1])
            .filter_map(|captures| captures.get(1).map(|cell| cell.as_str()))
            .collect();

        let Some(code) = cells.get(CODE_CELL).and_then(|cell| code_from_cell(cell)) else {
            continue;
        };
        if !seen.insert(code.clone()) {
            continue;
        }

        let reward = cells.get(REWARD_CELL).map(|cell| reward_from_cell(cell));
        let sort_key = cells
            .get(DATE_CELL)
            .and_then(|cell| parse_date(&strip_tags(cell)))
            .unwrap_or(0);

        codes.push(GameCode::new(&code, reward.as_deref(), sort_key));
    }

    codes
}

fn parse_bold_tokens(section: &str) -> Vec<GameCode> {
    let mut seen = HashSet::new();

    BOLD_TOKEN
        .captures_iter(section)
        .map(|captures| captures[1].to_uppercase())
        .filter(|token| !STOPWORDS.contains(&token.as_str()))
        .filter(|token| seen.insert(token.clone()))
        .map(|token| GameCode::new(&token, None, 0))
        .collect()
}

/// Code of a row, taken from its bold text when present.
fn code_from_cell(cell: &str) -> Option<String> {
    let text = match BOLD.captures(cell) {
        Some(captures) => strip_tags(&captures[1]),
        None => strip_tags(cell),
    };

    (text.len() >= MIN_CODE_LEN && ALPHANUMERIC.is_match(&text)).then(|| text.to_uppercase())
}

/// Reward items of a row, the bold segments joined when the cell has some.
fn reward_from_cell(cell: &str) -> String {
    let cell = cap_reward_text(cell);
    let items: Vec<String> = BOLD
        .captures_iter(&cell)
        .map(|captures| strip_tags(&captures[1]))
        .filter(|item| !item.is_empty())
        .collect();

    if items.is_empty() {
        strip_tags(&cell)
    } else {
        items.join(", ")
    }
}

/// Removes markup, decodes the common entities and collapses whitespace.
fn strip_tags(fragment: &str) -> String {
    let text = TAG.replace_all(fragment, " ");
    let text = text
        .replace("&nbsp;", " ")
        .replace("&#160;", " ")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&amp;", "&");

    SPACES.replace_all(&text, " ").trim().to_string()
}

/// Date column to a UTC timestamp, for ordering only.
fn parse_date(text: &str) -> Option<u64> {
    // Wikis often suffix the date with an annotation such as "(Expired)".
    let text = text.split('(').next()?.trim();

    ["%Y-%m-%d", "%B %d, %Y", "%b %d, %Y", "%d %B %Y", "%d %b %Y"]
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(text, format).ok())
        .and_then(|date| date.and_hms_opt(0, 0, 0))
        .map(|datetime| Utc.from_utc_datetime(&datetime).timestamp())
        .and_then(|timestamp| u64::try_from(timestamp).ok())
}

fn floor_char_boundary(text: &str, index: usize) -> usize {
    if index >= text.len() {
        return text.len();
    }
    (0..=index)
        .rev()
        .find(|i| text.is_char_boundary(*i))
        .unwrap_or(0)
}
