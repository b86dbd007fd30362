use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;
use tracing::debug;

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static NUMERIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:\w+\s+)?\d{1,2}[/-]\d{1,2}[/-]\d{4}$").unwrap());
static EU_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:\w+\s+)?\d{{1,2}}\s+(?:{MONTHS})\s+\d{{4}}$")).unwrap()
});
static US_TEXT_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(r"^(?:\w+\s+)?(?:{MONTHS})\s+\d{{1,2}}\s+\d{{4}}$")).unwrap()
});

const MONTH_NAMES: [&str; 12] = [
    "january", "february", "march", "april", "may", "june",
    "july", "august", "september", "october", "november", "december",
];
const WEEKDAY_NAMES: [&str; 7] = [
    "monday", "tuesday", "wednesday", "thursday", "friday", "saturday", "sunday",
];
const FILLER_WORDS: &[&str] = &["of", "the", "on"];

/// Whole-line check for the three date layouts a diary uses as block headers:
/// `13/07/2020`, `13 July 2020` and `July 13 2020`, each optionally preceded by
/// one word (usually the weekday).
///
/// Only decides whether the line is worth parsing; the calendar value comes
/// from [`parse_flexible_date`].
pub fn is_date_line(line: &str) -> bool {
    let line = line.trim();
    NUMERIC_RE.is_match(line) || EU_TEXT_RE.is_match(line) || US_TEXT_RE.is_match(line)
}

type Strategy = fn(&str, bool) -> Option<NaiveDate>;

/// Tried in order, first success wins.
const STRATEGIES: &[(&str, Strategy)] = &[
    ("weekday d/m/Y", parse_weekday_numeric),
    ("weekday d Month Y", parse_weekday_textual),
    ("lenient", parse_lenient),
];

/// Turn a date string into a calendar date, or `None` when no strategy accepts it.
///
/// `dayfirst` only matters for the lenient fallback, where it decides whether
/// `03/04/2020` is the 3rd of April (EU) or the 4th of March (US).
pub fn parse_flexible_date(date_str: &str, dayfirst: bool) -> Option<NaiveDate> {
    let s = date_str.trim();
    for (name, strategy) in STRATEGIES {
        if let Some(date) = strategy(s, dayfirst) {
            debug!(input = s, strategy = name, %date, "parsed date");
            return Some(date);
        }
    }
    debug!(input = s, dayfirst, "could not parse date");
    None
}

fn parse_weekday_numeric(s: &str, _dayfirst: bool) -> Option<NaiveDate> {
    after_weekday(s).and_then(|rest| NaiveDate::parse_from_str(rest, "%d/%m/%Y").ok())
}

fn parse_weekday_textual(s: &str, _dayfirst: bool) -> Option<NaiveDate> {
    after_weekday(s).and_then(|rest| NaiveDate::parse_from_str(rest, "%d %B %Y").ok())
}

/// The text after a leading weekday name. The name has to be a weekday but
/// need not agree with the date that follows it.
fn after_weekday(s: &str) -> Option<&str> {
    let (word, rest) = s.split_once(char::is_whitespace)?;
    is_weekday(&word.to_lowercase()).then(|| rest.trim_start())
}

// ── Lenient fallback ──

#[derive(Debug, Clone, Copy)]
struct Number {
    value: u32,
    width: usize,
}

impl Number {
    fn parse(digits: &str) -> Option<Self> {
        if digits.is_empty() || digits.len() > 4 || !digits.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        Some(Number {
            value: digits.parse().ok()?,
            width: digits.len(),
        })
    }

    fn is_year(self) -> bool {
        self.width == 4 || self.value > 31
    }

    /// Two-digit years pivot at 69, as POSIX `%y` does.
    fn full_year(self) -> i32 {
        let v = self.value as i32;
        match self.width {
            1 | 2 if v < 69 => 2000 + v,
            1 | 2 => 1900 + v,
            _ => v,
        }
    }
}

fn parse_lenient(s: &str, dayfirst: bool) -> Option<NaiveDate> {
    let mut numbers: Vec<Number> = Vec::new();
    let mut month: Option<u32> = None;

    let tokens = s
        .split(|c: char| c.is_whitespace() || matches!(c, '/' | '-' | '.' | ','))
        .filter(|t| !t.is_empty());

    for token in tokens {
        if let Some(n) = Number::parse(token).or_else(|| strip_ordinal(token)) {
            numbers.push(n);
            continue;
        }
        let lower = token.to_lowercase();
        if let Some(m) = month_number(&lower) {
            if month.replace(m).is_some() {
                return None;
            }
            continue;
        }
        if is_weekday(&lower) || FILLER_WORDS.contains(&lower.as_str()) || is_clock_time(token) {
            continue;
        }
        return None;
    }

    let (year, month, day) = match (month, numbers.as_slice()) {
        (None, &[a, b, c]) => resolve_numeric(a, b, c, dayfirst)?,
        (Some(m), &[a, b]) => {
            let (day, year) = if !a.is_year() && b.is_year() {
                (a, b)
            } else if a.is_year() && !b.is_year() {
                (b, a)
            } else {
                (a, b)
            };
            (year.full_year(), m, day.value)
        }
        _ => return None,
    };

    NaiveDate::from_ymd_opt(year, month, day)
}

fn resolve_numeric(a: Number, b: Number, c: Number, dayfirst: bool) -> Option<(i32, u32, u32)> {
    if a.is_year() {
        // ISO order; a middle value over 12 can only be the day.
        let (m, d) = if b.value > 12 { (c, b) } else { (b, c) };
        return Some((a.full_year(), m.value, d.value));
    }
    let (mut day, mut month) = if dayfirst { (a, b) } else { (b, a) };
    if month.value > 12 {
        std::mem::swap(&mut day, &mut month);
    }
    Some((c.full_year(), month.value, day.value))
}

fn strip_ordinal(token: &str) -> Option<Number> {
    let lower = token.to_ascii_lowercase();
    ["st", "nd", "rd", "th"]
        .iter()
        .find_map(|suffix| lower.strip_suffix(suffix))
        .filter(|digits| digits.len() <= 2)
        .and_then(Number::parse)
}

fn month_number(lower: &str) -> Option<u32> {
    MONTH_NAMES
        .iter()
        .position(|m| *m == lower || (lower.len() == 3 && m.starts_with(lower)))
        .or_else(|| (lower == "sept").then_some(8))
        .map(|i| i as u32 + 1)
}

fn is_weekday(lower: &str) -> bool {
    WEEKDAY_NAMES
        .iter()
        .any(|d| *d == lower || (lower.len() == 3 && d.starts_with(lower)))
}

fn is_clock_time(token: &str) -> bool {
    let parts: Vec<&str> = token.split(':').collect();
    (2..=3).contains(&parts.len())
        && parts
            .iter()
            .all(|p| (1..=2).contains(&p.len()) && p.bytes().all(|b| b.is_ascii_digit()))
}
