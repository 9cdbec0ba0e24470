//! Loose date parsing for French and ISO date strings
//!
//! Job boards publish dates as "25 juin 2025", "Publiée le 1er août 2025",
//! "30/06/2025" or ISO timestamps. Everything here returns a
//! [`NaiveDate`]; callers that need a string use [`to_iso`].

use super::normalize::fold_accents;
use chrono::{DateTime, NaiveDate};
use regex::{Captures, Regex};
use std::sync::LazyLock;

/// Month names after accent folding, including common abbreviations
const FRENCH_MONTHS: &[(&str, u32)] = &[
    ("janvier", 1),
    ("janv", 1),
    ("fevrier", 2),
    ("fevr", 2),
    ("fev", 2),
    ("mars", 3),
    ("avril", 4),
    ("avr", 4),
    ("mai", 5),
    ("juin", 6),
    ("juillet", 7),
    ("juil", 7),
    ("aout", 8),
    ("septembre", 9),
    ("sept", 9),
    ("octobre", 10),
    ("oct", 10),
    ("novembre", 11),
    ("nov", 11),
    ("decembre", 12),
    ("dec", 12),
];

static LONG_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})(?:er)?\s+([a-z]+)\.?,?\s+(\d{4})\b").expect("valid regex")
});

static NUMERIC_DATE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d{1,2})[/.\-](\d{1,2})[/.\-](\d{4})\b").expect("valid regex")
});

static ISO_DATE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d{4})-(\d{2})-(\d{2})").expect("valid regex"));

fn build_date(year: &str, month: Option<u32>, day: &str) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year.parse().ok()?, month?, day.parse().ok()?)
}

/// Returns the byte offset and value of the first valid date matched by `re`
fn first_match<F>(re: &Regex, text: &str, build: F) -> Option<(usize, NaiveDate)>
where
    F: Fn(&Captures<'_>) -> Option<NaiveDate>,
{
    re.captures_iter(text).find_map(|caps| {
        let start = caps.get(0)?.start();
        build(&caps).map(|date| (start, date))
    })
}

fn month_number(name: &str) -> Option<u32> {
    FRENCH_MONTHS
        .iter()
        .find(|(month, _)| *month == name)
        .map(|(_, n)| *n)
}

/// Parses a French long-form date such as "25 juin 2025" or "1er août 2025"
///
/// The date may be surrounded by other words ("Publiée le ...").
///
/// # Example
///
/// ```
/// use offer_harvester::text::parse_french_long_date;
/// use chrono::NaiveDate;
///
/// assert_eq!(
///     parse_french_long_date("Publiée le 1er août 2025"),
///     NaiveDate::from_ymd_opt(2025, 8, 1)
/// );
/// ```
pub fn parse_french_long_date(raw: &str) -> Option<NaiveDate> {
    let folded = fold_accents(raw);
    first_match(&LONG_DATE_RE, &folded, |caps| {
        build_date(&caps[3], month_number(&caps[2]), &caps[1])
    })
    .map(|(_, date)| date)
}

/// Finds the first date-shaped token anywhere in free text
///
/// Recognizes ISO (`2025-06-30`), day-first numeric (`30/06/2025`,
/// `30-06-2025`, `30.06.2025`) and French long forms. When several tokens
/// are present the left-most valid one wins.
pub fn find_date_token(text: &str) -> Option<NaiveDate> {
    let folded = fold_accents(text);
    let candidates = [
        first_match(&ISO_DATE_RE, &folded, |caps| {
            build_date(&caps[1], caps[2].parse().ok(), &caps[3])
        }),
        first_match(&NUMERIC_DATE_RE, &folded, |caps| {
            build_date(&caps[3], caps[2].parse().ok(), &caps[1])
        }),
        first_match(&LONG_DATE_RE, &folded, |caps| {
            build_date(&caps[3], month_number(&caps[2]), &caps[1])
        }),
    ];

    candidates
        .into_iter()
        .flatten()
        .min_by_key(|(pos, _)| *pos)
        .map(|(_, date)| date)
}

/// Parses a date string in any of the supported shapes
///
/// RFC 3339 timestamps and strings starting with an ISO date are tried
/// first, then [`find_date_token`] over the whole string.
///
/// # Example
///
/// ```
/// use offer_harvester::text::parse_date_loose;
/// use chrono::NaiveDate;
///
/// let expected = NaiveDate::from_ymd_opt(2025, 6, 25);
/// assert_eq!(parse_date_loose("2025-06-25T08:00:00+00:00"), expected);
/// assert_eq!(parse_date_loose("25/06/2025"), expected);
/// assert_eq!(parse_date_loose("25 juin 2025"), expected);
/// assert_eq!(parse_date_loose("il y a 3 jours"), None);
/// ```
pub fn parse_date_loose(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
        return Some(dt.date_naive());
    }

    if let Some(prefix) = trimmed.get(..10) {
        if let Ok(date) = NaiveDate::parse_from_str(prefix, "%Y-%m-%d") {
            return Some(date);
        }
    }

    find_date_token(trimmed)
}

/// Formats a date as `YYYY-MM-DD`
pub fn to_iso(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ymd(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_french_long_date() {
        assert_eq!(parse_french_long_date("25 juin 2025"), Some(ymd(2025, 6, 25)));
        assert_eq!(parse_french_long_date("3 Décembre 2024"), Some(ymd(2024, 12, 3)));
        assert_eq!(parse_french_long_date("12 fevrier 2025"), Some(ymd(2025, 2, 12)));
        assert_eq!(parse_french_long_date("5 sept. 2025"), Some(ymd(2025, 9, 5)));
    }

    #[test]
    fn test_french_long_date_rejects_unknown_month() {
        assert_eq!(parse_french_long_date("25 junio 2025"), None);
        assert_eq!(parse_french_long_date("31 fevrier 2025"), None);
    }

    #[test]
    fn test_numeric_dates_are_day_first() {
        assert_eq!(parse_date_loose("05/07/2025"), Some(ymd(2025, 7, 5)));
        assert_eq!(parse_date_loose("05-07-2025"), Some(ymd(2025, 7, 5)));
        assert_eq!(parse_date_loose("05.07.2025"), Some(ymd(2025, 7, 5)));
    }

    #[test]
    fn test_iso_prefix() {
        assert_eq!(parse_date_loose("2025-06-30 12:00"), Some(ymd(2025, 6, 30)));
    }

    #[test]
    fn test_find_date_token_leftmost_wins() {
        let text = "Date limite : 15/07/2025. Prise de poste le 1er septembre 2025.";
        assert_eq!(find_date_token(text), Some(ymd(2025, 7, 15)));

        let text = "Prise de poste le 1er septembre 2025, dossier avant 15/07/2025";
        assert_eq!(find_date_token(text), Some(ymd(2025, 9, 1)));
    }

    #[test]
    fn test_find_date_token_none() {
        assert_eq!(find_date_token("Aucune date ici, 2025 postes"), None);
    }

    #[test]
    fn test_to_iso() {
        assert_eq!(to_iso(ymd(2025, 1, 2)), "2025-01-02");
    }
}
