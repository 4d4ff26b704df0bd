//! Cost reporting windows from operator text.
//!
//! Recognized forms, first match wins:
//!
//! - month ranges: "jan to mar", "February - April"
//! - relative: "last 3 months", "past 6 months"
//! - quarters: "Q2", "quarter 3", "2nd quarter" (this year)
//! - "last year" / "previous year", "this year" / "current year"
//! - a bare year: "2024"
//!
//! Anything else is the current month to date. All ranges are inclusive.

use std::sync::LazyLock;

use chrono::{Datelike, Duration, Months, NaiveDate};
use regex::Regex;

const MONTHS: &str = "january|february|march|april|may|june|july|august|september|october|november|december|jan|feb|mar|apr|jun|jul|aug|sept|sep|oct|nov|dec";

static MONTH_RANGE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(&format!(
        r"(?i)\b({MONTHS})\s*(?:to|through|until|-|~)\s*({MONTHS})\b"
    ))
    .unwrap()
});

static RELATIVE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(?:last|past|previous)\s+(\d{1,3})\s+months?\b").unwrap());

static QUARTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(?:q|quarter)\s*([1-4])\b|\b([1-4])(?:st|nd|rd|th)\s+quarter\b").unwrap()
});

static YEAR_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b(20\d{2})\b").unwrap());

/// An inclusive date window with a label for the operator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CostPeriod {
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub label: String,
}

impl CostPeriod {
    pub fn new(start: NaiveDate, end: NaiveDate, label: impl Into<String>) -> Self {
        Self {
            start,
            end,
            label: label.into(),
        }
    }

    /// Number of days covered, both ends included.
    pub fn days(&self) -> i64 {
        (self.end - self.start).num_days() + 1
    }

    /// The window of the same length ending the day before `start`.
    pub fn previous_period(&self) -> CostPeriod {
        let end = self.start - Duration::days(1);
        let start = end - Duration::days(self.days() - 1);
        CostPeriod::new(start, end, format!("previous {} days", self.days()))
    }
}

/// Extract a reporting window from `text`, relative to `today`.
pub fn extract_period(text: &str, today: NaiveDate) -> CostPeriod {
    month_range(text, today)
        .or_else(|| relative_months(text, today))
        .or_else(|| quarter(text, today))
        .or_else(|| named_year(text, today))
        .or_else(|| bare_year(text, today))
        .unwrap_or_else(|| month_to_date(today))
}

fn month_number(name: &str) -> Option<u32> {
    let prefix: String = name.to_ascii_lowercase().chars().take(3).collect();
    let n = match prefix.as_str() {
        "jan" => 1,
        "feb" => 2,
        "mar" => 3,
        "apr" => 4,
        "may" => 5,
        "jun" => 6,
        "jul" => 7,
        "aug" => 8,
        "sep" => 9,
        "oct" => 10,
        "nov" => 11,
        "dec" => 12,
        _ => return None,
    };
    Some(n)
}

fn last_day_of_month(year: i32, month: u32) -> Option<NaiveDate> {
    NaiveDate::from_ymd_opt(year, month, 1)?
        .checked_add_months(Months::new(1))?
        .pred_opt()
}

fn capitalize(word: &str) -> String {
    let lower = word.to_ascii_lowercase();
    let mut chars = lower.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

fn month_range(text: &str, today: NaiveDate) -> Option<CostPeriod> {
    let caps = MONTH_RANGE_RE.captures(text)?;
    let (from, to) = (caps.get(1)?.as_str(), caps.get(2)?.as_str());
    let start_month = month_number(from)?;
    let end_month = month_number(to)?;

    // A range ending before the current month refers to last year.
    let end_year = if end_month < today.month() {
        today.year() - 1
    } else {
        today.year()
    };
    // "nov to feb" wraps the year boundary.
    let start_year = if start_month > end_month {
        end_year - 1
    } else {
        end_year
    };

    Some(CostPeriod::new(
        NaiveDate::from_ymd_opt(start_year, start_month, 1)?,
        last_day_of_month(end_year, end_month)?,
        format!("{} to {}", capitalize(from), capitalize(to)),
    ))
}

fn relative_months(text: &str, today: NaiveDate) -> Option<CostPeriod> {
    let caps = RELATIVE_RE.captures(text)?;
    let months: u32 = caps.get(1)?.as_str().parse().ok()?;
    if months == 0 {
        return None;
    }
    let start = today.checked_sub_months(Months::new(months))?;
    Some(CostPeriod::new(start, today, format!("Last {months} months")))
}

fn quarter(text: &str, today: NaiveDate) -> Option<CostPeriod> {
    let caps = QUARTER_RE.captures(text)?;
    let q: u32 = caps
        .get(1)
        .or_else(|| caps.get(2))?
        .as_str()
        .parse()
        .ok()?;
    let year = today.year();
    let start_month = (q - 1) * 3 + 1;
    Some(CostPeriod::new(
        NaiveDate::from_ymd_opt(year, start_month, 1)?,
        last_day_of_month(year, q * 3)?,
        format!("Q{q} {year}"),
    ))
}

fn named_year(text: &str, today: NaiveDate) -> Option<CostPeriod> {
    let lower = text.to_ascii_lowercase();
    if lower.contains("last year") || lower.contains("previous year") {
        let year = today.year() - 1;
        return Some(CostPeriod::new(
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            NaiveDate::from_ymd_opt(year, 12, 31)?,
            year.to_string(),
        ));
    }
    if lower.contains("this year") || lower.contains("current year") {
        let year = today.year();
        return Some(CostPeriod::new(
            NaiveDate::from_ymd_opt(year, 1, 1)?,
            today,
            format!("{year} (so far)"),
        ));
    }
    None
}

fn bare_year(text: &str, today: NaiveDate) -> Option<CostPeriod> {
    let caps = YEAR_RE.captures(text)?;
    let year: i32 = caps.get(1)?.as_str().parse().ok()?;
    if year > today.year() {
        return None;
    }
    let end = if year < today.year() {
        NaiveDate::from_ymd_opt(year, 12, 31)?
    } else {
        today
    };
    Some(CostPeriod::new(
        NaiveDate::from_ymd_opt(year, 1, 1)?,
        end,
        year.to_string(),
    ))
}

fn month_to_date(today: NaiveDate) -> CostPeriod {
    CostPeriod::new(today.with_day(1).unwrap_or(today), today, "This month")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    const TODAY: (i32, u32, u32) = (2025, 6, 15);

    fn today() -> NaiveDate {
        date(TODAY.0, TODAY.1, TODAY.2)
    }

    #[test]
    fn month_range_this_year() {
        let p = extract_period("cost from jun to aug", today());
        assert_eq!(p.start, date(2025, 6, 1));
        assert_eq!(p.end, date(2025, 8, 31));
        assert_eq!(p.label, "Jun to Aug");
    }

    #[test]
    fn month_range_already_past_is_last_year() {
        let p = extract_period("billing January to March", today());
        assert_eq!(p.start, date(2024, 1, 1));
        assert_eq!(p.end, date(2024, 3, 31));
    }

    #[test]
    fn month_range_wrapping_year_end() {
        let p = extract_period("spend nov - feb", today());
        assert_eq!(p.start, date(2023, 11, 1));
        assert_eq!(p.end, date(2024, 2, 29));
    }

    #[test]
    fn relative_months() {
        let p = extract_period("what did we spend in the past 3 months?", today());
        assert_eq!(p.start, date(2025, 3, 15));
        assert_eq!(p.end, today());
        assert_eq!(p.label, "Last 3 months");
    }

    #[test]
    fn quarters() {
        let p = extract_period("Q2 cost", today());
        assert_eq!((p.start, p.end), (date(2025, 4, 1), date(2025, 6, 30)));
        let p = extract_period("cost for the 3rd quarter", today());
        assert_eq!((p.start, p.end), (date(2025, 7, 1), date(2025, 9, 30)));
        assert_eq!(p.label, "Q3 2025");
    }

    #[test]
    fn named_years() {
        let p = extract_period("show last year's bill", today());
        assert_eq!((p.start, p.end), (date(2024, 1, 1), date(2024, 12, 31)));
        let p = extract_period("cost this year", today());
        assert_eq!((p.start, p.end), (date(2025, 1, 1), today()));
    }

    #[test]
    fn bare_year() {
        let p = extract_period("billing for 2023", today());
        assert_eq!((p.start, p.end), (date(2023, 1, 1), date(2023, 12, 31)));
        let p = extract_period("billing for 2025", today());
        assert_eq!(p.end, today());
    }

    #[test]
    fn default_is_month_to_date() {
        let p = extract_period("how much are we spending", today());
        assert_eq!((p.start, p.end), (date(2025, 6, 1), today()));
        assert_eq!(p.label, "This month");
    }

    #[test]
    fn previous_period_has_equal_length() {
        let p = CostPeriod::new(date(2025, 6, 1), date(2025, 6, 15), "x");
        let prev = p.previous_period();
        assert_eq!(prev.end, date(2025, 5, 31));
        assert_eq!(prev.start, date(2025, 5, 17));
        assert_eq!(prev.days(), p.days());
    }
}
