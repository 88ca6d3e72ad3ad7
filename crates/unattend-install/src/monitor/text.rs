//! Progress parsing from control text and window titles.

use std::sync::LazyLock;

use regex::Regex;

static PERCENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{1,3}(?:[.,]\d+)?)\s*%").expect("percent regex is valid"));
static N_OF_M: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)\b(\d+)\s+of\s+(\d+)\b").expect("n-of-m regex is valid"));
static BRACKETED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[\s*(\d{1,3})\s*\]").expect("bracket regex is valid"));
static FRACTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b(\d+)\s*/\s*(\d+)\b").expect("fraction regex is valid"));

/// `N%` anywhere in `text`, if `N` is a plausible percentage.
pub fn parse_percent(text: &str) -> Option<f64> {
    PERCENT.captures_iter(text).find_map(|caps| {
        let value: f64 = caps[1].replace(',', ".").parse().ok()?;
        (0.0..=100.0).contains(&value).then_some(value)
    })
}

fn ratio(n: &str, m: &str) -> Option<f64> {
    let n: f64 = n.parse().ok()?;
    let m: f64 = m.parse().ok()?;
    (m > 0.0 && n <= m).then(|| n / m * 100.0)
}

/// Any of the recognised progress notations: `N%`, `N of M`, `[N]`, `N/M`.
pub fn parse_progress_text(text: &str) -> Option<f64> {
    if let Some(value) = parse_percent(text) {
        return Some(value);
    }
    if let Some(value) = N_OF_M
        .captures_iter(text)
        .find_map(|caps| ratio(&caps[1], &caps[2]))
    {
        return Some(value);
    }
    if let Some(value) = BRACKETED.captures_iter(text).find_map(|caps| {
        let value: f64 = caps[1].parse().ok()?;
        (value <= 100.0).then_some(value)
    }) {
        return Some(value);
    }
    FRACTION
        .captures_iter(text)
        .find_map(|caps| ratio(&caps[1], &caps[2]))
}
