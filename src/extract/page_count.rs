//! Best-effort page-count discovery from page 1.
//!
//! The viewer does not publish a machine-readable count; these patterns
//! were observed on the source and may mis-parse. A miss, or a count of 1,
//! yields `PageCount::Unknown` so the page loop keeps probing.

use std::sync::LazyLock;

use regex::Regex;

use crate::models::PageCount;

/// "(123 pages)" as it appears in manual titles.
static TITLE_PAGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\((\d+)\s*pages?\)").expect("title pages pattern should compile")
});

/// "123 pages" anywhere in text.
static N_PAGES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\b(\d+)\s*pages?\b").expect("pages pattern should compile")
});

/// "1 / 123" pagination widget text.
static PAGE_OF_TOTAL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"\b(\d+)\s*/\s*(\d+)\b").expect("page of total pattern should compile")
});

/// Derive the declared page count, checking the indicator, then the
/// title, then the body. Counts above `max_pages` are clamped; a single
/// page is indistinguishable from a stray "1 page" match and stays unknown.
pub fn parse_page_count(
    indicator: Option<&str>,
    title: &str,
    body: &str,
    max_pages: u32,
) -> PageCount {
    let found = indicator
        .and_then(|text| page_of_total(text).or_else(|| n_pages(text)))
        .or_else(|| first_capture(&TITLE_PAGES, title))
        .or_else(|| n_pages(title))
        .or_else(|| n_pages(body))
        .or_else(|| page_of_total(body));

    match found {
        Some(n) if n > 1 => PageCount::Declared(n.min(max_pages.max(1))),
        _ => PageCount::Unknown,
    }
}

fn n_pages(text: &str) -> Option<u32> {
    first_capture(&N_PAGES, text)
}

fn first_capture(re: &Regex, text: &str) -> Option<u32> {
    re.captures_iter(text)
        .filter_map(|caps| caps.get(1)?.as_str().parse::<u32>().ok())
        .find(|n| *n > 0)
}

/// "X / N" only counts when X is a plausible current page of N.
fn page_of_total(text: &str) -> Option<u32> {
    PAGE_OF_TOTAL
        .captures_iter(text)
        .filter_map(|caps| {
            let current = caps.get(1)?.as_str().parse::<u32>().ok()?;
            let total = caps.get(2)?.as_str().parse::<u32>().ok()?;
            (current >= 1 && current <= total).then_some(total)
        })
        .next()
}
