//! Field-level extraction machinery shared by the DOM-scraping platforms.
//!
//! A field is filled by an ordered list of named strategies; the first
//! strategy that produces a value wins and the rest never run. Already
//! populated fields are never overwritten by a later `None`, and view
//! counts seen from two sources prefer the non-zero candidate.

use scraper::{Html, Selector};
use serde_json::Value;
use tracing::debug;

use crate::normalize::parse_magnitude;

/// A named fallback step for one field.
pub struct Strategy<D: ?Sized, T> {
    pub name: &'static str,
    pub run: fn(&D) -> Option<T>,
}

/// Apply strategies in order; first hit wins.
pub fn first_hit<D: ?Sized, T>(field: &str, doc: &D, strategies: &[Strategy<D, T>]) -> Option<T> {
    for strategy in strategies {
        if let Some(value) = (strategy.run)(doc) {
            debug!(field, strategy = strategy.name, "field resolved");
            return Some(value);
        }
    }
    debug!(field, "no strategy matched");
    None
}

/// Fill `slot` only when it is still empty.
pub fn merge_missing<T>(slot: &mut Option<T>, candidate: Option<T>) {
    if slot.is_none() {
        *slot = candidate;
    }
}

/// Combine two view-count observations, preferring the non-zero one.
/// Zero survives only when no source reported a positive count.
pub fn prefer_nonzero(a: Option<i64>, b: Option<i64>) -> Option<i64> {
    match (a, b) {
        (Some(0), Some(x)) if x != 0 => Some(x),
        (Some(x), _) => Some(x),
        (None, other) => other,
    }
}

/// Read an integer out of a JSON node that may be a number or an
/// abbreviated string ("1.2M"). Null and absent are misses, not zero.
pub fn json_count(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().map(|f| f.round() as i64)),
        Value::String(s) => parse_magnitude(s),
        _ => None,
    }
}

/// Extract and parse an embedded JSON payload from `<script id="...">`.
pub fn embedded_json(html: &str, script_id: &str) -> Option<Value> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(&format!("script#{script_id}")).ok()?;
    let node = doc.select(&selector).next()?;
    let raw: String = node.text().collect();
    serde_json::from_str(raw.trim()).ok()
}

/// Text of the first element matching a CSS selector.
pub fn select_text(html: &str, css: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(css).ok()?;
    let node = doc.select(&selector).next()?;
    let text: String = node.text().collect::<Vec<_>>().join(" ");
    let trimmed = text.trim().to_string();
    (!trimmed.is_empty()).then_some(trimmed)
}

/// Attribute of the first element matching a CSS selector.
pub fn select_attr(html: &str, css: &str, attr: &str) -> Option<String> {
    let doc = Html::parse_document(html);
    let selector = Selector::parse(css).ok()?;
    doc.select(&selector)
        .next()
        .and_then(|n| n.value().attr(attr))
        .map(|s| s.to_string())
}

/// Compiled value-label and label-value patterns for one label, built
/// once per label and shared across calls (`Regex` clones are cheap).
fn label_patterns(label: &str) -> (regex::Regex, regex::Regex) {
    use std::collections::HashMap;
    use std::sync::{Mutex, OnceLock};

    static CACHE: OnceLock<Mutex<HashMap<String, (regex::Regex, regex::Regex)>>> = OnceLock::new();
    let cache = CACHE.get_or_init(|| Mutex::new(HashMap::new()));
    let mut map = cache.lock().expect("label pattern cache");
    map.entry(label.to_string())
        .or_insert_with(|| {
            let escaped = regex::escape(label);
            // value before label: "1.2만 팔로워"
            let value_first =
                regex::Regex::new(&format!(r"([\d][\d.,\s]*[KkMm만천억]?)\s*{escaped}"))
                    .expect("value-label pattern");
            // label before value: "팔로워 1.2만"
            let label_first =
                regex::Regex::new(&format!(r"{escaped}\s*:?\s*([\d][\d.,]*[KkMm만천억]?)"))
                    .expect("label-value pattern");
            (value_first, label_first)
        })
        .clone()
}

/// Scan rendered text for a count adjacent to one of `labels`
/// ("1.2만 팔로워", "853 Followers"). Labeled matches are preferred over
/// any bare number elsewhere on the page, so ambiguous scans cannot pick
/// up unrelated figures.
pub fn labeled_count(html: &str, labels: &[&str]) -> Option<i64> {
    let doc = Html::parse_document(html);
    let text: String = doc.root_element().text().collect::<Vec<_>>().join(" ");

    for label in labels {
        let (value_first, label_first) = label_patterns(label);
        if let Some(caps) = value_first.captures(&text) {
            if let Some(v) = parse_magnitude(&caps[1]) {
                return Some(v);
            }
        }
        if let Some(caps) = label_first.captures(&text) {
            if let Some(v) = parse_magnitude(&caps[1]) {
                return Some(v);
            }
        }
    }
    None
}
