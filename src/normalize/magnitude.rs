//! Abbreviated count parsing ("1.2만", "3.4K", "2,300").

/// Suffix multipliers recognized after the numeric part. Latin and Korean
/// abbreviations both appear in the wild, sometimes on the same page.
const MULTIPLIERS: &[(&str, f64)] = &[
    ("억", 100_000_000.0),
    ("만", 10_000.0),
    ("천", 1_000.0),
    ("k", 1_000.0),
    ("m", 1_000_000.0),
];

/// Parse a human-abbreviated count into an integer.
///
/// Thousands separators are stripped, a trailing multiplier suffix is
/// applied via decimal multiplication, and the result is rounded to the
/// nearest integer. Returns `None` when the text carries no numeric
/// content; in particular the empty string is `None`, not zero.
pub fn parse_magnitude(text: &str) -> Option<i64> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return None;
    }

    // Collect the leading number, tolerating separators and whitespace.
    let mut digits = String::new();
    let mut rest = trimmed;
    for (idx, ch) in trimmed.char_indices() {
        match ch {
            '0'..='9' | '.' => digits.push(ch),
            ',' | ' ' | '\u{a0}' => continue,
            _ => {
                rest = &trimmed[idx..];
                break;
            }
        }
        rest = &trimmed[idx + ch.len_utf8()..];
    }

    if digits.is_empty() {
        return None;
    }
    let base: f64 = digits.parse().ok()?;

    let suffix = rest.trim().to_lowercase();
    let factor = MULTIPLIERS
        .iter()
        .find(|(s, _)| suffix.starts_with(s))
        .map(|(_, f)| *f)
        .unwrap_or(1.0);

    Some((base * factor).round() as i64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_numbers() {
        assert_eq!(parse_magnitude("2300"), Some(2300));
        assert_eq!(parse_magnitude("2,300"), Some(2300));
        assert_eq!(parse_magnitude("1 234 567"), Some(1_234_567));
        assert_eq!(parse_magnitude(" 42 "), Some(42));
        assert_eq!(parse_magnitude("0"), Some(0));
    }

    #[test]
    fn test_latin_suffixes() {
        assert_eq!(parse_magnitude("3.4K"), Some(3400));
        assert_eq!(parse_magnitude("3.4k"), Some(3400));
        assert_eq!(parse_magnitude("1.5M"), Some(1_500_000));
        assert_eq!(parse_magnitude("12K"), Some(12_000));
    }

    #[test]
    fn test_korean_suffixes() {
        assert_eq!(parse_magnitude("1.2만"), Some(12_000));
        assert_eq!(parse_magnitude("3천"), Some(3_000));
        assert_eq!(parse_magnitude("2.5억"), Some(250_000_000));
        assert_eq!(parse_magnitude("10.3만"), Some(103_000));
    }

    #[test]
    fn test_rounding() {
        // 1.23만 = 12300 exactly; 1.234K rounds to 1234
        assert_eq!(parse_magnitude("1.234K"), Some(1234));
        assert_eq!(parse_magnitude("1.2345K"), Some(1235));
    }

    #[test]
    fn test_non_numeric_is_none() {
        assert_eq!(parse_magnitude(""), None);
        assert_eq!(parse_magnitude("   "), None);
        assert_eq!(parse_magnitude("abc"), None);
        assert_eq!(parse_magnitude("만"), None);
        assert_eq!(parse_magnitude("followers"), None);
    }

    #[test]
    fn test_trailing_label_ignored() {
        assert_eq!(parse_magnitude("1.2만 팔로워"), Some(12_000));
        assert_eq!(parse_magnitude("853 Followers"), Some(853));
    }
}
