use once_cell::sync::Lazy;
use regex::Regex;

use crate::types::{RawValue, SpendingMode};

/// Cell contents read as missing (matched exactly, as spreadsheet exports write them)
pub const MISSING_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// "1,000,000" is one number; commas are dropped before parsing
static NUMBER_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"[0-9]{1,3}(?:,[0-9]{3})+(?:\.[0-9]+)?|[0-9]+(?:\.[0-9]+)?").unwrap()
});

/// First code point of each run of ten Unicode decimal digits (category Nd)
const DECIMAL_ZEROS: &[u32] = &[
    0x0030, 0x0660, 0x06F0, 0x07C0, 0x0966, 0x09E6, 0x0A66, 0x0AE6, 0x0B66, 0x0BE6, 0x0C66,
    0x0CE6, 0x0D66, 0x0DE6, 0x0E50, 0x0ED0, 0x0F20, 0x1040, 0x1090, 0x17E0, 0x1810, 0x1946,
    0x19D0, 0x1A80, 0x1A90, 0x1B50, 0x1BB0, 0x1C40, 0x1C50, 0xA620, 0xA8D0, 0xA900, 0xA9D0,
    0xA9F0, 0xAA50, 0xABF0, 0xFF10, 0x104A0, 0x10D30, 0x11066, 0x110F0, 0x11136, 0x111D0,
    0x112F0, 0x11450, 0x114D0, 0x11650, 0x116C0, 0x11730, 0x118E0, 0x11950, 0x11C50, 0x11D50,
    0x11DA0, 0x16A60, 0x16B50, 0x1D7CE, 0x1D7D8, 0x1D7E2, 0x1D7EC, 0x1D7F6, 0x1E140, 0x1E2F0,
    0x1E950, 0x1FBF0,
];

/// Check if a field represents a missing value
pub fn is_missing(value: &str) -> bool {
    MISSING_TOKENS.contains(&value)
}

/// Value of a decimal digit in any script, `None` for every other character
///
/// Superscripts, fractions and other non-decimal numerics are not digits.
pub fn decimal_digit(c: char) -> Option<u32> {
    if let Some(d) = c.to_digit(10) {
        return Some(d);
    }
    if !c.is_numeric() {
        return None;
    }
    let code = u32::from(c);
    let run = DECIMAL_ZEROS.partition_point(|&zero| zero <= code);
    let zero = *DECIMAL_ZEROS.get(run.checked_sub(1)?)?;
    let offset = code - zero;
    (offset < 10).then_some(offset)
}

pub fn has_decimal_digit(text: &str) -> bool {
    text.chars().any(|c| decimal_digit(c).is_some())
}

/// Turn a free-text spending answer into a quantity by concatenating its digits
///
/// Total over every input: missing cells and answers without digits give 0.
/// "$25-30/month" -> 2530, saturating at u64::MAX.
pub fn normalize_spending(raw: &RawValue) -> u64 {
    raw.as_text().map_or(0, |text| {
        text.chars()
            .filter_map(decimal_digit)
            .fold(0u64, |acc, d| acc.saturating_mul(10).saturating_add(u64::from(d)))
    })
}

/// Normalize a spending answer using the given mode
pub fn normalize_spending_with(raw: &RawValue, mode: SpendingMode) -> u64 {
    match mode {
        SpendingMode::DigitConcat => normalize_spending(raw),
        SpendingMode::RangeMidpoint => raw.as_text().map_or(0, range_midpoint),
    }
}

/// "$25-30/month" -> 28, "1,000" -> 1000
fn range_midpoint(text: &str) -> u64 {
    let ascii: String = text
        .chars()
        .map(|c| {
            decimal_digit(c)
                .and_then(|d| char::from_digit(d, 10))
                .unwrap_or(c)
        })
        .collect();
    let numbers: Vec<f64> = NUMBER_PATTERN
        .find_iter(&ascii)
        .filter_map(|m| m.as_str().replace(',', "").parse::<f64>().ok())
        .take(2)
        .collect();

    let value = match numbers.as_slice() {
        [] => return 0,
        [single] => *single,
        [low, high, ..] => (low + high) / 2.0,
    };

    if value.is_finite() {
        // float-to-int `as` saturates
        value.round() as u64
    } else {
        u64::MAX
    }
}

/// Parse a Likert answer into a rating, `None` when it is not a finite number
pub fn coerce_rating(raw: &RawValue) -> Option<f64> {
    let value = raw.as_text()?.trim().parse::<f64>().ok()?;
    value.is_finite().then_some(value)
}

/// Whether a non-missing cell failed rating coercion
pub fn is_unparseable_rating(raw: &RawValue) -> bool {
    !raw.is_missing() && coerce_rating(raw).is_none()
}
