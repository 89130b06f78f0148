use std::sync::OnceLock;

use chrono::NaiveDate;
use regex::Regex;
use slipscan_core::{Amount, SlipDate};
use tracing::debug;

use crate::types::{ExtractedFields, ExtractionResult};

// ── Compiled regex cache ─────────────────────────────────────────────────────

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

// Digits are ASCII or Thai (๐-๙); OCR with the Thai model emits either.
//
// No word boundaries: "1,234.56" yields "234.56" and a long reference number
// can yield a false amount.
re!(re_three_digit_decimal, r"[0-9\x{0E50}-\x{0E59}]{3}\.[0-9\x{0E50}-\x{0E59}]{2}");

// Day, Thai month name or abbreviation (periods allowed inside, e.g. มี.ค.), year.
re!(re_thai_month_date,
    r"[0-9\x{0E50}-\x{0E59}]{1,2}\s+[\x{0E00}-\x{0E7F}]+(?:\.[\x{0E00}-\x{0E7F}]+)*\.?\s+[0-9\x{0E50}-\x{0E59}]{4}");

// ── Rules ────────────────────────────────────────────────────────────────────

/// One pattern rule: a pure function from the whole transcription to its
/// first match, if any.
pub struct Rule<T> {
    pub name: &'static str,
    pub apply: fn(&str) -> Option<T>,
}

impl<T> Rule<T> {
    pub fn run(&self, text: &str) -> Option<T> {
        (self.apply)(text)
    }
}

/// Amount rules in priority order.
pub const AMOUNT_RULES: &[Rule<Amount>] = &[Rule {
    name: "three_digit_decimal",
    apply: three_digit_decimal,
}];

/// Date rules in priority order. Each yields the matched substring; turning it
/// into a [`SlipDate`] is done by [`resolve_date`].
pub const DATE_RULES: &[Rule<String>] = &[Rule {
    name: "thai_month_name",
    apply: thai_month_name,
}];

/// Calendar formats tried, in order, on a matched date before keeping it verbatim.
pub const CALENDAR_FORMATS: &[&str] = &["%d/%m/%Y", "%d-%m-%Y"];

fn first_match<T>(kind: &str, rules: &[Rule<T>], text: &str) -> Option<T> {
    rules.iter().find_map(|rule| {
        let found = rule.run(text);
        if found.is_some() {
            debug!(kind, rule = rule.name, "pattern matched");
        }
        found
    })
}

fn three_digit_decimal(text: &str) -> Option<Amount> {
    let m = re_three_digit_decimal().find(text)?;
    Amount::parse(&ascii_digits(m.as_str()))
}

/// Replace Thai digits with their ASCII counterparts; everything else is kept.
fn ascii_digits(s: &str) -> String {
    s.chars()
        .map(|c| match c {
            '\u{0E50}'..='\u{0E59}' => char::from(b'0' + (c as u32 - 0x0E50) as u8),
            other => other,
        })
        .collect()
}

fn thai_month_name(text: &str) -> Option<String> {
    re_thai_month_date().find(text).map(|m| m.as_str().to_string())
}

/// Read a matched date under the known calendar formats, or keep it as-is.
///
/// Thai month names and Buddhist-era years are not mapped, so a Thai-style
/// match always comes back [`SlipDate::Verbatim`].
pub fn resolve_date(matched: &str) -> SlipDate {
    CALENDAR_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(matched, fmt).ok())
        .map(SlipDate::Calendar)
        .unwrap_or_else(|| SlipDate::Verbatim(matched.to_string()))
}

// ── Public extraction API ─────────────────────────────────────────────────────

pub struct Extractor;

impl Extractor {
    /// Extract the amount and date from a flat OCR transcription. Never fails;
    /// fields that no rule matches are `None`.
    pub fn extract(text: &str) -> ExtractedFields {
        ExtractedFields {
            amount: Self::extract_amount(text),
            date: Self::extract_date(text),
        }
    }

    /// [`Extractor::extract`] plus the trimmed transcription.
    pub fn extract_result(text: &str) -> ExtractionResult {
        ExtractionResult::from_fields(Self::extract(text), text.trim())
    }

    pub fn extract_amount(text: &str) -> Option<Amount> {
        first_match("amount", AMOUNT_RULES, text)
    }

    pub fn extract_date(text: &str) -> Option<SlipDate> {
        first_match("date", DATE_RULES, text).map(|m| resolve_date(&m))
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
