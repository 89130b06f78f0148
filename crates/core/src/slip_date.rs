use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

const ISO_FORMAT: &str = "%Y-%m-%d";

/// The date found on a slip.
///
/// Slips print dates with Thai month names and Buddhist-era years, which are
/// not converted. When the matched text does parse under a known calendar
/// format it is kept as a real date, otherwise the matched text is kept as-is
/// so it can be corrected by hand.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SlipDate {
    Calendar(NaiveDate),
    Verbatim(String),
}

impl SlipDate {
    /// Rebuild a date from its rendered form (a ledger cell).
    pub fn from_rendered(s: &str) -> Option<Self> {
        let s = s.trim();
        if s.is_empty() {
            return None;
        }
        Some(match NaiveDate::parse_from_str(s, ISO_FORMAT) {
            Ok(d) => SlipDate::Calendar(d),
            Err(_) => SlipDate::Verbatim(s.to_string()),
        })
    }

    pub fn as_calendar(&self) -> Option<NaiveDate> {
        match self {
            SlipDate::Calendar(d) => Some(*d),
            SlipDate::Verbatim(_) => None,
        }
    }
}

impl fmt::Display for SlipDate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlipDate::Calendar(d) => write!(f, "{}", d.format(ISO_FORMAT)),
            SlipDate::Verbatim(s) => write!(f, "{s}"),
        }
    }
}
