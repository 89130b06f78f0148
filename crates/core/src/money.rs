use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A transferred amount as printed on a slip, in baht.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Amount(Decimal);

impl Amount {
    pub fn from_decimal(decimal: Decimal) -> Self {
        Amount(decimal.round_dp(2))
    }

    /// Parse an amount as it appears in OCR output or a ledger cell.
    /// Thousands separators are dropped before parsing.
    pub fn parse(s: &str) -> Option<Self> {
        let clean = s.trim().replace(',', "");
        if clean.is_empty() {
            return None;
        }
        Decimal::from_str(&clean).ok().map(Self::from_decimal)
    }

    pub fn as_decimal(self) -> Decimal {
        self.0
    }
}

impl fmt::Display for Amount {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.2}", self.0)
    }
}
