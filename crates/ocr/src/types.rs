use serde::{Deserialize, Serialize};
use slipscan_core::{Amount, SlipDate};

/// Fields pulled out of a transcription. Either may be absent.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedFields {
    pub amount: Option<Amount>,
    pub date: Option<SlipDate>,
}

/// What one slip yields: the extracted fields plus the text they came from.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractionResult {
    pub amount: Option<Amount>,
    pub date: Option<SlipDate>,
    pub raw_text: String,
}

impl ExtractionResult {
    pub fn from_fields(fields: ExtractedFields, raw_text: impl Into<String>) -> Self {
        Self { amount: fields.amount, date: fields.date, raw_text: raw_text.into() }
    }

    /// Whether someone should check this against the raw text: a field is
    /// missing or the date could not be read as a calendar date.
    pub fn needs_review(&self) -> bool {
        self.amount.is_none() || !matches!(self.date, Some(SlipDate::Calendar(_)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    #[test]
    fn needs_review_unless_both_fields_resolved() {
        let empty = ExtractionResult::default();
        assert!(empty.needs_review());

        let verbatim = ExtractionResult {
            amount: Amount::parse("250.00"),
            date: Some(SlipDate::Verbatim("15 มี.ค. 2567".into())),
            raw_text: String::new(),
        };
        assert!(verbatim.needs_review());

        let resolved = ExtractionResult {
            date: Some(SlipDate::Calendar(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())),
            ..verbatim
        };
        assert!(!resolved.needs_review());
    }

    #[test]
    fn absent_fields_serialize_as_null() {
        let r = ExtractionResult::from_fields(ExtractedFields::default(), "blurry");
        let json = serde_json::to_value(&r).unwrap();
        assert!(json["amount"].is_null());
        assert!(json["date"].is_null());
        assert_eq!(json["raw_text"], "blurry");
    }
}
