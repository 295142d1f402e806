//! Contact extraction result types.
//!
//! These are the JSON shapes returned by `POST /ocr` and the row shape
//! persisted by the spreadsheet store.

use serde::Serialize;

/// Header row of the persisted spreadsheet, in column order.
pub const SPREADSHEET_HEADER: [&str; 5] = ["Name", "Email", "Phone", "Address", "Profession"];

/// Structured contact fields pulled from one business card.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ContactRecord {
    pub name: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub address: Option<String>,
    pub profession: Option<String>,
}

impl ContactRecord {
    /// Spreadsheet row in header order. Missing fields become empty strings.
    pub fn to_row(&self) -> [String; 5] {
        [
            self.name.clone().unwrap_or_default(),
            self.email.clone().unwrap_or_default(),
            self.phone.clone().unwrap_or_default(),
            self.address.clone().unwrap_or_default(),
            self.profession.clone().unwrap_or_default(),
        ]
    }
}

/// Per-image result of a batch upload.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum ImageOutcome {
    Processed {
        filename: String,
        raw_text: String,
        data: ContactRecord,
    },
    Failed {
        filename: String,
        error: String,
    },
}

impl ImageOutcome {
    pub fn is_processed(&self) -> bool {
        matches!(self, ImageOutcome::Processed { .. })
    }
}
