//! Detection verdicts

use crate::client::VerifyResponse;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Service status string that flags a person needing assistance
const ASSISTANCE_STATUS: &str = "persona discapacitada";

/// Kind of assistance the detected person needs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AssistanceCategory {
    /// Crutches, wheelchair or similar
    Mobility,
    /// Dark glasses, white cane or similar
    Visual,
    /// More than one kind of evidence
    Multiple,
    /// Evidence that does not map to a specific kind (e.g. a disability card)
    Other,
    /// No assistance needed
    None,
}

impl AssistanceCategory {
    /// Get string representation
    pub fn as_str(&self) -> &'static str {
        match self {
            AssistanceCategory::Mobility => "mobility",
            AssistanceCategory::Visual => "visual",
            AssistanceCategory::Multiple => "multiple",
            AssistanceCategory::Other => "other",
            AssistanceCategory::None => "none",
        }
    }

    /// Derive the category from per-label detection counts
    pub fn from_counts(counts: &BTreeMap<String, u32>, status: &str) -> Self {
        let count = |label: &str| counts.get(label).copied().unwrap_or(0);

        let evidence = [
            (count("crutch") > 0, AssistanceCategory::Mobility),
            (count("sunglasses") > 0, AssistanceCategory::Visual),
            (count("card") > 0, AssistanceCategory::Other),
        ];
        let mut present = evidence.iter().filter(|(seen, _)| *seen).map(|(_, category)| *category);

        match (present.next(), present.next()) {
            (Some(_), Some(_)) => AssistanceCategory::Multiple,
            (Some(category), None) => category,
            _ if status.trim().eq_ignore_ascii_case(ASSISTANCE_STATUS) => AssistanceCategory::Other,
            _ => AssistanceCategory::None,
        }
    }
}

/// Immutable outcome of one detection cycle.
///
/// `person_needs_assistance()` is true exactly when the cycle succeeded and
/// the category is not [`AssistanceCategory::None`].
#[derive(Debug, Clone, Serialize)]
pub struct DetectionVerdict {
    succeeded: bool,
    person_needs_assistance: bool,
    assistance_category: AssistanceCategory,
    raw_counts: BTreeMap<String, u32>,
    elapsed_millis: u64,
    error_message: Option<String>,
}

impl DetectionVerdict {
    /// Successful cycle
    pub fn success(category: AssistanceCategory, raw_counts: BTreeMap<String, u32>, elapsed_millis: u64) -> Self {
        Self {
            succeeded: true,
            person_needs_assistance: category != AssistanceCategory::None,
            assistance_category: category,
            raw_counts,
            elapsed_millis,
            error_message: None,
        }
    }

    /// Failed cycle
    pub fn failure(message: impl Into<String>, elapsed_millis: u64) -> Self {
        Self {
            succeeded: false,
            person_needs_assistance: false,
            assistance_category: AssistanceCategory::None,
            raw_counts: BTreeMap::new(),
            elapsed_millis,
            error_message: Some(message.into()),
        }
    }

    /// Build from a service response
    pub fn from_response(response: &VerifyResponse, elapsed_millis: u64) -> Self {
        let counts = response.details.totals.clone();
        let category = AssistanceCategory::from_counts(&counts, &response.status);
        Self::success(category, counts, elapsed_millis)
    }

    pub fn succeeded(&self) -> bool {
        self.succeeded
    }

    pub fn person_needs_assistance(&self) -> bool {
        self.person_needs_assistance
    }

    pub fn assistance_category(&self) -> AssistanceCategory {
        self.assistance_category
    }

    pub fn raw_counts(&self) -> &BTreeMap<String, u32> {
        &self.raw_counts
    }

    pub fn elapsed_millis(&self) -> u64 {
        self.elapsed_millis
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }
}
