use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::domain::intent::{Category, Intent, TimePeriod};
use crate::domain::plan::Plan;
use crate::domain::schema::Table;

/// One result row keyed by field name.
pub type Row = Map<String, Value>;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

impl Confidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub passed: bool,
    pub checks: Vec<String>,
    pub reason: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FormattedAnswer {
    pub text: String,
    pub confidence: Confidence,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DataQuality {
    pub rows_returned: usize,
    /// Share of non-null values across all returned fields, 0.0..=1.0.
    pub completeness: f64,
}

impl DataQuality {
    pub fn from_rows(rows: &[Row]) -> Self {
        let total = rows.iter().map(Map::len).sum::<usize>();
        let present =
            rows.iter().flat_map(|row| row.values()).filter(|value| !value.is_null()).count();
        let completeness = if total == 0 { 0.0 } else { present as f64 / total as f64 };

        Self { rows_returned: rows.len(), completeness }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct AnswerMetadata {
    pub intent_details: Intent,
    pub planning: Plan,
    pub validation: ValidationResult,
    pub data_quality: DataQuality,
    pub time_period: TimePeriod,
    pub entities: Vec<String>,
    pub processing_time_ms: u64,
    pub request_id: String,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Answer {
    pub answer: String,
    pub confidence: Confidence,
    pub generated_query: String,
    pub intent: Category,
    pub data_sources_used: Vec<Table>,
    pub metadata: AnswerMetadata,
}

/// Error-shaped answer for a question whose query failed validation.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rejection {
    pub reason: String,
    pub checks: Vec<String>,
    pub intent: Category,
}

impl Rejection {
    pub fn user_message(&self) -> String {
        format!("This question cannot be answered safely: {}.", self.reason)
    }
}
