use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Processing status of one document.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ExtractionStatus {
    NotStarted,
    Queued,
    InProgress,
    ProcessingChunks,
    MergingResults,
    Validating,
    Completed,
    Failed,
    PartiallyCompleted,
    Validated,
    ValidationFailed,
}

impl ExtractionStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExtractionStatus::Completed
                | ExtractionStatus::Failed
                | ExtractionStatus::PartiallyCompleted
                | ExtractionStatus::Validated
                | ExtractionStatus::ValidationFailed
        )
    }
}

impl std::fmt::Display for ExtractionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ExtractionStatus::NotStarted => write!(f, "Not started"),
            ExtractionStatus::Queued => write!(f, "Queued"),
            ExtractionStatus::InProgress => write!(f, "In progress"),
            ExtractionStatus::ProcessingChunks => write!(f, "Processing chunks"),
            ExtractionStatus::MergingResults => write!(f, "Merging results"),
            ExtractionStatus::Validating => write!(f, "Validating"),
            ExtractionStatus::Completed => write!(f, "Completed"),
            ExtractionStatus::Failed => write!(f, "Failed"),
            ExtractionStatus::PartiallyCompleted => write!(f, "Partially completed"),
            ExtractionStatus::Validated => write!(f, "Validated"),
            ExtractionStatus::ValidationFailed => write!(f, "Validation failed"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutcomeMetadata {
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_size: Option<u64>,
    #[serde(default)]
    pub chunked: bool,
    #[serde(default)]
    pub chunks_count: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub processing_time_ms: Option<u64>,
}

/// Aggregated result of extracting one document.
///
/// Errors and warnings are append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionOutcome {
    pub document_id: String,
    pub status: ExtractionStatus,
    /// `{"relations": [...]}`
    pub compatibility: Value,
    /// `{"specifications": [...]}`
    pub technical: Value,
    /// Empty object when no FAQ data was extracted.
    pub faq_data: Value,
    errors: Vec<String>,
    warnings: Vec<String>,
    pub metadata: OutcomeMetadata,
}

impl ExtractionOutcome {
    pub fn new(document_id: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            document_id: document_id.into(),
            status: ExtractionStatus::NotStarted,
            compatibility: json!({ "relations": [] }),
            technical: json!({ "specifications": [] }),
            faq_data: json!({}),
            errors: Vec::new(),
            warnings: Vec::new(),
            metadata: OutcomeMetadata {
                created_at: now,
                updated_at: now,
                file_path: None,
                file_size: None,
                chunked: false,
                chunks_count: 0,
                processing_time_ms: None,
            },
        }
    }

    pub fn errors(&self) -> &[String] {
        &self.errors
    }

    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn set_status(&mut self, status: ExtractionStatus) {
        self.status = status;
        self.touch();
    }

    /// Appends an error. The status becomes `Failed` unless the outcome is
    /// already `PartiallyCompleted`.
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
        if self.status != ExtractionStatus::PartiallyCompleted {
            self.status = ExtractionStatus::Failed;
        }
        self.touch();
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
        self.touch();
    }

    pub fn relations(&self) -> &[Value] {
        array_field(&self.compatibility, "relations")
    }

    pub fn specifications(&self) -> &[Value] {
        array_field(&self.technical, "specifications")
    }

    pub fn compatibility_count(&self) -> usize {
        self.relations().len()
    }

    pub fn technical_count(&self) -> usize {
        self.specifications().len()
    }

    pub fn has_faq_data(&self) -> bool {
        !is_empty_payload(&self.faq_data)
    }

    /// True when any relation, specification or FAQ data was extracted.
    pub fn has_payload(&self) -> bool {
        self.compatibility_count() > 0 || self.technical_count() > 0 || self.has_faq_data()
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    fn touch(&mut self) {
        self.metadata.updated_at = Utc::now();
    }
}

fn array_field<'a>(payload: &'a Value, key: &str) -> &'a [Value] {
    payload
        .get(key)
        .and_then(Value::as_array)
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Null, `{}`, `[]` and `""` count as "nothing extracted".
pub(crate) fn is_empty_payload(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        Value::Array(items) => items.is_empty(),
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}
