use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::config::ExtractionConfig;

/// Error type an extraction operation may fail with.
pub type OperationError = Box<dyn std::error::Error + Send + Sync>;

/// What one call of an extraction operation produced for one chunk.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PartialResult {
    /// Expected shape: `{"relations": [...]}`.
    #[serde(default)]
    pub compatibility: Value,
    /// Expected shape: `{"specifications": [...]}`.
    #[serde(default)]
    pub technical: Value,
    #[serde(default)]
    pub faq_data: Value,
    #[serde(default)]
    pub errors: Vec<String>,
    #[serde(default)]
    pub warnings: Vec<String>,
}

impl PartialResult {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_relations(mut self, relations: Vec<Value>) -> Self {
        self.compatibility = json!({ "relations": relations });
        self
    }

    pub fn with_specifications(mut self, specifications: Vec<Value>) -> Self {
        self.technical = json!({ "specifications": specifications });
        self
    }

    pub fn with_faq(mut self, faq_data: Value) -> Self {
        self.faq_data = faq_data;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.errors.push(error.into());
        self
    }

    pub fn with_warning(mut self, warning: impl Into<String>) -> Self {
        self.warnings.push(warning.into());
        self
    }
}

/// The content-understanding step run on every chunk, usually an LLM call.
///
/// Returning `Err` marks the whole chunk as failed; errors inside
/// [`PartialResult::errors`] are recorded but the chunk still counts as
/// processed.
pub trait ExtractionOperation: Send + Sync {
    fn extract(
        &self,
        chunk: &str,
        config: &ExtractionConfig,
    ) -> Result<PartialResult, OperationError>;
}

impl<F, E> ExtractionOperation for F
where
    F: Fn(&str, &ExtractionConfig) -> Result<PartialResult, E> + Send + Sync,
    E: Into<OperationError>,
{
    fn extract(
        &self,
        chunk: &str,
        config: &ExtractionConfig,
    ) -> Result<PartialResult, OperationError> {
        self(chunk, config).map_err(Into::into)
    }
}
