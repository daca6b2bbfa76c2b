use crate::config::{Config, ExtractionConfig};

use super::validation::ValidationRules;

pub struct PipelineConfig {
    /// Handed unchanged to the extraction operation.
    pub extraction: ExtractionConfig,
    /// Present when `extraction.validate_results` is set.
    pub validation: Option<ValidationRules>,
}

impl PipelineConfig {
    pub fn from_config(config: &Config) -> Self {
        Self::from_extraction(config.extraction.clone())
    }

    pub fn from_extraction(extraction: ExtractionConfig) -> Self {
        let validation = extraction
            .validate_results
            .then(|| ValidationRules::from_config(&extraction));
        Self {
            extraction,
            validation,
        }
    }

    pub fn chunk_size(&self) -> usize {
        self.extraction.chunk_size
    }

    pub fn chunk_overlap(&self) -> usize {
        self.extraction.chunk_overlap
    }
}
