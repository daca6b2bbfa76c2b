use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub extraction: ExtractionConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneralConfig {
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    #[serde(default = "default_max_workers")]
    pub max_workers: usize,
    #[serde(default)]
    pub debug_mode: bool,
}

fn default_output_dir() -> String {
    "./output".to_string()
}

fn default_max_workers() -> usize {
    num_cpus::get()
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            max_workers: default_max_workers(),
            debug_mode: false,
        }
    }
}

/// Settings read by the extraction pipeline and handed to every
/// extraction operation call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExtractionConfig {
    /// Characters per chunk; documents longer than this are split.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// Characters shared by neighbouring chunks.
    #[serde(default = "default_chunk_overlap")]
    pub chunk_overlap: usize,
    /// Largest accepted file in bytes. Enforced before extraction starts.
    #[serde(default = "default_max_file_size")]
    pub max_file_size: u64,
    #[serde(default)]
    pub validate_results: bool,
    #[serde(default = "CategoryConfig::compatibility")]
    pub compatibility: CategoryConfig,
    #[serde(default = "CategoryConfig::technical")]
    pub technical: CategoryConfig,
    #[serde(default = "CategoryConfig::faq")]
    pub faq: CategoryConfig,
}

fn default_chunk_size() -> usize {
    15_000
}

fn default_chunk_overlap() -> usize {
    2_000
}

fn default_max_file_size() -> u64 {
    5_000_000
}

impl Default for ExtractionConfig {
    fn default() -> Self {
        Self {
            chunk_size: default_chunk_size(),
            chunk_overlap: default_chunk_overlap(),
            max_file_size: default_max_file_size(),
            validate_results: false,
            compatibility: CategoryConfig::compatibility(),
            technical: CategoryConfig::technical(),
            faq: CategoryConfig::faq(),
        }
    }
}

/// Per-category switches. Only `required_fields` is read by the pipeline
/// itself; `enabled` and `threshold` are for the extraction operation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    #[serde(default)]
    pub required_fields: Vec<String>,
}

fn default_true() -> bool {
    true
}

fn default_threshold() -> f64 {
    0.7
}

fn fields(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

impl CategoryConfig {
    pub fn compatibility() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            required_fields: fields(&["relation_type", "related_product", "context"]),
        }
    }

    pub fn technical() -> Self {
        Self {
            enabled: true,
            threshold: default_threshold(),
            required_fields: fields(&["category", "name", "raw_value"]),
        }
    }

    pub fn faq() -> Self {
        Self {
            enabled: false,
            threshold: default_threshold(),
            required_fields: fields(&["question_type", "reference_product"]),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Default filter directive; `RUST_LOG` takes precedence.
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}
