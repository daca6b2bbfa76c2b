//! Test harness for isolated test execution.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use tempfile::TempDir;

use prodex::config::Config;

/// Isolated input, results and config directories under one temp dir.
pub struct TestHarness {
    temp_dir: TempDir,
    pub input_dir: PathBuf,
    pub results_dir: PathBuf,
    pub config_dir: PathBuf,
}

impl TestHarness {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let base = temp_dir.path();

        let input_dir = base.join("input");
        let results_dir = base.join("results");
        let config_dir = base.join("config");

        std::fs::create_dir_all(&input_dir).expect("Failed to create input dir");
        std::fs::create_dir_all(&config_dir).expect("Failed to create config dir");

        Self {
            temp_dir,
            input_dir,
            results_dir,
            config_dir,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Write a raw input file to the input directory.
    pub fn write_input(&self, filename: &str, content: &[u8]) -> PathBuf {
        let path = self.input_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write input file");
        path
    }

    pub fn write_text_input(&self, filename: &str, content: &str) -> PathBuf {
        self.write_input(filename, content.as_bytes())
    }

    /// Write a config file as JSON.
    pub fn write_config(&self, filename: &str, config: &Config) -> PathBuf {
        let json = serde_json::to_string_pretty(config).expect("Failed to serialize config");
        self.write_raw_config(filename, &json)
    }

    /// Write a config file verbatim, for YAML or malformed documents.
    pub fn write_raw_config(&self, filename: &str, content: &str) -> PathBuf {
        let path = self.config_dir.join(filename);
        std::fs::write(&path, content).expect("Failed to write config file");
        path
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
