use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::Utc;

use crate::error::StorageError;
use crate::pipeline::ExtractionOutcome;
use crate::sanitize;

/// Upper bound on `_N` suffixes tried before giving up on a name.
const MAX_SUFFIX: usize = 1000;

/// Persists extraction outcomes as pretty-printed JSON files.
pub struct ResultStore {
    directory: PathBuf,
}

impl ResultStore {
    pub fn new<P: AsRef<Path>>(directory: P) -> Self {
        Self {
            directory: directory.as_ref().to_path_buf(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Writes `{document id}_{YYYYmmdd_HHMMSS}.json`, adding `_2`, `_3`...
    /// when a file with that name already exists.
    pub fn save(&self, outcome: &ExtractionOutcome) -> Result<PathBuf, StorageError> {
        self.ensure_directory()?;

        let json = outcome.to_json().map_err(StorageError::Encode)?;
        let stem = format!(
            "{}_{}",
            sanitize::sanitize_filename(&outcome.document_id),
            Utc::now().format("%Y%m%d_%H%M%S")
        );

        let path = self.create_exclusive(&stem, json.as_bytes())?;
        tracing::debug!(
            document_id = %outcome.document_id,
            file = %sanitize::redact_path(&path),
            "Saved extraction result"
        );
        Ok(path)
    }

    pub fn load(&self, path: &Path) -> Result<ExtractionOutcome, StorageError> {
        let content = std::fs::read_to_string(path).map_err(|e| StorageError::ReadFile {
            path: path.to_path_buf(),
            source: e,
        })?;
        ExtractionOutcome::from_json(&content).map_err(|e| StorageError::Decode {
            path: path.to_path_buf(),
            source: e,
        })
    }

    /// Result files in the store, sorted by name. A missing directory is
    /// an empty store.
    pub fn list(&self) -> Result<Vec<PathBuf>, StorageError> {
        let entries = match std::fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => {
                return Err(StorageError::ReadFile {
                    path: self.directory.clone(),
                    source: e,
                })
            }
        };

        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StorageError::ReadFile {
                path: self.directory.clone(),
                source: e,
            })?;
            let path = entry.path();
            if path.is_file() && path.extension().is_some_and(|ext| ext == "json") {
                files.push(path);
            }
        }
        files.sort();
        Ok(files)
    }

    fn ensure_directory(&self) -> Result<(), StorageError> {
        if !self.directory.exists() {
            std::fs::create_dir_all(&self.directory).map_err(|e| {
                StorageError::CreateDirectory {
                    path: self.directory.clone(),
                    source: e,
                }
            })?;
        }
        Ok(())
    }

    /// Creates `{stem}.json`, or the first free `{stem}_{n}.json`, with
    /// `create_new` so concurrent saves never overwrite each other.
    fn create_exclusive(&self, stem: &str, content: &[u8]) -> Result<PathBuf, StorageError> {
        for counter in 1..=MAX_SUFFIX {
            let filename = if counter == 1 {
                format!("{}.json", stem)
            } else {
                format!("{}_{}.json", stem, counter)
            };
            let path = self.directory.join(filename);

            match std::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&path)
            {
                Ok(file) => {
                    write_or_remove(&path, file, content)?;
                    return Ok(path);
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => return Err(StorageError::WriteFile { path, source: e }),
            }
        }

        Err(StorageError::FileExists(
            self.directory.join(format!("{}.json", stem)),
        ))
    }
}

/// Writes `content` to a freshly created file, removing it again if the
/// write fails so no truncated result is left behind.
fn write_or_remove<W: Write>(
    path: &Path,
    mut file: W,
    content: &[u8],
) -> Result<(), StorageError> {
    if let Err(e) = file.write_all(content).and_then(|_| file.flush()) {
        drop(file);
        let _ = std::fs::remove_file(path);
        return Err(StorageError::WriteFile {
            path: path.to_path_buf(),
            source: e,
        });
    }
    Ok(())
}
