//! Run directory and artifact persistence.
//!
//! A [`RunContext`] names one timestamped directory per run. The directory
//! is created on first use and reused by every clone of the context.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use serde::Serialize;
use tempfile::NamedTempFile;
use tracing::info;

use crate::config::OutputFormat;
use crate::error::{CineNotesError, Result};

const RUN_DIR_FORMAT: &str = "%Y_%m_%d__%H_%M_%S";

/// Content handed to [`RunContext::save`].
#[derive(Debug, Clone, PartialEq)]
pub enum ArtifactContent {
    Text(String),
    Json(serde_json::Value),
    Binary(Vec<u8>),
}

impl ArtifactContent {
    fn kind(&self) -> &'static str {
        match self {
            ArtifactContent::Text(_) => "text",
            ArtifactContent::Json(_) => "json",
            ArtifactContent::Binary(_) => "binary",
        }
    }
}

#[derive(Debug)]
struct RunContextInner {
    base_dir: PathBuf,
    run_dir: Mutex<Option<PathBuf>>,
}

#[derive(Debug, Clone)]
pub struct RunContext {
    inner: Arc<RunContextInner>,
}

impl RunContext {
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(RunContextInner {
                base_dir: base_dir.into(),
                run_dir: Mutex::new(None),
            }),
        }
    }

    pub fn base_dir(&self) -> &Path {
        &self.inner.base_dir
    }

    /// The run directory, created on first call.
    pub fn run_dir(&self) -> Result<PathBuf> {
        let mut guard = self
            .inner
            .run_dir
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());

        if let Some(dir) = guard.as_ref() {
            return Ok(dir.clone());
        }

        let stamp = chrono::Local::now().format(RUN_DIR_FORMAT).to_string();
        let dir = self.inner.base_dir.join(stamp);
        std::fs::create_dir_all(&dir).map_err(|source| CineNotesError::Persistence {
            path: dir.clone(),
            source,
        })?;
        info!("Run directory created: {}", dir.display());

        *guard = Some(dir.clone());
        Ok(dir)
    }

    /// Save a string as a text file.
    pub fn save_text(&self, filename: &str, content: &str) -> Result<PathBuf> {
        let path = self.write_atomic(filename, content.as_bytes())?;
        info!("Text file saved: {}", path.display());
        Ok(path)
    }

    /// Save data as pretty-printed JSON.
    pub fn save_json<T: Serialize + ?Sized>(&self, filename: &str, data: &T) -> Result<PathBuf> {
        let body = serde_json::to_vec_pretty(data)?;
        let path = self.write_atomic(filename, &body)?;
        info!("JSON file saved: {}", path.display());
        Ok(path)
    }

    /// Save raw bytes.
    pub fn save_binary(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let path = self.write_atomic(filename, data)?;
        info!("Binary file saved: {}", path.display());
        Ok(path)
    }

    /// Save `content` as `<base_name>.<ext>` for `format`.
    ///
    /// The content kind must match the format; nothing is written otherwise.
    pub fn save(
        &self,
        base_name: &str,
        content: &ArtifactContent,
        format: OutputFormat,
    ) -> Result<PathBuf> {
        let filename = format!("{}.{}", base_name, format.extension());
        match (format, content) {
            (OutputFormat::Text, ArtifactContent::Text(text)) => self.save_text(&filename, text),
            (OutputFormat::Json, ArtifactContent::Json(value)) => self.save_json(&filename, value),
            (OutputFormat::Binary, ArtifactContent::Binary(bytes)) => {
                self.save_binary(&filename, bytes)
            }
            (format, content) => Err(CineNotesError::TypeMismatch(format!(
                "{} format cannot store {} content",
                format,
                content.kind()
            ))),
        }
    }

    /// Write through a temp file in the run directory, then rename into place.
    fn write_atomic(&self, filename: &str, data: &[u8]) -> Result<PathBuf> {
        let dir = self.run_dir()?;
        let path = dir.join(filename);
        let persist_err = |source: std::io::Error| CineNotesError::Persistence {
            path: path.clone(),
            source,
        };

        let mut file = NamedTempFile::new_in(&dir).map_err(persist_err)?;
        file.write_all(data).map_err(persist_err)?;
        file.as_file().sync_all().map_err(persist_err)?;
        file.persist(&path).map_err(|e| persist_err(e.error))?;

        Ok(path)
    }
}
