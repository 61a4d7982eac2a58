//! Artifact sinks.

use std::io::Write;
use std::path::{Path, PathBuf};

use common::errors::RenderError;
use common::models::chart::OutputFormat;
use tempfile::NamedTempFile;
use tracing::debug;

/// Destination of a rendered artifact.
///
/// A sink receives the finished artifact in one call; it never sees a
/// partial render.
pub trait OutputSink: Send {
    /// Format the sink expects.
    fn format(&self) -> OutputFormat;

    /// Human-readable destination, used in errors and logs.
    fn describe(&self) -> String;

    fn write_artifact(&mut self, bytes: &[u8]) -> Result<(), RenderError>;
}

/// Writes the artifact to a file.
///
/// The bytes go to a temporary file in the same directory which is then
/// renamed over the target, so the target either holds the whole artifact
/// or is untouched.
#[derive(Debug, Clone)]
pub struct FileSink {
    path: PathBuf,
    format: OutputFormat,
}

impl FileSink {
    /// Sink whose format follows the file extension (SVG when unknown).
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let format = OutputFormat::from_path(&path).unwrap_or_default();
        Self { path, format }
    }

    pub fn with_format(mut self, format: OutputFormat) -> Self {
        self.format = format;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn sink_err(&self, source: std::io::Error) -> RenderError {
        RenderError::Sink {
            target: self.describe(),
            source,
        }
    }
}

impl OutputSink for FileSink {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn describe(&self) -> String {
        self.path.display().to_string()
    }

    fn write_artifact(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
            _ => PathBuf::from("."),
        };
        std::fs::create_dir_all(&dir).map_err(|e| self.sink_err(e))?;

        let mut tmp = NamedTempFile::new_in(&dir).map_err(|e| self.sink_err(e))?;
        tmp.write_all(bytes).map_err(|e| self.sink_err(e))?;
        tmp.flush().map_err(|e| self.sink_err(e))?;
        tmp.persist(&self.path).map_err(|e| self.sink_err(e.error))?;

        debug!(path = %self.path.display(), bytes = bytes.len(), "artifact written");
        Ok(())
    }
}

/// Keeps the artifact in memory.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    format: OutputFormat,
    bytes: Vec<u8>,
}

impl MemorySink {
    pub fn new(format: OutputFormat) -> Self {
        Self {
            format,
            bytes: Vec::new(),
        }
    }

    pub fn bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

impl OutputSink for MemorySink {
    fn format(&self) -> OutputFormat {
        self.format
    }

    fn describe(&self) -> String {
        format!("memory ({})", self.format)
    }

    fn write_artifact(&mut self, bytes: &[u8]) -> Result<(), RenderError> {
        self.bytes = bytes.to_vec();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_sink_format_follows_extension() {
        assert_eq!(FileSink::new("out/chart.png").format(), OutputFormat::Png);
        assert_eq!(FileSink::new("chart").format(), OutputFormat::Svg);
        assert_eq!(
            FileSink::new("chart").with_format(OutputFormat::Csv).format(),
            OutputFormat::Csv
        );
    }

    #[test]
    fn test_file_sink_creates_parent_dirs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/deeper/chart.csv");
        let mut sink = FileSink::new(&path);
        sink.write_artifact(b"x,y\n").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"x,y\n");
    }

    #[test]
    fn test_memory_sink_replaces_content() {
        let mut sink = MemorySink::new(OutputFormat::Json);
        sink.write_artifact(b"first").unwrap();
        sink.write_artifact(b"second").unwrap();
        assert_eq!(sink.bytes(), b"second");
    }
}
