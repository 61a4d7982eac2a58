//! 报表文件存储
//!
//! 渲染结果保存为 `<output_dir>/<report_id>.<ext>`

use std::path::{Path, PathBuf};

use common::errors::{AppError, AppResult};
use common::models::OutputFormat;
use common::utils::IdGenerator;
use reporter::FileSink;

const FORMATS: [OutputFormat; 4] = [
    OutputFormat::Svg,
    OutputFormat::Png,
    OutputFormat::Json,
    OutputFormat::Csv,
];

/// Directory of rendered artifacts keyed by report ID.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn path_for(&self, report_id: &str, format: OutputFormat) -> PathBuf {
        self.root
            .join(format!("{}.{}", report_id, format.extension()))
    }

    /// File sink for a new artifact.
    pub fn sink(&self, report_id: &str, format: OutputFormat) -> FileSink {
        FileSink::new(self.path_for(report_id, format)).with_format(format)
    }

    /// Reads a stored artifact.
    ///
    /// IDs that were not generated here are reported as not found without
    /// touching the file system.
    pub async fn load(&self, report_id: &str) -> AppResult<(OutputFormat, Vec<u8>)> {
        if !IdGenerator::is_valid(report_id) {
            return Err(AppError::NotFound(format!("report {}", report_id)));
        }

        for format in FORMATS {
            match tokio::fs::read(self.path_for(report_id, format)).await {
                Ok(bytes) => return Ok((format, bytes)),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => {
                    return Err(AppError::Internal(format!(
                        "读取报表文件失败 {}: {}",
                        report_id, e
                    )))
                }
            }
        }
        Err(AppError::NotFound(format!("report {}", report_id)))
    }
}
