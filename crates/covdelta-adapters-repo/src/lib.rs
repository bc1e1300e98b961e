//! Filesystem report reader adapter.

use covdelta_ports::ReportReader;
use std::path::{Path, PathBuf};

/// Filesystem-backed report reader rooted at the workspace directory.
pub struct FsReportReader {
    root: PathBuf,
}

impl FsReportReader {
    /// Create a new filesystem reader rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The workspace root relative paths are resolved against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn resolve(&self, path: &str) -> PathBuf {
        if Path::new(path).is_absolute() {
            PathBuf::from(path)
        } else {
            self.root.join(path)
        }
    }
}

impl ReportReader for FsReportReader {
    fn read_report(&self, path: &str) -> Result<String, String> {
        let full_path = self.resolve(path);
        std::fs::read_to_string(&full_path)
            .map_err(|e| format!("{}: {}", full_path.display(), e))
    }
}
