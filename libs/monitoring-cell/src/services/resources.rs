use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing::{instrument, warn};

use crate::models::{PerformanceSnapshot, ResourceUsage};
use crate::services::query::run_blocking;
use shared_utils::format::human_bytes;

/// Measures on-disk footprint of the log and workspace directories.
pub struct ResourceInspector {
    log_dir: PathBuf,
    workspace_dir: PathBuf,
    timeout: Duration,
}

impl ResourceInspector {
    pub fn new(log_dir: PathBuf, workspace_dir: PathBuf, timeout: Duration) -> Self {
        Self {
            log_dir,
            workspace_dir,
            timeout,
        }
    }

    #[instrument(skip(self, performance))]
    pub async fn usage(&self, performance: &PerformanceSnapshot) -> ResourceUsage {
        let log_dir = self.log_dir.clone();
        let workspace_dir = self.workspace_dir.clone();

        let (logs_bytes, workspace_bytes) =
            match run_blocking(self.timeout, move || (dir_size(&log_dir), dir_size(&workspace_dir))).await {
                Ok(sizes) => sizes,
                Err(e) => {
                    warn!("Directory sizes unavailable: {}", e);
                    (0, 0)
                }
            };

        ResourceUsage {
            disk_usage_percent: performance.system.disk_percent,
            logs_human: human_bytes(logs_bytes),
            workspace_human: human_bytes(workspace_bytes),
        }
    }
}

/// Total size of regular files under `path`. Unreadable entries count as zero and
/// symlinks are not followed.
pub fn dir_size(path: &Path) -> u64 {
    let entries = match fs::read_dir(path) {
        Ok(entries) => entries,
        Err(_) => return 0,
    };

    entries
        .filter_map(Result::ok)
        .map(|entry| match entry.file_type() {
            Ok(kind) if kind.is_dir() => dir_size(&entry.path()),
            Ok(kind) if kind.is_file() => entry.metadata().map(|m| m.len()).unwrap_or(0),
            _ => 0,
        })
        .sum()
}
