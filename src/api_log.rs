use std::path::{Path, PathBuf};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;

use crate::constants::{API_CALL_LOG_FILE, API_CALL_LOG_MAX_BYTES};
use crate::models::GenerationLogEntry;

/// Append-only record of every generation that produced an image, one JSON
/// object per line. When the file grows past `max_bytes` it is moved aside
/// to the next free `<name>.N` and a fresh file is started, so earlier
/// archives are never overwritten.
#[derive(Debug, Clone)]
pub struct ApiCallLog {
    path: PathBuf,
    max_bytes: u64,
}

impl Default for ApiCallLog {
    fn default() -> Self {
        Self::new(API_CALL_LOG_FILE)
    }
}

impl ApiCallLog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            max_bytes: API_CALL_LOG_MAX_BYTES,
        }
    }

    pub fn with_max_bytes(mut self, max_bytes: u64) -> Self {
        self.max_bytes = max_bytes;
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn append(&self, entry: &GenerationLogEntry) -> Result<(), String> {
        self.rotate_if_needed().await?;

        let mut line = serde_json::to_string(entry)
            .map_err(|err| format!("Unable to serialise generation log entry: {}", err))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|err| format!("Failed to open '{}': {}", self.path.display(), err))?;

        file.write_all(line.as_bytes())
            .await
            .map_err(|err| format!("Failed to write generation log: {}", err))?;
        file.flush()
            .await
            .map_err(|err| format!("Failed to flush generation log: {}", err))
    }

    /// Entries of the live file only.
    pub async fn read_entries(&self) -> Result<Vec<GenerationLogEntry>, String> {
        read_entries_from(&self.path).await
    }

    /// Every entry ever written, oldest archive first, live file last.
    pub async fn read_all_entries(&self) -> Result<Vec<GenerationLogEntry>, String> {
        let mut entries = Vec::new();
        for index in 1.. {
            let archive = self.archive_path(index);
            if !fs::try_exists(&archive).await.unwrap_or(false) {
                break;
            }
            entries.extend(read_entries_from(&archive).await?);
        }
        entries.extend(read_entries_from(&self.path).await?);
        Ok(entries)
    }

    fn archive_path(&self, index: usize) -> PathBuf {
        let mut name = self.path.as_os_str().to_owned();
        name.push(format!(".{index}"));
        PathBuf::from(name)
    }

    async fn next_archive_path(&self) -> PathBuf {
        let mut index = 1;
        loop {
            let candidate = self.archive_path(index);
            if !fs::try_exists(&candidate).await.unwrap_or(false) {
                return candidate;
            }
            index += 1;
        }
    }

    async fn rotate_if_needed(&self) -> Result<(), String> {
        let size = match fs::metadata(&self.path).await {
            Ok(metadata) => metadata.len(),
            Err(_) => return Ok(()),
        };

        if size < self.max_bytes {
            return Ok(());
        }

        let archive = self.next_archive_path().await;
        fs::rename(&self.path, &archive)
            .await
            .map_err(|err| format!("Failed to rotate generation log: {}", err))
    }
}

async fn read_entries_from(path: &Path) -> Result<Vec<GenerationLogEntry>, String> {
    let contents = match fs::read_to_string(path).await {
        Ok(contents) => contents,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
        Err(err) => return Err(format!("Unable to read generation log: {}", err)),
    };

    contents
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| {
            serde_json::from_str(line)
                .map_err(|err| format!("Unable to parse generation log: {}", err))
        })
        .collect()
}
