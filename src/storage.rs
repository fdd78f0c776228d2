use std::fs;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{Task, Timesheet};

const TASKS_MARKER: &str = "\n=== TASKS ===\n";
const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse TOML header: {0}")]
    TomlDecode(#[from] toml::de::Error),
    #[error("failed to encode TOML header: {0}")]
    TomlEncode(#[from] toml::ser::Error),
    #[error("failed to parse task on line {line}: {source}")]
    JsonDecode {
        line: usize,
        source: serde_json::Error,
    },
    #[error("failed to encode task: {0}")]
    JsonEncode(serde_json::Error),
    #[error("unsupported data file version {0}")]
    UnsupportedVersion(u32),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataHeader {
    pub schema_version: u32,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub timesheets: Vec<Timesheet>,
}

impl DataHeader {
    pub fn new() -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            created_at: Utc::now(),
            timesheets: Vec::new(),
        }
    }
}

/// Contents of the local data file: weekly summaries in a TOML header,
/// followed by one JSON task per line.
#[derive(Debug, Clone)]
pub struct DataFile {
    pub header: DataHeader,
    pub tasks: Vec<Task>,
}

impl DataFile {
    pub fn new() -> Self {
        Self {
            header: DataHeader::new(),
            tasks: Vec::new(),
        }
    }

    pub fn with_timesheets(timesheets: Vec<Timesheet>) -> Self {
        let mut data = Self::new();
        data.header.timesheets = timesheets;
        data
    }

    pub fn tasks_for<'a>(&'a self, timesheet_id: &'a str) -> impl Iterator<Item = &'a Task> + 'a {
        self.tasks.iter().filter(move |task| task.timesheet_id == timesheet_id)
    }
}

pub fn load_data(path: &Path) -> Result<DataFile, StorageError> {
    let raw = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(err) if err.kind() == ErrorKind::NotFound => return Ok(DataFile::new()),
        Err(err) => return Err(StorageError::Io(err)),
    };

    if raw.trim().is_empty() {
        return Ok(DataFile::new());
    }

    let (header_blob, tasks_blob) = if let Some((header, tasks)) = raw.split_once(TASKS_MARKER) {
        (header, tasks)
    } else {
        (raw.as_str(), "")
    };

    let header: DataHeader = toml::from_str(header_blob)?;
    if header.schema_version > SCHEMA_VERSION {
        return Err(StorageError::UnsupportedVersion(header.schema_version));
    }

    let mut tasks = Vec::new();
    for (index, line) in tasks_blob.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let task = serde_json::from_str(line).map_err(|source| StorageError::JsonDecode {
            line: index + 1,
            source,
        })?;
        tasks.push(task);
    }

    Ok(DataFile { header, tasks })
}

/// Writes to a sibling temp file and renames it over `path`, so a failed
/// save leaves the previous contents in place.
pub fn save_data(path: &Path, data: &DataFile) -> Result<(), StorageError> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let header = toml::to_string_pretty(&data.header)?;
    let temp_path = temp_path_for(path);
    let mut file = fs::File::create(&temp_path)?;
    file.write_all(header.as_bytes())?;
    file.write_all(TASKS_MARKER.as_bytes())?;

    for task in &data.tasks {
        let line = serde_json::to_string(task).map_err(StorageError::JsonEncode)?;
        file.write_all(line.as_bytes())?;
        file.write_all(b"\n")?;
    }
    file.sync_all()?;
    drop(file);

    fs::rename(&temp_path, path)?;
    Ok(())
}

fn temp_path_for(path: &Path) -> PathBuf {
    let mut name = path
        .file_name()
        .map(|name| name.to_os_string())
        .unwrap_or_default();
    name.push(".tmp");
    path.with_file_name(name)
}
