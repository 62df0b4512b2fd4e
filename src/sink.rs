//! Override sinks that capture interactions instead of the cassette stack

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use chrono::Local;
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::interaction::Interaction;
use crate::Result;

/// Base name of the development log files
pub const LOG_FILE_STEM: &str = "http_interactions";

/// Destination that receives every interaction while installed on a deck
pub trait InteractionSink: Send + Sync + fmt::Debug {
    /// Capture one interaction
    ///
    /// # Errors
    ///
    /// Returns error if the interaction cannot be written
    fn log(&self, interaction: Interaction) -> Result<()>;
}

/// Appends interactions as JSON lines to a timestamped file
///
/// The file is named `http_interactions.<YYYY-MM-DD_HH-MM-SS.ffffff>.jsonl`,
/// with a `-N` suffix if that name is already taken. Every log gets a fresh
/// file. On unix `http_interactions.jsonl` is symlinked to the newest file.
pub struct DevelopmentLog {
    path: PathBuf,
    file: Mutex<File>,
}

impl DevelopmentLog {
    /// Create the log directory and an empty timestamped log file
    ///
    /// # Errors
    ///
    /// Returns error if the directory, file or symlink cannot be created
    pub fn create(dir: impl AsRef<Path>) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let timestamp = Local::now().format("%Y-%m-%d_%H-%M-%S%.6f").to_string();
        let (path, file) = create_unique(dir, &timestamp)?;
        link_latest(dir, &path)?;

        info!("Logging HTTP interactions to {}", path.display());

        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    /// Path of the timestamped log file
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Path of the stable `http_interactions.jsonl` link inside `dir`
    #[must_use]
    pub fn latest_link(dir: &Path) -> PathBuf {
        dir.join(format!("{LOG_FILE_STEM}.jsonl"))
    }
}

impl InteractionSink for DevelopmentLog {
    fn log(&self, interaction: Interaction) -> Result<()> {
        let mut line = serde_json::to_vec(&interaction)?;
        line.push(b'\n');

        let mut file = self.file.lock();
        file.write_all(&line)?;
        file.flush()?;

        debug!("Logged interaction for {}", interaction.uri());
        Ok(())
    }
}

impl fmt::Debug for DevelopmentLog {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DevelopmentLog")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

/// Create a new log file for `timestamp`, never reusing an existing one
fn create_unique(dir: &Path, timestamp: &str) -> Result<(PathBuf, File)> {
    let mut attempt = 0u32;
    loop {
        let name = if attempt == 0 {
            format!("{LOG_FILE_STEM}.{timestamp}.jsonl")
        } else {
            format!("{LOG_FILE_STEM}.{timestamp}-{attempt}.jsonl")
        };
        let path = dir.join(name);

        match OpenOptions::new().append(true).create_new(true).open(&path) {
            Ok(file) => return Ok((path, file)),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => attempt += 1,
            Err(e) => return Err(e.into()),
        }
    }
}

#[cfg(unix)]
fn link_latest(dir: &Path, target: &Path) -> Result<()> {
    let link = DevelopmentLog::latest_link(dir);
    if link.symlink_metadata().is_ok() {
        fs::remove_file(&link)?;
    }
    // Link by file name so the link stays valid if the directory moves
    let target = target.file_name().map_or_else(|| target.as_os_str(), |name| name);
    std::os::unix::fs::symlink(target, &link)?;
    Ok(())
}

#[cfg(not(unix))]
fn link_latest(_dir: &Path, _target: &Path) -> Result<()> {
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::interaction::{RecordedRequest, RecordedResponse};
    use tempfile::TempDir;

    fn interaction(path: &str) -> Interaction {
        Interaction::new(
            RecordedRequest::get(format!("http://example.com{path}")),
            RecordedResponse::new(200).with_body("ok"),
        )
    }

    #[test]
    fn test_creates_directory_and_empty_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path().join("logging_dir");

        let log = DevelopmentLog::create(&dir).unwrap();

        assert!(dir.is_dir());
        assert!(log.path().exists());
        assert_eq!(fs::metadata(log.path()).unwrap().len(), 0);
        let file_name = log.path().file_name().unwrap().to_str().unwrap();
        assert!(file_name.starts_with("http_interactions."));
        assert!(file_name.ends_with(".jsonl"));
    }

    #[test]
    fn test_writes_json_lines() {
        let temp_dir = TempDir::new().unwrap();
        let log = DevelopmentLog::create(temp_dir.path()).unwrap();

        log.log(interaction("/a")).unwrap();
        log.log(interaction("/b")).unwrap();

        let content = fs::read_to_string(log.path()).unwrap();
        let logged: Vec<Interaction> = content
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(logged, vec![interaction("/a"), interaction("/b")]);
    }

    #[test]
    fn test_back_to_back_logs_use_separate_files() {
        let temp_dir = TempDir::new().unwrap();

        let first = DevelopmentLog::create(temp_dir.path()).unwrap();
        first.log(interaction("/first")).unwrap();
        let second = DevelopmentLog::create(temp_dir.path()).unwrap();

        assert_ne!(first.path(), second.path());
        assert_eq!(fs::metadata(second.path()).unwrap().len(), 0);

        second.log(interaction("/second")).unwrap();
        let first_lines = fs::read_to_string(first.path()).unwrap();
        assert_eq!(first_lines.lines().count(), 1);
    }

    #[test]
    fn test_taken_name_gets_suffix() {
        let temp_dir = TempDir::new().unwrap();
        let taken = temp_dir.path().join("http_interactions.stamp.jsonl");
        fs::write(&taken, b"existing\n").unwrap();

        let (path, _file) = create_unique(temp_dir.path(), "stamp").unwrap();

        assert_eq!(path, temp_dir.path().join("http_interactions.stamp-1.jsonl"));
        assert_eq!(fs::read(&taken).unwrap(), b"existing\n");
        assert_eq!(fs::metadata(&path).unwrap().len(), 0);
    }

    #[cfg(unix)]
    #[test]
    fn test_latest_link_points_at_log() {
        let temp_dir = TempDir::new().unwrap();
        let log = DevelopmentLog::create(temp_dir.path()).unwrap();

        let link = DevelopmentLog::latest_link(temp_dir.path());
        assert_eq!(fs::read_link(&link).unwrap(), log.path().file_name().unwrap());
        assert_eq!(fs::canonicalize(&link).unwrap(), fs::canonicalize(log.path()).unwrap());

        // Creating another log replaces the link
        let again = DevelopmentLog::create(temp_dir.path()).unwrap();
        assert_eq!(fs::read_link(&link).unwrap(), again.path().file_name().unwrap());
    }
}
