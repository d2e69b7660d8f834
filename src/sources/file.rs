use std::path::PathBuf;

use super::LogFetcher;
use crate::error::FetchError;

/// A log source that re-reads a local file on every poll
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: PathBuf) -> Self {
        Self { path }
    }
}

#[async_trait::async_trait]
impl LogFetcher for FileSource {
    async fn fetch(&self) -> Result<String, FetchError> {
        let bytes = tokio::fs::read(&self.path).await?;
        // Logs are not guaranteed to be valid UTF-8
        Ok(String::from_utf8_lossy(&bytes).into_owned())
    }

    fn name(&self) -> String {
        self.path
            .file_name()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| self.path.display().to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[tokio::test]
    async fn test_fetch_reads_whole_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "first").unwrap();
        writeln!(file, "second").unwrap();

        let source = FileSource::new(file.path().to_path_buf());
        assert_eq!(source.fetch().await.unwrap(), "first\nsecond\n");

        writeln!(file, "third").unwrap();
        assert_eq!(source.fetch().await.unwrap(), "first\nsecond\nthird\n");
    }

    #[tokio::test]
    async fn test_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let source = FileSource::new(dir.path().join("gone.log"));
        assert!(matches!(source.fetch().await, Err(FetchError::Io(_))));
    }

    #[tokio::test]
    async fn test_invalid_utf8_is_replaced() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(b"ok \xff bytes\n").unwrap();
        let source = FileSource::new(file.path().to_path_buf());
        assert_eq!(source.fetch().await.unwrap(), "ok \u{fffd} bytes\n");
    }
}
