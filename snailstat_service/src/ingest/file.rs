/// Snapshot file provider
///
/// Reads an analytics snapshot exported to disk. The file may hold the full
/// API envelope or just its `data` object.

use crate::ingest::normalize::parse_snapshot;
use crate::ingest::DatasetProvider;
use crate::logging::{self, Component};
use crate::model::{Dataset, FetchError};
use std::path::{Path, PathBuf};

pub struct FileDatasetProvider {
    path: PathBuf,
}

impl FileDatasetProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DatasetProvider for FileDatasetProvider {
    fn fetch(&self) -> Result<Dataset, FetchError> {
        let body = std::fs::read_to_string(&self.path)
            .map_err(|e| FetchError::Io(format!("{}: {}", self.path.display(), e)))?;
        let (dataset, report) = parse_snapshot(&body, true)?;
        logging::info(
            Component::Dataset,
            Some(&self.path.display().to_string()),
            &format!(
                "loaded {} observations ({} malformed dropped)",
                dataset.observations.len(),
                report.total_dropped()
            ),
        );
        Ok(dataset)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}
