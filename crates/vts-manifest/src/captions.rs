use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;

use vts_core::types::CaptionRecord;

#[derive(Debug, Error)]
pub enum CaptionError {
    #[error("caption table not found: {0}")]
    Missing(PathBuf),
    #[error("caption table {path} is empty")]
    Empty { path: PathBuf },
    #[error("caption table {path}: {source}")]
    Parse {
        path: PathBuf,
        source: csv::Error,
    },
}

/// Raw CSV row. `text` is optional because ASR tables routinely carry
/// blank cells; blanks become empty strings in the record.
#[derive(Debug, Deserialize)]
struct CaptionRow {
    start: f64,
    end: f64,
    text: Option<String>,
}

/// A per-video, read-only caption table. Row order defines the index
/// space shared with the embedding store.
#[derive(Debug, Clone)]
pub struct CaptionTable {
    records: Vec<CaptionRecord>,
}

impl CaptionTable {
    /// Loads `<dir>/<video_id>.csv` (columns `start,end,text`).
    pub fn load(dir: &Path, video_id: &str) -> Result<Self, CaptionError> {
        let path = dir.join(format!("{video_id}.csv"));
        let reader = match csv::Reader::from_path(&path) {
            Ok(r) => r,
            Err(err) => {
                if let csv::ErrorKind::Io(io) = err.kind() {
                    if io.kind() == std::io::ErrorKind::NotFound {
                        return Err(CaptionError::Missing(path));
                    }
                }
                return Err(CaptionError::Parse { path, source: err });
            }
        };
        Self::from_reader(reader, path)
    }

    fn from_reader<R: std::io::Read>(
        mut reader: csv::Reader<R>,
        path: PathBuf,
    ) -> Result<Self, CaptionError> {
        let mut records = Vec::new();
        for row in reader.deserialize::<CaptionRow>() {
            let row = row.map_err(|source| CaptionError::Parse {
                path: path.clone(),
                source,
            })?;
            records.push(CaptionRecord {
                start: row.start,
                end: row.end,
                text: row.text.unwrap_or_default(),
            });
        }
        if records.is_empty() {
            return Err(CaptionError::Empty { path });
        }
        Ok(Self { records })
    }

    pub fn records(&self) -> &[CaptionRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&CaptionRecord> {
        self.records.get(index)
    }
}
