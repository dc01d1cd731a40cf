#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

pub mod captions;
pub mod embeddings;

use std::path::Path;

use thiserror::Error;

use vts_core::types::{FixedWindow, LogicalSample, ManifestEntry};

#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("manifest not found: {0}")]
    NotFound(String),
    #[error("line {line}: expected 3, 5, or 6 fields, found {found}")]
    MalformedRow { line: usize, found: usize },
    #[error("line {line}: invalid {field}")]
    BadField { line: usize, field: &'static str },
    #[error("manifest {0} produced no entries")]
    Empty(String),
    #[error("manifest mixes rows with and without caption text")]
    MixedCaptionRows,
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

/// The loaded manifest: physical entries plus the expanded
/// logical-sample sequence (`entries.len() * num_clips` samples, each
/// tagged with its spatio-temporal index).
#[derive(Debug, Clone)]
pub struct ManifestIndex {
    entries: Vec<ManifestEntry>,
    samples: Vec<LogicalSample>,
    inline_captions: bool,
}

impl ManifestIndex {
    pub fn load(
        path: impl AsRef<Path>,
        separator: char,
        num_clips: u32,
        path_prefix: &str,
    ) -> Result<Self, ManifestError> {
        let path = path.as_ref();
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
                return Err(ManifestError::NotFound(path.display().to_string()));
            }
            Err(err) => return Err(ManifestError::Io(err)),
        };
        let index = Self::parse(&text, separator, num_clips, path_prefix)?;
        if index.entries.is_empty() {
            return Err(ManifestError::Empty(path.display().to_string()));
        }
        tracing::info!(
            event = "manifest_loaded",
            path = %path.display(),
            entries = index.entries.len() as u64,
            samples = index.samples.len() as u64,
            "loaded manifest"
        );
        Ok(index)
    }

    /// Parses manifest text without the on-disk existence/empty checks.
    pub fn parse(
        text: &str,
        separator: char,
        num_clips: u32,
        path_prefix: &str,
    ) -> Result<Self, ManifestError> {
        let mut entries: Vec<ManifestEntry> = Vec::new();
        let mut samples: Vec<LogicalSample> = Vec::new();
        let mut with_text: usize = 0;

        for (line_no, raw) in text.lines().enumerate() {
            let line = raw.trim_end_matches('\r');
            if line.trim().is_empty() {
                continue;
            }
            let fields: Vec<&str> = line.split(separator).collect();
            if !matches!(fields.len(), 3 | 5 | 6) {
                return Err(ManifestError::MalformedRow {
                    line: line_no + 1,
                    found: fields.len(),
                });
            }

            let stem = strip_extension(fields[0].trim());
            let path = join_prefix(path_prefix, stem);
            let label: i64 = fields[1].trim().parse().map_err(|_| ManifestError::BadField {
                line: line_no + 1,
                field: "label",
            })?;
            let duration = parse_whole_seconds(fields[2]).ok_or(ManifestError::BadField {
                line: line_no + 1,
                field: "duration",
            })?;

            let fixed = if fields.len() >= 5 {
                let start = parse_whole_seconds(fields[3]).ok_or(ManifestError::BadField {
                    line: line_no + 1,
                    field: "start",
                })?;
                let end = parse_whole_seconds(fields[4]).ok_or(ManifestError::BadField {
                    line: line_no + 1,
                    field: "end",
                })?;
                Some(FixedWindow { start, end })
            } else {
                None
            };

            let caption_text = if fields.len() == 6 {
                with_text += 1;
                Some(fields[5].replace("<>", " "))
            } else {
                None
            };

            let entry_ix = entries.len();
            entries.push(ManifestEntry {
                path,
                label,
                duration,
                fixed,
                caption_text,
            });
            for st_index in 0..num_clips {
                samples.push(LogicalSample {
                    entry: entry_ix,
                    st_index,
                });
            }
        }

        if with_text > 0 && with_text != entries.len() {
            return Err(ManifestError::MixedCaptionRows);
        }

        Ok(Self {
            inline_captions: with_text > 0 && !entries.is_empty(),
            entries,
            samples,
        })
    }

    pub fn entries(&self) -> &[ManifestEntry] {
        &self.entries
    }

    pub fn samples(&self) -> &[LogicalSample] {
        &self.samples
    }

    pub fn num_samples(&self) -> usize {
        self.samples.len()
    }

    /// True when every row carried inline caption text (6-field rows).
    pub fn has_inline_captions(&self) -> bool {
        self.inline_captions
    }

    pub fn sample(&self, index: usize) -> Option<(LogicalSample, &ManifestEntry)> {
        let sample = *self.samples.get(index)?;
        let entry = self.entries.get(sample.entry)?;
        Some((sample, entry))
    }
}

/// Drops the trailing extension (text after the final `.`) from the
/// last path component; extension resolution is the decoder's concern.
fn strip_extension(path: &str) -> &str {
    let base_start = path.rfind('/').map(|i| i + 1).unwrap_or(0);
    match path[base_start..].rfind('.') {
        Some(dot) => &path[..base_start + dot],
        None => path,
    }
}

fn join_prefix(prefix: &str, stem: &str) -> String {
    if prefix.is_empty() {
        return stem.to_string();
    }
    format!("{}/{}", prefix.trim_end_matches('/'), stem)
}

/// Manifest time fields are whole seconds but may be written as
/// floats; parse and truncate the way the reference did.
fn parse_whole_seconds(field: &str) -> Option<u64> {
    let v: f64 = field.trim().parse().ok()?;
    if !v.is_finite() || v < 0.0 {
        return None;
    }
    Some(v.trunc() as u64)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn three_field_rows_parse() {
        let index = ManifestIndex::parse("vid001.mp4,7,120\n", ',', 1, "/data").unwrap();
        assert_eq!(index.entries().len(), 1);
        let e = &index.entries()[0];
        assert_eq!(e.path, "/data/vid001");
        assert_eq!(e.label, 7);
        assert_eq!(e.duration, 120);
        assert!(e.fixed.is_none());
        assert!(e.caption_text.is_none());
    }

    #[test]
    fn five_field_rows_carry_fixed_window() {
        let index = ManifestIndex::parse("a.mp4,0,60,5,25\n", ',', 1, "").unwrap();
        let e = &index.entries()[0];
        assert_eq!(e.fixed, Some(FixedWindow { start: 5, end: 25 }));
    }

    #[test]
    fn six_field_rows_replace_angle_tokens() {
        let index =
            ManifestIndex::parse("a.mp4,0,60,5,25,hello<>there\n", ',', 1, "").unwrap();
        let e = &index.entries()[0];
        assert_eq!(e.caption_text.as_deref(), Some("hello there"));
        assert!(index.has_inline_captions());
    }

    #[test]
    fn four_field_rows_are_rejected() {
        let err = ManifestIndex::parse("a.mp4,0,60,5\n", ',', 1, "").unwrap_err();
        match err {
            ManifestError::MalformedRow { line: 1, found: 4 } => {}
            other => panic!("expected MalformedRow, got {other:?}"),
        }
    }

    #[test]
    fn mixed_caption_rows_are_rejected() {
        let text = "a.mp4,0,60,5,25,words\nb.mp4,1,60\n";
        let err = ManifestIndex::parse(text, ',', 1, "").unwrap_err();
        assert!(matches!(err, ManifestError::MixedCaptionRows));
    }

    #[test]
    fn num_clips_expansion_tags_every_replica() {
        let text = "a.mp4,0,60\nb.mp4,1,30\n";
        let index = ManifestIndex::parse(text, ',', 6, "").unwrap();
        assert_eq!(index.num_samples(), 12);
        let (s, e) = index.sample(7).unwrap();
        assert_eq!(s.entry, 1);
        assert_eq!(s.st_index, 1);
        assert_eq!(e.path, "b");
    }

    #[test]
    fn parse_is_idempotent() {
        let text = "a.mp4,0,60\nb.mp4,1,30\nc.webm,2,90\n";
        let first = ManifestIndex::parse(text, ',', 2, "").unwrap();
        let second = ManifestIndex::parse(text, ',', 2, "").unwrap();
        assert_eq!(first.num_samples(), second.num_samples());
        assert_eq!(first.samples(), second.samples());
        assert_eq!(first.entries(), second.entries());
    }

    #[test]
    fn duration_accepts_float_text() {
        let index = ManifestIndex::parse("a.mp4,0,59.94\n", ',', 1, "").unwrap();
        assert_eq!(index.entries()[0].duration, 59);
    }

    #[test]
    fn extension_strip_keeps_dotted_directories() {
        assert_eq!(strip_extension("run.1/clip.mp4"), "run.1/clip");
        assert_eq!(strip_extension("run.1/clip"), "run.1/clip");
        assert_eq!(strip_extension("clip.tar.gz"), "clip.tar");
    }

    #[test]
    fn missing_file_is_not_found() {
        let err = ManifestIndex::load("/nonexistent/vts-manifest.csv", ',', 1, "")
            .unwrap_err();
        assert!(matches!(err, ManifestError::NotFound(_)));
    }
}
