use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Dataset split. Train and val sample one clip per video at random;
/// test tiles every video into `ensemble_views * spatial_crops`
/// deterministic logical samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Train,
    Val,
    Test,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unknown mode {0:?} (expected train, val, or test)")]
pub struct ModeParseError(pub String);

impl Mode {
    pub fn parse(input: &str) -> Result<Self, ModeParseError> {
        match input.trim() {
            "train" => Ok(Mode::Train),
            "val" => Ok(Mode::Val),
            "test" => Ok(Mode::Test),
            other => Err(ModeParseError(other.to_string())),
        }
    }

    pub fn is_test(self) -> bool {
        matches!(self, Mode::Test)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Train => "train",
            Mode::Val => "val",
            Mode::Test => "test",
        }
    }
}

/// Manifest-declared clip bounds (5- and 6-field rows), whole seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FixedWindow {
    pub start: u64,
    pub end: u64,
}

/// One physical video from the manifest.
///
/// `path` is the location stem: prefix joined, trailing extension
/// stripped. Extension resolution is the decoder's concern.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ManifestEntry {
    pub path: String,
    pub label: i64,
    pub duration: u64,
    pub fixed: Option<FixedWindow>,
    /// Pre-resolved transcript for 6-field rows. Mutually exclusive
    /// with on-disk caption tables.
    pub caption_text: Option<String>,
}

impl ManifestEntry {
    /// Filename stem used to key per-video caption and embedding files.
    pub fn video_id(&self) -> &str {
        let base = self.path.rsplit('/').next().unwrap_or(&self.path);
        match base.rsplit_once('.') {
            Some((stem, _ext)) => stem,
            None => base,
        }
    }
}

/// `(entry, spatio-temporal index)` pair; one manifest row expands into
/// `num_clips` of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogicalSample {
    pub entry: usize,
    pub st_index: u32,
}

impl LogicalSample {
    pub fn temporal_index(&self, spatial_crops: u32) -> u32 {
        self.st_index / spatial_crops.max(1)
    }

    pub fn spatial_index(&self, spatial_crops: u32) -> u32 {
        self.st_index % spatial_crops.max(1)
    }
}

/// One timestamped transcript line. Tables are ordered by time but not
/// assumed gap-free or non-overlapping.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CaptionRecord {
    pub start: f64,
    pub end: f64,
    pub text: String,
}

impl CaptionRecord {
    pub fn word_count(&self) -> usize {
        self.text.split(' ').filter(|w| !w.is_empty()).count()
    }
}

/// A temporal window in seconds into a source video.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    pub start: f64,
    pub end: f64,
}

impl Window {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn len(&self) -> f64 {
        (self.end - self.start).max(0.0)
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    /// Seconds of overlap with `[start, end]`; zero when disjoint.
    pub fn overlap(&self, start: f64, end: f64) -> f64 {
        (self.end.min(end) - self.start.max(start)).max(0.0)
    }

    /// Clamps both bounds into `[0, duration]`, keeping start <= end.
    pub fn clamp(&self, duration: f64) -> Self {
        let start = self.start.clamp(0.0, duration);
        let end = self.end.clamp(start, duration);
        Self { start, end }
    }
}

/// Caption side of a produced sample.
#[derive(Debug, Clone, PartialEq)]
pub struct CaptionPayload {
    pub text: String,
    /// Fixed-shape token sequence from the external encoder.
    pub tokens: Vec<i64>,
    /// Label-smoothing target: `[1, 0, 0, ...]` of length `1 + text_sample`.
    pub target: Vec<f32>,
    pub embedding: Option<Vec<f32>>,
}

/// The assembled per-fetch result. Constructed fresh per call; nothing
/// in the engine retains it after returning.
#[derive(Debug, Clone)]
pub struct SampleResult<F> {
    pub frames: F,
    pub label: i64,
    /// Index of the sample actually delivered; differs from the
    /// requested index after a failure substitution.
    pub sample_index: usize,
    pub caption: Option<CaptionPayload>,
}
