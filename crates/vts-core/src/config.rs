use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::Mode;

/// Default bounded retry budget for `fetch`.
pub const DEFAULT_NUM_RETRIES: u32 = 20;

/// Every option the sampling engine recognizes, validated once at
/// construction. There is no ad-hoc attribute probing at call time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SamplerConfig {
    pub mode: Mode,
    /// Attempts before `fetch` reports exhaustion.
    pub num_retries: u32,
    /// Target window length in seconds; 0 disables fixed-duration
    /// reconciliation.
    pub fixed_duration: f64,
    /// Frames delivered per clip.
    pub num_frames: u32,
    /// Segment multiplier applied to `num_frames`; 0 means unsegmented.
    pub num_seg: u32,
    /// Frame sampling stride, in frames.
    pub sampling_rate: u32,
    /// Minimum caption word count; 0 disables neighbor merging.
    pub min_caption_words: usize,
    /// Sizes the label-smoothing target vector (`1 + text_sample`).
    pub text_sample: usize,
    /// Reuse manifest-declared start/end, bypassing caption-driven
    /// windowing.
    pub fix_end: bool,
    /// Oversampling factor for reported train-mode length.
    pub epoch_multiplier: u32,
    /// Temporal segments per video at test time.
    pub ensemble_views: u32,
    /// Spatial crops per temporal segment at test time.
    pub spatial_crops: u32,
    /// Manifest field separator.
    pub separator: char,
    /// Prefix joined onto every manifest path.
    pub path_prefix: String,
    /// Directory of per-video caption tables (`<video_id>.csv`).
    pub caption_dir: Option<PathBuf>,
    /// Directory of per-video embedding files, row-aligned with the
    /// caption tables.
    pub embedding_dir: Option<PathBuf>,
    /// Train-time spatial jitter scale range (short side, pixels).
    pub train_jitter_scales: (u32, u32),
    pub train_crop_size: u32,
    pub test_crop_size: u32,
    /// Multigrid long-cycle sampling rates; empty disables the long
    /// cycle and `sampling_rate` is used as-is.
    pub long_cycle_sampling_rates: Vec<u32>,
    /// Multigrid short-cycle crop factors for short-cycle indices 0/1.
    pub short_cycle_factors: [f64; 2],
    /// Multigrid base crop size; 0 disables short-cycle rescaling.
    pub multigrid_default_s: u32,
}

impl Default for SamplerConfig {
    fn default() -> Self {
        Self {
            mode: Mode::Train,
            num_retries: DEFAULT_NUM_RETRIES,
            fixed_duration: 0.0,
            num_frames: 8,
            num_seg: 0,
            sampling_rate: 8,
            min_caption_words: 0,
            text_sample: 0,
            fix_end: false,
            epoch_multiplier: 1,
            ensemble_views: 10,
            spatial_crops: 3,
            separator: ',',
            path_prefix: String::new(),
            caption_dir: None,
            embedding_dir: None,
            train_jitter_scales: (256, 320),
            train_crop_size: 224,
            test_crop_size: 256,
            long_cycle_sampling_rates: Vec::new(),
            short_cycle_factors: [0.5, 0.707],
            multigrid_default_s: 0,
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum ConfigError {
    #[error("invalid config: {0}")]
    Invalid(String),
}

impl SamplerConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.num_retries == 0 {
            return Err(ConfigError::Invalid("num_retries must be > 0".to_string()));
        }
        if self.num_frames == 0 {
            return Err(ConfigError::Invalid("num_frames must be > 0".to_string()));
        }
        if self.sampling_rate == 0 {
            return Err(ConfigError::Invalid(
                "sampling_rate must be > 0".to_string(),
            ));
        }
        if !self.fixed_duration.is_finite() || self.fixed_duration < 0.0 {
            return Err(ConfigError::Invalid(
                "fixed_duration must be finite and >= 0".to_string(),
            ));
        }
        if self.epoch_multiplier == 0 {
            return Err(ConfigError::Invalid(
                "epoch_multiplier must be >= 1".to_string(),
            ));
        }
        if self.ensemble_views == 0 {
            return Err(ConfigError::Invalid(
                "ensemble_views must be > 0".to_string(),
            ));
        }
        if self.spatial_crops == 0 {
            return Err(ConfigError::Invalid(
                "spatial_crops must be > 0".to_string(),
            ));
        }
        if self.train_jitter_scales.0 > self.train_jitter_scales.1 {
            return Err(ConfigError::Invalid(
                "train_jitter_scales min must be <= max".to_string(),
            ));
        }
        if self.train_crop_size == 0 || self.test_crop_size == 0 {
            return Err(ConfigError::Invalid("crop sizes must be > 0".to_string()));
        }
        Ok(())
    }

    /// Logical samples per manifest row for the active mode.
    pub fn num_clips(&self) -> u32 {
        match self.mode {
            Mode::Train | Mode::Val => 1,
            Mode::Test => self.ensemble_views * self.spatial_crops,
        }
    }

    /// Frames per delivered clip, segment multiplier applied.
    pub fn frames_per_clip(&self) -> u32 {
        self.num_frames * self.num_seg.max(1)
    }
}
