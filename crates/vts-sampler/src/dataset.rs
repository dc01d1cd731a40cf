use std::sync::Arc;

use rand::Rng;
use thiserror::Error;

use vts_core::config::{ConfigError, SamplerConfig};
use vts_core::types::{CaptionPayload, LogicalSample, ManifestEntry, SampleResult, Window};
use vts_manifest::captions::{CaptionError, CaptionTable};
use vts_manifest::embeddings::{EmbeddingError, EmbeddingStore};
use vts_manifest::ManifestIndex;
use vts_observe::metrics::Counter;

use crate::align::select_caption;
use crate::decode::{DecodeError, DecodeRequest, FrameTransform, TextEncoder, VideoDecoder};
use crate::spatial::{plan_spatial, sampling_rate, SpatialPlan};
use crate::window::{plan_uniform_window, reconcile_to_fixed_duration, ClipPosition};

#[derive(Debug, Default)]
pub struct SamplerMetrics {
    pub fetch_attempts_total: Counter,
    pub decode_failures_total: Counter,
    pub caption_failures_total: Counter,
    pub substitutions_total: Counter,
    pub fetch_exhausted_total: Counter,
    pub delivered_samples_total: Counter,
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("fetch exhausted after {attempts} attempts (last index {last_index})")]
    Exhausted { attempts: u32, last_index: usize },
}

/// One attempt's recoverable failure; every variant triggers the
/// substitute-and-retry policy.
#[derive(Debug, Error)]
enum AttemptFailure {
    #[error(transparent)]
    Decode(#[from] DecodeError),
    #[error(transparent)]
    Caption(#[from] CaptionError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
}

/// The per-item sampling engine: manifest lookup, window planning,
/// caption alignment, and the bounded retry loop around the external
/// decoder. Immutable after construction; safe to share across worker
/// threads, each fetching with its own RNG.
pub struct Dataset<D, T, X>
where
    D: VideoDecoder,
    T: TextEncoder,
    X: FrameTransform<D::Frames>,
{
    cfg: SamplerConfig,
    index: ManifestIndex,
    decoder: D,
    encoder: Option<T>,
    transform: X,
    metrics: Arc<SamplerMetrics>,
}

impl<D, T, X> Dataset<D, T, X>
where
    D: VideoDecoder,
    T: TextEncoder,
    X: FrameTransform<D::Frames>,
{
    pub fn new(
        cfg: SamplerConfig,
        index: ManifestIndex,
        decoder: D,
        encoder: Option<T>,
        transform: X,
    ) -> Result<Self, ConfigError> {
        cfg.validate()?;
        if index.num_samples() == 0 {
            return Err(ConfigError::Invalid(
                "manifest index has no samples".to_string(),
            ));
        }
        if cfg.caption_dir.is_some() && index.has_inline_captions() {
            return Err(ConfigError::Invalid(
                "caption_dir and inline manifest captions are mutually exclusive".to_string(),
            ));
        }
        if cfg.embedding_dir.is_some() && cfg.caption_dir.is_none() {
            return Err(ConfigError::Invalid(
                "embedding_dir requires caption_dir (stores are caption-row aligned)".to_string(),
            ));
        }
        let captions_configured = cfg.caption_dir.is_some() || index.has_inline_captions();
        if captions_configured && encoder.is_none() {
            return Err(ConfigError::Invalid(
                "a text encoder is required when captions are configured".to_string(),
            ));
        }
        Ok(Self {
            cfg,
            index,
            decoder,
            encoder,
            transform,
            metrics: Arc::new(SamplerMetrics::default()),
        })
    }

    pub fn metrics(&self) -> Arc<SamplerMetrics> {
        self.metrics.clone()
    }

    pub fn config(&self) -> &SamplerConfig {
        &self.cfg
    }

    /// Reported dataset length: the true logical-sample count, times
    /// `epoch_multiplier` in train mode.
    pub fn len(&self) -> usize {
        let n = self.index.num_samples();
        if matches!(self.cfg.mode, vts_core::types::Mode::Train) && self.cfg.epoch_multiplier > 1 {
            n * self.cfg.epoch_multiplier as usize
        } else {
            n
        }
    }

    pub fn is_empty(&self) -> bool {
        self.index.num_samples() == 0
    }

    pub fn fetch<R: Rng>(
        &self,
        sample_index: usize,
        rng: &mut R,
    ) -> Result<SampleResult<D::Frames>, FetchError> {
        self.fetch_opts(sample_index, None, rng)
    }

    /// Fetches one sample, retrying with index substitution on
    /// recoverable failures. `short_cycle` is the multigrid
    /// short-cycle index, when the caller runs one.
    pub fn fetch_opts<R: Rng>(
        &self,
        sample_index: usize,
        short_cycle: Option<usize>,
        rng: &mut R,
    ) -> Result<SampleResult<D::Frames>, FetchError> {
        let true_len = self.index.num_samples();
        // Oversampled epochs hand out indices past the true length.
        let mut index = sample_index % true_len;

        for attempt in 0..self.cfg.num_retries {
            self.metrics.fetch_attempts_total.inc();
            let Some((sample, entry)) = self.index.sample(index) else {
                break;
            };
            let position = self.clip_position(sample);
            let spatial = plan_spatial(&self.cfg, sample, short_cycle);
            let rate = sampling_rate(&self.cfg, rng);

            match self.try_sample(entry, index, position, &spatial, rate, rng) {
                Ok(result) => {
                    self.metrics.delivered_samples_total.inc();
                    return Ok(result);
                }
                Err(failure) => {
                    match &failure {
                        AttemptFailure::Decode(_) => self.metrics.decode_failures_total.inc(),
                        AttemptFailure::Caption(_) | AttemptFailure::Embedding(_) => {
                            self.metrics.caption_failures_total.inc()
                        }
                    }
                    tracing::warn!(
                        event = "sample_attempt_failed",
                        sample_index = index as u64,
                        path = entry.path.as_str(),
                        attempt = attempt,
                        error = %failure,
                        "failed to fetch sample"
                    );
                    // Test mode stays deterministic for as long as it
                    // can; everything else swaps the broken video out
                    // immediately.
                    let substitute = if self.cfg.mode.is_test() {
                        attempt > self.cfg.num_retries / 2
                    } else {
                        true
                    };
                    if substitute {
                        let replacement = rng.gen_range(0..true_len);
                        self.metrics.substitutions_total.inc();
                        tracing::warn!(
                            event = "index_substituted",
                            sample_index = index as u64,
                            substitute = replacement as u64,
                            attempt = attempt,
                            "substituting a random sample"
                        );
                        index = replacement;
                    }
                }
            }
        }

        self.metrics.fetch_exhausted_total.inc();
        tracing::error!(
            event = "fetch_exhausted",
            sample_index = index as u64,
            attempts = self.cfg.num_retries,
            "retry budget exhausted"
        );
        Err(FetchError::Exhausted {
            attempts: self.cfg.num_retries,
            last_index: index,
        })
    }

    fn clip_position(&self, sample: LogicalSample) -> ClipPosition {
        if self.cfg.mode.is_test() {
            ClipPosition::Index(sample.temporal_index(self.cfg.spatial_crops))
        } else {
            ClipPosition::Random
        }
    }

    fn try_sample<R: Rng>(
        &self,
        entry: &ManifestEntry,
        index: usize,
        position: ClipPosition,
        spatial: &SpatialPlan,
        rate: u32,
        rng: &mut R,
    ) -> Result<SampleResult<D::Frames>, AttemptFailure> {
        let duration = entry.duration as f64;
        let mut window: Option<Window> = entry
            .fixed
            .map(|f| Window::new(f.start as f64, f.end as f64));
        let mut caption: Option<CaptionPayload> = None;

        if let Some(dir) = &self.cfg.caption_dir {
            let table = CaptionTable::load(dir, entry.video_id())?;
            let Some(aligned) =
                select_caption(table.records(), window, self.cfg.min_caption_words, rng)
            else {
                return Err(CaptionError::Empty {
                    path: dir.join(format!("{}.csv", entry.video_id())),
                }
                .into());
            };

            let embedding = match &self.cfg.embedding_dir {
                Some(edir) => {
                    let store = EmbeddingStore::load(edir, entry.video_id())?;
                    let row = store.row(aligned.index).ok_or_else(|| {
                        EmbeddingError::RowOutOfRange {
                            path: edir.join(format!("{}.emb", entry.video_id())),
                            row: aligned.index,
                            rows: store.rows(),
                        }
                    })?;
                    Some(row.to_vec())
                }
                None => None,
            };

            caption = Some(self.caption_payload(&aligned.record.text, embedding));
            // Caption alignment precedes and constrains the frame
            // window whenever no fixed window pre-empts it.
            window = Some(Window::new(aligned.record.start, aligned.record.end));
        } else if let Some(text) = &entry.caption_text {
            caption = Some(self.caption_payload(text, None));
        }

        let fd = self.cfg.fixed_duration;
        let num_clips = self.cfg.ensemble_views;
        let mut w = match window {
            Some(w) => w,
            None => plan_uniform_window(duration, fd, position, num_clips, rng),
        };
        w = reconcile_to_fixed_duration(
            w,
            fd,
            f64::from(self.cfg.frames_per_clip()),
            duration,
            position,
            num_clips,
            rng,
        );
        if self.cfg.fix_end {
            if let Some(fixed) = entry.fixed {
                w = Window::new(fixed.start as f64, fixed.end as f64);
                if fd > 0.0 && fd < w.end - w.start {
                    let base = w.start;
                    let sub = plan_uniform_window(w.end - w.start, fd, position, num_clips, rng);
                    w = Window::new(base + sub.start, base + sub.end);
                }
            }
        }
        let w = w.clamp(duration);

        let request = DecodeRequest {
            path: entry.path.clone(),
            window: w,
            num_frames: self.cfg.frames_per_clip(),
            sampling_rate: rate,
            max_spatial_scale: spatial.min_scale,
        };
        let frames = self.decoder.decode(&request)?;
        let frames = self.transform.apply(frames, spatial);

        Ok(SampleResult {
            frames,
            label: entry.label,
            sample_index: index,
            caption,
        })
    }

    fn caption_payload(&self, text: &str, embedding: Option<Vec<f32>>) -> CaptionPayload {
        let resolved = if text.trim().is_empty() {
            " ".to_string()
        } else {
            text.to_string()
        };
        let tokens = self
            .encoder
            .as_ref()
            .map(|e| e.encode(&resolved))
            .unwrap_or_default();
        let mut target = vec![0.0f32; 1 + self.cfg.text_sample];
        target[0] = 1.0;
        CaptionPayload {
            text: resolved,
            tokens,
            target,
            embedding,
        }
    }
}
