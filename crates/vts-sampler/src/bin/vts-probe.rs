#![forbid(unsafe_code)]
#![cfg_attr(not(test), deny(clippy::expect_used, clippy::unwrap_used))]

//! Walks a manifest through the full fetch path with metadata-only
//! collaborators: the decoder probes the container file on disk
//! instead of decoding pixels, so broken manifests, caption sidecars,
//! and retry behavior can be checked without codec work.

use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use vts_core::config::SamplerConfig;
use vts_core::types::{Mode, Window};
use vts_manifest::ManifestIndex;
use vts_sampler::dataset::Dataset;
use vts_sampler::decode::{
    DecodeError, DecodeRequest, IdentityTransform, TextEncoder, VideoDecoder,
};
use vts_sampler::window::temporal_sampling;

const VIDEO_EXTENSIONS: &[&str] = &["mp4", "mkv", "webm", "avi", "mov"];

#[derive(Debug, Parser)]
#[command(name = "vts-probe")]
struct Args {
    /// Manifest file (`path<sep>label<sep>duration[...]` per line).
    #[arg(long, env = "VTS_MANIFEST")]
    manifest: PathBuf,

    /// Prefix joined onto every manifest path.
    #[arg(long, env = "VTS_PATH_PREFIX", default_value = "")]
    path_prefix: String,

    /// Dataset split: train, val, or test.
    #[arg(long, env = "VTS_MODE", default_value = "train")]
    mode: String,

    /// Manifest field separator.
    #[arg(long, default_value_t = ',')]
    separator: char,

    /// Number of fetches to run.
    #[arg(long, default_value_t = 8)]
    samples: usize,

    /// RNG seed for this worker.
    #[arg(long, default_value_t = 0)]
    seed: u64,

    /// Directory of per-video caption tables.
    #[arg(long, env = "VTS_CAPTION_DIR")]
    caption_dir: Option<PathBuf>,

    /// Directory of per-video embedding stores.
    #[arg(long, env = "VTS_EMBEDDING_DIR")]
    embedding_dir: Option<PathBuf>,

    /// Target window length in seconds (0 disables).
    #[arg(long, default_value_t = 8.0)]
    fixed_duration: f64,

    #[arg(long, default_value_t = 8)]
    num_frames: u32,

    /// Minimum caption word count before neighbor merging stops.
    #[arg(long, default_value_t = 0)]
    min_caption_words: usize,

    /// Bounded retry budget per fetch.
    #[arg(long, default_value_t = 20)]
    num_retries: u32,
}

/// Frame stand-in: where the clip would come from and which frame
/// indices a real decoder would pull.
#[derive(Debug)]
struct ProbedClip {
    resolved_path: PathBuf,
    file_bytes: u64,
    window: Window,
    frame_indices: Vec<usize>,
}

/// Resolves the extension-stripped stem against known container
/// extensions and stats the file; any miss is a media-access failure.
struct FileProbeDecoder;

impl VideoDecoder for FileProbeDecoder {
    type Frames = ProbedClip;

    fn decode(&self, request: &DecodeRequest) -> Result<Self::Frames, DecodeError> {
        let resolved = VIDEO_EXTENSIONS
            .iter()
            .map(|ext| PathBuf::from(format!("{}.{ext}", request.path)))
            .find(|p| p.is_file())
            .ok_or_else(|| DecodeError::MediaAccess {
                path: request.path.clone(),
                reason: "no container file with a known extension".to_string(),
            })?;
        let meta = std::fs::metadata(&resolved).map_err(|err| DecodeError::MediaAccess {
            path: resolved.display().to_string(),
            reason: err.to_string(),
        })?;
        if request.window.is_empty() {
            return Err(DecodeError::Decode {
                path: resolved.display().to_string(),
                reason: "empty window".to_string(),
            });
        }
        // Nominal 30 fps frame grid over the window.
        let frame_count = (request.window.len() * 30.0).ceil() as usize;
        let frame_indices = temporal_sampling(
            frame_count,
            0.0,
            frame_count.saturating_sub(1) as f64,
            request.num_frames as usize,
        );
        Ok(ProbedClip {
            resolved_path: resolved,
            file_bytes: meta.len(),
            window: request.window,
            frame_indices,
        })
    }
}

/// Stand-in tokenizer: one FNV-hashed id per word, zero-padded to a
/// fixed length.
struct HashingEncoder {
    max_len: usize,
}

impl TextEncoder for HashingEncoder {
    fn encode(&self, text: &str) -> Vec<i64> {
        let mut tokens: Vec<i64> = text
            .split_whitespace()
            .take(self.max_len)
            .map(|w| (fnv1a64(w.as_bytes()) & 0x7fff_ffff) as i64)
            .collect();
        tokens.resize(self.max_len, 0);
        tokens
    }
}

fn fnv1a64(bytes: &[u8]) -> u64 {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut h = FNV_OFFSET;
    for &b in bytes {
        h ^= b as u64;
        h = h.wrapping_mul(FNV_PRIME);
    }
    h
}

fn main() -> Result<()> {
    vts_observe::logging::init_tracing();
    let args = Args::parse();

    let mode = Mode::parse(&args.mode)?;
    let cfg = SamplerConfig {
        mode,
        num_retries: args.num_retries,
        fixed_duration: args.fixed_duration,
        num_frames: args.num_frames,
        min_caption_words: args.min_caption_words,
        separator: args.separator,
        path_prefix: args.path_prefix.clone(),
        caption_dir: args.caption_dir.clone(),
        embedding_dir: args.embedding_dir.clone(),
        ..SamplerConfig::default()
    };

    let index = ManifestIndex::load(
        &args.manifest,
        cfg.separator,
        cfg.num_clips(),
        &cfg.path_prefix,
    )?;

    let encoder = Some(HashingEncoder { max_len: 64 });
    let dataset = Dataset::new(cfg, index, FileProbeDecoder, encoder, IdentityTransform)?;
    let metrics = dataset.metrics();

    let mut rng = ChaCha8Rng::seed_from_u64(args.seed);
    let len = dataset.len();
    let mut delivered = 0usize;
    let mut exhausted = 0usize;

    for i in 0..args.samples {
        match dataset.fetch(i % len, &mut rng) {
            Ok(result) => {
                delivered += 1;
                tracing::info!(
                    event = "probe_sample",
                    sample_index = result.sample_index as u64,
                    label = result.label,
                    path = %result.frames.resolved_path.display(),
                    file_bytes = result.frames.file_bytes,
                    window_start = result.frames.window.start,
                    window_end = result.frames.window.end,
                    frames = result.frames.frame_indices.len() as u64,
                    caption = result
                        .caption
                        .as_ref()
                        .map(|c| c.text.as_str())
                        .unwrap_or(""),
                    "probed sample"
                );
            }
            Err(err) => {
                exhausted += 1;
                tracing::error!(event = "probe_failed", requested = i as u64, error = %err, "probe fetch failed");
            }
        }
    }

    tracing::info!(
        event = "probe_done",
        requested = args.samples as u64,
        delivered = delivered as u64,
        exhausted = exhausted as u64,
        attempts = metrics.fetch_attempts_total.get(),
        decode_failures = metrics.decode_failures_total.get(),
        caption_failures = metrics.caption_failures_total.get(),
        substitutions = metrics.substitutions_total.get(),
        "probe complete"
    );

    if delivered == 0 {
        anyhow::bail!("no samples could be fetched from {}", args.manifest.display());
    }
    Ok(())
}
