use thiserror::Error;

use vts_core::types::Window;

use crate::spatial::SpatialPlan;

/// Recoverable failure from the decode collaborator. The orchestrator
/// branches on the variant instead of catching everything; both kinds
/// drive the retry-and-substitute loop.
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("media access failed: {path}: {reason}")]
    MediaAccess { path: String, reason: String },
    #[error("decode failed: {path}: {reason}")]
    Decode { path: String, reason: String },
}

/// Everything the external decoder needs for one attempt. `path` is
/// the extension-stripped location stem; resolving the actual
/// container file is the decoder's concern.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodeRequest {
    pub path: String,
    pub window: Window,
    pub num_frames: u32,
    pub sampling_rate: u32,
    /// Upper bound on the spatial scale the decoder may emit.
    pub max_spatial_scale: u32,
}

/// The external video decoder. Synchronous and blocking; callers run
/// one fetch per worker thread.
pub trait VideoDecoder: Send + Sync + 'static {
    type Frames;

    fn decode(&self, request: &DecodeRequest) -> Result<Self::Frames, DecodeError>;
}

/// External tokenizer: maps text to a fixed-shape token sequence.
/// Padding and truncation are the encoder's concern.
pub trait TextEncoder: Send + Sync + 'static {
    fn encode(&self, text: &str) -> Vec<i64>;
}

/// Pixel-space augmentation/normalization black box.
pub trait FrameTransform<F>: Send + Sync + 'static {
    fn apply(&self, frames: F, plan: &SpatialPlan) -> F;
}

/// Pass-through transform for pipelines that augment elsewhere.
#[derive(Debug, Default, Clone, Copy)]
pub struct IdentityTransform;

impl<F> FrameTransform<F> for IdentityTransform {
    fn apply(&self, frames: F, _plan: &SpatialPlan) -> F {
        frames
    }
}
