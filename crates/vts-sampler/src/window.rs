use rand::Rng;

use vts_core::types::Window;

/// Where in the video (or sub-range) the clip lands.
///
/// Train/val jitter uses `Random`; test-time tiling uses `Index(i)` of
/// `num_clips` deterministic positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClipPosition {
    Random,
    Index(u32),
}

/// Samples a window of `clip_size` seconds from a span of `video_size`
/// seconds. This is the single sampling primitive: it selects over the
/// whole video, narrows an over-long caption window, and re-derives
/// test-time fixed windows.
pub fn plan_uniform_window<R: Rng>(
    video_size: f64,
    clip_size: f64,
    position: ClipPosition,
    num_clips: u32,
    rng: &mut R,
) -> Window {
    let delta = (video_size - clip_size).max(0.0);
    let start = match position {
        ClipPosition::Random => rng.gen_range(0.0..=delta),
        ClipPosition::Index(i) => delta * f64::from(i) / f64::from(num_clips.max(1)),
    };
    Window::new(start, start + clip_size - 1.0)
}

/// Reconciles a known window against the configured fixed duration.
///
/// Widening runs first: a window shorter than `fixed_duration - 1` is
/// re-centered to the fixed duration before any narrowing logic, or a
/// degenerate zero-length window could escape. Then either re-center
/// to `num_frames` seconds (fixed duration disabled) or sample a
/// fixed-duration sub-window and translate it back to absolute time.
pub fn reconcile_to_fixed_duration<R: Rng>(
    window: Window,
    fixed_duration: f64,
    num_frames: f64,
    duration: f64,
    position: ClipPosition,
    num_clips: u32,
    rng: &mut R,
) -> Window {
    let mut w = window;

    if w.end - w.start < fixed_duration - 1.0 {
        let mid = (w.start + w.end) / 2.0;
        let start = (mid - fixed_duration / 2.0).max(0.0);
        w = Window::new(start, (start + fixed_duration).min(duration));
    }

    if fixed_duration == 0.0 && w.end - w.start > num_frames {
        let mid = (w.start + w.end) / 2.0;
        w = Window::new(mid - num_frames / 2.0, mid + num_frames / 2.0);
    } else if fixed_duration > 0.0 && fixed_duration < w.end - w.start {
        let base = w.start;
        let sub = plan_uniform_window(w.end - w.start, fixed_duration, position, num_clips, rng);
        w = Window::new(base + sub.start, base + sub.end);
    }

    w
}

/// Evenly spaced frame indices between `start_idx` and `end_idx`
/// inclusive, clamped to `[0, frame_count)` and truncated. Exactly
/// `num_samples` indices, non-decreasing; duplicates occur when the
/// span is shorter than the sample count.
pub fn temporal_sampling(
    frame_count: usize,
    start_idx: f64,
    end_idx: f64,
    num_samples: usize,
) -> Vec<usize> {
    if num_samples == 0 || frame_count == 0 {
        return Vec::new();
    }
    let last = (frame_count - 1) as f64;
    let mut indices = Vec::with_capacity(num_samples);
    for i in 0..num_samples {
        let t = if num_samples == 1 {
            start_idx
        } else {
            start_idx + (end_idx - start_idx) * i as f64 / (num_samples - 1) as f64
        };
        indices.push(t.clamp(0.0, last).trunc() as usize);
    }
    indices
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn rng() -> ChaCha8Rng {
        ChaCha8Rng::seed_from_u64(7)
    }

    #[test]
    fn random_window_stays_in_bounds() {
        let mut r = rng();
        for _ in 0..200 {
            let w = plan_uniform_window(100.0, 20.0, ClipPosition::Random, 1, &mut r);
            assert!(w.start >= 0.0 && w.start <= 80.0, "start {} out of range", w.start);
            assert_eq!(w.end, w.start + 19.0);
        }
    }

    #[test]
    fn indexed_window_is_deterministic() {
        let mut r = rng();
        let w = plan_uniform_window(100.0, 20.0, ClipPosition::Index(2), 4, &mut r);
        assert_eq!(w.start, 40.0);
        assert_eq!(w.end, 59.0);
    }

    #[test]
    fn short_video_pins_start_to_zero() {
        let mut r = rng();
        let w = plan_uniform_window(10.0, 20.0, ClipPosition::Random, 1, &mut r);
        assert_eq!(w.start, 0.0);
        let w = plan_uniform_window(10.0, 20.0, ClipPosition::Index(3), 4, &mut r);
        assert_eq!(w.start, 0.0);
    }

    #[test]
    fn short_window_is_widened_to_fixed_duration() {
        let mut r = rng();
        let w = reconcile_to_fixed_duration(
            Window::new(10.0, 12.0),
            8.0,
            16.0,
            100.0,
            ClipPosition::Random,
            1,
            &mut r,
        );
        assert!(w.len() >= 8.0 - f64::EPSILON, "widened length {} < 8", w.len());
        assert!(w.start >= 0.0 && w.end <= 100.0);
    }

    #[test]
    fn widened_window_never_degenerates_near_duration_end() {
        let mut r = rng();
        // Midpoint near the end of a short video: length is capped by
        // duration, never by the pre-widen window.
        let w = reconcile_to_fixed_duration(
            Window::new(8.0, 9.0),
            8.0,
            16.0,
            10.0,
            ClipPosition::Random,
            1,
            &mut r,
        );
        assert!(w.len() >= (10.0 - w.start).min(8.0) - 1.0);
        assert!(w.len() > 0.0);
    }

    #[test]
    fn long_window_recenters_to_frame_count_when_fd_disabled() {
        let mut r = rng();
        let w = reconcile_to_fixed_duration(
            Window::new(0.0, 60.0),
            0.0,
            16.0,
            100.0,
            ClipPosition::Random,
            1,
            &mut r,
        );
        assert_eq!(w.len(), 16.0);
        assert_eq!((w.start + w.end) / 2.0, 30.0);
    }

    #[test]
    fn long_window_subsamples_at_fixed_duration() {
        let mut r = rng();
        let w = reconcile_to_fixed_duration(
            Window::new(20.0, 60.0),
            8.0,
            16.0,
            100.0,
            ClipPosition::Index(0),
            4,
            &mut r,
        );
        // Index(0) of the 40s sub-range starts at its base.
        assert_eq!(w.start, 20.0);
        assert_eq!(w.end, 27.0);
    }

    #[test]
    fn temporal_sampling_linear_spacing() {
        assert_eq!(temporal_sampling(10, 0.0, 9.0, 4), vec![0, 3, 6, 9]);
    }

    #[test]
    fn temporal_sampling_duplicates_when_oversampled() {
        let idx = temporal_sampling(10, 2.0, 4.0, 6);
        assert_eq!(idx.len(), 6);
        for pair in idx.windows(2) {
            assert!(pair[0] <= pair[1]);
        }
        assert_eq!(*idx.first().unwrap(), 2);
        assert_eq!(*idx.last().unwrap(), 4);
    }

    #[test]
    fn temporal_sampling_clamps_out_of_range() {
        let idx = temporal_sampling(5, -3.0, 40.0, 3);
        assert_eq!(idx, vec![0, 4, 4]);
    }

    #[test]
    fn temporal_sampling_single_sample_takes_start() {
        assert_eq!(temporal_sampling(10, 6.2, 9.0, 1), vec![6]);
    }
}
