use rand::Rng;

use vts_core::config::SamplerConfig;
use vts_core::types::{LogicalSample, Mode};

/// Which spatial crop the transform stage should take.
///
/// `Crop(0|1|2)` is left/center/right (or top/middle/bottom for tall
/// frames); train/val jitter crops at random.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpatialSelector {
    Random,
    Crop(u32),
}

/// Scale and crop parameters handed to the external transform stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SpatialPlan {
    pub selector: SpatialSelector,
    pub min_scale: u32,
    pub max_scale: u32,
    pub crop_size: u32,
}

/// Derives the spatial plan for one logical sample.
///
/// `short_cycle` is the multigrid short-cycle index (0 or 1); it
/// shrinks the crop and rescales the jitter floor against the
/// multigrid base size.
pub fn plan_spatial(
    cfg: &SamplerConfig,
    sample: LogicalSample,
    short_cycle: Option<usize>,
) -> SpatialPlan {
    match cfg.mode {
        Mode::Train | Mode::Val => {
            let mut min_scale = cfg.train_jitter_scales.0;
            let max_scale = cfg.train_jitter_scales.1;
            let mut crop_size = cfg.train_crop_size;
            if let Some(sc) = short_cycle {
                if sc < cfg.short_cycle_factors.len() {
                    crop_size = (cfg.short_cycle_factors[sc]
                        * f64::from(cfg.multigrid_default_s))
                    .round() as u32;
                }
            }
            if cfg.multigrid_default_s > 0 {
                // A smaller scale is a larger span in the sampling grid.
                min_scale = (f64::from(min_scale) * f64::from(crop_size)
                    / f64::from(cfg.multigrid_default_s))
                .round() as u32;
            }
            SpatialPlan {
                selector: SpatialSelector::Random,
                min_scale,
                max_scale,
                crop_size,
            }
        }
        Mode::Test => {
            let selector = if cfg.spatial_crops > 1 {
                SpatialSelector::Crop(sample.spatial_index(cfg.spatial_crops))
            } else {
                SpatialSelector::Crop(1)
            };
            // Deterministic test crops: min and max scales agree so no
            // jitter can occur.
            let (min_scale, max_scale, crop_size) = if cfg.spatial_crops > 1 {
                (cfg.test_crop_size, cfg.test_crop_size, cfg.test_crop_size)
            } else {
                (
                    cfg.train_jitter_scales.0,
                    cfg.train_jitter_scales.0,
                    cfg.test_crop_size,
                )
            };
            SpatialPlan {
                selector,
                min_scale,
                max_scale,
                crop_size,
            }
        }
    }
}

/// Multigrid long-cycle sampling rate: a random member of the
/// configured set, or the base rate when the cycle is disabled.
pub fn sampling_rate<R: Rng>(cfg: &SamplerConfig, rng: &mut R) -> u32 {
    if cfg.long_cycle_sampling_rates.is_empty() {
        cfg.sampling_rate
    } else {
        let pick = rng.gen_range(0..cfg.long_cycle_sampling_rates.len());
        cfg.long_cycle_sampling_rates[pick]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand_chacha::ChaCha8Rng;

    fn sample(st_index: u32) -> LogicalSample {
        LogicalSample { entry: 0, st_index }
    }

    #[test]
    fn train_plan_uses_jitter_range() {
        let cfg = SamplerConfig::default();
        let plan = plan_spatial(&cfg, sample(0), None);
        assert_eq!(plan.selector, SpatialSelector::Random);
        assert_eq!(plan.min_scale, 256);
        assert_eq!(plan.max_scale, 320);
        assert_eq!(plan.crop_size, 224);
    }

    #[test]
    fn test_plan_is_deterministic_per_crop() {
        let cfg = SamplerConfig {
            mode: Mode::Test,
            spatial_crops: 3,
            ..SamplerConfig::default()
        };
        let plan = plan_spatial(&cfg, sample(7), None);
        assert_eq!(plan.selector, SpatialSelector::Crop(1));
        assert_eq!(plan.min_scale, plan.max_scale);
        assert_eq!(plan.crop_size, cfg.test_crop_size);
    }

    #[test]
    fn single_crop_test_centers() {
        let cfg = SamplerConfig {
            mode: Mode::Test,
            spatial_crops: 1,
            ..SamplerConfig::default()
        };
        let plan = plan_spatial(&cfg, sample(4), None);
        assert_eq!(plan.selector, SpatialSelector::Crop(1));
        assert_eq!(plan.min_scale, cfg.train_jitter_scales.0);
        assert_eq!(plan.crop_size, cfg.test_crop_size);
    }

    #[test]
    fn short_cycle_shrinks_crop_and_rescales_floor() {
        let cfg = SamplerConfig {
            multigrid_default_s: 224,
            ..SamplerConfig::default()
        };
        let plan = plan_spatial(&cfg, sample(0), Some(0));
        assert_eq!(plan.crop_size, 112);
        assert_eq!(plan.min_scale, 128);
    }

    #[test]
    fn sampling_rate_prefers_long_cycle_set() {
        let mut rng = ChaCha8Rng::seed_from_u64(1);
        let base = SamplerConfig::default();
        assert_eq!(sampling_rate(&base, &mut rng), base.sampling_rate);

        let cfg = SamplerConfig {
            long_cycle_sampling_rates: vec![2, 4],
            ..SamplerConfig::default()
        };
        for _ in 0..20 {
            let r = sampling_rate(&cfg, &mut rng);
            assert!(r == 2 || r == 4);
        }
    }
}
