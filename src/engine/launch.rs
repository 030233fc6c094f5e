// Launch Planning
use std::fmt;
use std::ops::Range;

use bitvec::prelude::*;

use crate::engine::config::DeviceConfig;
use crate::engine::error::{Result, SumError};
use crate::engine::memory::ELEMENT_BYTES;

/// Which decomposition of the K-dimension reduction a launch uses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Variant {
    /// One unit per output, serial strided walk over the K rows
    Baseline,
    /// O1: the group walks the K rows in lockstep, one contiguous run per row
    Coalesced,
    /// O2: the group stages its K x T tile into shared scratch behind a barrier
    SharedStaged,
}

impl Variant {
    pub const ALL: [Variant; 3] = [Variant::Baseline, Variant::Coalesced, Variant::SharedStaged];

    pub fn name(self) -> &'static str {
        match self {
            Variant::Baseline => "baseline",
            Variant::Coalesced => "o1",
            Variant::SharedStaged => "o2",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.name())
    }
}

/// Per-variant decomposition, fixed for the duration of one launch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KernelConfig {
    pub variant: Variant,
    pub units_per_group: usize,
    /// Group-shared scratch words (0 when the variant does not stage)
    pub shared_elements: usize,
}

impl KernelConfig {
    /// Derive the configuration for `variant` over `k` input rows.
    pub fn for_variant(variant: Variant, k: usize, device: &DeviceConfig) -> Result<Self> {
        let requested = device.units_per_group;
        if requested == 0 || requested > device.max_units_per_group {
            return Err(SumError::launch(format!(
                "group size {requested} outside 1..={}",
                device.max_units_per_group
            )));
        }

        if variant != Variant::SharedStaged || k == 0 {
            return Ok(Self {
                variant,
                units_per_group: requested,
                shared_elements: 0,
            });
        }

        // Shrink the group until its K x T tile fits the scratch, in whole warps
        let capacity = device.shared_bytes_per_group / ELEMENT_BYTES;
        let fitting = capacity / k;
        let units = if fitting >= requested {
            requested
        } else {
            let warp = device.warp_size.max(1);
            fitting / warp * warp
        };
        if units == 0 {
            return Err(SumError::launch(format!(
                "{k} rows x one warp exceed {} bytes of group scratch",
                device.shared_bytes_per_group
            )));
        }

        Ok(Self {
            variant,
            units_per_group: units,
            shared_elements: k * units,
        })
    }
}

/// Groups and waves covering an N-element index space.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LaunchPlan {
    pub config: KernelConfig,
    pub len: usize,
    pub groups: usize,
    /// Group ranges dispatched together; waves have no ordering dependency
    pub waves: Vec<Range<usize>>,
}

impl LaunchPlan {
    pub fn new(config: KernelConfig, len: usize, device: &DeviceConfig) -> Result<Self> {
        if config.units_per_group == 0 {
            return Err(SumError::launch("group size must be positive"));
        }
        if device.max_groups_per_wave == 0 {
            return Err(SumError::launch("device accepts no groups per wave"));
        }

        let groups = len.div_ceil(config.units_per_group);
        let waves = (0..groups)
            .step_by(device.max_groups_per_wave)
            .map(|start| start..(start + device.max_groups_per_wave).min(groups))
            .collect();

        Ok(Self {
            config,
            len,
            groups,
            waves,
        })
    }

    /// Output indices owned by `group`
    pub fn unit_range(&self, group: usize) -> Range<usize> {
        let start = (group * self.config.units_per_group).min(self.len);
        start..(start + self.config.units_per_group).min(self.len)
    }

    /// Output indices touched by a whole wave
    pub fn wave_range(&self, wave: &Range<usize>) -> Range<usize> {
        if wave.is_empty() {
            return 0..0;
        }
        self.unit_range(wave.start).start..self.unit_range(wave.end - 1).end
    }

    /// Bitmap of output indices written by the plan.
    /// Fails if two groups claim the same index.
    pub fn coverage(&self) -> Result<BitVec> {
        let mut written = bitvec![usize, Lsb0; 0; self.len];
        for wave in &self.waves {
            for group in wave.clone() {
                if group >= self.groups {
                    return Err(SumError::launch(format!("group {group} is out of bounds")));
                }
                let range = self.unit_range(group);
                if written[range.clone()].any() {
                    return Err(SumError::launch(format!("group {group} overlaps another group")));
                }
                written[range].fill(true);
            }
        }
        Ok(written)
    }

    /// Every output index must be written exactly once.
    pub fn validate(&self) -> Result<()> {
        let written = self.coverage()?;
        if let Some(gap) = written.first_zero() {
            return Err(SumError::launch(format!("output index {gap} has no work unit")));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(variant: Variant, k: usize, cfg: &DeviceConfig) -> KernelConfig {
        KernelConfig::for_variant(variant, k, cfg).unwrap()
    }

    #[test]
    fn direct_variants_use_the_requested_group() {
        let dev = DeviceConfig::default();
        for variant in [Variant::Baseline, Variant::Coalesced] {
            let cfg = config(variant, 10, &dev);
            assert_eq!(cfg.units_per_group, 256);
            assert_eq!(cfg.shared_elements, 0);
        }
    }

    #[test]
    fn staged_variant_sizes_its_scratch() {
        let dev = DeviceConfig::default();
        let cfg = config(Variant::SharedStaged, 10, &dev);
        assert_eq!(cfg.units_per_group, 256);
        assert_eq!(cfg.shared_elements, 2560);
    }

    #[test]
    fn staged_variant_shrinks_in_warps() {
        // 48 KiB = 12288 words; 100 rows -> 122 units -> 96 (three warps)
        let dev = DeviceConfig::default();
        let cfg = config(Variant::SharedStaged, 100, &dev);
        assert_eq!(cfg.units_per_group, 96);
        assert_eq!(cfg.shared_elements, 9600);
    }

    #[test]
    fn staged_variant_rejects_rows_that_cannot_fit_a_warp() {
        let dev = DeviceConfig::default();
        let err = KernelConfig::for_variant(Variant::SharedStaged, 1000, &dev).unwrap_err();
        assert!(matches!(err, SumError::KernelLaunch(_)));
    }

    #[test]
    fn invalid_group_size_is_rejected() {
        let dev = DeviceConfig::default().with_units_per_group(0);
        assert!(KernelConfig::for_variant(Variant::Baseline, 3, &dev).is_err());
        let dev = DeviceConfig::default().with_units_per_group(2048);
        assert!(KernelConfig::for_variant(Variant::Baseline, 3, &dev).is_err());
    }

    #[test]
    fn plan_splits_into_waves() {
        let dev = DeviceConfig::default()
            .with_units_per_group(4)
            .with_max_groups_per_wave(2);
        let cfg = config(Variant::Baseline, 2, &dev);
        let plan = LaunchPlan::new(cfg, 18, &dev).unwrap();

        assert_eq!(plan.groups, 5);
        assert_eq!(plan.waves, vec![0..2, 2..4, 4..5]);
        assert_eq!(plan.unit_range(4), 16..18);
        assert_eq!(plan.wave_range(&plan.waves[1]), 8..16);
        assert_eq!(plan.wave_range(&plan.waves[2]), 16..18);
        plan.validate().unwrap();
    }

    #[test]
    fn empty_plan_is_valid() {
        let dev = DeviceConfig::default();
        let plan = LaunchPlan::new(config(Variant::Coalesced, 3, &dev), 0, &dev).unwrap();
        assert_eq!(plan.groups, 0);
        assert!(plan.waves.is_empty());
        plan.validate().unwrap();
    }

    #[test]
    fn overlapping_waves_are_rejected() {
        let dev = DeviceConfig::default().with_units_per_group(4);
        let mut plan = LaunchPlan::new(config(Variant::Baseline, 2, &dev), 8, &dev).unwrap();
        plan.waves = vec![0..2, 1..2];
        assert!(matches!(plan.validate(), Err(SumError::KernelLaunch(_))));
    }

    #[test]
    fn out_of_bounds_groups_are_rejected() {
        let dev = DeviceConfig::default().with_units_per_group(4);
        let mut plan = LaunchPlan::new(config(Variant::Baseline, 2, &dev), 8, &dev).unwrap();
        plan.waves = vec![0..3];
        assert!(matches!(plan.validate(), Err(SumError::KernelLaunch(_))));
    }

    #[test]
    fn missing_groups_are_rejected() {
        let dev = DeviceConfig::default().with_units_per_group(4);
        let mut plan = LaunchPlan::new(config(Variant::Baseline, 2, &dev), 8, &dev).unwrap();
        plan.waves = vec![0..1];
        assert!(matches!(plan.validate(), Err(SumError::KernelLaunch(_))));
    }
}
