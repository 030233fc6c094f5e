// Controller
use std::time::{Duration, Instant};

use crate::engine::config::DeviceConfig;
use crate::engine::error::Result;
use crate::engine::input::InputSet;
use crate::engine::kernels::{self, kernel_for};
use crate::engine::launch::{KernelConfig, LaunchPlan, Variant};
use crate::engine::memory::Device;
use crate::engine::transfer::TransferManager;

/// Where the time of one invocation went.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct InvocationStats {
    pub variant: Variant,
    pub upload: Duration,
    pub launch: Duration,
    pub download: Duration,
    pub waves: usize,
    pub groups: usize,
    pub units_per_group: usize,
}

impl InvocationStats {
    pub fn total(&self) -> Duration {
        self.upload + self.launch + self.download
    }
}

/// Synchronous front end: upload, launch, download, release.
#[derive(Debug, Clone)]
pub struct Accelerator {
    device: Device,
}

impl Default for Accelerator {
    fn default() -> Self {
        Self::new(DeviceConfig::default())
    }
}

impl Accelerator {
    pub fn new(config: DeviceConfig) -> Self {
        Self {
            device: Device::new(config),
        }
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    /// Baseline variant
    pub fn sum(&self, inputs: &InputSet<'_>) -> Result<Vec<i32>> {
        self.sum_with(Variant::Baseline, inputs)
    }

    /// O1 (coalesced reads)
    pub fn sum_o1(&self, inputs: &InputSet<'_>) -> Result<Vec<i32>> {
        self.sum_with(Variant::Coalesced, inputs)
    }

    /// O2 (shared scratch staging)
    pub fn sum_o2(&self, inputs: &InputSet<'_>) -> Result<Vec<i32>> {
        self.sum_with(Variant::SharedStaged, inputs)
    }

    /// `a + b`, same as `sum` over `[a, b]`
    pub fn sum_pair(&self, a: &[i32], b: &[i32]) -> Result<Vec<i32>> {
        self.sum(&InputSet::pair(a, b)?)
    }

    pub fn sum_with(&self, variant: Variant, inputs: &InputSet<'_>) -> Result<Vec<i32>> {
        self.sum_timed(variant, inputs).map(|(result, _)| result)
    }

    /// Run one invocation and report per-phase timings.
    pub fn sum_timed(
        &self,
        variant: Variant,
        inputs: &InputSet<'_>,
    ) -> Result<(Vec<i32>, InvocationStats)> {
        let k = inputs.num_vectors();
        let n = inputs.len();

        // 1. Plan before touching device memory
        let config = KernelConfig::for_variant(variant, k, self.device.config())?;
        let plan = LaunchPlan::new(config, n, self.device.config())?;

        // 2. Upload
        let transfers = TransferManager::new(&self.device);
        let started = Instant::now();
        let mut input = transfers.upload(inputs)?;
        let mut output = transfers.allocate_output(n)?;
        let upload = started.elapsed();

        // 3. Launch; the input is freed as soon as the kernel retires
        let started = Instant::now();
        kernels::launch(kernel_for(variant), &plan, &input, k, &mut output)?;
        transfers.release(&mut input);
        let launch = started.elapsed();

        // 4. Download
        let started = Instant::now();
        let result = transfers.download(&output, n)?;
        transfers.release(&mut output);
        let download = started.elapsed();

        let stats = InvocationStats {
            variant,
            upload,
            launch,
            download,
            waves: plan.waves.len(),
            groups: plan.groups,
            units_per_group: config.units_per_group,
        };
        tracing::debug!(
            %variant,
            vectors = k,
            len = n,
            groups = stats.groups,
            waves = stats.waves,
            upload_us = upload.as_micros() as u64,
            launch_us = launch.as_micros() as u64,
            download_us = download.as_micros() as u64,
            "invocation complete"
        );
        Ok((result, stats))
    }
}
