// Device Configuration
use std::env;
use std::str::FromStr;

/// Limits and defaults of the simulated accelerator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceConfig {
    /// Total global memory budget in bytes
    pub memory_bytes: usize,
    /// Hard cap on work units in one group
    pub max_units_per_group: usize,
    /// Group size requested by the kernels
    pub units_per_group: usize,
    /// Units that execute one instruction together; O2 shrinks groups in warp steps
    pub warp_size: usize,
    /// Groups dispatched per wave before the launch is split
    pub max_groups_per_wave: usize,
    /// Group-shared scratch capacity in bytes
    pub shared_bytes_per_group: usize,
    /// Read back and compare every host-to-device copy
    pub verify_transfers: bool,
    /// Injected copy-engine fault, for exercising transfer failure paths
    pub transfer_fault: Option<TransferFault>,
}

/// Faults the simulated copy engine can be told to produce.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferFault {
    /// Each copy stops one element short
    Truncate,
    /// The first element of each copied row has a bit flipped
    Corrupt,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            memory_bytes: 1 << 30,
            max_units_per_group: 1024,
            units_per_group: 256,
            warp_size: 32,
            max_groups_per_wave: 65_535,
            shared_bytes_per_group: 48 * 1024,
            verify_transfers: cfg!(debug_assertions),
            transfer_fault: None,
        }
    }
}

impl DeviceConfig {
    /// Defaults overridden by `VSUM_*` environment variables.
    pub fn from_env() -> Self {
        let mut cfg = Self::default();
        override_from_env("VSUM_DEVICE_MEMORY", &mut cfg.memory_bytes);
        override_from_env("VSUM_GROUP_SIZE", &mut cfg.units_per_group);
        override_from_env("VSUM_MAX_GROUPS_PER_WAVE", &mut cfg.max_groups_per_wave);
        override_flag_from_env("VSUM_VERIFY_TRANSFERS", &mut cfg.verify_transfers);
        cfg
    }

    pub fn with_memory_bytes(mut self, bytes: usize) -> Self {
        self.memory_bytes = bytes;
        self
    }

    pub fn with_units_per_group(mut self, units: usize) -> Self {
        self.units_per_group = units;
        self
    }

    pub fn with_max_groups_per_wave(mut self, groups: usize) -> Self {
        self.max_groups_per_wave = groups;
        self
    }

    pub fn with_shared_bytes_per_group(mut self, bytes: usize) -> Self {
        self.shared_bytes_per_group = bytes;
        self
    }

    pub fn with_verify_transfers(mut self, verify: bool) -> Self {
        self.verify_transfers = verify;
        self
    }

    pub fn with_transfer_fault(mut self, fault: TransferFault) -> Self {
        self.transfer_fault = Some(fault);
        self
    }
}

fn override_from_env<T: FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = env::var(key) else {
        return;
    };
    match raw.trim().parse() {
        Ok(value) => *slot = value,
        Err(_) => tracing::warn!(key, value = %raw, "ignoring unparsable device setting"),
    }
}

fn override_flag_from_env(key: &str, slot: &mut bool) {
    let Ok(raw) = env::var(key) else {
        return;
    };
    match parse_flag(&raw) {
        Some(value) => *slot = value,
        None => tracing::warn!(key, value = %raw, "ignoring unparsable device flag"),
    }
}

/// Accepts the usual spellings of a boolean switch, ignoring case.
fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
