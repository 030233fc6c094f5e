// Device Memory Manager
use memmap2::{MmapMut, MmapOptions};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use crate::engine::config::DeviceConfig;
use crate::engine::error::{Result, SumError};

/// Bytes per device element (i32)
pub const ELEMENT_BYTES: usize = std::mem::size_of::<i32>();

/// Handle to the simulated accelerator.
/// Cloning is cheap; all clones share one global memory budget.
#[derive(Debug, Clone)]
pub struct Device {
    inner: Arc<DeviceState>,
}

#[derive(Debug)]
struct DeviceState {
    config: DeviceConfig,
    used_bytes: AtomicUsize,
}

impl Device {
    pub fn new(config: DeviceConfig) -> Self {
        tracing::info!(
            memory_bytes = config.memory_bytes,
            units_per_group = config.units_per_group,
            max_groups_per_wave = config.max_groups_per_wave,
            "device initialized"
        );
        Self {
            inner: Arc::new(DeviceState {
                config,
                used_bytes: AtomicUsize::new(0),
            }),
        }
    }

    pub fn config(&self) -> &DeviceConfig {
        &self.inner.config
    }

    /// Bytes currently held by live buffers
    pub fn used_bytes(&self) -> usize {
        self.inner.used_bytes.load(Ordering::Acquire)
    }

    pub fn available_bytes(&self) -> usize {
        self.inner
            .config
            .memory_bytes
            .saturating_sub(self.used_bytes())
    }

    /// Reserve `elements` device words. The region is uninitialized from the
    /// kernel's point of view.
    pub(crate) fn allocate(&self, elements: usize) -> Result<DeviceBuffer> {
        let bytes = elements
            .checked_mul(ELEMENT_BYTES)
            .ok_or(SumError::Allocation {
                requested: usize::MAX,
                available: self.available_bytes(),
            })?;

        // 1. Charge the budget first so concurrent callers never overcommit
        let capacity = self.inner.config.memory_bytes;
        self.inner
            .used_bytes
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |used| {
                used.checked_add(bytes).filter(|&total| total <= capacity)
            })
            .map_err(|used| SumError::Allocation {
                requested: bytes,
                available: capacity.saturating_sub(used),
            })?;

        // 2. Back the region with an anonymous mapping (page aligned)
        let region = if bytes == 0 {
            None
        } else {
            match MmapOptions::new().len(bytes).map_anon() {
                Ok(map) => Some(map),
                Err(err) => {
                    self.inner.used_bytes.fetch_sub(bytes, Ordering::AcqRel);
                    tracing::warn!(bytes, error = %err, "device mapping failed");
                    return Err(SumError::Allocation {
                        requested: bytes,
                        available: self.available_bytes(),
                    });
                }
            }
        };

        Ok(DeviceBuffer {
            region,
            len: elements,
            bytes,
            released: false,
            device: Arc::clone(&self.inner),
        })
    }
}

/// Accelerator-resident memory region.
/// Implements "Scope Memory" - the reservation is tied to this struct's lifetime.
#[derive(Debug)]
pub struct DeviceBuffer {
    region: Option<MmapMut>,
    len: usize,
    bytes: usize,
    released: bool,
    device: Arc<DeviceState>,
}

impl DeviceBuffer {
    /// Number of i32 elements
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn is_released(&self) -> bool {
        self.released
    }

    pub fn as_slice(&self) -> &[i32] {
        match &self.region {
            // Safety: anonymous maps are page aligned and hold exactly `len` i32 words
            Some(map) => unsafe { std::slice::from_raw_parts(map.as_ptr() as *const i32, self.len) },
            None => &[],
        }
    }

    pub fn as_mut_slice(&mut self) -> &mut [i32] {
        match &mut self.region {
            // Safety: as in `as_slice`; `&mut self` makes this the only live view of the map
            Some(map) => unsafe {
                std::slice::from_raw_parts_mut(map.as_mut_ptr() as *mut i32, self.len)
            },
            None => &mut [],
        }
    }

    /// Hint that kernels will stream through this region front to back
    pub(crate) fn advise_sequential(&self) {
        if let Some(map) = &self.region {
            // Safety: advisory only; the range is exactly the live mapping
            unsafe {
                libc::madvise(map.as_ptr() as *mut _, self.bytes, libc::MADV_SEQUENTIAL);
            }
        }
    }

    /// Free the region and return its bytes to the device. Idempotent.
    pub fn release(&mut self) {
        if self.released {
            return;
        }
        if let Some(map) = self.region.take() {
            // Safety: the map is still owned here and unmapped right after
            unsafe {
                libc::madvise(map.as_ptr() as *mut _, self.bytes, libc::MADV_DONTNEED);
            }
        }
        self.device.used_bytes.fetch_sub(self.bytes, Ordering::AcqRel);
        self.released = true;
        self.len = 0;
    }
}

impl Drop for DeviceBuffer {
    fn drop(&mut self) {
        self.release();
    }
}
