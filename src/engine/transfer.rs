// Host <-> Device Transfer Manager
use ndarray::ArrayView1;

use crate::engine::config::TransferFault;
use crate::engine::error::{Result, SumError};
use crate::engine::input::InputSet;
use crate::engine::memory::{Device, DeviceBuffer};

/// Stages inputs onto the device and results back to the host.
///
/// Layout: the K input vectors are flattened ROW-MAJOR into one K x N region,
/// vector `k` at offsets `k*N .. k*N + N`. All copies are synchronous.
pub struct TransferManager<'d> {
    device: &'d Device,
}

impl<'d> TransferManager<'d> {
    pub fn new(device: &'d Device) -> Self {
        Self { device }
    }

    /// Copy all K vectors into a fresh K x N device region.
    /// On any failure the partially filled buffer is dropped, which frees it.
    pub fn upload(&self, inputs: &InputSet<'_>) -> Result<DeviceBuffer> {
        let k = inputs.num_vectors();
        let n = inputs.len();
        let elements = k.checked_mul(n).ok_or(SumError::Allocation {
            requested: usize::MAX,
            available: self.device.available_bytes(),
        })?;

        let mut buffer = self.device.allocate(elements)?;

        // 1. Per-vector copy into its row
        let fault = self.device.config().transfer_fault;
        for (row_idx, row) in inputs.rows().enumerate() {
            let dst_row = &mut buffer.as_mut_slice()[row_idx * n..(row_idx + 1) * n];
            let copied = copy_row(dst_row, row, fault);
            if copied != n {
                return Err(SumError::transfer(format!(
                    "upload of vector {row_idx} truncated after {copied} of {n} elements"
                )));
            }
        }

        // 2. Optional read-back check
        if self.device.config().verify_transfers {
            let dst = buffer.as_slice();
            for (row_idx, row) in inputs.rows().enumerate() {
                let dst_row = &dst[row_idx * n..(row_idx + 1) * n];
                if dst_row.iter().ne(row.iter()) {
                    return Err(SumError::transfer(format!(
                        "upload of vector {row_idx} does not match the host copy"
                    )));
                }
            }
        }

        buffer.advise_sequential();
        tracing::debug!(vectors = k, len = n, "uploaded input set");
        Ok(buffer)
    }

    /// Reserve an N-element output region. Contents are unspecified until the
    /// kernel writes them.
    pub fn allocate_output(&self, n: usize) -> Result<DeviceBuffer> {
        self.device.allocate(n)
    }

    /// Copy the first `n` elements of `buffer` back to the host.
    pub fn download(&self, buffer: &DeviceBuffer, n: usize) -> Result<Vec<i32>> {
        if buffer.is_released() {
            return Err(SumError::transfer("download from a released buffer"));
        }
        let src = buffer.as_slice().get(..n).ok_or_else(|| {
            SumError::transfer(format!(
                "download of {n} elements truncated at {}",
                buffer.len()
            ))
        })?;
        let mut host = src.to_vec();
        if self.device.config().transfer_fault == Some(TransferFault::Truncate) && n > 0 {
            host.truncate(n - 1);
        }
        if host.len() != n {
            return Err(SumError::transfer(format!(
                "download truncated after {} of {n} elements",
                host.len()
            )));
        }
        Ok(host)
    }

    /// Free a buffer now rather than at drop. Safe to call twice.
    pub fn release(&self, buffer: &mut DeviceBuffer) {
        buffer.release();
    }
}

/// Copy one host row into its device row, returning the elements written.
fn copy_row(dst: &mut [i32], src: ArrayView1<'_, i32>, fault: Option<TransferFault>) -> usize {
    let count = match fault {
        Some(TransferFault::Truncate) => dst.len().saturating_sub(1),
        _ => dst.len(),
    };
    let dst = &mut dst[..count];
    match src.as_slice() {
        Some(src) => dst.copy_from_slice(&src[..count]),
        None => {
            for (d, s) in dst.iter_mut().zip(src.iter()) {
                *d = *s;
            }
        }
    }
    if fault == Some(TransferFault::Corrupt) {
        if let Some(first) = dst.first_mut() {
            *first ^= 1;
        }
    }
    count
}
