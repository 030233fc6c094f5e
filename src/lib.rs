//! Element-wise summation of K equal-length integer vectors on a simulated
//! parallel accelerator, in three kernel variants that must agree bit for bit.
//!
//! Inputs are uploaded row-major as one K x N device region; each output index
//! is owned by exactly one work unit.

#[cfg(feature = "python")]
use pyo3::prelude::*;

mod engine;

pub use crate::engine::config::{DeviceConfig, TransferFault};
pub use crate::engine::controller::{Accelerator, InvocationStats};
pub use crate::engine::error::{Result, SumError};
pub use crate::engine::group::{Group, GroupBarrier, SharedScratch};
pub use crate::engine::input::InputSet;
pub use crate::engine::kernels::{
    kernel_for, launch, BaselineKernel, CoalescedKernel, DeviceRows, SharedStagedKernel, SumKernel,
};
pub use crate::engine::launch::{KernelConfig, LaunchPlan, Variant};
pub use crate::engine::memory::{Device, DeviceBuffer, ELEMENT_BYTES};
pub use crate::engine::transfer::TransferManager;

/// Baseline variant on a default device
pub fn sum(inputs: &InputSet<'_>) -> Result<Vec<i32>> {
    Accelerator::default().sum(inputs)
}

/// O1 variant on a default device
pub fn sum_o1(inputs: &InputSet<'_>) -> Result<Vec<i32>> {
    Accelerator::default().sum_o1(inputs)
}

/// O2 variant on a default device
pub fn sum_o2(inputs: &InputSet<'_>) -> Result<Vec<i32>> {
    Accelerator::default().sum_o2(inputs)
}

/// Two-vector form of [`sum`]
pub fn sum_pair(a: &[i32], b: &[i32]) -> Result<Vec<i32>> {
    Accelerator::default().sum_pair(a, b)
}

/// Python module definition
#[cfg(feature = "python")]
#[pymodule]
fn vsum_core(_py: Python, m: &Bound<'_, PyModule>) -> PyResult<()> {
    use crate::engine::bindings;

    m.add_class::<bindings::PyAccelerator>()?;
    m.add_function(wrap_pyfunction!(bindings::py_sum, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::py_sum_o1, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::py_sum_o2, m)?)?;
    m.add_function(wrap_pyfunction!(bindings::py_sum_pair, m)?)?;
    Ok(())
}
