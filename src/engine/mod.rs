// Module Definition
#[cfg(feature = "python")]
pub mod bindings; // numpy-facing entry points
pub mod config;
pub mod controller; // Upload -> launch -> download, per invocation
pub mod error;
pub mod group; // Group-shared scratch and barrier
pub mod input;
pub mod kernels; // Baseline, O1 and O2 summation kernels
pub mod launch;
pub mod memory; // Device memory budget and scoped buffers
pub mod transfer;
