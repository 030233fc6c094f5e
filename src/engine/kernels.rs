// Computation Kernels
// Device-side summation over a row-major K x N input buffer.
use rayon::prelude::*;
use std::cell::RefCell;
use std::panic::{self, AssertUnwindSafe};

use crate::engine::error::{Result, SumError};
use crate::engine::group::{Group, SharedScratch};
use crate::engine::launch::{LaunchPlan, Variant};
use crate::engine::memory::DeviceBuffer;

/// Read-only view of the uploaded K x N input (vector k at `k*N .. k*N + N`).
#[derive(Debug, Clone, Copy)]
pub struct DeviceRows<'a> {
    data: &'a [i32],
    k: usize,
    n: usize,
}

impl<'a> DeviceRows<'a> {
    pub fn new(data: &'a [i32], k: usize, n: usize) -> Result<Self> {
        let needed = k
            .checked_mul(n)
            .ok_or_else(|| SumError::launch("input extent overflows"))?;
        let data = data.get(..needed).ok_or_else(|| {
            SumError::launch(format!(
                "input buffer holds {} of {needed} elements",
                data.len()
            ))
        })?;
        Ok(Self { data, k, n })
    }

    pub fn k(&self) -> usize {
        self.k
    }

    #[inline]
    pub fn at(&self, row: usize, i: usize) -> i32 {
        self.data[row * self.n + i]
    }

    #[inline]
    pub fn row(&self, row: usize) -> &'a [i32] {
        &self.data[row * self.n..(row + 1) * self.n]
    }
}

/// Per-group body of a summation kernel.
pub trait SumKernel: Sync {
    fn variant(&self) -> Variant;

    /// Compute every output slot owned by `group`, each exactly once.
    fn run_group(&self, rows: DeviceRows<'_>, group: &mut Group<'_>) -> Result<()>;
}

/// One unit per output; each unit walks the K rows at stride N.
pub struct BaselineKernel;

/// Units of a group advance through the rows together so every row is read as
/// one contiguous run.
pub struct CoalescedKernel;

/// Full groups stage their K x T tile into shared scratch, synchronize, then
/// accumulate from scratch. The trailing partial group reads directly.
pub struct SharedStagedKernel;

impl SumKernel for BaselineKernel {
    fn variant(&self) -> Variant {
        Variant::Baseline
    }

    fn run_group(&self, rows: DeviceRows<'_>, group: &mut Group<'_>) -> Result<()> {
        direct_sum(rows, group);
        Ok(())
    }
}

impl SumKernel for CoalescedKernel {
    fn variant(&self) -> Variant {
        Variant::Coalesced
    }

    fn run_group(&self, rows: DeviceRows<'_>, group: &mut Group<'_>) -> Result<()> {
        let base = group.base();
        let units = group.units();

        let registers = group.registers();
        registers.fill(0);
        for row in 0..rows.k() {
            let run = &rows.row(row)[base..base + units];
            for (acc, &value) in registers.iter_mut().zip(run) {
                *acc = acc.wrapping_add(value);
            }
        }
        group.commit_registers();
        Ok(())
    }
}

impl SumKernel for SharedStagedKernel {
    fn variant(&self) -> Variant {
        Variant::SharedStaged
    }

    fn run_group(&self, rows: DeviceRows<'_>, group: &mut Group<'_>) -> Result<()> {
        if !group.is_full() {
            direct_sum(rows, group);
            return Ok(());
        }
        let base = group.base();
        let units = group.units();

        // 1. Cooperative staging: unit u copies column u of every row
        for row in 0..rows.k() {
            let run = &rows.row(row)[base..base + units];
            for (unit, &value) in run.iter().enumerate() {
                group.stage(unit, row, value)?;
            }
        }
        for unit in 0..units {
            group.arrive(unit)?;
        }

        // 2. Barrier
        group.sync()?;

        // 3. Accumulate from scratch
        for unit in 0..units {
            let mut acc = 0i32;
            for row in 0..rows.k() {
                acc = acc.wrapping_add(group.shared(unit, row)?);
            }
            group.store(unit, acc);
        }
        Ok(())
    }
}

fn direct_sum(rows: DeviceRows<'_>, group: &mut Group<'_>) {
    let base = group.base();
    for unit in 0..group.units() {
        let i = base + unit;
        let mut acc = 0i32;
        for row in 0..rows.k() {
            acc = acc.wrapping_add(rows.at(row, i));
        }
        group.store(unit, acc);
    }
}

/// Kernel implementing `variant`
pub fn kernel_for(variant: Variant) -> &'static dyn SumKernel {
    match variant {
        Variant::Baseline => &BaselineKernel,
        Variant::Coalesced => &CoalescedKernel,
        Variant::SharedStaged => &SharedStagedKernel,
    }
}

thread_local! {
    /// Scratch and registers of the worker thread, reused by every group it runs
    static WORKSPACE: RefCell<(SharedScratch, Vec<i32>)> = RefCell::new(Default::default());
}

/// Run `kernel` over `plan`, blocking until every wave has retired.
///
/// Groups of a wave are dispatched onto the rayon pool and may finish in any
/// order; each owns a disjoint chunk of the output.
pub fn launch(
    kernel: &dyn SumKernel,
    plan: &LaunchPlan,
    input: &DeviceBuffer,
    k: usize,
    output: &mut DeviceBuffer,
) -> Result<()> {
    if kernel.variant() != plan.config.variant {
        return Err(SumError::launch(format!(
            "{} kernel launched with a {} plan",
            kernel.variant(),
            plan.config.variant
        )));
    }
    plan.validate()?;

    let n = plan.len;
    // A buffer of another shape would be read at the wrong row stride
    if k.checked_mul(n) != Some(input.len()) {
        return Err(SumError::launch(format!(
            "input buffer holds {} elements, plan expects {k} x {n}",
            input.len()
        )));
    }
    let rows = DeviceRows::new(input.as_slice(), k, n)?;
    let out_len = output.len();
    let out = output.as_mut_slice().get_mut(..n).ok_or_else(|| {
        SumError::launch(format!("output buffer holds {out_len} of {n} elements"))
    })?;

    let units = plan.config.units_per_group;
    let shared = plan.config.shared_elements;

    for (wave_idx, wave) in plan.waves.iter().enumerate() {
        let first_group = wave.start;
        out[plan.wave_range(wave)]
            .par_chunks_mut(units)
            .enumerate()
            .try_for_each(|(offset, chunk)| {
                WORKSPACE.with(|workspace| {
                    let mut workspace = workspace.borrow_mut();
                    let (scratch, registers) = &mut *workspace;
                    scratch.resize(shared);
                    registers.resize(units, 0);

                    let id = first_group + offset;
                    let mut group = Group::new(id, id * units, units, chunk, registers, scratch);
                    run_guarded(kernel, rows, &mut group)
                })
            })?;
        tracing::trace!(wave = wave_idx, groups = wave.len(), "wave retired");
    }
    Ok(())
}

/// A panic inside a group is a device fault, reported as a launch error.
fn run_guarded(kernel: &dyn SumKernel, rows: DeviceRows<'_>, group: &mut Group<'_>) -> Result<()> {
    let id = group.id();
    panic::catch_unwind(AssertUnwindSafe(|| kernel.run_group(rows, group)))
        .unwrap_or_else(|_| Err(SumError::launch(format!("group {id} faulted"))))
}
