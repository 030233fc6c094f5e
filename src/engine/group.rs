// Group Runtime
// A group is a cluster of work units scheduled together. Its units run in
// lockstep on one scheduler thread and share a scratch region that is only
// readable after the group barrier completes.
use bitvec::prelude::*;

use crate::engine::error::{Result, SumError};

/// Fast group-shared scratch. Each worker thread keeps one and resizes it for
/// every group it runs; contents are not cleared between groups.
#[derive(Debug, Default)]
pub struct SharedScratch {
    data: Vec<i32>,
    published: bool,
}

impl SharedScratch {
    pub fn new(elements: usize) -> Self {
        Self {
            data: vec![0; elements],
            published: false,
        }
    }

    pub fn capacity(&self) -> usize {
        self.data.len()
    }

    /// Reshape for the next group and close it to readers until its barrier.
    pub fn resize(&mut self, elements: usize) {
        self.data.resize(elements, 0);
        self.published = false;
    }

    fn out_of_bounds(&self, idx: usize) -> SumError {
        SumError::launch(format!(
            "scratch index {idx} exceeds capacity {}",
            self.capacity()
        ))
    }
}

/// Local rendezvous for the units of one group.
#[derive(Debug)]
pub struct GroupBarrier {
    arrived: BitVec,
    count: usize,
}

impl GroupBarrier {
    pub fn new(units: usize) -> Self {
        Self {
            arrived: bitvec![usize, Lsb0; 0; units],
            count: 0,
        }
    }

    pub fn arrive(&mut self, unit: usize) -> Result<()> {
        match self.arrived.get(unit).map(|bit| *bit) {
            None => Err(SumError::launch(format!("unit {unit} is not in this group"))),
            Some(true) => Err(SumError::launch(format!("unit {unit} arrived twice"))),
            Some(false) => {
                self.arrived.set(unit, true);
                self.count += 1;
                Ok(())
            }
        }
    }

    pub fn is_complete(&self) -> bool {
        self.count == self.arrived.len()
    }

    pub fn pending(&self) -> usize {
        self.arrived.len() - self.count
    }

    /// Release every waiting unit and start the next phase.
    pub fn complete(&mut self) -> Result<()> {
        if !self.is_complete() {
            return Err(SumError::launch(format!(
                "barrier released with {} of {} units missing",
                self.pending(),
                self.arrived.len()
            )));
        }
        self.arrived.fill(false);
        self.count = 0;
        Ok(())
    }
}

/// Execution context handed to a kernel for one group.
pub struct Group<'a> {
    id: usize,
    base: usize,
    full_units: usize,
    output: &'a mut [i32],
    registers: &'a mut [i32],
    scratch: &'a mut SharedScratch,
    barrier: GroupBarrier,
}

impl<'a> Group<'a> {
    /// `output` is this group's slice of the result; its length is the number of
    /// units in the group. `registers` must be at least as long.
    pub fn new(
        id: usize,
        base: usize,
        full_units: usize,
        output: &'a mut [i32],
        registers: &'a mut [i32],
        scratch: &'a mut SharedScratch,
    ) -> Self {
        let units = output.len();
        scratch.published = false;
        Self {
            id,
            base,
            full_units,
            output,
            registers: &mut registers[..units],
            scratch,
            barrier: GroupBarrier::new(units),
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    /// Global output index of unit 0
    pub fn base(&self) -> usize {
        self.base
    }

    pub fn units(&self) -> usize {
        self.output.len()
    }

    /// False for the trailing group of a launch that does not fill a whole group
    pub fn is_full(&self) -> bool {
        self.units() == self.full_units
    }

    pub fn store(&mut self, unit: usize, value: i32) {
        self.output[unit] = value;
    }

    /// One private accumulator per unit
    pub fn registers(&mut self) -> &mut [i32] {
        &mut *self.registers
    }

    /// Each unit writes its register to its output slot
    pub fn commit_registers(&mut self) {
        self.output.copy_from_slice(&*self.registers);
    }

    /// Write `value` into the scratch tile at (`row`, `unit`).
    pub fn stage(&mut self, unit: usize, row: usize, value: i32) -> Result<()> {
        if self.scratch.published {
            return Err(SumError::launch(format!(
                "group {} wrote scratch after its barrier",
                self.id
            )));
        }
        let idx = row * self.units() + unit;
        match self.scratch.data.get_mut(idx) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.scratch.out_of_bounds(idx)),
        }
    }

    pub fn arrive(&mut self, unit: usize) -> Result<()> {
        self.barrier.arrive(unit)
    }

    /// Group-wide barrier: staged data becomes visible to every unit.
    pub fn sync(&mut self) -> Result<()> {
        self.barrier.complete()?;
        self.scratch.published = true;
        Ok(())
    }

    pub fn shared(&self, unit: usize, row: usize) -> Result<i32> {
        if !self.scratch.published {
            return Err(SumError::launch(format!(
                "group {} read scratch before its barrier",
                self.id
            )));
        }
        let idx = row * self.units() + unit;
        self.scratch
            .data
            .get(idx)
            .copied()
            .ok_or_else(|| self.scratch.out_of_bounds(idx))
    }
}
