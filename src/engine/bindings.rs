// Python Bindings
use numpy::{IntoPyArray, PyArray1, PyReadonlyArray1, PyReadonlyArray2};
use pyo3::exceptions::{PyIOError, PyMemoryError, PyRuntimeError, PyValueError};
use pyo3::prelude::*;

use crate::engine::config::DeviceConfig;
use crate::engine::controller::Accelerator;
use crate::engine::error::SumError;
use crate::engine::input::InputSet;
use crate::engine::launch::Variant;

impl From<SumError> for PyErr {
    fn from(err: SumError) -> Self {
        let msg = err.to_string();
        match err {
            SumError::Allocation { .. } => PyMemoryError::new_err(msg),
            SumError::Transfer(_) => PyIOError::new_err(msg),
            SumError::KernelLaunch(_) => PyRuntimeError::new_err(msg),
            SumError::Shape(_) => PyValueError::new_err(msg),
        }
    }
}

/// Python handle to a configured device
#[pyclass(name = "Accelerator")]
pub struct PyAccelerator {
    inner: Accelerator,
}

#[pymethods]
impl PyAccelerator {
    #[new]
    #[pyo3(signature = (memory_bytes=None, units_per_group=None))]
    pub fn new(memory_bytes: Option<usize>, units_per_group: Option<usize>) -> Self {
        let mut config = DeviceConfig::from_env();
        if let Some(bytes) = memory_bytes {
            config = config.with_memory_bytes(bytes);
        }
        if let Some(units) = units_per_group {
            config = config.with_units_per_group(units);
        }
        Self {
            inner: Accelerator::new(config),
        }
    }

    /// Bytes currently reserved on the device
    #[getter]
    pub fn used_bytes(&self) -> usize {
        self.inner.device().used_bytes()
    }

    pub fn sum<'py>(
        &self,
        py: Python<'py>,
        inputs: PyReadonlyArray2<'py, i32>,
    ) -> PyResult<Bound<'py, PyArray1<i32>>> {
        run(py, &self.inner, Variant::Baseline, inputs)
    }

    pub fn sum_o1<'py>(
        &self,
        py: Python<'py>,
        inputs: PyReadonlyArray2<'py, i32>,
    ) -> PyResult<Bound<'py, PyArray1<i32>>> {
        run(py, &self.inner, Variant::Coalesced, inputs)
    }

    pub fn sum_o2<'py>(
        &self,
        py: Python<'py>,
        inputs: PyReadonlyArray2<'py, i32>,
    ) -> PyResult<Bound<'py, PyArray1<i32>>> {
        run(py, &self.inner, Variant::SharedStaged, inputs)
    }

    pub fn sum_pair<'py>(
        &self,
        py: Python<'py>,
        a: PyReadonlyArray1<'py, i32>,
        b: PyReadonlyArray1<'py, i32>,
    ) -> PyResult<Bound<'py, PyArray1<i32>>> {
        run_pair(py, &self.inner, a, b)
    }
}

fn run<'py>(
    py: Python<'py>,
    accelerator: &Accelerator,
    variant: Variant,
    inputs: PyReadonlyArray2<'py, i32>,
) -> PyResult<Bound<'py, PyArray1<i32>>> {
    let set = InputSet::from_view(inputs.as_array())?;
    // Device work does not need the GIL
    let result = py.allow_threads(|| accelerator.sum_with(variant, &set))?;
    Ok(result.into_pyarray(py))
}

fn run_pair<'py>(
    py: Python<'py>,
    accelerator: &Accelerator,
    a: PyReadonlyArray1<'py, i32>,
    b: PyReadonlyArray1<'py, i32>,
) -> PyResult<Bound<'py, PyArray1<i32>>> {
    let set = InputSet::pair(a.as_slice()?, b.as_slice()?)?;
    let result = py.allow_threads(|| accelerator.sum(&set))?;
    Ok(result.into_pyarray(py))
}

#[pyfunction]
#[pyo3(name = "sum")]
pub fn py_sum<'py>(
    py: Python<'py>,
    inputs: PyReadonlyArray2<'py, i32>,
) -> PyResult<Bound<'py, PyArray1<i32>>> {
    run(py, &Accelerator::default(), Variant::Baseline, inputs)
}

#[pyfunction]
#[pyo3(name = "sum_o1")]
pub fn py_sum_o1<'py>(
    py: Python<'py>,
    inputs: PyReadonlyArray2<'py, i32>,
) -> PyResult<Bound<'py, PyArray1<i32>>> {
    run(py, &Accelerator::default(), Variant::Coalesced, inputs)
}

#[pyfunction]
#[pyo3(name = "sum_o2")]
pub fn py_sum_o2<'py>(
    py: Python<'py>,
    inputs: PyReadonlyArray2<'py, i32>,
) -> PyResult<Bound<'py, PyArray1<i32>>> {
    run(py, &Accelerator::default(), Variant::SharedStaged, inputs)
}

#[pyfunction]
#[pyo3(name = "sum_pair")]
pub fn py_sum_pair<'py>(
    py: Python<'py>,
    a: PyReadonlyArray1<'py, i32>,
    b: PyReadonlyArray1<'py, i32>,
) -> PyResult<Bound<'py, PyArray1<i32>>> {
    run_pair(py, &Accelerator::default(), a, b)
}
