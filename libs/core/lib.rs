//! Python bindings for the adaptive bias reflective layer
//!
//! This crate is a thin PyO3 interface: all statistics, corrections and state
//! transitions live in the `policy` library.

use pyo3::prelude::*;

pub mod layer;
pub mod types;

/// A Python module implemented in Rust.
#[pymodule]
#[pyo3(name = "abrl_core")]
pub fn core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<layer::PyAdaptiveLayer>()?;
    m.add_class::<types::diagnostics::PyDiagnostics>()?;

    Ok(())
}
