//! Python type conversions for PyO3 bindings
//!
//! This module provides conversions between the Python-facing types and the
//! tensors and records of the policy layer.

pub mod conversions;
pub mod diagnostics;
