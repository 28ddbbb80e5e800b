//! Crate-level behaviour tests for batch runs.
