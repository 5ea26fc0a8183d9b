//! Test suites for the courier runtime.

pub(crate) mod support;
