//! Workflows that combine store calls with access rules.

pub mod assignment;

pub use assignment::assign_task;
