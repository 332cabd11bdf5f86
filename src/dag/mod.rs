// src/dag/mod.rs

//! Dependency tracking between tasks.
//!
//! - [`index`] holds the per-task unmet-dependency bookkeeping that decides
//!   readiness and promotes dependents when a task completes.
//! - [`graph`] contains the optional, opt-in validation pass that rejects
//!   cyclic or unknown dependencies at submission time.

pub mod graph;
pub mod index;

pub use graph::check_dependencies;
pub use index::DependencyIndex;
