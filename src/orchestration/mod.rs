//! Orchestration layer for web store runs
//!
//! This module provides the high-level components that turn a configuration
//! into a run: package selection, the per-package pipeline, chunked batch
//! execution, result aggregation and the host hooks.

pub mod aggregator;
pub mod batch_publisher;
pub mod hooks;
pub mod package_publisher;
pub mod selection;

// Re-export main types for convenience
pub use aggregator::{ResultAggregator, RunResult};
pub use batch_publisher::{BatchPublishOptions, BatchPublisher};
pub use hooks::{CommandHooks, ConsoleReporter, HookChain, JsonReportWriter};
pub use package_publisher::PackagePublisher;
pub use selection::{Selection, SelectionFilters, select, to_account};
