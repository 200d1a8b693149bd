pub mod core;
pub mod logging;
pub mod orchestration;
pub mod plugins;
pub mod security;
pub mod validation;

#[cfg(test)]
pub(crate) mod test_support;

pub use core::*;
pub use orchestration::{
    BatchPublishOptions, BatchPublisher, CommandHooks, ConsoleReporter, HookChain,
    JsonReportWriter, RunResult, Selection, SelectionFilters,
};
pub use plugins::PluginLoader;
pub use security::{AccountTokens, CommandError, SafeCommandExecutor};
