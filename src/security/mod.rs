pub mod command_executor;
pub mod token_manager;

pub use command_executor::{CommandError, SafeCommandExecutor};
pub use token_manager::{AccountTokens, mask_token};
