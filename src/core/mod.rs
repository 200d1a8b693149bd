pub mod config;
pub mod config_loader;
pub mod error;
pub mod package;
pub mod retry;
pub mod state_machine;
pub mod traits;

pub use config::*;
pub use config_loader::*;
pub use error::*;
pub use package::*;
pub use retry::*;
pub use state_machine::*;
pub use traits::*;
