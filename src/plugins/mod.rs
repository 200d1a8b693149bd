pub mod oauth_plugin;
pub mod plugin_loader;
pub mod simulated_plugin;
pub mod webstore_plugin;

pub use oauth_plugin::{OAuthCredentialProvider, TokenGrant};
pub use plugin_loader::PluginLoader;
pub use simulated_plugin::SimulatedTransport;
pub use webstore_plugin::WebstoreClient;
