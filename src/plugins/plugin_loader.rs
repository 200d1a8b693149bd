//! Plugin Loader - Builds the store transport and credential provider
//!
//! The real web store client is always wrapped in [`SimulatedTransport`], so
//! packages with simulation flags never reach the network while the rest of
//! the run does.
//!
//! # Example
//!
//! ```no_run
//! use webstore_publisher::plugins::PluginLoader;
//! use webstore_publisher::UploadConfig;
//!
//! # fn example(config: &UploadConfig) -> Result<(), webstore_publisher::UploadError> {
//! let loader = PluginLoader::new(config);
//! let transport = loader.transport()?;
//! let credentials = loader.credentials()?;
//!
//! println!("Using {} transport", transport.name());
//! # Ok(())
//! # }
//! ```

use super::oauth_plugin::OAuthCredentialProvider;
use super::simulated_plugin::SimulatedTransport;
use super::webstore_plugin::WebstoreClient;
use crate::core::config::UploadConfig;
use crate::core::error::UploadError;
use crate::core::traits::{CredentialProvider, TransportClient};
use std::sync::Arc;

/// Plugin loader for the store integrations of one configuration
pub struct PluginLoader<'a> {
    config: &'a UploadConfig,
    interactive: bool,
}

impl<'a> PluginLoader<'a> {
    pub fn new(config: &'a UploadConfig) -> Self {
        Self {
            config,
            interactive: true,
        }
    }

    /// Disable prompts of the credential provider
    pub fn non_interactive(mut self) -> Self {
        self.interactive = false;
        self
    }

    /// Build the transport used by the pipeline
    pub fn transport(&self) -> Result<Arc<dyn TransportClient>, UploadError> {
        let client = WebstoreClient::from_config(self.config)?;
        Ok(Arc::new(SimulatedTransport::new(Arc::new(client))))
    }

    pub fn oauth(&self) -> Result<OAuthCredentialProvider, UploadError> {
        let provider = OAuthCredentialProvider::from_config(self.config)?;
        Ok(if self.interactive {
            provider
        } else {
            provider.non_interactive()
        })
    }

    /// Build the credential provider used by the pipeline
    pub fn credentials(&self) -> Result<Arc<dyn CredentialProvider>, UploadError> {
        Ok(Arc::new(self.oauth()?))
    }
}
