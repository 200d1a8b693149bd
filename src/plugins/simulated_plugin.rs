//! Simulated store calls
//!
//! Wraps the real transport and answers locally for packages whose
//! simulation flags are set; everything else passes through.

use crate::core::error::{Stage, UploadError};
use crate::core::package::SimulatedPublish;
use crate::core::traits::{PublishRequest, TransportClient, UploadRequest};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;

/// Delay of a simulated call
pub const SIMULATED_DELAY: Duration = Duration::from_millis(100);

pub struct SimulatedTransport {
    inner: Arc<dyn TransportClient>,
    delay: Duration,
}

impl SimulatedTransport {
    pub fn new(inner: Arc<dyn TransportClient>) -> Self {
        Self {
            inner,
            delay: SIMULATED_DELAY,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl TransportClient for SimulatedTransport {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<Value, UploadError> {
        let package = request.package;
        if !package.simulation.upload {
            return self.inner.upload(request).await;
        }

        tracing::info!(package = %package.name, "simulated upload");
        tokio::time::sleep(self.delay).await;

        Ok(json!({
            "id": package.item_id,
            "uploadState": "SUCCESS",
            "simulated": true,
        }))
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<Value, UploadError> {
        let package = request.package;
        let Some(outcome) = package.simulation.publish else {
            return self.inner.publish(request).await;
        };

        tracing::info!(package = %package.name, outcome = ?outcome, "simulated publish");
        tokio::time::sleep(self.delay).await;

        match outcome {
            SimulatedPublish::Good => Ok(json!({
                "id": package.item_id,
                "status": ["OK"],
                "simulated": true,
            })),
            SimulatedPublish::Bad => Err(UploadError::RemoteRejection {
                package: package.name.clone(),
                stage: Stage::Publish,
                message: format!(
                    "Publish failed for {}({}) due to configuration",
                    package.name, package.item_id
                ),
                raw: None,
            }),
        }
    }
}
