//! Recording fakes shared by the orchestrator tests

use crate::core::error::{Stage, UploadError};
use crate::core::package::{Account, DEFAULT_ACCOUNT, Package, Simulation};
use crate::core::traits::{
    CredentialProvider, PublishRequest, RunHooks, TransportClient, UploadFailure, UploadRequest,
    UploadResult,
};
use async_trait::async_trait;
use secrecy::SecretString;
use serde_json::{Value, json};
use std::collections::{HashMap, HashSet, VecDeque};
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

pub(crate) fn account(name: &str) -> Account {
    Account {
        name: name.to_string(),
        client_id: format!("{name}.apps.example.com"),
        client_secret: SecretString::new(format!("{name}-secret").into()),
        refresh_token: Some(SecretString::new(format!("{name}-refresh").into())),
        publish: None,
        cli_auth: false,
    }
}

pub(crate) fn package(name: &str, archive: &Path) -> Package {
    Package {
        name: name.to_string(),
        item_id: format!("{name}-id"),
        archive: archive.to_path_buf(),
        account: DEFAULT_ACCOUNT.to_string(),
        publish: false,
        publish_target: None,
        group: None,
        simulation: Simulation::default(),
    }
}

/// Credential provider returning `token-<account>` and recording each call
#[derive(Default)]
pub(crate) struct FakeCredentials {
    acquired: Mutex<Vec<String>>,
    failing: HashSet<String>,
    events: Option<EventLog>,
}

impl FakeCredentials {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn failing(mut self, account: &str) -> Self {
        self.failing.insert(account.to_string());
        self
    }

    /// Also append `acquire <account>` to a transport's event log
    pub(crate) fn sharing_events(mut self, events: EventLog) -> Self {
        self.events = Some(events);
        self
    }

    pub(crate) fn acquired(&self) -> Vec<String> {
        self.acquired.lock().unwrap().clone()
    }
}

#[async_trait]
impl CredentialProvider for FakeCredentials {
    async fn acquire_token(&self, account: &Account) -> Result<SecretString, UploadError> {
        self.acquired.lock().unwrap().push(account.name.clone());
        if let Some(events) = &self.events {
            events.lock().unwrap().push(format!("acquire {}", account.name));
        }
        tokio::task::yield_now().await;

        if self.failing.contains(&account.name) {
            return Err(UploadError::AuthenticationFailed {
                account: account.name.clone(),
                message: "invalid_grant".to_string(),
            });
        }

        Ok(SecretString::new(format!("token-{}", account.name).into()))
    }
}

pub(crate) type EventLog = Arc<Mutex<Vec<String>>>;

#[derive(Clone, Copy)]
pub(crate) enum Scripted {
    Reject,
    Drop,
}

/// Transport recording calls and in-flight pipelines
///
/// Scripted outcomes are consumed one per call; an empty script succeeds.
#[derive(Default)]
pub(crate) struct FakeTransport {
    delay: Duration,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    events: EventLog,
    scripts: Mutex<HashMap<(Stage, String), VecDeque<Scripted>>>,
}

impl FakeTransport {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn script(self, stage: Stage, package: &str, outcomes: &[Scripted]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .entry((stage, package.to_string()))
            .or_default()
            .extend(outcomes.iter().copied());
        self
    }

    pub(crate) fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    /// `start <stage> <package>` / `end <stage> <package>` in call order
    pub(crate) fn events(&self) -> Vec<String> {
        self.events.lock().unwrap().clone()
    }

    pub(crate) fn event_log(&self) -> EventLog {
        self.events.clone()
    }

    pub(crate) fn calls(&self, stage: Stage, package: &str) -> usize {
        let start = format!("start {} {}", stage, package);
        self.events().iter().filter(|e| **e == start).count()
    }

    pub(crate) fn total_calls(&self, stage: Stage) -> usize {
        let prefix = format!("start {} ", stage);
        self.events()
            .iter()
            .filter(|e| e.starts_with(&prefix))
            .count()
    }

    async fn call(&self, stage: Stage, package: &Package, success: Value) -> Result<Value, UploadError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(format!("start {} {}", stage, package.name));

        if self.delay.is_zero() {
            tokio::task::yield_now().await;
        } else {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&(stage, package.name.clone()))
            .and_then(|queue| queue.pop_front());

        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.events
            .lock()
            .unwrap()
            .push(format!("end {} {}", stage, package.name));

        match scripted {
            None => Ok(success),
            Some(Scripted::Reject) => Err(UploadError::RemoteRejection {
                package: package.name.clone(),
                stage,
                message: format!("{} rejected", stage),
                raw: Some(r#"{"error":{"message":"rejected"}}"#.to_string()),
            }),
            Some(Scripted::Drop) => Err(UploadError::Transport {
                package: package.name.clone(),
                stage,
                message: "connection reset".to_string(),
            }),
        }
    }
}

#[async_trait]
impl TransportClient for FakeTransport {
    fn name(&self) -> &str {
        "fake"
    }

    async fn upload(&self, request: UploadRequest<'_>) -> Result<Value, UploadError> {
        let success = json!({ "id": request.package.item_id, "uploadState": "SUCCESS" });
        self.call(Stage::Upload, request.package, success).await
    }

    async fn publish(&self, request: PublishRequest<'_>) -> Result<Value, UploadError> {
        let success = json!({ "id": request.package.item_id, "status": ["OK"] });
        self.call(Stage::Publish, request.package, success).await
    }
}

/// Hooks recording every call in one ordered log
#[derive(Default)]
pub(crate) struct RecordingHooks {
    log: Mutex<Vec<String>>,
    completions: Mutex<Vec<(Vec<String>, Option<String>)>>,
    fail_on: Option<&'static str>,
}

impl RecordingHooks {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Make the named hook (`finished`, `error` or `complete`) return an error
    pub(crate) fn failing(mut self, hook: &'static str) -> Self {
        self.fail_on = Some(hook);
        self
    }

    /// `finished <pkg>`, `error <pkg>` and `complete <n>` entries in call order
    pub(crate) fn log(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    /// Package names and message seen by each completion call
    pub(crate) fn completions(&self) -> Vec<(Vec<String>, Option<String>)> {
        self.completions.lock().unwrap().clone()
    }

    fn record(&self, hook: &'static str, entry: String) -> anyhow::Result<()> {
        self.log.lock().unwrap().push(entry);
        if self.fail_on == Some(hook) {
            anyhow::bail!("{} hook exploded", hook);
        }
        Ok(())
    }
}

#[async_trait]
impl RunHooks for RecordingHooks {
    async fn on_package_finished(&self, result: &UploadResult) -> anyhow::Result<()> {
        self.record("finished", format!("finished {}", result.package_name()))
    }

    async fn on_error(&self, failure: &UploadFailure) -> anyhow::Result<()> {
        tokio::task::yield_now().await;
        self.record("error", format!("error {}", failure.package_name))
    }

    async fn on_complete(&self, results: &[UploadResult], message: Option<&str>) -> anyhow::Result<()> {
        self.completions.lock().unwrap().push((
            results.iter().map(|r| r.package_name().to_string()).collect(),
            message.map(str::to_string),
        ));
        self.record("complete", format!("complete {}", results.len()))
    }
}
