//! In-memory `RemoteSync` used by the engine tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tokio::sync::Notify;

use super::client::{HealthStatus, RemoteSync};
use crate::error::{Error, Result};
use crate::models::{Collection, Record};

/// Pauses the first pull until released.
#[derive(Default)]
pub struct Gate {
    pub entered: Notify,
    pub release: Notify,
}

#[derive(Default)]
pub struct FakeRemote {
    server: Mutex<HashMap<String, Vec<Record>>>,
    pushed: Mutex<HashMap<String, Vec<Record>>>,
    failing: Mutex<HashSet<String>>,
    calls: Mutex<Vec<String>>,
    since: Mutex<Vec<(String, Option<DateTime<Utc>>)>>,
    offline: AtomicBool,
    gate: Mutex<Option<Arc<Gate>>>,
}

impl FakeRemote {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Records the server returns for `collection` on every pull.
    pub fn serve(&self, collection: &str, records: Vec<Value>) {
        let records = records
            .into_iter()
            .map(|value| Record::from_value(value).unwrap())
            .collect();
        self.server
            .lock()
            .unwrap()
            .insert(collection.to_string(), records);
    }

    /// Make pull and push for `collection` fail with a server error.
    pub fn fail(&self, collection: &str) {
        self.failing.lock().unwrap().insert(collection.to_string());
    }

    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    pub fn gate(&self) -> Arc<Gate> {
        let gate = Arc::new(Gate::default());
        *self.gate.lock().unwrap() = Some(Arc::clone(&gate));
        gate
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    /// Cursors passed to pull, in call order.
    pub fn pull_cursors(&self, collection: &str) -> Vec<Option<DateTime<Utc>>> {
        self.since
            .lock()
            .unwrap()
            .iter()
            .filter(|(name, _)| name == collection)
            .map(|(_, since)| *since)
            .collect()
    }

    /// Every record received for `collection`, across all pushes.
    pub fn pushed(&self, collection: &str) -> Vec<Record> {
        self.pushed
            .lock()
            .unwrap()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn log(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn check_failing(&self, collection: &Collection) -> Result<()> {
        if self.failing.lock().unwrap().contains(collection.as_str()) {
            return Err(Error::Api {
                status: 500,
                message: format!("{collection} is broken"),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl RemoteSync for FakeRemote {
    async fn health(&self) -> HealthStatus {
        self.log("health".to_string());
        if self.offline.load(Ordering::SeqCst) {
            HealthStatus::offline("connection refused")
        } else {
            HealthStatus::online(serde_json::json!({"status": "ok"}))
        }
    }

    async fn pull(
        &self,
        collection: &Collection,
        since: Option<DateTime<Utc>>,
    ) -> Result<Vec<Record>> {
        self.log(format!("pull {collection}"));
        self.since
            .lock()
            .unwrap()
            .push((collection.to_string(), since));

        let gate = self.gate.lock().unwrap().take();
        if let Some(gate) = gate {
            gate.entered.notify_one();
            gate.release.notified().await;
        }

        self.check_failing(collection)?;
        Ok(self
            .server
            .lock()
            .unwrap()
            .get(collection.as_str())
            .cloned()
            .unwrap_or_default())
    }

    async fn push(&self, collection: &Collection, records: &[Record]) -> Result<usize> {
        if records.is_empty() {
            return Ok(0);
        }
        self.log(format!("push {collection}"));
        self.check_failing(collection)?;
        self.pushed
            .lock()
            .unwrap()
            .entry(collection.to_string())
            .or_default()
            .extend(records.iter().cloned());
        Ok(records.len())
    }
}
