use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::Result;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::persist::{cache_path, load_json, save_json_atomic};

const USAGE_FILE: &str = "usage.json";

/// Date source for the daily quota window.
pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

/// UTC calendar date, so the local timezone never shifts the window.
pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

/// String key/value persistence for the usage counter.
pub trait UsageStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str);
    fn remove(&self, key: &str);
}

/// The two questions the orchestrator asks before each batch.
pub trait QuotaGate: Send + Sync {
    fn can_proceed(&self) -> bool;
    fn record_attempt(&self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UsageInfo {
    /// Day of the counter, on the tracker's clock.
    pub day: NaiveDate,
    pub used: u32,
    pub remaining: u32,
    pub limit: u32,
}

#[derive(Debug, Serialize, Deserialize)]
struct UsageRecord {
    used: u32,
}

pub struct UsageTracker<S, C> {
    store: S,
    clock: C,
    limit: u32,
}

impl<S: UsageStore, C: Clock> UsageTracker<S, C> {
    pub fn new(store: S, clock: C, limit: u32) -> Self {
        Self {
            store,
            clock,
            limit,
        }
    }

    fn key(&self) -> String {
        format!("apiUsage_{}", self.clock.today().format("%Y-%m-%d"))
    }

    fn used_today(&self) -> u32 {
        let key = self.key();
        let Some(raw) = self.store.get(&key) else {
            return 0;
        };
        match serde_json::from_str::<UsageRecord>(&raw) {
            Ok(record) => record.used,
            Err(err) => {
                warn!(%key, error = %err, "corrupt usage record, resetting");
                self.store.remove(&key);
                0
            }
        }
    }

    pub fn usage_info(&self) -> UsageInfo {
        let used = self.used_today();
        UsageInfo {
            day: self.clock.today(),
            used,
            remaining: self.limit.saturating_sub(used),
            limit: self.limit,
        }
    }
}

impl<S: UsageStore, C: Clock> QuotaGate for UsageTracker<S, C> {
    fn can_proceed(&self) -> bool {
        self.used_today() < self.limit
    }

    fn record_attempt(&self) {
        let used = self.used_today().saturating_add(1);
        match serde_json::to_string(&UsageRecord { used }) {
            Ok(json) => self.store.set(&self.key(), &json),
            Err(err) => warn!(error = %err, "failed to encode usage record"),
        }
    }
}

#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    entries: Mutex<HashMap<String, String>>,
}

impl UsageStore for MemoryUsageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.insert(key.to_string(), value.to_string());
        }
    }

    fn remove(&self, key: &str) {
        if let Ok(mut entries) = self.entries.lock() {
            entries.remove(key);
        }
    }
}

/// Usage map persisted as one small JSON file in the cache directory.
pub struct FileUsageStore {
    path: Option<PathBuf>,
    entries: Mutex<HashMap<String, String>>,
}

impl FileUsageStore {
    pub fn open() -> Self {
        Self::at(cache_path(USAGE_FILE))
    }

    pub fn at(path: Option<PathBuf>) -> Self {
        let entries = path
            .as_deref()
            .and_then(load_json::<HashMap<String, String>>)
            .unwrap_or_default();
        Self {
            path,
            entries: Mutex::new(entries),
        }
    }

    fn save(&self, entries: &HashMap<String, String>) -> Result<()> {
        match self.path.as_ref() {
            Some(path) => save_json_atomic(path, entries),
            None => Ok(()),
        }
    }

    fn update(&self, f: impl FnOnce(&mut HashMap<String, String>)) {
        let Ok(mut entries) = self.entries.lock() else {
            return;
        };
        f(&mut entries);
        if let Err(err) = self.save(&entries) {
            warn!(error = %err, "failed to persist usage");
        }
    }
}

impl UsageStore for FileUsageStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries.lock().ok()?.get(key).cloned()
    }

    fn set(&self, key: &str, value: &str) {
        self.update(|entries| {
            entries.insert(key.to_string(), value.to_string());
        });
    }

    fn remove(&self, key: &str) {
        self.update(|entries| {
            entries.remove(key);
        });
    }
}
