//! Fire-and-forget traffic meters.
//!
//! The router marks named meters at fixed points of the uplink path and
//! never reads them back.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

pub const UPLINK_IN: &str = "router.uplink.in";
pub const UPLINK_OUT: &str = "router.uplink.out";
pub const UPLINK_NOT_SUPPORTED: &str = "router.uplink.not_supported";
pub const UPLINK_NEGATIVE_BROKER_RESPONSE: &str = "router.uplink.negative_broker_response";
pub const UPLINK_BAD_BROKER_RESPONSE: &str = "router.uplink.bad_broker_response";
pub const STAT_IN: &str = "router.stat.in";

pub trait Meter: Send + Sync {
    fn mark(&self, name: &'static str);
}

/// Discards every mark.
#[derive(Debug, Default)]
pub struct NoopMeter;

impl Meter for NoopMeter {
    fn mark(&self, _name: &'static str) {}
}

/// Counts marks in memory.
#[derive(Debug, Default)]
pub struct CountingMeter {
    counts: Mutex<BTreeMap<&'static str, u64>>,
}

impl CountingMeter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count(&self, name: &str) -> u64 {
        self.counts
            .lock()
            .map(|c| c.get(name).copied().unwrap_or(0))
            .unwrap_or(0)
    }

    pub fn snapshot(&self) -> BTreeMap<&'static str, u64> {
        self.counts.lock().map(|c| c.clone()).unwrap_or_default()
    }
}

impl Meter for CountingMeter {
    fn mark(&self, name: &'static str) {
        if let Ok(mut counts) = self.counts.lock() {
            *counts.entry(name).or_insert(0) += 1;
        }
    }
}

/// Appends `millis,meter` lines to a CSV file.
pub struct FileMeter {
    log_file: Mutex<File>,
}

impl FileMeter {
    pub fn new<P: AsRef<Path>>(path: P) -> std::io::Result<Self> {
        let file = std::fs::OpenOptions::new()
            .append(true)
            .create(true)
            .open(path)?;
        Ok(Self {
            log_file: Mutex::new(file),
        })
    }

    pub fn now() -> u128 {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0)
    }
}

impl Meter for FileMeter {
    fn mark(&self, name: &'static str) {
        let Ok(mut file) = self.log_file.lock() else {
            return;
        };
        if let Err(e) = writeln!(file, "{},{}", Self::now(), name) {
            tracing::warn!(meter = name, "failed to write meter: {e}");
        }
    }
}

/// Forwards every mark to several meters.
pub struct Meters(pub Vec<std::sync::Arc<dyn Meter>>);

impl Meter for Meters {
    fn mark(&self, name: &'static str) {
        for m in &self.0 {
            m.mark(name);
        }
    }
}
