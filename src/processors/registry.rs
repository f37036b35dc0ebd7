//! # ProcessorRegistry: thread-safe processor catalogue.
//!
//! Processors are keyed by a normalized name (trimmed, lowercase) and a version
//! (trimmed, [`DEFAULT_VERSION`] when absent or blank).
//!
//! ## Rules
//! - Names and versions may only contain `[A-Za-z0-9_.-]`.
//! - Registering an existing key fails unless `allow_overwrite` is set.
//! - Lookups with a blank name return nothing and are not counted.
//! - Every other lookup counts as a hit or a miss in [`ProcessorStats`].

use std::{
    collections::{BTreeMap, HashMap},
    fmt,
    sync::atomic::{AtomicU64, Ordering},
    time::SystemTime,
};

use parking_lot::RwLock;
use serde::Serialize;

use crate::{error::RuntimeError, tasks::ProcessorRef};

/// Version used when none is given.
pub const DEFAULT_VERSION: &str = "default";

/// A registered processor with its registration metadata.
#[derive(Clone)]
pub struct ProcessorInfo {
    processor: ProcessorRef,
    name: String,
    version: String,
    registration_id: u64,
    registered_at: SystemTime,
}

impl ProcessorInfo {
    /// The processor handle.
    pub fn processor(&self) -> &ProcessorRef {
        &self.processor
    }

    /// Normalized registry name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Normalized version.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Monotonic id assigned at registration (starts at 1).
    pub fn registration_id(&self) -> u64 {
        self.registration_id
    }

    pub fn registered_at(&self) -> SystemTime {
        self.registered_at
    }
}

impl fmt::Debug for ProcessorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessorInfo")
            .field("processor", &self.processor.name())
            .field("name", &self.name)
            .field("version", &self.version)
            .field("registration_id", &self.registration_id)
            .finish()
    }
}

/// Registry counters.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize)]
pub struct ProcessorStats {
    /// Processors currently registered.
    pub registered_count: usize,
    /// Successful registrations since creation (overwrites included).
    pub total_registered: u64,
    /// Successful removals since creation.
    pub total_unregistered: u64,
    /// Lookups that found a processor.
    pub lookup_hits: u64,
    /// Lookups that found nothing.
    pub lookup_misses: u64,
}

impl ProcessorStats {
    /// Hit rate as a percentage, `0.0` when there were no lookups.
    pub fn hit_rate(&self) -> f64 {
        let total = self.lookup_hits + self.lookup_misses;
        if total == 0 {
            0.0
        } else {
            self.lookup_hits as f64 / total as f64 * 100.0
        }
    }
}

type Key = (String, String);

/// Thread-safe registry of processors.
#[derive(Default)]
pub struct ProcessorRegistry {
    processors: RwLock<HashMap<Key, ProcessorInfo>>,
    total_registered: AtomicU64,
    total_unregistered: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl ProcessorRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `processor` under `name` with the default version.
    ///
    /// # Errors
    /// See [`register_versioned`](Self::register_versioned).
    pub fn register(&self, name: &str, processor: ProcessorRef) -> Result<(), RuntimeError> {
        self.register_versioned(name, processor, None, false)
    }

    /// Registers `processor` under `name` and `version`.
    ///
    /// # Errors
    /// - [`RuntimeError::InvalidProcessorName`] for a blank name or invalid characters;
    /// - [`RuntimeError::InvalidProcessorVersion`] for invalid version characters;
    /// - [`RuntimeError::DuplicateProcessor`] if the key exists and `allow_overwrite` is false.
    pub fn register_versioned(
        &self,
        name: &str,
        processor: ProcessorRef,
        version: Option<&str>,
        allow_overwrite: bool,
    ) -> Result<(), RuntimeError> {
        let trimmed = name.trim();
        if !is_valid_token(trimmed) {
            return Err(RuntimeError::InvalidProcessorName {
                name: name.to_string(),
            });
        }
        if let Some(v) = version.map(str::trim).filter(|v| !v.is_empty()) {
            if !is_valid_token(v) {
                return Err(RuntimeError::InvalidProcessorVersion {
                    version: v.to_string(),
                });
            }
        }
        let key = key(trimmed, version);

        let mut map = self.processors.write();
        if !allow_overwrite && map.contains_key(&key) {
            return Err(RuntimeError::DuplicateProcessor {
                name: key.0,
                version: key.1,
            });
        }

        let id = self.total_registered.fetch_add(1, Ordering::Relaxed) + 1;
        let info = ProcessorInfo {
            processor,
            name: key.0.clone(),
            version: key.1.clone(),
            registration_id: id,
            registered_at: SystemTime::now(),
        };
        tracing::info!(
            name = %info.name,
            version = %info.version,
            processor = info.processor.name(),
            allow_overwrite,
            "processor registered"
        );
        map.insert(key, info);
        Ok(())
    }

    /// Finds the default version of `name`.
    pub fn find(&self, name: &str) -> Option<ProcessorRef> {
        self.find_version(name, None)
    }

    /// Finds `name` at `version` (`None` = default).
    pub fn find_version(&self, name: &str, version: Option<&str>) -> Option<ProcessorRef> {
        self.find_info(name, version).map(|info| info.processor)
    }

    /// Finds the registration record of `name` at `version`.
    pub fn find_info(&self, name: &str, version: Option<&str>) -> Option<ProcessorInfo> {
        if name.trim().is_empty() {
            return None;
        }
        let found = self.processors.read().get(&key(name, version)).cloned();
        let counter = if found.is_some() { &self.hits } else { &self.misses };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// All versions registered under `name`, keyed by version.
    pub fn find_all_versions(&self, name: &str) -> BTreeMap<String, ProcessorInfo> {
        if name.trim().is_empty() {
            return BTreeMap::new();
        }
        let wanted = normalize_name(name);
        self.processors
            .read()
            .iter()
            .filter(|((n, _), _)| *n == wanted)
            .map(|((_, v), info)| (v.clone(), info.clone()))
            .collect()
    }

    /// Removes the default version of `name`. Returns whether something was removed.
    pub fn unregister(&self, name: &str) -> bool {
        self.unregister_version(name, None)
    }

    /// Removes `name` at `version`. Returns whether something was removed.
    pub fn unregister_version(&self, name: &str, version: Option<&str>) -> bool {
        if name.trim().is_empty() {
            return false;
        }
        let key = key(name, version);
        let removed = self.processors.write().remove(&key).is_some();
        if removed {
            self.total_unregistered.fetch_add(1, Ordering::Relaxed);
            tracing::info!(name = %key.0, version = %key.1, "processor unregistered");
        }
        removed
    }

    /// Every registration, ordered by registration id.
    pub fn list(&self) -> Vec<ProcessorInfo> {
        let mut all: Vec<_> = self.processors.read().values().cloned().collect();
        all.sort_by_key(ProcessorInfo::registration_id);
        all
    }

    /// Current counters.
    pub fn stats(&self) -> ProcessorStats {
        ProcessorStats {
            registered_count: self.processors.read().len(),
            total_registered: self.total_registered.load(Ordering::Relaxed),
            total_unregistered: self.total_unregistered.load(Ordering::Relaxed),
            lookup_hits: self.hits.load(Ordering::Relaxed),
            lookup_misses: self.misses.load(Ordering::Relaxed),
        }
    }

    /// Drops every registration; lifetime counters are kept.
    pub fn clear(&self) {
        self.processors.write().clear();
        tracing::info!(
            total_registered = self.total_registered.load(Ordering::Relaxed),
            total_unregistered = self.total_unregistered.load(Ordering::Relaxed),
            "processor registry cleared"
        );
    }
}

fn is_valid_token(s: &str) -> bool {
    !s.is_empty()
        && s
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'_' | b'.' | b'-'))
}

fn normalize_name(name: &str) -> String {
    name.trim().to_lowercase()
}

fn key(name: &str, version: Option<&str>) -> Key {
    let version = version
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .unwrap_or(DEFAULT_VERSION);
    (normalize_name(name), version.to_string())
}
