//! Feature-unit loader — discovery, validation, caching, teardown.
//!
//! # Load path
//!
//! [`ModuleLoader::load`] turns a unit name into a validated [`FeatureUnit`]:
//! cache hit returns the identical `Arc` (loading is idempotent and
//! `initialize` runs exactly once); otherwise the registry factory runs, the
//! candidate is contract-checked, `initialize(options)` is awaited, and a
//! [`LoadRecord`] is cached. Any failure is logged and degraded to a
//! [`FallbackUnit`] unless fallback creation is disabled, which is the single
//! case where a [`LoadError`] reaches the caller.
//!
//! # Concurrency
//!
//! Loads of the same name are serialised through a per-name in-flight guard,
//! because the cache-check-then-insert sequence spans await points. Loads of
//! different names proceed independently. No other lock is held across an
//! await.
//!
//! # Memory budget
//!
//! RSS is sampled before and after instantiation; a delta above the
//! configured threshold logs a warning and is surfaced via
//! [`ModuleLoader::health_check`], but never blocks the load.

pub mod contract;
pub mod memory;
pub mod registry;

use std::collections::{BTreeMap, HashMap};
use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex, RwLock};

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info, warn};

pub use contract::FeatureUnit;
pub use registry::UnitRegistry;

/// Default advisory per-unit memory budget: 512 MiB.
pub const DEFAULT_MEMORY_THRESHOLD_BYTES: u64 = 512 * 1024 * 1024;

type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

// ── Errors ────────────────────────────────────────────────────────────────────

/// Loader failure taxonomy. All variants are absorbed into fallback units
/// when fallback creation is enabled.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("unit not found: {0}")]
    NotFound(String),

    #[error("contract violation in unit '{unit}': {problems}")]
    ContractViolation { unit: String, problems: String },

    #[error("initialization of unit '{unit}' failed: {message}")]
    InitializationFailure { unit: String, message: String },
}

// ── Load results ──────────────────────────────────────────────────────────────

/// Synthetic stand-in returned when a named unit cannot be loaded.
/// Never cached; every failed load attempt creates a fresh one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FallbackUnit {
    name: String,
}

impl FallbackUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Outcome of a load attempt — callers pattern-match instead of inspecting
/// sentinel fields.
#[derive(Debug, Clone)]
pub enum LoadResult {
    Loaded(Arc<FeatureUnit>),
    Fallback(FallbackUnit),
}

impl LoadResult {
    pub fn is_fallback(&self) -> bool {
        matches!(self, LoadResult::Fallback(_))
    }

    pub fn unit(&self) -> Option<&Arc<FeatureUnit>> {
        match self {
            LoadResult::Loaded(unit) => Some(unit),
            LoadResult::Fallback(_) => None,
        }
    }
}

// ── Bookkeeping ───────────────────────────────────────────────────────────────

/// Cache entry for one successfully loaded unit. Owned exclusively by the
/// loader; destroyed on [`ModuleLoader::cleanup`].
struct LoadRecord {
    unit: Arc<FeatureUnit>,
    loaded_at: DateTime<Utc>,
    memory_delta: i64,
    #[allow(dead_code)]
    options: Value,
}

/// Loader construction parameters.
#[derive(Debug, Clone)]
pub struct LoaderConfig {
    /// Advisory per-unit memory budget in bytes.
    pub memory_threshold_bytes: u64,
    /// When false, load failures propagate instead of degrading to fallback.
    pub fallback_enabled: bool,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            memory_threshold_bytes: DEFAULT_MEMORY_THRESHOLD_BYTES,
            fallback_enabled: true,
        }
    }
}

/// Aggregate load statistics.
#[derive(Debug, Clone, Serialize)]
pub struct LoaderStats {
    pub total_units_loaded: usize,
    pub per_unit_memory: BTreeMap<String, i64>,
    pub total_memory_delta: i64,
}

/// Snapshot returned by [`ModuleLoader::health_check`].
#[derive(Debug, Clone, Serialize)]
pub struct HealthReport {
    pub available: Vec<String>,
    pub stats: LoaderStats,
    pub memory_threshold_bytes: u64,
    pub fallback_enabled: bool,
    /// Units whose load exceeded the memory budget since the last cleanup.
    pub budget_warnings: Vec<String>,
}

// ── ModuleLoader ──────────────────────────────────────────────────────────────

/// Owns the unit registry and the cache of loaded units.
///
/// Constructed explicitly by the host's startup routine, which is also
/// responsible for the single `cleanup()` call on exit — there is no global
/// instance and no implicit exit hook.
pub struct ModuleLoader {
    registry: UnitRegistry,
    config: LoaderConfig,
    cache: RwLock<HashMap<String, LoadRecord>>,
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
    budget_warnings: Mutex<Vec<String>>,
}

impl ModuleLoader {
    pub fn new(registry: UnitRegistry, config: LoaderConfig) -> Self {
        Self {
            registry,
            config,
            cache: RwLock::new(HashMap::new()),
            inflight: Mutex::new(HashMap::new()),
            budget_warnings: Mutex::new(Vec::new()),
        }
    }

    /// Load `name`, passing `options` through to its `initialize` hook.
    ///
    /// Idempotent: a cached unit is returned as the same `Arc` without
    /// re-running `initialize`.
    pub async fn load(&self, name: &str, options: Value) -> Result<LoadResult, LoadError> {
        if let Some(unit) = self.cached(name) {
            return Ok(LoadResult::Loaded(unit));
        }

        let gate = self.gate(name);
        let _held = gate.lock().await;

        // A concurrent load may have won the gate first.
        if let Some(unit) = self.cached(name) {
            return Ok(LoadResult::Loaded(unit));
        }

        match self.load_uncached(name, options).await {
            Ok(unit) => Ok(LoadResult::Loaded(unit)),
            Err(e) => self.degrade(name, e),
        }
    }

    /// Load `name` plus its declared dependency closure, supplying resolved
    /// instances through the unit's injection hook.
    ///
    /// A circular `dependencies` chain is a contract violation naming the
    /// cycle, degraded like any other load failure.
    pub async fn load_with_dependencies(
        &self,
        name: &str,
        options: Value,
    ) -> Result<LoadResult, LoadError> {
        let mut trail = Vec::new();
        match self.load_recursive(name.to_string(), options, &mut trail).await {
            Ok(result) => Ok(result),
            Err(e) => self.degrade(name, e),
        }
    }

    fn load_recursive<'a>(
        &'a self,
        name: String,
        options: Value,
        trail: &'a mut Vec<String>,
    ) -> BoxFuture<'a, Result<LoadResult, LoadError>> {
        Box::pin(async move {
            if trail.iter().any(|n| *n == name) {
                let cycle = format!("{} -> {name}", trail.join(" -> "));
                return Err(LoadError::ContractViolation {
                    unit: name,
                    problems: format!("dependency cycle: {cycle}"),
                });
            }

            let result = self.load(&name, options).await?;
            let unit = match &result {
                LoadResult::Loaded(unit) => Arc::clone(unit),
                LoadResult::Fallback(_) => return Ok(result),
            };

            if unit.dependencies().is_empty() {
                return Ok(result);
            }

            trail.push(name.clone());
            let mut resolved = Vec::new();
            for dep in unit.dependencies().to_vec() {
                match self.load_recursive(dep, Value::Null, trail).await? {
                    LoadResult::Loaded(d) => resolved.push(d),
                    LoadResult::Fallback(fb) => {
                        warn!(
                            unit = %name,
                            dependency = fb.name(),
                            "dependency degraded to fallback, skipping injection"
                        );
                    }
                }
            }
            trail.pop();

            unit.supply_dependencies(resolved);
            Ok(result)
        })
    }

    async fn load_uncached(&self, name: &str, options: Value) -> Result<Arc<FeatureUnit>, LoadError> {
        debug!(unit = name, "loading");

        let before = memory::sample();

        let def = self
            .registry
            .instantiate(name)
            .ok_or_else(|| LoadError::NotFound(name.to_string()))?;

        let unit = FeatureUnit::validate(name, def).map_err(|problems| LoadError::ContractViolation {
            unit: name.to_string(),
            problems: problems.join(", "),
        })?;
        let unit = Arc::new(unit);

        unit.run_initialize(options.clone())
            .await
            .map_err(|e| LoadError::InitializationFailure {
                unit: name.to_string(),
                message: e.to_string(),
            })?;

        let after = memory::sample();
        let delta = after as i64 - before as i64;
        if delta > 0 && delta as u64 > self.config.memory_threshold_bytes {
            warn!(
                unit = name,
                delta_bytes = delta,
                threshold_bytes = self.config.memory_threshold_bytes,
                "unit exceeded memory budget"
            );
            lock(&self.budget_warnings).push(name.to_string());
        }

        info!(unit = name, memory_delta = delta, "unit loaded");

        let record = LoadRecord {
            unit: Arc::clone(&unit),
            loaded_at: Utc::now(),
            memory_delta: delta,
            options,
        };
        write_lock(&self.cache).insert(name.to_string(), record);

        Ok(unit)
    }

    fn degrade(&self, name: &str, err: LoadError) -> Result<LoadResult, LoadError> {
        if self.config.fallback_enabled {
            warn!(unit = name, error = %err, "load failed, returning fallback unit");
            Ok(LoadResult::Fallback(FallbackUnit::new(name)))
        } else {
            Err(err)
        }
    }

    /// Tear down every cached unit, best-effort and in name order, then clear
    /// the cache. Individual teardown failures are logged and skipped.
    pub async fn cleanup(&self) {
        let mut drained: Vec<(String, LoadRecord)> =
            write_lock(&self.cache).drain().collect();
        if drained.is_empty() {
            return;
        }
        drained.sort_by(|(a, _), (b, _)| a.cmp(b));

        info!(count = drained.len(), "tearing down loaded units");
        for (name, record) in drained {
            if let Err(e) = record.unit.run_teardown().await {
                warn!(unit = %name, error = %e, "teardown failed, continuing");
            }
        }

        lock(&self.budget_warnings).clear();
    }

    /// Aggregate load statistics over the current cache.
    pub fn stats(&self) -> LoaderStats {
        let cache = read_lock(&self.cache);
        let per_unit_memory: BTreeMap<String, i64> = cache
            .iter()
            .map(|(name, record)| (name.clone(), record.memory_delta))
            .collect();
        let total_memory_delta = per_unit_memory.values().sum();
        LoaderStats {
            total_units_loaded: per_unit_memory.len(),
            per_unit_memory,
            total_memory_delta,
        }
    }

    /// Discoverable unit names, independent of what has been loaded.
    pub fn list_available(&self) -> Vec<String> {
        self.registry.names()
    }

    /// Whether `name` currently has a cached load record.
    pub fn is_loaded(&self, name: &str) -> bool {
        read_lock(&self.cache).contains_key(name)
    }

    /// When `name` is loaded, the time it was cached.
    pub fn loaded_at(&self, name: &str) -> Option<DateTime<Utc>> {
        read_lock(&self.cache).get(name).map(|r| r.loaded_at)
    }

    /// Combined availability, stats, and configuration snapshot.
    pub fn health_check(&self) -> HealthReport {
        HealthReport {
            available: self.list_available(),
            stats: self.stats(),
            memory_threshold_bytes: self.config.memory_threshold_bytes,
            fallback_enabled: self.config.fallback_enabled,
            budget_warnings: lock(&self.budget_warnings).clone(),
        }
    }

    fn cached(&self, name: &str) -> Option<Arc<FeatureUnit>> {
        read_lock(&self.cache).get(name).map(|r| Arc::clone(&r.unit))
    }

    fn gate(&self, name: &str) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = lock(&self.inflight);
        Arc::clone(inflight.entry(name.to_string()).or_default())
    }
}

// Poison recovery: a panicked holder leaves the data intact for our usage
// (plain inserts/reads), so continue with the inner value.
fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn read_lock<T>(l: &RwLock<T>) -> std::sync::RwLockReadGuard<'_, T> {
    l.read().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn write_lock<T>(l: &RwLock<T>) -> std::sync::RwLockWriteGuard<'_, T> {
    l.write().unwrap_or_else(|poisoned| poisoned.into_inner())
}
