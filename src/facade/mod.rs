//! Integration facade — stable capability API over the loader.
//!
//! The host program calls capabilities by name and never sees whether the
//! backing feature unit loaded or a built-in equivalent ran. A missing or
//! broken unit is exactly what the fallback path absorbs; only a defect in a
//! built-in implementation itself may surface as an error.
//!
//! The facade exclusively owns the [`IntegrationState`] telemetry: which
//! capabilities ran modular (usage map) and how often the fallback path was
//! taken (fallback counter).

pub mod builtins;

use std::collections::BTreeMap;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::error::AppError;
use crate::loader::{HealthReport, LoadResult, LoaderStats, ModuleLoader};

/// Platforms the compatibility checks treat as supported.
pub const SUPPORTED_OS: &[&str] = &["linux", "macos", "windows"];

type BuiltinFn = fn(&[Value]) -> Result<Value, AppError>;

/// Static description of one capability: the unit backing it, its built-in
/// equivalent, and the result keys both implementations must produce.
pub struct Capability {
    pub name: &'static str,
    pub unit: &'static str,
    pub required_keys: &'static [&'static str],
    builtin: BuiltinFn,
}

pub const CAPABILITIES: &[Capability] = &[
    Capability {
        name: "resolve-version",
        unit: "version",
        required_keys: &["name", "version", "source"],
        builtin: builtins::resolve_version,
    },
    Capability {
        name: "validate-environment",
        unit: "environment",
        required_keys: &["os", "arch", "supported", "issues", "source"],
        builtin: builtins::validate_environment,
    },
    Capability {
        name: "render-help",
        unit: "help",
        required_keys: &["text", "capabilities", "source"],
        builtin: builtins::render_help,
    },
    Capability {
        name: "render-report",
        unit: "report",
        required_keys: &["generated_at", "sections", "source"],
        builtin: builtins::render_report,
    },
];

/// Look up a capability by name.
pub fn capability(name: &str) -> Option<&'static Capability> {
    CAPABILITIES.iter().find(|c| c.name == name)
}

// ── Telemetry ─────────────────────────────────────────────────────────────────

/// Per-capability modular-path usage record.
#[derive(Debug, Clone, Serialize)]
pub struct CapabilityUsage {
    pub first_used: DateTime<Utc>,
    pub last_used: DateTime<Utc>,
    pub count: u64,
}

#[derive(Debug)]
struct IntegrationState {
    modular: bool,
    forced_fallback: bool,
    usage: BTreeMap<String, CapabilityUsage>,
    fallback_count: u64,
}

impl Default for IntegrationState {
    fn default() -> Self {
        Self {
            modular: true,
            forced_fallback: false,
            usage: BTreeMap::new(),
            fallback_count: 0,
        }
    }
}

/// Snapshot returned by [`IntegrationFacade::system_status`].
#[derive(Debug, Clone, Serialize)]
pub struct SystemStatus {
    pub modular_mode: bool,
    pub forced_fallback: bool,
    pub fallback_count: u64,
    pub capability_usage: BTreeMap<String, CapabilityUsage>,
    pub health: HealthReport,
    pub stats: LoaderStats,
}

// ── IntegrationFacade ─────────────────────────────────────────────────────────

pub struct IntegrationFacade {
    loader: ModuleLoader,
    state: Mutex<IntegrationState>,
}

impl IntegrationFacade {
    pub fn new(loader: ModuleLoader) -> Self {
        Self {
            loader,
            state: Mutex::new(IntegrationState::default()),
        }
    }

    pub fn loader(&self) -> &ModuleLoader {
        &self.loader
    }

    /// Invoke `name` with `args`, preferring the feature unit and degrading
    /// to the built-in equivalent. Errors only on an unknown capability name
    /// or a defect in the built-in itself.
    pub async fn invoke_capability(&self, name: &str, args: &[Value]) -> Result<Value, AppError> {
        let cap = capability(name)
            .ok_or_else(|| AppError::Capability(format!("unknown capability: {name}")))?;

        let (modular, forced) = {
            let state = lock(&self.state);
            (state.modular, state.forced_fallback)
        };

        if modular && !forced {
            match self.loader.load_with_dependencies(cap.unit, Value::Null).await {
                Ok(LoadResult::Loaded(unit)) => match unit.invoke(args.to_vec()).await {
                    Ok(value) => {
                        self.record_use(name);
                        return Ok(value);
                    }
                    Err(e) => {
                        warn!(capability = name, unit = cap.unit, error = %e,
                              "unit entry failed, using built-in");
                    }
                },
                Ok(LoadResult::Fallback(fb)) => {
                    debug!(capability = name, unit = fb.name(), "unit unavailable, using built-in");
                }
                Err(e) => {
                    // Fallback creation disabled in the loader; the facade
                    // still degrades rather than surfacing a unit failure.
                    warn!(capability = name, error = %e, "loader error, using built-in");
                }
            }
        }

        self.record_fallback(name);
        (cap.builtin)(args)
    }

    pub fn set_modular_mode(&self, enabled: bool) {
        lock(&self.state).modular = enabled;
    }

    pub fn set_forced_fallback(&self, enabled: bool) {
        lock(&self.state).forced_fallback = enabled;
    }

    /// IntegrationState snapshot plus loader health and stats.
    pub fn system_status(&self) -> SystemStatus {
        let state = lock(&self.state);
        SystemStatus {
            modular_mode: state.modular,
            forced_fallback: state.forced_fallback,
            fallback_count: state.fallback_count,
            capability_usage: state.usage.clone(),
            health: self.loader.health_check(),
            stats: self.loader.stats(),
        }
    }

    /// Tear down loaded units and reset the telemetry counters. Mode flags
    /// are preserved.
    pub async fn cleanup(&self) {
        self.loader.cleanup().await;
        let mut state = lock(&self.state);
        state.usage.clear();
        state.fallback_count = 0;
    }

    fn record_use(&self, name: &str) {
        let now = Utc::now();
        let mut state = lock(&self.state);
        state
            .usage
            .entry(name.to_string())
            .and_modify(|u| {
                u.count += 1;
                u.last_used = now;
            })
            .or_insert(CapabilityUsage {
                first_used: now,
                last_used: now,
                count: 1,
            });
    }

    fn record_fallback(&self, name: &str) {
        debug!(capability = name, "capability served by built-in fallback");
        lock(&self.state).fallback_count += 1;
    }
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}
