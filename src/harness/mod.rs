//! Conformance harness — mechanical verification of the loader and facade.
//!
//! Four phases run in order, each contributing [`ModuleTestResult`]s to one
//! merged [`TestReport`]:
//!
//! 1. **Unit** — every discoverable unit loads, is cache-identical on the
//!    second load, honours the contract, answers its entry point, and tears
//!    down cleanly.
//! 2. **Integration** — loader stats are internally consistent and a full
//!    cleanup empties the cache without shrinking discovery.
//! 3. **Performance** — cold and cached load timings per unit, recorded but
//!    never asserted.
//! 4. **Compatibility** — host platform facts, with out-of-set platforms
//!    producing a warning rather than a failure.
//!
//! A final forced-fallback sweep asserts every capability still returns a
//! structurally valid result with the loader bypassed — the regression guard
//! against silent fallback breakage.
//!
//! All loading goes through the facade's loader; the harness never constructs
//! units itself, so contract validation is never bypassed.

pub mod report;

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tracing::info;

use crate::facade::{CAPABILITIES, IntegrationFacade, SUPPORTED_OS};
use crate::loader::LoadResult;
use report::{LoadTiming, ModuleTestResult, PlatformRecord, TestReport};

pub struct ConformanceHarness<'a> {
    facade: &'a IntegrationFacade,
}

impl<'a> ConformanceHarness<'a> {
    pub fn new(facade: &'a IntegrationFacade) -> Self {
        Self { facade }
    }

    /// Run all phases and merge the results into one report.
    pub async fn run(&self) -> TestReport {
        let mut results = Vec::new();

        for name in self.facade.loader().list_available() {
            results.push(self.unit_phase(&name).await);
        }
        results.push(self.integration_phase().await);
        let timings = self.performance_phase().await;
        results.push(self.compatibility_phase());
        results.push(self.fallback_sweep().await);

        let report = TestReport::from_results(results, timings, PlatformRecord::current());
        info!(
            passed = report.total_passed,
            failed = report.total_failed,
            success_rate = report.success_rate,
            "conformance run complete"
        );
        report
    }

    async fn unit_phase(&self, name: &str) -> ModuleTestResult {
        let loader = self.facade.loader();
        let started = Instant::now();
        let mut r = ModuleTestResult::new(name);

        match loader.load(name, Value::Null).await {
            Ok(LoadResult::Loaded(first)) => {
                r.check("loads without error", true, "loaded");

                match loader.load(name, Value::Null).await {
                    Ok(LoadResult::Loaded(second)) => r.check(
                        "cached load is identical",
                        Arc::ptr_eq(&first, &second),
                        "second load must return the same instance",
                    ),
                    _ => r.check(
                        "cached load is identical",
                        false,
                        "second load did not return a loaded unit",
                    ),
                }

                match first.metadata() {
                    Some(meta) => r.check(
                        "metadata well formed",
                        !meta.name.is_empty() && !meta.version.is_empty(),
                        format!("{} {}", meta.name, meta.version),
                    ),
                    None => r.warn("metadata well formed", "unit declares no metadata"),
                }

                let available = loader.list_available();
                let unresolved: Vec<&String> = first
                    .dependencies()
                    .iter()
                    .filter(|d| !available.contains(d))
                    .collect();
                r.check(
                    "declared dependencies discoverable",
                    unresolved.is_empty(),
                    format!("unresolved: {unresolved:?}"),
                );

                match first.invoke(Vec::new()).await {
                    Ok(value) => r.check(
                        "entry point answers",
                        value.is_object(),
                        "returned a result object",
                    ),
                    Err(e) => r.check("entry point answers", false, e.to_string()),
                }

                if first.has_teardown() {
                    match first.run_teardown().await {
                        Ok(()) => r.check("teardown completes", true, "ok"),
                        Err(e) => r.check("teardown completes", false, e.to_string()),
                    }
                }
            }
            Ok(LoadResult::Fallback(_)) => {
                r.check("loads without error", false, "degraded to fallback");
            }
            Err(e) => r.check("loads without error", false, e.to_string()),
        }

        r.duration_ms = started.elapsed().as_millis() as u64;
        r.memory_delta = loader
            .stats()
            .per_unit_memory
            .get(name)
            .copied()
            .unwrap_or(0);
        r
    }

    async fn integration_phase(&self) -> ModuleTestResult {
        let loader = self.facade.loader();
        let mut r = ModuleTestResult::new("loader-integration");

        for name in loader.list_available() {
            let _ = loader.load(&name, Value::Null).await;
        }

        let stats = loader.stats();
        let sum: i64 = stats.per_unit_memory.values().sum();
        r.check(
            "per-unit deltas sum to total",
            sum == stats.total_memory_delta,
            format!("sum {sum} vs total {}", stats.total_memory_delta),
        );

        let health = loader.health_check();
        r.check(
            "health matches loaded count",
            health.stats.total_units_loaded == stats.total_units_loaded,
            format!(
                "health {} vs stats {}",
                health.stats.total_units_loaded, stats.total_units_loaded
            ),
        );

        let available_before = loader.list_available();
        loader.cleanup().await;
        let after = loader.stats();
        r.check(
            "cleanup empties the cache",
            after.total_units_loaded == 0 && after.total_memory_delta == 0,
            format!("{} units remain", after.total_units_loaded),
        );
        r.check(
            "discovery unchanged by cleanup",
            loader.list_available() == available_before,
            "list_available must not shrink",
        );

        r
    }

    /// Cold/cached timings per unit. The preceding integration phase left the
    /// cache empty, so the first load here is genuinely cold.
    async fn performance_phase(&self) -> Vec<LoadTiming> {
        let loader = self.facade.loader();
        let mut timings = Vec::new();

        for name in loader.list_available() {
            let t0 = Instant::now();
            let _ = loader.load(&name, Value::Null).await;
            let cold_us = t0.elapsed().as_micros() as u64;

            let t1 = Instant::now();
            let _ = loader.load(&name, Value::Null).await;
            let cached_us = t1.elapsed().as_micros() as u64;

            let memory_delta = loader
                .stats()
                .per_unit_memory
                .get(&name)
                .copied()
                .unwrap_or(0);

            timings.push(LoadTiming {
                unit: name,
                cold_us,
                cached_us,
                memory_delta,
            });
        }

        timings
    }

    fn compatibility_phase(&self) -> ModuleTestResult {
        let mut r = ModuleTestResult::new("platform-compatibility");

        let os = std::env::consts::OS;
        if SUPPORTED_OS.contains(&os) {
            r.check("host platform supported", true, os);
        } else {
            r.warn("host platform supported", format!("untested platform: {os}"));
        }

        r.check(
            "architecture recorded",
            !std::env::consts::ARCH.is_empty(),
            std::env::consts::ARCH,
        );

        r
    }

    /// With forced fallback set, every capability must still answer with its
    /// required result shape.
    async fn fallback_sweep(&self) -> ModuleTestResult {
        let mut r = ModuleTestResult::new("forced-fallback");

        self.facade.set_forced_fallback(true);
        for cap in CAPABILITIES {
            let assertion = format!("{} fallback shape", cap.name);
            match self.facade.invoke_capability(cap.name, &[]).await {
                Ok(value) => {
                    let missing: Vec<&&str> = cap
                        .required_keys
                        .iter()
                        .filter(|k| value.get(**k).is_none())
                        .collect();
                    r.check(
                        &assertion,
                        missing.is_empty(),
                        format!("missing keys: {missing:?}"),
                    );
                }
                Err(e) => r.check(&assertion, false, e.to_string()),
            }
        }
        self.facade.set_forced_fallback(false);

        r
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::{LoaderConfig, ModuleLoader, UnitRegistry};
    use crate::loader::contract::UnitDefinition;
    use crate::units;

    fn full_facade() -> IntegrationFacade {
        IntegrationFacade::new(ModuleLoader::new(
            units::default_registry(),
            LoaderConfig::default(),
        ))
    }

    #[tokio::test]
    async fn full_run_passes_on_shipped_units() {
        let facade = full_facade();
        let report = ConformanceHarness::new(&facade).run().await;

        assert!(report.all_passed(), "failures: {:#?}", report.results);
        assert_eq!(report.success_rate, 1.0);
        // Four shipped units plus the three synthetic phase subjects.
        assert_eq!(report.results.len(), 4 + 3);
        assert_eq!(report.timings.len(), 4);
    }

    #[tokio::test]
    async fn broken_unit_is_reported_not_fatal() {
        let mut registry = units::default_registry();
        registry.register("hollow", Box::new(UnitDefinition::default));
        let facade =
            IntegrationFacade::new(ModuleLoader::new(registry, LoaderConfig::default()));

        let report = ConformanceHarness::new(&facade).run().await;
        assert!(!report.all_passed());

        let hollow = report.results.iter().find(|r| r.unit == "hollow").unwrap();
        assert!(hollow.failed > 0);
        // Other units still pass their phases.
        let version = report.results.iter().find(|r| r.unit == "version").unwrap();
        assert_eq!(version.failed, 0);
    }

    #[tokio::test]
    async fn empty_registry_still_produces_valid_fallback_sweep() {
        let facade = IntegrationFacade::new(ModuleLoader::new(
            UnitRegistry::new(),
            LoaderConfig::default(),
        ));
        let report = ConformanceHarness::new(&facade).run().await;

        let sweep = report
            .results
            .iter()
            .find(|r| r.unit == "forced-fallback")
            .unwrap();
        assert_eq!(sweep.failed, 0);
        assert_eq!(sweep.passed, CAPABILITIES.len());
    }

    #[tokio::test]
    async fn sweep_restores_forced_fallback_flag() {
        let facade = full_facade();
        ConformanceHarness::new(&facade).run().await;
        assert!(!facade.system_status().forced_fallback);
    }
}
