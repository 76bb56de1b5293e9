//! Conformance report types — serialisable results for the harness phases.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// One assertion executed against a unit or subsystem.
#[derive(Debug, Clone, Serialize)]
pub struct TestOutcome {
    pub assertion: String,
    pub passed: bool,
    pub message: String,
}

/// All outcomes for one unit (or one synthetic phase subject).
#[derive(Debug, Clone, Serialize)]
pub struct ModuleTestResult {
    pub unit: String,
    pub outcomes: Vec<TestOutcome>,
    pub passed: usize,
    pub failed: usize,
    pub duration_ms: u64,
    pub memory_delta: i64,
}

impl ModuleTestResult {
    pub fn new(unit: impl Into<String>) -> Self {
        Self {
            unit: unit.into(),
            outcomes: Vec::new(),
            passed: 0,
            failed: 0,
            duration_ms: 0,
            memory_delta: 0,
        }
    }

    /// Record an assertion outcome.
    pub fn check(&mut self, assertion: &str, passed: bool, message: impl Into<String>) {
        if passed {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self.outcomes.push(TestOutcome {
            assertion: assertion.to_string(),
            passed,
            message: message.into(),
        });
    }

    /// Record a non-fatal observation — counts as passed, flagged in the message.
    pub fn warn(&mut self, assertion: &str, message: impl Into<String>) {
        self.check(assertion, true, format!("warning: {}", message.into()));
    }
}

/// Cold/cached load timing for one unit. Observational only.
#[derive(Debug, Clone, Serialize)]
pub struct LoadTiming {
    pub unit: String,
    pub cold_us: u64,
    pub cached_us: u64,
    pub memory_delta: i64,
}

/// Host platform facts recorded by the compatibility phase.
#[derive(Debug, Clone, Serialize)]
pub struct PlatformRecord {
    pub os: String,
    pub arch: String,
    pub family: String,
    pub package_version: String,
}

impl PlatformRecord {
    pub fn current() -> Self {
        Self {
            os: std::env::consts::OS.to_string(),
            arch: std::env::consts::ARCH.to_string(),
            family: std::env::consts::FAMILY.to_string(),
            package_version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// The merged machine-readable report for a full harness run.
#[derive(Debug, Clone, Serialize)]
pub struct TestReport {
    pub generated_at: DateTime<Utc>,
    pub total_passed: usize,
    pub total_failed: usize,
    pub success_rate: f64,
    pub results: Vec<ModuleTestResult>,
    pub timings: Vec<LoadTiming>,
    pub platform: PlatformRecord,
}

impl TestReport {
    pub fn from_results(
        results: Vec<ModuleTestResult>,
        timings: Vec<LoadTiming>,
        platform: PlatformRecord,
    ) -> Self {
        let total_passed: usize = results.iter().map(|r| r.passed).sum();
        let total_failed: usize = results.iter().map(|r| r.failed).sum();
        let total = total_passed + total_failed;
        let success_rate = if total == 0 {
            1.0
        } else {
            total_passed as f64 / total as f64
        };
        Self {
            generated_at: Utc::now(),
            total_passed,
            total_failed,
            success_rate,
            results,
            timings,
            platform,
        }
    }

    pub fn all_passed(&self) -> bool {
        self.total_failed == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn check_tallies_pass_and_fail() {
        let mut r = ModuleTestResult::new("demo");
        r.check("a", true, "ok");
        r.check("b", false, "nope");
        r.warn("c", "odd but fine");
        assert_eq!(r.passed, 2);
        assert_eq!(r.failed, 1);
        assert!(r.outcomes[2].message.starts_with("warning:"));
    }

    #[test]
    fn report_aggregates_counts() {
        let mut a = ModuleTestResult::new("a");
        a.check("x", true, "");
        a.check("y", true, "");
        let mut b = ModuleTestResult::new("b");
        b.check("z", false, "");

        let report = TestReport::from_results(vec![a, b], Vec::new(), PlatformRecord::current());
        assert_eq!(report.total_passed, 2);
        assert_eq!(report.total_failed, 1);
        assert!(!report.all_passed());
        assert!((report.success_rate - 2.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn empty_report_has_full_success_rate() {
        let report = TestReport::from_results(Vec::new(), Vec::new(), PlatformRecord::current());
        assert!(report.all_passed());
        assert_eq!(report.success_rate, 1.0);
    }

    #[test]
    fn report_serialises_to_json() {
        let report = TestReport::from_results(Vec::new(), Vec::new(), PlatformRecord::current());
        let value = serde_json::to_value(&report).unwrap();
        assert!(value["generated_at"].is_string());
        assert!(value["platform"]["os"].is_string());
    }
}
