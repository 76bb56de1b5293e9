//! Feature-unit contract — candidate definitions and their validated form.
//!
//! A [`UnitDefinition`] is what a registry factory hands the loader: a bag of
//! optional pieces mirroring the unit wire contract (entry point, JSON
//! metadata, JSON dependency list, lifecycle hooks). [`FeatureUnit::validate`]
//! is the only way to turn one into a usable [`FeatureUnit`], so nothing
//! malformed ever reaches the loader cache.

use std::fmt;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;

// ── Callable types ────────────────────────────────────────────────────────────

/// A boxed, owned future returned by a unit entry point.
pub type UnitFuture = Pin<Box<dyn Future<Output = Result<Value, UnitError>> + Send + 'static>>;

/// A boxed, owned future returned by a lifecycle hook.
pub type HookFuture = Pin<Box<dyn Future<Output = Result<(), UnitError>> + Send + 'static>>;

/// The unit's entry point — callable with zero or more JSON arguments.
pub type EntryFn = Arc<dyn Fn(Vec<Value>) -> UnitFuture + Send + Sync>;

/// Optional `initialize(options)` hook, run once before the unit is cached.
pub type InitFn = Arc<dyn Fn(Value) -> HookFuture + Send + Sync>;

/// Optional `teardown()` hook, run during loader cleanup.
pub type TeardownFn = Arc<dyn Fn() -> HookFuture + Send + Sync>;

/// Optional dependency-injection hook, given the resolved dependency units.
pub type InjectFn = Arc<dyn Fn(Vec<Arc<FeatureUnit>>) + Send + Sync>;

/// Error raised inside a unit's entry point or lifecycle hooks.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct UnitError(pub String);

impl From<&str> for UnitError {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for UnitError {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Wrap an async closure as an [`EntryFn`].
pub fn entry<F, Fut>(f: F) -> EntryFn
where
    F: Fn(Vec<Value>) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<Value, UnitError>> + Send + 'static,
{
    Arc::new(move |args| Box::pin(f(args)))
}

/// Wrap an async closure as an [`InitFn`].
pub fn init_hook<F, Fut>(f: F) -> InitFn
where
    F: Fn(Value) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    Arc::new(move |options| Box::pin(f(options)))
}

/// Wrap an async closure as a [`TeardownFn`].
pub fn teardown_hook<F, Fut>(f: F) -> TeardownFn
where
    F: Fn() -> Fut + Send + Sync + 'static,
    Fut: Future<Output = Result<(), UnitError>> + Send + 'static,
{
    Arc::new(move || Box::pin(f()))
}

// ── UnitDefinition ────────────────────────────────────────────────────────────

/// A candidate unit as produced by a registry factory, before validation.
///
/// `metadata` and `dependencies` stay as raw JSON here: the contract says
/// metadata *must be* an object with string `name`/`version`/`description`
/// and dependencies *must be* an array of names, and validation is where
/// that is checked rather than assumed.
#[derive(Default)]
pub struct UnitDefinition {
    pub entry: Option<EntryFn>,
    pub metadata: Option<Value>,
    pub dependencies: Option<Value>,
    pub initialize: Option<InitFn>,
    pub teardown: Option<TeardownFn>,
    pub inject: Option<InjectFn>,
}

impl UnitDefinition {
    pub fn new(entry: EntryFn) -> Self {
        Self {
            entry: Some(entry),
            ..Self::default()
        }
    }

    pub fn with_metadata(mut self, metadata: Value) -> Self {
        self.metadata = Some(metadata);
        self
    }

    pub fn with_dependencies(mut self, names: &[&str]) -> Self {
        self.dependencies = Some(Value::Array(
            names.iter().map(|n| Value::String(n.to_string())).collect(),
        ));
        self
    }

    pub fn with_initialize(mut self, hook: InitFn) -> Self {
        self.initialize = Some(hook);
        self
    }

    pub fn with_teardown(mut self, hook: TeardownFn) -> Self {
        self.teardown = Some(hook);
        self
    }

    pub fn with_inject<F>(mut self, hook: F) -> Self
    where
        F: Fn(Vec<Arc<FeatureUnit>>) + Send + Sync + 'static,
    {
        self.inject = Some(Arc::new(hook));
        self
    }
}

// ── FeatureUnit ───────────────────────────────────────────────────────────────

/// Validated unit metadata.
#[derive(Debug, Clone, Serialize)]
pub struct UnitMetadata {
    pub name: String,
    pub version: String,
    pub description: String,
}

/// A validated, loadable feature unit.
///
/// Constructed only through [`FeatureUnit::validate`]; the entry point is
/// guaranteed present and the optional fields guaranteed well typed.
pub struct FeatureUnit {
    name: String,
    metadata: Option<UnitMetadata>,
    dependencies: Vec<String>,
    entry: EntryFn,
    initialize: Option<InitFn>,
    teardown: Option<TeardownFn>,
    inject: Option<InjectFn>,
}

impl FeatureUnit {
    /// Check the candidate against the unit contract.
    ///
    /// Returns the list of contract problems on failure, one entry per
    /// missing or ill-typed field.
    pub fn validate(name: &str, def: UnitDefinition) -> Result<Self, Vec<String>> {
        let mut problems = Vec::new();

        let metadata = match def.metadata {
            None => None,
            Some(raw) => match parse_metadata(&raw) {
                Ok(meta) => Some(meta),
                Err(mut errs) => {
                    problems.append(&mut errs);
                    None
                }
            },
        };

        let dependencies = match def.dependencies {
            None => Vec::new(),
            Some(raw) => match parse_dependencies(&raw) {
                Ok(deps) => deps,
                Err(mut errs) => {
                    problems.append(&mut errs);
                    Vec::new()
                }
            },
        };

        let Some(entry) = def.entry else {
            problems.push("entry point missing".to_string());
            return Err(problems);
        };

        if !problems.is_empty() {
            return Err(problems);
        }

        Ok(Self {
            name: name.to_string(),
            metadata,
            dependencies,
            entry,
            initialize: def.initialize,
            teardown: def.teardown,
            inject: def.inject,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn metadata(&self) -> Option<&UnitMetadata> {
        self.metadata.as_ref()
    }

    pub fn dependencies(&self) -> &[String] {
        &self.dependencies
    }

    pub fn has_teardown(&self) -> bool {
        self.teardown.is_some()
    }

    /// Invoke the unit's entry point.
    pub async fn invoke(&self, args: Vec<Value>) -> Result<Value, UnitError> {
        (self.entry)(args).await
    }

    /// Run the `initialize` hook if the unit declares one.
    pub(crate) async fn run_initialize(&self, options: Value) -> Result<(), UnitError> {
        match &self.initialize {
            Some(hook) => hook(options).await,
            None => Ok(()),
        }
    }

    /// Run the `teardown` hook if the unit declares one.
    pub async fn run_teardown(&self) -> Result<(), UnitError> {
        match &self.teardown {
            Some(hook) => hook().await,
            None => Ok(()),
        }
    }

    /// Hand the resolved dependency instances to the unit's injection hook.
    /// Units without a hook silently ignore the delivery.
    pub fn supply_dependencies(&self, deps: Vec<Arc<FeatureUnit>>) {
        if let Some(hook) = &self.inject {
            hook(deps);
        }
    }
}

impl fmt::Debug for FeatureUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FeatureUnit")
            .field("name", &self.name)
            .field("metadata", &self.metadata)
            .field("dependencies", &self.dependencies)
            .finish_non_exhaustive()
    }
}

fn parse_metadata(raw: &Value) -> Result<UnitMetadata, Vec<String>> {
    let Some(map) = raw.as_object() else {
        return Err(vec!["metadata is not an object".to_string()]);
    };

    let mut problems = Vec::new();
    let mut field = |key: &str| -> String {
        match map.get(key).and_then(Value::as_str) {
            Some(s) => s.to_string(),
            None => {
                problems.push(format!("metadata.{key} missing or not a string"));
                String::new()
            }
        }
    };

    let name = field("name");
    let version = field("version");
    let description = field("description");

    if problems.is_empty() {
        Ok(UnitMetadata {
            name,
            version,
            description,
        })
    } else {
        Err(problems)
    }
}

fn parse_dependencies(raw: &Value) -> Result<Vec<String>, Vec<String>> {
    let Some(items) = raw.as_array() else {
        return Err(vec!["dependencies is not an array".to_string()]);
    };

    let mut problems = Vec::new();
    let mut deps = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item.as_str() {
            Some(s) => deps.push(s.to_string()),
            None => problems.push(format!("dependencies[{i}] is not a string")),
        }
    }

    if problems.is_empty() { Ok(deps) } else { Err(problems) }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn noop_entry() -> EntryFn {
        entry(|_args| async move { Ok(Value::Null) })
    }

    #[test]
    fn minimal_definition_validates() {
        let unit = FeatureUnit::validate("minimal", UnitDefinition::new(noop_entry())).unwrap();
        assert_eq!(unit.name(), "minimal");
        assert!(unit.metadata().is_none());
        assert!(unit.dependencies().is_empty());
    }

    #[test]
    fn missing_entry_rejected() {
        let problems = FeatureUnit::validate("broken", UnitDefinition::default()).unwrap_err();
        assert!(problems.iter().any(|p| p.contains("entry point")));
    }

    #[test]
    fn metadata_must_be_object() {
        let def = UnitDefinition::new(noop_entry()).with_metadata(json!("just a string"));
        let problems = FeatureUnit::validate("bad-meta", def).unwrap_err();
        assert!(problems.iter().any(|p| p.contains("not an object")));
    }

    #[test]
    fn metadata_fields_must_be_strings() {
        let def = UnitDefinition::new(noop_entry())
            .with_metadata(json!({ "name": "x", "version": 3, "description": "y" }));
        let problems = FeatureUnit::validate("bad-meta", def).unwrap_err();
        assert!(problems.iter().any(|p| p.contains("metadata.version")));
    }

    #[test]
    fn dependencies_must_be_string_array() {
        let mut def = UnitDefinition::new(noop_entry());
        def.dependencies = Some(json!({ "not": "an array" }));
        let problems = FeatureUnit::validate("bad-deps", def).unwrap_err();
        assert!(problems.iter().any(|p| p.contains("not an array")));

        let mut def = UnitDefinition::new(noop_entry());
        def.dependencies = Some(json!(["ok", 42]));
        let problems = FeatureUnit::validate("bad-deps", def).unwrap_err();
        assert!(problems.iter().any(|p| p.contains("dependencies[1]")));
    }

    #[test]
    fn well_formed_metadata_and_deps_parse() {
        let def = UnitDefinition::new(noop_entry())
            .with_metadata(json!({ "name": "demo", "version": "1.0.0", "description": "d" }))
            .with_dependencies(&["alpha", "beta"]);
        let unit = FeatureUnit::validate("demo", def).unwrap();
        assert_eq!(unit.metadata().unwrap().version, "1.0.0");
        assert_eq!(unit.dependencies(), ["alpha", "beta"]);
    }

    #[tokio::test]
    async fn entry_point_invokes() {
        let def = UnitDefinition::new(entry(|args| async move {
            Ok(json!({ "arg_count": args.len() }))
        }));
        let unit = FeatureUnit::validate("counting", def).unwrap();
        let value = unit.invoke(vec![Value::Null, Value::Null]).await.unwrap();
        assert_eq!(value["arg_count"], 2);
    }

    #[tokio::test]
    async fn hooks_default_to_noop() {
        let unit = FeatureUnit::validate("plain", UnitDefinition::new(noop_entry())).unwrap();
        assert!(unit.run_initialize(Value::Null).await.is_ok());
        assert!(unit.run_teardown().await.is_ok());
        assert!(!unit.has_teardown());
        unit.supply_dependencies(Vec::new());
    }
}
