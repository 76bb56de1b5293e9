//! tessera — modular command-line workbench entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Parse args and load config
//!   3. Init logger at the configured level
//!   4. Build the unit registry, loader, and integration facade
//!   5. Dispatch the command through the facade
//!   6. Explicit facade cleanup, exactly once, before exit
//!
//! # Usage
//!
//! ```text
//! tessera [--config <path>] [--fallback] [--no-modular] <command>
//!
//! Commands:
//!   version       resolved package version
//!   env           host environment validation
//!   help          capability help text
//!   report        diagnostic report
//!   status        loader health, stats, and telemetry
//!   conformance   run the conformance harness (non-zero exit on failure)
//!
//! Flags:
//!   --config <path>   read configuration from <path>
//!   --fallback        force every capability onto its built-in path
//!   --no-modular      disable modular loading entirely
//! ```

use std::path::Path;

use tracing::info;

use tessera::config;
use tessera::error::AppError;
use tessera::facade::IntegrationFacade;
use tessera::harness::ConformanceHarness;
use tessera::loader::{LoaderConfig, ModuleLoader};
use tessera::{logger, units};

struct Args {
    config: Option<String>,
    fallback: bool,
    no_modular: bool,
    command: Option<String>,
}

fn parse_args() -> Result<Args, AppError> {
    let mut args = Args {
        config: None,
        fallback: false,
        no_modular: false,
        command: None,
    };

    let mut iter = std::env::args().skip(1);
    while let Some(arg) = iter.next() {
        match arg.as_str() {
            "--config" => {
                let path = iter
                    .next()
                    .ok_or_else(|| AppError::Config("--config requires a path".into()))?;
                args.config = Some(path);
            }
            "--fallback" => args.fallback = true,
            "--no-modular" => args.no_modular = true,
            "--help" | "-h" => args.command = Some("help".to_string()),
            flag if flag.starts_with('-') => {
                return Err(AppError::Config(format!("unknown flag: {flag}")));
            }
            command if args.command.is_none() => args.command = Some(command.to_string()),
            extra => {
                return Err(AppError::Config(format!("unexpected argument: {extra}")));
            }
        }
    }

    Ok(args)
}

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), AppError> {
    // Load .env if present — ignore errors (file is optional).
    let _ = dotenvy::dotenv();

    let args = parse_args()?;
    let config = match &args.config {
        Some(path) => config::load_from(
            Path::new(path),
            std::env::var("TESSERA_LOG_LEVEL").ok().as_deref(),
        )?,
        None => config::load()?,
    };
    logger::parse_level(&config.log_level)?;
    logger::init(&config.log_level)?;

    let loader = ModuleLoader::new(
        units::default_registry(),
        LoaderConfig {
            memory_threshold_bytes: config.modular.memory_threshold_bytes(),
            fallback_enabled: config.modular.fallback_enabled,
        },
    );
    let facade = IntegrationFacade::new(loader);
    if args.no_modular || !config.modular.enabled {
        facade.set_modular_mode(false);
    }
    if args.fallback {
        facade.set_forced_fallback(true);
    }

    let command = args.command.as_deref().unwrap_or("help").to_string();

    // A ctrl-c during a command skips straight to the single cleanup below.
    let outcome = tokio::select! {
        outcome = dispatch(&facade, &command) => outcome,
        _ = tokio::signal::ctrl_c() => {
            info!("interrupted");
            Ok(())
        }
    };

    facade.cleanup().await;
    outcome
}

async fn dispatch(facade: &IntegrationFacade, command: &str) -> Result<(), AppError> {
    match command {
        "version" => {
            let value = facade.invoke_capability("resolve-version", &[]).await?;
            println!(
                "{} {}",
                value["name"].as_str().unwrap_or("tessera"),
                value["version"].as_str().unwrap_or("unknown"),
            );
        }
        "env" => {
            let value = facade.invoke_capability("validate-environment", &[]).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        "help" => {
            let value = facade.invoke_capability("render-help", &[]).await?;
            println!("{}", value["text"].as_str().unwrap_or(""));
        }
        "report" => {
            let value = facade.invoke_capability("render-report", &[]).await?;
            println!("{}", serde_json::to_string_pretty(&value)?);
        }
        "status" => {
            println!(
                "{}",
                serde_json::to_string_pretty(&facade.system_status())?
            );
        }
        "conformance" => {
            let report = ConformanceHarness::new(facade).run().await;
            println!("{}", serde_json::to_string_pretty(&report)?);
            if !report.all_passed() {
                return Err(AppError::Capability(format!(
                    "conformance failed: {} assertion(s)",
                    report.total_failed
                )));
            }
        }
        other => {
            return Err(AppError::Capability(format!(
                "unknown command: {other} (try `tessera help`)"
            )));
        }
    }
    Ok(())
}
