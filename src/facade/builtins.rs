//! Built-in fallback implementations.
//!
//! One dependency-free equivalent per capability, embedded in the facade so
//! every capability keeps answering when its feature unit is missing, broken,
//! or modular loading is switched off. Each must produce the same required
//! keys as the real unit (see the capability table's `required_keys`).

use chrono::Utc;
use serde_json::{Value, json};

use crate::error::AppError;
use crate::facade::{CAPABILITIES, SUPPORTED_OS};

pub fn resolve_version(_args: &[Value]) -> Result<Value, AppError> {
    Ok(json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "description": env!("CARGO_PKG_DESCRIPTION"),
        "source": "builtin",
    }))
}

pub fn validate_environment(_args: &[Value]) -> Result<Value, AppError> {
    let os = std::env::consts::OS;
    let mut issues: Vec<String> = Vec::new();
    if std::env::var_os("HOME").is_none() && std::env::var_os("USERPROFILE").is_none() {
        issues.push("no home directory variable set".to_string());
    }
    Ok(json!({
        "os": os,
        "arch": std::env::consts::ARCH,
        "family": std::env::consts::FAMILY,
        "supported": SUPPORTED_OS.contains(&os),
        "issues": issues,
        "source": "builtin",
    }))
}

pub fn render_help(_args: &[Value]) -> Result<Value, AppError> {
    let mut text = format!(
        "{} {} — {}\n\ncapabilities:\n",
        env!("CARGO_PKG_NAME"),
        env!("CARGO_PKG_VERSION"),
        env!("CARGO_PKG_DESCRIPTION"),
    );
    let mut names = Vec::new();
    for cap in CAPABILITIES {
        text.push_str(&format!("  {:<22} backed by unit '{}'\n", cap.name, cap.unit));
        names.push(cap.name);
    }
    Ok(json!({
        "text": text,
        "capabilities": names,
        "source": "builtin",
    }))
}

pub fn render_report(args: &[Value]) -> Result<Value, AppError> {
    let version = resolve_version(args)?;
    let environment = validate_environment(args)?;
    Ok(json!({
        "generated_at": Utc::now().to_rfc3339(),
        "sections": [
            { "title": "version", "body": version },
            { "title": "environment", "body": environment },
        ],
        "source": "builtin",
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_has_required_keys() {
        let v = resolve_version(&[]).unwrap();
        assert_eq!(v["name"], env!("CARGO_PKG_NAME"));
        assert!(v["version"].is_string());
        assert_eq!(v["source"], "builtin");
    }

    #[test]
    fn environment_reports_current_platform() {
        let v = validate_environment(&[]).unwrap();
        assert_eq!(v["os"], std::env::consts::OS);
        assert!(v["issues"].is_array());
        assert!(v["supported"].is_boolean());
    }

    #[test]
    fn help_text_is_nonempty_and_lists_capabilities() {
        let v = render_help(&[]).unwrap();
        let text = v["text"].as_str().unwrap();
        assert!(!text.is_empty());
        assert_eq!(
            v["capabilities"].as_array().unwrap().len(),
            CAPABILITIES.len()
        );
        for cap in CAPABILITIES {
            assert!(text.contains(cap.name), "help missing {}", cap.name);
        }
    }

    #[test]
    fn report_composes_sections() {
        let v = render_report(&[]).unwrap();
        let sections = v["sections"].as_array().unwrap();
        assert_eq!(sections.len(), 2);
        assert!(v["generated_at"].is_string());
    }
}
