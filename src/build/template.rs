//! Shared data every page template is rendered against.

use crate::config::{MenuItem, SiteConfig};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use std::path::Path;

/// Pins the template date for reproducible builds.
pub const SOURCE_DATE_EPOCH: &str = "SOURCE_DATE_EPOCH";

/// Immutable template data: `menus`, `pkg` and `date`.
#[derive(Debug, Clone, Serialize)]
pub struct TemplateContext {
    pub menus: Vec<MenuItem>,
    pub pkg: Value,
    pub date: String,
}

impl TemplateContext {
    /// Build the context from config and the project's package metadata.
    pub fn load(config: &SiteConfig, project_root: &Path) -> Self {
        let package_path = crate::config::loader::resolve_path(project_root, &config.project.package);
        let pkg = read_package(&package_path).unwrap_or_else(|| {
            json!({ "name": config.project.name, "version": config.project.version })
        });

        Self { menus: config.menus.clone(), pkg, date: build_date().to_rfc3339() }
    }

    /// Replace the build timestamp.
    pub fn with_date(mut self, date: DateTime<Utc>) -> Self {
        self.date = date.to_rfc3339();
        self
    }
}

fn read_package(path: &Path) -> Option<Value> {
    let contents = std::fs::read_to_string(path).ok()?;
    match serde_json::from_str(&contents) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(path = %path.display(), "ignoring unreadable package metadata: {}", e);
            None
        }
    }
}

fn build_date() -> DateTime<Utc> {
    std::env::var(SOURCE_DATE_EPOCH)
        .ok()
        .and_then(|secs| secs.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::from_timestamp(secs, 0))
        .unwrap_or_else(Utc::now)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use tempfile::TempDir;

    #[test]
    fn test_load_reads_package_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(
            temp.path().join("package.json"),
            r#"{"name": "pages-boilerplate", "version": "2.1.0", "author": "zce"}"#,
        )
        .unwrap();

        let ctx = TemplateContext::load(&SiteConfig::with_name("site"), temp.path());
        assert_eq!(ctx.pkg["name"], "pages-boilerplate");
        assert_eq!(ctx.pkg["author"], "zce");
        assert_eq!(ctx.menus.len(), 4);
    }

    #[test]
    fn test_load_ignores_malformed_package_json() {
        let temp = TempDir::new().unwrap();
        std::fs::write(temp.path().join("package.json"), "{ not json").unwrap();

        let ctx = TemplateContext::load(&SiteConfig::with_name("fallback"), temp.path());
        assert_eq!(ctx.pkg["name"], "fallback");
    }

    #[test]
    #[serial]
    fn test_source_date_epoch_pins_date() {
        std::env::set_var(SOURCE_DATE_EPOCH, "0");
        let temp = TempDir::new().unwrap();
        let ctx = TemplateContext::load(&SiteConfig::with_name("site"), temp.path());
        std::env::remove_var(SOURCE_DATE_EPOCH);

        assert_eq!(ctx.date, "1970-01-01T00:00:00+00:00");
    }

    #[test]
    fn test_serializes_for_templates() {
        let date = DateTime::from_timestamp(86_400, 0).unwrap();
        let ctx = TemplateContext::load(&SiteConfig::with_name("site"), Path::new("/nonexistent"))
            .with_date(date);

        let value = serde_json::to_value(&ctx).unwrap();
        assert_eq!(value["date"], "1970-01-02T00:00:00+00:00");
        assert_eq!(value["menus"][0]["name"], "Home");
        assert_eq!(value["menus"][0]["icon"], "aperture");
        assert!(value["menus"][1].get("icon").is_none());
    }
}
