//! Configuration schema types for `sitepipe.toml`
//!
//! Defines the structure and validation rules for a site project.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Project layout section
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Project name (used when no package metadata is found)
    pub name: String,
    /// Project version
    #[serde(default = "default_version")]
    pub version: String,
    /// Source root for pages, styles, scripts, images and fonts
    #[serde(default = "default_src")]
    pub src: PathBuf,
    /// Final output root
    #[serde(default = "default_dest")]
    pub dest: PathBuf,
    /// Static files copied verbatim into the output root
    #[serde(default = "default_public")]
    pub public: PathBuf,
    /// Intermediate output for compiled styles, scripts and pages
    #[serde(default = "default_temp")]
    pub temp: PathBuf,
    /// Package metadata exposed to templates as `pkg`
    #[serde(default = "default_package")]
    pub package: PathBuf,
}

fn default_version() -> String {
    "0.1.0".to_string()
}

fn default_src() -> PathBuf {
    PathBuf::from("src")
}

fn default_dest() -> PathBuf {
    PathBuf::from("dist")
}

fn default_public() -> PathBuf {
    PathBuf::from("public")
}

fn default_temp() -> PathBuf {
    PathBuf::from("temp")
}

fn default_package() -> PathBuf {
    PathBuf::from("package.json")
}

impl ProjectConfig {
    /// Project section with default layout and the given name.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: default_version(),
            src: default_src(),
            dest: default_dest(),
            public: default_public(),
            temp: default_temp(),
            package: default_package(),
        }
    }
}

/// Glob patterns per asset category, relative to the source root
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    #[serde(default = "default_pages")]
    pub pages: String,
    #[serde(default = "default_styles")]
    pub styles: String,
    #[serde(default = "default_scripts")]
    pub scripts: String,
    #[serde(default = "default_images")]
    pub images: String,
    #[serde(default = "default_fonts")]
    pub fonts: String,
}

fn default_pages() -> String {
    "**/*.html".to_string()
}

fn default_styles() -> String {
    "assets/styles/**/*.scss".to_string()
}

fn default_scripts() -> String {
    "assets/scripts/**/*.js".to_string()
}

fn default_images() -> String {
    "assets/images/**/*.{png,jpg,jpeg,svg,gif}".to_string()
}

fn default_fonts() -> String {
    "assets/fonts/**/*.{eot,svg,ttf,woff,woff2}".to_string()
}

impl Default for PathsConfig {
    fn default() -> Self {
        Self {
            pages: default_pages(),
            styles: default_styles(),
            scripts: default_scripts(),
            images: default_images(),
            fonts: default_fonts(),
        }
    }
}

/// Stylesheet compilation options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesConfig {
    /// Browserslist queries used for vendor prefixing
    #[serde(default = "default_browserslist")]
    pub browserslist: Vec<String>,
    /// Extra Sass load paths, relative to the project root
    #[serde(default = "default_include_paths")]
    pub include_paths: Vec<PathBuf>,
}

fn default_browserslist() -> Vec<String> {
    vec!["defaults".to_string()]
}

fn default_include_paths() -> Vec<PathBuf> {
    vec![PathBuf::from(".")]
}

impl Default for StylesConfig {
    fn default() -> Self {
        Self { browserslist: default_browserslist(), include_paths: default_include_paths() }
    }
}

/// Script transpilation options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScriptsConfig {
    /// ECMAScript target (e.g. "es2015", "es2020", "esnext")
    #[serde(default = "default_script_target")]
    pub target: String,
}

fn default_script_target() -> String {
    "es2015".to_string()
}

impl Default for ScriptsConfig {
    fn default() -> Self {
        Self { target: default_script_target() }
    }
}

/// Page template options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagesConfig {
    /// Directories (relative to the source root) holding partial templates
    #[serde(default = "default_partial_dirs")]
    pub partials: Vec<PathBuf>,
}

fn default_partial_dirs() -> Vec<PathBuf> {
    vec![PathBuf::from("layouts"), PathBuf::from("partials")]
}

impl Default for PagesConfig {
    fn default() -> Self {
        Self { partials: default_partial_dirs() }
    }
}

/// Reference resolver options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserefConfig {
    /// Directories searched for bundle references, relative to the project root
    #[serde(default = "default_search_paths")]
    pub search_paths: Vec<PathBuf>,
}

fn default_search_paths() -> Vec<PathBuf> {
    vec![PathBuf::from("temp"), PathBuf::from(".")]
}

impl Default for UserefConfig {
    fn default() -> Self {
        Self { search_paths: default_search_paths() }
    }
}

/// Dev and preview server options
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_host")]
    pub host: String,
    /// Port for `serve`
    #[serde(default = "default_dev_port")]
    pub dev_port: u16,
    /// Port for `start`
    #[serde(default = "default_preview_port")]
    pub preview_port: u16,
    /// Open a browser once the server is listening
    #[serde(default = "default_true")]
    pub open: bool,
    /// URL prefix to directory mappings served by the dev server
    #[serde(default = "default_routes")]
    pub routes: BTreeMap<String, PathBuf>,
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_dev_port() -> u16 {
    3000
}

fn default_preview_port() -> u16 {
    3030
}

fn default_true() -> bool {
    true
}

fn default_routes() -> BTreeMap<String, PathBuf> {
    let mut routes = BTreeMap::new();
    routes.insert("/node_modules".to_string(), PathBuf::from("node_modules"));
    routes
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            dev_port: default_dev_port(),
            preview_port: default_preview_port(),
            open: true,
            routes: default_routes(),
        }
    }
}

/// Watch mode configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Debounce delay in milliseconds
    #[serde(default = "default_debounce_ms")]
    pub debounce_ms: u32,
}

fn default_debounce_ms() -> u32 {
    100
}

impl Default for WatchConfig {
    fn default() -> Self {
        Self { debounce_ms: default_debounce_ms() }
    }
}

/// Navigation menu entry exposed to templates as `menus`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MenuItem {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<MenuItem>,
}

impl MenuItem {
    /// Menu entry pointing at `link`.
    pub fn link(name: &str, link: &str) -> Self {
        Self { name: name.to_string(), link: Some(link.to_string()), icon: None, children: vec![] }
    }

    /// Set the icon name.
    pub fn with_icon(mut self, icon: &str) -> Self {
        self.icon = Some(icon.to_string());
        self
    }

    /// Set nested entries.
    pub fn with_children(mut self, children: Vec<MenuItem>) -> Self {
        self.children = children;
        self
    }
}

fn default_menus() -> Vec<MenuItem> {
    vec![
        MenuItem::link("Home", "index.html").with_icon("aperture"),
        MenuItem::link("Features", "features.html"),
        MenuItem::link("About", "about.html"),
        MenuItem::link("Contact", "#").with_children(vec![
            MenuItem::link("Twitter", "https://twitter.com/w_zce"),
            MenuItem::link("About", "https://weibo.com/zceme"),
            MenuItem { name: "divider".to_string(), link: None, icon: None, children: vec![] },
            MenuItem::link("About", "https://github.com/zce"),
        ]),
    ]
}

/// Complete `sitepipe.toml` configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub project: ProjectConfig,
    #[serde(default)]
    pub paths: PathsConfig,
    #[serde(default)]
    pub styles: StylesConfig,
    #[serde(default)]
    pub scripts: ScriptsConfig,
    #[serde(default)]
    pub pages: PagesConfig,
    #[serde(default)]
    pub useref: UserefConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub watch: WatchConfig,
    #[serde(default = "default_menus")]
    pub menus: Vec<MenuItem>,
}

impl SiteConfig {
    /// Configuration with every section at its default.
    pub fn with_name(name: impl Into<String>) -> Self {
        Self {
            project: ProjectConfig::named(name),
            paths: PathsConfig::default(),
            styles: StylesConfig::default(),
            scripts: ScriptsConfig::default(),
            pages: PagesConfig::default(),
            useref: UserefConfig::default(),
            server: ServerConfig::default(),
            watch: WatchConfig::default(),
            menus: default_menus(),
        }
    }
}

/// A single validation problem found in a config
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigValidationError {
    /// Path to the invalid field (e.g., "paths.styles")
    pub field: String,
    /// Error message
    pub message: String,
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "sitepipe.toml: '{}' {}", self.field, self.message)
    }
}

impl SiteConfig {
    /// Validate the configuration, returning every problem found.
    pub fn validate(&self) -> Vec<ConfigValidationError> {
        let mut errors = Vec::new();

        if self.project.name.trim().is_empty() {
            errors.push(ConfigValidationError {
                field: "project.name".to_string(),
                message: "must be a non-empty string".to_string(),
            });
        }

        let globs = [
            ("paths.pages", &self.paths.pages),
            ("paths.styles", &self.paths.styles),
            ("paths.scripts", &self.paths.scripts),
            ("paths.images", &self.paths.images),
            ("paths.fonts", &self.paths.fonts),
        ];
        for (field, pattern) in globs {
            if pattern.trim().is_empty() {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must be a non-empty glob pattern".to_string(),
                });
            }
        }

        // Both directories are deleted by `clean`.
        for (field, dir) in [("project.dest", &self.project.dest), ("project.temp", &self.project.temp)] {
            if contains_or_equals(dir, &self.project.src) {
                errors.push(ConfigValidationError {
                    field: field.to_string(),
                    message: "must not contain the source root".to_string(),
                });
            }
        }

        if self.styles.browserslist.is_empty() {
            errors.push(ConfigValidationError {
                field: "styles.browserslist".to_string(),
                message: "must contain at least one query".to_string(),
            });
        }

        errors
    }
}

fn contains_or_equals(dir: &Path, other: &Path) -> bool {
    let dir = normalize(dir);
    let other = normalize(other);
    dir.as_os_str().is_empty() || other.starts_with(&dir)
}

fn normalize(path: &Path) -> PathBuf {
    path.components().filter(|c| !matches!(c, std::path::Component::CurDir)).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_minimal_config() {
        let config: SiteConfig = toml::from_str("[project]\nname = \"site\"").unwrap();
        assert_eq!(config.project.name, "site");
        assert_eq!(config.project.src, PathBuf::from("src"));
        assert_eq!(config.project.dest, PathBuf::from("dist"));
        assert_eq!(config.project.temp, PathBuf::from("temp"));
        assert_eq!(config.paths.styles, "assets/styles/**/*.scss");
        assert_eq!(config.server.dev_port, 3000);
        assert_eq!(config.server.preview_port, 3030);
        assert!(config.server.open);
        assert_eq!(config.menus.len(), 4);
        assert!(config.validate().is_empty());
    }

    #[test]
    fn test_full_config() {
        let toml = r#"
[project]
name = "blog"
src = "source"
dest = "public_html"

[paths]
styles = "css/**/*.scss"

[styles]
browserslist = ["last 2 versions"]

[scripts]
target = "es2020"

[server]
dev_port = 8080
open = false

[server.routes]
"/vendor" = "vendor"

[watch]
debounce_ms = 250

[[menus]]
name = "Home"
link = "/"

[[menus]]
name = "More"
[[menus.children]]
name = "Docs"
link = "/docs"
"#;
        let config: SiteConfig = toml::from_str(toml).unwrap();
        assert_eq!(config.project.src, PathBuf::from("source"));
        assert_eq!(config.paths.styles, "css/**/*.scss");
        assert_eq!(config.paths.scripts, "assets/scripts/**/*.js");
        assert_eq!(config.styles.browserslist, vec!["last 2 versions"]);
        assert_eq!(config.scripts.target, "es2020");
        assert_eq!(config.server.dev_port, 8080);
        assert!(!config.server.open);
        assert_eq!(config.server.routes.get("/vendor"), Some(&PathBuf::from("vendor")));
        assert_eq!(config.watch.debounce_ms, 250);
        assert_eq!(config.menus.len(), 2);
        assert_eq!(config.menus[1].children[0].link.as_deref(), Some("/docs"));
    }

    #[test]
    fn test_default_menus_match_site_navigation() {
        let config = SiteConfig::with_name("site");
        let names: Vec<_> = config.menus.iter().map(|m| m.name.as_str()).collect();
        assert_eq!(names, ["Home", "Features", "About", "Contact"]);
        assert_eq!(config.menus[0].icon.as_deref(), Some("aperture"));
        assert_eq!(config.menus[3].children.len(), 4);
        assert_eq!(config.menus[3].children[2].link, None);
    }

    #[test]
    fn test_validate_empty_name() {
        let config = SiteConfig::with_name("  ");
        let errors = config.validate();
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].field, "project.name");
    }

    #[test]
    fn test_validate_empty_glob() {
        let mut config = SiteConfig::with_name("site");
        config.paths.fonts = String::new();
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "paths.fonts"));
    }

    #[test]
    fn test_validate_dest_containing_src() {
        let mut config = SiteConfig::with_name("site");
        config.project.dest = PathBuf::from(".");
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "project.dest"));

        config.project.dest = PathBuf::from("dist");
        config.project.temp = PathBuf::from("src");
        let errors = config.validate();
        assert!(errors.iter().any(|e| e.field == "project.temp"));
    }

    #[test]
    fn test_validation_error_display() {
        let err = ConfigValidationError {
            field: "paths.pages".to_string(),
            message: "must be a non-empty glob pattern".to_string(),
        };
        assert_eq!(err.to_string(), "sitepipe.toml: 'paths.pages' must be a non-empty glob pattern");
    }
}
