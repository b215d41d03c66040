//! Build context containing configuration and state for a build.

use crate::build::{LastRun, TemplateContext};
use crate::config::SiteConfig;
use crate::mode::BuildMode;
use std::path::{Path, PathBuf};

/// Build context containing configuration and paths for a build operation.
///
/// Constructed once at startup and shared by reference with every task.
/// The only interior state is the per-task last-run registry used by the
/// image transform.
#[derive(Debug)]
pub struct BuildContext {
    /// The loaded configuration
    config: SiteConfig,
    /// Project root directory (where sitepipe.toml is located)
    project_root: PathBuf,
    /// Development or production
    mode: BuildMode,
    /// Data every page template is rendered against
    template: TemplateContext,
    /// Whether to run in verbose mode
    verbose: bool,
    last_run: LastRun,
}

impl BuildContext {
    /// Create a new build context.
    ///
    /// The template context is loaded from the project's package metadata.
    pub fn new(config: SiteConfig, project_root: PathBuf, mode: BuildMode) -> Self {
        let template = TemplateContext::load(&config, &project_root);
        Self {
            config,
            project_root,
            mode,
            template,
            verbose: false,
            last_run: LastRun::default(),
        }
    }

    /// Get the configuration.
    pub fn config(&self) -> &SiteConfig {
        &self.config
    }

    /// Get the project root directory.
    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    pub fn mode(&self) -> BuildMode {
        self.mode
    }

    pub fn is_production(&self) -> bool {
        self.mode.is_production()
    }

    /// Template data shared by every page.
    pub fn template(&self) -> &TemplateContext {
        &self.template
    }

    /// Last-run registry for incremental tasks.
    pub fn last_run(&self) -> &LastRun {
        &self.last_run
    }

    /// Whether verbose mode is enabled.
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    /// Set verbose mode.
    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Replace the template context.
    pub fn with_template(mut self, template: TemplateContext) -> Self {
        self.template = template;
        self
    }

    /// Source root (resolved to absolute path).
    pub fn src_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.src)
    }

    /// Output root (resolved to absolute path).
    pub fn dest_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.dest)
    }

    /// Public assets root (resolved to absolute path).
    pub fn public_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.public)
    }

    /// Intermediate output root (resolved to absolute path).
    pub fn temp_dir(&self) -> PathBuf {
        self.resolve_path(&self.config.project.temp)
    }

    /// Resolve a path relative to the project root.
    ///
    /// If the path is absolute, returns it unchanged.
    /// If relative, joins it with the project root.
    pub fn resolve_path(&self, path: &Path) -> PathBuf {
        crate::config::loader::resolve_path(&self.project_root, path)
    }
}
