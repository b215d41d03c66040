//! Page template rendering.
//!
//! Pages are Handlebars templates rendered against the shared
//! [`TemplateContext`](crate::build::TemplateContext). Layouts and partials
//! are registered by name (`{{> layouts/basic}}`) and never emitted.

use super::{Transform, TransformError};
use crate::build::{BuildContext, FileError, SourceFile};
use handlebars::Handlebars;
use std::path::{Path, PathBuf};

/// Whether a page source is a partial rather than a page.
///
/// Partials live under one of `partial_dirs` or have a `_`-prefixed name.
pub fn is_partial(relative: &Path, partial_dirs: &[PathBuf]) -> bool {
    let underscored =
        relative.file_name().map(|n| n.to_string_lossy().starts_with('_')).unwrap_or(false);
    underscored || partial_dirs.iter().any(|dir| relative.starts_with(dir))
}

/// Registration name of a partial: its relative path without extension
/// and without a leading `_` on the file name.
pub fn partial_name(relative: &Path) -> String {
    let stem = relative.file_stem().map(|s| s.to_string_lossy().into_owned()).unwrap_or_default();
    let stem = stem.strip_prefix('_').unwrap_or(&stem);
    let name = match relative.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.join(stem),
        _ => PathBuf::from(stem),
    };
    name.to_string_lossy().replace('\\', "/")
}

/// Renders pages with a fixed set of partials.
#[derive(Default)]
pub struct PageRenderer {
    registry: Handlebars<'static>,
}

impl std::fmt::Debug for PageRenderer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut partials: Vec<&String> = self.registry.get_templates().keys().collect();
        partials.sort();
        f.debug_struct("PageRenderer").field("partials", &partials).finish()
    }
}

impl PageRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register every partial, reporting the ones that fail to parse.
    pub fn register_partials(&mut self, partials: &[SourceFile]) -> Vec<FileError> {
        let mut errors = Vec::new();
        for partial in partials {
            let name = partial_name(&partial.relative);
            let registered = partial
                .text()
                .map_err(TransformError::from)
                .and_then(|text| {
                    self.registry
                        .register_partial(&name, text)
                        .map_err(|e| TransformError::Template(e.to_string()))
                });
            match registered {
                Ok(()) => tracing::debug!(partial = %name, "registered"),
                Err(e) => errors.push(FileError::new(&partial.relative, "partial", e.to_string())),
            }
        }
        errors
    }

    /// Render a template string against `data`.
    pub fn render<T: serde::Serialize>(&self, template: &str, data: &T) -> Result<String, TransformError> {
        self.registry
            .render_template(template, data)
            .map_err(|e| TransformError::Template(e.to_string()))
    }
}

impl Transform for PageRenderer {
    fn name(&self) -> &'static str {
        "render"
    }

    fn apply(&self, mut file: SourceFile, ctx: &BuildContext) -> Result<SourceFile, TransformError> {
        let html = self.render(file.text()?, ctx.template())?;
        file.contents = html.into_bytes();
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::mode::BuildMode;

    fn ctx() -> BuildContext {
        BuildContext::new(SiteConfig::with_name("demo"), PathBuf::from("/project"), BuildMode::Development)
    }

    fn dirs() -> Vec<PathBuf> {
        vec![PathBuf::from("layouts"), PathBuf::from("partials")]
    }

    #[test]
    fn test_is_partial() {
        assert!(is_partial(Path::new("layouts/basic.html"), &dirs()));
        assert!(is_partial(Path::new("partials/header.html"), &dirs()));
        assert!(is_partial(Path::new("_footer.html"), &dirs()));
        assert!(!is_partial(Path::new("index.html"), &dirs()));
        assert!(!is_partial(Path::new("docs/layouts.html"), &dirs()));
    }

    #[test]
    fn test_partial_name() {
        assert_eq!(partial_name(Path::new("layouts/basic.html")), "layouts/basic");
        assert_eq!(partial_name(Path::new("partials/_header.html")), "partials/header");
        assert_eq!(partial_name(Path::new("_footer.html")), "footer");
    }

    #[test]
    fn test_render_with_context_and_partials() {
        let mut renderer = PageRenderer::new();
        let errors = renderer.register_partials(&[SourceFile::new(
            "partials/header.html",
            "<nav>{{#each menus}}<a href=\"{{link}}\">{{name}}</a>{{/each}}</nav>",
        )]);
        assert!(errors.is_empty());

        let page = SourceFile::new("index.html", "{{> partials/header}}<h1>{{pkg.name}}</h1>");
        let out = renderer.apply(page, &ctx()).unwrap();
        let html = out.text().unwrap();
        assert!(html.contains("<a href=\"index.html\">Home</a>"));
        assert!(html.contains("<h1>demo</h1>"));
    }

    #[test]
    fn test_render_reports_bad_templates() {
        let renderer = PageRenderer::new();
        let err = renderer.apply(SourceFile::new("bad.html", "{{#if}}"), &ctx()).unwrap_err();
        assert!(matches!(err, TransformError::Template(_)));
    }

    #[test]
    fn test_register_reports_bad_partials() {
        let mut renderer = PageRenderer::new();
        let errors = renderer.register_partials(&[SourceFile::new("partials/bad.html", "{{#each}}")]);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].stage, "partial");
    }
}
