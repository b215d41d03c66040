//! Stylesheet stages: Sass compilation and CSS post-processing.
//!
//! Sass is compiled with `grass` to expanded CSS. The result is parsed with
//! `lightningcss`, vendor-prefixed against the configured browserslist, and
//! printed either readable (with a source map in development) or minified.

use super::{Transform, TransformError};
use crate::build::{BuildContext, SourceFile};
use lightningcss::stylesheet::{MinifyOptions, ParserOptions, PrinterOptions, StyleSheet};
use lightningcss::targets::{Browsers, Targets};
use parcel_sourcemap::SourceMap;
use std::path::{Path, PathBuf};

/// Whether a Sass file is a partial (only ever imported, never emitted).
pub fn is_sass_partial(path: &Path) -> bool {
    path.file_name().map(|n| n.to_string_lossy().starts_with('_')).unwrap_or(false)
}

/// Compile Sass source to expanded CSS.
pub fn compile_sass(source: &str, load_paths: &[PathBuf]) -> Result<String, TransformError> {
    let mut options = grass::Options::default().style(grass::OutputStyle::Expanded);
    for path in load_paths {
        options = options.load_path(path);
    }
    grass::from_string(source.to_string(), &options).map_err(|e| TransformError::Sass(e.to_string()))
}

/// Resolve browserslist queries into prefixing targets.
pub fn browser_targets(queries: &[String]) -> Result<Targets, TransformError> {
    let browsers = Browsers::from_browserslist(queries.iter().map(String::as_str))
        .map_err(|e| TransformError::Css(e.to_string()))?;
    Ok(Targets { browsers, ..Targets::default() })
}

/// How [`print_css`] treats a stylesheet.
#[derive(Debug, Clone, Default)]
struct CssOptions {
    /// Prefix and lower for these targets; `None` prints the input as parsed
    targets: Option<Targets>,
    minify: bool,
    source_map: bool,
}

fn css_error(e: impl std::fmt::Display) -> TransformError {
    TransformError::Css(e.to_string())
}

fn print_css(
    css: &str,
    filename: &str,
    options: CssOptions,
) -> Result<(String, Option<String>), TransformError> {
    let mut stylesheet = StyleSheet::parse(
        css,
        ParserOptions { filename: filename.to_string(), ..ParserOptions::default() },
    )
    .map_err(css_error)?;

    let prefixing = options.targets.is_some();
    let targets = options.targets.unwrap_or_default();
    if prefixing {
        stylesheet
            .minify(MinifyOptions { targets: targets.clone(), ..MinifyOptions::default() })
            .map_err(css_error)?;
    }

    let mut source_map = if options.source_map {
        let mut map = SourceMap::new("/");
        map.add_source(filename);
        map.set_source_content(0, css).map_err(css_error)?;
        Some(map)
    } else {
        None
    };

    let printed = stylesheet
        .to_css(PrinterOptions {
            minify: options.minify,
            targets,
            source_map: source_map.as_mut(),
            ..PrinterOptions::default()
        })
        .map_err(css_error)?;

    let map = match source_map.as_mut() {
        Some(map) => Some(map.to_json(None).map_err(css_error)?),
        None => None,
    };
    Ok((printed.code, map))
}

/// Add vendor prefixes, optionally producing a source map.
pub fn prefix_css(
    css: &str,
    filename: &str,
    targets: Targets,
    source_map: bool,
) -> Result<(String, Option<String>), TransformError> {
    print_css(css, filename, CssOptions { targets: Some(targets), minify: false, source_map })
}

/// Minify CSS for the production bundle.
pub fn minify_css(css: &str, targets: Targets) -> Result<String, TransformError> {
    let options = CssOptions { targets: Some(targets), minify: true, source_map: false };
    print_css(css, "bundle.css", options).map(|(code, _)| code)
}

/// Reformat CSS for the development bundle.
pub fn beautify_css(css: &str) -> Result<String, TransformError> {
    print_css(css, "bundle.css", CssOptions::default()).map(|(code, _)| code)
}

/// `.scss` → `.css`.
#[derive(Debug, Clone, Default)]
pub struct SassCompile {
    /// Load paths tried after the file's own directory
    pub load_paths: Vec<PathBuf>,
}

impl SassCompile {
    pub fn new(load_paths: Vec<PathBuf>) -> Self {
        Self { load_paths }
    }
}

impl Transform for SassCompile {
    fn name(&self) -> &'static str {
        "sass"
    }

    fn apply(&self, mut file: SourceFile, _ctx: &BuildContext) -> Result<SourceFile, TransformError> {
        let mut load_paths = Vec::with_capacity(self.load_paths.len() + 1);
        if let Some(dir) = file.origin.parent() {
            load_paths.push(dir.to_path_buf());
        }
        load_paths.extend(self.load_paths.iter().cloned());

        let css = compile_sass(file.text()?, &load_paths)?;
        file.contents = css.into_bytes();
        Ok(file.with_extension("css"))
    }
}

/// Vendor prefixing; development output carries a source map.
#[derive(Debug, Clone)]
pub struct Autoprefix {
    pub targets: Targets,
}

impl Autoprefix {
    pub fn new(targets: Targets) -> Self {
        Self { targets }
    }
}

impl Transform for Autoprefix {
    fn name(&self) -> &'static str {
        "autoprefixer"
    }

    fn apply(&self, mut file: SourceFile, ctx: &BuildContext) -> Result<SourceFile, TransformError> {
        let with_map = !ctx.is_production();
        let source_name = file
            .origin
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.file_name());

        let (mut css, map) = prefix_css(file.text()?, &source_name, self.targets.clone(), with_map)?;
        if map.is_some() {
            css.push_str(&format!("\n/*# sourceMappingURL={}.map */\n", file.file_name()));
        }
        file.contents = css.into_bytes();
        file.source_map = map;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::mode::BuildMode;
    use std::fs;
    use tempfile::TempDir;

    fn ctx(mode: BuildMode) -> BuildContext {
        BuildContext::new(SiteConfig::with_name("site"), PathBuf::from("/project"), mode)
    }

    fn old_browsers() -> Targets {
        browser_targets(&["safari 8".to_string(), "ie 10".to_string()]).unwrap()
    }

    #[test]
    fn test_compile_sass_nesting_and_variables() {
        let css = compile_sass("$c: #333;\n.nav { a { color: $c; } }", &[]).unwrap();
        assert!(css.contains(".nav a {"));
        assert!(css.contains("color: #333;"));
    }

    #[test]
    fn test_compile_sass_imports_partials_from_load_path() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join("_vars.scss"), "$brand: #0366d6;").unwrap();

        let css = compile_sass("@import 'vars';\nh1 { color: $brand; }", &[temp.path().to_path_buf()])
            .unwrap();
        assert!(css.contains("color: #0366d6;"));
    }

    #[test]
    fn test_compile_sass_reports_errors() {
        let err = compile_sass("a { color: $missing; }", &[]).unwrap_err();
        assert!(matches!(err, TransformError::Sass(_)));
    }

    #[test]
    fn test_is_sass_partial() {
        assert!(is_sass_partial(Path::new("assets/styles/_variables.scss")));
        assert!(!is_sass_partial(Path::new("assets/styles/main.scss")));
    }

    #[test]
    fn test_prefix_css_adds_vendor_prefixes() {
        let (css, map) = prefix_css(".btn { user-select: none; }", "main.scss", old_browsers(), false).unwrap();
        assert!(css.contains("-webkit-user-select: none"));
        assert!(map.is_none());
    }

    #[test]
    fn test_prefix_css_source_map() {
        let (_, map) = prefix_css("a { color: red; }", "main.scss", old_browsers(), true).unwrap();
        let map = map.unwrap();
        assert!(map.contains("\"version\":3"));
        assert!(map.contains("main.scss"));
    }

    #[test]
    fn test_minify_and_beautify() {
        let minified = minify_css("a {\n  color: red;\n}\n\nb { margin: 0 }\n", Targets::default()).unwrap();
        assert!(!minified.contains('\n'));
        assert!(minified.contains("a{color:red}"));

        let pretty = beautify_css("a{color:red}").unwrap();
        assert!(pretty.contains("color: red;"));
    }

    #[test]
    fn test_style_stages_development() {
        let temp = TempDir::new().unwrap();
        let origin = temp.path().join("main.scss");
        fs::write(&origin, "$w: 10px; .box { width: $w; user-select: none; }").unwrap();
        let file = SourceFile::read(temp.path(), &origin).unwrap();

        let ctx = ctx(BuildMode::Development);
        let file = SassCompile::default().apply(file, &ctx).unwrap();
        assert_eq!(file.relative, PathBuf::from("main.css"));

        let file = Autoprefix::new(old_browsers()).apply(file, &ctx).unwrap();
        let css = file.text().unwrap();
        assert!(css.contains("width: 10px"));
        assert!(css.contains("/*# sourceMappingURL=main.css.map */"));
        assert!(file.source_map.is_some());
    }

    #[test]
    fn test_autoprefix_production_has_no_map() {
        let file = SourceFile::new("main.css", "a { color: red; }");
        let file = Autoprefix::new(old_browsers()).apply(file, &ctx(BuildMode::Production)).unwrap();
        assert!(file.source_map.is_none());
        assert!(!file.text().unwrap().contains("sourceMappingURL"));
    }
}
