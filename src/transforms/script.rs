//! Script stages built on the oxc toolchain.
//!
//! Transpilation lowers syntax newer than the configured ECMAScript target.
//! Bundles are minified with console calls dropped, or reprinted readable
//! in development.

use super::{Transform, TransformError};
use crate::build::{BuildContext, SourceFile};
use oxc_allocator::Allocator;
use oxc_codegen::{Codegen, CodegenOptions};
use oxc_minifier::{CompressOptions, Minifier, MinifierOptions};
use oxc_parser::Parser;
use oxc_semantic::SemanticBuilder;
use oxc_span::SourceType;
use oxc_transformer::{TransformOptions, Transformer};
use std::path::{Path, PathBuf};

/// Generated code and its optional source map JSON.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TranspileOutput {
    pub code: String,
    pub map: Option<String>,
}

fn diagnostics<D: std::fmt::Display>(errors: &[D]) -> TransformError {
    let messages: Vec<String> = errors.iter().map(|e| e.to_string()).collect();
    TransformError::Script(messages.join("; "))
}

fn source_type(path: &Path) -> SourceType {
    SourceType::from_path(path).unwrap_or_default()
}

/// Transpile `source` down to `target` (e.g. "es2015").
///
/// When `source_map` is set the map's source is the file name of `path`,
/// so it resolves next to the emitted file.
pub fn transpile(
    source: &str,
    path: &Path,
    target: &str,
    source_map: bool,
) -> Result<TranspileOutput, TransformError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, source_type(path)).parse();
    if !parsed.errors.is_empty() {
        return Err(diagnostics(&parsed.errors));
    }
    let mut program = parsed.program;

    let options =
        TransformOptions::from_target(target).map_err(|e| TransformError::Script(e.to_string()))?;
    let (symbols, scopes) =
        SemanticBuilder::new().build(&program).semantic.into_symbol_table_and_scope_tree();
    let transformed = Transformer::new(&allocator, path, &options)
        .build_with_symbols_and_scopes(symbols, scopes, &mut program);
    if !transformed.errors.is_empty() {
        return Err(diagnostics(&transformed.errors));
    }

    let map_source = if source_map {
        path.file_name().map(PathBuf::from)
    } else {
        None
    };
    let generated = Codegen::new()
        .with_options(CodegenOptions { source_map_path: map_source, ..CodegenOptions::default() })
        .build(&program);

    Ok(TranspileOutput { code: generated.code, map: generated.map.map(|m| m.to_json_string()) })
}

/// Minify a script bundle, dropping `console.*` calls.
pub fn minify_js(source: &str) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if !parsed.errors.is_empty() {
        return Err(diagnostics(&parsed.errors));
    }
    let mut program = parsed.program;

    let options = MinifierOptions {
        mangle: None,
        compress: Some(CompressOptions { drop_console: true, ..CompressOptions::default() }),
    };
    Minifier::new(options).build(&allocator, &mut program);

    let generated = Codegen::new()
        .with_options(CodegenOptions { minify: true, ..CodegenOptions::default() })
        .build(&program);
    Ok(generated.code)
}

/// Reprint a script bundle readable.
pub fn beautify_js(source: &str) -> Result<String, TransformError> {
    let allocator = Allocator::default();
    let parsed = Parser::new(&allocator, source, SourceType::cjs()).parse();
    if !parsed.errors.is_empty() {
        return Err(diagnostics(&parsed.errors));
    }
    Ok(Codegen::new().build(&parsed.program).code)
}

/// Transpile stage; development output carries a source map.
#[derive(Debug, Clone)]
pub struct Transpile {
    /// ECMAScript target
    pub target: String,
}

impl Transpile {
    pub fn new(target: impl Into<String>) -> Self {
        Self { target: target.into() }
    }
}

impl Transform for Transpile {
    fn name(&self) -> &'static str {
        "transpile"
    }

    fn apply(&self, mut file: SourceFile, ctx: &BuildContext) -> Result<SourceFile, TransformError> {
        let output = transpile(file.text()?, &file.relative, &self.target, !ctx.is_production())?;

        let mut code = output.code;
        if output.map.is_some() {
            code.push_str(&format!("//# sourceMappingURL={}.map\n", file.file_name()));
        }
        file.contents = code.into_bytes();
        file.source_map = output.map;
        Ok(file)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::mode::BuildMode;

    fn ctx(mode: BuildMode) -> BuildContext {
        BuildContext::new(SiteConfig::with_name("site"), PathBuf::from("/project"), mode)
    }

    #[test]
    fn test_transpile_lowers_newer_syntax() {
        let out = transpile("const area = side ** 2;\n", Path::new("main.js"), "es2015", false).unwrap();
        assert!(out.code.contains("Math.pow"));
        assert!(out.map.is_none());
    }

    #[test]
    fn test_transpile_source_map() {
        let out = transpile("let a = 1;\n", Path::new("assets/scripts/main.js"), "es2015", true).unwrap();
        let map = out.map.unwrap();
        assert!(map.contains("\"mappings\""));
        assert!(map.contains("main.js"));
        assert!(!map.contains("assets/scripts"));
    }

    #[test]
    fn test_transpile_reports_syntax_errors() {
        let err = transpile("let = ;", Path::new("broken.js"), "es2015", false).unwrap_err();
        assert!(matches!(err, TransformError::Script(_)));
    }

    #[test]
    fn test_transpile_rejects_unknown_target() {
        assert!(transpile("1;", Path::new("a.js"), "es1999", false).is_err());
    }

    #[test]
    fn test_minify_drops_console() {
        let source = "function greet(name) {\n  console.log('hi', name);\n  return 'Hello ' + name;\n}\nwindow.greet = greet;\n";
        let minified = minify_js(source).unwrap();
        assert!(!minified.contains("console"));
        assert!(minified.contains("window.greet"));
        assert!(minified.len() < source.len());
    }

    #[test]
    fn test_beautify_keeps_code() {
        let pretty = beautify_js("var a=1;var b=2;").unwrap();
        assert!(pretty.contains("var a = 1;"));
        assert!(pretty.lines().count() >= 2);
    }

    #[test]
    fn test_transpile_stage_modes() {
        let dev = Transpile::new("es2015")
            .apply(SourceFile::new("assets/scripts/main.js", "let x = 1;"), &ctx(BuildMode::Development))
            .unwrap();
        assert!(dev.text().unwrap().ends_with("//# sourceMappingURL=main.js.map\n"));
        assert!(dev.source_map.is_some());

        let prod = Transpile::new("es2015")
            .apply(SourceFile::new("assets/scripts/main.js", "let x = 1;"), &ctx(BuildMode::Production))
            .unwrap();
        assert!(prod.source_map.is_none());
        assert!(!prod.text().unwrap().contains("sourceMappingURL"));
    }
}
