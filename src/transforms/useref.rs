//! Build marker resolution.
//!
//! Rendered pages declare bundles with comment markers:
//!
//! ```text
//! <!-- build:css assets/styles/vendor.css -->
//! <link rel="stylesheet" href="/node_modules/x/x.css">
//! <!-- endbuild -->
//! <!-- build:js(temp,node_modules) assets/scripts/vendor.js -->
//! <script src="a.js"></script>
//! <!-- endbuild -->
//! <!-- build:remove -->...<!-- endbuild -->
//! ```
//!
//! Each `css`/`js` block is replaced by one tag pointing at its bundle. The
//! referenced files are concatenated in declared order, then minified
//! (production) or reformatted (development). A bundle declared by several
//! pages is assembled once, from its first declaration.

use super::{beautify_css, beautify_js, minify_css, minify_js, TransformError};
use crate::build::{BuildContext, FileError, FileStream, SourceFile};
use lightningcss::targets::Targets;
use regex::Regex;
use std::collections::BTreeSet;
use std::ops::Range;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

static BLOCK_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?s)<!--\s*build:(\w+)(?:\(([^)]*)\))?(?:\s+([^\s]+?))?\s*-->(.*?)<!--\s*endbuild\s*-->",
    )
    .expect("BUG: invalid BLOCK_RE regex literal")
});

static CSS_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<link\b[^>]*?\shref\s*=\s*["']([^"']+)["']"#)
        .expect("BUG: invalid CSS_REF_RE regex literal")
});

static JS_REF_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?i)<script\b[^>]*?\ssrc\s*=\s*["']([^"']+)["']"#)
        .expect("BUG: invalid JS_REF_RE regex literal")
});

static SOURCE_MAP_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(?://[#@][ \t]*sourceMappingURL=[^\r\n]*|/\*[#@][ \t]*sourceMappingURL=[^*]*\*/)[ \t]*\r?\n?")
        .expect("BUG: invalid SOURCE_MAP_RE regex literal")
});

/// Kind of build block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Css,
    Js,
    /// Dropped from the output
    Remove,
}

impl BlockKind {
    fn parse(s: &str) -> Option<Self> {
        match s {
            "css" => Some(BlockKind::Css),
            "js" => Some(BlockKind::Js),
            "remove" => Some(BlockKind::Remove),
            _ => None,
        }
    }

    /// Tag replacing the block.
    pub fn tag(self, target: &str) -> String {
        match self {
            BlockKind::Css => format!("<link rel=\"stylesheet\" href=\"{}\">", target),
            BlockKind::Js => format!("<script src=\"{}\"></script>", target),
            BlockKind::Remove => String::new(),
        }
    }
}

/// A marker block found in a page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildBlock {
    pub kind: BlockKind,
    /// Bundle path relative to the output root; empty for `remove`
    pub target: String,
    /// Per-block search paths, e.g. `build:js(temp,node_modules)`
    pub search_paths: Vec<PathBuf>,
    /// Referenced `href`/`src` values in declared order
    pub references: Vec<String>,
    /// Byte range of the whole block, markers included
    pub span: Range<usize>,
}

/// Find every marker block in `html`, in document order.
///
/// Blocks of an unknown type, and `css`/`js` blocks without a target, are
/// left untouched.
pub fn parse_blocks(html: &str) -> Vec<BuildBlock> {
    let mut blocks = Vec::new();
    for caps in BLOCK_RE.captures_iter(html) {
        let (Some(whole), Some(kind)) = (caps.get(0), caps.get(1)) else {
            continue;
        };
        let Some(kind) = BlockKind::parse(kind.as_str()) else {
            tracing::debug!(marker = kind.as_str(), "ignoring unknown build block");
            continue;
        };
        let target = caps.get(3).map(|m| m.as_str().to_string()).unwrap_or_default();
        if kind != BlockKind::Remove && target.is_empty() {
            tracing::debug!("ignoring build block without a target");
            continue;
        }

        let search_paths = caps
            .get(2)
            .map(|m| {
                m.as_str()
                    .split(',')
                    .map(str::trim)
                    .filter(|p| !p.is_empty())
                    .map(PathBuf::from)
                    .collect()
            })
            .unwrap_or_default();

        let body = caps.get(4).map(|m| m.as_str()).unwrap_or_default();
        let references = match kind {
            BlockKind::Css => collect_refs(&CSS_REF_RE, body),
            BlockKind::Js => collect_refs(&JS_REF_RE, body),
            BlockKind::Remove => vec![],
        };

        blocks.push(BuildBlock { kind, target, search_paths, references, span: whole.range() });
    }
    blocks
}

fn collect_refs(re: &Regex, body: &str) -> Vec<String> {
    re.captures_iter(body).filter_map(|c| c.get(1)).map(|m| m.as_str().to_string()).collect()
}

/// Drop `sourceMappingURL` comments from a bundle input.
pub fn strip_source_map_comments(source: &str) -> String {
    SOURCE_MAP_RE.replace_all(source, "").into_owned()
}

/// Pages with their blocks replaced, plus the bundles they declared.
#[derive(Debug, Default)]
pub struct UserefOutput {
    pub pages: FileStream,
    pub assets: FileStream,
    pub errors: Vec<FileError>,
}

/// Resolves marker blocks against the filesystem.
#[derive(Debug, Clone)]
pub struct Useref {
    project_root: PathBuf,
    /// Absolute search paths used by blocks that declare none
    search_paths: Vec<PathBuf>,
    production: bool,
    targets: Targets,
}

impl Useref {
    pub fn new(
        project_root: PathBuf,
        search_paths: Vec<PathBuf>,
        production: bool,
        targets: Targets,
    ) -> Self {
        let search_paths = search_paths
            .iter()
            .map(|p| crate::config::loader::resolve_path(&project_root, p))
            .collect();
        Self { project_root, search_paths, production, targets }
    }

    /// Resolver configured from the build context.
    pub fn from_context(ctx: &BuildContext, targets: Targets) -> Self {
        Self::new(
            ctx.project_root().to_path_buf(),
            ctx.config().useref.search_paths.clone(),
            ctx.is_production(),
            targets,
        )
    }

    /// Resolve every page of the stream.
    pub fn resolve(&self, pages: FileStream) -> UserefOutput {
        let mut output = UserefOutput::default();
        let mut emitted = BTreeSet::new();
        let mut resolved = Vec::with_capacity(pages.len());
        let mut assets = Vec::new();

        for page in pages.into_files() {
            match self.resolve_page(page, &mut emitted, &mut assets, &mut output.errors) {
                Ok(page) => resolved.push(page),
                Err(error) => {
                    tracing::warn!("{}", error);
                    output.errors.push(error);
                }
            }
        }

        output.pages = FileStream::new(resolved);
        output.assets = FileStream::new(assets);
        output
    }

    fn resolve_page(
        &self,
        mut page: SourceFile,
        emitted: &mut BTreeSet<String>,
        assets: &mut Vec<SourceFile>,
        errors: &mut Vec<FileError>,
    ) -> Result<SourceFile, FileError> {
        let html = page
            .text()
            .map_err(|e| FileError::new(&page.relative, "useref", TransformError::from(e).to_string()))?
            .to_string();
        let page_dir = page.relative.parent().map(Path::to_path_buf).unwrap_or_default();

        let mut out = String::with_capacity(html.len());
        let mut cursor = 0;
        for block in parse_blocks(&html) {
            out.push_str(&html[cursor..block.span.start]);
            cursor = block.span.end;

            if block.kind == BlockKind::Remove {
                continue;
            }
            out.push_str(&block.kind.tag(&block.target));

            let bundle_path = block.target.trim_start_matches('/').to_string();
            if !emitted.insert(bundle_path.clone()) {
                continue;
            }
            let contents = self.assemble(&page, &page_dir, &block, errors);
            let contents = self.finish(&bundle_path, block.kind, contents, errors);
            tracing::debug!(bundle = %bundle_path, inputs = block.references.len(), "assembled");
            assets.push(SourceFile::new(bundle_path, contents));
        }
        out.push_str(&html[cursor..]);

        page.contents = out.into_bytes();
        Ok(page)
    }

    /// Concatenate a block's inputs in declared order.
    fn assemble(
        &self,
        page: &SourceFile,
        page_dir: &Path,
        block: &BuildBlock,
        errors: &mut Vec<FileError>,
    ) -> String {
        let search_paths: Vec<PathBuf> = if block.search_paths.is_empty() {
            self.search_paths.clone()
        } else {
            block
                .search_paths
                .iter()
                .map(|p| crate::config::loader::resolve_path(&self.project_root, p))
                .collect()
        };

        let mut parts = Vec::with_capacity(block.references.len());
        for reference in &block.references {
            let input = self
                .resolve_reference(reference, page_dir, &search_paths)
                .ok_or_else(|| TransformError::Unresolved {
                    reference: reference.clone(),
                    searched: search_paths
                        .iter()
                        .map(|p| p.display().to_string())
                        .collect::<Vec<_>>()
                        .join(", "),
                })
                .and_then(|path| {
                    std::fs::read_to_string(&path)
                        .map_err(|e| TransformError::Encoding(format!("{}: {}", path.display(), e)))
                });
            match input {
                Ok(text) => parts.push(strip_source_map_comments(&text).trim_end().to_string()),
                Err(e) => {
                    let error = FileError::new(&page.relative, "useref", e.to_string());
                    tracing::warn!("{}", error);
                    errors.push(error);
                }
            }
        }

        let mut bundle = parts.join("\n");
        bundle.push('\n');
        bundle
    }

    /// First existing candidate for `reference` across `search_paths`.
    ///
    /// Root-relative references (`/node_modules/x.css`) are looked up
    /// directly below each search path; relative ones are tried against the
    /// page's directory first.
    pub fn resolve_reference(
        &self,
        reference: &str,
        page_dir: &Path,
        search_paths: &[PathBuf],
    ) -> Option<PathBuf> {
        let clean = reference.split(['?', '#']).next().unwrap_or(reference);
        if clean.contains("://") || clean.starts_with("//") {
            return None;
        }

        let rooted = clean.starts_with('/');
        let clean = clean.trim_start_matches('/');
        search_paths.iter().find_map(|base| {
            let mut candidates = Vec::with_capacity(2);
            if !rooted && !page_dir.as_os_str().is_empty() {
                candidates.push(base.join(page_dir).join(clean));
            }
            candidates.push(base.join(clean));
            candidates.into_iter().find(|c| c.is_file())
        })
    }

    /// Minify or reformat a concatenated bundle.
    ///
    /// On failure the raw concatenation is kept and the error recorded.
    fn finish(
        &self,
        bundle_path: &str,
        kind: BlockKind,
        concatenated: String,
        errors: &mut Vec<FileError>,
    ) -> String {
        let (stage, result) = match (kind, self.production) {
            (BlockKind::Css, true) => ("cssmin", minify_css(&concatenated, self.targets.clone())),
            (BlockKind::Js, true) => ("uglify", minify_js(&concatenated)),
            (BlockKind::Css, false) => ("beautify", beautify_css(&concatenated)),
            (BlockKind::Js, false) => ("beautify", beautify_js(&concatenated)),
            (BlockKind::Remove, _) => return concatenated,
        };
        match result {
            Ok(code) => code,
            Err(e) => {
                let error = FileError::new(bundle_path, stage, e.to_string());
                tracing::warn!("{}", error);
                errors.push(error);
                concatenated
            }
        }
    }
}
