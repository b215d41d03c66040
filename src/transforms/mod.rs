//! File transformation stages.
//!
//! A [`Pipeline`] is an ordered list of [`Transform`] stages. Each file of a
//! stream passes through every stage in turn; a stage that rejects a file
//! drops it from the output stream and records a [`FileError`], while the
//! rest of the stream carries on.
//!
//! # Module Structure
//!
//! - [`style`] - Sass compilation, vendor prefixing, CSS minification
//! - [`script`] - JavaScript transpilation and minification
//! - [`page`] - Template rendering with partials
//! - [`image`] - Lossless/lossy image compression
//! - [`html`] - HTML minification and tidying
//! - [`useref`] - Build marker resolution and asset bundling

pub mod html;
pub mod image;
pub mod page;
pub mod script;
pub mod style;
pub mod useref;

pub use html::{minify_html, tidy_html, MinifyHtml, TidyHtml};
pub use image::{compress_image, Compress};
pub use page::{is_partial, partial_name, PageRenderer};
pub use script::{beautify_js, minify_js, transpile, Transpile, TranspileOutput};
pub use style::{
    beautify_css, browser_targets, compile_sass, is_sass_partial, minify_css, prefix_css,
    Autoprefix, SassCompile,
};
pub use useref::{parse_blocks, BlockKind, BuildBlock, Useref, UserefOutput};

use crate::build::{BuildContext, FileError, FileStream, SourceFile};
use rayon::prelude::*;

/// Error raised by a stage for a single file.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[non_exhaustive]
pub enum TransformError {
    /// File is not valid UTF-8 text
    #[error("invalid UTF-8: {0}")]
    Encoding(String),
    /// Sass compilation failed
    #[error("{0}")]
    Sass(String),
    /// CSS parse, prefix or print failed
    #[error("{0}")]
    Css(String),
    /// JavaScript parse, transform or minify failed
    #[error("{0}")]
    Script(String),
    /// Template registration or rendering failed
    #[error("{0}")]
    Template(String),
    /// Image decode or encode failed
    #[error("{0}")]
    Image(String),
    /// A bundle input was not found in any search path
    #[error("cannot resolve '{reference}' (searched {searched})")]
    Unresolved { reference: String, searched: String },
}

impl From<std::str::Utf8Error> for TransformError {
    fn from(e: std::str::Utf8Error) -> Self {
        TransformError::Encoding(e.to_string())
    }
}

/// A single file transformation stage.
pub trait Transform: Send + Sync {
    /// Stage name used in error reports.
    fn name(&self) -> &'static str;

    /// Transform one file.
    fn apply(&self, file: SourceFile, ctx: &BuildContext) -> Result<SourceFile, TransformError>;
}

/// Ordered sequence of stages.
#[derive(Default)]
pub struct Pipeline {
    stages: Vec<Box<dyn Transform>>,
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a stage.
    pub fn stage(mut self, stage: impl Transform + 'static) -> Self {
        self.stages.push(Box::new(stage));
        self
    }

    /// Append a stage only when `enabled`.
    pub fn stage_if(self, enabled: bool, stage: impl Transform + 'static) -> Self {
        if enabled {
            self.stage(stage)
        } else {
            self
        }
    }

    /// Stage names in order.
    pub fn names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Run every file through every stage.
    ///
    /// Files are processed in parallel; the output keeps input order.
    pub fn run(&self, stream: FileStream, ctx: &BuildContext) -> (FileStream, Vec<FileError>) {
        let results: Vec<Result<SourceFile, FileError>> =
            stream.into_files().into_par_iter().map(|file| self.run_file(file, ctx)).collect();

        let mut files = Vec::with_capacity(results.len());
        let mut errors = Vec::new();
        for result in results {
            match result {
                Ok(file) => files.push(file),
                Err(error) => {
                    tracing::warn!("{}", error);
                    errors.push(error);
                }
            }
        }
        (FileStream::new(files), errors)
    }

    fn run_file(&self, mut file: SourceFile, ctx: &BuildContext) -> Result<SourceFile, FileError> {
        for stage in &self.stages {
            let relative = file.relative.clone();
            file = stage
                .apply(file, ctx)
                .map_err(|e| FileError::new(relative, stage.name(), e.to_string()))?;
        }
        Ok(file)
    }
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline").field("stages", &self.names()).finish()
    }
}
