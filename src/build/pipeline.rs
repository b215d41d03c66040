//! Task execution.
//!
//! [`TaskRunner`] runs a [`Flow`] against a shared [`BuildContext`]. Series
//! run in order; parallel groups run on the rayon pool and join before the
//! enclosing series moves on. A filesystem failure stops the flow with a
//! [`TaskError`]; per-file transformation errors are collected on the task
//! result and never stop anything.

use crate::build::{
    clean_dirs, BuildContext, BuildResult, FileError, FileStream, Flow,
    SizeReport, SrcOptions, StreamError, TaskKind, TaskResult,
};
use crate::transforms::{
    browser_targets, is_partial, is_sass_partial, Autoprefix, Compress, MinifyHtml, PageRenderer,
    Pipeline, SassCompile, TidyHtml, Transpile, Useref,
};
use lightningcss::targets::Targets;
use rayon::prelude::*;
use std::io;
use std::path::{Path, PathBuf};
use std::time::{Instant, SystemTime};

/// Failure that halts a task and the flow running it.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum TaskError {
    /// Reading or writing a file stream failed
    #[error("{task}: {source}")]
    Stream {
        task: TaskKind,
        #[source]
        source: StreamError,
    },
    /// Removing or walking a directory failed
    #[error("{task}: {}: {source}", .path.display())]
    Io {
        task: TaskKind,
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    /// Configuration the task cannot work with
    #[error("{task}: {message}")]
    Config { task: TaskKind, message: String },
}

impl TaskError {
    /// Task that failed.
    pub fn task(&self) -> TaskKind {
        match self {
            TaskError::Stream { task, .. }
            | TaskError::Io { task, .. }
            | TaskError::Config { task, .. } => *task,
        }
    }
}

/// Runs tasks and flows.
#[derive(Debug, Clone, Copy)]
pub struct TaskRunner<'a> {
    ctx: &'a BuildContext,
}

impl<'a> TaskRunner<'a> {
    pub fn new(ctx: &'a BuildContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &BuildContext {
        self.ctx
    }

    /// Run a flow to completion.
    pub fn run(&self, flow: &Flow) -> Result<BuildResult, TaskError> {
        let start = Instant::now();
        tracing::debug!(%flow, mode = %self.ctx.mode(), "running flow");
        let result = self.run_flow(flow)?;
        Ok(result.with_duration(start.elapsed()))
    }

    fn run_flow(&self, flow: &Flow) -> Result<BuildResult, TaskError> {
        let mut result = BuildResult::new();
        match flow {
            Flow::Task(kind) => result.add_result(self.run_task(*kind)?),
            Flow::Series(flows) => {
                for flow in flows {
                    result.extend(self.run_flow(flow)?);
                }
            }
            Flow::Parallel(flows) => {
                // Every member finishes before the first error is surfaced.
                let results: Vec<Result<BuildResult, TaskError>> =
                    flows.par_iter().map(|flow| self.run_flow(flow)).collect();
                for member in results {
                    result.extend(member?);
                }
            }
        }
        Ok(result)
    }

    /// Run a single task.
    pub fn run_task(&self, task: TaskKind) -> Result<TaskResult, TaskError> {
        let start = Instant::now();
        tracing::debug!(%task, "starting");

        let mut result = match task {
            TaskKind::Clean => self.clean(),
            TaskKind::Style => self.style(),
            TaskKind::Script => self.script(),
            TaskKind::Page => self.page(),
            TaskKind::Image => self.image(),
            TaskKind::Font => self.font(),
            TaskKind::Extra => self.extra(),
            TaskKind::Useref => self.useref(),
            TaskKind::Measure => self.measure(),
            TaskKind::PurgeTemp => self.purge_temp(),
        }?;
        result.duration = start.elapsed();

        tracing::info!(
            %task,
            written = result.outputs.len(),
            skipped = result.skipped,
            errors = result.errors.len(),
            "finished in {:?}",
            result.duration
        );
        Ok(result)
    }

    fn src(
        &self,
        task: TaskKind,
        base: &Path,
        pattern: &str,
        options: SrcOptions,
    ) -> Result<FileStream, TaskError> {
        FileStream::src(base, pattern, options).map_err(|source| TaskError::Stream { task, source })
    }

    fn dest(
        &self,
        task: TaskKind,
        stream: &FileStream,
        out_dir: &Path,
    ) -> Result<Vec<PathBuf>, TaskError> {
        stream.dest(out_dir).map_err(|source| TaskError::Stream { task, source })
    }

    fn targets(&self, task: TaskKind) -> Result<Targets, TaskError> {
        browser_targets(&self.ctx.config().styles.browserslist)
            .map_err(|e| TaskError::Config { task, message: format!("browserslist: {}", e) })
    }

    fn clean(&self) -> Result<TaskResult, TaskError> {
        for dir in [self.ctx.temp_dir(), self.ctx.dest_dir()] {
            self.remove(TaskKind::Clean, dir)?;
        }
        Ok(TaskResult::new(TaskKind::Clean))
    }

    fn remove(&self, task: TaskKind, dir: PathBuf) -> Result<(), TaskError> {
        clean_dirs(std::slice::from_ref(&dir))
            .map(|_| ())
            .map_err(|source| TaskError::Io { task, path: dir, source })
    }

    fn style(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Style;
        let config = self.ctx.config();
        let stream = self
            .src(task, &self.ctx.src_dir(), &config.paths.styles, SrcOptions::default())?
            .filter(|f| !is_sass_partial(&f.relative));

        let load_paths: Vec<PathBuf> =
            config.styles.include_paths.iter().map(|p| self.ctx.resolve_path(p)).collect();
        let pipeline = Pipeline::new()
            .stage(SassCompile::new(load_paths))
            .stage(Autoprefix::new(self.targets(task)?));

        let (out, errors) = pipeline.run(stream, self.ctx);
        let written = self.dest(task, &out, &self.ctx.temp_dir())?;
        Ok(TaskResult::new(task).with_outputs(written).with_errors(errors))
    }

    fn script(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Script;
        let config = self.ctx.config();
        let stream = self.src(task, &self.ctx.src_dir(), &config.paths.scripts, SrcOptions::default())?;

        let pipeline = Pipeline::new().stage(Transpile::new(config.scripts.target.clone()));
        let (out, errors) = pipeline.run(stream, self.ctx);
        let written = self.dest(task, &out, &self.ctx.temp_dir())?;
        Ok(TaskResult::new(task).with_outputs(written).with_errors(errors))
    }

    fn page(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Page;
        let config = self.ctx.config();
        let stream = self.src(task, &self.ctx.src_dir(), &config.paths.pages, SrcOptions::default())?;

        let (partials, pages): (Vec<_>, Vec<_>) = stream
            .into_files()
            .into_iter()
            .partition(|f| is_partial(&f.relative, &config.pages.partials));

        let mut renderer = PageRenderer::new();
        let mut errors = renderer.register_partials(&partials);

        let (out, render_errors) =
            Pipeline::new().stage(renderer).run(FileStream::new(pages), self.ctx);
        errors.extend(render_errors);

        let written = self.dest(task, &out, &self.ctx.temp_dir())?;
        Ok(TaskResult::new(task).with_outputs(written).with_errors(errors))
    }

    fn image(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Image;
        let started = SystemTime::now();
        let src_dir = self.ctx.src_dir();
        let pattern = &self.ctx.config().paths.images;

        let since = self.ctx.last_run().get(task);
        let stream = self.src(task, &src_dir, pattern, SrcOptions { since, ..SrcOptions::default() })?;
        let skipped = stream.skipped();

        let pipeline = Pipeline::new().stage_if(self.ctx.is_production(), Compress);
        let (out, errors) = pipeline.run(stream, self.ctx);
        let written = self.dest(task, &out, &self.ctx.dest_dir())?;

        if errors.is_empty() {
            self.ctx.last_run().record(task, started);
        }
        Ok(TaskResult::new(task).with_outputs(written).with_errors(errors).with_skipped(skipped))
    }

    fn font(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Font;
        let stream =
            self.src(task, &self.ctx.src_dir(), &self.ctx.config().paths.fonts, SrcOptions::default())?;
        let written = self.dest(task, &stream, &self.ctx.dest_dir())?;
        Ok(TaskResult::new(task).with_outputs(written))
    }

    fn extra(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Extra;
        let options = SrcOptions { dot: true, ..SrcOptions::default() };
        let stream = self.src(task, &self.ctx.public_dir(), "**", options)?;
        let written = self.dest(task, &stream, &self.ctx.dest_dir())?;
        Ok(TaskResult::new(task).with_outputs(written))
    }

    fn useref(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Useref;
        let pages =
            self.src(task, &self.ctx.temp_dir(), &self.ctx.config().paths.pages, SrcOptions::default())?;

        let resolved = Useref::from_context(self.ctx, self.targets(task)?).resolve(pages);
        let mut errors: Vec<FileError> = resolved.errors;

        let production = self.ctx.is_production();
        let html = Pipeline::new().stage_if(production, MinifyHtml).stage_if(!production, TidyHtml);
        let (pages, html_errors) = html.run(resolved.pages, self.ctx);
        errors.extend(html_errors);

        let dest = self.ctx.dest_dir();
        let mut written = self.dest(task, &resolved.assets, &dest)?;
        written.extend(self.dest(task, &pages, &dest)?);
        Ok(TaskResult::new(task).with_outputs(written).with_errors(errors))
    }

    fn measure(&self) -> Result<TaskResult, TaskError> {
        let task = TaskKind::Measure;
        let dest = self.ctx.dest_dir();
        let report = SizeReport::measure(&dest, self.ctx.mode())
            .map_err(|source| TaskError::Io { task, path: dest.clone(), source })?;
        tracing::debug!(files = report.files.len(), total = report.total(), "{}", report.title());

        let mut result = TaskResult::new(task);
        result.report = Some(report);
        Ok(result)
    }

    fn purge_temp(&self) -> Result<TaskResult, TaskError> {
        self.remove(TaskKind::PurgeTemp, self.ctx.temp_dir())?;
        Ok(TaskResult::new(TaskKind::PurgeTemp))
    }
}
