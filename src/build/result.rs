//! Build result types.
//!
//! Contains types for representing the outcome of tasks and flows.

use crate::build::{SizeReport, TaskKind};
use std::path::PathBuf;
use std::time::Duration;

/// A transformation error for a single file.
///
/// These are reported and collected; they never stop the enclosing task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileError {
    /// Path of the offending file, relative to its stream base
    pub file: PathBuf,
    /// Stage that rejected the file
    pub stage: String,
    pub message: String,
}

impl FileError {
    pub fn new(file: impl Into<PathBuf>, stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self { file: file.into(), stage: stage.into(), message: message.into() }
    }
}

impl std::fmt::Display for FileError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} [{}]: {}", self.file.display(), self.stage, self.message)
    }
}

/// Result of running a single task.
#[derive(Debug, Clone)]
pub struct TaskResult {
    pub task: TaskKind,
    /// Files written by the task
    pub outputs: Vec<PathBuf>,
    /// Files left untouched because they were up to date
    pub skipped: usize,
    /// Per-file transformation errors
    pub errors: Vec<FileError>,
    pub duration: Duration,
    /// Size report produced by the measure task
    pub report: Option<SizeReport>,
}

impl TaskResult {
    pub fn new(task: TaskKind) -> Self {
        Self {
            task,
            outputs: vec![],
            skipped: 0,
            errors: vec![],
            duration: Duration::ZERO,
            report: None,
        }
    }

    /// Set the outputs.
    pub fn with_outputs(mut self, outputs: Vec<PathBuf>) -> Self {
        self.outputs = outputs;
        self
    }

    /// Set the per-file errors.
    pub fn with_errors(mut self, errors: Vec<FileError>) -> Self {
        self.errors = errors;
        self
    }

    /// Set the number of up-to-date files.
    pub fn with_skipped(mut self, skipped: usize) -> Self {
        self.skipped = skipped;
        self
    }

    /// Check whether every file was processed without error.
    pub fn is_success(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Result of a complete flow run.
#[derive(Debug, Default)]
pub struct BuildResult {
    /// Results for each task, in flow declaration order
    pub tasks: Vec<TaskResult>,
    /// Total flow duration
    pub total_duration: Duration,
}

impl BuildResult {
    /// Create a new empty build result.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a task result.
    pub fn add_result(&mut self, result: TaskResult) {
        self.tasks.push(result);
    }

    /// Append every task result of another run.
    pub fn extend(&mut self, other: BuildResult) {
        self.tasks.extend(other.tasks);
    }

    /// Set the total duration.
    pub fn with_duration(mut self, duration: Duration) -> Self {
        self.total_duration = duration;
        self
    }

    /// Result of a specific task, if it ran.
    pub fn task(&self, task: TaskKind) -> Option<&TaskResult> {
        self.tasks.iter().find(|r| r.task == task)
    }

    /// Number of files written.
    pub fn output_count(&self) -> usize {
        self.tasks.iter().map(|r| r.outputs.len()).sum()
    }

    /// Number of files skipped as up to date.
    pub fn skipped_count(&self) -> usize {
        self.tasks.iter().map(|r| r.skipped).sum()
    }

    /// All per-file errors.
    pub fn errors(&self) -> Vec<&FileError> {
        self.tasks.iter().flat_map(|r| r.errors.iter()).collect()
    }

    /// Size report, when the flow measured its output.
    pub fn size_report(&self) -> Option<&SizeReport> {
        self.tasks.iter().find_map(|r| r.report.as_ref())
    }

    /// Check if every task processed every file.
    pub fn is_success(&self) -> bool {
        self.tasks.iter().all(TaskResult::is_success)
    }

    /// Format a summary of the build result.
    pub fn summary(&self) -> String {
        let mut lines = Vec::new();

        for task in &self.tasks {
            let mut line = format!(
                "  {:<8} {:>4} written {:>8}",
                task.task.name(),
                task.outputs.len(),
                format!("{}ms", task.duration.as_millis())
            );
            if task.skipped > 0 {
                line.push_str(&format!("  ({} unchanged)", task.skipped));
            }
            if !task.errors.is_empty() {
                line.push_str(&format!("  {} error(s)", task.errors.len()));
            }
            lines.push(line);
        }

        let errors = self.errors();
        if errors.is_empty() {
            lines.push(format!(
                "Finished: {} files written, {} unchanged in {:?}",
                self.output_count(),
                self.skipped_count(),
                self.total_duration
            ));
        } else {
            lines.push(format!(
                "Finished with {} error(s): {} files written in {:?}",
                errors.len(),
                self.output_count(),
                self.total_duration
            ));
            for error in errors.iter().take(10) {
                lines.push(format!("  - {}", error));
            }
            if errors.len() > 10 {
                lines.push(format!("  ... and {} more", errors.len() - 10));
            }
        }

        lines.join("\n")
    }
}
