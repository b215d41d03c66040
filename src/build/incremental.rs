//! Incremental build support.
//!
//! Tracks when each task last completed successfully so that a task can
//! restrict itself to files modified since then. The registry lives for the
//! lifetime of the process, matching the watch-and-rebuild workflow.
//!
//! The recorded instant is the *start* of the run: a file edited while the
//! task was running is newer than the mark and gets picked up next time.

use crate::build::TaskKind;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::SystemTime;

/// Per-task record of the last successful run.
#[derive(Debug, Default)]
pub struct LastRun {
    runs: Mutex<HashMap<TaskKind, SystemTime>>,
}

impl LastRun {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start time of the last successful run of `task`.
    pub fn get(&self, task: TaskKind) -> Option<SystemTime> {
        self.runs.lock().ok().and_then(|runs| runs.get(&task).copied())
    }

    /// Record a successful run of `task` that started at `started`.
    pub fn record(&self, task: TaskKind, started: SystemTime) {
        if let Ok(mut runs) = self.runs.lock() {
            runs.insert(task, started);
        }
    }

    /// Forget every recorded run.
    pub fn reset(&self) {
        if let Ok(mut runs) = self.runs.lock() {
            runs.clear();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_last_run_record_and_get() {
        let last_run = LastRun::new();
        assert_eq!(last_run.get(TaskKind::Image), None);

        let t = SystemTime::UNIX_EPOCH + Duration::from_secs(10);
        last_run.record(TaskKind::Image, t);
        assert_eq!(last_run.get(TaskKind::Image), Some(t));
        assert_eq!(last_run.get(TaskKind::Font), None);
    }

    #[test]
    fn test_last_run_overwrites() {
        let last_run = LastRun::new();
        let t1 = SystemTime::UNIX_EPOCH + Duration::from_secs(1);
        let t2 = SystemTime::UNIX_EPOCH + Duration::from_secs(2);
        last_run.record(TaskKind::Image, t1);
        last_run.record(TaskKind::Image, t2);
        assert_eq!(last_run.get(TaskKind::Image), Some(t2));
    }

    #[test]
    fn test_last_run_reset() {
        let last_run = LastRun::new();
        last_run.record(TaskKind::Image, SystemTime::now());
        last_run.reset();
        assert_eq!(last_run.get(TaskKind::Image), None);
    }
}
