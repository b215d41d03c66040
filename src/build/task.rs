//! Task and flow definitions.
//!
//! A task is one unit of build work. Flows compose tasks into series and
//! parallel groups; a parallel group is a barrier, so the next element of an
//! enclosing series starts only once every member has finished.

/// Type of build task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TaskKind {
    /// Delete the temp and output directories
    Clean,
    /// Sass → prefixed CSS into temp
    Style,
    /// Transpiled JavaScript into temp
    Script,
    /// Rendered HTML pages into temp
    Page,
    /// Images into the output root
    Image,
    /// Fonts into the output root
    Font,
    /// Public files into the output root
    Extra,
    /// Resolve bundle markers from temp into the output root
    Useref,
    /// Report output sizes
    Measure,
    /// Delete the temp directory once the bundle is assembled
    PurgeTemp,
}

impl TaskKind {
    pub fn name(self) -> &'static str {
        match self {
            TaskKind::Clean => "clean",
            TaskKind::Style => "style",
            TaskKind::Script => "script",
            TaskKind::Page => "page",
            TaskKind::Image => "image",
            TaskKind::Font => "font",
            TaskKind::Extra => "extra",
            TaskKind::Useref => "useref",
            TaskKind::Measure => "measure",
            TaskKind::PurgeTemp => "purge",
        }
    }
}

impl std::fmt::Display for TaskKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// A composition of tasks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Flow {
    Task(TaskKind),
    /// Run in order, each element after the previous one finished
    Series(Vec<Flow>),
    /// Run concurrently, finishing when every element finished
    Parallel(Vec<Flow>),
}

impl Flow {
    pub fn task(kind: TaskKind) -> Self {
        Flow::Task(kind)
    }

    pub fn series(flows: impl IntoIterator<Item = Flow>) -> Self {
        Flow::Series(flows.into_iter().collect())
    }

    pub fn parallel(flows: impl IntoIterator<Item = Flow>) -> Self {
        Flow::Parallel(flows.into_iter().collect())
    }

    /// `clean`
    pub fn clean() -> Self {
        Flow::task(TaskKind::Clean)
    }

    /// `compile` = style, script and page in parallel.
    pub fn compile() -> Self {
        Flow::parallel([
            Flow::task(TaskKind::Style),
            Flow::task(TaskKind::Script),
            Flow::task(TaskKind::Page),
        ])
    }

    /// The part of `serve` that runs before the dev server starts.
    pub fn serve() -> Self {
        Flow::series([Flow::clean(), Flow::compile()])
    }

    /// `build` = clean, then (compile → useref) alongside the asset copies,
    /// then measure, then drop the temp tree.
    pub fn build() -> Self {
        Flow::series([
            Flow::clean(),
            Flow::parallel([
                Flow::series([Flow::compile(), Flow::task(TaskKind::Useref)]),
                Flow::task(TaskKind::Image),
                Flow::task(TaskKind::Font),
                Flow::task(TaskKind::Extra),
            ]),
            Flow::task(TaskKind::Measure),
            Flow::task(TaskKind::PurgeTemp),
        ])
    }

    /// Every task in declaration order.
    pub fn tasks(&self) -> Vec<TaskKind> {
        match self {
            Flow::Task(kind) => vec![*kind],
            Flow::Series(flows) | Flow::Parallel(flows) => {
                flows.iter().flat_map(Flow::tasks).collect()
            }
        }
    }
}

fn write_joined(f: &mut std::fmt::Formatter<'_>, flows: &[Flow], sep: &str) -> std::fmt::Result {
    for (i, flow) in flows.iter().enumerate() {
        if i > 0 {
            write!(f, "{}", sep)?;
        }
        write!(f, "{}", flow)?;
    }
    Ok(())
}

impl std::fmt::Display for Flow {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Flow::Task(kind) => write!(f, "{}", kind),
            Flow::Series(flows) => {
                write!(f, "(")?;
                write_joined(f, flows, " -> ")?;
                write!(f, ")")
            }
            Flow::Parallel(flows) => {
                write!(f, "[")?;
                write_joined(f, flows, " | ")?;
                write!(f, "]")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_task_kind_display() {
        assert_eq!(TaskKind::Style.to_string(), "style");
        assert_eq!(TaskKind::PurgeTemp.to_string(), "purge");
    }

    #[test]
    fn test_compile_flow() {
        assert_eq!(Flow::compile().tasks(), vec![TaskKind::Style, TaskKind::Script, TaskKind::Page]);
    }

    #[test]
    fn test_build_flow_order() {
        let tasks = Flow::build().tasks();
        assert_eq!(tasks.first(), Some(&TaskKind::Clean));
        assert_eq!(tasks.last(), Some(&TaskKind::PurgeTemp));

        let pos = |k| tasks.iter().position(|t| *t == k).unwrap();
        assert!(pos(TaskKind::Page) < pos(TaskKind::Useref));
        assert!(pos(TaskKind::Useref) < pos(TaskKind::Measure));
        assert!(pos(TaskKind::Extra) < pos(TaskKind::Measure));
    }

    #[test]
    fn test_flow_display() {
        assert_eq!(Flow::serve().to_string(), "(clean -> [style | script | page])");
        assert_eq!(
            Flow::build().to_string(),
            "(clean -> [([style | script | page] -> useref) | image | font | extra] -> measure -> purge)"
        );
    }
}
