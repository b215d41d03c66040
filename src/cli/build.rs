//! Batch command implementations (clean, compile, build)

use std::process::ExitCode;

use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, BuildResult, Flow, TaskRunner};

/// Run a flow and print its summary.
///
/// Returns the result so callers can chain further work, or `None` when
/// the flow stopped on a task error.
pub(super) fn run_flow(ctx: &BuildContext, flow: &Flow) -> Option<BuildResult> {
    match TaskRunner::new(ctx).run(flow) {
        Ok(result) => {
            println!("{}", result.summary());
            if let Some(report) = result.size_report() {
                println!();
                println!("{}", report);
            }
            Some(result)
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            None
        }
    }
}

fn exit_code(result: Option<BuildResult>) -> ExitCode {
    match result {
        Some(result) if result.is_success() => ExitCode::from(EXIT_SUCCESS),
        _ => ExitCode::from(EXIT_ERROR),
    }
}

/// Run the clean command
pub fn run_clean(ctx: &BuildContext) -> ExitCode {
    exit_code(run_flow(ctx, &Flow::clean()))
}

/// Run the compile command
pub fn run_compile(ctx: &BuildContext) -> ExitCode {
    exit_code(run_flow(ctx, &Flow::compile()))
}

/// Run the build command
pub fn run_build(ctx: &BuildContext) -> ExitCode {
    println!("Building in {} mode", ctx.mode());
    exit_code(run_flow(ctx, &Flow::build()))
}
