//! Server command implementations (serve, start)

use std::process::ExitCode;
use std::sync::Arc;

use super::build::run_flow;
use super::{EXIT_ERROR, EXIT_SUCCESS};
use crate::build::{BuildContext, Flow};
use crate::server::{DevServer, PreviewServer};

/// Run the serve command
///
/// Compile errors are reported but do not keep the server from starting;
/// fixing the file triggers a recompile.
pub fn run_serve(ctx: BuildContext) -> ExitCode {
    if run_flow(&ctx, &Flow::serve()).is_none() {
        return ExitCode::from(EXIT_ERROR);
    }

    println!("Press Ctrl+C to stop");
    match DevServer::new(Arc::new(ctx)).run() {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}

/// Run the start command
pub fn run_start(ctx: BuildContext) -> ExitCode {
    match run_flow(&ctx, &Flow::build()) {
        Some(result) if result.is_success() => {}
        Some(_) => eprintln!("Build finished with errors; previewing anyway"),
        None => return ExitCode::from(EXIT_ERROR),
    }

    println!("Press Ctrl+C to stop");
    match PreviewServer::new(Arc::new(ctx)).run() {
        Ok(()) => ExitCode::from(EXIT_SUCCESS),
        Err(e) => {
            eprintln!("Server error: {}", e);
            ExitCode::from(EXIT_ERROR)
        }
    }
}
