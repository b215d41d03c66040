//! Preview server for the finished bundle.

use super::{bind, open_browser, serve, server_url, ServerError, SiteHandler, StaticSite};
use crate::build::BuildContext;
use std::sync::Arc;

/// Serves the output root as-is.
#[derive(Debug, Clone)]
pub struct PreviewServer {
    ctx: Arc<BuildContext>,
}

impl PreviewServer {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx }
    }

    pub fn site(&self) -> StaticSite {
        StaticSite::new(vec![self.ctx.dest_dir()])
    }

    /// Listen until the process exits.
    pub fn run(&self) -> Result<(), ServerError> {
        let config = &self.ctx.config().server;
        let server = Arc::new(bind(&config.host, config.preview_port)?);
        let url = server_url(&server, &config.host);

        tracing::info!("Previewing {} on {}", self.ctx.dest_dir().display(), url);
        if config.open {
            open_browser(&url);
        }
        serve(server, Arc::new(SiteHandler::new(self.site())));
        Ok(())
    }
}
