//! Watching development server.

use super::{bind, open_browser, serve, server_url, ReloadHub, ServerError, SiteHandler, StaticSite};
use crate::build::{BuildContext, PatternSet, TaskKind, TaskRunner};
use crate::watch::WatchRegistry;
use std::sync::Arc;
use std::time::Duration;

/// Serves the compiled temp tree on top of the sources and reloads
/// browsers whenever a watch group handled a change.
#[derive(Debug, Clone)]
pub struct DevServer {
    ctx: Arc<BuildContext>,
    hub: Arc<ReloadHub>,
}

impl DevServer {
    pub fn new(ctx: Arc<BuildContext>) -> Self {
        Self { ctx, hub: Arc::new(ReloadHub::new()) }
    }

    pub fn hub(&self) -> &Arc<ReloadHub> {
        &self.hub
    }

    /// Watch groups for the project.
    ///
    /// Styles, scripts and pages recompile their task before reloading;
    /// images, fonts and public files only reload.
    pub fn registry(&self) -> Result<WatchRegistry, ServerError> {
        let config = self.ctx.config();
        let src = self.ctx.src_dir();
        let mut registry = WatchRegistry::new(Duration::from_millis(u64::from(config.watch.debounce_ms)));

        for (name, pattern, task) in [
            ("styles", &config.paths.styles, TaskKind::Style),
            ("scripts", &config.paths.scripts, TaskKind::Script),
            ("pages", &config.paths.pages, TaskKind::Page),
        ] {
            let ctx = Arc::clone(&self.ctx);
            let hub = Arc::clone(&self.hub);
            registry.register(name, &src, PatternSet::new(&[pattern], false)?, move |_| {
                match TaskRunner::new(&ctx).run_task(task) {
                    Ok(result) => {
                        for error in &result.errors {
                            tracing::warn!("{}", error);
                        }
                    }
                    Err(e) => tracing::error!("{}", e),
                }
                hub.reload();
            });
        }

        let hub = Arc::clone(&self.hub);
        registry.register(
            "assets",
            &src,
            PatternSet::new(&[&config.paths.images, &config.paths.fonts], false)?,
            move |_| {
                hub.reload();
            },
        );

        let hub = Arc::clone(&self.hub);
        registry.register("public", self.ctx.public_dir(), PatternSet::new(&["**"], true)?, move |_| {
            hub.reload();
        });

        Ok(registry)
    }

    /// Files served: temp first, then the sources, then public files.
    pub fn site(&self) -> StaticSite {
        let routes = self
            .ctx
            .config()
            .server
            .routes
            .iter()
            .map(|(prefix, dir)| (prefix.clone(), self.ctx.resolve_path(dir)))
            .collect();
        StaticSite::new(vec![self.ctx.temp_dir(), self.ctx.src_dir(), self.ctx.public_dir()])
            .with_routes(&routes)
    }

    /// Listen, then watch until the process exits.
    pub fn run(&self) -> Result<(), ServerError> {
        let server_config = &self.ctx.config().server;
        let registry = self.registry()?;
        let server = Arc::new(bind(&server_config.host, server_config.dev_port)?);
        let url = server_url(&server, &server_config.host);

        let handler = Arc::new(SiteHandler::new(self.site()).with_reload(Arc::clone(&self.hub)));
        {
            let server = Arc::clone(&server);
            std::thread::spawn(move || serve(server, handler));
        }
        tracing::info!("Dev server listening on {}", url);
        if server_config.open {
            open_browser(&url);
        }

        registry.run()?;
        server.unblock();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SiteConfig;
    use crate::mode::BuildMode;
    use std::fs;
    use tempfile::TempDir;

    fn dev_server() -> (TempDir, DevServer) {
        let temp = TempDir::new().unwrap();
        let ctx = BuildContext::new(
            SiteConfig::with_name("site"),
            temp.path().to_path_buf(),
            BuildMode::Development,
        );
        (temp, DevServer::new(Arc::new(ctx)))
    }

    #[test]
    fn test_registry_groups() {
        let (_temp, server) = dev_server();
        let registry = server.registry().unwrap();
        let names: Vec<&str> = registry.subscriptions().iter().map(|s| s.name()).collect();
        assert_eq!(names, vec!["styles", "scripts", "pages", "assets", "public"]);
    }

    #[test]
    fn test_image_change_only_reloads() {
        let (temp, server) = dev_server();
        let registry = server.registry().unwrap();

        let ran = registry.dispatch(&[temp.path().join("src/assets/images/logo.png")]);
        assert_eq!(ran, vec!["assets"]);
        assert_eq!(server.hub().version(), 1);
        assert!(!temp.path().join("temp").exists());
    }

    #[test]
    fn test_script_change_recompiles() {
        let (temp, server) = dev_server();
        let script = temp.path().join("src/assets/scripts/main.js");
        fs::create_dir_all(script.parent().unwrap()).unwrap();
        fs::write(&script, "const x = 1;\n").unwrap();

        let ran = server.registry().unwrap().dispatch(&[script]);
        assert_eq!(ran, vec!["scripts"]);
        assert!(temp.path().join("temp/assets/scripts/main.js").exists());
        assert_eq!(server.hub().version(), 1);
    }

    #[test]
    fn test_site_serves_temp_before_src() {
        let (temp, server) = dev_server();
        let site = server.site();
        assert_eq!(
            site.roots(),
            &[temp.path().join("temp"), temp.path().join("src"), temp.path().join("public")][..]
        );

        fs::create_dir_all(temp.path().join("node_modules/lib")).unwrap();
        fs::write(temp.path().join("node_modules/lib/a.js"), "a").unwrap();
        assert_eq!(
            site.resolve("/node_modules/lib/a.js"),
            Some(temp.path().join("node_modules/lib/a.js"))
        );
    }
}
