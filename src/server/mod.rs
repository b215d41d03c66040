//! Static file servers.
//!
//! - [`dev`] - Watching dev server with live reload
//! - [`preview`] - Plain server for the finished bundle
//! - [`livereload`] - Reload hub and browser client
//!
//! Requests are resolved by [`StaticSite`] against an ordered list of root
//! directories plus URL-prefix routes, and answered by [`SiteHandler`]. The
//! transport is `tiny_http` with one thread per request.

pub mod dev;
pub mod livereload;
pub mod preview;

pub use dev::DevServer;
pub use livereload::{client_script, inject, ReloadHub, LIVERELOAD_PATH};
pub use preview::PreviewServer;

use crate::build::DiscoveryError;
use crate::watch::WatchError;
use percent_encoding::percent_decode_str;
use std::collections::BTreeMap;
use std::io::Cursor;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tiny_http::{Header, Method, Request, Response, StatusCode};

/// File served for directory requests.
pub const INDEX_FILE: &str = "index.html";

/// Error starting or running a server
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ServerError {
    /// The listening socket could not be bound
    #[error("Failed to bind {addr}: {message}")]
    Bind { addr: String, message: String },
    #[error(transparent)]
    Watch(#[from] WatchError),
    #[error(transparent)]
    Pattern(#[from] DiscoveryError),
}

/// Maps URL paths onto files.
#[derive(Debug, Clone, Default)]
pub struct StaticSite {
    /// Searched in order
    roots: Vec<PathBuf>,
    /// URL prefix → directory, longest prefix first
    routes: Vec<(String, PathBuf)>,
}

impl StaticSite {
    pub fn new(roots: Vec<PathBuf>) -> Self {
        Self { roots, routes: Vec::new() }
    }

    /// Add URL prefix routes, which take precedence over the roots.
    pub fn with_routes(mut self, routes: &BTreeMap<String, PathBuf>) -> Self {
        self.routes = routes
            .iter()
            .map(|(prefix, dir)| (format!("/{}", prefix.trim_matches('/')), dir.clone()))
            .collect();
        self.routes.sort_by(|a, b| b.0.len().cmp(&a.0.len()));
        self
    }

    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Resolve a request path to an existing file.
    ///
    /// The query string is ignored and the path is percent-decoded. Paths
    /// escaping the served directories, before or after decoding, resolve
    /// to nothing.
    pub fn resolve(&self, url: &str) -> Option<PathBuf> {
        let raw = url.split(['?', '#']).next().unwrap_or(url);
        let path = percent_decode_str(raw).decode_utf8().ok()?;
        if !path.starts_with('/') {
            return None;
        }

        for (prefix, dir) in &self.routes {
            if let Some(rest) = path.strip_prefix(prefix.as_str()) {
                if rest.is_empty() || rest.starts_with('/') {
                    return lookup(dir, rest);
                }
            }
        }
        self.roots.iter().find_map(|root| lookup(root, &path))
    }
}

fn lookup(root: &Path, url_path: &str) -> Option<PathBuf> {
    let relative = Path::new(url_path.trim_start_matches('/'));
    if relative.components().any(|c| !matches!(c, Component::Normal(_))) {
        return None;
    }

    let candidate = root.join(relative);
    if candidate.is_file() {
        return Some(candidate);
    }
    let index = candidate.join(INDEX_FILE);
    index.is_file().then_some(index)
}

/// A response before it is handed to the transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub content_type: String,
    pub body: Vec<u8>,
    /// Announced `Content-Length`; only differs from the body for `HEAD`
    pub content_length: usize,
}

impl HttpResponse {
    fn new(status: u16, content_type: impl Into<String>, body: Vec<u8>) -> Self {
        Self { status, content_type: content_type.into(), content_length: body.len(), body }
    }

    fn text(status: u16, body: &str) -> Self {
        Self::new(status, "text/plain; charset=utf-8", body.as_bytes().to_vec())
    }

    fn not_found() -> Self {
        Self::text(404, "Not Found")
    }
}

/// Answers requests for a [`StaticSite`], optionally with live reload.
#[derive(Debug)]
pub struct SiteHandler {
    site: StaticSite,
    reload: Option<Arc<ReloadHub>>,
}

impl SiteHandler {
    pub fn new(site: StaticSite) -> Self {
        Self { site, reload: None }
    }

    /// Serve the reload endpoint and inject the client into HTML pages.
    pub fn with_reload(mut self, hub: Arc<ReloadHub>) -> Self {
        self.reload = Some(hub);
        self
    }

    /// Build the response for `GET url`.
    pub fn respond(&self, url: &str) -> HttpResponse {
        if let Some(hub) = &self.reload {
            if let Some(query) = url.strip_prefix(LIVERELOAD_PATH) {
                let since = query
                    .trim_start_matches('?')
                    .split('&')
                    .find_map(|pair| pair.strip_prefix("since="))
                    .and_then(|v| v.parse().ok())
                    .unwrap_or_else(|| hub.version());
                let version = hub.wait_newer(since, livereload::POLL_TIMEOUT);
                let body = serde_json::json!({ "version": version }).to_string().into_bytes();
                return HttpResponse::new(200, "application/json", body);
            }
        }

        let Some(path) = self.site.resolve(url) else {
            tracing::debug!(url, "not found");
            return HttpResponse::not_found();
        };
        let body = match std::fs::read(&path) {
            Ok(body) => body,
            Err(e) => {
                tracing::warn!(path = %path.display(), "read failed: {}", e);
                return HttpResponse::not_found();
            }
        };

        let mime = mime_guess::from_path(&path).first_or_octet_stream();
        let is_html = mime.essence_str() == "text/html";
        let body = match (&self.reload, is_html) {
            (Some(hub), true) => {
                let html = String::from_utf8_lossy(&body);
                inject(&html, &client_script(hub.version())).into_bytes()
            }
            _ => body,
        };
        let content_type = if mime.type_() == mime_guess::mime::TEXT
            || mime.essence_str() == "application/javascript"
        {
            format!("{}; charset=utf-8", mime.essence_str())
        } else {
            mime.essence_str().to_string()
        };

        HttpResponse::new(200, content_type, body)
    }

    /// Build the response for any request method.
    ///
    /// `HEAD` keeps the status, type and length of the `GET` response but
    /// carries no body. Other methods besides `GET` are refused.
    pub fn respond_to(&self, method: &Method, url: &str) -> HttpResponse {
        match method {
            Method::Get => self.respond(url),
            Method::Head => {
                let mut response = self.respond(url);
                response.body.clear();
                response
            }
            _ => HttpResponse::text(405, "Method Not Allowed"),
        }
    }

    /// Answer one request on the transport.
    pub fn handle(&self, request: Request) {
        let response = self.respond_to(request.method(), request.url());
        tracing::debug!(method = %request.method(), url = request.url(), status = response.status);

        let mut reply = Response::new(
            StatusCode(response.status),
            Vec::new(),
            Cursor::new(response.body),
            Some(response.content_length),
            None,
        );
        if let Ok(header) = Header::from_bytes(&b"Content-Type"[..], response.content_type.as_bytes()) {
            reply = reply.with_header(header);
        }
        if let Ok(header) = Header::from_bytes(&b"Cache-Control"[..], &b"no-cache"[..]) {
            reply = reply.with_header(header);
        }
        if let Err(e) = request.respond(reply) {
            tracing::debug!("client went away: {}", e);
        }
    }
}

/// Bind a listening socket.
pub fn bind(host: &str, port: u16) -> Result<tiny_http::Server, ServerError> {
    let addr = format!("{}:{}", host, port);
    tiny_http::Server::http(&addr)
        .map_err(|e| ServerError::Bind { addr: addr.clone(), message: e.to_string() })
}

/// Browser URL for a bound server.
pub fn server_url(server: &tiny_http::Server, host: &str) -> String {
    match server.server_addr().to_ip() {
        Some(addr) => format!("http://{}:{}", host, addr.port()),
        None => format!("http://{}", host),
    }
}

/// Serve requests until the server is unblocked.
pub fn serve(server: Arc<tiny_http::Server>, handler: Arc<SiteHandler>) {
    for request in server.incoming_requests() {
        let handler = Arc::clone(&handler);
        std::thread::spawn(move || handler.handle(request));
    }
}

/// Open `url` in the default browser, logging failures.
pub fn open_browser(url: &str) {
    if let Err(e) = open::that(url) {
        tracing::warn!("could not open a browser for {}: {}", url, e);
    }
}
