//! Live reload signalling.
//!
//! The hub keeps a version counter. Every reload bumps it and wakes the
//! browsers long-polling [`LIVERELOAD_PATH`]; the injected client reloads
//! the page as soon as the version it sees differs from the one it loaded
//! with.

use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

/// Long-poll endpoint served by the dev server.
pub const LIVERELOAD_PATH: &str = "/__livereload";

/// How long a poll request is held open without a reload.
pub const POLL_TIMEOUT: Duration = Duration::from_secs(25);

/// Shared reload counter.
#[derive(Debug, Default)]
pub struct ReloadHub {
    version: Mutex<u64>,
    changed: Condvar,
}

impl ReloadHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current version; starts at zero.
    pub fn version(&self) -> u64 {
        self.version.lock().map(|v| *v).unwrap_or_else(|poisoned| *poisoned.into_inner())
    }

    /// Signal connected browsers to reload. Returns the new version.
    pub fn reload(&self) -> u64 {
        let mut version = match self.version.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        *version += 1;
        self.changed.notify_all();
        tracing::debug!(version = *version, "reload");
        *version
    }

    /// Block until the version differs from `since` or `timeout` elapses.
    pub fn wait_newer(&self, since: u64, timeout: Duration) -> u64 {
        let deadline = Instant::now() + timeout;
        let mut version = match self.version.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        while *version == since {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }
            version = match self.changed.wait_timeout(version, remaining) {
                Ok((guard, _)) => guard,
                Err(poisoned) => poisoned.into_inner().0,
            };
        }
        *version
    }
}

/// Browser client polling the hub.
pub fn client_script(version: u64) -> String {
    format!(
        r#"<script>
(function () {{
  var version = {version};
  function poll() {{
    fetch('{path}?since=' + version, {{ cache: 'no-store' }})
      .then(function (res) {{ return res.json(); }})
      .then(function (data) {{
        if (data.version !== version) {{ location.reload(); return; }}
        poll();
      }})
      .catch(function () {{ setTimeout(poll, 1000); }});
  }}
  poll();
}})();
</script>
"#,
        version = version,
        path = LIVERELOAD_PATH
    )
}

/// Insert `script` before the closing `</body>`, or append it.
pub fn inject(html: &str, script: &str) -> String {
    let lower = html.to_ascii_lowercase();
    match lower.rfind("</body>") {
        Some(at) => {
            let mut out = String::with_capacity(html.len() + script.len());
            out.push_str(&html[..at]);
            out.push_str(script);
            out.push_str(&html[at..]);
            out
        }
        None => format!("{}{}", html, script),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_reload_bumps_version() {
        let hub = ReloadHub::new();
        assert_eq!(hub.version(), 0);
        assert_eq!(hub.reload(), 1);
        assert_eq!(hub.reload(), 2);
        assert_eq!(hub.version(), 2);
    }

    #[test]
    fn test_wait_newer_returns_immediately_when_stale() {
        let hub = ReloadHub::new();
        hub.reload();
        assert_eq!(hub.wait_newer(0, Duration::from_secs(5)), 1);
    }

    #[test]
    fn test_wait_newer_times_out() {
        let hub = ReloadHub::new();
        assert_eq!(hub.wait_newer(0, Duration::from_millis(20)), 0);
    }

    #[test]
    fn test_wait_newer_wakes_on_reload() {
        let hub = Arc::new(ReloadHub::new());
        let waiter = {
            let hub = Arc::clone(&hub);
            thread::spawn(move || hub.wait_newer(0, Duration::from_secs(10)))
        };
        thread::sleep(Duration::from_millis(20));
        hub.reload();
        assert_eq!(waiter.join().unwrap(), 1);
    }

    #[test]
    fn test_inject_before_body_close() {
        let html = "<html><BODY><p>x</p></BODY></html>";
        let out = inject(html, "<script></script>");
        assert_eq!(out, "<html><BODY><p>x</p><script></script></BODY></html>");
    }

    #[test]
    fn test_inject_appends_without_body() {
        assert_eq!(inject("<p>x</p>", "<s>"), "<p>x</p><s>");
    }

    #[test]
    fn test_client_script_polls_endpoint() {
        let script = client_script(3);
        assert!(script.contains("var version = 3;"));
        assert!(script.contains("/__livereload?since="));
    }
}
