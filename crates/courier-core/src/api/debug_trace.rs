//! Debug trace helpers for raw request/response capture.
//!
//! Enabled with `COURIER_DEBUG_TRACE=1` (temp dir) or `COURIER_DEBUG_TRACE=<dir>`.
//! Only bodies are written, never headers. Unauthenticated calls (login and
//! refresh) carry passwords and tokens in their bodies and are not traced at all.
//! Trace files are created owner-only (0600 on Unix).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

pub const DEBUG_TRACE_ENV: &str = "COURIER_DEBUG_TRACE";

static TRACE_COUNTER: AtomicUsize = AtomicUsize::new(0);

#[derive(Debug, Clone)]
pub struct DebugTrace {
    id: String,
    dir: PathBuf,
}

impl DebugTrace {
    /// Returns `None` unless tracing is enabled and the call is authenticated.
    pub fn from_env(method: &str, path: &str, authenticated: bool) -> Option<Self> {
        if !authenticated {
            return None;
        }
        let raw = std::env::var(DEBUG_TRACE_ENV).ok()?;
        Self::in_dir(&raw, method, path)
    }

    fn in_dir(setting: &str, method: &str, path: &str) -> Option<Self> {
        let trimmed = setting.trim();
        if trimmed.is_empty() {
            return None;
        }

        let dir = if trimmed == "1" || trimmed.eq_ignore_ascii_case("true") {
            std::env::temp_dir().join("courier-trace")
        } else {
            PathBuf::from(trimmed)
        };

        if fs::create_dir_all(&dir).is_err() {
            return None;
        }

        let mut safe = format!("{method}{path}")
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .collect::<String>();
        if safe.len() > 48 {
            safe.truncate(48);
        }

        let ts = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis())
            .unwrap_or(0);
        let counter = TRACE_COUNTER.fetch_add(1, Ordering::Relaxed);
        let id = format!("{safe}_{ts}_{counter}");

        Some(Self { id, dir })
    }

    pub fn write_request(&self, body: &[u8]) {
        write_file(&self.request_path(), body);
    }

    pub fn write_response(&self, status: u16, body: &[u8]) {
        let mut contents = format!("HTTP {status}\n\n").into_bytes();
        contents.extend_from_slice(body);
        write_file(&self.response_path(), &contents);
    }

    fn request_path(&self) -> PathBuf {
        self.dir.join(format!("{}_request.json", self.id))
    }

    fn response_path(&self) -> PathBuf {
        self.dir.join(format!("{}_response.txt", self.id))
    }
}

/// Tracing is best effort; a failed write must not disturb the request.
fn write_file(path: &Path, contents: &[u8]) {
    let mut options = OpenOptions::new();
    options.write(true).create(true).truncate(true);
    #[cfg(unix)]
    {
        use std::os::unix::fs::OpenOptionsExt;
        options.mode(0o600);
    }
    if let Ok(mut file) = options.open(path) {
        let _ = file.write_all(contents);
        let _ = file.flush();
    }
}
