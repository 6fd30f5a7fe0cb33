//! Output sinks for the dispatcher's own messages.

use std::io::Write;
use std::sync::Arc;

use parking_lot::Mutex;

/// Where help, version and error reports are written.
pub trait Console: Send + Sync {
    /// Write a line to standard output.
    fn out(&self, text: &str);
    /// Write a line to standard error.
    fn err(&self, text: &str);
}

/// Process stdout/stderr.
#[derive(Debug, Clone, Copy, Default)]
pub struct StdConsole;

impl Console for StdConsole {
    fn out(&self, text: &str) {
        let _ = writeln!(std::io::stdout().lock(), "{text}");
    }

    fn err(&self, text: &str) {
        let _ = writeln!(std::io::stderr().lock(), "{text}");
    }
}

/// In-memory console capturing both streams.
#[derive(Debug, Clone, Default)]
pub struct BufferConsole {
    out: Arc<Mutex<String>>,
    err: Arc<Mutex<String>>,
}

impl BufferConsole {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn stdout(&self) -> String {
        self.out.lock().clone()
    }

    pub fn stderr(&self) -> String {
        self.err.lock().clone()
    }
}

impl Console for BufferConsole {
    fn out(&self, text: &str) {
        let mut out = self.out.lock();
        out.push_str(text);
        out.push('\n');
    }

    fn err(&self, text: &str) {
        let mut err = self.err.lock();
        err.push_str(text);
        err.push('\n');
    }
}
