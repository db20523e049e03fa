use std::fmt;

/// Severity of a reported failure.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Execution continues.
    Warning,
    /// Unrecoverable programmer error. Aborts unless a callback is installed.
    Critical,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Warning => f.write_str("warning"),
            Severity::Critical => f.write_str("critical"),
        }
    }
}

/// Callback receiving every report.
pub type ErrorCallback = Box<dyn FnMut(Severity, &str)>;

/// Routes warnings and critical errors.
///
/// Without a callback, reports go to the `log` facade and a `Critical` report
/// aborts the process. With a callback installed, the callback owns the decision
/// and execution continues; the failing operation is then a no-op.
#[derive(Default)]
pub struct ErrorReporter {
    callback: Option<ErrorCallback>,
}

impl ErrorReporter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_callback(&mut self, callback: Option<ErrorCallback>) {
        self.callback = callback;
    }

    pub fn report(&mut self, severity: Severity, message: &str) {
        if let Some(cb) = self.callback.as_mut() {
            cb(severity, message);
            return;
        }

        match severity {
            Severity::Warning => log::warn!("{message}"),
            Severity::Critical => {
                log::error!("{message}");
                std::process::abort();
            }
        }
    }

    #[inline]
    pub fn warn(&mut self, message: &str) {
        self.report(Severity::Warning, message);
    }

    #[inline]
    pub fn critical(&mut self, message: &str) {
        self.report(Severity::Critical, message);
    }
}

impl fmt::Debug for ErrorReporter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ErrorReporter")
            .field("callback", &self.callback.is_some())
            .finish()
    }
}
