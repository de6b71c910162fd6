//! Signal-to-intent mapping

use std::fmt;

/// Signals the daemon may take over from the default disposition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ShutdownSignal {
    /// SIGTERM
    Terminate,
    /// SIGINT
    Interrupt,
    /// SIGHUP
    Hangup,
}

impl ShutdownSignal {
    /// Every signal the policy knows about
    pub const ALL: [Self; 3] = [Self::Terminate, Self::Interrupt, Self::Hangup];

    /// Conventional signal name
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Terminate => "SIGTERM",
            Self::Interrupt => "SIGINT",
            Self::Hangup => "SIGHUP",
        }
    }
}

impl fmt::Display for ShutdownSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// What a delivered signal asks the daemon to do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownIntent {
    /// Termination or interrupt: tear down and exit 0
    Graceful { signal: ShutdownSignal },
    /// Hangup of a detached daemon: same teardown, same exit status
    Hangup,
}

impl ShutdownIntent {
    /// The signal behind this intent
    #[must_use]
    pub const fn signal(self) -> ShutdownSignal {
        match self {
            Self::Graceful { signal } => signal,
            Self::Hangup => ShutdownSignal::Hangup,
        }
    }

    /// One-line notice for the diagnostic stream
    #[must_use]
    pub fn notice(self) -> String {
        format!("tokenkeeper: received {}, shutting down", self.signal())
    }
}

/// How a signal is handled
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalDisposition {
    /// Route to the shutdown dispatcher
    Shutdown(ShutdownIntent),
    /// Leave the operating system's default action in place
    Default,
}

/// Disposition of `signal` for a process that is (or is not) daemonized.
///
/// SIGTERM and SIGINT always shut down gracefully. SIGHUP shuts down only
/// when detached; an attached process keeps the default so closing the
/// terminal behaves as usual.
#[must_use]
pub const fn signal_disposition(signal: ShutdownSignal, daemonized: bool) -> SignalDisposition {
    match signal {
        ShutdownSignal::Terminate | ShutdownSignal::Interrupt => {
            SignalDisposition::Shutdown(ShutdownIntent::Graceful { signal })
        }
        ShutdownSignal::Hangup if daemonized => SignalDisposition::Shutdown(ShutdownIntent::Hangup),
        ShutdownSignal::Hangup => SignalDisposition::Default,
    }
}
