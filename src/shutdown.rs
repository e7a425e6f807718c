use std::fmt;
use std::io;

use tokio::signal::unix::{signal, SignalKind};

/// Termination request received from the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminationSignal {
    Interrupt,
    Terminate,
}

impl fmt::Display for TerminationSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TerminationSignal::Interrupt => write!(f, "SIGINT"),
            TerminationSignal::Terminate => write!(f, "SIGTERM"),
        }
    }
}

/// Wait for SIGTERM or SIGINT and report which one arrived.
///
/// The host decides what to do with it; the usual reaction is a graceful
/// `JobQueue::shutdown` followed by `force_shutdown` if that times out.
pub async fn wait_for_termination() -> io::Result<TerminationSignal> {
    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;

    let received = tokio::select! {
        _ = sigterm.recv() => TerminationSignal::Terminate,
        _ = sigint.recv() => TerminationSignal::Interrupt,
    };

    tracing::info!(signal = %received, "Received termination signal");
    Ok(received)
}
