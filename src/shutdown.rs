use std::io;

use tokio::signal::unix::{signal, Signal, SignalKind};

/// SIGINT, SIGTERM, SIGHUP and SIGQUIT. Any of them ends the session
/// cleanly so terminal and serial line settings get restored.
pub struct Signals {
    int: Signal,
    term: Signal,
    hup: Signal,
    quit: Signal,
}

impl Signals {
    pub fn register() -> io::Result<Self> {
        Ok(Self {
            int: signal(SignalKind::interrupt())?,
            term: signal(SignalKind::terminate())?,
            hup: signal(SignalKind::hangup())?,
            quit: signal(SignalKind::quit())?,
        })
    }

    /// Wait for the next one; returns its name.
    pub async fn recv(&mut self) -> &'static str {
        tokio::select! {
            _ = self.int.recv() => "SIGINT",
            _ = self.term.recv() => "SIGTERM",
            _ = self.hup.recv() => "SIGHUP",
            _ = self.quit.recv() => "SIGQUIT",
        }
    }
}

/// Completes when a terminating signal arrives. Never completes if the
/// handlers cannot be installed.
pub async fn terminated() {
    match Signals::register() {
        Ok(mut signals) => {
            let name = signals.recv().await;
            tracing::info!("Received {}", name);
        }
        Err(e) => {
            tracing::warn!("signal handling unavailable: {}", e);
            std::future::pending::<()>().await;
        }
    }
}
