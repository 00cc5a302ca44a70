use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. `RUST_LOG` wins over `default_directive`.
///
/// Logs always go to stderr: stdout carries the bridged terminal data.
pub fn init_logging(default_directive: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directive));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Which way bytes flow through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    /// Network peer to local terminal.
    Inbound,
    /// Local terminal to network peer.
    Outbound,
}

impl Direction {
    pub fn as_str(self) -> &'static str {
        match self {
            Direction::Inbound => "inbound",
            Direction::Outbound => "outbound",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransferStats {
    pub chunks: u64,
    pub bytes_in: u64,
    pub bytes_out: u64,
    /// Telnet commands stripped from the stream.
    pub commands: u64,
    /// Bytes of an unfinished command discarded at end of stream.
    pub dropped_at_eof: u64,
}

impl TransferStats {
    pub fn record_chunk(&mut self, read: usize, written: usize) {
        self.chunks += 1;
        self.bytes_in += read as u64;
        self.bytes_out += written as u64;
    }

    pub fn log(&self, direction: Direction) {
        if self.dropped_at_eof > 0 {
            tracing::warn!(
                direction = direction.as_str(),
                dropped = self.dropped_at_eof,
                "stream ended inside a telnet command"
            );
        }
        tracing::info!(
            direction = direction.as_str(),
            chunks = self.chunks,
            bytes_in = self.bytes_in,
            bytes_out = self.bytes_out,
            commands = self.commands,
            "transfer finished"
        );
    }
}
