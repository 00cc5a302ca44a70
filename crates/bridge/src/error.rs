use std::io;
use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("invalid endpoint '{0}', expected host[:port]")]
    InvalidEndpoint(String),

    #[error("cannot connect to {addr}: {source}")]
    Connect {
        addr: String,
        #[source]
        source: io::Error,
    },

    #[error("cannot open device {}: {source}", .path.display())]
    OpenDevice {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot open logfile {}: {source}", .path.display())]
    LogFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("read error: {0}")]
    Read(#[source] io::Error),

    #[error("write error: {0}")]
    Write(#[source] io::Error),

    #[error("logfile write error: {0}")]
    LogWrite(#[source] io::Error),
}
