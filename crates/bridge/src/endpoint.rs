use std::fmt;
use std::path::PathBuf;

use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::BridgeError;
use crate::serial::SerialLine;

pub const DEFAULT_TELNET_PORT: u16 = 23;

/// Where the remote side of the bridge lives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// RFC 2217 / telnet server; inbound data goes through the IAC scanner.
    Telnet { host: String, port: u16 },
    /// Local serial device, bridged as raw bytes.
    Device(PathBuf),
}

/// Opened endpoint, split into independently owned halves.
pub struct Connection {
    pub reader: Box<dyn AsyncRead + Unpin + Send>,
    pub writer: Box<dyn AsyncWrite + Unpin + Send>,
    /// Set for tty devices; dropping it restores the port settings.
    pub line: Option<SerialLine>,
}

impl Endpoint {
    /// Parse `host[:port]`; IPv6 literals need brackets when a port is given.
    pub fn parse_telnet(hostport: &str, default_port: u16) -> Result<Self, BridgeError> {
        let invalid = || BridgeError::InvalidEndpoint(hostport.to_string());

        let (host, port) = if let Some(rest) = hostport.strip_prefix('[') {
            let (host, tail) = rest.split_once(']').ok_or_else(invalid)?;
            match tail {
                "" => (host, None),
                _ => (host, Some(tail.strip_prefix(':').ok_or_else(invalid)?)),
            }
        } else {
            match hostport.rsplit_once(':') {
                // More than one colon without brackets: bare IPv6 address.
                Some((host, _)) if host.contains(':') => (hostport, None),
                Some((host, port)) => (host, Some(port)),
                None => (hostport, None),
            }
        };

        if host.is_empty() {
            return Err(invalid());
        }
        let port = match port {
            Some(p) => p.parse::<u16>().map_err(|_| invalid())?,
            None => default_port,
        };

        Ok(Endpoint::Telnet {
            host: host.to_string(),
            port,
        })
    }

    pub fn is_telnet(&self) -> bool {
        matches!(self, Endpoint::Telnet { .. })
    }

    pub async fn open(&self) -> Result<Connection, BridgeError> {
        match self {
            Endpoint::Telnet { host, port } => {
                let stream = TcpStream::connect((host.as_str(), *port))
                    .await
                    .map_err(|source| BridgeError::Connect {
                        addr: self.to_string(),
                        source,
                    })?;
                if let Err(e) = stream.set_nodelay(true) {
                    tracing::debug!("set_nodelay failed: {}", e);
                }
                if let Ok(peer) = stream.peer_addr() {
                    tracing::info!(%peer, "connected");
                }
                let (reader, writer) = stream.into_split();
                Ok(Connection {
                    reader: Box::new(reader),
                    writer: Box::new(writer),
                    line: None,
                })
            }
            Endpoint::Device(path) => {
                let open_err = |source| BridgeError::OpenDevice {
                    path: path.clone(),
                    source,
                };
                let port = std::fs::OpenOptions::new()
                    .read(true)
                    .write(true)
                    .open(path)
                    .map_err(open_err)?;
                let line = SerialLine::configure(&port).map_err(open_err)?;
                // Separate handle so a blocked read never holds up writes.
                let reader = port.try_clone().map_err(open_err)?;
                tracing::info!(device = %path.display(), tty = line.is_some(), "opened");
                Ok(Connection {
                    reader: Box::new(tokio::fs::File::from_std(reader)),
                    writer: Box::new(tokio::fs::File::from_std(port)),
                    line,
                })
            }
        }
    }
}

impl fmt::Display for Endpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Endpoint::Telnet { host, port } if host.contains(':') => write!(f, "[{}]:{}", host, port),
            Endpoint::Telnet { host, port } => write!(f, "{}:{}", host, port),
            Endpoint::Device(path) => write!(f, "{}", path.display()),
        }
    }
}
