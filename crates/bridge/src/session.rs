use std::future::Future;
use std::path::PathBuf;

use observability::Direction;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::mpsc;

use crate::error::BridgeError;
use crate::inbound::InboundPump;
use crate::outbound::{OutboundEnd, OutboundPump};
use crate::DEFAULT_BUFFER_SIZE;

/// How a session ended without error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionEnd {
    /// The peer closed the connection.
    PeerClosed,
    /// Terminal input reached EOF.
    LocalEof,
    /// The user typed the quit escape.
    Quit,
    /// A shutdown signal arrived.
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SessionConfig {
    pub buffer_size: usize,
    /// Strip telnet commands from inbound data.
    pub telnet: bool,
    /// Double 0xff in outbound data.
    pub escape_outbound_iac: bool,
    /// `None` disables the quit escape.
    pub escape_char: Option<u8>,
    pub answerback: Option<String>,
    pub logfile: Option<PathBuf>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            telnet: true,
            escape_outbound_iac: false,
            escape_char: None,
            answerback: None,
            logfile: None,
        }
    }
}

/// Run both directions until one ends or `shutdown` completes.
///
/// `terminal_in` is `None` in listen-only mode. Whatever ends first ends the
/// whole session; the other direction is dropped.
pub async fn run_session<NR, NW, TR, TW, S>(
    network_rx: NR,
    network_tx: NW,
    terminal_in: Option<TR>,
    terminal_out: TW,
    config: &SessionConfig,
    shutdown: S,
) -> Result<SessionEnd, BridgeError>
where
    NR: AsyncRead + Unpin,
    NW: AsyncWrite + Unpin,
    TR: AsyncRead + Unpin,
    TW: AsyncWrite + Unpin,
    S: Future<Output = ()>,
{
    let (reply_tx, reply_rx) = mpsc::unbounded_channel();
    let (console_tx, console_rx) = mpsc::unbounded_channel();

    let mut inbound = InboundPump::new()
        .buffer_size(config.buffer_size)
        .telnet(config.telnet)
        .console(console_rx);
    if let Some(text) = &config.answerback {
        inbound = inbound.answerback(text, reply_tx);
    }
    if let Some(path) = &config.logfile {
        let log = tokio::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(path)
            .await
            .map_err(|source| BridgeError::LogFile {
                path: path.clone(),
                source,
            })?;
        inbound = inbound.log_to(log);
    }

    let outbound = OutboundPump::new()
        .buffer_size(config.buffer_size)
        .escape_char(config.escape_char)
        .escape_iac(config.escape_outbound_iac)
        .telnet(config.telnet)
        .console(console_tx);

    let inbound = inbound.run(network_rx, terminal_out);
    let outbound = outbound.run(terminal_in, network_tx, reply_rx);
    tokio::pin!(inbound, outbound, shutdown);

    tokio::select! {
        res = &mut inbound => {
            let stats = res?;
            stats.log(Direction::Inbound);
            tracing::info!("connection closed by peer");
            Ok(SessionEnd::PeerClosed)
        }
        res = &mut outbound => {
            let (end, stats) = res?;
            stats.log(Direction::Outbound);
            Ok(match end {
                OutboundEnd::Eof => SessionEnd::LocalEof,
                OutboundEnd::Quit => SessionEnd::Quit,
            })
        }
        _ = &mut shutdown => {
            tracing::info!("session interrupted by shutdown");
            Ok(SessionEnd::Shutdown)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::future::pending;
    use telnet::{DO, IAC, WILL};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::sync::oneshot;

    #[tokio::test]
    async fn peer_close_ends_session() {
        let (mut peer, local) = tokio::io::duplex(1024);
        let (net_rx, net_tx) = tokio::io::split(local);
        let (_keyboard, term_in) = tokio::io::duplex(64);
        let (term_out, mut screen) = tokio::io::duplex(1024);

        let config = SessionConfig::default();
        let session = tokio::spawn(async move {
            run_session(net_rx, net_tx, Some(term_in), term_out, &config, pending()).await
        });

        peer.write_all(&[b'o', IAC, WILL, 1, b'k']).await.unwrap();
        drop(peer);

        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::PeerClosed);
        let mut shown = Vec::new();
        screen.read_to_end(&mut shown).await.unwrap();
        assert_eq!(shown, b"ok");
    }

    #[tokio::test]
    async fn keyboard_reaches_peer_and_quit_ends_session() {
        let (mut peer, local) = tokio::io::duplex(1024);
        let (net_rx, net_tx) = tokio::io::split(local);
        let (mut keyboard, term_in) = tokio::io::duplex(64);
        let (term_out, _screen) = tokio::io::duplex(1024);

        let config = SessionConfig {
            escape_char: Some(0x1c),
            ..Default::default()
        };
        let session = tokio::spawn(async move {
            run_session(net_rx, net_tx, Some(term_in), term_out, &config, pending()).await
        });

        keyboard.write_all(b"ls\r").await.unwrap();
        let mut buf = [0u8; 3];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"ls\r");

        keyboard.write_all(&[0x1c, b'q']).await.unwrap();
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Quit);
    }

    #[tokio::test]
    async fn local_eof_ends_session() {
        let (_peer, local) = tokio::io::duplex(1024);
        let (net_rx, net_tx) = tokio::io::split(local);
        let (keyboard, term_in) = tokio::io::duplex(64);
        let (term_out, _screen) = tokio::io::duplex(1024);
        drop(keyboard);

        let end = run_session(
            net_rx,
            net_tx,
            Some(term_in),
            term_out,
            &SessionConfig::default(),
            pending(),
        )
        .await
        .unwrap();
        assert_eq!(end, SessionEnd::LocalEof);
    }

    #[tokio::test]
    async fn shutdown_signal_ends_session() {
        let (stx, srx) = oneshot::channel::<()>();
        let (_peer, local) = tokio::io::duplex(1024);
        let (net_rx, net_tx) = tokio::io::split(local);
        let (term_out, _screen) = tokio::io::duplex(1024);

        let session = tokio::spawn(async move {
            run_session(
                net_rx,
                net_tx,
                None::<tokio::io::Empty>,
                term_out,
                &SessionConfig::default(),
                async {
                    let _ = srx.await;
                },
            )
            .await
        });

        stx.send(()).unwrap();
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::Shutdown);
    }

    #[tokio::test]
    async fn answerback_goes_back_to_peer() {
        let (mut peer, local) = tokio::io::duplex(1024);
        let (net_rx, net_tx) = tokio::io::split(local);
        let (term_out, _screen) = tokio::io::duplex(1024);

        let config = SessionConfig {
            answerback: Some("unit42".to_string()),
            ..Default::default()
        };
        let session = tokio::spawn(async move {
            run_session(net_rx, net_tx, None::<tokio::io::Empty>, term_out, &config, pending()).await
        });

        peer.write_all(&[IAC, DO, 3, 0x05]).await.unwrap();
        let mut buf = [0u8; 7];
        peer.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"unit42\n");
        session.abort();
    }

    #[tokio::test]
    async fn logfile_open_failure_is_reported() {
        let (_peer, local) = tokio::io::duplex(16);
        let (net_rx, net_tx) = tokio::io::split(local);
        let config = SessionConfig {
            logfile: Some("/nonexistent/dir/bridge.log".into()),
            ..Default::default()
        };
        let result = run_session(
            net_rx,
            net_tx,
            None::<tokio::io::Empty>,
            tokio::io::sink(),
            &config,
            pending(),
        )
        .await;
        assert!(matches!(result, Err(BridgeError::LogFile { .. })));
    }

    #[tokio::test]
    async fn menu_holds_peer_output_until_exit() {
        let (mut peer, local) = tokio::io::duplex(1024);
        let (net_rx, net_tx) = tokio::io::split(local);
        let (mut keyboard, term_in) = tokio::io::duplex(64);
        let (term_out, mut screen) = tokio::io::duplex(4096);

        let config = SessionConfig {
            escape_char: Some(0x1c),
            ..Default::default()
        };
        let session = tokio::spawn(async move {
            run_session(net_rx, net_tx, Some(term_in), term_out, &config, pending()).await
        });

        keyboard.write_all(&[0x1c, b'c']).await.unwrap();
        let mut banner = vec![0u8; crate::menu::MENU_BANNER.len() + crate::menu::PROMPT.len()];
        screen.read_exact(&mut banner).await.unwrap();
        assert!(banner.starts_with(crate::menu::MENU_BANNER.as_bytes()));

        // Arrives while the menu is open; shown only after it closes.
        peer.write_all(b"boot").await.unwrap();
        keyboard.write_all(b"exit\r").await.unwrap();

        let mut rest = vec![0u8; "exit\r\n".len() + crate::menu::MENU_FOOTER.len() + 4];
        screen.read_exact(&mut rest).await.unwrap();
        assert!(rest.ends_with(b"boot"));

        drop(peer);
        assert_eq!(session.await.unwrap().unwrap(), SessionEnd::PeerClosed);
    }
}
