use std::io::ErrorKind;

use observability::TransferStats;
use telnet::IacScanner;
use tokio::fs::File;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::BridgeError;
use crate::{ConsoleMsg, ConsoleRx, ReplyTx, DEFAULT_BUFFER_SIZE};

const ENQ: u8 = 0x05;

/// Peer -> terminal direction.
pub struct InboundPump {
    buffer_size: usize,
    scanner: Option<IacScanner>,
    answerback: Option<(Vec<u8>, ReplyTx)>,
    log: Option<File>,
    console: Option<ConsoleRx>,
    stats: TransferStats,
}

impl InboundPump {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            scanner: None,
            answerback: None,
            log: None,
            console: None,
            stats: TransferStats::default(),
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Strip telnet commands from the stream.
    pub fn telnet(mut self, on: bool) -> Self {
        self.scanner = on.then(IacScanner::new);
        self
    }

    /// Answer every ENQ from the peer with `text` plus a newline. The ENQ
    /// itself is not shown on the terminal.
    pub fn answerback(mut self, text: &str, replies: ReplyTx) -> Self {
        let mut reply = text.as_bytes().to_vec();
        reply.push(b'\n');
        self.answerback = Some((reply, replies));
        self
    }

    /// Append everything shown on the terminal to `log`.
    pub fn log_to(mut self, log: File) -> Self {
        self.log = Some(log);
        self
    }

    /// Also show local messages from the keyboard side (menu output, log
    /// switches, hold while the menu is open).
    pub fn console(mut self, console: ConsoleRx) -> Self {
        self.console = Some(console);
        self
    }

    /// Pump until the peer closes. Every filtered chunk is written out in
    /// full before the next read.
    pub async fn run<R, W>(mut self, mut reader: R, mut terminal: W) -> Result<TransferStats, BridgeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let mut console = self.console.take();
        let mut held = false;

        loop {
            tokio::select! {
                res = reader.read(&mut buf), if !held => {
                    let n = match res {
                        Ok(0) => break,
                        Ok(n) => n,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(BridgeError::Read(e)),
                    };

                    let data = self.filter(&buf[..n]);
                    if !data.is_empty() {
                        show(&mut terminal, &data).await?;
                        if let Some(log) = self.log.as_mut() {
                            log.write_all(&data).await.map_err(BridgeError::LogWrite)?;
                            log.flush().await.map_err(BridgeError::LogWrite)?;
                        }
                    }
                    self.stats.record_chunk(n, data.len());
                }
                msg = next_message(console.as_mut()), if console.is_some() => match msg {
                    Some(ConsoleMsg::Print(text)) => show(&mut terminal, &text).await?,
                    Some(ConsoleMsg::LogTo(file)) => {
                        tracing::info!("logging received data to new file");
                        self.log = Some(file);
                    }
                    Some(ConsoleMsg::Hold(on)) => held = on,
                    None => {
                        console = None;
                        held = false;
                    }
                },
            }
        }

        if let Some(scanner) = self.scanner.as_mut() {
            self.stats.dropped_at_eof = scanner.finish() as u64;
        }
        Ok(self.stats)
    }

    fn filter(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut data = match self.scanner.as_mut() {
            Some(scanner) => {
                let (data, commands) = scanner.feed_with_commands(chunk);
                for command in &commands {
                    tracing::debug!(?command, "telnet command stripped");
                }
                self.stats.commands += commands.len() as u64;
                data
            }
            None => chunk.to_vec(),
        };

        if let Some((reply, replies)) = &self.answerback {
            let before = data.len();
            data.retain(|&b| b != ENQ);
            for _ in data.len()..before {
                if replies.send(reply.clone()).is_err() {
                    tracing::debug!("answerback dropped, outbound side gone");
                }
            }
        }

        data
    }
}

async fn show<W>(terminal: &mut W, data: &[u8]) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    terminal.write_all(data).await.map_err(BridgeError::Write)?;
    terminal.flush().await.map_err(BridgeError::Write)
}

async fn next_message(console: Option<&mut ConsoleRx>) -> Option<ConsoleMsg> {
    match console {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

impl Default for InboundPump {
    fn default() -> Self {
        Self::new()
    }
}
