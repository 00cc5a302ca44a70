use std::io::{self, ErrorKind};

use observability::TransferStats;
use telnet::{BRK, IAC};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::BridgeError;
use crate::escape::{EscapeFilter, KeyAction};
use crate::menu::{self, MenuCommand, MENU_BANNER, MENU_FOOTER, PROMPT};
use crate::{ConsoleMsg, ConsoleTx, ReplyRx, DEFAULT_BUFFER_SIZE};

/// Why the outbound side stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundEnd {
    /// Terminal input closed.
    Eof,
    /// The user typed the escape sequence for quit.
    Quit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Flow {
    Continue,
    Quit,
}

/// Terminal -> peer direction, plus answerback replies from the inbound side.
pub struct OutboundPump {
    buffer_size: usize,
    escape: Option<EscapeFilter>,
    escape_iac: bool,
    telnet: bool,
    console: Option<ConsoleTx>,
    stats: TransferStats,
}

impl OutboundPump {
    pub fn new() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            escape: None,
            escape_iac: false,
            telnet: false,
            console: None,
            stats: TransferStats::default(),
        }
    }

    pub fn buffer_size(mut self, size: usize) -> Self {
        self.buffer_size = size.max(1);
        self
    }

    /// Watch for `<escape_char> q` and `<escape_char> c` in the keyboard input.
    pub fn escape_char(mut self, escape_char: Option<u8>) -> Self {
        self.escape = escape_char.map(EscapeFilter::new);
        self
    }

    /// Double literal 0xff bytes typed on the terminal.
    pub fn escape_iac(mut self, on: bool) -> Self {
        self.escape_iac = on;
        self
    }

    /// Peer speaks telnet; the menu's `break` sends IAC BRK.
    pub fn telnet(mut self, on: bool) -> Self {
        self.telnet = on;
        self
    }

    /// Where menu output goes.
    pub fn console(mut self, console: ConsoleTx) -> Self {
        self.console = Some(console);
        self
    }

    /// Pump until terminal EOF or quit. With no terminal (listen-only) only
    /// replies are forwarded and this never returns on its own.
    pub async fn run<R, W>(
        mut self,
        mut terminal: Option<R>,
        mut peer: W,
        mut replies: ReplyRx,
    ) -> Result<(OutboundEnd, TransferStats), BridgeError>
    where
        R: AsyncRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut buf = vec![0u8; self.buffer_size];
        let terminal_open = terminal.is_some();
        let mut replies_open = true;

        loop {
            tokio::select! {
                res = read_from(terminal.as_mut(), &mut buf), if terminal_open => {
                    let n = match res {
                        Ok(0) => return Ok((OutboundEnd::Eof, self.stats)),
                        Ok(n) => n,
                        Err(e) if e.kind() == ErrorKind::Interrupted => continue,
                        Err(e) => return Err(BridgeError::Read(e)),
                    };

                    let actions = match self.escape.as_mut() {
                        Some(filter) => filter.feed(&buf[..n]),
                        None => vec![KeyAction::Send(buf[..n].to_vec())],
                    };

                    let mut sent = 0;
                    let mut flow = Flow::Continue;
                    for action in actions {
                        match action {
                            KeyAction::Send(data) => sent += self.forward(&mut peer, data).await?,
                            action => flow = self.key_action(action, &mut peer).await?,
                        }
                        if flow == Flow::Quit {
                            break;
                        }
                    }
                    self.stats.record_chunk(n, sent);

                    if flow == Flow::Quit {
                        tracing::info!("quit requested from terminal");
                        return Ok((OutboundEnd::Quit, self.stats));
                    }
                }
                reply = replies.recv(), if replies_open => {
                    match reply {
                        Some(reply) => {
                            tracing::debug!(len = reply.len(), "sending answerback");
                            send(&mut peer, &reply).await?;
                        }
                        None => replies_open = false,
                    }
                }
                else => std::future::pending::<()>().await,
            }
        }
    }

    async fn forward<W>(&self, peer: &mut W, data: Vec<u8>) -> Result<usize, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let data = if self.escape_iac {
            telnet::escape_iac(&data).into_owned()
        } else {
            data
        };
        send(peer, &data).await?;
        Ok(data.len())
    }

    async fn key_action<W>(&mut self, action: KeyAction, peer: &mut W) -> Result<Flow, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        match action {
            KeyAction::Send(data) => {
                self.forward(peer, data).await?;
            }
            KeyAction::Echo(text) => self.print(text),
            KeyAction::EnterMenu => {
                tracing::debug!("command menu opened");
                self.hold(true);
                self.print(format!("{}{}", MENU_BANNER, PROMPT));
            }
            KeyAction::Prompt => self.print(PROMPT),
            KeyAction::LeaveMenu => {
                self.print(MENU_FOOTER);
                self.hold(false);
            }
            KeyAction::Run(MenuCommand::Execute(path)) => return self.run_script(&path, peer).await,
            KeyAction::Run(command) => return self.run_command(command, peer).await,
            KeyAction::Quit => return Ok(Flow::Quit),
        }
        Ok(Flow::Continue)
    }

    /// Run every command in `path`, stopping at the first one that would
    /// close the menu.
    async fn run_script<W>(&mut self, path: &str, peer: &mut W) -> Result<Flow, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        let script = match tokio::fs::read_to_string(path).await {
            Ok(script) => script,
            Err(e) => {
                self.print(format!("could not open {}: {}\r\n", path, e));
                return Ok(Flow::Continue);
            }
        };
        tracing::info!(script = path, "running script");

        for line in script.lines() {
            let commands = match menu::parse_line(line) {
                Ok(commands) => commands,
                Err(e) => {
                    self.print(format!("{}\r\n", e));
                    continue;
                }
            };
            for command in commands {
                let leaves = command.leaves_menu();
                if self.run_command(command, peer).await? == Flow::Quit {
                    return Ok(Flow::Quit);
                }
                if leaves {
                    return Ok(Flow::Continue);
                }
            }
        }
        Ok(Flow::Continue)
    }

    async fn run_command<W>(&mut self, command: MenuCommand, peer: &mut W) -> Result<Flow, BridgeError>
    where
        W: AsyncWrite + Unpin,
    {
        match command {
            MenuCommand::Help(None) => self.print(menu::help_text()),
            MenuCommand::Help(Some(name)) => self.print(menu::usage(&name)),
            MenuCommand::Exit | MenuCommand::Comment => {}
            MenuCommand::Quit => return Ok(Flow::Quit),
            MenuCommand::Break if self.telnet => {
                tracing::debug!("sending break");
                send(peer, &[IAC, BRK]).await?;
            }
            MenuCommand::Break => self.print("break is only supported in telnet mode\r\n"),
            MenuCommand::Log(path) => {
                let opened = tokio::fs::OpenOptions::new()
                    .create(true)
                    .append(true)
                    .open(&path)
                    .await;
                match opened {
                    Ok(file) => {
                        tracing::info!(logfile = %path, "logging received data");
                        self.send_console(ConsoleMsg::LogTo(file));
                    }
                    Err(e) => self.print(format!("cannot open logfile {}: {}\r\n", path, e)),
                }
            }
            MenuCommand::Execute(_) => self.print("scripts cannot run other scripts\r\n"),
            MenuCommand::Usage(name) => self.print(menu::usage(name)),
            MenuCommand::Unsupported(name) => {
                self.print(format!("{}: serial line settings are not supported\r\n", name))
            }
            MenuCommand::Unknown(name) => {
                self.print(format!("unknown command '{}', try 'help'\r\n", name))
            }
        }
        Ok(Flow::Continue)
    }

    fn print(&self, text: impl Into<Vec<u8>>) {
        self.send_console(ConsoleMsg::Print(text.into()));
    }

    fn hold(&self, on: bool) {
        self.send_console(ConsoleMsg::Hold(on));
    }

    fn send_console(&self, msg: ConsoleMsg) {
        match &self.console {
            Some(console) => {
                if console.send(msg).is_err() {
                    tracing::debug!("console message dropped, terminal side gone");
                }
            }
            None => tracing::debug!(?msg, "no console attached"),
        }
    }
}

impl Default for OutboundPump {
    fn default() -> Self {
        Self::new()
    }
}

async fn read_from<R>(reader: Option<&mut R>, buf: &mut [u8]) -> io::Result<usize>
where
    R: AsyncRead + Unpin,
{
    match reader {
        Some(reader) => reader.read(buf).await,
        None => std::future::pending().await,
    }
}

async fn send<W>(peer: &mut W, data: &[u8]) -> Result<(), BridgeError>
where
    W: AsyncWrite + Unpin,
{
    if data.is_empty() {
        return Ok(());
    }
    peer.write_all(data).await.map_err(BridgeError::Write)?;
    peer.flush().await.map_err(BridgeError::Write)
}
