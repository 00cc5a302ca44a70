//! Bridges a network peer (or a local device) to the local terminal.
//!
//! Each direction is a separate pump owning its own state:
//! - inbound: peer -> terminal, telnet commands stripped in telnet mode,
//! - outbound: terminal -> peer, raw bytes with escape-key handling and
//!   the command menu.
//!
//! [`run_session`] drives both until either side ends.

pub mod endpoint;
pub mod error;
pub mod escape;
pub mod inbound;
pub mod menu;
pub mod outbound;
pub mod serial;
pub mod session;

pub use endpoint::{Connection, Endpoint};
pub use error::BridgeError;
pub use escape::{EscapeFilter, KeyAction};
pub use inbound::InboundPump;
pub use outbound::{OutboundEnd, OutboundPump};
pub use serial::SerialLine;
pub use session::{run_session, SessionConfig, SessionEnd};

use tokio::sync::mpsc;

/// Bytes the inbound side wants sent back to the peer (answerback).
pub type ReplyTx = mpsc::UnboundedSender<Vec<u8>>;
pub type ReplyRx = mpsc::UnboundedReceiver<Vec<u8>>;

/// From the keyboard side to the side that owns the terminal output.
#[derive(Debug)]
pub enum ConsoleMsg {
    /// Text for the local terminal only, never logged.
    Print(Vec<u8>),
    /// Log received data to this file from now on.
    LogTo(tokio::fs::File),
    /// Stop (`true`) or resume showing peer data while the menu is open.
    Hold(bool),
}

pub type ConsoleTx = mpsc::UnboundedSender<ConsoleMsg>;
pub type ConsoleRx = mpsc::UnboundedReceiver<ConsoleMsg>;

/// Read size used by both pumps unless configured otherwise.
pub const DEFAULT_BUFFER_SIZE: usize = 1024;
