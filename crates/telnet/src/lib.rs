//! Telnet IAC handling for the network side of the bridge.
//!
//! The scanner strips telnet commands (RFC 854/855, RFC 2217 negotiation)
//! from an inbound byte stream and turns `IAC IAC` back into a literal 0xFF.
//! It carries partial commands across reads, so the output never depends on
//! how the stream was chunked.

use std::borrow::Cow;

mod scanner;

pub use scanner::IacScanner;

pub const IAC: u8 = 255;
pub const DONT: u8 = 254;
pub const DO: u8 = 253;
pub const WONT: u8 = 252;
pub const WILL: u8 = 251;
pub const SB: u8 = 250;
pub const GA: u8 = 249;
pub const EL: u8 = 248;
pub const EC: u8 = 247;
pub const AYT: u8 = 246;
pub const AO: u8 = 245;
pub const IP: u8 = 244;
pub const BRK: u8 = 243;
pub const DM: u8 = 242;
pub const NOP: u8 = 241;
pub const SE: u8 = 240;

/// RFC 2217 COM-PORT-OPTION.
pub const COM_PORT_OPTION: u8 = 44;

/// How many bytes a command occupies once its opcode is known.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CommandShape {
    /// Total length including the leading IAC.
    Fixed(u8),
    /// `IAC SB <option> ... IAC SE`
    Subnegotiation,
}

impl CommandShape {
    pub fn of(opcode: u8) -> Self {
        match opcode {
            WILL | WONT | DO | DONT => CommandShape::Fixed(3),
            SB => CommandShape::Subnegotiation,
            // NOP, GA, BRK, ... and anything below SE: IAC + opcode
            _ => CommandShape::Fixed(2),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verb {
    Will,
    Wont,
    Do,
    Dont,
}

impl Verb {
    pub fn from_byte(b: u8) -> Option<Self> {
        match b {
            WILL => Some(Verb::Will),
            WONT => Some(Verb::Wont),
            DO => Some(Verb::Do),
            DONT => Some(Verb::Dont),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Verb::Will => WILL,
            Verb::Wont => WONT,
            Verb::Do => DO,
            Verb::Dont => DONT,
        }
    }
}

/// A command the scanner removed from the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// `IAC <verb> <option>`
    Negotiate { verb: Verb, option: u8 },
    /// `IAC SB <option> ... IAC SE`. `len` counts payload bytes after unescaping.
    /// `complete` is false when the block was cut short by another command.
    Subnegotiation {
        option: u8,
        len: usize,
        complete: bool,
    },
    /// Any two byte command (NOP, GA, BRK, ...).
    Other(u8),
}

/// Double every 0xFF so the peer reads it back as a literal byte.
pub fn escape_iac(data: &[u8]) -> Cow<'_, [u8]> {
    if !data.contains(&IAC) {
        return Cow::Borrowed(data);
    }

    let extra = data.iter().filter(|&&b| b == IAC).count();
    let mut out = Vec::with_capacity(data.len() + extra);
    for &b in data {
        out.push(b);
        if b == IAC {
            out.push(IAC);
        }
    }
    Cow::Owned(out)
}
