use std::fs::File;
use std::io::{self, IsTerminal};

use nix::sys::termios::{
    cfmakeraw, tcgetattr, tcsetattr, ControlFlags, SetArg, SpecialCharacterIndices, Termios,
};

/// A serial port switched to raw mode. The settings found at open time are
/// written back on drop.
pub struct SerialLine {
    port: File,
    saved: Termios,
}

impl SerialLine {
    /// Returns `None` when `port` is not a tty (plain file, fifo).
    pub fn configure(port: &File) -> io::Result<Option<Self>> {
        if !port.is_terminal() {
            return Ok(None);
        }

        let saved = tcgetattr(port)?;
        tcsetattr(port, SetArg::TCSANOW, &raw_line(&saved))?;
        tracing::debug!("serial line switched to raw mode");

        Ok(Some(Self {
            port: port.try_clone()?,
            saved,
        }))
    }
}

impl Drop for SerialLine {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(&self.port, SetArg::TCSANOW, &self.saved) {
            tracing::warn!("failed to restore serial line settings: {}", e);
        }
    }
}

/// 8-bit clean, no echo, no CR/NL translation either way, one byte is
/// enough to finish a read. Hangs up on last close.
fn raw_line(saved: &Termios) -> Termios {
    let mut raw = saved.clone();
    cfmakeraw(&mut raw);
    raw.control_flags.insert(ControlFlags::HUPCL);
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    raw
}
