use std::io::{self, IsTerminal};
use std::os::fd::{AsFd, OwnedFd};

use nix::sys::termios::{
    tcgetattr, tcsetattr, InputFlags, LocalFlags, SetArg, SpecialCharacterIndices, Termios,
};

/// Local terminal switched to character-at-a-time mode; restored on drop.
pub struct RawTerminal {
    tty: OwnedFd,
    saved: Termios,
}

impl RawTerminal {
    /// Returns `None` when stdin is not a terminal.
    pub fn enable() -> io::Result<Option<Self>> {
        let stdin = io::stdin();
        if !stdin.is_terminal() {
            return Ok(None);
        }
        Self::enable_on(stdin.as_fd().try_clone_to_owned()?).map(Some)
    }

    fn enable_on(tty: OwnedFd) -> io::Result<Self> {
        let saved = tcgetattr(&tty)?;
        tcsetattr(&tty, SetArg::TCSANOW, &make_raw(&saved))?;
        tracing::debug!("terminal switched to raw mode");
        Ok(Self { tty, saved })
    }
}

impl Drop for RawTerminal {
    fn drop(&mut self) {
        if let Err(e) = tcsetattr(&self.tty, SetArg::TCSANOW, &self.saved) {
            tracing::warn!("failed to restore terminal settings: {}", e);
        }
    }
}

/// Keys reach us one at a time, untranslated, and signal characters are
/// plain input. Output processing is left alone.
fn make_raw(saved: &Termios) -> Termios {
    let mut raw = saved.clone();
    raw.input_flags
        .remove(InputFlags::IGNCR | InputFlags::INLCR | InputFlags::ICRNL);
    raw.input_flags.insert(InputFlags::IGNBRK);
    // No local echo: the other end does the echoing.
    raw.local_flags.remove(
        LocalFlags::ISIG
            | LocalFlags::ICANON
            | LocalFlags::ECHO
            | LocalFlags::ECHOCTL
            | LocalFlags::ECHONL,
    );
    raw.control_chars[SpecialCharacterIndices::VMIN as usize] = 1;
    raw.control_chars[SpecialCharacterIndices::VTIME as usize] = 0;
    raw
}
