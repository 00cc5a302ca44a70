use crate::menu::{self, MenuCommand, MENU_KEY};

/// Ctrl-\
pub const DEFAULT_ESCAPE_CHAR: u8 = 0x1c;

const BACKSPACE: u8 = 0x08;
const DEL: u8 = 0x7f;
const CTRL_C: u8 = 0x03;
const CTRL_D: u8 = 0x04;

/// What one chunk of keyboard input turns into, in order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Bytes for the peer.
    Send(Vec<u8>),
    /// Bytes for the local terminal only.
    Echo(Vec<u8>),
    EnterMenu,
    Run(MenuCommand),
    Prompt,
    LeaveMenu,
    /// Anything typed after this is dropped.
    Quit,
}

#[derive(Debug)]
enum Mode {
    Passthrough,
    Armed,
    Menu(Vec<u8>),
}

/// Watches keyboard input for the escape character.
///
/// `<escape> q` quits, `<escape> c` opens the command menu and
/// `<escape> <escape>` sends one escape byte. `<escape>` followed by any
/// other key sends both. In the menu, keys are collected into a line
/// (echoed locally, backspace edits) and the line is parsed on Enter.
/// Ctrl-C or Ctrl-D closes the menu. State survives chunk boundaries.
#[derive(Debug)]
pub struct EscapeFilter {
    escape_char: u8,
    mode: Mode,
}

impl EscapeFilter {
    pub fn new(escape_char: u8) -> Self {
        Self {
            escape_char,
            mode: Mode::Passthrough,
        }
    }

    pub fn in_menu(&self) -> bool {
        matches!(self.mode, Mode::Menu(_))
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<KeyAction> {
        let mut actions = Vec::new();
        let esc = self.escape_char;

        for &b in chunk {
            match &mut self.mode {
                Mode::Passthrough => {
                    if b == esc {
                        self.mode = Mode::Armed;
                    } else {
                        send(&mut actions, &[b]);
                    }
                }
                Mode::Armed => {
                    self.mode = Mode::Passthrough;
                    match b {
                        b'q' | b'Q' => {
                            actions.push(KeyAction::Quit);
                            return actions;
                        }
                        b if b.to_ascii_lowercase() == MENU_KEY => {
                            actions.push(KeyAction::EnterMenu);
                            self.mode = Mode::Menu(Vec::new());
                        }
                        b if b == esc => send(&mut actions, &[b]),
                        b => send(&mut actions, &[esc, b]),
                    }
                }
                Mode::Menu(line) => match b {
                    b'\r' | b'\n' => {
                        let line = std::mem::take(line);
                        echo(&mut actions, b"\r\n");
                        if self.submit(&line, &mut actions) {
                            return actions;
                        }
                    }
                    DEL | BACKSPACE => {
                        if line.pop().is_some() {
                            echo(&mut actions, b"\x08 \x08");
                        }
                    }
                    CTRL_C | CTRL_D => {
                        actions.push(KeyAction::LeaveMenu);
                        self.mode = Mode::Passthrough;
                    }
                    b'\t' | 0x20..=0x7e => {
                        line.push(b);
                        echo(&mut actions, &[b]);
                    }
                    _ => {}
                },
            }
        }

        actions
    }

    /// Queue the commands of one menu line. Returns true on quit.
    fn submit(&mut self, line: &[u8], actions: &mut Vec<KeyAction>) -> bool {
        match menu::parse_line(&String::from_utf8_lossy(line)) {
            Ok(commands) => {
                for command in commands {
                    if command == MenuCommand::Quit {
                        actions.push(KeyAction::Quit);
                        return true;
                    }
                    let leaves = command.leaves_menu();
                    actions.push(KeyAction::Run(command));
                    if leaves {
                        actions.push(KeyAction::LeaveMenu);
                        self.mode = Mode::Passthrough;
                        return false;
                    }
                }
            }
            Err(e) => echo(actions, format!("{}\r\n", e).as_bytes()),
        }
        actions.push(KeyAction::Prompt);
        false
    }
}

impl Default for EscapeFilter {
    fn default() -> Self {
        Self::new(DEFAULT_ESCAPE_CHAR)
    }
}

fn send(actions: &mut Vec<KeyAction>, bytes: &[u8]) {
    match actions.last_mut() {
        Some(KeyAction::Send(data)) => data.extend_from_slice(bytes),
        _ => actions.push(KeyAction::Send(bytes.to_vec())),
    }
}

fn echo(actions: &mut Vec<KeyAction>, bytes: &[u8]) {
    match actions.last_mut() {
        Some(KeyAction::Echo(data)) => data.extend_from_slice(bytes),
        _ => actions.push(KeyAction::Echo(bytes.to_vec())),
    }
}
