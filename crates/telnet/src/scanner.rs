use crate::{Command, CommandShape, Verb, IAC, SE};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
enum State {
    #[default]
    Idle,
    /// Last byte was an IAC whose meaning depends on the next byte.
    SawIac,
    /// Inside a fixed length command, `remaining` bytes still to swallow.
    InCommand { opcode: u8, remaining: u8 },
    /// Inside `IAC SB ... IAC SE`.
    Subneg {
        option: Option<u8>,
        saw_iac: bool,
        len: usize,
    },
}

/// Streaming IAC filter.
///
/// Feeding a stream in any partition of chunks yields the same output as
/// feeding it in one piece. Partial commands at the end of a chunk are kept
/// in the scanner state, never in a byte buffer.
#[derive(Debug, Default)]
pub struct IacScanner {
    state: State,
    /// Raw bytes swallowed by the command currently in progress.
    held: usize,
}

impl IacScanner {
    pub fn new() -> Self {
        Self::default()
    }

    /// Filter one chunk, returning only the literal bytes it contains.
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(chunk.len());
        self.scan(chunk, &mut out, |_| {});
        out
    }

    /// Like [`feed`](Self::feed), also returning the commands completed in this chunk.
    pub fn feed_with_commands(&mut self, chunk: &[u8]) -> (Vec<u8>, Vec<Command>) {
        let mut out = Vec::with_capacity(chunk.len());
        let mut commands = Vec::new();
        self.scan(chunk, &mut out, |cmd| commands.push(cmd));
        (out, commands)
    }

    /// True when no command is partially consumed.
    pub fn is_idle(&self) -> bool {
        self.state == State::Idle
    }

    /// Number of raw bytes belonging to an unfinished command.
    pub fn pending(&self) -> usize {
        self.held
    }

    /// End of stream. Drops any unfinished command and returns how many
    /// bytes it had swallowed; none of them are ever emitted.
    pub fn finish(&mut self) -> usize {
        let dropped = self.held;
        self.state = State::Idle;
        self.held = 0;
        dropped
    }

    fn scan(&mut self, chunk: &[u8], out: &mut Vec<u8>, mut on_command: impl FnMut(Command)) {
        let mut i = 0;
        while i < chunk.len() {
            if self.state == State::Idle {
                // Copy the literal run up to the next IAC in one go.
                let run = chunk[i..]
                    .iter()
                    .position(|&b| b == IAC)
                    .unwrap_or(chunk.len() - i);
                out.extend_from_slice(&chunk[i..i + run]);
                i += run;
                if i == chunk.len() {
                    break;
                }
            }
            self.step(chunk[i], out, &mut on_command);
            i += 1;
        }
    }

    fn step(&mut self, b: u8, out: &mut Vec<u8>, on_command: &mut impl FnMut(Command)) {
        match self.state {
            State::Idle => {
                if b == IAC {
                    self.state = State::SawIac;
                    self.held = 1;
                } else {
                    out.push(b);
                }
            }
            State::SawIac => {
                if b == IAC {
                    // Escaped 0xff
                    out.push(IAC);
                    self.reset();
                } else {
                    self.begin_command(b, on_command);
                }
            }
            State::InCommand { opcode, remaining } => {
                self.held += 1;
                if remaining > 1 {
                    self.state = State::InCommand {
                        opcode,
                        remaining: remaining - 1,
                    };
                    return;
                }
                let cmd = match Verb::from_byte(opcode) {
                    Some(verb) => Command::Negotiate { verb, option: b },
                    None => Command::Other(opcode),
                };
                on_command(cmd);
                self.reset();
            }
            State::Subneg {
                option,
                saw_iac,
                len,
            } => {
                self.held += 1;
                let Some(opt) = option else {
                    self.state = State::Subneg {
                        option: Some(b),
                        saw_iac: false,
                        len,
                    };
                    return;
                };

                if saw_iac {
                    match b {
                        SE => {
                            on_command(Command::Subnegotiation {
                                option: opt,
                                len,
                                complete: true,
                            });
                            self.reset();
                        }
                        IAC => {
                            self.state = State::Subneg {
                                option,
                                saw_iac: false,
                                len: len + 1,
                            };
                        }
                        _ => {
                            // Lost SE: close the block and treat this as a new command.
                            on_command(Command::Subnegotiation {
                                option: opt,
                                len,
                                complete: false,
                            });
                            self.held = 1;
                            self.begin_command(b, on_command);
                        }
                    }
                } else if b == IAC {
                    self.state = State::Subneg {
                        option,
                        saw_iac: true,
                        len,
                    };
                } else {
                    self.state = State::Subneg {
                        option,
                        saw_iac: false,
                        len: len + 1,
                    };
                }
            }
        }
    }

    /// `b` is the opcode following an IAC.
    fn begin_command(&mut self, b: u8, on_command: &mut impl FnMut(Command)) {
        self.held += 1;
        match CommandShape::of(b) {
            CommandShape::Fixed(total) if total > 2 => {
                self.state = State::InCommand {
                    opcode: b,
                    remaining: total - 2,
                };
            }
            CommandShape::Fixed(_) => {
                on_command(Command::Other(b));
                self.reset();
            }
            CommandShape::Subnegotiation => {
                self.state = State::Subneg {
                    option: None,
                    saw_iac: false,
                    len: 0,
                };
            }
        }
    }

    fn reset(&mut self) {
        self.state = State::Idle;
        self.held = 0;
    }
}
