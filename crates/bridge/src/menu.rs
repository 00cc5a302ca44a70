//! Command menu reached with `<escape> c`.
//!
//! A line may hold several commands separated by `;`. Words are split on
//! blanks; `"..."` keeps blanks inside one word.

/// Key that opens the menu after the escape character.
pub const MENU_KEY: u8 = b'c';

pub const MENU_BANNER: &str = "\r\nEnter command. Try 'help' for a list of builtin commands\r\n";
pub const PROMPT: &str = "-> ";
pub const MENU_FOOTER: &str = "\r\n----------------------\r\n";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuCommand {
    /// List all commands, or show the usage of one.
    Help(Option<String>),
    /// Back to the session.
    Exit,
    Quit,
    /// Send a break to the peer.
    Break,
    /// Start logging received data to a file.
    Log(String),
    /// Run the commands in a file.
    Execute(String),
    Comment,
    /// Known command called without its argument.
    Usage(&'static str),
    /// Serial line settings this build does not change.
    Unsupported(&'static str),
    Unknown(String),
}

struct CommandInfo {
    name: &'static str,
    info: &'static str,
    usage: Option<&'static str>,
}

const COMMANDS: &[CommandInfo] = &[
    CommandInfo { name: "exit", info: "exit from command processing", usage: None },
    CommandInfo { name: "break", info: "send break", usage: None },
    CommandInfo { name: "quit", info: "quit microcom", usage: None },
    CommandInfo { name: "help", info: "show help", usage: Some("help [command]") },
    CommandInfo { name: "x", info: "execute a script", usage: Some("x <scriptfile>") },
    CommandInfo { name: "log", info: "log to file", usage: Some("log <logfile>") },
    CommandInfo { name: "#", info: "comment", usage: None },
];

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("could not find matching '\"'")]
pub struct UnmatchedQuote;

impl MenuCommand {
    /// `words` is one statement as produced by [`split_line`].
    pub fn from_words(words: &[String]) -> Self {
        let Some((name, args)) = words.split_first() else {
            return MenuCommand::Comment;
        };
        let arg = args.first().cloned();

        match name.as_str() {
            "help" => MenuCommand::Help(arg),
            "exit" => MenuCommand::Exit,
            "quit" => MenuCommand::Quit,
            "break" => MenuCommand::Break,
            "log" => arg.map_or(MenuCommand::Usage("log"), MenuCommand::Log),
            "x" => arg.map_or(MenuCommand::Usage("x"), MenuCommand::Execute),
            "#" => MenuCommand::Comment,
            "speed" => MenuCommand::Unsupported("speed"),
            "flow" => MenuCommand::Unsupported("flow"),
            other => MenuCommand::Unknown(other.to_string()),
        }
    }

    /// Commands after which the menu closes and bridging resumes.
    pub fn leaves_menu(&self) -> bool {
        matches!(
            self,
            MenuCommand::Exit | MenuCommand::Break | MenuCommand::Execute(_)
        )
    }
}

/// Split a command line into statements of words.
pub fn split_line(line: &str) -> Result<Vec<Vec<String>>, UnmatchedQuote> {
    let mut statements = Vec::new();
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    loop {
        while matches!(chars.peek(), Some(' ' | '\t')) {
            chars.next();
        }

        match chars.peek() {
            None => break,
            Some(';') => {
                chars.next();
                if !words.is_empty() {
                    statements.push(std::mem::take(&mut words));
                }
            }
            Some('"') => {
                chars.next();
                let mut word = String::new();
                loop {
                    match chars.next() {
                        Some('"') => break,
                        Some(c) => word.push(c),
                        None => return Err(UnmatchedQuote),
                    }
                }
                words.push(word);
            }
            Some(_) => {
                let mut word = String::new();
                while let Some(&c) = chars.peek() {
                    if matches!(c, ' ' | '\t' | ';') {
                        break;
                    }
                    word.push(c);
                    chars.next();
                }
                words.push(word);
            }
        }
    }

    if !words.is_empty() {
        statements.push(words);
    }
    Ok(statements)
}

pub fn parse_line(line: &str) -> Result<Vec<MenuCommand>, UnmatchedQuote> {
    Ok(split_line(line)?
        .iter()
        .map(|words| MenuCommand::from_words(words))
        .collect())
}

pub fn help_text() -> String {
    COMMANDS
        .iter()
        .map(|c| format!("{} - {}\r\n", c.name, c.info))
        .collect()
}

pub fn usage(name: &str) -> String {
    match COMMANDS.iter().find(|c| c.name == name) {
        Some(c) => format!("usage:\r\n{}\r\n", c.usage.unwrap_or(c.info)),
        None => "no such command\r\n".to_string(),
    }
}
