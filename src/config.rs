use std::path::{Path, PathBuf};

use bridge::endpoint::DEFAULT_TELNET_PORT;
use bridge::escape::DEFAULT_ESCAPE_CHAR;
use bridge::{BridgeError, Endpoint, SessionConfig, DEFAULT_BUFFER_SIZE};
use clap::Parser;
use serde::Deserialize;

pub const DEFAULT_DEVICE: &str = "/dev/ttyS0";

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BridgeSection {
    pub buffer_size: usize,
    pub escape_outbound_iac: bool,
}

impl Default for BridgeSection {
    fn default() -> Self {
        Self {
            buffer_size: DEFAULT_BUFFER_SIZE,
            escape_outbound_iac: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelnetSection {
    pub default_port: u16,
}

impl Default for TelnetSection {
    fn default() -> Self {
        Self {
            default_port: DEFAULT_TELNET_PORT,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TerminalSection {
    pub escape_char: u8,
    /// Put stdin into non-canonical, no-echo mode while bridging.
    pub raw: bool,
}

impl Default for TerminalSection {
    fn default() -> Self {
        Self {
            escape_char: DEFAULT_ESCAPE_CHAR,
            raw: true,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSection {
    pub level: String,
}

impl Default for LogSection {
    fn default() -> Self {
        Self {
            level: "warn".to_string(),
        }
    }
}

/// Settings loadable from a TOML file.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FileConfig {
    pub bridge: BridgeSection,
    pub telnet: TelnetSection,
    pub terminal: TerminalSection,
    pub log: LogSection,
}

impl FileConfig {
    /// Load configuration from an optional TOML file path. Defaults when no
    /// path is given; a path that cannot be read is an error.
    pub fn load(config_path: Option<&Path>) -> Result<Self, Box<dyn std::error::Error>> {
        let Some(path) = config_path else {
            return Ok(Self::default());
        };
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("cannot read config {}: {}", path.display(), e))?;
        Ok(toml::from_str(&content)?)
    }
}

#[derive(Debug, Parser)]
#[command(
    name = "microcom",
    version,
    about = "Minimal terminal for serial ports and RFC 2217 telnet servers"
)]
pub struct Cli {
    /// Serial port device to use.
    #[arg(short = 'p', long = "port", value_name = "DEVFILE", default_value = DEFAULT_DEVICE)]
    pub port: PathBuf,

    /// Baud rate. Accepted for compatibility; the line speed is not changed.
    #[arg(short = 's', long, value_name = "SPEED")]
    pub speed: Option<u32>,

    /// Ignore an existing lock file. Accepted for compatibility.
    #[arg(short = 'f', long)]
    pub force: bool,

    /// Work in telnet (RFC 2217) mode.
    #[arg(short = 't', long = "telnet", value_name = "HOST:PORT")]
    pub telnet: Option<String>,

    /// Print nothing but the bridged data.
    #[arg(short = 'q', long)]
    pub quiet: bool,

    /// Output debugging info on stderr.
    #[arg(short = 'd', long)]
    pub debug: bool,

    /// Log received data to this file.
    #[arg(short = 'l', long, value_name = "LOGFILE")]
    pub logfile: Option<PathBuf>,

    /// Do not modify the local terminal, do not send input from stdin.
    #[arg(short = 'o', long)]
    pub listenonly: bool,

    /// String sent in response to an ENQ (0x05) from the remote side.
    #[arg(short = 'a', long, value_name = "STR")]
    pub answerback: Option<String>,

    /// Double 0xff bytes sent to a telnet peer.
    #[arg(long)]
    pub escape_iac: bool,

    /// TOML configuration file.
    #[arg(short = 'c', long, value_name = "FILE")]
    pub config: Option<PathBuf>,
}

/// Everything `main` needs, CLI merged over the config file.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: Endpoint,
    pub session: SessionConfig,
    pub quiet: bool,
    pub listen_only: bool,
    pub raw_terminal: bool,
    pub log_directive: String,
    /// Options given on the command line that have no effect here.
    pub ignored_options: Vec<String>,
}

impl Settings {
    pub fn resolve(cli: Cli, file: FileConfig) -> Result<Self, BridgeError> {
        let endpoint = match &cli.telnet {
            Some(hostport) => Endpoint::parse_telnet(hostport, file.telnet.default_port)?,
            None => Endpoint::Device(cli.port.clone()),
        };

        let session = SessionConfig {
            buffer_size: file.bridge.buffer_size.max(1),
            telnet: endpoint.is_telnet(),
            escape_outbound_iac: endpoint.is_telnet()
                && (cli.escape_iac || file.bridge.escape_outbound_iac),
            escape_char: (!cli.listenonly).then_some(file.terminal.escape_char),
            answerback: cli.answerback,
            logfile: cli.logfile,
        };

        let mut ignored_options = Vec::new();
        if let Some(speed) = cli.speed {
            ignored_options.push(format!("--speed={}", speed));
        }
        if cli.force {
            ignored_options.push("--force".to_string());
        }

        let log_directive = if cli.debug {
            "debug".to_string()
        } else {
            file.log.level
        };

        Ok(Self {
            endpoint,
            session,
            quiet: cli.quiet,
            listen_only: cli.listenonly,
            raw_terminal: file.terminal.raw && !cli.listenonly,
            log_directive,
            ignored_options,
        })
    }
}

/// Parse CLI arguments and merge with config.
pub fn parse_cli_args() -> Result<Settings, Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let file = FileConfig::load(cli.config.as_deref())?;
    Ok(Settings::resolve(cli, file)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn cli(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("microcom").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn default_config_matches_hardcoded_values() {
        let config = FileConfig::default();
        assert_eq!(config.bridge.buffer_size, 1024);
        assert!(!config.bridge.escape_outbound_iac);
        assert_eq!(config.telnet.default_port, 23);
        assert_eq!(config.terminal.escape_char, 0x1c);
        assert!(config.terminal.raw);
        assert_eq!(config.log.level, "warn");
    }

    #[test]
    fn load_without_path_returns_defaults() {
        let config = FileConfig::load(None).unwrap();
        assert_eq!(config.bridge.buffer_size, 1024);
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let err = FileConfig::load(Some(Path::new("/tmp/nonexistent_microcom_12345.toml")))
            .unwrap_err();
        assert!(err.to_string().contains("nonexistent_microcom_12345.toml"));
    }

    #[test]
    fn load_partial_toml() {
        let mut f = NamedTempFile::new().unwrap();
        write!(
            f,
            r#"
[bridge]
buffer_size = 4096

[terminal]
escape_char = 29
"#
        )
        .unwrap();

        let config = FileConfig::load(Some(f.path())).unwrap();
        assert_eq!(config.bridge.buffer_size, 4096);
        assert_eq!(config.terminal.escape_char, 29);
        // Unset fields remain default
        assert!(config.terminal.raw);
        assert_eq!(config.telnet.default_port, 23);
    }

    #[test]
    fn load_invalid_toml_fails() {
        let mut f = NamedTempFile::new().unwrap();
        write!(f, "[bridge]\nbuffer_size = \"big\"\n").unwrap();
        assert!(FileConfig::load(Some(f.path())).is_err());
    }

    #[test]
    fn telnet_equals_form() {
        let settings = Settings::resolve(
            cli(&["--telnet=127.0.0.1:2217", "--quiet"]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(
            settings.endpoint,
            Endpoint::Telnet {
                host: "127.0.0.1".to_string(),
                port: 2217
            }
        );
        assert!(settings.quiet);
        assert!(settings.session.telnet);
        assert_eq!(settings.session.escape_char, Some(0x1c));
        assert_eq!(settings.log_directive, "warn");
    }

    #[test]
    fn telnet_short_form_uses_config_default_port() {
        let mut file = FileConfig::default();
        file.telnet.default_port = 7000;
        let settings = Settings::resolve(cli(&["-t", "ser2net"]), file).unwrap();
        assert_eq!(
            settings.endpoint,
            Endpoint::Telnet {
                host: "ser2net".to_string(),
                port: 7000
            }
        );
    }

    #[test]
    fn device_mode_is_raw_passthrough() {
        let settings = Settings::resolve(
            cli(&["-p", "/dev/ttyUSB0", "--escape-iac"]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(settings.endpoint, Endpoint::Device("/dev/ttyUSB0".into()));
        assert!(!settings.session.telnet);
        assert!(!settings.session.escape_outbound_iac);
    }

    #[test]
    fn default_device() {
        let settings = Settings::resolve(cli(&[]), FileConfig::default()).unwrap();
        assert_eq!(settings.endpoint, Endpoint::Device(DEFAULT_DEVICE.into()));
    }

    #[test]
    fn listenonly_disables_terminal_side() {
        let settings = Settings::resolve(
            cli(&["-t", "host:1", "-o", "-a", "board", "-l", "/tmp/x.log", "-d"]),
            FileConfig::default(),
        )
        .unwrap();
        assert!(settings.listen_only);
        assert!(!settings.raw_terminal);
        assert_eq!(settings.session.escape_char, None);
        assert_eq!(settings.session.answerback.as_deref(), Some("board"));
        assert_eq!(settings.session.logfile, Some(PathBuf::from("/tmp/x.log")));
        assert_eq!(settings.log_directive, "debug");
    }

    #[test]
    fn bad_telnet_endpoint_rejected() {
        let result = Settings::resolve(cli(&["--telnet=host:port"]), FileConfig::default());
        assert!(matches!(result, Err(BridgeError::InvalidEndpoint(_))));
    }

    #[test]
    fn speed_and_force_are_accepted_and_ignored() {
        let settings = Settings::resolve(
            cli(&["-p", "/dev/ttyUSB1", "-s", "9600", "-f"]),
            FileConfig::default(),
        )
        .unwrap();
        assert_eq!(settings.endpoint, Endpoint::Device("/dev/ttyUSB1".into()));
        assert_eq!(settings.ignored_options, vec!["--speed=9600", "--force"]);

        let long = Settings::resolve(cli(&["--speed=115200", "--force"]), FileConfig::default()).unwrap();
        assert_eq!(long.ignored_options.len(), 2);
        let plain = Settings::resolve(cli(&[]), FileConfig::default()).unwrap();
        assert!(plain.ignored_options.is_empty());
    }

    #[test]
    fn unknown_flag_is_usage_error() {
        assert!(Cli::try_parse_from(["microcom", "--bogus"]).is_err());
    }
}
