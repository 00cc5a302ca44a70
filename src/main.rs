mod config;
mod shutdown;
mod terminal;

use bridge::{Connection, SessionEnd};

use crate::config::{parse_cli_args, Settings};
use crate::terminal::RawTerminal;

#[tokio::main]
async fn main() {
    let settings = match parse_cli_args() {
        Ok(s) => s,
        Err(e) => {
            eprintln!("microcom: {}", e);
            std::process::exit(1);
        }
    };
    observability::init_logging(&settings.log_directive);
    for option in &settings.ignored_options {
        tracing::debug!(%option, "option accepted for compatibility and ignored");
    }

    let code = run(settings).await;
    // Exit right away: a blocked stdin read must not keep the process alive.
    std::process::exit(code);
}

async fn run(settings: Settings) -> i32 {
    let Connection {
        reader,
        writer,
        line,
    } = match settings.endpoint.open().await {
        Ok(conn) => conn,
        Err(e) => {
            tracing::error!("{}", e);
            return 1;
        }
    };

    if !settings.quiet {
        println!("connected to {}", settings.endpoint);
        if let (false, Some(esc)) = (settings.listen_only, settings.session.escape_char) {
            println!("Escape character: Ctrl-{}", char::from(esc ^ 0x40));
            println!("Type the escape character followed by c to get to the menu or q to quit");
        }
    }

    let raw_terminal = if settings.raw_terminal {
        RawTerminal::enable().unwrap_or_else(|e| {
            tracing::warn!("cannot set terminal mode: {}", e);
            None
        })
    } else {
        None
    };

    let terminal_in = (!settings.listen_only).then(tokio::io::stdin);
    let result = bridge::run_session(
        reader,
        writer,
        terminal_in,
        tokio::io::stdout(),
        &settings.session,
        shutdown::terminated(),
    )
    .await;

    drop(raw_terminal);
    drop(line);

    match result {
        Ok(end) => {
            tracing::info!(?end, "session ended");
            if end == SessionEnd::Quit && !settings.quiet {
                println!("\r\nexiting");
            }
            0
        }
        Err(e) => {
            tracing::error!("{}", e);
            1
        }
    }
}
