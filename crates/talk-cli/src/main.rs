//! Talk - a terminal chat client
//!
//! Lines typed at the prompt are routed by the controller to programs,
//! agents, or the current conversation.

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::io::Write;
use std::path::PathBuf;
use std::sync::Arc;

use talk_core::{paths, Controller, ReqwestHttpClient, TalkConfig, TungsteniteConnector};

mod render;
mod repl;

/// Talk - terminal chat client
#[derive(Parser)]
#[command(name = "talk")]
#[command(about = "A terminal chat client driven by programs and agents", long_about = None)]
struct Cli {
    /// Config file (defaults to ~/.talk/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Skip the welcome text
    #[arg(long, global = true)]
    no_intro: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a single command line and print what it produced
    ///
    /// Programs that prompt for more input are left suspended; pass their
    /// answers as arguments instead.
    Exec {
        #[arg(trailing_var_arg = true, required = true)]
        line: Vec<String>,
    },
}

/// Restore terminal state - called on panic or unexpected exit
fn restore_terminal() {
    let _ = crossterm::terminal::disable_raw_mode();
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let original_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |panic_info| {
        restore_terminal();
        original_hook(panic_info);
    }));

    // Log to a file; stdout belongs to the prompt
    let log_dir = paths::logs_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory: {}", e);
    }

    #[cfg(unix)]
    let null_device = "/dev/null";
    #[cfg(windows)]
    let null_device = "NUL";

    let log_file = match std::fs::File::create(log_dir.join("talk.log")) {
        Ok(file) => file,
        Err(e) => {
            eprintln!(
                "Failed to create log file: {}, falling back to null device",
                e
            );
            match std::fs::File::create(null_device) {
                Ok(file) => file,
                Err(e) => {
                    eprintln!(
                        "Failed to create null device {}: {}, logging disabled",
                        null_device, e
                    );
                    return Err(e.into());
                }
            }
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .with_writer(std::sync::Mutex::new(log_file))
        .with_ansi(false)
        .init();

    let config_path = cli.config.unwrap_or_else(paths::config_path);
    let mut config = TalkConfig::load(&config_path).await?;
    if cli.no_intro || cli.command.is_some() {
        config.show_intro = false;
    }

    let http = Arc::new(ReqwestHttpClient::new(config.http_timeout())?);
    let (mut controller, notices) =
        Controller::new(config, http, Arc::new(TungsteniteConnector)).await;

    match cli.command {
        Some(Commands::Exec { line }) => {
            let line = line.join(" ");
            tracing::info!(line = %line, "Running single command");

            let before = controller.current_conversation().message_count();
            controller.send_command(&line).await;

            let session = controller.session();
            let conversation = controller.current_conversation();
            let skip = if conversation.message_count() < before {
                0
            } else {
                before
            };

            let mut stdout = std::io::stdout().lock();
            for message in conversation.messages().skip(skip) {
                writeln!(stdout, "{}", render::plain_line(message, session))?;
            }
        }
        None => {
            let mut repl = repl::Repl::new(controller, notices);
            repl.run().await?;
        }
    }

    Ok(())
}
