//! Filedesk - command-line client for the file-management service.
//!
//! Signs in against the REST API, keeps the session tokens between runs and
//! lists files, folders, users and notifications through the authenticated
//! request pipeline.

mod app;

use std::io;
use std::path::Path;

use anyhow::Result;
use filedesk_core::Config;
use tracing::info;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use app::App;

const USAGE: &str = "\
Usage: filedesk <command>

Commands:
  login [username]      Sign in and remember the session
  register              Create an account
  logout                Sign out and forget the session
  status                Show whether a session is active
  profile               Show the signed-in user's profile
  files [folder-id]     List files, or the content of a folder
  users                 List user accounts
  notifications         List unread notifications";

/// Initialize the tracing subscriber for logging.
/// Returns the file writer guard, which must live until exit.
fn init_tracing(log_dir: Option<&Path>) -> Option<WorkerGuard> {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "filedesk.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (
                Some(fmt::layer().with_ansi(false).with_writer(writer)),
                Some(guard),
            )
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    if let Err(e) = run().await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let config = Config::load()?;
    let _log_guard = init_tracing(config.log_dir.as_deref());
    info!(api = %config.api_base_url, storage = ?config.storage, "Filedesk starting");

    let args: Vec<String> = std::env::args().skip(1).collect();
    let Some(command) = args.first() else {
        println!("{}", USAGE);
        return Ok(());
    };
    let argument = args.get(1).cloned();

    let mut app = App::new(config)?;
    match command.as_str() {
        "login" => app.login(argument).await,
        "register" => app.register().await,
        "logout" => app.logout().await,
        "status" => app.status(),
        "profile" => app.profile().await,
        "files" => app.files(argument.as_deref()).await,
        "users" => app.users().await,
        "notifications" => app.notifications().await,
        "-h" | "--help" | "help" => {
            println!("{}", USAGE);
            Ok(())
        }
        other => Err(anyhow::anyhow!("Unknown command '{}'\n\n{}", other, USAGE)),
    }
}
