//! `taskorbit`: command-line task board.
//!
//! Loads the configured user's board from the task API, applies one
//! command and prints the result. Configuration via CLI flags,
//! environment variables, or config file (`~/.config/taskorbit/config.toml`).
//!
//! ```bash
//! # Print the board
//! taskorbit --email ada@example.com
//!
//! # Against a local devstore
//! taskorbit --api-url http://127.0.0.1:5000 --email ada@example.com \
//!     add --title "Write docs" --category in-progress
//!
//! # Move a task onto another column
//! TASKORBIT_EMAIL=ada@example.com taskorbit move <id> --to done
//! ```

use std::path::Path;
use std::process::ExitCode;

use clap::Parser;
use tracing_appender::non_blocking::WorkerGuard;

use taskorbit::board::{Board, BoardError, Columns, DropTarget, TaskDraft};
use taskorbit::config::{CliArgs, ClientConfig, Command, ConfigError};
use taskorbit::session::{AuthError, AuthProvider, LocalAuth};
use taskorbit::store::StoreError;
use taskorbit::store::http::HttpTaskStore;
use taskorbit::sync::{MutationDispatcher, MutationTicket, SyncError};
use taskorbit_proto::TaskId;

#[derive(Debug, thiserror::Error)]
enum AppError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Auth(#[from] AuthError),
    #[error(transparent)]
    Board(#[from] BoardError),
    #[error(transparent)]
    Sync(#[from] SyncError),
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = CliArgs::parse();

    let config = match ClientConfig::load(&cli) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let _log_guard = init_logging(&cli.log_level, cli.log_file.as_deref());

    let command = cli.command.unwrap_or(Command::Board);
    match run(command, &config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "command failed");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

/// Initialize logging.
///
/// With a file path, logs go through a non-blocking file writer and the
/// returned [`WorkerGuard`] must be held until shutdown. Otherwise logs go
/// to stderr so they never mix with command output.
fn init_logging(level: &str, file_path: Option<&Path>) -> Option<WorkerGuard> {
    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let Some(log_path) = file_path else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(env_filter)
            .init();
        return None;
    };

    let log_dir = log_path.parent().filter(|d| !d.as_os_str().is_empty());
    let log_dir = log_dir.unwrap_or_else(|| Path::new("."));
    let file_name = log_path.file_name()?;

    let file_appender = tracing_appender::rolling::never(log_dir, file_name);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    tracing_subscriber::fmt()
        .with_writer(non_blocking)
        .with_env_filter(env_filter)
        .with_ansi(false)
        .init();

    Some(guard)
}

async fn run(command: Command, config: &ClientConfig) -> Result<(), AppError> {
    let user = config.session_user().ok_or(AuthError::NotSignedIn)?;
    if matches!(command, Command::Whoami) {
        println!("{} <{}>", user.display_name, user.email);
        if let Some(photo) = &user.photo_url {
            println!("avatar: {photo}");
        }
        return Ok(());
    }

    let auth = LocalAuth::with_user(user);
    let store = HttpTaskStore::new(&config.api_base_url, config.request_timeout)?;
    let (dispatcher, _events) =
        MutationDispatcher::new(store, config.sync_timeout, config.event_buffer);
    let mut board = Board::new(auth.session(), dispatcher);
    tracing::info!(api = %config.api_base_url, "loading board");
    board.load().await?;

    match command {
        Command::Board | Command::Whoami => {}
        Command::Add {
            title,
            description,
            category,
        } => {
            let ticket = board.add_task(TaskDraft {
                title,
                description,
                category,
            })?;
            let id = settle(&auth, ticket).await?;
            println!("added {id}");
        }
        Command::Move { id, to, over } => {
            let id = TaskId::new(id);
            let target = match (to, over) {
                (Some(category), _) => DropTarget::Column(category),
                (None, Some(over)) => DropTarget::Task(TaskId::new(over)),
                // clap requires one of the two.
                (None, None) => return Ok(()),
            };
            match board.move_task(&id, target)? {
                Some(ticket) => {
                    settle(&auth, ticket).await?;
                    println!("moved {id}");
                }
                None => println!("{id} unchanged"),
            }
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            let id = TaskId::new(id);
            let ticket = board.edit_task(&id, title, description)?;
            settle(&auth, ticket).await?;
            println!("updated {id}");
        }
        Command::Delete { id } => {
            let id = TaskId::new(id);
            let ticket = board.delete_task(&id)?;
            settle(&auth, ticket).await?;
            println!("deleted {id}");
        }
    }

    print_board(&board.columns());
    Ok(())
}

/// Waits for a write; an unauthorized store ends the local session.
async fn settle(auth: &LocalAuth, ticket: MutationTicket) -> Result<TaskId, AppError> {
    match ticket.outcome().await {
        Ok(id) => Ok(id),
        Err(e) if e.requires_sign_in() => {
            auth.expire();
            Err(AuthError::SessionExpired.into())
        }
        Err(e) => Err(e.into()),
    }
}

fn print_board(columns: &Columns) {
    for (category, tasks) in columns.iter() {
        println!("{category} ({})", tasks.len());
        for task in tasks {
            println!("  {}  {}", task.id, task.title);
            if !task.description.is_empty() {
                println!("      {}", task.description);
            }
        }
    }
}
