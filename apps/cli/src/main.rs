use std::{path::PathBuf, sync::Arc};

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use client_core::{
    ApiClient, BoardApi, BoardEvent, BoardHandle, BoardSession, BoardView, ClientError,
    SessionContext,
};
use shared::domain::{ContainerId, ItemId};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod config;
mod render;

use config::{load_settings, Settings};
use render::{describe_outcome, reached_target, render_board};

#[derive(Parser, Debug)]
#[command(name = "board_cli", about = "Task board from the command line")]
struct Cli {
    /// Settings file (defaults to ./board.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    #[arg(long)]
    api_url: Option<String>,
    #[arg(long)]
    session_file: Option<PathBuf>,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Obtain tokens and remember them in the session file.
    Login {
        #[arg(long)]
        email: String,
        #[arg(long, env = "BOARD_PASSWORD", hide_env_values = true)]
        password: String,
    },
    Logout,
    Whoami,
    /// Print every column with its tasks.
    Board,
    /// Drag a task onto another column.
    Move {
        #[arg(long)]
        item: i64,
        #[arg(long, value_parser = parse_target)]
        to: ContainerId,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(cli.config.as_deref())?;
    if let Some(api_url) = cli.api_url {
        settings.api_url = api_url;
    }
    if let Some(session_file) = cli.session_file {
        settings.session_file = session_file;
    }
    debug!(api_url = %settings.api_url, session_file = %settings.session_file.display(), "settings loaded");

    let session = SessionContext::load_from(&settings.session_file)
        .await?
        .unwrap_or_default();
    let client = Arc::new(
        ApiClient::with_timeout(&settings.api_url, session.clone(), settings.request_timeout)
            .context("invalid api url")?,
    );

    let outcome = match cli.command {
        Command::Login { email, password } => login(&client, &email, &password).await,
        Command::Logout => {
            client.logout().await;
            println!("logged out");
            Ok(())
        }
        Command::Whoami => whoami(&client).await,
        Command::Board => show_board(&client, &settings).await,
        Command::Move { item, to } => move_item(&client, &settings, ItemId(item), to).await,
    };

    persist_session(&session, &settings).await?;
    outcome
}

async fn login(client: &ApiClient, email: &str, password: &str) -> Result<()> {
    let user = client.login(email, password).await.map_err(|err| match err.status() {
        Some(status) if status.as_u16() == 401 => anyhow::anyhow!("invalid email or password"),
        _ => anyhow::Error::new(err).context("login failed"),
    })?;
    println!("logged in as {} <{}>", user.username, user.email);
    Ok(())
}

async fn whoami(client: &ApiClient) -> Result<()> {
    let user = client.current_user().await.map_err(explain)?;
    if user.full_name.is_empty() {
        println!("{} <{}>", user.username, user.email);
    } else {
        println!("{} ({}) <{}>", user.full_name, user.username, user.email);
    }
    Ok(())
}

async fn show_board(client: &Arc<ApiClient>, settings: &Settings) -> Result<()> {
    let opened = open_board(client, settings).await?;
    print!("{}", render_board(&opened.view));
    opened.close().await;
    Ok(())
}

async fn move_item(
    client: &Arc<ApiClient>,
    settings: &Settings,
    item: ItemId,
    target: ContainerId,
) -> Result<()> {
    let mut opened = open_board(client, settings).await?;
    let known = opened
        .view
        .columns
        .iter()
        .flat_map(|column| column.items.iter())
        .chain(opened.view.unplaced.iter())
        .any(|candidate| candidate.id == item);
    if !known {
        opened.close().await;
        bail!("task #{item} is not on the board");
    }

    opened.handle.gesture_start(item).await?;
    opened.handle.drop_on(Some(target)).await?;

    let result = loop {
        let event = next_event(&mut opened.events).await?;
        let Some(message) = describe_outcome(&event) else {
            continue;
        };
        if reached_target(&event) {
            println!("{message}");
            break Ok(());
        }
        break Err(anyhow::anyhow!(message));
    };

    let view = opened.latest_view();
    opened.close().await;
    if result.is_ok() {
        print!("{}", render_board(&view));
    }
    result
}

struct OpenBoard {
    handle: BoardHandle,
    events: broadcast::Receiver<BoardEvent>,
    view: BoardView,
    view_rx: tokio::sync::watch::Receiver<BoardView>,
    task: tokio::task::JoinHandle<client_core::BoardStore>,
}

impl OpenBoard {
    fn latest_view(&self) -> BoardView {
        self.view_rx.borrow().clone()
    }

    async fn close(self) {
        drop(self.handle);
        if let Err(err) = self.task.await {
            warn!(%err, "board session task ended abnormally");
        }
    }
}

/// Starts a board session and waits for the initial load.
async fn open_board(client: &Arc<ApiClient>, settings: &Settings) -> Result<OpenBoard> {
    if !client.session().is_authenticated().await {
        bail!("not logged in; run `board_cli login` first");
    }
    let api: Arc<dyn BoardApi> = client.clone();
    let (session, handle) = BoardSession::new(api, settings.session_config());
    let session = session.with_client_events(client.subscribe_events());
    let mut events = session.subscribe_events();
    let view_rx = session.subscribe_view();
    let task = tokio::spawn(session.run());

    let report = loop {
        if let BoardEvent::Loaded(report) = next_event(&mut events).await? {
            break report;
        }
    };
    if report.session_expired {
        drop(handle);
        let _ = task.await;
        bail!("session expired; run `board_cli login` again");
    }
    if let Some(err) = &report.containers_error {
        warn!(%err, "columns could not be loaded");
    }
    if let Some(err) = &report.items_error {
        eprintln!("warning: tasks could not be loaded: {err}");
    }

    let view = view_rx.borrow().clone();
    Ok(OpenBoard {
        handle,
        events,
        view,
        view_rx,
        task,
    })
}

async fn next_event(events: &mut broadcast::Receiver<BoardEvent>) -> Result<BoardEvent> {
    loop {
        match events.recv().await {
            Ok(event) => return Ok(event),
            Err(RecvError::Lagged(skipped)) => warn!(skipped, "board events lagged"),
            Err(RecvError::Closed) => bail!("board session stopped unexpectedly"),
        }
    }
}

async fn persist_session(session: &SessionContext, settings: &Settings) -> Result<()> {
    if session.is_authenticated().await {
        session.save_to(&settings.session_file).await
    } else {
        SessionContext::forget(&settings.session_file).await
    }
}

fn explain(err: ClientError) -> anyhow::Error {
    if err.is_session_expired() || matches!(err, ClientError::NotAuthenticated) {
        anyhow::anyhow!("not logged in; run `board_cli login` first")
    } else {
        anyhow::Error::new(err)
    }
}

fn parse_target(raw: &str) -> Result<ContainerId, String> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err("column id must not be empty".into());
    }
    trimmed
        .parse::<ContainerId>()
        .map_err(|err| err.to_string())
}

#[cfg(test)]
#[path = "tests/main_tests.rs"]
mod tests;
