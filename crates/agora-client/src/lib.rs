pub mod commands;
pub mod config;
pub mod events;
pub mod state;

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::{fmt, EnvFilter};

use crate::commands::{messaging, profile, Command};
use crate::config::ClientConfig;
use crate::events::Renderer;
use crate::state::AppState;

/// Install the global tracing subscriber. Logs go to stderr so stdout only
/// carries room output.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new("agora_client=debug,agora_sync=debug,agora_store=info,warn")
    });

    fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Whether the input loop keeps going after a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Quit,
}

/// Run one parsed command and return the lines to print.
pub async fn dispatch(state: &AppState, renderer: &Renderer, command: Command) -> (Flow, Option<String>) {
    let output = match command {
        Command::Nothing => None,
        Command::Quit => return (Flow::Quit, None),
        Command::Invalid(hint) => Some(renderer.error(hint)),
        Command::Send(text) => Some(match messaging::send_message(state, &text).await {
            Ok(id) => renderer.info(format!("sent {id}")),
            Err(e) => renderer.error(e),
        }),
        Command::Delete(id) => Some(match messaging::delete_message(state, &id).await {
            Ok(()) => renderer.info(format!("deleted {id}")),
            Err(e) => renderer.error(e),
        }),
        Command::SetDisplayName(name) => Some(match profile::set_display_name(state, &name).await {
            Ok(_) => renderer.info(format!("display name set to {}", name.trim())),
            Err(e) => renderer.error(e),
        }),
    };
    (Flow::Continue, output)
}

/// Open the room and serve stdin until EOF, `/quit` or Ctrl+C.
pub async fn run(config: ClientConfig) -> anyhow::Result<()> {
    let state = AppState::open(config).await?;
    let renderer = Renderer::new(
        state.config.output,
        state.config.room.clone(),
        state.current_user(),
    );

    match state.current_user() {
        Some(user) => info!(user = %user, room = %state.config.room, "Signed in"),
        None => warn!(room = %state.config.room, "No AGORA_USER_ID set, read-only session"),
    }

    let mut observer = state.observe()?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            view = observer.changed() => {
                let Some(view) = view else { break };
                if let Some(out) = renderer.view(&view) {
                    println!("{out}");
                }
            }
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let (flow, out) = dispatch(&state, &renderer, Command::parse(&line)).await;
                if let Some(out) = out {
                    println!("{out}");
                }
                if flow == Flow::Quit {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                info!("Received Ctrl+C, shutting down");
                break;
            }
        }
    }

    drop(observer);
    info!("Session closed");
    Ok(())
}
