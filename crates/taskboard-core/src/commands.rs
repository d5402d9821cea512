use anyhow::anyhow;
use tracing::{debug, info, instrument, warn};

use crate::api::TaskApi;
use crate::board::{Outcome, TaskBoard};
use crate::cli::Command;
use crate::render::Renderer;
use crate::task::TaskPatch;

/// Runs one command against a board and renders the result.
///
/// Fails when the board ends with an error banner so the process exit code
/// reflects it.
#[instrument(skip(board, renderer))]
pub async fn dispatch<A: TaskApi>(
    board: &TaskBoard<A>,
    renderer: &Renderer,
    command: Command,
) -> anyhow::Result<()> {
    debug!(?command, "dispatching command");

    if let Command::List {
        filter: Some(filter),
    } = &command
    {
        board.set_filter(*filter);
    }
    if !matches!(command, Command::Stats { .. } | Command::Health) {
        board.mount().await;
    }

    match command {
        Command::List { .. } => {}
        Command::Add { title, description } => {
            board.show_add_form();
            board.set_draft_title(title.join(" "));
            board.set_draft_description(description);
            match board.submit_draft().await {
                Outcome::Skipped => return Err(anyhow!("task title cannot be empty")),
                outcome => info!(?outcome, "add finished"),
            }
        }
        Command::Toggle { id } => {
            // An unloaded list says nothing about whether the id exists.
            finish(board)?;
            let task = board
                .snapshot()
                .find(id)
                .cloned()
                .ok_or_else(|| anyhow!("no task with id {id}"))?;
            let outcome = board.toggle_complete(&task).await;
            info!(?outcome, "toggle finished");
        }
        Command::Edit {
            id,
            title,
            description,
        } => {
            let patch = TaskPatch {
                title,
                description,
                completed: None,
            };
            if patch.is_empty() {
                return Err(anyhow!("edit needs --title and/or --description"));
            }
            let outcome = board.update_task(id, &patch).await;
            info!(?outcome, "edit finished");
        }
        Command::Delete { id } => {
            let outcome = board.delete_task(id).await;
            info!(?outcome, "delete finished");
        }
        Command::Stats { local } => {
            if local {
                board.load_tasks().await;
                if board.error().is_none() {
                    renderer.print_stats(&board.local_stats(), "local")?;
                }
            } else {
                board.load_stats().await;
                match board.snapshot().stats {
                    Some(stats) => renderer.print_stats(&stats, "server")?,
                    None => {
                        warn!("server stats unavailable");
                        return Err(anyhow!("stats unavailable"));
                    }
                }
            }
            return finish(board);
        }
        Command::Health => {
            let health = board.health().await?;
            renderer.print_health(&health)?;
            if !health.is_healthy() {
                return Err(anyhow!("backend reports {}", health.status));
            }
            return Ok(());
        }
    }

    renderer.print_board(&board.snapshot())?;
    finish(board)
}

fn finish<A>(board: &TaskBoard<A>) -> anyhow::Result<()> {
    match board.error() {
        Some(error) => Err(anyhow!(error)),
        None => Ok(()),
    }
}
